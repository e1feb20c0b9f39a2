//! Candidate trade routes and their quotes.

use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::fmt;

use crate::amounts::serde_dec;
use crate::config::{ChainKey, Token};

/// Scanning strategy that produced a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    IntraDex,
    Triangular,
    Stablecoin,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::IntraDex, Strategy::Triangular, Strategy::Stablecoin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::IntraDex => "intra-dex",
            Strategy::Triangular => "triangular",
            Strategy::Stablecoin => "stablecoin",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One directional exchange through a single fee-tier pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hop {
    pub token_in: Token,
    pub token_out: Token,
    pub fee: u32,
}

/// How the route's base token converts to USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseValuation {
    /// Wrapped native token, priced by the chain's native/USD feed.
    Native,
    /// USD stablecoin, valued at par.
    UsdPegged,
}

/// Ordered hops that start and end in `base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRoute {
    pub chain: ChainKey,
    pub strategy: Strategy,
    pub hops: Vec<Hop>,
    #[serde(serialize_with = "serde_dec::u256")]
    pub amount_in: U256,
    pub base: Token,
    pub valuation: BaseValuation,
}

impl TradeRoute {
    /// A -> B via `fee_out`, B -> A via `fee_back`.
    pub fn intra_dex(
        chain: ChainKey,
        base: Token,
        quote: Token,
        fee_out: u32,
        fee_back: u32,
        amount_in: U256,
    ) -> Self {
        Self {
            chain,
            strategy: Strategy::IntraDex,
            hops: vec![
                Hop { token_in: base, token_out: quote, fee: fee_out },
                Hop { token_in: quote, token_out: base, fee: fee_back },
            ],
            amount_in,
            base,
            valuation: BaseValuation::Native,
        }
    }

    /// A -> B -> C -> A.
    pub fn triangular(chain: ChainKey, path: [Token; 3], fees: [u32; 3], amount_in: U256) -> Self {
        let [a, b, c] = path;
        Self {
            chain,
            strategy: Strategy::Triangular,
            hops: vec![
                Hop { token_in: a, token_out: b, fee: fees[0] },
                Hop { token_in: b, token_out: c, fee: fees[1] },
                Hop { token_in: c, token_out: a, fee: fees[2] },
            ],
            amount_in,
            base: a,
            valuation: BaseValuation::Native,
        }
    }

    /// Stable -> bridged stable -> stable. Starts from held stablecoins, no wrap.
    pub fn stablecoin(
        chain: ChainKey,
        stable: Token,
        bridged: Token,
        fees: (u32, u32),
        amount_in: U256,
    ) -> Self {
        Self {
            chain,
            strategy: Strategy::Stablecoin,
            hops: vec![
                Hop { token_in: stable, token_out: bridged, fee: fees.0 },
                Hop { token_in: bridged, token_out: stable, fee: fees.1 },
            ],
            amount_in,
            base: stable,
            valuation: BaseValuation::UsdPegged,
        }
    }

    pub fn leg_count(&self) -> usize {
        self.hops.len()
    }

    /// Every token the route touches, base first, without duplicates.
    pub fn tokens(&self) -> Vec<Address> {
        let mut out = vec![self.base.address];
        for hop in &self.hops {
            if !out.contains(&hop.token_out.address) {
                out.push(hop.token_out.address);
            }
        }
        out
    }

    /// e.g. `WETH -500-> USDC -3000-> WETH`
    pub fn label(&self) -> String {
        let mut label = self.base.symbol.to_string();
        for hop in &self.hops {
            label.push_str(&format!(" -{}-> {}", hop.fee, hop.token_out.symbol));
        }
        label
    }
}

/// One hop as reported by the quoter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HopQuote {
    #[serde(serialize_with = "serde_dec::u256")]
    pub amount_out: U256,
    /// Quoter's gas estimate for this swap alone.
    pub gas_estimate: u64,
    pub ticks_crossed: u32,
    #[serde(serialize_with = "serde_dec::u256")]
    pub sqrt_price_after: U256,
}

impl HopQuote {
    /// Output only, no execution metadata.
    pub fn output(amount_out: U256) -> Self {
        Self {
            amount_out,
            gas_estimate: 0,
            ticks_crossed: 0,
            sqrt_price_after: U256::ZERO,
        }
    }
}

/// Chained quote for a whole route, one entry per hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub hops: Vec<HopQuote>,
    pub total_gas_estimate: u64,
}

impl Quote {
    pub fn new(hops: Vec<HopQuote>) -> Self {
        let total_gas_estimate = hops.iter().map(|h| h.gas_estimate).fold(0u64, u64::saturating_add);
        Self { hops, total_gas_estimate }
    }

    pub fn from_outputs(outputs: Vec<U256>) -> Self {
        Self::new(outputs.into_iter().map(HopQuote::output).collect())
    }

    /// Quoted output of hop `i` (0-based), in that hop's output token units.
    pub fn hop_output(&self, i: usize) -> Option<U256> {
        self.hops.get(i).map(|h| h.amount_out)
    }

    pub fn final_output(&self) -> U256 {
        self.hops.last().map(|h| h.amount_out).unwrap_or(U256::ZERO)
    }
}
