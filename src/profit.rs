//! Profitability filter and gas model
//!
//! Gross profit and spread are computed in the route's base unit with integer
//! math. USD conversion happens last, in `Decimal`.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::amounts::{serde_dec, signed_to_decimal, to_signed};
use crate::config::{ChainKey, GasSettings};
use crate::route::{BaseValuation, Quote, Strategy, TradeRoute};

/// Decimals of every supported chain's native gas token.
pub const NATIVE_DECIMALS: u8 = 18;

/// USD amounts are kept to this many places.
const USD_DP: u32 = 8;

/// Conservative up-front gas estimate for a whole route.
#[derive(Debug, Clone, Copy)]
pub struct GasModel {
    settings: GasSettings,
}

impl GasModel {
    pub fn new(settings: GasSettings) -> Self {
        Self { settings }
    }

    /// wrap + 2 approvals + 2 swaps
    pub fn two_leg_units(&self) -> u64 {
        let u = self.settings.units;
        u.wrap + 2 * u.approve + 2 * u.swap
    }

    pub fn units(&self, strategy: Strategy) -> u64 {
        let base = self.two_leg_units();
        match strategy {
            Strategy::IntraDex => base,
            Strategy::Triangular => scale_units(base, self.settings.triangular_multiplier),
            Strategy::Stablecoin => scale_units(base, self.settings.stablecoin_multiplier),
        }
    }

    /// units * gas price * safety buffer, in wei.
    pub fn estimate(&self, strategy: Strategy, gas_price: u128) -> U256 {
        let raw = U256::from(self.units(strategy)) * U256::from(gas_price);
        let buffer = self.settings.buffer;
        let mantissa = buffer.mantissa().unsigned_abs();
        raw * U256::from(mantissa) / U256::from(10u128.pow(buffer.scale()))
    }
}

fn scale_units(units: u64, multiplier: Decimal) -> u64 {
    (Decimal::from(units) * multiplier)
        .round()
        .to_u64()
        .unwrap_or(u64::MAX)
}

/// A priced route that cleared both profit thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: u64,
    pub chain: ChainKey,
    pub route: TradeRoute,
    pub quote: Quote,
    /// Final output minus input, base token units.
    #[serde(serialize_with = "serde_dec::i128")]
    pub gross_profit: i128,
    pub gross_profit_usd: Decimal,
    #[serde(serialize_with = "serde_dec::u256")]
    pub gas_estimate_native: U256,
    pub gas_cost_usd: Decimal,
    pub net_profit_usd: Decimal,
    pub spread_bps: i64,
    /// Native price captured at discovery. Realized profit uses it too.
    pub native_price_usd: Decimal,
    pub discovered_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.discovered_at).num_milliseconds()
    }

    /// USD value of one whole base token at discovery.
    pub fn base_price_usd(&self) -> Decimal {
        match self.route.valuation {
            BaseValuation::Native => self.native_price_usd,
            BaseValuation::UsdPegged => Decimal::ONE,
        }
    }
}

static NEXT_OPPORTUNITY_ID: AtomicU64 = AtomicU64::new(1);
static LAST_DISCOVERY_MICROS: AtomicI64 = AtomicI64::new(0);

/// Strictly increasing discovery stamp, even if the wall clock steps back.
fn next_discovery() -> (u64, DateTime<Utc>) {
    let now = Utc::now().timestamp_micros();
    let prev = LAST_DISCOVERY_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    let stamp = now.max(prev + 1);
    let id = NEXT_OPPORTUNITY_ID.fetch_add(1, Ordering::SeqCst);
    (id, DateTime::from_timestamp_micros(stamp).unwrap_or_else(Utc::now))
}

/// Accepts the route iff net USD profit and spread both clear their minimums.
/// A rejection is `None`, never an error.
pub fn evaluate(
    route: &TradeRoute,
    quote: &Quote,
    gas_estimate_native: U256,
    native_price_usd: Decimal,
    min_usd: Decimal,
    min_bps: i64,
) -> Option<Opportunity> {
    let input = to_signed(route.amount_in)?;
    if input <= 0 {
        return None;
    }
    let output = to_signed(quote.final_output())?;
    let gross = output - input;

    // Truncates toward zero.
    let spread_bps = i64::try_from(gross.checked_mul(10_000)? / input).ok()?;

    let gas = to_signed(gas_estimate_native)?;
    let base_price = match route.valuation {
        BaseValuation::Native => native_price_usd,
        BaseValuation::UsdPegged => Decimal::ONE,
    };
    let gross_usd = (signed_to_decimal(gross, route.base.decimals)? * base_price).round_dp(USD_DP);
    let gas_usd = (signed_to_decimal(gas, NATIVE_DECIMALS)? * native_price_usd).round_dp(USD_DP);
    let net_usd = gross_usd - gas_usd;

    if net_usd < min_usd || spread_bps < min_bps {
        return None;
    }

    let (id, discovered_at) = next_discovery();
    Some(Opportunity {
        id,
        chain: route.chain,
        route: route.clone(),
        quote: quote.clone(),
        gross_profit: gross,
        gross_profit_usd: gross_usd,
        gas_estimate_native,
        gas_cost_usd: gas_usd,
        net_profit_usd: net_usd,
        spread_bps,
        native_price_usd,
        discovered_at,
    })
}
