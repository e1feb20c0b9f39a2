//! Testing utilities: a scriptable in-memory chain client

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::amounts::parse_units;
use crate::chain::{ChainClient, SwapParams, TxReceiptSummary};
use crate::config::{contracts, ChainConfig, ChainKey, Token};
use crate::route::{Hop, HopQuote};

pub const WRAP_GAS: u64 = 45_000;
pub const APPROVE_GAS: u64 = 46_000;
pub const SWAP_GAS: u64 = 150_000;
/// Quoter gas estimate reported for every hop.
pub const QUOTE_GAS: u64 = 80_000;

pub fn weth() -> Token {
    Token::new("WETH", contracts::arbitrum::WETH, 18)
}

pub fn usdc() -> Token {
    Token::new("USDC", contracts::arbitrum::USDC, 6)
}

pub fn usdt() -> Token {
    Token::new("USDT", contracts::arbitrum::USDT, 6)
}

pub fn usdce() -> Token {
    Token::new("USDC.e", contracts::arbitrum::USDC_E, 6)
}

pub fn eth(amount: &str) -> U256 {
    parse_units(amount, 18).unwrap()
}

pub fn usd6(amount: &str) -> U256 {
    parse_units(amount, 6).unwrap()
}

pub fn test_chain(key: ChainKey) -> ChainConfig {
    let mut chain = ChainConfig::builtin(key, "http://127.0.0.1:8545".to_string(), dec!(3500));
    chain.dex.fee_tiers = vec![500, 3000];
    chain
}

/// How the mock answers a quote (or fills a swap) for one hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteRule {
    /// Same output whatever the input.
    Fixed(U256),
    /// `amount_in * num / den`.
    Rate { num: U256, den: U256 },
    Fail,
}

impl QuoteRule {
    pub fn rate(num: u64, den: u64) -> Self {
        QuoteRule::Rate {
            num: U256::from(num),
            den: U256::from(den),
        }
    }

    fn apply(&self, amount_in: U256) -> Result<U256> {
        match self {
            QuoteRule::Fixed(out) => Ok(*out),
            QuoteRule::Rate { num, den } => Ok(amount_in * *num / *den),
            QuoteRule::Fail => Err(eyre!("execution reverted: no liquidity")),
        }
    }
}

type HopKey = (Address, Address, u32);

fn hop_key(hop: &Hop) -> HopKey {
    (hop.token_in.address, hop.token_out.address, hop.fee)
}

#[derive(Debug, Default)]
struct Ledger {
    native: U256,
    tokens: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    nonce: u64,
}

impl Ledger {
    fn charge_gas(&mut self, units: u64, gas_price: u128) -> Result<U256> {
        let cost = U256::from(units) * U256::from(gas_price);
        if self.native < cost {
            return Err(eyre!("insufficient funds for gas * price + value"));
        }
        self.native -= cost;
        Ok(cost)
    }

    fn receipt(&mut self, success: bool, gas_used: u64, gas_price: u128) -> TxReceiptSummary {
        self.nonce += 1;
        TxReceiptSummary {
            tx_hash: TxHash::with_last_byte(self.nonce as u8),
            success,
            gas_used,
            effective_gas_price: gas_price,
        }
    }

    fn token(&self, token: Address) -> U256 {
        self.tokens.get(&token).copied().unwrap_or_default()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub quotes: usize,
    pub approvals: usize,
    pub swaps: usize,
    pub wraps: usize,
    pub balance_reads: usize,
}

pub struct MockChainClient {
    chain: ChainConfig,
    wallet: Address,
    chain_id: Mutex<u64>,
    gas_price: Mutex<u128>,
    native_price: Mutex<Decimal>,
    quotes: Mutex<HashMap<HopKey, QuoteRule>>,
    fills: Mutex<HashMap<HopKey, QuoteRule>>,
    ledger: Mutex<Ledger>,
    calls: Mutex<CallCounts>,
    swap_delay: Mutex<Option<Duration>>,
    revert_swap: Mutex<Option<usize>>,
    router_enforces_min: AtomicBool,
    reads_fail: AtomicBool,
}

impl MockChainClient {
    pub fn new(chain: ChainConfig) -> Self {
        Self {
            chain_id: Mutex::new(chain.chain_id),
            chain,
            wallet: Address::repeat_byte(0xAA),
            gas_price: Mutex::new(100_000_000),
            native_price: Mutex::new(dec!(3500)),
            quotes: Mutex::new(HashMap::new()),
            fills: Mutex::new(HashMap::new()),
            ledger: Mutex::new(Ledger::default()),
            calls: Mutex::new(CallCounts::default()),
            swap_delay: Mutex::new(None),
            revert_swap: Mutex::new(None),
            router_enforces_min: AtomicBool::new(true),
            reads_fail: AtomicBool::new(false),
        }
    }

    pub fn arbitrum() -> Self {
        Self::new(test_chain(ChainKey::Arbitrum))
    }

    /// Chain id the endpoint reports, e.g. after an RPC URL points at the wrong network.
    pub fn set_chain_id(&self, id: u64) {
        *self.chain_id.lock() = id;
    }

    pub fn set_gas_price(&self, wei: u128) {
        *self.gas_price.lock() = wei;
    }

    pub fn set_native_price(&self, usd: Decimal) {
        *self.native_price.lock() = usd;
    }

    pub fn set_quote(&self, token_in: Token, token_out: Token, fee: u32, rule: QuoteRule) {
        self.quotes
            .lock()
            .insert((token_in.address, token_out.address, fee), rule);
    }

    /// Actual swap fill, when it should differ from the quote.
    pub fn set_fill(&self, token_in: Token, token_out: Token, fee: u32, rule: QuoteRule) {
        self.fills
            .lock()
            .insert((token_in.address, token_out.address, fee), rule);
    }

    pub fn set_native_balance(&self, amount: U256) {
        self.ledger.lock().native = amount;
    }

    pub fn set_token_balance(&self, token: Token, amount: U256) {
        self.ledger.lock().tokens.insert(token.address, amount);
    }

    pub fn set_allowance(&self, token: Token, spender: Address, amount: U256) {
        self.ledger.lock().allowances.insert((token.address, spender), amount);
    }

    pub fn set_swap_delay(&self, delay: Duration) {
        *self.swap_delay.lock() = Some(delay);
    }

    /// The `n`th swap (1-based) is mined but reverts.
    pub fn revert_swap(&self, n: usize) {
        *self.revert_swap.lock() = Some(n);
    }

    /// When false the router fills below `amount_out_min` instead of reverting.
    pub fn set_router_enforces_min(&self, enforce: bool) {
        self.router_enforces_min.store(enforce, Ordering::SeqCst);
    }

    pub fn set_reads_fail(&self, fail: bool) {
        self.reads_fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        *self.calls.lock()
    }

    pub fn held(&self, token: Token) -> U256 {
        self.ledger.lock().token(token.address)
    }

    pub fn native(&self) -> U256 {
        self.ledger.lock().native
    }

    fn check_reads(&self) -> Result<()> {
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(eyre!("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    fn wallet(&self) -> Address {
        self.wallet
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256> {
        self.check_reads()?;
        self.calls.lock().balance_reads += 1;
        Ok(self.ledger.lock().native)
    }

    async fn token_balance(&self, _owner: Address, token: Address) -> Result<U256> {
        self.check_reads()?;
        self.calls.lock().balance_reads += 1;
        Ok(self.ledger.lock().token(token))
    }

    async fn fee_price(&self) -> Result<u128> {
        self.check_reads()?;
        Ok(*self.gas_price.lock())
    }

    async fn native_price_usd(&self) -> Result<Decimal> {
        self.check_reads()?;
        Ok(*self.native_price.lock())
    }

    async fn chain_id(&self) -> Result<u64> {
        self.check_reads()?;
        Ok(*self.chain_id.lock())
    }

    async fn quote(&self, hop: &Hop, amount_in: U256) -> Result<HopQuote> {
        self.check_reads()?;
        self.calls.lock().quotes += 1;
        let rule = self
            .quotes
            .lock()
            .get(&hop_key(hop))
            .copied()
            .ok_or_else(|| eyre!("execution reverted: pool does not exist"))?;
        Ok(HopQuote {
            gas_estimate: QUOTE_GAS,
            ticks_crossed: 1,
            ..HopQuote::output(rule.apply(amount_in)?)
        })
    }

    async fn allowance(&self, _owner: Address, spender: Address, token: Address) -> Result<U256> {
        self.check_reads()?;
        Ok(self
            .ledger
            .lock()
            .allowances
            .get(&(token, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(&self, spender: Address, token: Address, amount: U256) -> Result<TxReceiptSummary> {
        self.calls.lock().approvals += 1;
        let gas_price = *self.gas_price.lock();
        let mut ledger = self.ledger.lock();
        ledger.charge_gas(APPROVE_GAS, gas_price)?;
        ledger.allowances.insert((token, spender), amount);
        Ok(ledger.receipt(true, APPROVE_GAS, gas_price))
    }

    async fn swap(&self, params: &SwapParams) -> Result<TxReceiptSummary> {
        let delay = *self.swap_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let swap_no = {
            let mut calls = self.calls.lock();
            calls.swaps += 1;
            calls.swaps
        };
        let key = hop_key(&params.hop);
        let rule = self
            .fills
            .lock()
            .get(&key)
            .copied()
            .or_else(|| self.quotes.lock().get(&key).copied())
            .ok_or_else(|| eyre!("execution reverted: pool does not exist"))?;
        let gas_price = *self.gas_price.lock();
        let forced_revert = *self.revert_swap.lock() == Some(swap_no);
        let enforce_min = self.router_enforces_min.load(Ordering::SeqCst);

        let mut ledger = self.ledger.lock();
        let (token_in, token_out) = (params.hop.token_in.address, params.hop.token_out.address);

        let allowance = ledger
            .allowances
            .get(&(token_in, self.chain.dex.router))
            .copied()
            .unwrap_or_default();
        if allowance < params.amount_in {
            return Err(eyre!("execution reverted: STF"));
        }
        if ledger.token(token_in) < params.amount_in {
            return Err(eyre!("execution reverted: transfer amount exceeds balance"));
        }
        ledger.charge_gas(SWAP_GAS, gas_price)?;

        let out = rule.apply(params.amount_in)?;
        if forced_revert || (enforce_min && out < params.amount_out_min) {
            return Ok(ledger.receipt(false, SWAP_GAS, gas_price));
        }

        let held_in = ledger.token(token_in);
        ledger.tokens.insert(token_in, held_in - params.amount_in);
        let held_out = ledger.token(token_out);
        ledger.tokens.insert(token_out, held_out + out);
        Ok(ledger.receipt(true, SWAP_GAS, gas_price))
    }

    async fn wrap_native(&self, amount: U256) -> Result<TxReceiptSummary> {
        self.calls.lock().wraps += 1;
        let gas_price = *self.gas_price.lock();
        let weth = self.chain.tokens.wrapped_native.address;
        let mut ledger = self.ledger.lock();

        let cost = U256::from(WRAP_GAS) * U256::from(gas_price);
        if ledger.native < amount + cost {
            return Err(eyre!("insufficient funds for gas * price + value"));
        }
        ledger.charge_gas(WRAP_GAS, gas_price)?;
        ledger.native -= amount;
        let held = ledger.token(weth);
        ledger.tokens.insert(weth, held + amount);
        Ok(ledger.receipt(true, WRAP_GAS, gas_price))
    }
}
