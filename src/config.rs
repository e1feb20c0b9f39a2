//! Engine configuration
//!
//! Chain descriptors are built in (addresses below). Everything tunable comes
//! from the environment, optionally seeded from `.env`. The config is validated
//! once at startup and is immutable afterwards.

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::amounts::decimal_to_units;
use crate::error::{ConfigError, ControlError};
use crate::route::Strategy;

/// Canonical contract addresses per network.
pub mod contracts {
    pub mod base {
        use alloy::primitives::{address, Address};

        pub const CHAIN_ID: u64 = 8453;
        pub const WETH: Address = address!("4200000000000000000000000000000000000006");
        pub const USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
        pub const USDBC: Address = address!("d9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA");
        pub const DAI: Address = address!("50c5725949A6F0c72E6C4a641F24049A917DB0Cb");

        // Uniswap V3
        pub const QUOTER_V2: Address = address!("3d4e44Eb1374240CE5F1B871ab261CD16335B76a");
        pub const SWAP_ROUTER_02: Address = address!("2626664c2603336E57B271c5C0b26F421741e481");

        // Chainlink ETH / USD
        pub const ETH_USD_FEED: Address = address!("71041dddad3595F9CEd3DcCFBe3D1F4b0a16Bb70");
    }

    pub mod arbitrum {
        use alloy::primitives::{address, Address};

        pub const CHAIN_ID: u64 = 42161;
        pub const WETH: Address = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");
        pub const USDC: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");
        pub const USDC_E: Address = address!("FF970A61A04b1cA14834A43f5dE4533eBDDB5CC8");
        pub const USDT: Address = address!("Fd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9");

        pub const QUOTER_V2: Address = address!("61fFE014bA17989E743c5F6cB21bF9697530B21e");
        pub const SWAP_ROUTER_02: Address = address!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45");

        pub const ETH_USD_FEED: Address = address!("639Fe6ab55C921f74e7fac1ee960C0B6293ba612");
    }

    pub mod optimism {
        use alloy::primitives::{address, Address};

        pub const CHAIN_ID: u64 = 10;
        pub const WETH: Address = address!("4200000000000000000000000000000000000006");
        pub const USDC: Address = address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85");
        pub const USDC_E: Address = address!("7F5c764cBc14f9669B88837ca1490cCa17c31607");
        pub const DAI: Address = address!("DA10009cBd5D07dd0CeCc66161FC93D7c9000da1");

        pub const QUOTER_V2: Address = address!("61fFE014bA17989E743c5F6cB21bF9697530B21e");
        pub const SWAP_ROUTER_02: Address = address!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45");

        pub const ETH_USD_FEED: Address = address!("13e3Ee699D1909E989722E753853AE30b17e08c5");
    }
}

pub const DEFAULT_FEE_TIERS: [u32; 3] = [100, 500, 3000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKey {
    Base,
    Arbitrum,
    Optimism,
}

impl ChainKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainKey::Base => "base",
            ChainKey::Arbitrum => "arbitrum",
            ChainKey::Optimism => "optimism",
        }
    }

    fn rpc_env_key(&self) -> &'static str {
        match self {
            ChainKey::Base => "RPC_BASE",
            ChainKey::Arbitrum => "RPC_ARBITRUM",
            ChainKey::Optimism => "RPC_OPTIMISM",
        }
    }

    fn default_rpc(&self) -> &'static str {
        match self {
            ChainKey::Base => "https://mainnet.base.org",
            ChainKey::Arbitrum => "https://arb1.arbitrum.io/rpc",
            ChainKey::Optimism => "https://mainnet.optimism.io",
        }
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(ChainKey::Base),
            "arbitrum" | "arb" => Ok(ChainKey::Arbitrum),
            "optimism" | "op" => Ok(ChainKey::Optimism),
            other => Err(ConfigError::UnknownChain(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Token {
    pub symbol: &'static str,
    pub address: Address,
    pub decimals: u8,
}

impl Token {
    pub const fn new(symbol: &'static str, address: Address, decimals: u8) -> Self {
        Self { symbol, address, decimals }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub wrapped_native: Token,
    pub stable: Token,
    /// Third leg for A -> B -> C -> A routes.
    pub third: Option<Token>,
    /// Bridged twin of `stable` for stablecoin round-trips.
    pub bridged_stable: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexConfig {
    pub name: &'static str,
    pub quoter: Address,
    pub router: Address,
    pub fee_tiers: Vec<u32>,
    pub triangular_fees: [u32; 3],
    pub stable_fees: (u32, u32),
}

/// Static per-network descriptor. One per supported chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub key: ChainKey,
    pub chain_id: u64,
    pub rpc_url: String,
    pub native_symbol: &'static str,
    pub tokens: TokenSet,
    pub dex: DexConfig,
    /// Chainlink aggregator for native / USD.
    pub price_feed: Address,
    pub native_price_fallback_usd: Decimal,
}

impl ChainConfig {
    pub fn builtin(key: ChainKey, rpc_url: String, fallback_usd: Decimal) -> Self {
        use contracts::{arbitrum, base, optimism};

        match key {
            ChainKey::Base => Self {
                key,
                chain_id: base::CHAIN_ID,
                rpc_url,
                native_symbol: "ETH",
                tokens: TokenSet {
                    wrapped_native: Token::new("WETH", base::WETH, 18),
                    stable: Token::new("USDC", base::USDC, 6),
                    third: Some(Token::new("DAI", base::DAI, 18)),
                    bridged_stable: Some(Token::new("USDbC", base::USDBC, 6)),
                },
                dex: DexConfig {
                    name: "Uniswap V3",
                    quoter: base::QUOTER_V2,
                    router: base::SWAP_ROUTER_02,
                    fee_tiers: DEFAULT_FEE_TIERS.to_vec(),
                    triangular_fees: [500, 100, 500],
                    stable_fees: (100, 500),
                },
                price_feed: base::ETH_USD_FEED,
                native_price_fallback_usd: fallback_usd,
            },
            ChainKey::Arbitrum => Self {
                key,
                chain_id: arbitrum::CHAIN_ID,
                rpc_url,
                native_symbol: "ETH",
                tokens: TokenSet {
                    wrapped_native: Token::new("WETH", arbitrum::WETH, 18),
                    stable: Token::new("USDC", arbitrum::USDC, 6),
                    third: Some(Token::new("USDT", arbitrum::USDT, 6)),
                    bridged_stable: Some(Token::new("USDC.e", arbitrum::USDC_E, 6)),
                },
                dex: DexConfig {
                    name: "Uniswap V3",
                    quoter: arbitrum::QUOTER_V2,
                    router: arbitrum::SWAP_ROUTER_02,
                    fee_tiers: DEFAULT_FEE_TIERS.to_vec(),
                    triangular_fees: [500, 100, 500],
                    stable_fees: (100, 500),
                },
                price_feed: arbitrum::ETH_USD_FEED,
                native_price_fallback_usd: fallback_usd,
            },
            ChainKey::Optimism => Self {
                key,
                chain_id: optimism::CHAIN_ID,
                rpc_url,
                native_symbol: "ETH",
                tokens: TokenSet {
                    wrapped_native: Token::new("WETH", optimism::WETH, 18),
                    stable: Token::new("USDC", optimism::USDC, 6),
                    third: Some(Token::new("DAI", optimism::DAI, 18)),
                    bridged_stable: Some(Token::new("USDC.e", optimism::USDC_E, 6)),
                },
                dex: DexConfig {
                    name: "Uniswap V3",
                    quoter: optimism::QUOTER_V2,
                    router: optimism::SWAP_ROUTER_02,
                    fee_tiers: DEFAULT_FEE_TIERS.to_vec(),
                    triangular_fees: [500, 100, 500],
                    stable_fees: (100, 500),
                },
                price_feed: optimism::ETH_USD_FEED,
                native_price_fallback_usd: fallback_usd,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let key = format!("{} fee tiers", self.key);
        let distinct: HashSet<u32> = self.dex.fee_tiers.iter().copied().collect();
        if distinct.len() < 2 {
            return Err(ConfigError::invalid(&key, "need at least two distinct fee tiers"));
        }
        if distinct.len() != self.dex.fee_tiers.len() {
            return Err(ConfigError::invalid(&key, "duplicate fee tier"));
        }
        if self.dex.fee_tiers.iter().any(|f| *f == 0 || *f >= 1_000_000) {
            return Err(ConfigError::invalid(&key, "fee tier out of range"));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Missing(self.key.rpc_env_key().to_string()));
        }
        if reqwest::Url::parse(&self.rpc_url).is_err() {
            return Err(ConfigError::invalid(self.key.rpc_env_key(), "not a valid URL"));
        }
        Ok(())
    }
}

/// Strategy enable flags consulted by the scanner before building routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyFlags {
    pub intra_dex: bool,
    pub triangular: bool,
    pub stablecoin: bool,
    /// Placeholders. Never enabled.
    pub flash_loan: bool,
    pub mev: bool,
}

impl Default for StrategyFlags {
    fn default() -> Self {
        Self {
            intra_dex: true,
            triangular: true,
            stablecoin: true,
            flash_loan: false,
            mev: false,
        }
    }
}

impl StrategyFlags {
    pub fn none() -> Self {
        Self {
            intra_dex: false,
            triangular: false,
            stablecoin: false,
            flash_loan: false,
            mev: false,
        }
    }

    pub fn is_enabled(&self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::IntraDex => self.intra_dex,
            Strategy::Triangular => self.triangular,
            Strategy::Stablecoin => self.stablecoin,
        }
    }

    pub fn set(&mut self, name: &str, enabled: bool) -> Result<(), ControlError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "intra-dex" | "intradex" | "intra_dex" => self.intra_dex = enabled,
            "triangular" => self.triangular = enabled,
            "stablecoin" | "stable" => self.stablecoin = enabled,
            "flash-loan" | "flashloan" | "mev" if enabled => {
                return Err(ControlError::StrategyUnavailable(name.to_string()))
            }
            "flash-loan" | "flashloan" => self.flash_loan = false,
            "mev" => self.mev = false,
            _ => return Err(ControlError::UnknownStrategy(name.to_string())),
        }
        Ok(())
    }

    fn parse_list(list: &str) -> Result<Self, ConfigError> {
        let mut flags = Self::none();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            flags
                .set(name, true)
                .map_err(|e| ConfigError::invalid("STRATEGIES", e))?;
        }
        Ok(flags)
    }
}

/// Per-operation gas units. Two-leg routes cost wrap + 2 approvals + 2 swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasUnits {
    pub wrap: u64,
    pub approve: u64,
    pub swap: u64,
}

impl Default for GasUnits {
    fn default() -> Self {
        Self {
            wrap: 45_000,
            approve: 46_000,
            swap: 150_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasSettings {
    pub units: GasUnits,
    /// Safety buffer applied on top of units * gas price.
    pub buffer: Decimal,
    pub triangular_multiplier: Decimal,
    pub stablecoin_multiplier: Decimal,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            units: GasUnits::default(),
            buffer: dec!(1.5),
            triangular_multiplier: dec!(1.5),
            stablecoin_multiplier: dec!(0.5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub chains: Vec<ChainConfig>,
    pub signer: Option<PrivateKeySigner>,
    pub wallet_address: Option<Address>,
    pub tick_interval: Duration,
    pub min_profit_usd: Decimal,
    pub min_profit_bps: i64,
    pub max_slippage_bps: u32,
    pub gas: GasSettings,
    /// Native-token trade sizes, human units.
    pub trade_sizes: Vec<Decimal>,
    /// Stablecoin round-trip size, human units.
    pub stable_trade_size: Decimal,
    pub deadline: Duration,
    pub confirmation_timeout: Duration,
    pub max_opportunity_age: Duration,
    pub balance_refresh_ticks: u64,
    pub trade_log_capacity: usize,
    pub opportunity_history: usize,
    pub quote_concurrency: usize,
    pub strategies: StrategyFlags,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let fallback = dec!(3500);
        Self {
            chains: [ChainKey::Base, ChainKey::Arbitrum, ChainKey::Optimism]
                .into_iter()
                .map(|k| ChainConfig::builtin(k, k.default_rpc().to_string(), fallback))
                .collect(),
            signer: None,
            wallet_address: None,
            tick_interval: Duration::from_millis(2000),
            min_profit_usd: dec!(0.10),
            min_profit_bps: 10,
            max_slippage_bps: 50,
            gas: GasSettings::default(),
            trade_sizes: vec![dec!(0.005), dec!(0.01), dec!(0.02)],
            stable_trade_size: dec!(100),
            deadline: Duration::from_secs(60),
            confirmation_timeout: Duration::from_secs(60),
            max_opportunity_age: Duration::from_millis(10_000),
            balance_refresh_ticks: 30,
            trade_log_capacity: 100,
            opportunity_history: 20,
            quote_concurrency: 8,
            strategies: StrategyFlags::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let fallback: Decimal = parse_or(&get, "NATIVE_PRICE_FALLBACK_USD", dec!(3500))?;
        let fee_tiers = match get("FEE_TIERS") {
            Some(list) => parse_list::<u32>("FEE_TIERS", &list)?,
            None => DEFAULT_FEE_TIERS.to_vec(),
        };

        let chain_list = get("ARB_CHAINS").unwrap_or_else(|| "base,arbitrum,optimism".to_string());
        let mut seen = HashSet::new();
        let mut chains = Vec::new();
        for name in chain_list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let key = ChainKey::from_str(name)?;
            if !seen.insert(key) {
                return Err(ConfigError::DuplicateChain(key.to_string()));
            }
            let rpc = get(key.rpc_env_key()).unwrap_or_else(|| key.default_rpc().to_string());
            let mut chain = ChainConfig::builtin(key, rpc, fallback);
            chain.dex.fee_tiers = fee_tiers.clone();
            chains.push(chain);
        }

        let signer = match get("PRIVATE_KEY") {
            Some(key) => Some(
                PrivateKeySigner::from_str(&key)
                    .map_err(|_| ConfigError::invalid("PRIVATE_KEY", "not a valid secp256k1 key"))?,
            ),
            None => None,
        };
        let wallet_address = match get("WALLET_ADDRESS") {
            Some(addr) => Some(
                Address::from_str(&addr).map_err(|e| ConfigError::invalid("WALLET_ADDRESS", e))?,
            ),
            None => signer.as_ref().map(|s| s.address()),
        };

        let trade_sizes = match get("TRADE_SIZES") {
            Some(list) => parse_list::<Decimal>("TRADE_SIZES", &list)?,
            None => defaults.trade_sizes.clone(),
        };
        let strategies = match get("STRATEGIES") {
            Some(list) => StrategyFlags::parse_list(&list)?,
            None => defaults.strategies,
        };

        let config = Self {
            chains,
            signer,
            wallet_address,
            tick_interval: Duration::from_millis(parse_or(&get, "TICK_MS", 2000u64)?),
            min_profit_usd: parse_or(&get, "MIN_PROFIT_USD", defaults.min_profit_usd)?,
            min_profit_bps: parse_or(&get, "MIN_PROFIT_BPS", defaults.min_profit_bps)?,
            max_slippage_bps: parse_or(&get, "MAX_SLIPPAGE_BPS", defaults.max_slippage_bps)?,
            gas: GasSettings {
                units: GasUnits::default(),
                buffer: parse_or(&get, "GAS_BUFFER", defaults.gas.buffer)?,
                triangular_multiplier: parse_or(
                    &get,
                    "TRIANGULAR_GAS_MULT",
                    defaults.gas.triangular_multiplier,
                )?,
                stablecoin_multiplier: parse_or(
                    &get,
                    "STABLECOIN_GAS_MULT",
                    defaults.gas.stablecoin_multiplier,
                )?,
            },
            trade_sizes,
            stable_trade_size: parse_or(&get, "STABLE_TRADE_SIZE", defaults.stable_trade_size)?,
            deadline: Duration::from_secs(parse_or(&get, "DEADLINE_SECONDS", 60u64)?),
            confirmation_timeout: Duration::from_secs(parse_or(
                &get,
                "CONFIRMATION_TIMEOUT_SECS",
                60u64,
            )?),
            max_opportunity_age: Duration::from_millis(parse_or(
                &get,
                "MAX_OPPORTUNITY_AGE_MS",
                10_000u64,
            )?),
            balance_refresh_ticks: parse_or(&get, "BALANCE_REFRESH_TICKS", defaults.balance_refresh_ticks)?,
            trade_log_capacity: parse_or(&get, "TRADE_LOG_CAPACITY", defaults.trade_log_capacity)?,
            opportunity_history: parse_or(&get, "OPPORTUNITY_HISTORY", defaults.opportunity_history)?,
            quote_concurrency: parse_or(&get, "QUOTE_CONCURRENCY", defaults.quote_concurrency)?,
            strategies,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::NoChains);
        }
        for chain in &self.chains {
            chain.validate()?;
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::invalid("TICK_MS", "must be greater than zero"));
        }
        if self.min_profit_usd.is_sign_negative() {
            return Err(ConfigError::invalid("MIN_PROFIT_USD", "must not be negative"));
        }
        if self.min_profit_bps < 0 {
            return Err(ConfigError::invalid("MIN_PROFIT_BPS", "must not be negative"));
        }
        if self.max_slippage_bps >= 10_000 {
            return Err(ConfigError::invalid("MAX_SLIPPAGE_BPS", "must be below 10000"));
        }
        if self.gas.buffer < Decimal::ONE {
            return Err(ConfigError::invalid("GAS_BUFFER", "must be at least 1.0"));
        }
        if self.gas.triangular_multiplier <= Decimal::ZERO {
            return Err(ConfigError::invalid("TRIANGULAR_GAS_MULT", "must be positive"));
        }
        if self.gas.stablecoin_multiplier <= Decimal::ZERO {
            return Err(ConfigError::invalid("STABLECOIN_GAS_MULT", "must be positive"));
        }
        if self.trade_sizes.is_empty() {
            return Err(ConfigError::invalid("TRADE_SIZES", "at least one size is required"));
        }
        if self.trade_sizes.iter().any(|s| *s <= Decimal::ZERO) {
            return Err(ConfigError::invalid("TRADE_SIZES", "sizes must be positive"));
        }
        if self.stable_trade_size <= Decimal::ZERO {
            return Err(ConfigError::invalid("STABLE_TRADE_SIZE", "must be positive"));
        }
        for chain in &self.chains {
            let tokens = &chain.tokens;
            for size in &self.trade_sizes {
                check_base_units("TRADE_SIZES", *size, tokens.wrapped_native.decimals)?;
            }
            check_base_units("STABLE_TRADE_SIZE", self.stable_trade_size, tokens.stable.decimals)?;
        }
        if self.trade_log_capacity == 0 {
            return Err(ConfigError::invalid("TRADE_LOG_CAPACITY", "must be greater than zero"));
        }
        if self.balance_refresh_ticks == 0 {
            return Err(ConfigError::invalid("BALANCE_REFRESH_TICKS", "must be greater than zero"));
        }
        if self.quote_concurrency == 0 {
            return Err(ConfigError::invalid("QUOTE_CONCURRENCY", "must be greater than zero"));
        }
        if self.confirmation_timeout.is_zero() {
            return Err(ConfigError::invalid("CONFIRMATION_TIMEOUT_SECS", "must be greater than zero"));
        }
        Ok(())
    }

    /// Signer for live trading. Missing key is fatal.
    pub fn require_signer(&self) -> Result<&PrivateKeySigner, ConfigError> {
        self.signer
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("PRIVATE_KEY".to_string()))
    }

    pub fn require_wallet(&self) -> Result<Address, ConfigError> {
        self.wallet_address
            .ok_or_else(|| ConfigError::Missing("PRIVATE_KEY or WALLET_ADDRESS".to_string()))
    }

    pub fn chain(&self, key: ChainKey) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.key == key)
    }

    /// Native trade sizes in wei. `validate` has already rejected sizes
    /// that do not convert at any configured chain's decimals.
    pub fn trade_sizes_wei(&self, decimals: u8) -> Vec<U256> {
        self.trade_sizes
            .iter()
            .filter_map(|size| decimal_to_units(*size, decimals).ok())
            .collect()
    }

    pub fn deadline_secs(&self) -> u64 {
        self.deadline.as_secs()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::invalid(key, e)),
        None => Ok(default),
    }
}

/// A size must convert to a non-zero amount of base units.
fn check_base_units(key: &str, size: Decimal, decimals: u8) -> Result<(), ConfigError> {
    match decimal_to_units(size, decimals) {
        Ok(units) if units.is_zero() => Err(ConfigError::invalid(
            key,
            format!("{} is below one base unit at {} decimals", size, decimals),
        )),
        Ok(_) => Ok(()),
        Err(e) => Err(ConfigError::invalid(key, e)),
    }
}

fn parse_list<T>(key: &str, raw: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|e| ConfigError::invalid(key, e)))
        .collect()
}
