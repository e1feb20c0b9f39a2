//! Error taxonomy for the scanner and execution engine.
//!
//! Per-route and per-execution failures are converted into these types at the
//! component boundary. Only `ConfigError` is allowed to reach process exit.

use alloy::primitives::{TxHash, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A route could not be priced this cycle. Recovered by the scanner.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuoteUnavailable {
    #[error("hop {hop}: quote call failed: {reason}")]
    CallFailed { hop: usize, reason: String },

    #[error("hop {hop}: quoter returned zero output")]
    ZeroOutput { hop: usize },
}

/// Why a found opportunity was not executed. Not a failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SkipReason {
    #[error("another execution is in flight")]
    ExecutionInFlight,

    #[error("net profit ${net} is below the ${min} minimum")]
    MarginBelowMinimum { net: Decimal, min: Decimal },

    #[error("opportunity is {age_ms}ms old (limit {max_ms}ms)")]
    Stale { age_ms: i64, max_ms: u64 },
}

/// Position in the execution state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "leg", rename_all = "camelCase")]
pub enum ExecutionStep {
    BalanceSnapshot,
    WrapNative,
    EnsureAllowance(usize),
    SwapLeg(usize),
    BalanceReconcile,
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStep::BalanceSnapshot => write!(f, "BalanceSnapshot"),
            ExecutionStep::WrapNative => write!(f, "WrapNative"),
            ExecutionStep::EnsureAllowance(leg) => write!(f, "EnsureAllowance(leg{})", leg),
            ExecutionStep::SwapLeg(leg) => write!(f, "SwapLeg{}", leg),
            ExecutionStep::BalanceReconcile => write!(f, "BalanceReconcile"),
        }
    }
}

/// Terminal failure of an execution attempt. No retry, no unwind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("{step}: transaction {tx_hash} reverted")]
    Reverted { step: ExecutionStep, tx_hash: TxHash },

    #[error("{step}: no confirmation within {timeout_ms}ms")]
    Timeout { step: ExecutionStep, timeout_ms: u64 },

    #[error("{step}: received {received} below slippage floor {floor}")]
    SlippageFloor {
        step: ExecutionStep,
        received: U256,
        floor: U256,
    },

    #[error("{step}: {message}")]
    Chain { step: ExecutionStep, message: String },
}

impl ExecutionError {
    pub fn step(&self) -> ExecutionStep {
        match self {
            ExecutionError::Reverted { step, .. }
            | ExecutionError::Timeout { step, .. }
            | ExecutionError::SlippageFloor { step, .. }
            | ExecutionError::Chain { step, .. } => *step,
        }
    }

    pub(crate) fn chain(step: ExecutionStep, err: eyre::Report) -> Self {
        ExecutionError::Chain {
            step,
            message: format!("{:#}", err),
        }
    }
}

/// Startup configuration problems. The process refuses to start.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),

    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("unknown chain '{0}' (expected base, arbitrum or optimism)")]
    UnknownChain(String),

    #[error("chain '{0}' listed more than once")]
    DuplicateChain(String),

    #[error("no chains configured")]
    NoChains,
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Rejections from the control surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("engine is already running")]
    AlreadyRunning,

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("strategy '{0}' is a placeholder and cannot be enabled")]
    StrategyUnavailable(String),
}
