//! Multi-chain DEX arbitrage scanner and serialized execution engine.

pub mod amounts;
pub mod chain;
pub mod config;
pub mod control;
pub mod error;
pub mod executor;
pub mod profit;
pub mod quote;
pub mod report;
pub mod route;
pub mod scanner;
pub mod scheduler;
pub mod state;
pub mod stats;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use control::ArbEngine;
pub use error::{ConfigError, ControlError, ExecutionError, QuoteUnavailable, SkipReason};
