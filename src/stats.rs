//! Engine counters and the trade log
//!
//! Both live inside `EngineState` and are only mutated by the scheduler and
//! the execution engine.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

use crate::executor::{ExecutionResult, ExecutionStatus};
use crate::route::Strategy;
use crate::scanner::ScanReport;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_scans: u64,
    pub scan_errors: u64,
    pub opportunities_found: u64,
    pub trades_attempted: u64,
    /// Attempts that got past the guards and touched the chain.
    pub trades_executed: u64,
    pub trades_succeeded: u64,
    pub trades_failed: u64,
    pub trades_skipped: u64,
    /// Sum of realized profit (negative when losing).
    pub total_profit_usd: Decimal,
    pub total_gas_usd: Decimal,
    pub last_scan_latency_ms: u64,
    pub quote_skips: BTreeMap<Strategy, u64>,
}

impl EngineStats {
    pub fn record_scan(&mut self, report: &ScanReport) {
        self.opportunities_found += report.opportunities.len() as u64;
        self.last_scan_latency_ms = report.latency_ms;
        for (strategy, n) in &report.quote_skips {
            *self.quote_skips.entry(*strategy).or_insert(0) += n;
        }
    }

    pub fn record_execution(&mut self, result: &ExecutionResult) {
        self.trades_attempted += 1;
        match result.status {
            ExecutionStatus::Skipped => {
                self.trades_skipped += 1;
                return;
            }
            ExecutionStatus::Success => self.trades_succeeded += 1,
            ExecutionStatus::Failed => self.trades_failed += 1,
        }
        self.trades_executed += 1;
        self.total_gas_usd += result.gas_cost_usd;
        if let Some(realized) = result.realized_profit_usd {
            self.total_profit_usd += realized;
        }
    }

    /// Succeeded / executed, as a percentage.
    pub fn win_rate(&self) -> Option<Decimal> {
        if self.trades_executed == 0 {
            return None;
        }
        Some(
            (Decimal::from(self.trades_succeeded) * Decimal::ONE_HUNDRED
                / Decimal::from(self.trades_executed))
            .round_dp(2),
        )
    }
}

/// Bounded log of execution results, newest first.
#[derive(Debug, Clone)]
pub struct TradeLog {
    entries: VecDeque<ExecutionResult>,
    capacity: usize,
}

impl TradeLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Adds a result, evicting the oldest entry when full.
    pub fn push(&mut self, result: ExecutionResult) {
        self.entries.push_front(result);
        self.entries.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&ExecutionResult> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
