//! Process-wide engine state
//!
//! Written only by the scheduler and the execution engine. Readers get an
//! `EngineSnapshot`, a deep copy, never a live reference.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::amounts::serde_dec;
use crate::config::{ChainKey, EngineConfig, StrategyFlags};
use crate::error::ControlError;
use crate::executor::ExecutionResult;
use crate::profit::Opportunity;
use crate::scanner::ScanReport;
use crate::stats::{EngineStats, TradeLog};

/// Single in-flight execution guard.
#[derive(Debug, Default)]
pub struct ExecutionLock {
    held: AtomicBool,
}

impl ExecutionLock {
    pub fn try_acquire(&self) -> Option<ExecutionGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ExecutionGuard { held: &self.held })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Releases the lock on drop, whatever path the attempt took.
#[derive(Debug)]
pub struct ExecutionGuard<'a> {
    held: &'a AtomicBool,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

/// Cached per-chain wallet view, refreshed by the housekeeping task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub chain: ChainKey,
    pub live: bool,
    pub wallet: Address,
    #[serde(serialize_with = "serde_dec::u256")]
    pub native_balance: U256,
    #[serde(serialize_with = "serde_dec::u256")]
    pub wrapped_balance: U256,
    #[serde(serialize_with = "serde_dec::u256")]
    pub stable_balance: U256,
    pub native_price_usd: Option<Decimal>,
    pub balance_usd: Option<Decimal>,
    pub updated_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ChainStatus {
    pub fn new(chain: ChainKey, live: bool, wallet: Address) -> Self {
        Self {
            chain,
            live,
            wallet,
            native_balance: U256::ZERO,
            wrapped_balance: U256::ZERO,
            stable_balance: U256::ZERO,
            native_price_usd: None,
            balance_usd: None,
            updated_at: None,
            error: None,
        }
    }
}

#[derive(Debug)]
struct Inner {
    stats: EngineStats,
    trade_log: TradeLog,
    opportunities: Vec<Opportunity>,
    best_today: Option<Opportunity>,
    strategies: StrategyFlags,
    min_profit_usd: Decimal,
    started_at: Option<DateTime<Utc>>,
    current_chain: Option<ChainKey>,
}

pub struct EngineState {
    running: AtomicBool,
    dry_run: AtomicBool,
    execution: ExecutionLock,
    inner: RwLock<Inner>,
    chains: DashMap<ChainKey, ChainStatus>,
    opportunity_history: usize,
}

/// Serializable copy of the whole state for the status surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub running: bool,
    pub dry_run: bool,
    pub is_executing: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub current_chain: Option<ChainKey>,
    pub strategies: StrategyFlags,
    pub min_profit_usd: Decimal,
    pub stats: EngineStats,
    pub win_rate: Option<Decimal>,
    pub chains: Vec<ChainStatus>,
    pub best_today: Option<Opportunity>,
    pub opportunities: Vec<Opportunity>,
    pub trade_log: Vec<ExecutionResult>,
    /// Error of the most recent trade-log entry.
    pub last_error: Option<String>,
}

impl EngineState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            running: AtomicBool::new(false),
            dry_run: AtomicBool::new(true),
            execution: ExecutionLock::default(),
            inner: RwLock::new(Inner {
                stats: EngineStats::default(),
                trade_log: TradeLog::new(config.trade_log_capacity),
                opportunities: Vec::new(),
                best_today: None,
                strategies: config.strategies,
                min_profit_usd: config.min_profit_usd,
                started_at: None,
                current_chain: None,
            }),
            chains: DashMap::new(),
            opportunity_history: config.opportunity_history,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::Acquire)
    }

    pub fn is_executing(&self) -> bool {
        self.execution.is_held()
    }

    pub fn execution_lock(&self) -> &ExecutionLock {
        &self.execution
    }

    /// Fresh run: clears counters, logs and opportunities. Strategy flags,
    /// thresholds and chain status survive.
    pub fn reset(&self, dry_run: bool) {
        let mut inner = self.inner.write();
        inner.stats = EngineStats::default();
        inner.trade_log.clear();
        inner.opportunities.clear();
        inner.best_today = None;
        inner.current_chain = None;
        inner.started_at = Some(Utc::now());
        self.dry_run.store(dry_run, Ordering::Release);
    }

    /// Increments and returns the scan counter.
    pub fn begin_scan(&self, chain: ChainKey) -> u64 {
        let mut inner = self.inner.write();
        inner.stats.total_scans += 1;
        inner.current_chain = Some(chain);
        inner.stats.total_scans
    }

    pub fn total_scans(&self) -> u64 {
        self.inner.read().stats.total_scans
    }

    pub fn record_scan(&self, report: &ScanReport) {
        let mut inner = self.inner.write();
        inner.stats.record_scan(report);
        if report.opportunities.is_empty() {
            return;
        }

        let mut recent: Vec<Opportunity> = report.opportunities.clone();
        recent.extend(inner.opportunities.drain(..));
        recent.truncate(self.opportunity_history);
        inner.opportunities = recent;

        if let Some(best) = report.best() {
            let today = Utc::now().date_naive();
            let replace = match &inner.best_today {
                Some(current) => {
                    current.discovered_at.date_naive() != today
                        || best.net_profit_usd > current.net_profit_usd
                }
                None => true,
            };
            if replace {
                inner.best_today = Some(best.clone());
            }
        }
    }

    pub fn record_scan_error(&self) {
        self.inner.write().stats.scan_errors += 1;
    }

    pub fn record_execution(&self, result: ExecutionResult) {
        let mut inner = self.inner.write();
        inner.stats.record_execution(&result);
        inner.trade_log.push(result);
    }

    pub fn strategies(&self) -> StrategyFlags {
        self.inner.read().strategies
    }

    pub fn set_strategy(&self, name: &str, enabled: bool) -> Result<StrategyFlags, ControlError> {
        let mut inner = self.inner.write();
        inner.strategies.set(name, enabled)?;
        Ok(inner.strategies)
    }

    pub fn min_profit_usd(&self) -> Decimal {
        self.inner.read().min_profit_usd
    }

    pub fn set_min_profit_usd(&self, min: Decimal) {
        self.inner.write().min_profit_usd = min;
    }

    pub fn update_chain(&self, status: ChainStatus) {
        self.chains.insert(status.chain, status);
    }

    /// Marks a chain in or out of the rotation, keeping its cached balances.
    pub fn set_chain_live(&self, chain: ChainKey, wallet: Address, live: bool, error: Option<String>) {
        let mut entry = self
            .chains
            .entry(chain)
            .or_insert_with(|| ChainStatus::new(chain, live, wallet));
        entry.live = live;
        entry.error = error;
    }

    pub fn chain_status(&self, chain: ChainKey) -> Option<ChainStatus> {
        self.chains.get(&chain).map(|s| s.clone())
    }

    pub fn is_chain_live(&self, chain: ChainKey) -> bool {
        self.chains.get(&chain).map(|s| s.live).unwrap_or(false)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let inner = self.inner.read();
        let mut chains: Vec<ChainStatus> = self.chains.iter().map(|e| e.value().clone()).collect();
        chains.sort_by_key(|c| c.chain);

        EngineSnapshot {
            running: self.is_running(),
            dry_run: self.is_dry_run(),
            is_executing: self.is_executing(),
            started_at: inner.started_at,
            current_chain: inner.current_chain,
            strategies: inner.strategies,
            min_profit_usd: inner.min_profit_usd,
            stats: inner.stats.clone(),
            win_rate: inner.stats.win_rate(),
            chains,
            best_today: inner.best_today.clone(),
            opportunities: inner.opportunities.clone(),
            trade_log: inner.trade_log.iter().cloned().collect(),
            last_error: inner.trade_log.latest().and_then(|r| r.error.clone()),
        }
    }
}
