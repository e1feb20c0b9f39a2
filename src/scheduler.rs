//! Tick loop
//!
//! One tick scans one chain, round-robin over the live ones, and hands the
//! best opportunity to the execution engine unless the engine is in dry-run.
//! Ticks never overlap: the loop awaits each tick, and a tick that finds an
//! execution still in flight does nothing.

use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::amounts::to_decimal;
use crate::chain::ChainClient;
use crate::config::{ChainKey, EngineConfig};
use crate::executor::{ExecutionEngine, ExecutionStatus};
use crate::profit::NATIVE_DECIMALS;
use crate::report;
use crate::scanner::OpportunityScanner;
use crate::state::{ChainStatus, EngineState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Engine is stopped.
    Idle,
    ExecutionInFlight,
    NoLiveChain,
    ScanFailed(ChainKey),
    Scanned {
        chain: ChainKey,
        opportunities: usize,
        execution: Option<ExecutionStatus>,
    },
}

pub struct Scheduler {
    config: Arc<EngineConfig>,
    state: Arc<EngineState>,
    clients: Vec<Arc<dyn ChainClient>>,
    scanner: OpportunityScanner,
    executor: ExecutionEngine,
}

impl Scheduler {
    pub fn new(
        config: Arc<EngineConfig>,
        state: Arc<EngineState>,
        clients: Vec<Arc<dyn ChainClient>>,
    ) -> Self {
        Self {
            scanner: OpportunityScanner::new(config.clone()),
            executor: ExecutionEngine::new(config.clone(), state.clone()),
            config,
            state,
            clients,
        }
    }

    /// Runs ticks on the configured interval until `shutdown` flips or the
    /// engine is stopped. Slow ticks delay the next one rather than queueing.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            chains = self.clients.len(),
            tick_ms = self.config.tick_interval.as_millis() as u64,
            dry_run = self.state.is_dry_run(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.state.is_running() {
                        break;
                    }
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(scans = self.state.total_scans(), "scheduler stopped");
    }

    pub async fn tick(&self) -> TickOutcome {
        if !self.state.is_running() {
            return TickOutcome::Idle;
        }
        if self.state.is_executing() {
            debug!("execution in flight, skipping tick");
            return TickOutcome::ExecutionInFlight;
        }

        let live: Vec<&Arc<dyn ChainClient>> = self
            .clients
            .iter()
            .filter(|c| self.state.is_chain_live(c.chain().key))
            .collect();
        if live.is_empty() {
            warn!("no live chains");
            return TickOutcome::NoLiveChain;
        }

        let scan_no = self.state.total_scans() + 1;
        let client = live[(scan_no % live.len() as u64) as usize];
        let chain = client.chain().key;
        self.state.begin_scan(chain);

        if scan_no % self.config.balance_refresh_ticks == 0 {
            tokio::spawn(refresh_balances(self.clients.clone(), self.state.clone()));
        }

        let report = match self.scanner.scan(client.as_ref(), &self.state.strategies()).await {
            Ok(report) => report,
            Err(e) => {
                error!(chain = %chain, "scan failed: {:#}", e);
                self.state.record_scan_error();
                return TickOutcome::ScanFailed(chain);
            }
        };
        self.state.record_scan(&report);

        let found = report.opportunities.len();
        let execution = match report.best() {
            Some(best) if !self.state.is_dry_run() => {
                let result = self.executor.execute(client.as_ref(), best).await;
                let status = result.status;
                report::print_result(&result);
                self.state.record_execution(result);
                Some(status)
            }
            Some(best) => {
                debug!(opportunity = best.id, "dry run, not executing");
                None
            }
            None => None,
        };

        TickOutcome::Scanned {
            chain,
            opportunities: found,
            execution,
        }
    }
}

/// Reads wallet balances on every chain and updates the cached status. A
/// chain whose reads fail, or whose endpoint reports a different chain id,
/// drops out of the rotation until the next refresh.
pub async fn refresh_balances(clients: Vec<Arc<dyn ChainClient>>, state: Arc<EngineState>) {
    let statuses = join_all(clients.iter().map(|c| read_status(c.as_ref()))).await;

    for (client, status) in clients.iter().zip(statuses) {
        match status {
            Ok(status) => state.update_chain(status),
            Err(e) => {
                let chain = client.chain().key;
                warn!(chain = %chain, "balance refresh failed: {:#}", e);
                state.set_chain_live(chain, client.wallet(), false, Some(format!("{:#}", e)));
            }
        }
    }
}

async fn read_status(client: &dyn ChainClient) -> eyre::Result<ChainStatus> {
    let chain = client.chain();
    let wallet = client.wallet();
    let tokens = &chain.tokens;

    let reported = client.chain_id().await?;
    if reported != chain.chain_id {
        eyre::bail!("expected chain id {}, endpoint reports {}", chain.chain_id, reported);
    }

    let native = client.native_balance(wallet).await?;
    let wrapped = client.token_balance(wallet, tokens.wrapped_native.address).await?;
    let stable = client.token_balance(wallet, tokens.stable.address).await?;
    let price = client.native_price_usd().await?;

    let eth = to_decimal(native, NATIVE_DECIMALS).unwrap_or_default()
        + to_decimal(wrapped, tokens.wrapped_native.decimals).unwrap_or_default();
    let usd = to_decimal(stable, tokens.stable.decimals).unwrap_or_default();
    let balance_usd: Decimal = (eth * price + usd).round_dp(2);

    debug!(chain = %chain.key, native = %native, wrapped = %wrapped, usd = %balance_usd, "balances refreshed");

    Ok(ChainStatus {
        chain: chain.key,
        live: true,
        wallet,
        native_balance: native,
        wrapped_balance: wrapped,
        stable_balance: stable,
        native_price_usd: Some(price),
        balance_usd: Some(balance_usd),
        updated_at: Some(Utc::now()),
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{eth, test_chain, usd6, usdc, weth, MockChainClient, QuoteRule};
    use alloy::primitives::{Address, U256};
    use rust_decimal_macros::dec;

    /// 1 WETH -> 2110 USDC at 500, back at 2% better through 3000.
    fn profitable(client: &MockChainClient) {
        let tokens = &client.chain().tokens;
        let (weth, usdc) = (tokens.wrapped_native, tokens.stable);
        client.set_native_balance(eth("1"));
        client.set_quote(weth, usdc, 500, QuoteRule::Rate { num: usd6("2110"), den: eth("1") });
        client.set_quote(usdc, weth, 3000, QuoteRule::Rate { num: eth("1.02"), den: usd6("2110") });
    }

    fn scheduler(clients: Vec<Arc<MockChainClient>>) -> (Scheduler, Arc<EngineState>) {
        let config = Arc::new(EngineConfig::default());
        let state = Arc::new(EngineState::new(&config));
        for c in &clients {
            state.set_chain_live(c.chain().key, c.wallet(), true, None);
        }
        let clients: Vec<Arc<dyn ChainClient>> = clients
            .into_iter()
            .map(|c| c as Arc<dyn ChainClient>)
            .collect();
        (Scheduler::new(config, state.clone(), clients), state)
    }

    #[tokio::test]
    async fn test_stopped_engine_does_nothing() {
        let client = Arc::new(MockChainClient::arbitrum());
        let (scheduler, state) = scheduler(vec![client.clone()]);

        assert_eq!(scheduler.tick().await, TickOutcome::Idle);
        assert_eq!(state.total_scans(), 0);
        assert_eq!(client.calls().quotes, 0);
    }

    #[tokio::test]
    async fn test_dry_run_scans_without_executing() {
        let client = Arc::new(MockChainClient::arbitrum());
        profitable(&client);
        let (scheduler, state) = scheduler(vec![client.clone()]);
        state.reset(true);
        state.set_running(true);

        let outcome = scheduler.tick().await;

        match outcome {
            TickOutcome::Scanned { chain, opportunities, execution } => {
                assert_eq!(chain, ChainKey::Arbitrum);
                assert_eq!(opportunities, 3);
                assert_eq!(execution, None);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let snapshot = state.snapshot();
        assert_eq!(snapshot.stats.total_scans, 1);
        assert!(snapshot.best_today.is_some());
        assert!(snapshot.trade_log.is_empty());
        assert_eq!(client.calls().swaps, 0);
    }

    #[tokio::test]
    async fn test_live_tick_executes_best_opportunity() {
        let client = Arc::new(MockChainClient::arbitrum());
        profitable(&client);
        let (scheduler, state) = scheduler(vec![client.clone()]);
        state.reset(false);
        state.set_running(true);

        let outcome = scheduler.tick().await;

        assert!(matches!(
            outcome,
            TickOutcome::Scanned { execution: Some(ExecutionStatus::Success), .. }
        ));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.trade_log.len(), 1);
        assert_eq!(snapshot.stats.trades_succeeded, 1);
        assert!(snapshot.trade_log[0].route.starts_with("WETH"));
        assert_eq!(client.calls().swaps, 2);
        assert!(!state.is_executing());
    }

    #[tokio::test]
    async fn test_tick_skipped_while_executing() {
        let client = Arc::new(MockChainClient::arbitrum());
        let (scheduler, state) = scheduler(vec![client.clone()]);
        state.set_running(true);

        let _guard = state.execution_lock().try_acquire().unwrap();
        assert_eq!(scheduler.tick().await, TickOutcome::ExecutionInFlight);
        assert_eq!(state.total_scans(), 0);
    }

    #[tokio::test]
    async fn test_round_robin_over_live_chains() {
        let arb = Arc::new(MockChainClient::arbitrum());
        let base = Arc::new(MockChainClient::new(test_chain(ChainKey::Base)));
        let op = Arc::new(MockChainClient::new(test_chain(ChainKey::Optimism)));
        let (scheduler, state) = scheduler(vec![arb, base, op.clone()]);
        state.set_chain_live(ChainKey::Optimism, op.wallet(), false, Some("down".to_string()));
        state.set_running(true);

        let mut visited = Vec::new();
        for _ in 0..4 {
            match scheduler.tick().await {
                TickOutcome::Scanned { chain, .. } => visited.push(chain),
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        // scan n picks live[n % 2]
        assert_eq!(
            visited,
            vec![ChainKey::Base, ChainKey::Arbitrum, ChainKey::Base, ChainKey::Arbitrum]
        );
        assert_eq!(op.calls().quotes, 0);
    }

    #[tokio::test]
    async fn test_scan_error_is_counted_and_loop_continues() {
        let client = Arc::new(MockChainClient::arbitrum());
        client.set_reads_fail(true);
        let (scheduler, state) = scheduler(vec![client.clone()]);
        state.set_running(true);

        assert_eq!(scheduler.tick().await, TickOutcome::ScanFailed(ChainKey::Arbitrum));
        client.set_reads_fail(false);
        assert!(matches!(scheduler.tick().await, TickOutcome::Scanned { .. }));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.stats.scan_errors, 1);
        assert_eq!(snapshot.stats.total_scans, 2);
    }

    #[tokio::test]
    async fn test_no_live_chain() {
        let client = Arc::new(MockChainClient::arbitrum());
        let (scheduler, state) = scheduler(vec![client.clone()]);
        state.set_chain_live(ChainKey::Arbitrum, Address::ZERO, false, None);
        state.set_running(true);

        assert_eq!(scheduler.tick().await, TickOutcome::NoLiveChain);
    }

    #[tokio::test]
    async fn test_refresh_balances_updates_status_and_liveness() {
        let good = Arc::new(MockChainClient::arbitrum());
        good.set_native_balance(eth("1"));
        good.set_token_balance(weth(), eth("0.5"));
        good.set_token_balance(usdc(), usd6("100"));
        let bad = Arc::new(MockChainClient::new(test_chain(ChainKey::Base)));
        bad.set_reads_fail(true);
        let (_, state) = scheduler(vec![good.clone(), bad.clone()]);

        refresh_balances(
            vec![good as Arc<dyn ChainClient>, bad as Arc<dyn ChainClient>],
            state.clone(),
        )
        .await;

        let arb = state.chain_status(ChainKey::Arbitrum).unwrap();
        assert!(arb.live);
        assert_eq!(arb.wrapped_balance, eth("0.5"));
        // 1.5 ETH * 3500 + 100 USDC
        assert_eq!(arb.balance_usd, Some(dec!(5350)));
        assert!(arb.updated_at.is_some());

        let base = state.chain_status(ChainKey::Base).unwrap();
        assert!(!base.live);
        assert!(base.error.unwrap().contains("connection refused"));
        assert!(!state.is_chain_live(ChainKey::Base));
    }

    #[tokio::test]
    async fn test_refresh_keeps_wrong_network_out_of_rotation() {
        let client = Arc::new(MockChainClient::arbitrum());
        client.set_native_balance(eth("1"));
        client.set_chain_id(1);
        let (scheduler, state) = scheduler(vec![client.clone()]);
        state.set_chain_live(ChainKey::Arbitrum, client.wallet(), false, Some("chain id mismatch".to_string()));

        refresh_balances(vec![client.clone() as Arc<dyn ChainClient>], state.clone()).await;

        assert!(!state.is_chain_live(ChainKey::Arbitrum));
        let status = state.chain_status(ChainKey::Arbitrum).unwrap();
        assert!(status.error.unwrap().contains("expected chain id 42161, endpoint reports 1"));
        assert_eq!(status.native_balance, U256::ZERO);

        state.set_running(true);
        assert_eq!(scheduler.tick().await, TickOutcome::NoLiveChain);

        // Endpoint fixed: the next refresh brings the chain back.
        client.set_chain_id(42161);
        refresh_balances(vec![client as Arc<dyn ChainClient>], state.clone()).await;
        assert!(state.is_chain_live(ChainKey::Arbitrum));
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let client = Arc::new(MockChainClient::arbitrum());
        let (scheduler, state) = scheduler(vec![client]);
        state.set_running(true);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(rx));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(state.total_scans() >= 1);
    }
}
