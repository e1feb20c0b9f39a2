//! Execution Engine
//!
//! Runs one opportunity at a time:
//! `BalanceSnapshot -> WrapNative -> (EnsureAllowance -> SwapLeg)* -> BalanceReconcile`.
//!
//! Legs are strictly sequential and each waits for its confirmation. The first
//! failing step ends the attempt as `Failed`; earlier legs are not unwound.
//! Realized profit comes from wallet balance deltas, never from the quote.

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use eyre::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::amounts::{serde_dec, signed_delta, signed_to_decimal, to_decimal};
use crate::chain::{ChainClient, SwapParams, TxReceiptSummary};
use crate::config::{ChainKey, EngineConfig};
use crate::error::{ExecutionError, ExecutionStep, SkipReason};
use crate::profit::{Opportunity, NATIVE_DECIMALS};
use crate::route::{BaseValuation, Strategy};
use crate::state::EngineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

/// Outcome of one execution attempt. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub opportunity_id: u64,
    pub chain: ChainKey,
    pub strategy: Strategy,
    pub route: String,
    pub status: ExecutionStatus,
    pub expected_profit_usd: Decimal,
    /// Balance delta in base units. Native routes combine native + wrapped.
    #[serde(serialize_with = "serde_dec::opt_i128")]
    pub realized_profit: Option<i128>,
    pub realized_profit_usd: Option<Decimal>,
    pub gas_cost_usd: Decimal,
    pub tx_hashes: Vec<TxHash>,
    pub failed_step: Option<ExecutionStep>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    fn base(opp: &Opportunity, status: ExecutionStatus, elapsed_ms: u64) -> Self {
        Self {
            opportunity_id: opp.id,
            chain: opp.chain,
            strategy: opp.route.strategy,
            route: opp.route.label(),
            status,
            expected_profit_usd: opp.net_profit_usd,
            realized_profit: None,
            realized_profit_usd: None,
            gas_cost_usd: Decimal::ZERO,
            tx_hashes: Vec::new(),
            failed_step: None,
            error: None,
            elapsed_ms,
            finished_at: Utc::now(),
        }
    }

    pub fn skipped(opp: &Opportunity, reason: SkipReason, elapsed_ms: u64) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Self::base(opp, ExecutionStatus::Skipped, elapsed_ms)
        }
    }

    pub fn succeeded(
        opp: &Opportunity,
        tx_hashes: Vec<TxHash>,
        gas_cost_usd: Decimal,
        realized: (i128, Decimal),
        elapsed_ms: u64,
    ) -> Self {
        Self {
            realized_profit: Some(realized.0),
            realized_profit_usd: Some(realized.1),
            gas_cost_usd,
            tx_hashes,
            ..Self::base(opp, ExecutionStatus::Success, elapsed_ms)
        }
    }

    pub fn failed(
        opp: &Opportunity,
        err: ExecutionError,
        tx_hashes: Vec<TxHash>,
        gas_cost_usd: Decimal,
        realized: Option<(i128, Decimal)>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            realized_profit: realized.map(|r| r.0),
            realized_profit_usd: realized.map(|r| r.1),
            gas_cost_usd,
            tx_hashes,
            failed_step: Some(err.step()),
            error: Some(err.to_string()),
            ..Self::base(opp, ExecutionStatus::Failed, elapsed_ms)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// `quoted * (10000 - bps) / 10000`
pub fn slippage_floor(quoted: U256, max_slippage_bps: u32) -> U256 {
    let keep = 10_000u32.saturating_sub(max_slippage_bps);
    quoted * U256::from(keep) / U256::from(10_000u32)
}

pub struct ExecutionEngine {
    config: Arc<EngineConfig>,
    state: Arc<EngineState>,
}

impl ExecutionEngine {
    pub fn new(config: Arc<EngineConfig>, state: Arc<EngineState>) -> Self {
        Self { config, state }
    }

    /// Attempt `opp`. Always returns a result; errors are folded into it.
    pub async fn execute(&self, client: &dyn ChainClient, opp: &Opportunity) -> ExecutionResult {
        let started = Instant::now();

        let Some(_guard) = self.state.execution_lock().try_acquire() else {
            return ExecutionResult::skipped(opp, SkipReason::ExecutionInFlight, 0);
        };

        if let Some(reason) = self.margin_check(opp) {
            warn!(opportunity = opp.id, "skipping: {}", reason);
            return ExecutionResult::skipped(opp, reason, elapsed_ms(started));
        }

        info!(
            opportunity = opp.id,
            chain = %opp.chain,
            route = %opp.route.label(),
            expected_usd = %opp.net_profit_usd,
            "executing"
        );

        let mut run = Attempt::new(client, opp, &self.config);
        let outcome = run.drive().await;
        let gas_usd = run.gas_cost_usd();

        match outcome {
            Ok(realized) => {
                info!(
                    opportunity = opp.id,
                    realized_usd = %realized.1,
                    gas_usd = %gas_usd,
                    "execution succeeded"
                );
                ExecutionResult::succeeded(opp, run.tx_hashes, gas_usd, realized, elapsed_ms(started))
            }
            Err(err) => {
                warn!(opportunity = opp.id, "execution failed: {}", err);
                let realized = run.reconcile_after_failure().await;
                ExecutionResult::failed(opp, err, run.tx_hashes, gas_usd, realized, elapsed_ms(started))
            }
        }
    }

    fn margin_check(&self, opp: &Opportunity) -> Option<SkipReason> {
        let min = self.state.min_profit_usd();
        if opp.net_profit_usd < min {
            return Some(SkipReason::MarginBelowMinimum {
                net: opp.net_profit_usd,
                min,
            });
        }

        let max_ms = self.config.max_opportunity_age.as_millis() as u64;
        let age_ms = opp.age_ms(Utc::now());
        if age_ms > max_ms as i64 {
            return Some(SkipReason::Stale { age_ms, max_ms });
        }
        None
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Wallet balances relevant to one route.
#[derive(Debug, Clone, Default)]
struct Balances {
    native: U256,
    tokens: HashMap<Address, U256>,
}

impl Balances {
    fn token(&self, token: Address) -> U256 {
        self.tokens.get(&token).copied().unwrap_or_default()
    }
}

/// State of a single in-flight attempt.
struct Attempt<'a> {
    client: &'a dyn ChainClient,
    opp: &'a Opportunity,
    config: &'a EngineConfig,
    wallet: Address,
    timeout: Duration,
    before: Option<Balances>,
    tx_hashes: Vec<TxHash>,
    gas_wei: U256,
}

impl<'a> Attempt<'a> {
    fn new(client: &'a dyn ChainClient, opp: &'a Opportunity, config: &'a EngineConfig) -> Self {
        Self {
            client,
            opp,
            config,
            wallet: client.wallet(),
            timeout: config.confirmation_timeout,
            before: None,
            tx_hashes: Vec::new(),
            gas_wei: U256::ZERO,
        }
    }

    async fn drive(&mut self) -> Result<(i128, Decimal), ExecutionError> {
        let opp = self.opp;
        let route = &opp.route;

        let before = self.snapshot(ExecutionStep::BalanceSnapshot).await?;
        self.before = Some(before.clone());

        if route.valuation == BaseValuation::Native {
            let held = before.token(route.base.address);
            if held < route.amount_in {
                let shortfall = route.amount_in - held;
                info!(amount = %shortfall, "wrapping native shortfall");
                let client = self.client;
                self.submit(ExecutionStep::WrapNative, client.wrap_native(shortfall))
                    .await?;
            }
        }

        let mut amount_in = route.amount_in;
        for (i, hop) in route.hops.iter().enumerate() {
            let leg = i + 1;
            self.ensure_allowance(leg, hop.token_in.address, amount_in).await?;

            let step = ExecutionStep::SwapLeg(leg);
            let quoted = opp.quote.hop_output(i).ok_or_else(|| {
                ExecutionError::Chain {
                    step,
                    message: "no quoted output for this leg".to_string(),
                }
            })?;
            let floor = slippage_floor(quoted, self.config.max_slippage_bps);

            let client = self.client;
            let out_before = self
                .read(step, client.token_balance(self.wallet, hop.token_out.address))
                .await?;

            let params = SwapParams {
                hop: *hop,
                amount_in,
                amount_out_min: floor,
                recipient: self.wallet,
                deadline: Utc::now().timestamp().max(0) as u64 + self.config.deadline_secs(),
            };
            self.submit(step, client.swap(&params)).await?;

            let out_after = self
                .read(step, client.token_balance(self.wallet, hop.token_out.address))
                .await?;
            let received = out_after.saturating_sub(out_before);
            if received < floor {
                return Err(ExecutionError::SlippageFloor { step, received, floor });
            }

            info!(leg, received = %received, floor = %floor, "leg confirmed");
            amount_in = received;
        }

        let after = self.snapshot(ExecutionStep::BalanceReconcile).await?;
        self.realized(&before, &after).ok_or_else(|| ExecutionError::Chain {
            step: ExecutionStep::BalanceReconcile,
            message: "balance delta out of range".to_string(),
        })
    }

    /// Approve only when the current allowance does not cover `amount`.
    async fn ensure_allowance(&mut self, leg: usize, token: Address, amount: U256) -> Result<(), ExecutionError> {
        let step = ExecutionStep::EnsureAllowance(leg);
        let client = self.client;
        let spender = client.spender();

        let current = self.read(step, client.allowance(self.wallet, spender, token)).await?;
        if current >= amount {
            return Ok(());
        }

        info!(leg, %token, %spender, "allowance insufficient, approving");
        self.submit(step, client.approve(spender, token, U256::MAX)).await?;
        Ok(())
    }

    async fn snapshot(&self, step: ExecutionStep) -> Result<Balances, ExecutionError> {
        let client = self.client;
        let native = self.read(step, client.native_balance(self.wallet)).await?;
        let mut tokens = HashMap::new();
        for token in self.opp.route.tokens() {
            let held = self.read(step, client.token_balance(self.wallet, token)).await?;
            tokens.insert(token, held);
        }
        Ok(Balances { native, tokens })
    }

    async fn read<T, F>(&self, step: ExecutionStep, fut: F) -> Result<T, ExecutionError>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.timeout, fut).await {
            Err(_) => Err(ExecutionError::Timeout {
                step,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Ok(Err(e)) => Err(ExecutionError::chain(step, e)),
            Ok(Ok(value)) => Ok(value),
        }
    }

    /// State-changing call bounded by the confirmation timeout.
    async fn submit<F>(&mut self, step: ExecutionStep, fut: F) -> Result<TxReceiptSummary, ExecutionError>
    where
        F: Future<Output = Result<TxReceiptSummary>>,
    {
        let receipt = self.read(step, fut).await?;
        self.tx_hashes.push(receipt.tx_hash);
        self.gas_wei += receipt.gas_cost_wei();

        if !receipt.success {
            return Err(ExecutionError::Reverted {
                step,
                tx_hash: receipt.tx_hash,
            });
        }
        Ok(receipt)
    }

    /// Delta in base units and its USD value at the captured native price.
    fn realized(&self, before: &Balances, after: &Balances) -> Option<(i128, Decimal)> {
        let route = &self.opp.route;
        let native_price = self.opp.native_price_usd;
        let d_native = signed_delta(after.native, before.native)?;
        let d_base = signed_delta(after.token(route.base.address), before.token(route.base.address))?;

        match route.valuation {
            BaseValuation::Native => {
                let combined = d_native.checked_add(d_base)?;
                let usd = signed_to_decimal(combined, NATIVE_DECIMALS)? * native_price;
                Some((combined, usd.round_dp(8)))
            }
            BaseValuation::UsdPegged => {
                let base_usd = signed_to_decimal(d_base, route.base.decimals)?;
                let gas_usd = signed_to_decimal(d_native, NATIVE_DECIMALS)? * native_price;
                Some((d_base, (base_usd + gas_usd).round_dp(8)))
            }
        }
    }

    /// Best-effort balance check after a failure, so partial fills show up.
    async fn reconcile_after_failure(&self) -> Option<(i128, Decimal)> {
        let before = self.before.as_ref()?;
        let after = self.snapshot(ExecutionStep::BalanceReconcile).await.ok()?;
        self.realized(before, &after)
    }

    fn gas_cost_usd(&self) -> Decimal {
        to_decimal(self.gas_wei, NATIVE_DECIMALS)
            .map(|eth| (eth * self.opp.native_price_usd).round_dp(8))
            .unwrap_or_default()
    }
}
