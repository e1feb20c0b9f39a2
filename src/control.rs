//! In-process control surface: start, stop, status and strategy toggles.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::chain::{ChainClient, ChainHealth};
use crate::config::{EngineConfig, StrategyFlags};
use crate::error::ControlError;
use crate::scheduler::Scheduler;
use crate::state::{EngineSnapshot, EngineState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub running: bool,
    pub dry_run: bool,
}

struct SchedulerTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct ArbEngine {
    config: Arc<EngineConfig>,
    state: Arc<EngineState>,
    clients: Vec<Arc<dyn ChainClient>>,
    task: Mutex<Option<SchedulerTask>>,
}

impl ArbEngine {
    /// Every client starts live; feed health-check results through `apply_health`.
    pub fn new(config: Arc<EngineConfig>, clients: Vec<Arc<dyn ChainClient>>) -> Self {
        let state = Arc::new(EngineState::new(&config));
        for client in &clients {
            state.set_chain_live(client.chain().key, client.wallet(), true, None);
        }
        Self {
            config,
            state,
            clients,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> Arc<EngineState> {
        self.state.clone()
    }

    pub fn apply_health(&self, health: &ChainHealth) {
        if let Some(client) = self.clients.iter().find(|c| c.chain().key == health.chain) {
            self.state
                .set_chain_live(health.chain, client.wallet(), health.is_live, health.error.clone());
        }
    }

    /// Resets run data and spawns the tick loop. Must be called inside a
    /// tokio runtime.
    pub fn start(&self, dry_run: bool) -> Result<StartResponse, ControlError> {
        let mut task = self.task.lock();
        if task.is_some() || self.state.is_running() {
            return Err(ControlError::AlreadyRunning);
        }

        self.state.reset(dry_run);
        self.state.set_running(true);

        let (shutdown, rx) = watch::channel(false);
        let scheduler = Scheduler::new(self.config.clone(), self.state.clone(), self.clients.clone());
        let handle = tokio::spawn(scheduler.run(rx));
        *task = Some(SchedulerTask { shutdown, handle });

        info!(dry_run, "engine started");
        Ok(StartResponse {
            running: true,
            dry_run,
        })
    }

    /// Halts the tick loop, waiting for an in-flight tick to finish, and
    /// returns the final snapshot. Stopping a stopped engine is a no-op.
    pub async fn stop(&self) -> EngineSnapshot {
        self.state.set_running(false);
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            if let Err(e) = task.handle.await {
                warn!("scheduler task ended abnormally: {}", e);
            }
            info!("engine stopped");
        }
        self.state.snapshot()
    }

    pub fn status(&self) -> EngineSnapshot {
        self.state.snapshot()
    }

    pub fn set_strategy(&self, name: &str, enabled: bool) -> Result<StrategyFlags, ControlError> {
        let flags = self.state.set_strategy(name, enabled)?;
        info!(strategy = name, enabled, "strategy toggled");
        Ok(flags)
    }

    pub fn set_min_profit_usd(&self, min: Decimal) {
        self.state.set_min_profit_usd(min);
    }
}
