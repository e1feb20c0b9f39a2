use alloy::providers::Provider;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{ChainConfig, ChainKey};

/// Startup health check for one network
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHealth {
    pub chain: ChainKey,
    pub is_live: bool,
    pub block_number: u64,
    pub rpc_latency_ms: u64,
    pub chain_id: u64,
    pub chain_id_valid: bool,
    pub error: Option<String>,
}

impl ChainHealth {
    /// Checks connectivity and that the endpoint serves the expected chain.
    /// Never fails: an unreachable endpoint is reported as not live.
    pub async fn check<P: Provider>(chain: &ChainConfig, provider: &P) -> Self {
        let start = Instant::now();

        let block_number = match provider.get_block_number().await {
            Ok(n) => n,
            Err(e) => return Self::unreachable(chain.key, format!("{:#}", e)),
        };
        let rpc_latency_ms = start.elapsed().as_millis() as u64;

        let chain_id = match provider.get_chain_id().await {
            Ok(id) => id,
            Err(e) => return Self::unreachable(chain.key, format!("{:#}", e)),
        };
        let chain_id_valid = chain_id == chain.chain_id;

        let health = Self {
            chain: chain.key,
            is_live: chain_id_valid,
            block_number,
            rpc_latency_ms,
            chain_id,
            chain_id_valid,
            error: (!chain_id_valid).then(|| {
                format!("expected chain id {}, endpoint reports {}", chain.chain_id, chain_id)
            }),
        };
        health.log();
        health
    }

    fn unreachable(chain: ChainKey, error: String) -> Self {
        let health = Self {
            chain,
            is_live: false,
            block_number: 0,
            rpc_latency_ms: 0,
            chain_id: 0,
            chain_id_valid: false,
            error: Some(error),
        };
        health.log();
        health
    }

    fn log(&self) {
        if self.is_live {
            info!(
                chain = %self.chain,
                block = self.block_number,
                latency_ms = self.rpc_latency_ms,
                "chain live"
            );
        } else {
            warn!(
                chain = %self.chain,
                error = self.error.as_deref().unwrap_or("unknown"),
                "chain not live, excluded from rotation"
            );
        }
    }

    pub fn print_status(&self) {
        if self.is_live {
            println!(
                "  \x1b[1;32m{:<10}\x1b[0m block {} | {}ms | chain id {}",
                self.chain.as_str(),
                self.block_number,
                self.rpc_latency_ms,
                self.chain_id
            );
        } else {
            println!(
                "  \x1b[1;31m{:<10}\x1b[0m DOWN: {}",
                self.chain.as_str(),
                self.error.as_deref().unwrap_or("unknown")
            );
        }
    }
}
