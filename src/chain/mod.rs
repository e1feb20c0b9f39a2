//! Chain client boundary
//!
//! The scanner and execution engine only talk to a network through
//! [`ChainClient`]. State-changing calls resolve once the transaction has one
//! confirmation. Timeouts are applied by the caller.

pub mod health;
pub mod router;
pub mod rpc;

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use eyre::Result;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::amounts::serde_dec;
use crate::config::ChainConfig;
use crate::route::{Hop, HopQuote};

pub use health::ChainHealth;
pub use rpc::RpcChainClient;

/// Parameters for one exact-input swap through the chain's router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    pub hop: Hop,
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub recipient: Address,
    /// Unix timestamp after which the router rejects the swap.
    pub deadline: u64,
}

/// Confirmed transaction, reduced to what the engine reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceiptSummary {
    pub tx_hash: TxHash,
    pub success: bool,
    pub gas_used: u64,
    #[serde(serialize_with = "serde_dec::u128")]
    pub effective_gas_price: u128,
}

impl TxReceiptSummary {
    pub fn gas_cost_wei(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Static descriptor of the network this client is bound to.
    fn chain(&self) -> &ChainConfig;

    /// Address that signs and receives.
    fn wallet(&self) -> Address;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    async fn token_balance(&self, owner: Address, token: Address) -> Result<U256>;

    /// Current gas price in wei.
    async fn fee_price(&self) -> Result<u128>;

    async fn native_price_usd(&self) -> Result<Decimal>;

    /// Chain id reported by the endpoint itself.
    async fn chain_id(&self) -> Result<u64>;

    /// Read-only quote for a single hop.
    async fn quote(&self, hop: &Hop, amount_in: U256) -> Result<HopQuote>;

    async fn allowance(&self, owner: Address, spender: Address, token: Address) -> Result<U256>;

    async fn approve(&self, spender: Address, token: Address, amount: U256) -> Result<TxReceiptSummary>;

    async fn swap(&self, params: &SwapParams) -> Result<TxReceiptSummary>;

    async fn wrap_native(&self, amount: U256) -> Result<TxReceiptSummary>;

    /// Router that pulls tokens during swaps.
    fn spender(&self) -> Address {
        self.chain().dex.router
    }
}
