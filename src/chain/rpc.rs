//! alloy-backed chain client

use alloy::network::EthereumWallet;
use alloy::primitives::{aliases::U24, Address, Bytes, I256, U160, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use eyre::{eyre, Result};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::router::build_exact_input_single;
use super::{ChainClient, SwapParams, TxReceiptSummary};
use crate::config::ChainConfig;
use crate::route::{Hop, HopQuote};

sol! {
    function balanceOf(address account) external view returns (uint256);
    function allowance(address owner, address spender) external view returns (uint256);
    function approve(address spender, uint256 amount) external returns (bool);
    function deposit() external payable;

    function decimals() external view returns (uint8);
    function latestRoundData() external view returns (
        uint80 roundId,
        int256 answer,
        uint256 startedAt,
        uint256 updatedAt,
        uint80 answeredInRound
    );
}

sol! {
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (
                uint256 amountOut,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );
    }
}

pub struct RpcChainClient {
    chain: ChainConfig,
    provider: DynProvider,
    wallet: Address,
    can_sign: bool,
}

impl RpcChainClient {
    /// Build a client for `chain`. Without a signer the client is read-only.
    pub fn connect(
        chain: ChainConfig,
        signer: Option<PrivateKeySigner>,
        wallet: Option<Address>,
    ) -> Result<Self> {
        let url: reqwest::Url = chain.rpc_url.parse()?;
        let (provider, wallet, can_sign) = match signer {
            Some(signer) => {
                let address = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(url)
                    .erased();
                (provider, address, true)
            }
            None => {
                let provider = ProviderBuilder::new().connect_http(url).erased();
                (provider, wallet.unwrap_or(Address::ZERO), false)
            }
        };

        Ok(Self {
            chain,
            provider,
            wallet,
            can_sign,
        })
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    async fn read<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(Bytes::from(call.abi_encode())));
        let result = self.provider.call(tx).await?;
        Ok(C::abi_decode_returns(&result)?)
    }

    /// Sign, send and wait for one confirmation.
    async fn send(&self, to: Address, calldata: Bytes, value: U256) -> Result<TxReceiptSummary> {
        if !self.can_sign {
            return Err(eyre!("{} client is read-only (no PRIVATE_KEY)", self.chain.key));
        }

        let tx = TransactionRequest::default()
            .from(self.wallet)
            .to(to)
            .value(value)
            .input(TransactionInput::new(calldata));

        let pending = self.provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        debug!(chain = %self.chain.key, ?tx_hash, "transaction submitted");

        let receipt = pending.get_receipt().await?;
        Ok(summarize(&receipt))
    }

    async fn read_feed(&self) -> Result<Decimal> {
        let feed = self.chain.price_feed;
        let decimals = self.read(feed, decimalsCall {}).await?;
        let round = self.read(feed, latestRoundDataCall {}).await?;

        let answer: I256 = round.answer;
        if answer <= I256::ZERO {
            return Err(eyre!("feed {} returned non-positive answer {}", feed, answer));
        }
        let raw = i128::try_from(answer).map_err(|_| eyre!("feed answer {} out of range", answer))?;
        Decimal::try_from_i128_with_scale(raw, decimals as u32)
            .map_err(|e| eyre!("feed answer {} not representable: {}", answer, e))
    }
}

fn summarize(receipt: &TransactionReceipt) -> TxReceiptSummary {
    TxReceiptSummary {
        tx_hash: receipt.transaction_hash,
        success: receipt.status(),
        gas_used: receipt.gas_used,
        effective_gas_price: receipt.effective_gas_price,
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    fn wallet(&self) -> Address {
        self.wallet
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        Ok(self.provider.get_balance(owner).await?)
    }

    async fn token_balance(&self, owner: Address, token: Address) -> Result<U256> {
        self.read(token, balanceOfCall { account: owner }).await
    }

    async fn fee_price(&self) -> Result<u128> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn native_price_usd(&self) -> Result<Decimal> {
        match self.read_feed().await {
            Ok(price) => Ok(price),
            Err(e) => {
                warn!(
                    chain = %self.chain.key,
                    fallback = %self.chain.native_price_fallback_usd,
                    "price feed unavailable: {:#}", e
                );
                Ok(self.chain.native_price_fallback_usd)
            }
        }
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn quote(&self, hop: &Hop, amount_in: U256) -> Result<HopQuote> {
        let quoter = IQuoterV2::new(self.chain.dex.quoter, self.provider.clone());
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: hop.token_in.address,
            tokenOut: hop.token_out.address,
            amountIn: amount_in,
            fee: U24::from(hop.fee),
            sqrtPriceLimitX96: U160::ZERO,
        };

        let result = quoter.quoteExactInputSingle(params).call().await?;
        Ok(HopQuote {
            amount_out: result.amountOut,
            gas_estimate: result.gasEstimate.saturating_to::<u64>(),
            ticks_crossed: result.initializedTicksCrossed,
            sqrt_price_after: U256::from(result.sqrtPriceX96After),
        })
    }

    async fn allowance(&self, owner: Address, spender: Address, token: Address) -> Result<U256> {
        self.read(token, allowanceCall { owner, spender }).await
    }

    async fn approve(&self, spender: Address, token: Address, amount: U256) -> Result<TxReceiptSummary> {
        info!(chain = %self.chain.key, %token, %spender, "approving router");
        let calldata = Bytes::from(approveCall { spender, amount }.abi_encode());
        self.send(token, calldata, U256::ZERO).await
    }

    async fn swap(&self, params: &SwapParams) -> Result<TxReceiptSummary> {
        let calldata = build_exact_input_single(params);
        self.send(self.chain.dex.router, calldata, U256::ZERO).await
    }

    async fn wrap_native(&self, amount: U256) -> Result<TxReceiptSummary> {
        let calldata = Bytes::from(depositCall {}.abi_encode());
        self.send(self.chain.tokens.wrapped_native.address, calldata, amount)
            .await
    }
}
