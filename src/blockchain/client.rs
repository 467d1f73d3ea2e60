//! Chain RPC capability and its JSON-RPC implementation.
//!
//! # Responsibilities
//! - Define the [`ChainClient`] seam the builder and broadcaster talk to
//! - Connect to a JSON-RPC endpoint via alloy
//! - Translate node answers into library-independent types
//! - Distinguish node rejections from transport failures
//!
//! Timeouts are applied by the callers (see `resilience::timeouts`), so a
//! single slow call never hangs a request.

use alloy::eips::BlockNumberOrTag;
use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use std::sync::Arc;

use crate::blockchain::abi::IERC20;
use crate::blockchain::types::{ClientError, ClientResult, FeeData, ReceiptData, TokenInfo};

/// Priority fee used when the node cannot suggest one (1 gwei).
pub const DEFAULT_PRIORITY_FEE: u128 = 1_000_000_000;

/// Everything the engine needs from a chain node.
#[async_trait]
pub trait ChainClient: Send + Sync + std::fmt::Debug {
    /// Endpoint this handle is connected to.
    fn endpoint(&self) -> &str;

    /// Chain id reported by the node (`eth_chainId`).
    async fn get_chain_id(&self) -> ClientResult<u64>;

    /// Current fee market data.
    async fn get_fee_data(&self) -> ClientResult<FeeData>;

    /// Nonce for `address` counting pending transactions.
    async fn get_transaction_count(&self, address: Address) -> ClientResult<u64>;

    /// Gas estimate for a call.
    async fn estimate_gas(&self, tx: TransactionRequest) -> ClientResult<u64>;

    /// ERC-20 name, symbol and decimals of a token contract.
    async fn token_metadata(&self, token: Address) -> ClientResult<TokenInfo>;

    /// Submit an already-signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, raw: &[u8]) -> ClientResult<TxHash>;

    /// Receipt of a mined transaction, `None` while pending.
    async fn get_transaction_receipt(&self, hash: TxHash) -> ClientResult<Option<ReceiptData>>;

    /// Latest block number.
    async fn get_block_number(&self) -> ClientResult<u64>;
}

/// Creates connection handles for the pool.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, endpoint: &str) -> ClientResult<Arc<dyn ChainClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&str) -> ClientResult<Arc<dyn ChainClient>> + Send + Sync,
{
    fn connect(&self, endpoint: &str) -> ClientResult<Arc<dyn ChainClient>> {
        self(endpoint)
    }
}

/// Factory producing HTTP JSON-RPC clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlloyClientFactory;

impl ClientFactory for AlloyClientFactory {
    fn connect(&self, endpoint: &str) -> ClientResult<Arc<dyn ChainClient>> {
        Ok(Arc::new(AlloyChainClient::new(endpoint)?))
    }
}

/// [`ChainClient`] backed by an alloy HTTP provider.
#[derive(Clone)]
pub struct AlloyChainClient {
    provider: DynProvider<Ethereum>,
    endpoint: String,
}

impl AlloyChainClient {
    /// Create a client for the given endpoint. No request is made.
    pub fn new(endpoint: &str) -> ClientResult<Self> {
        let url: url::Url = endpoint.parse().map_err(|e| ClientError::Connect {
            endpoint: endpoint.to_string(),
            reason: format!("invalid RPC URL: {}", e),
        })?;

        let provider = ProviderBuilder::new().connect_http(url).erased();
        tracing::debug!(endpoint = %endpoint, "RPC client created");

        Ok(Self {
            provider,
            endpoint: endpoint.to_string(),
        })
    }

    async fn call_token(&self, token: Address, data: Vec<u8>) -> ClientResult<Bytes> {
        self.provider
            .call(TransactionRequest::default().to(token).input(data.into()))
            .await
            .map_err(map_rpc_error)
    }
}

impl std::fmt::Debug for AlloyChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyChainClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_chain_id(&self) -> ClientResult<u64> {
        self.provider.get_chain_id().await.map_err(map_rpc_error)
    }

    async fn get_fee_data(&self) -> ClientResult<FeeData> {
        let gas_price = self.provider.get_gas_price().await.map_err(map_rpc_error)?;

        let latest = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(map_rpc_error)?;
        let base_fee = latest.and_then(|block| block.header.base_fee_per_gas);

        let (max_fee_per_gas, max_priority_fee_per_gas) = match base_fee {
            Some(base_fee) => {
                let priority = match self.provider.get_max_priority_fee_per_gas().await {
                    Ok(fee) => fee,
                    Err(e) => {
                        tracing::debug!(
                            endpoint = %self.endpoint,
                            error = %e,
                            "No priority fee suggestion, using default"
                        );
                        DEFAULT_PRIORITY_FEE
                    }
                };
                let max_fee = u128::from(base_fee)
                    .saturating_mul(2)
                    .saturating_add(priority);
                (Some(max_fee), Some(priority))
            }
            None => (None, None),
        };

        Ok(FeeData {
            gas_price: Some(gas_price),
            max_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }

    async fn get_transaction_count(&self, address: Address) -> ClientResult<u64> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(map_rpc_error)
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> ClientResult<u64> {
        self.provider.estimate_gas(tx).await.map_err(map_rpc_error)
    }

    async fn token_metadata(&self, token: Address) -> ClientResult<TokenInfo> {
        let decode_err =
            |e: alloy::sol_types::Error| ClientError::Transport(format!("ABI decode error: {}", e));

        let raw = self.call_token(token, IERC20::decimalsCall {}.abi_encode()).await?;
        let decimals = <IERC20::decimalsCall as SolCall>::abi_decode_returns(&raw).map_err(decode_err)?;

        let raw = self.call_token(token, IERC20::nameCall {}.abi_encode()).await?;
        let name = <IERC20::nameCall as SolCall>::abi_decode_returns(&raw).map_err(decode_err)?;

        let raw = self.call_token(token, IERC20::symbolCall {}.abi_encode()).await?;
        let symbol = <IERC20::symbolCall as SolCall>::abi_decode_returns(&raw).map_err(decode_err)?;

        Ok(TokenInfo {
            name,
            symbol,
            decimals,
        })
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> ClientResult<TxHash> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(map_rpc_error)?;
        Ok(*pending.tx_hash())
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> ClientResult<Option<ReceiptData>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(map_rpc_error)?;

        Ok(receipt.map(|r| ReceiptData {
            transaction_hash: r.transaction_hash,
            block_hash: r.block_hash,
            block_number: r.block_number,
            from: r.from,
            to: r.to,
            status_code: u64::from(r.status()),
        }))
    }

    async fn get_block_number(&self) -> ClientResult<u64> {
        self.provider.get_block_number().await.map_err(map_rpc_error)
    }
}

/// Split node-side JSON-RPC errors from transport failures.
fn map_rpc_error(err: RpcError<TransportErrorKind>) -> ClientError {
    match err {
        RpcError::ErrorResp(payload) => ClientError::Rejected {
            code: payload.code,
            message: payload.message.to_string(),
        },
        other => ClientError::Transport(other.to_string()),
    }
}
