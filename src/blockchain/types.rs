//! Chain-specific types and error definitions.

use alloy::primitives::{Address, TxHash, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a [`ChainClient`](crate::blockchain::client::ChainClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The node answered with a JSON-RPC error object.
    #[error("node rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// The request never produced a node answer (connection, HTTP, decoding).
    #[error("transport error: {0}")]
    Transport(String),

    /// A connection handle could not be created for the endpoint.
    #[error("cannot connect to '{endpoint}': {reason}")]
    Connect { endpoint: String, reason: String },
}

/// Result type for chain client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Stable, serializable identifier for every failure the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedChain,
    InvalidAddress,
    InvalidAmount,
    FeeUnavailable,
    ChainMismatch,
    BuildError,
    RpcTimeout,
    RejectedTransaction,
    ConfirmationTimeout,
    BroadcastError,
}

impl ErrorKind {
    /// Label used for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnsupportedChain => "unsupported_chain",
            ErrorKind::InvalidAddress => "invalid_address",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::FeeUnavailable => "fee_unavailable",
            ErrorKind::ChainMismatch => "chain_mismatch",
            ErrorKind::BuildError => "build_error",
            ErrorKind::RpcTimeout => "rpc_timeout",
            ErrorKind::RejectedTransaction => "rejected",
            ErrorKind::ConfirmationTimeout => "confirmation_timeout",
            ErrorKind::BroadcastError => "broadcast_error",
        }
    }

    /// Short human-readable summary that is safe to show in production.
    pub fn summary(self) -> &'static str {
        match self {
            ErrorKind::UnsupportedChain => "Chain is not supported or not configured",
            ErrorKind::InvalidAddress => "Invalid address",
            ErrorKind::InvalidAmount => "Invalid amount",
            ErrorKind::FeeUnavailable => "Network returned no usable fee data",
            ErrorKind::ChainMismatch => "Chain ID mismatch",
            ErrorKind::BuildError => "Failed to build transaction",
            ErrorKind::RpcTimeout => "RPC request timed out",
            ErrorKind::RejectedTransaction => "Transaction rejected by the network",
            ErrorKind::ConfirmationTimeout => {
                "Transaction submitted but not confirmed in time; it may still be mined"
            }
            ErrorKind::BroadcastError => "Failed to broadcast transaction",
        }
    }
}

/// Errors surfaced by the builder and broadcaster.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Unknown chain key, or a known chain without an RPC endpoint.
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    /// An address that is not 20 hex-encoded bytes.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// An amount that cannot be represented exactly in base units.
    #[error("Invalid amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: String },

    /// The network reported neither a gas price nor EIP-1559 fees.
    #[error("No usable fee data for chain {0}")]
    FeeUnavailable(String),

    /// The node or a signed payload disagrees with the registry's chain id.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Any network failure while constructing a transaction.
    #[error("Build failed: {0}")]
    Build(#[source] ClientError),

    /// A single RPC round trip exceeded its deadline.
    #[error("RPC timeout during {operation} after {secs} seconds")]
    Timeout { operation: &'static str, secs: u64 },

    /// The network refused the signed payload.
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// Submitted, but no receipt arrived before the confirmation deadline.
    #[error("Transaction {tx_hash} not confirmed after {secs} seconds")]
    ConfirmationTimeout { tx_hash: TxHash, secs: u64 },

    /// Any other network failure while broadcasting.
    #[error("Broadcast failed: {0}")]
    Broadcast(#[source] ClientError),
}

impl GatewayError {
    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::UnsupportedChain(_) => ErrorKind::UnsupportedChain,
            GatewayError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            GatewayError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            GatewayError::FeeUnavailable(_) => ErrorKind::FeeUnavailable,
            GatewayError::ChainMismatch { .. } => ErrorKind::ChainMismatch,
            GatewayError::Build(_) => ErrorKind::BuildError,
            GatewayError::Timeout { .. } => ErrorKind::RpcTimeout,
            GatewayError::Rejected(_) => ErrorKind::RejectedTransaction,
            GatewayError::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            GatewayError::Broadcast(_) => ErrorKind::BroadcastError,
        }
    }

    /// Whether the caller can be sure nothing reached the network's mempool.
    ///
    /// Anything that may have been accepted by a node is unsafe to retry
    /// blindly, since a second submission could double-spend.
    pub fn is_retry_safe(&self) -> bool {
        match self {
            GatewayError::ConfirmationTimeout { .. } | GatewayError::Broadcast(_) => false,
            GatewayError::Timeout { operation, .. } => !POST_SUBMIT_OPERATIONS.contains(operation),
            _ => true,
        }
    }

    /// Summary that is safe to expose in production.
    ///
    /// Rejections keep the node's reason since callers need it to fix the payload.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Rejected(reason) => {
                format!("{}: {}", ErrorKind::RejectedTransaction.summary(), reason)
            }
            other => other.kind().summary().to_string(),
        }
    }

    /// Hash of a transaction that reached the network, if this error carries one.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            GatewayError::ConfirmationTimeout { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

/// Operation label for `eth_sendRawTransaction`.
pub const SUBMIT_OPERATION: &str = "submit";

/// Operation label for receipt polling.
pub const RECEIPT_OPERATION: &str = "receipt";

/// Operation label for chain head queries while confirming.
pub const BLOCK_NUMBER_OPERATION: &str = "block_number";

/// Operations whose failure leaves the transaction's fate unknown.
const POST_SUBMIT_OPERATIONS: [&str; 3] = [SUBMIT_OPERATION, RECEIPT_OPERATION, BLOCK_NUMBER_OPERATION];

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Raw fee market data as reported by a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeData {
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Receipt fields the engine needs, independent of the RPC library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptData {
    pub transaction_hash: TxHash,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub from: Address,
    pub to: Option<Address>,
    /// Native status code (`1` success, `0` failure).
    pub status_code: u64,
}

/// ERC-20 token display information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Normalized outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Failed,
}

impl ReceiptStatus {
    /// Map the chain's native status code; anything but `1` is a failure.
    pub fn from_code(code: u64) -> Self {
        if code == 1 {
            ReceiptStatus::Success
        } else {
            ReceiptStatus::Failed
        }
    }
}
