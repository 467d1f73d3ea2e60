//! Fee market and nonce resolution.
//!
//! # Responsibilities
//! - Turn a node's fee data into exactly one fee model
//! - Fetch the sender's pending nonce
//!
//! Concurrent builds for the same sender can observe the same pending
//! nonce; ordering submissions is the caller's job.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{FeeData, GatewayError, GatewayResult};
use crate::resilience::with_timeout;

/// Fee fields for a transaction; exactly one model is ever populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeeQuote {
    /// EIP-1559 base/priority pricing.
    #[serde(rename_all = "camelCase")]
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
    /// Single gas price.
    #[serde(rename_all = "camelCase")]
    Legacy {
        gas_price: U256,
    },
}

impl FeeQuote {
    /// Pick a fee model from raw fee data.
    ///
    /// EIP-1559 wins when the node reports both. Zero prices count as
    /// missing so a transaction is never priced at nothing.
    pub fn from_fee_data(data: &FeeData) -> Option<Self> {
        let max_fee = data.max_fee_per_gas.filter(|v| *v > 0);
        match (max_fee, data.max_priority_fee_per_gas) {
            (Some(max_fee), Some(priority)) => Some(FeeQuote::Eip1559 {
                max_fee_per_gas: U256::from(max_fee),
                max_priority_fee_per_gas: U256::from(priority.min(max_fee)),
            }),
            _ => data
                .gas_price
                .filter(|v| *v > 0)
                .map(|gas_price| FeeQuote::Legacy {
                    gas_price: U256::from(gas_price),
                }),
        }
    }

    /// Highest price per gas the transaction may pay.
    pub fn max_price_per_gas(&self) -> U256 {
        match self {
            FeeQuote::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
            FeeQuote::Legacy { gas_price } => *gas_price,
        }
    }

    /// Upper bound of the fee for `gas_limit` gas, in the native base unit.
    pub fn max_cost(&self, gas_limit: u64) -> U256 {
        self.max_price_per_gas().saturating_mul(U256::from(gas_limit))
    }

    pub fn is_eip1559(&self) -> bool {
        matches!(self, FeeQuote::Eip1559 { .. })
    }
}

/// Queries fee market data and nonces with a per-call deadline.
#[derive(Debug, Clone, Copy)]
pub struct FeeResolver {
    rpc_timeout: Duration,
}

impl FeeResolver {
    pub fn new(rpc_timeout: Duration) -> Self {
        Self { rpc_timeout }
    }

    /// Current fee quote for the chain behind `client`.
    pub async fn resolve_fees(&self, client: &dyn ChainClient, chain: &str) -> GatewayResult<FeeQuote> {
        let data = with_timeout("fee_data", self.rpc_timeout, client.get_fee_data())
            .await?
            .map_err(GatewayError::Build)?;

        let quote = FeeQuote::from_fee_data(&data).ok_or_else(|| {
            tracing::warn!(chain = %chain, fee_data = ?data, "Node reported no usable fee data");
            GatewayError::FeeUnavailable(chain.to_string())
        })?;

        tracing::debug!(
            chain = %chain,
            eip1559 = quote.is_eip1559(),
            price = %quote.max_price_per_gas(),
            "Fee quote resolved"
        );
        Ok(quote)
    }

    /// Pending nonce for `address`.
    pub async fn resolve_nonce(&self, client: &dyn ChainClient, address: Address) -> GatewayResult<u64> {
        with_timeout("nonce", self.rpc_timeout, client.get_transaction_count(address))
            .await?
            .map_err(GatewayError::Build)
    }
}
