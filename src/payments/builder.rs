//! Transaction builder.
//!
//! # Responsibilities
//! - Resolve the chain and its connection
//! - Encode native or token transfers with exact base-unit amounts
//! - Populate gas limit, exactly one fee model and the pending nonce
//! - Describe the result (fee estimate, token info) for the caller
//!
//! Network failures are wrapped, never retried here.

use alloy::primitives::{Address, Bytes, U256, U64};
use alloy::rpc::types::TransactionRequest;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::abi::encode_transfer;
use crate::blockchain::client::ChainClient;
use crate::blockchain::fees::{FeeQuote, FeeResolver};
use crate::blockchain::pool::ConnectionPool;
use crate::blockchain::registry::{ChainConfig, ChainRegistry};
use crate::blockchain::types::{GatewayError, GatewayResult, TokenInfo};
use crate::blockchain::units::{format_units, parse_units};
use crate::payments::types::{
    parse_address, BuiltPayment, DecimalsSource, GasLimitSource, PaymentMetadata, PaymentRequest,
    TokenDisplay, UnsignedTransaction,
};
use crate::resilience::with_timeout;

/// Gas limit of a plain value transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Decimals assumed for a token whose contract cannot be read.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Fee currency marker for token transfers.
const TOKEN_FEE_CURRENCY: &str = "TOKEN";

/// Builder knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct BuilderSettings {
    pub rpc_timeout: Duration,
    /// Sender used when a request does not name one.
    pub default_sender: Option<Address>,
    /// Gas limit for token transfers when estimation fails.
    pub token_gas_limit: u64,
}

enum Transfer {
    /// Value in native base units.
    Native(U256),
    /// Token contract address.
    Token(Address),
}

/// Transfer-specific parts of a transaction.
struct TransferPlan {
    to: Address,
    value: U256,
    data: Bytes,
    gas_limit: u64,
    gas_limit_source: GasLimitSource,
    amount_base_units: U256,
    token: Option<TokenDisplay>,
}

/// Assembles unsigned transactions.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    registry: Arc<ChainRegistry>,
    pool: Arc<ConnectionPool>,
    fees: FeeResolver,
    settings: BuilderSettings,
}

impl TxBuilder {
    pub fn new(registry: Arc<ChainRegistry>, pool: Arc<ConnectionPool>, settings: BuilderSettings) -> Self {
        Self {
            registry,
            pool,
            fees: FeeResolver::new(settings.rpc_timeout),
            settings,
        }
    }

    /// Build an unsigned transaction for `request`.
    pub async fn build(&self, request: &PaymentRequest) -> GatewayResult<BuiltPayment> {
        let chain = self.registry.resolve(&request.chain)?;
        let recipient = parse_address(&request.to)?;
        let token_address = request
            .token_address
            .as_deref()
            .map(parse_address)
            .transpose()?;
        let sender = self.sender_for(request)?;
        let amount = request.amount.as_decimal_string();

        // Native amounts can be checked before touching the network.
        let transfer = match token_address {
            Some(token) => Transfer::Token(token),
            None => Transfer::Native(scale_amount(&amount, chain.native_decimals)?),
        };

        let client = self.pool.acquire(chain).map_err(GatewayError::Build)?;
        self.verify_chain_id(client.as_ref(), chain).await?;

        let plan = match transfer {
            Transfer::Token(token) => {
                self.plan_token_transfer(client.as_ref(), request, &amount, token, recipient, sender)
                    .await?
            }
            Transfer::Native(value) => TransferPlan {
                to: recipient,
                value,
                data: Bytes::new(),
                gas_limit: NATIVE_TRANSFER_GAS,
                gas_limit_source: GasLimitSource::Default,
                amount_base_units: value,
                token: None,
            },
        };

        let fees = self.fees.resolve_fees(client.as_ref(), &chain.id).await?;
        let nonce = self.fees.resolve_nonce(client.as_ref(), sender).await?;

        let metadata = describe(chain, &plan, &fees, sender, recipient);
        let transaction = UnsignedTransaction {
            chain_id: chain.chain_id,
            to: plan.to,
            value: plan.value,
            data: plan.data,
            gas_limit: U64::from(plan.gas_limit),
            fees,
            nonce: U64::from(nonce),
        };

        tracing::info!(
            chain = %chain.id,
            token = transaction.is_token_transfer(),
            nonce,
            gas_limit = plan.gas_limit,
            estimated_fee = %metadata.estimated_fee,
            "Transaction built"
        );

        Ok(BuiltPayment {
            transaction,
            metadata,
        })
    }

    fn sender_for(&self, request: &PaymentRequest) -> GatewayResult<Address> {
        match request.from.as_deref() {
            Some(from) => parse_address(from),
            None => self
                .settings
                .default_sender
                .ok_or_else(|| GatewayError::InvalidAddress("no sender address configured".to_string())),
        }
    }

    async fn verify_chain_id(&self, client: &dyn ChainClient, chain: &ChainConfig) -> GatewayResult<()> {
        let actual = with_timeout("chain_id", self.settings.rpc_timeout, client.get_chain_id())
            .await?
            .map_err(GatewayError::Build)?;

        if actual != chain.chain_id {
            tracing::error!(
                chain = %chain.id,
                expected = chain.chain_id,
                actual,
                "RPC endpoint serves a different chain"
            );
            return Err(GatewayError::ChainMismatch {
                expected: chain.chain_id,
                actual,
            });
        }
        Ok(())
    }

    async fn plan_token_transfer(
        &self,
        client: &dyn ChainClient,
        request: &PaymentRequest,
        amount: &str,
        token: Address,
        recipient: Address,
        sender: Address,
    ) -> GatewayResult<TransferPlan> {
        let info = self.read_token(client, token).await;
        let (decimals, source) = match (request.token_decimals, &info) {
            (Some(decimals), _) => (decimals, DecimalsSource::Request),
            (None, Some(info)) => (info.decimals, DecimalsSource::Contract),
            (None, None) => {
                tracing::warn!(token = %token, "Token decimals unknown, assuming {}", DEFAULT_TOKEN_DECIMALS);
                (DEFAULT_TOKEN_DECIMALS, DecimalsSource::Assumed)
            }
        };

        let amount_base_units = scale_amount(amount, decimals)?;
        let data = encode_transfer(recipient, amount_base_units);

        let estimate = TransactionRequest::default()
            .from(sender)
            .to(token)
            .input(data.clone().into());
        let (gas_limit, gas_limit_source) = match with_timeout(
            "estimate_gas",
            self.settings.rpc_timeout,
            client.estimate_gas(estimate),
        )
        .await
        {
            Ok(Ok(gas)) if gas > 0 => (gas, GasLimitSource::Estimated),
            Ok(Ok(_)) => (self.settings.token_gas_limit, GasLimitSource::Default),
            Ok(Err(e)) => {
                tracing::warn!(token = %token, error = %e, "Gas estimation failed, using default limit");
                (self.settings.token_gas_limit, GasLimitSource::Default)
            }
            Err(_) => (self.settings.token_gas_limit, GasLimitSource::Default),
        };

        Ok(TransferPlan {
            to: token,
            value: U256::ZERO,
            data,
            gas_limit,
            gas_limit_source,
            amount_base_units,
            token: Some(TokenDisplay {
                address: token,
                name: info.as_ref().map(|i| i.name.clone()),
                symbol: info.as_ref().map(|i| i.symbol.clone()),
                decimals,
                decimals_source: source,
                decimals_assumed: source == DecimalsSource::Assumed,
            }),
        })
    }

    /// Token metadata, or `None` when the contract cannot be read.
    async fn read_token(&self, client: &dyn ChainClient, token: Address) -> Option<TokenInfo> {
        match with_timeout("token_metadata", self.settings.rpc_timeout, client.token_metadata(token)).await {
            Ok(Ok(info)) => Some(info),
            Ok(Err(e)) => {
                tracing::debug!(token = %token, error = %e, "Token metadata unavailable");
                None
            }
            Err(_) => None,
        }
    }
}

fn scale_amount(amount: &str, decimals: u8) -> GatewayResult<U256> {
    parse_units(amount, decimals).map_err(|reason| GatewayError::InvalidAmount {
        value: amount.to_string(),
        reason,
    })
}

fn describe(
    chain: &ChainConfig,
    plan: &TransferPlan,
    fees: &FeeQuote,
    sender: Address,
    recipient: Address,
) -> PaymentMetadata {
    let max_cost = fees.max_cost(plan.gas_limit);
    let fee_currency = match plan.token {
        Some(_) => TOKEN_FEE_CURRENCY.to_string(),
        None => chain.currency_symbol.clone(),
    };

    PaymentMetadata {
        estimated_fee: format_units(max_cost, chain.native_decimals),
        estimated_fee_base_units: max_cost,
        fee_currency,
        fee_model: if fees.is_eip1559() { "eip1559" } else { "legacy" },
        gas_limit_source: plan.gas_limit_source,
        sender,
        recipient,
        amount_base_units: plan.amount_base_units,
        chain: chain.id.clone(),
        chain_name: chain.display_name.clone(),
        is_testnet: chain.is_testnet,
        token_info: plan.token.clone(),
    }
}
