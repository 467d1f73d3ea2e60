//! Payment gateway facade.
//!
//! # Responsibilities
//! - Own the registry, pool, builder and broadcaster for the process
//! - Turn every outcome into a tagged result value (never an `Err`)
//! - Tag each call with a request id, span and metrics
//!
//! # Design Decisions
//! - Internal error text only leaves the engine in development mode
//! - One pool shared by builder and broadcaster

use alloy::primitives::{Address, TxHash};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::Instrument;
use uuid::Uuid;

use crate::blockchain::client::ClientFactory;
use crate::blockchain::pool::ConnectionPool;
use crate::blockchain::registry::{ChainConfig, ChainRegistry};
use crate::blockchain::types::{ErrorKind, GatewayError, GatewayResult};
use crate::config::schema::{GatewayConfig, OperatingMode};
use crate::observability::metrics;
use crate::payments::broadcaster::{BroadcastSettings, Broadcaster};
use crate::payments::builder::{BuilderSettings, TxBuilder};
use crate::payments::types::{
    parse_address, BroadcastReceipt, PaymentMetadata, PaymentRequest, UnsignedTransaction,
};

const PROVIDER_ID: &str = "veripay";
const PROVIDER_NAME: &str = "VeriPay";
const PROVIDER_FEATURES: [&str; 2] = ["payments", "token-transfers"];

/// Lifecycle tag of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    ReadyForSigning,
    Broadcasted,
    Error,
}

/// Failure half of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub error: ErrorKind,
    pub message: String,
    /// Raw error text; development mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// False when the network may already have seen the transaction.
    pub retry_safe: bool,
}

impl Failure {
    fn from_error(err: &GatewayError, mode: OperatingMode) -> Self {
        Self {
            error: err.kind(),
            message: err.public_message(),
            details: mode.exposes_details().then(|| err.to_string()),
            retry_safe: err.is_retry_safe(),
        }
    }
}

/// Result of [`PaymentGateway::build_payment`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPaymentResponse {
    pub success: bool,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<UnsignedTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PaymentMetadata>,
    #[serde(flatten)]
    pub failure: Option<Failure>,
    pub preview: bool,
    pub timestamp: u64,
    pub request_id: Uuid,
}

/// Result of [`PaymentGateway::broadcast_signed_transaction`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub success: bool,
    pub status: ResultStatus,
    /// Present on success, and on confirmation timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<BroadcastReceipt>,
    #[serde(flatten)]
    pub failure: Option<Failure>,
    pub timestamp: u64,
    pub request_id: Uuid,
}

/// Static description of this payment provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub features: Vec<&'static str>,
    pub chains: Vec<ChainConfig>,
}

/// Entry point for building and broadcasting payments.
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    registry: Arc<ChainRegistry>,
    pool: Arc<ConnectionPool>,
    builder: TxBuilder,
    broadcaster: Broadcaster,
    mode: OperatingMode,
}

impl PaymentGateway {
    /// Gateway with JSON-RPC clients and chains from config plus environment.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        Self::new(
            config,
            ChainRegistry::from_config(config),
            ConnectionPool::with_rpc_clients(),
        )
    }

    /// Gateway with chains from config plus environment and a custom client factory.
    pub fn with_factory(config: &GatewayConfig, factory: Arc<dyn ClientFactory>) -> GatewayResult<Self> {
        Self::new(config, ChainRegistry::from_config(config), ConnectionPool::new(factory))
    }

    /// Gateway from explicit parts.
    pub fn new(config: &GatewayConfig, registry: ChainRegistry, pool: ConnectionPool) -> GatewayResult<Self> {
        let default_sender: Option<Address> = config
            .sender_address
            .as_deref()
            .map(parse_address)
            .transpose()?;

        let registry = Arc::new(registry);
        let pool = Arc::new(pool);
        let rpc_timeout = Duration::from_secs(config.rpc_timeout_secs);

        let builder = TxBuilder::new(
            registry.clone(),
            pool.clone(),
            BuilderSettings {
                rpc_timeout,
                default_sender,
                token_gas_limit: config.token_gas_limit,
            },
        );
        let broadcaster = Broadcaster::new(
            registry.clone(),
            pool.clone(),
            BroadcastSettings {
                rpc_timeout,
                confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
                poll_interval: Duration::from_millis(config.confirmation_poll_ms),
                confirmation_blocks: u64::from(config.confirmation_blocks),
            },
        );

        tracing::info!(
            mode = ?config.mode,
            chains = registry.configured().count(),
            sender_configured = default_sender.is_some(),
            "Payment gateway ready"
        );

        Ok(Self {
            registry,
            pool,
            builder,
            broadcaster,
            mode: config.mode,
        })
    }

    /// Build an unsigned transaction. Never fails; errors are in the result.
    pub async fn build_payment(&self, request: PaymentRequest) -> BuildPaymentResponse {
        self.build_inner(request, false).await
    }

    /// Same as [`build_payment`](Self::build_payment), flagged as a preview.
    pub async fn build_payment_preview(&self, request: PaymentRequest) -> BuildPaymentResponse {
        self.build_inner(request, true).await
    }

    async fn build_inner(&self, request: PaymentRequest, preview: bool) -> BuildPaymentResponse {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("build_payment", %request_id, chain = %request.chain, preview);
        let chain_label = self.chain_label(&request.chain);

        let result = self.builder.build(&request).instrument(span.clone()).await;

        let _enter = span.enter();
        match result {
            Ok(built) => {
                metrics::record_build(&chain_label, "success");
                BuildPaymentResponse {
                    success: true,
                    status: ResultStatus::ReadyForSigning,
                    transaction: Some(built.transaction),
                    metadata: Some(built.metadata),
                    failure: None,
                    preview,
                    timestamp: unix_now(),
                    request_id,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, kind = err.kind().as_str(), "Build failed");
                metrics::record_build(&chain_label, err.kind().as_str());
                BuildPaymentResponse {
                    success: false,
                    status: ResultStatus::Error,
                    transaction: None,
                    metadata: None,
                    failure: Some(Failure::from_error(&err, self.mode)),
                    preview,
                    timestamp: unix_now(),
                    request_id,
                }
            }
        }
    }

    /// Broadcast a signed transaction and wait for its receipt. Never fails;
    /// errors are in the result.
    pub async fn broadcast_signed_transaction(&self, chain: &str, signed_tx_hex: &str) -> BroadcastResponse {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("broadcast", %request_id, chain = %chain);
        let chain_label = self.chain_label(chain);

        let result = self
            .broadcaster
            .broadcast(chain, signed_tx_hex)
            .instrument(span.clone())
            .await;

        let _enter = span.enter();
        match result {
            Ok(receipt) => {
                metrics::record_broadcast(&chain_label, "success");
                BroadcastResponse {
                    success: true,
                    status: ResultStatus::Broadcasted,
                    tx_hash: Some(receipt.tx_hash),
                    receipt: Some(receipt),
                    failure: None,
                    timestamp: unix_now(),
                    request_id,
                }
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    kind = err.kind().as_str(),
                    retry_safe = err.is_retry_safe(),
                    "Broadcast failed"
                );
                metrics::record_broadcast(&chain_label, err.kind().as_str());
                BroadcastResponse {
                    success: false,
                    status: ResultStatus::Error,
                    tx_hash: err.tx_hash(),
                    receipt: None,
                    failure: Some(Failure::from_error(&err, self.mode)),
                    timestamp: unix_now(),
                    request_id,
                }
            }
        }
    }

    /// Chains that can currently be used.
    pub fn supported_chains(&self) -> Vec<ChainConfig> {
        self.registry.configured().cloned().collect()
    }

    pub fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            id: PROVIDER_ID,
            name: PROVIDER_NAME,
            version: env!("CARGO_PKG_VERSION"),
            features: PROVIDER_FEATURES.to_vec(),
            chains: self.supported_chains(),
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// Live connection handles.
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Registry key for metrics; unknown keys share one label.
    fn chain_label(&self, chain: &str) -> String {
        self.registry
            .get(chain)
            .map(|c| c.id.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::client::ChainClient;
    use crate::blockchain::mock::MockChainClient;
    use crate::blockchain::types::{ClientError, ClientResult};

    const RECIPIENT: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

    fn gateway(mode: OperatingMode, client: MockChainClient) -> PaymentGateway {
        let config = GatewayConfig {
            mode,
            sender_address: Some("0x1111111111111111111111111111111111111111".into()),
            ..Default::default()
        };
        let registry = ChainRegistry::from_config_with_env(&config, |key| {
            (key == "ETH_RPC").then(|| "mock://eth".to_string())
        });
        let client: Arc<dyn ChainClient> = Arc::new(client);
        let factory = move |_: &str| -> ClientResult<Arc<dyn ChainClient>> { Ok(client.clone()) };

        PaymentGateway::new(&config, registry, ConnectionPool::new(Arc::new(factory))).unwrap()
    }

    #[tokio::test]
    async fn test_build_success_envelope() {
        let gw = gateway(OperatingMode::Production, MockChainClient::new("mock://eth", 1));

        let response = gw
            .build_payment(PaymentRequest::native("ethereum", RECIPIENT, "0.1"))
            .await;
        assert!(response.success);
        assert_eq!(response.status, ResultStatus::ReadyForSigning);
        assert!(!response.preview);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ready_for_signing");
        assert_eq!(json["transaction"]["to"], RECIPIENT.to_lowercase());
        assert_eq!(json["transaction"]["data"], "0x");
        assert!(json.get("error").is_none());
        assert!(json["requestId"].is_string());
    }

    #[tokio::test]
    async fn test_preview_flag() {
        let gw = gateway(OperatingMode::Production, MockChainClient::new("mock://eth", 1));

        let response = gw
            .build_payment_preview(PaymentRequest::native("ethereum", RECIPIENT, "1"))
            .await;
        assert!(response.success);
        assert!(response.preview);
    }

    #[tokio::test]
    async fn test_production_hides_details() {
        let gw = gateway(
            OperatingMode::Production,
            MockChainClient::new("mock://eth", 1).failing(ClientError::Transport("tcp 10.0.0.7:8545 refused".into())),
        );

        let response = gw
            .build_payment(PaymentRequest::native("ethereum", RECIPIENT, "1"))
            .await;
        assert!(!response.success);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "BuildError");
        assert_eq!(json["retrySafe"], true);
        assert!(json.get("details").is_none());
        assert!(!json.to_string().contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_development_shows_details() {
        let gw = gateway(
            OperatingMode::Development,
            MockChainClient::new("mock://eth", 1).failing(ClientError::Transport("tcp 10.0.0.7:8545 refused".into())),
        );

        let response = gw
            .build_payment(PaymentRequest::native("ethereum", RECIPIENT, "1"))
            .await;
        let details = response.failure.unwrap().details.unwrap();
        assert!(details.contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_unconfigured_chain_result() {
        let gw = gateway(OperatingMode::Production, MockChainClient::new("mock://eth", 1));

        let response = gw
            .build_payment(PaymentRequest::native("polygon", RECIPIENT, "1"))
            .await;
        assert!(!response.success);
        assert_eq!(response.failure.unwrap().error, ErrorKind::UnsupportedChain);
        assert_eq!(gw.pool_size(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_malformed() {
        let gw = gateway(OperatingMode::Production, MockChainClient::new("mock://eth", 1));

        let response = gw.broadcast_signed_transaction("ethereum", "0xdeadbeef").await;
        assert!(!response.success);
        assert!(response.receipt.is_none());
        let failure = response.failure.unwrap();
        assert_eq!(failure.error, ErrorKind::RejectedTransaction);
        assert!(failure.retry_safe);
        assert!(!failure.message.is_empty());
    }

    #[test]
    fn test_provider_info() {
        let gw = gateway(OperatingMode::Production, MockChainClient::new("mock://eth", 1));

        let info = gw.provider_info();
        assert_eq!(info.id, "veripay");
        assert_eq!(info.features, vec!["payments", "token-transfers"]);
        let chains: Vec<_> = info.chains.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(chains, vec!["ethereum"]);

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["chains"][0].get("rpcEndpoint").is_none());
        assert_eq!(json["chains"][0]["chainId"], 1);
    }

    #[test]
    fn test_invalid_configured_sender() {
        let config = GatewayConfig {
            sender_address: Some("not-an-address".into()),
            ..Default::default()
        };
        let pool = ConnectionPool::with_rpc_clients();
        let err = PaymentGateway::new(&config, ChainRegistry::default(), pool).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
    }
}
