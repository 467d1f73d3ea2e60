//! Shared utilities for integration tests.

#![allow(dead_code)]

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::signers::local::PrivateKeySigner;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tx_gateway::blockchain::mock::MockChainClient;
use tx_gateway::blockchain::registry::ChainRegistry;
use tx_gateway::blockchain::types::{ClientError, ClientResult};
use tx_gateway::blockchain::{ChainClient, ClientFactory, ConnectionPool};
use tx_gateway::config::{ChainEntry, GatewayConfig};
use tx_gateway::payments::{PaymentGateway, UnsignedTransaction};

/// Mixed-case checksummed recipient.
pub const RECIPIENT: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

/// Mixed-case token contract.
pub const TOKEN: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

/// First Anvil development key.
pub const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address of [`DEV_KEY`].
pub const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Client factory serving pre-built mocks by endpoint and counting connections.
pub struct MockFactory {
    clients: HashMap<String, Arc<MockChainClient>>,
    created: AtomicUsize,
}

impl MockFactory {
    pub fn new(clients: impl IntoIterator<Item = (&'static str, MockChainClient)>) -> Arc<Self> {
        Arc::new(Self {
            clients: clients
                .into_iter()
                .map(|(endpoint, client)| (endpoint.to_string(), Arc::new(client)))
                .collect(),
            created: AtomicUsize::new(0),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn client(&self, endpoint: &str) -> Arc<MockChainClient> {
        self.clients[endpoint].clone()
    }
}

impl ClientFactory for MockFactory {
    fn connect(&self, endpoint: &str) -> ClientResult<Arc<dyn ChainClient>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        match self.clients.get(endpoint) {
            Some(client) => Ok(client.clone() as Arc<dyn ChainClient>),
            None => Err(ClientError::Connect {
                endpoint: endpoint.to_string(),
                reason: "no mock registered".to_string(),
            }),
        }
    }
}

/// Config with a default sender and fast confirmation polling.
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        sender_address: Some(DEV_ADDRESS.to_string()),
        confirmation_timeout_secs: 30,
        confirmation_poll_ms: 500,
        ..Default::default()
    }
}

/// Point `chain` at `endpoint` in `config`.
pub fn with_rpc(mut config: GatewayConfig, chain: &str, endpoint: &str) -> GatewayConfig {
    config.chains.insert(
        chain.to_string(),
        ChainEntry {
            rpc: Some(endpoint.to_string()),
            ..Default::default()
        },
    );
    config
}

/// Gateway whose chains come only from `config` (no process environment).
pub fn gateway(config: &GatewayConfig, factory: Arc<MockFactory>) -> PaymentGateway {
    let registry = ChainRegistry::from_config_with_env(config, |_| None);
    PaymentGateway::new(config, registry, ConnectionPool::new(factory)).unwrap()
}

/// Sign `tx` with the development key and return the 0x-prefixed raw payload.
pub async fn sign(tx: &UnsignedTransaction) -> String {
    let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
    let from = signer.address();
    let wallet = EthereumWallet::from(signer);

    let envelope = tx
        .to_transaction_request()
        .with_from(from)
        .build(&wallet)
        .await
        .unwrap();
    format!("0x{}", alloy::hex::encode(envelope.encoded_2718()))
}
