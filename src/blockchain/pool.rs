//! Connection pool of chain client handles.
//!
//! # Responsibilities
//! - Hand out one shared handle per distinct RPC endpoint
//! - Create handles lazily on first use
//! - Guarantee a single creation per endpoint under concurrent first access
//!
//! # Design Decisions
//! - Keyed by endpoint string, not chain key: chains sharing an endpoint share a handle
//! - Handles live for the life of the pool; there is no eviction

use dashmap::DashMap;
use std::sync::Arc;

use crate::blockchain::client::{AlloyClientFactory, ChainClient, ClientFactory};
use crate::blockchain::registry::ChainConfig;
use crate::blockchain::types::{ClientError, ClientResult};
use crate::observability::metrics;

/// Shared cache of chain client handles.
pub struct ConnectionPool {
    connections: DashMap<String, Arc<dyn ChainClient>>,
    factory: Arc<dyn ClientFactory>,
}

impl ConnectionPool {
    /// Create an empty pool that connects through `factory`.
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            connections: DashMap::new(),
            factory,
        }
    }

    /// Create an empty pool of JSON-RPC clients.
    pub fn with_rpc_clients() -> Self {
        Self::new(Arc::new(AlloyClientFactory))
    }

    /// Get the handle for a chain's endpoint, creating it on first use.
    pub fn acquire(&self, chain: &ChainConfig) -> ClientResult<Arc<dyn ChainClient>> {
        let endpoint = chain.endpoint().ok_or_else(|| ClientError::Connect {
            endpoint: String::new(),
            reason: format!("chain '{}' has no RPC endpoint", chain.id),
        })?;

        if let Some(existing) = self.connections.get(endpoint) {
            return Ok(existing.value().clone());
        }

        // The entry holds the shard write lock while the factory runs, so
        // racing callers wait and then observe the inserted handle.
        let entry = self
            .connections
            .entry(endpoint.to_string())
            .or_try_insert_with(|| {
                tracing::info!(chain = %chain.id, endpoint = %endpoint, "Creating RPC connection");
                self.factory.connect(endpoint)
            })?;
        let client = entry.value().clone();
        drop(entry);

        metrics::record_pool_size(self.connections.len());
        Ok(client)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no handle has been created yet.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connections", &self.connections.len())
            .finish()
    }
}
