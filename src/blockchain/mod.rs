//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig + environment (RPC URLs)
//!     → registry.rs (chain table, case-insensitive lookup)
//!     → pool.rs (one client per endpoint, created lazily)
//!     → client.rs (JSON-RPC calls via alloy)
//!     → fees.rs (fee model + pending nonce)
//! ```
//!
//! # Security Constraints
//! - No private keys: transactions are signed outside this crate
//! - Never log signed payloads
//! - All RPC calls are bounded by timeouts
//! - Unconfigured chains are unusable, not errors at startup

pub mod abi;
pub mod client;
pub mod fees;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod pool;
pub mod registry;
pub mod types;
pub mod units;

pub use client::{AlloyChainClient, ChainClient, ClientFactory};
pub use pool::ConnectionPool;
pub use registry::{ChainConfig, ChainRegistry};
pub use types::{ErrorKind, GatewayError, GatewayResult};
