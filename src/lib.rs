//! Multi-chain transaction gateway library.
//!
//! Builds unsigned native and ERC-20 transfers from live network data and
//! relays externally signed transactions, returning normalized receipts.

pub mod blockchain;
pub mod config;
pub mod observability;
pub mod payments;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use payments::PaymentGateway;
