//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a chain node:
//!     → timeouts.rs (enforce per-call deadline, record latency)
//!     → on expiry: GatewayError::Timeout, surfaced to the caller as-is
//! ```
//!
//! # Design Decisions
//! - Every chain node call has a deadline, including receipt polls
//! - Retry policy belongs to the caller, never to the engine

pub mod timeouts;

pub use timeouts::{with_timeout, TimedOut};
