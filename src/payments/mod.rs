//! Payment construction and relay.
//!
//! # Data Flow
//! ```text
//! PaymentRequest
//!     → builder.rs (registry → pool → fees/nonce → UnsignedTransaction)
//!     → caller signs externally
//!     → broadcaster.rs (decode → submit → poll receipt → BroadcastReceipt)
//! gateway.rs wraps both into non-raising result envelopes.
//! ```

pub mod broadcaster;
pub mod builder;
pub mod gateway;
pub mod types;

pub use gateway::{BroadcastResponse, BuildPaymentResponse, PaymentGateway, ProviderInfo};
pub use types::{Amount, BroadcastReceipt, PaymentRequest, UnsignedTransaction};
