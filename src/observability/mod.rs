//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! builder / broadcaster / pool produce:
//!     → logging.rs (structured log events, request_id spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr log output
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Every build/broadcast runs in a span carrying its request id
//! - Raw signed payloads are never logged
//! - Recording without an installed exporter is a no-op

pub mod logging;
pub mod metrics;
