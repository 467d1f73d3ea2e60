//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every network call with a deadline
//! - Record call latency per operation
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Timeout errors are distinct from other errors
//! - No retries here: retrying a broadcast could submit twice

use std::future::Future;
use std::time::{Duration, Instant};

use crate::blockchain::types::GatewayError;
use crate::observability::metrics;

/// A call that did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut {
    pub operation: &'static str,
    pub limit: Duration,
}

impl From<TimedOut> for GatewayError {
    fn from(t: TimedOut) -> Self {
        GatewayError::Timeout {
            operation: t.operation,
            secs: t.limit.as_secs(),
        }
    }
}

/// Run `fut` with a deadline, recording its latency under `operation`.
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let result = tokio::time::timeout(limit, fut).await;
    metrics::record_rpc_duration(operation, started.elapsed());

    result.map_err(|_| {
        tracing::warn!(operation, limit_ms = limit.as_millis() as u64, "RPC call timed out");
        TimedOut { operation, limit }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_in_time() {
        let value = with_timeout("fast", Duration::from_secs(1), async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let result = with_timeout("slow", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .await;

        let timed_out = result.unwrap_err();
        assert_eq!(timed_out.operation, "slow");

        let err: GatewayError = timed_out.into();
        assert_eq!(err.to_string(), "RPC timeout during slow after 2 seconds");
    }
}
