//! Per-attempt timeout enforcement.
//!
//! Every outbound attempt gets its own deadline; there is no deadline spanning
//! a whole retry sequence. Elapsed deadlines surface as
//! `TransportError::Timeout`, distinct from connection failures.

use std::future::Future;
use std::time::Duration;

use crate::resilience::transport::TransportError;

/// Run `attempt`, failing with `TransportError::Timeout` once `limit` elapses.
pub async fn with_timeout<F, T>(limit: Duration, attempt: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}
