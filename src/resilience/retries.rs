//! Attempt outcome classification.
//!
//! # Design Decisions
//! - Transport errors (timeout, connection) and status >= 500 are failures:
//!   they count against the breaker and are retried
//! - Everything below 500, including 4xx, is a success for the breaker and is
//!   returned to the caller unchanged
//! - Every method is retried; callers are trusted to send idempotent calls

use reqwest::StatusCode;
use thiserror::Error;

use crate::resilience::transport::{OutboundResponse, TransportError};

/// Why a single attempt counted as a failure.
#[derive(Debug, Clone, Error)]
pub enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server error status {0}")]
    ServerError(StatusCode),
}

impl AttemptFailure {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptFailure::Transport(TransportError::Timeout(_)) => "timeout",
            AttemptFailure::Transport(TransportError::Connect(_)) => "connect",
            AttemptFailure::Transport(TransportError::Request(_)) => "transport",
            AttemptFailure::ServerError(_) => "server_error",
        }
    }
}

/// True if a response with this status counts as a dependency failure.
pub fn is_failure_status(status: StatusCode) -> bool {
    status.as_u16() >= 500
}

/// Split an attempt result into a breaker success or a retryable failure.
pub fn classify(
    result: Result<OutboundResponse, TransportError>,
) -> Result<OutboundResponse, AttemptFailure> {
    let response = result?;
    if is_failure_status(response.status) {
        return Err(AttemptFailure::ServerError(response.status));
    }
    Ok(response)
}
