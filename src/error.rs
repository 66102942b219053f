//! Failure signals produced by the resilience layer.
//!
//! Every variant is terminal for the operation that produced it. The HTTP
//! mapping lives in `http::response`.

use thiserror::Error;

use crate::resilience::circuit_breaker::CircuitState;

/// Errors surfaced to callers of the breaker, client, limiter and credential cache.
#[derive(Debug, Clone, Error)]
pub enum MeshError {
    /// Breaker is open, or half-open with its probe budget spent. No I/O happened.
    #[error("circuit for '{dependency}' is {state}; call rejected")]
    CircuitOpen {
        dependency: String,
        state: CircuitState,
    },

    /// Every permitted attempt failed with a transport error or a 5xx status.
    #[error("dependency '{dependency}' unavailable after {attempts} attempt(s): {last_error}")]
    DownstreamUnavailable {
        dependency: String,
        attempts: u32,
        last_error: String,
    },

    /// Sliding window for `key` is saturated.
    #[error("Rate limit exceeded ({limit} requests per {window_secs} seconds)")]
    RateLimitExceeded {
        key: String,
        limit: usize,
        window_secs: u64,
    },

    /// Service account disabled or token minting failed.
    #[error("service credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// No breaker or endpoint registered under this name.
    #[error("unknown dependency '{0}'")]
    UnknownDependency(String),

    /// Request path does not resolve under the dependency's base URL.
    #[error("path '{path}' does not resolve under dependency '{dependency}'")]
    InvalidPath { dependency: String, path: String },
}

impl MeshError {
    /// Stable machine-readable code used in error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            MeshError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            MeshError::DownstreamUnavailable { .. } => "DOWNSTREAM_UNAVAILABLE",
            MeshError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            MeshError::CredentialUnavailable(_) => "CREDENTIAL_UNAVAILABLE",
            MeshError::UnknownDependency(_) => "UNKNOWN_DEPENDENCY",
            MeshError::InvalidPath { .. } => "INVALID_PATH",
        }
    }

    /// True for the two "upstream dependency unavailable" kinds.
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(
            self,
            MeshError::CircuitOpen { .. } | MeshError::DownstreamUnavailable { .. }
        )
    }
}

/// Result type for resilience-layer operations.
pub type MeshResult<T> = Result<T, MeshError>;
