//! Typed helpers for calls between the booking services.
//!
//! Every helper authenticates as the service account. When
//! `client.stub_fallback` is on, an unavailable dependency yields a
//! permissive default instead of an error.

pub mod bookings;
pub mod rooms;
pub mod users;

use reqwest::StatusCode;
use thiserror::Error;

use crate::error::MeshError;
use crate::resilience::client::ResilientClient;
use crate::resilience::transport::OutboundResponse;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error("{dependency} answered {status}")]
    UnexpectedStatus {
        dependency: &'static str,
        status: StatusCode,
    },

    #[error("{dependency} returned an undecodable body: {source}")]
    Decode {
        dependency: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    fn is_upstream_unavailable(&self) -> bool {
        matches!(self, ClientError::Mesh(e) if e.is_upstream_unavailable())
    }
}

fn expect_success(
    dependency: &'static str,
    response: &OutboundResponse,
) -> Result<(), ClientError> {
    if response.status.is_success() {
        Ok(())
    } else {
        Err(ClientError::UnexpectedStatus {
            dependency,
            status: response.status,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    dependency: &'static str,
    response: &OutboundResponse,
) -> Result<T, ClientError> {
    response
        .json()
        .map_err(|source| ClientError::Decode { dependency, source })
}

/// Replace an upstream-unavailable failure with `fallback` when enabled.
fn with_fallback<T>(
    client: &ResilientClient,
    operation: &str,
    result: Result<T, ClientError>,
    fallback: T,
) -> Result<T, ClientError> {
    match result {
        Err(err) if client.settings().stub_fallback && err.is_upstream_unavailable() => {
            tracing::warn!(operation, error = %err, "Dependency unavailable, using fallback");
            Ok(fallback)
        }
        other => other,
    }
}
