//! Error → HTTP response mapping.
//!
//! Every failure leaving the service uses the same JSON body:
//! `{ "error_code": ..., "message": ..., "details": ... }`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::MeshError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error_code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl MeshError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MeshError::CircuitOpen { .. }
            | MeshError::DownstreamUnavailable { .. }
            | MeshError::CredentialUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MeshError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            MeshError::UnknownDependency(_) => StatusCode::NOT_FOUND,
            MeshError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            MeshError::CircuitOpen { dependency, state } => Some(json!({
                "dependency": dependency,
                "state": state,
            })),
            MeshError::DownstreamUnavailable { dependency, attempts, .. } => Some(json!({
                "dependency": dependency,
                "attempts": attempts,
            })),
            MeshError::RateLimitExceeded { limit, window_secs, .. } => Some(json!({
                "limit": limit,
                "window_seconds": window_secs,
            })),
            MeshError::UnknownDependency(name) => Some(json!({ "dependency": name })),
            MeshError::InvalidPath { dependency, .. } => Some(json!({ "dependency": dependency })),
            MeshError::CredentialUnavailable(_) => None,
        }
    }
}

impl IntoResponse for MeshError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error_code: self.error_code(),
            message: self.to_string(),
            details: self.details(),
        };

        let mut response = (status, Json(body)).into_response();
        if let MeshError::RateLimitExceeded { window_secs, .. } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(window_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_response() {
        let err = MeshError::RateLimitExceeded {
            key: "/api:127.0.0.1".into(),
            limit: 30,
            window_secs: 60,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");

        let body = body_json(response).await;
        assert_eq!(body["error_code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(body["message"], "Rate limit exceeded (30 requests per 60 seconds)");
        assert_eq!(body["details"]["limit"], 30);
        assert_eq!(body["details"]["window_seconds"], 60);
    }

    #[tokio::test]
    async fn test_upstream_failures_are_503() {
        let open = MeshError::CircuitOpen {
            dependency: "rooms".into(),
            state: CircuitState::Open,
        };
        let response = open.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error_code"], "CIRCUIT_OPEN");
        assert_eq!(body["details"]["state"], "open");

        let down = MeshError::DownstreamUnavailable {
            dependency: "rooms".into(),
            attempts: 3,
            last_error: "connection refused".into(),
        };
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_credential_error_has_no_details() {
        let response = MeshError::CredentialUnavailable("disabled".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error_code"], "CREDENTIAL_UNAVAILABLE");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_unknown_dependency_is_404() {
        assert_eq!(
            MeshError::UnknownDependency("payments".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_invalid_path_is_400() {
        let err = MeshError::InvalidPath {
            dependency: "rooms".into(),
            path: "//elsewhere.test/x".into(),
        };
        assert!(!err.is_upstream_unavailable());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error_code"], "INVALID_PATH");
        assert_eq!(body["details"]["dependency"], "rooms");
    }
}
