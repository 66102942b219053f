use axum::{extract::State, Json};
use serde::Serialize;
use std::time::UNIX_EPOCH;

use crate::http::server::AppState;
use crate::resilience::circuit_breaker::BreakerSnapshot;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub dependencies: usize,
    pub breaker_enabled: bool,
    pub rate_limit_enabled: bool,
    pub service_account_enabled: bool,
    /// Unix expiry of the cached service token, if one was minted.
    pub token_expires_at: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatus {
    pub enabled: bool,
    pub window_seconds: u64,
    pub max_requests: usize,
    pub tracked_keys: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let token_expires_at = state
        .credentials
        .cached_expiry()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        dependencies: state.client.breakers().len(),
        breaker_enabled: state.client.settings().breaker_enabled,
        rate_limit_enabled: state.config.rate_limit.enabled,
        service_account_enabled: state.credentials.is_enabled(),
        token_expires_at,
    })
}

pub async fn get_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.client.breakers().snapshots())
}

pub async fn get_rate_limits(State(state): State<AppState>) -> Json<RateLimitStatus> {
    Json(RateLimitStatus {
        enabled: state.config.rate_limit.enabled,
        window_seconds: state.limiter.window().as_secs(),
        max_requests: state.limiter.max_requests(),
        tracked_keys: state.limiter.tracked_keys(),
    })
}
