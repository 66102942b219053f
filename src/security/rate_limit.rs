//! Sliding-window rate limiting for inbound requests.
//!
//! Each key owns a queue of admission timestamps. On every check, timestamps
//! at least one window old are dropped; the request is admitted only if fewer
//! than `max_requests` remain. Rejected requests are not recorded.

use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::{MeshError, MeshResult};
use crate::observability::metrics;

/// Per-key sliding-window limiter. Keys are fully independent.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, VecDeque<Instant>>,
    window: Duration,
    max_requests: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            window,
            max_requests,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window(), config.max_requests)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Admit or reject one request for `key`.
    ///
    /// The prune/count/append sequence runs under the key's shard lock.
    pub fn check(&self, key: &str) -> MeshResult<()> {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key.to_owned()).or_default();

        while let Some(&oldest) = bucket.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() >= self.max_requests {
            return Err(MeshError::RateLimitExceeded {
                key: key.to_owned(),
                limit: self.max_requests,
                window_secs: self.window.as_secs(),
            });
        }

        bucket.push_back(now);
        Ok(())
    }

    /// Number of keys seen so far.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

fn client_ip(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware keyed by matched route and client IP. Install with
/// `route_layer` so the matched path is available.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let key = format!("{}:{}", route, client_ip(&request));

    match limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(key = %key, limit = limiter.max_requests, "Rate limit exceeded");
            metrics::record_rate_limited(&route);
            err.into_response()
        }
    }
}
