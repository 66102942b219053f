//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mesh.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for a booking-mesh service instance.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MeshConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Circuit breaker thresholds, uniform across dependencies.
    pub breaker: BreakerConfig,

    /// Outbound client timeout and retry settings.
    pub client: ClientConfig,

    /// Downstream services reachable by name.
    pub dependencies: Vec<DependencyConfig>,

    /// Inbound sliding-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Service-account credential settings.
    pub service_account: ServiceAccountConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoints.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Gate calls on breaker state. When false, outcomes are still recorded.
    pub enabled: bool,

    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before probing.
    pub open_timeout_secs: u64,

    /// Probes admitted per half-open episode.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            open_timeout_secs: 30,
            half_open_max_calls: 1,
        }
    }
}

impl BreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,

    /// Retries after the first attempt (total attempts = retries + 1).
    pub retries: u32,

    /// Delay before the first retry, doubled for each further retry.
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff delay.
    pub max_backoff_ms: u64,

    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,

    /// Replace unavailable-dependency failures with permissive defaults
    /// in the typed clients.
    pub stub_fallback: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            retries: 2,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            jitter: false,
            stub_fallback: false,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A named downstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyConfig {
    /// Dependency name used for breaker lookup (e.g., "rooms").
    pub name: String,

    /// Base URL (e.g., "http://rooms-service:8002").
    pub base_url: String,
}

impl DependencyConfig {
    fn new(name: &str, base_url: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
        }
    }
}

/// The four booking services, as deployed by the compose setup.
pub fn default_dependencies() -> Vec<DependencyConfig> {
    vec![
        DependencyConfig::new("users", "http://users-service:8001"),
        DependencyConfig::new("rooms", "http://rooms-service:8002"),
        DependencyConfig::new("bookings", "http://bookings-service:8003"),
        DependencyConfig::new("reviews", "http://reviews-service:8004"),
    ]
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sliding window length in seconds.
    pub window_secs: u64,

    /// Maximum requests per key within the window.
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 30,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Service account (non-human principal) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceAccountConfig {
    /// Allow minting service tokens.
    pub enabled: bool,

    /// `sub` claim of minted tokens.
    pub subject: String,

    /// `role` claim of minted tokens.
    pub role: String,

    /// Token lifetime in minutes.
    pub token_expire_minutes: u64,

    /// Refresh when the cached token expires within this many seconds.
    pub refresh_threshold_secs: u64,

    /// HMAC secret used to sign tokens.
    pub jwt_secret: String,

    /// Signing algorithm (HS256, HS384, HS512).
    pub jwt_algorithm: String,
}

impl Default for ServiceAccountConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subject: "service_account".to_string(),
            role: "service_account".to_string(),
            token_expire_minutes: 60,
            refresh_threshold_secs: 30,
            // WARNING: This is a placeholder! Change this in production.
            jwt_secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
            jwt_algorithm: "HS256".to_string(),
        }
    }
}

impl ServiceAccountConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_expire_minutes.saturating_mul(60))
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

// `dependencies` is a Vec, so `#[serde(default)]` on the root would leave it
// empty; fill it with the known services instead.
impl MeshConfig {
    pub fn with_default_dependencies(mut self) -> Self {
        if self.dependencies.is_empty() {
            self.dependencies = default_dependencies();
        }
        self
    }
}
