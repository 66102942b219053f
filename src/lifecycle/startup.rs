//! Startup orchestration.
//!
//! Builds every shared component once, in dependency order, and hands them
//! to the HTTP layer as one `AppState`. Any failure here is fatal.

use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use url::Url;

use crate::config::MeshConfig;
use crate::http::server::AppState;
use crate::resilience::client::{ClientSettings, ResilientClient};
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::transport::{HttpTransport, Transport, TransportError};
use crate::security::credentials::CredentialCache;
use crate::security::rate_limit::RateLimiter;
use crate::security::tokens::{JwtIssuer, TokenError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("token issuer: {0}")]
    Token(#[from] TokenError),

    #[error("HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error("dependency '{name}' has invalid base URL: {source}")]
    BaseUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },
}

/// Assemble the application state with the production `reqwest` transport.
pub fn build_state(config: MeshConfig) -> Result<AppState, StartupError> {
    let transport = Arc::new(HttpTransport::new()?);
    build_state_with_transport(config, transport)
}

/// Assemble the application state on top of an arbitrary transport.
pub fn build_state_with_transport(
    config: MeshConfig,
    transport: Arc<dyn Transport>,
) -> Result<AppState, StartupError> {
    let issuer = Arc::new(JwtIssuer::from_config(&config.service_account)?);
    let credentials = Arc::new(CredentialCache::from_config(issuer, &config.service_account));

    let breakers = Arc::new(BreakerRegistry::from_config(&config.dependencies, &config.breaker));
    let settings = ClientSettings::from_config(&config.client, &config.breaker);

    let mut client = ResilientClient::new(transport, breakers, settings)
        .with_credentials(credentials.clone());
    for dependency in &config.dependencies {
        let base_url = Url::parse(&dependency.base_url).map_err(|source| StartupError::BaseUrl {
            name: dependency.name.clone(),
            source,
        })?;
        client = client.with_endpoint(dependency.name.clone(), base_url);
    }

    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

    tracing::info!(
        dependencies = config.dependencies.len(),
        breaker_enabled = config.breaker.enabled,
        failure_threshold = config.breaker.failure_threshold,
        retries = config.client.retries,
        rate_limit_enabled = config.rate_limit.enabled,
        service_account_enabled = config.service_account.enabled,
        "Application state initialized"
    );

    Ok(AppState {
        config: Arc::new(config),
        client: Arc::new(client),
        limiter,
        credentials,
        started_at: Instant::now(),
    })
}
