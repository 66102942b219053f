//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. All errors are collected rather than stopping at the first.

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::MeshConfig;
use crate::security::tokens::MAX_TOKEN_TTL;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid listener bind address '{0}'")]
    BindAddress(String),

    #[error("dependency name must not be empty")]
    EmptyDependencyName,

    #[error("dependency '{0}' is declared more than once")]
    DuplicateDependency(String),

    #[error("dependency '{name}' has invalid base_url '{url}'")]
    BaseUrl { name: String, url: String },

    #[error("unsupported jwt_algorithm '{0}' (expected HS256, HS384 or HS512)")]
    JwtAlgorithm(String),

    #[error("jwt_secret must be set when the service account is enabled")]
    EmptyJwtSecret,

    #[error("token_expire_minutes ({minutes}) exceeds the maximum of {max} minutes")]
    TokenLifetime { minutes: u64, max: u64 },

    #[error("refresh_threshold_secs ({threshold}s) must be shorter than the token lifetime ({ttl}s)")]
    RefreshThreshold { threshold: u64, ttl: u64 },
}

fn non_zero(value: u64, field: &'static str, errors: &mut Vec<ValidationError>) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}

/// Validate a parsed configuration, returning every problem found.
pub fn validate_config(config: &MeshConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    non_zero(config.breaker.failure_threshold.into(), "breaker.failure_threshold", &mut errors);
    non_zero(config.breaker.half_open_max_calls.into(), "breaker.half_open_max_calls", &mut errors);
    non_zero(config.client.timeout_ms, "client.timeout_ms", &mut errors);
    non_zero(config.client.initial_backoff_ms, "client.initial_backoff_ms", &mut errors);
    non_zero(config.rate_limit.window_secs, "rate_limit.window_secs", &mut errors);
    non_zero(config.rate_limit.max_requests as u64, "rate_limit.max_requests", &mut errors);

    let mut seen = HashSet::new();
    for dep in &config.dependencies {
        if dep.name.trim().is_empty() {
            errors.push(ValidationError::EmptyDependencyName);
        } else if !seen.insert(dep.name.as_str()) {
            errors.push(ValidationError::DuplicateDependency(dep.name.clone()));
        }
        if Url::parse(&dep.base_url).is_err() {
            errors.push(ValidationError::BaseUrl {
                name: dep.name.clone(),
                url: dep.base_url.clone(),
            });
        }
    }

    let account = &config.service_account;
    if !matches!(account.jwt_algorithm.as_str(), "HS256" | "HS384" | "HS512") {
        errors.push(ValidationError::JwtAlgorithm(account.jwt_algorithm.clone()));
    }
    if account.enabled {
        if account.jwt_secret.is_empty() {
            errors.push(ValidationError::EmptyJwtSecret);
        }
        non_zero(account.token_expire_minutes, "service_account.token_expire_minutes", &mut errors);
        let ttl = account
            .token_expire_minutes
            .checked_mul(60)
            .filter(|secs| *secs <= MAX_TOKEN_TTL.as_secs());
        match ttl {
            None => errors.push(ValidationError::TokenLifetime {
                minutes: account.token_expire_minutes,
                max: MAX_TOKEN_TTL.as_secs() / 60,
            }),
            Some(ttl) if ttl > 0 && account.refresh_threshold_secs >= ttl => {
                errors.push(ValidationError::RefreshThreshold {
                    threshold: account.refresh_threshold_secs,
                    ttl,
                });
            }
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
