//! Service-account credential cache.
//!
//! Holds one process-wide `(token, expiry)` pair. Tokens are minted locally
//! for the configured non-human principal and replaced wholesale once they
//! come within the refresh threshold of expiry.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::ServiceAccountConfig;
use crate::error::{MeshError, MeshResult};
use crate::observability::metrics;
use crate::security::tokens::{Principal, TokenIssuer};

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Self-refreshing bearer token for inter-service calls.
pub struct CredentialCache {
    issuer: Arc<dyn TokenIssuer>,
    principal: Principal,
    enabled: bool,
    ttl: Duration,
    refresh_threshold: Duration,
    // Held across minting so concurrent callers wait for a single refresh.
    entry: Mutex<Option<CachedToken>>,
}

impl CredentialCache {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        principal: Principal,
        ttl: Duration,
        refresh_threshold: Duration,
    ) -> Self {
        Self {
            issuer,
            principal,
            enabled: true,
            ttl,
            refresh_threshold,
            entry: Mutex::new(None),
        }
    }

    pub fn from_config(issuer: Arc<dyn TokenIssuer>, config: &ServiceAccountConfig) -> Self {
        let mut cache = Self::new(
            issuer,
            Principal::new(config.subject.clone(), config.role.clone()),
            config.token_ttl(),
            config.refresh_threshold(),
        );
        cache.enabled = config.enabled;
        cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return a bearer token valid beyond the refresh threshold, minting a
    /// new one when none is cached, it is about to expire, or `force_refresh`.
    pub fn get_token(&self, force_refresh: bool) -> MeshResult<String> {
        if !self.enabled {
            return Err(MeshError::CredentialUnavailable(
                "service account usage is disabled".to_string(),
            ));
        }

        let mut entry = self.entry.lock();
        if !force_refresh {
            if let Some(cached) = entry.as_ref() {
                if !self.needs_refresh(cached, SystemTime::now()) {
                    return Ok(cached.token.clone());
                }
            }
        }

        let fresh = self.mint()?;
        let token = fresh.token.clone();
        *entry = Some(fresh);
        Ok(token)
    }

    /// Expiry of the cached token, if one has been minted.
    pub fn cached_expiry(&self) -> Option<SystemTime> {
        self.entry.lock().as_ref().map(|c| c.expires_at)
    }

    fn needs_refresh(&self, cached: &CachedToken, now: SystemTime) -> bool {
        match cached.expires_at.duration_since(now) {
            Ok(remaining) => remaining <= self.refresh_threshold,
            Err(_) => true,
        }
    }

    fn mint(&self) -> MeshResult<CachedToken> {
        let token = self
            .issuer
            .mint(&self.principal, self.ttl)
            .map_err(|e| MeshError::CredentialUnavailable(e.to_string()))?;
        let claims = self
            .issuer
            .decode(&token)
            .map_err(|e| MeshError::CredentialUnavailable(e.to_string()))?;

        tracing::info!(
            subject = %self.principal.subject,
            role = %self.principal.role,
            exp = claims.exp,
            "Service token refreshed"
        );
        metrics::record_token_refresh();

        Ok(CachedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("principal", &self.principal)
            .field("enabled", &self.enabled)
            .field("ttl", &self.ttl)
            .field("refresh_threshold", &self.refresh_threshold)
            .finish_non_exhaustive()
    }
}
