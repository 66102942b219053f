//! Service token issuance.
//!
//! The credential cache only needs "mint" and "decode"; [`JwtIssuer`] provides
//! both with HMAC-signed JWTs via `jsonwebtoken`.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ServiceAccountConfig;

/// Identity a token is minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: String,
}

impl Principal {
    pub fn new(subject: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            role: role.into(),
        }
    }
}

/// Claims carried by service tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceClaims {
    pub sub: String,
    pub role: String,
    /// Issued-at, seconds since epoch.
    pub iat: u64,
    /// Expiry, seconds since epoch.
    pub exp: u64,
    /// Unique token id; two mints never produce the same token.
    pub jti: String,
}

impl ServiceClaims {
    /// Expiry as a wall-clock time; an unrepresentable `exp` reads as the epoch.
    pub fn expires_at(&self) -> SystemTime {
        UNIX_EPOCH
            .checked_add(Duration::from_secs(self.exp))
            .unwrap_or(UNIX_EPOCH)
    }
}

#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("unsupported signing algorithm '{0}'")]
    Algorithm(String),

    #[error("failed to encode token: {0}")]
    Encode(String),

    #[error("failed to decode token: {0}")]
    Decode(String),

    #[error("token lifetime of {0:?} exceeds the ten-year maximum")]
    Lifetime(Duration),
}

/// Longest lifetime a minted token may carry (ten years).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Token issuance and introspection.
pub trait TokenIssuer: Send + Sync {
    fn mint(&self, principal: &Principal, ttl: Duration) -> Result<String, TokenError>;

    fn decode(&self, token: &str) -> Result<ServiceClaims, TokenError>;
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// HMAC JWT issuer.
pub struct JwtIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
}

impl JwtIssuer {
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Result<Self, TokenError> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(TokenError::Algorithm(format!("{algorithm:?}")));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            algorithm,
        })
    }

    pub fn from_config(config: &ServiceAccountConfig) -> Result<Self, TokenError> {
        let algorithm: Algorithm = config
            .jwt_algorithm
            .parse()
            .map_err(|_| TokenError::Algorithm(config.jwt_algorithm.clone()))?;
        Self::new(config.jwt_secret.as_bytes(), algorithm)
    }
}

impl std::fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIssuer")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer for JwtIssuer {
    fn mint(&self, principal: &Principal, ttl: Duration) -> Result<String, TokenError> {
        if ttl > MAX_TOKEN_TTL {
            return Err(TokenError::Lifetime(ttl));
        }
        let iat = unix_now();
        let exp = iat
            .checked_add(ttl.as_secs())
            .ok_or(TokenError::Lifetime(ttl))?;
        let claims = ServiceClaims {
            sub: principal.subject.clone(),
            role: principal.role.clone(),
            iat,
            exp,
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    fn decode(&self, token: &str) -> Result<ServiceClaims, TokenError> {
        let validation = Validation::new(self.algorithm);
        decode::<ServiceClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Decode(e.to_string()))
    }
}
