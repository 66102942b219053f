//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per route + client IP sliding window)
//!
//! Outgoing service call:
//!     → credentials.rs (cached service-account token)
//!     → tokens.rs (mint and decode JWTs)
//! ```

pub mod credentials;
pub mod rate_limit;
pub mod tokens;

pub use credentials::CredentialCache;
pub use rate_limit::RateLimiter;
pub use tokens::{JwtIssuer, Principal, TokenIssuer};
