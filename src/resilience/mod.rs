//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call to a dependency (client.rs):
//!     → registry.rs (look up the dependency's breaker)
//!     → circuit_breaker.rs (fail fast while open)
//!     → timeouts.rs + transport.rs (one bounded attempt)
//!     → retries.rs (classify outcome)
//!     → backoff.rs (delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Every attempt has a deadline
//! - Transport errors and 5xx count as failures; 4xx pass through untouched
//! - One breaker per dependency, shared by every task in the process

pub mod backoff;
pub mod circuit_breaker;
pub mod client;
pub mod registry;
pub mod retries;
pub mod timeouts;
pub mod transport;

pub use circuit_breaker::{BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use client::{ClientSettings, ResilientClient};
pub use registry::BreakerRegistry;
pub use transport::{HttpTransport, OutboundRequest, OutboundResponse, Transport, TransportError};
