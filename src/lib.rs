//! Booking mesh: inter-service resilience layer for the booking services.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!   Inbound       │  http::server                                        │
//!   ──────────────┼─▶ request id ─▶ security::rate_limit ─▶ relay        │
//!                 │                                          │           │
//!                 │  clients::{users,rooms,bookings}         │           │
//!                 │                 │                        ▼           │
//!                 │                 └──────────▶ resilience::client      │
//!                 │                               │        │             │
//!                 │            security::credentials    registry         │
//!                 │                 (bearer token)       └▶ breaker      │
//!                 │                                          │           │
//!                 │                        timeout + retry + backoff     │
//!                 │                                          │           │
//!   Dependency    │                                          ▼           │
//!   ◀─────────────┼─────────────────────────────── resilience::transport │
//!                 └──────────────────────────────────────────────────────┘
//! ```
//!
//! Breakers, limiter buckets and the credential cache are owned by
//! `AppState` and shared by every request in the process.

pub mod admin;
pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::MeshConfig;
pub use error::{MeshError, MeshResult};
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
