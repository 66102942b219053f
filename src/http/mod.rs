//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, tracing, routing)
//!     → /health
//!     → /api/v1/relay/... → rate limiter → ResilientClient
//!     → /admin/...        → API key check → admin handlers
//!     → response.rs (MeshError → JSON error body)
//! ```

pub mod response;
pub mod server;

pub use response::ErrorBody;
pub use server::{build_router, AppState, HttpServer, X_REQUEST_ID};
