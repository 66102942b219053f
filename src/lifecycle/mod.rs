//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → token issuer → credential cache → breakers → client → limiter → AppState
//!
//! Shutdown (shutdown.rs):
//!     Ctrl-C → broadcast → server stops accepting and drains
//! ```

pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_state, build_state_with_transport, StartupError};
