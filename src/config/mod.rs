//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MeshConfig (validated, immutable)
//!     → consumed once by lifecycle::startup to build shared state
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers are built from it once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AdminConfig;
pub use schema::BreakerConfig;
pub use schema::ClientConfig;
pub use schema::DependencyConfig;
pub use schema::ListenerConfig;
pub use schema::MeshConfig;
pub use schema::ObservabilityConfig;
pub use schema::RateLimitConfig;
pub use schema::ServiceAccountConfig;
