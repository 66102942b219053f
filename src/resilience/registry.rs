//! Per-dependency breaker registry.
//!
//! Built once at startup from the configured dependency names and never
//! mutated afterwards; lookups need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{BreakerConfig, DependencyConfig};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState};

/// Map from dependency name to its breaker.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Create one breaker per name, all sharing the same thresholds. Each
    /// breaker's state gauge starts at closed.
    pub fn new<I, S>(names: I, settings: BreakerSettings) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let breakers = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                let breaker = Arc::new(CircuitBreaker::new(name.clone(), settings));
                metrics::record_breaker_state(&name, CircuitState::Closed);
                (name, breaker)
            })
            .collect();
        Self { breakers }
    }

    /// Build from configuration.
    pub fn from_config(dependencies: &[DependencyConfig], breaker: &BreakerConfig) -> Self {
        let registry = Self::new(
            dependencies.iter().map(|d| d.name.clone()),
            BreakerSettings::from(breaker),
        );
        tracing::info!(
            dependencies = registry.len(),
            failure_threshold = breaker.failure_threshold,
            open_timeout_secs = breaker.open_timeout_secs,
            half_open_max_calls = breaker.half_open_max_calls,
            "Breaker registry built"
        );
        registry
    }

    /// Look up the breaker for a dependency.
    pub fn get(&self, dependency: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(dependency).cloned()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshots of every breaker, sorted by dependency name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snaps: Vec<_> = self.breakers.values().map(|b| b.snapshot()).collect();
        snaps.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        snaps
    }
}
