//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a bounded number of probes test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: first before_call() after open_timeout has elapsed
//! Half-Open → Closed: a probe succeeds
//! Half-Open → Open: a probe fails (open_timeout restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency name (see `registry.rs`)
//! - Open → Half-Open is evaluated lazily by the next caller; there is no
//!   background timer, so a dependency without traffic stays Open
//! - Each operation is one critical section over the whole state, so
//!   thresholds hold exactly under concurrent callers

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::error::{MeshError, MeshResult};
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Immutable thresholds of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub half_open_max_calls: u32,
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            open_timeout: config.open_timeout(),
            half_open_max_calls: config.half_open_max_calls,
        }
    }
}

/// Point-in-time view of a breaker, for admin endpoints and tests.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub dependency: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub half_open_attempts: u32,
    /// Milliseconds since the last recorded failure, if any.
    pub since_last_failure_ms: Option<u64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    half_open_attempts: u32,
}

impl BreakerInner {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            half_open_attempts: 0,
        }
    }
}

/// Fault-detection state machine for a single dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(dependency: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            dependency: dependency.into(),
            settings,
            inner: Mutex::new(BreakerInner::closed()),
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Decide whether an attempt may proceed.
    ///
    /// Returns `MeshError::CircuitOpen` when the caller must not perform I/O.
    pub fn before_call(&self) -> MeshResult<()> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_failure
                .map(|at| now.saturating_duration_since(at))
                .unwrap_or(self.settings.open_timeout);

            if elapsed < self.settings.open_timeout {
                drop(inner);
                return Err(self.reject(CircuitState::Open));
            }

            inner.state = CircuitState::HalfOpen;
            inner.half_open_attempts = 0;
            self.transitioned(CircuitState::Open, CircuitState::HalfOpen);
        }

        if inner.state == CircuitState::HalfOpen {
            if inner.half_open_attempts >= self.settings.half_open_max_calls {
                drop(inner);
                return Err(self.reject(CircuitState::HalfOpen));
            }
            inner.half_open_attempts += 1;
            tracing::debug!(
                dependency = %self.dependency,
                probe = inner.half_open_attempts,
                max = self.settings.half_open_max_calls,
                "Half-open probe admitted"
            );
        }

        Ok(())
    }

    /// Record a successful attempt. Always leaves the breaker Closed.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        *inner = BreakerInner::closed();

        if previous != CircuitState::Closed {
            self.transitioned(previous, CircuitState::Closed);
        }
    }

    /// Record a failed attempt (transport error or 5xx).
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        let previous = inner.state;
        let next = match previous {
            CircuitState::Closed if inner.failure_count >= self.settings.failure_threshold => {
                CircuitState::Open
            }
            CircuitState::HalfOpen => CircuitState::Open,
            other => other,
        };

        if next != previous {
            inner.state = next;
            inner.half_open_attempts = 0;
            self.transitioned(previous, next);
            tracing::warn!(
                dependency = %self.dependency,
                failures = inner.failure_count,
                threshold = self.settings.failure_threshold,
                open_timeout_ms = self.settings.open_timeout.as_millis() as u64,
                "Circuit opened"
            );
        } else {
            tracing::debug!(
                dependency = %self.dependency,
                failures = inner.failure_count,
                state = %previous,
                "Failure recorded"
            );
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            dependency: self.dependency.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            half_open_attempts: inner.half_open_attempts,
            since_last_failure_ms: inner
                .last_failure
                .map(|at| Instant::now().saturating_duration_since(at).as_millis() as u64),
        }
    }

    fn reject(&self, state: CircuitState) -> MeshError {
        tracing::debug!(dependency = %self.dependency, state = %state, "Call rejected by circuit breaker");
        metrics::record_circuit_rejection(&self.dependency);
        MeshError::CircuitOpen {
            dependency: self.dependency.clone(),
            state,
        }
    }

    fn transitioned(&self, from: CircuitState, to: CircuitState) {
        tracing::info!(dependency = %self.dependency, from = %from, to = %to, "Circuit state changed");
        metrics::record_breaker_state(&self.dependency, to);
    }
}
