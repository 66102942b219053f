//! Resilient outbound client.
//!
//! # Attempt Loop
//! ```text
//! path must resolve under the base URL → otherwise InvalidPath, no I/O
//! for each attempt (at most retries + 1):
//!     breaker.before_call()        → CircuitOpen: return immediately, no I/O
//!     transport.send() with timeout
//!     transport error or status >= 500:
//!         breaker.record_failure()
//!         attempts left → sleep(backoff), retry
//!         exhausted     → DownstreamUnavailable
//!     otherwise (including 4xx):
//!         breaker.record_success(), return response
//! ```

use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::{BreakerConfig, ClientConfig};
use crate::error::{MeshError, MeshResult};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::retries::classify;
use crate::resilience::timeouts::with_timeout;
use crate::resilience::transport::{resolve_url, OutboundRequest, OutboundResponse, Transport};
use crate::security::credentials::CredentialCache;

/// Timeout, retry and gating settings for a `ResilientClient`.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
    /// When false, calls skip `before_call` but outcomes are still recorded.
    pub breaker_enabled: bool,
    pub stub_fallback: bool,
}

impl ClientSettings {
    pub fn from_config(client: &ClientConfig, breaker: &BreakerConfig) -> Self {
        Self {
            timeout: client.timeout(),
            retries: client.retries,
            initial_backoff: Duration::from_millis(client.initial_backoff_ms),
            max_backoff: Duration::from_millis(client.max_backoff_ms),
            jitter: client.jitter,
            breaker_enabled: breaker.enabled,
            stub_fallback: client.stub_fallback,
        }
    }

    fn backoff(&self, retry: u32) -> Duration {
        calculate_backoff(
            retry,
            self.initial_backoff.as_millis() as u64,
            self.max_backoff.as_millis() as u64,
            self.jitter,
        )
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default(), &BreakerConfig::default())
    }
}

/// Outbound client with breaker gating, per-attempt timeout and bounded retry.
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    breakers: Arc<BreakerRegistry>,
    endpoints: HashMap<String, Url>,
    credentials: Option<Arc<CredentialCache>>,
    settings: ClientSettings,
}

impl ResilientClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        breakers: Arc<BreakerRegistry>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            transport,
            breakers,
            endpoints: HashMap::new(),
            credentials: None,
            settings,
        }
    }

    /// Register the base URL for a dependency.
    pub fn with_endpoint(mut self, dependency: impl Into<String>, base_url: Url) -> Self {
        self.endpoints.insert(dependency.into(), base_url);
        self
    }

    /// Attach the credential cache used by [`call_as_service`](Self::call_as_service).
    pub fn with_credentials(mut self, credentials: Arc<CredentialCache>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Perform `request` against `dependency`.
    ///
    /// Responses below 500 are returned as-is. Fails with `CircuitOpen` when
    /// the breaker rejects an attempt and with `DownstreamUnavailable` once
    /// every attempt has failed. A path that would leave the dependency's
    /// base URL fails with `InvalidPath` before the breaker is consulted.
    pub async fn call(&self, dependency: &str, request: OutboundRequest) -> MeshResult<OutboundResponse> {
        let breaker = self
            .breakers
            .get(dependency)
            .ok_or_else(|| MeshError::UnknownDependency(dependency.to_string()))?;
        let base_url = self
            .endpoints
            .get(dependency)
            .ok_or_else(|| MeshError::UnknownDependency(dependency.to_string()))?;
        if let Err(e) = resolve_url(base_url, &request.path) {
            tracing::warn!(dependency, path = %request.path, error = %e, "Refusing request path");
            return Err(MeshError::InvalidPath {
                dependency: dependency.to_string(),
                path: request.path,
            });
        }

        let max_attempts = self.settings.retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            if self.settings.breaker_enabled {
                breaker.before_call()?;
            }
            attempt += 1;

            let result = with_timeout(
                self.settings.timeout,
                self.transport.send(base_url, &request, self.settings.timeout),
            )
            .await;

            match classify(result) {
                Ok(response) => {
                    breaker.record_success();
                    metrics::record_downstream_attempt(dependency, "success");
                    if attempt > 1 {
                        tracing::debug!(dependency, attempt, status = %response.status, "Retry succeeded");
                    }
                    return Ok(response);
                }
                Err(failure) => {
                    breaker.record_failure();
                    metrics::record_downstream_attempt(dependency, failure.kind());

                    if attempt >= max_attempts {
                        tracing::error!(
                            dependency,
                            attempts = attempt,
                            error = %failure,
                            "Downstream unavailable, retries exhausted"
                        );
                        return Err(MeshError::DownstreamUnavailable {
                            dependency: dependency.to_string(),
                            attempts: attempt,
                            last_error: failure.to_string(),
                        });
                    }

                    let delay = self.settings.backoff(attempt);
                    tracing::warn!(
                        dependency,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Downstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Like [`call`](Self::call), authenticated as the service account.
    ///
    /// A 401 answer force-refreshes the token and reissues the call once.
    pub async fn call_as_service(
        &self,
        dependency: &str,
        request: OutboundRequest,
    ) -> MeshResult<OutboundResponse> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            MeshError::CredentialUnavailable("no credential cache configured".to_string())
        })?;

        let token = credentials.get_token(false)?;
        let response = self.call(dependency, authorize(request.clone(), &token)?).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!(dependency, "Service token rejected, refreshing");
        let token = credentials.get_token(true)?;
        self.call(dependency, authorize(request, &token)?).await
    }
}

fn authorize(request: OutboundRequest, token: &str) -> MeshResult<OutboundRequest> {
    request
        .bearer(token)
        .map_err(|e| MeshError::CredentialUnavailable(format!("token is not a valid header value: {e}")))
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::{BreakerSettings, CircuitState};
    use crate::resilience::transport::TransportError;
    use crate::security::tokens::{unix_now, Principal, ServiceClaims, TokenError, TokenIssuer};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::header::AUTHORIZATION;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    type Scripted = Result<OutboundResponse, TransportError>;

    /// Transport replaying a script; repeats the last entry once exhausted.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Scripted>>,
        last: Mutex<Option<Scripted>>,
        calls: AtomicUsize,
        auth_headers: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                auth_headers: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::from([ok(200)])),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                auth_headers: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _base_url: &Url,
            request: &OutboundRequest,
            _timeout: Duration,
        ) -> Result<OutboundResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(value) = request.headers.get(AUTHORIZATION) {
                self.auth_headers
                    .lock()
                    .push(value.to_str().unwrap_or_default().to_string());
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().pop_front();
            match next {
                Some(entry) => {
                    *self.last.lock() = Some(entry.clone());
                    entry
                }
                None => self.last.lock().clone().unwrap_or_else(|| ok(200)),
            }
        }
    }

    fn ok(status: u16) -> Scripted {
        Ok(OutboundResponse::new(StatusCode::from_u16(status).unwrap(), Vec::new()))
    }

    fn refused() -> Scripted {
        Err(TransportError::Connect("connection refused".into()))
    }

    fn settings(retries: u32) -> ClientSettings {
        ClientSettings {
            timeout: Duration::from_secs(1),
            retries,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            jitter: false,
            breaker_enabled: true,
            stub_fallback: false,
        }
    }

    fn client(transport: Arc<ScriptedTransport>, threshold: u32, retries: u32) -> ResilientClient {
        let breakers = Arc::new(BreakerRegistry::new(
            ["rooms"],
            BreakerSettings {
                failure_threshold: threshold,
                open_timeout: Duration::from_secs(5),
                half_open_max_calls: 1,
            },
        ));
        ResilientClient::new(transport, breakers, settings(retries))
            .with_endpoint("rooms", Url::parse("http://rooms.test").unwrap())
    }

    fn state(client: &ResilientClient) -> CircuitState {
        client.breakers().get("rooms").unwrap().state()
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_uses_all_attempts() {
        let transport = ScriptedTransport::new(vec![refused()]);
        let client = client(transport.clone(), 10, 3);

        let err = client.call("rooms", OutboundRequest::get("/rooms/1")).await.unwrap_err();
        match err {
            MeshError::DownstreamUnavailable { attempts, last_error, .. } => {
                assert_eq!(attempts, 4);
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.calls(), 4);
        assert_eq!(client.breakers().get("rooms").unwrap().failure_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_backoff() {
        let transport = ScriptedTransport::new(vec![ok(503), ok(200)]);
        let client = client(transport.clone(), 10, 2);

        let started = Instant::now();
        let response = client.call("rooms", OutboundRequest::get("/rooms/1")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(transport.calls(), 2);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(client.breakers().get("rooms").unwrap().failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_between_retries() {
        let transport = ScriptedTransport::new(vec![ok(500), ok(500), ok(500), ok(200)]);
        let client = client(transport.clone(), 10, 3);

        let started = Instant::now();
        client.call("rooms", OutboundRequest::get("/")).await.unwrap();
        // 100 + 200 + 400
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(700), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(800), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_returned_without_retry() {
        let transport = ScriptedTransport::new(vec![ok(404)]);
        let client = client(transport.clone(), 1, 3);

        let response = client.call("rooms", OutboundRequest::get("/rooms/404")).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(transport.calls(), 1);
        assert_eq!(state(&client), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_host_path_refused_before_breaker() {
        let transport = ScriptedTransport::new(vec![ok(200)]);
        let client = client(transport.clone(), 1, 3);

        for path in ["//elsewhere.test/steal", "http://elsewhere.test/steal"] {
            let err = client.call("rooms", OutboundRequest::get(path)).await.unwrap_err();
            assert!(
                matches!(err, MeshError::InvalidPath { ref dependency, .. } if dependency == "rooms"),
                "{path}: {err:?}"
            );
        }
        assert_eq!(transport.calls(), 0);
        let breaker = client.breakers().get("rooms").unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast_without_io() {
        let transport = ScriptedTransport::new(vec![ok(500)]);
        let client = client(transport.clone(), 3, 0);

        for _ in 0..3 {
            let err = client.call("rooms", OutboundRequest::get("/")).await.unwrap_err();
            assert!(matches!(err, MeshError::DownstreamUnavailable { attempts: 1, .. }));
        }
        assert_eq!(state(&client), CircuitState::Open);
        assert_eq!(transport.calls(), 3);

        let err = client.call("rooms", OutboundRequest::get("/")).await.unwrap_err();
        assert!(matches!(err, MeshError::CircuitOpen { .. }));
        assert_eq!(transport.calls(), 3);
        assert_eq!(client.breakers().get("rooms").unwrap().failure_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rooms_outage_and_recovery() {
        let transport = ScriptedTransport::new(vec![ok(500), ok(500), ok(500), ok(500), ok(200)]);
        let client = client(transport.clone(), 3, 0);
        let get = || OutboundRequest::get("/api/v1/rooms/1");

        for _ in 0..3 {
            assert!(client.call("rooms", get()).await.is_err());
        }
        assert_eq!(state(&client), CircuitState::Open);

        let err = client.call("rooms", get()).await.unwrap_err();
        assert!(matches!(err, MeshError::CircuitOpen { .. }));
        assert_eq!(transport.calls(), 3);

        // Probe fails: open again with a fresh timer.
        tokio::time::advance(Duration::from_millis(5100)).await;
        assert!(matches!(
            client.call("rooms", get()).await,
            Err(MeshError::DownstreamUnavailable { .. })
        ));
        assert_eq!(state(&client), CircuitState::Open);
        assert!(matches!(
            client.call("rooms", get()).await,
            Err(MeshError::CircuitOpen { .. })
        ));
        assert_eq!(transport.calls(), 4);

        // Probe succeeds: closed and reset.
        tokio::time::advance(Duration::from_millis(5100)).await;
        let response = client.call("rooms", get()).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(state(&client), CircuitState::Closed);
        assert_eq!(client.breakers().get("rooms").unwrap().failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opening_mid_retry_stops_the_loop() {
        let transport = ScriptedTransport::new(vec![refused()]);
        let client = client(transport.clone(), 2, 5);

        let err = client.call("rooms", OutboundRequest::get("/")).await.unwrap_err();
        assert!(matches!(err, MeshError::CircuitOpen { .. }));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_gate_still_records() {
        let transport = ScriptedTransport::new(vec![ok(500)]);
        let mut client = client(transport.clone(), 1, 0);
        client.settings.breaker_enabled = false;

        for _ in 0..3 {
            assert!(matches!(
                client.call("rooms", OutboundRequest::get("/")).await,
                Err(MeshError::DownstreamUnavailable { .. })
            ));
        }
        assert_eq!(transport.calls(), 3);
        assert_eq!(state(&client), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_failure() {
        let transport = ScriptedTransport::slow(Duration::from_secs(30));
        let client = client(transport.clone(), 10, 1);

        let err = client.call("rooms", OutboundRequest::get("/")).await.unwrap_err();
        match err {
            MeshError::DownstreamUnavailable { attempts, last_error, .. } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_dependency() {
        let client = client(ScriptedTransport::new(vec![]), 1, 0);
        let err = client.call("payments", OutboundRequest::get("/")).await.unwrap_err();
        assert!(matches!(err, MeshError::UnknownDependency(name) if name == "payments"));
    }

    struct SequenceIssuer(AtomicUsize);

    impl TokenIssuer for SequenceIssuer {
        fn mint(&self, _principal: &Principal, _ttl: Duration) -> Result<String, TokenError> {
            Ok(format!("tok{}", self.0.fetch_add(1, Ordering::SeqCst)))
        }

        fn decode(&self, token: &str) -> Result<ServiceClaims, TokenError> {
            Ok(ServiceClaims {
                sub: "svc".into(),
                role: "service_account".into(),
                iat: 0,
                exp: unix_now() + 3600,
                jti: token.to_string(),
            })
        }
    }

    fn credentials() -> Arc<CredentialCache> {
        Arc::new(CredentialCache::new(
            Arc::new(SequenceIssuer(AtomicUsize::new(0))),
            Principal::new("service_account", "service_account"),
            Duration::from_secs(3600),
            Duration::from_secs(30),
        ))
    }

    #[tokio::test]
    async fn test_call_as_service_sets_bearer() {
        let transport = ScriptedTransport::new(vec![ok(200), ok(200)]);
        let client = client(transport.clone(), 5, 0).with_credentials(credentials());

        client.call_as_service("rooms", OutboundRequest::get("/a")).await.unwrap();
        client.call_as_service("rooms", OutboundRequest::get("/b")).await.unwrap();

        assert_eq!(*transport.auth_headers.lock(), vec!["Bearer tok0", "Bearer tok0"]);
    }

    #[tokio::test]
    async fn test_unauthorized_forces_one_refresh() {
        let transport = ScriptedTransport::new(vec![ok(401), ok(200)]);
        let client = client(transport.clone(), 5, 0).with_credentials(credentials());

        let response = client.call_as_service("rooms", OutboundRequest::get("/")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(*transport.auth_headers.lock(), vec!["Bearer tok0", "Bearer tok1"]);
        assert_eq!(state(&client), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_call_as_service_without_credentials() {
        let client = client(ScriptedTransport::new(vec![ok(200)]), 5, 0);
        let err = client.call_as_service("rooms", OutboundRequest::get("/")).await.unwrap_err();
        assert!(matches!(err, MeshError::CredentialUnavailable(_)));
    }
}
