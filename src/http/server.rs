//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router: health, relay, admin
//! - Rate-limit the relay per matched route and client IP
//! - Generate and propagate `x-request-id`
//! - Forward relayed requests through the resilient client
//! - Serve until the shutdown broadcast fires

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, Method, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::config::MeshConfig;
use crate::error::MeshResult;
use crate::lifecycle::shutdown::wait_for;
use crate::resilience::client::ResilientClient;
use crate::resilience::transport::{OutboundRequest, OutboundResponse};
use crate::security::credentials::CredentialCache;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Relay route; rate limited.
pub const RELAY_ROUTE: &str = "/api/v1/relay/{dependency}/{*path}";

/// Request headers copied onto relayed calls.
static FORWARDED_HEADERS: [HeaderName; 3] = [
    header::CONTENT_TYPE,
    header::ACCEPT,
    HeaderName::from_static(X_REQUEST_ID),
];

/// Process-wide state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MeshConfig>,
    pub client: Arc<ResilientClient>,
    pub limiter: Arc<RateLimiter>,
    pub credentials: Arc<CredentialCache>,
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("client", &self.client)
            .field("credentials", &self.credentials)
            .field("uptime", &self.started_at.elapsed())
            .finish_non_exhaustive()
    }
}

/// HTTP front of the mesh.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Router with all layers applied, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut relay = Router::new().route(RELAY_ROUTE, any(relay_handler));
    if state.config.rate_limit.enabled {
        relay = relay.route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));
    }

    let mut router = Router::new().route("/health", get(health)).merge(relay);
    if state.config.admin.enabled {
        router = router.merge(admin::setup_admin_router(&state));
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Forward `/api/v1/relay/{dependency}/{*path}` to the named dependency as
/// the service account.
async fn relay_handler(
    State(state): State<AppState>,
    Path((dependency, path)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // A leading "//" would make the target scheme-relative.
    let path = path.trim_start_matches(['/', '\\']);
    let target = match uri.query() {
        Some(query) => format!("/{path}?{query}"),
        None => format!("/{path}"),
    };
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let mut request = OutboundRequest::new(method.clone(), target.clone());
    for name in &FORWARDED_HEADERS {
        if let Some(value) = headers.get(name) {
            request.headers.insert(name.clone(), value.clone());
        }
    }
    if !body.is_empty() {
        request = request.body(body.to_vec());
    }

    tracing::debug!(
        request_id = %request_id,
        dependency = %dependency,
        method = %method,
        path = %target,
        "Relaying request"
    );

    match relay(&state, &dependency, request).await {
        Ok(response) => into_axum_response(response),
        Err(err) => {
            tracing::warn!(
                request_id = %request_id,
                dependency = %dependency,
                error_code = err.error_code(),
                error = %err,
                "Relay failed"
            );
            err.into_response()
        }
    }
}

async fn relay(
    state: &AppState,
    dependency: &str,
    request: OutboundRequest,
) -> MeshResult<OutboundResponse> {
    if state.credentials.is_enabled() {
        state.client.call_as_service(dependency, request).await
    } else {
        state.client.call(dependency, request).await
    }
}

fn into_axum_response(response: OutboundResponse) -> Response {
    let mut out = (response.status, response.body).into_response();
    if let Some(content_type) = response.headers.get(header::CONTENT_TYPE) {
        out.headers_mut()
            .insert(header::CONTENT_TYPE, content_type.clone());
    } else {
        out.headers_mut().remove(header::CONTENT_TYPE);
    }
    out
}
