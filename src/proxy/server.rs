//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the axum Router with the health route and proxy fallback
//! - Wire up middleware (request ID, tracing, body limit, compression,
//!   security headers)
//! - Bind the server to a listener with graceful shutdown
//! - Dispatch requests: redirect policy, then route table, then forwarder
//!
//! # Design Decisions
//! - Every non-health path funnels through one fallback handler; the route
//!   table owns matching, not axum's router
//! - The redirect policy runs before table matching so legacy paths never
//!   reach an upstream
//! - Upstream deadlines are per-route and live in the forwarder; there is
//!   no global request timeout layer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::schema::GatewayConfig;
use crate::health;
use crate::observability::metrics;
use crate::proxy::forward::Forwarder;
use crate::proxy::websocket;
use crate::resolver::Resolver;
use crate::routing::{RedirectPolicy, RouteMatch, RouteTable};

/// Shared state handed to the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RouteTable>,
    pub redirects: Arc<RedirectPolicy>,
    pub forwarder: Arc<Forwarder>,
}

/// The gateway's HTTP front end.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Assemble the routing table, redirect policy, and forwarder from config.
    pub fn new(config: GatewayConfig) -> Self {
        let resolver = Arc::new(Resolver::with_dns(&config.upstreams));
        let table = Arc::new(RouteTable::new(&config.routes));
        let redirects = Arc::new(RedirectPolicy::new(&config.redirects));
        let forwarder = Arc::new(Forwarder::new(resolver, table.entries()));

        let state = AppState {
            table,
            redirects,
            forwarder,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Stack the middleware around the health route and the proxy fallback.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/health", any(health::handler))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
            );

        if config.gzip {
            router = router.layer(CompressionLayer::new());
        }

        if config.security.enable_headers {
            router = router
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("SAMEORIGIN"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ));
        }

        router
    }

    /// Serve on the listener until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// `x-request-id` values for requests that arrive without one.
#[derive(Clone, Copy)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let value = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(value))
    }
}

/// Fallback handler for every non-health path.
/// Checks the redirect policy first, then the route table, then forwards.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    // The set-request-id layer runs first, so the header is always present.
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_owned();

    let path = request.uri().path().to_owned();
    let query = request.uri().query().map(str::to_owned);
    let method_str = request.method().to_string();

    tracing::debug!(request_id = %request_id, method = %method_str, path = %path, "Routing request");

    // Legacy redirects take precedence over the table.
    if let Some(target) = state.redirects.check(&path) {
        tracing::debug!(request_id = %request_id, path = %path, target = %target, "Legacy redirect");
        metrics::record_redirect("legacy");
        metrics::record_request(&method_str, 301, "redirect", start_time);
        return permanent_redirect(target, query.as_deref());
    }

    // Longest-prefix route match.
    let entry = match state.table.match_path(&path) {
        Some(RouteMatch::Forward(entry)) => entry,
        Some(RouteMatch::CanonicalSlash) => {
            let target = format!("{}/", path);
            metrics::record_redirect("canonical_slash");
            metrics::record_request(&method_str, 301, "redirect", start_time);
            return permanent_redirect(&target, query.as_deref());
        }
        None => {
            tracing::debug!(request_id = %request_id, path = %path, "Path matched no route");
            metrics::record_request(&method_str, 404, "none", start_time);
            return (StatusCode::NOT_FOUND, "No route for this path").into_response();
        }
    };

    // Forward, relaying the upgrade where the route allows it.
    let target_path = entry.target_path(&path);
    let result = if entry.websocket && websocket::wants_upgrade(&request) {
        state
            .forwarder
            .upgrade(entry, addr.ip(), request, target_path)
            .await
    } else {
        state
            .forwarder
            .forward(entry, addr.ip(), request, target_path)
            .await
    };

    match result {
        Ok(response) => {
            let status = response.status();
            tracing::debug!(
                request_id = %request_id,
                route = %entry.name,
                status = %status,
                "Request completed"
            );
            metrics::record_request(&method_str, status.as_u16(), &entry.name, start_time);
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                route = %entry.name,
                upstream = %entry.upstream,
                error = %e,
                "Upstream exchange failed"
            );
            metrics::record_error(&entry.name, e.kind());
            metrics::record_request(&method_str, e.status().as_u16(), &entry.name, start_time);
            e.into_response()
        }
    }
}

/// Build a 301 response, carrying the original query string over.
fn permanent_redirect(location: &str, query: Option<&str>) -> Response {
    let location = match query {
        Some(q) => format!("{}?{}", location, q),
        None => location.to_string(),
    };
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        // Unreachable for validated config paths and parsed query strings.
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
