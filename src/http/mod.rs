//! HTTP surface (C-level) — app router + a separate metrics router, the
//! same split `commands::reconcile::run` uses between its controller loop
//! and `start_metrics_server`, generalized into this crate's two always-on
//! servers (§6).

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::inference::InferenceProxy;
use crate::k8s::KubeFacade;
use crate::metrics_provider::MetricFeatureProvider;
use crate::orchestrator::Orchestrator;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Echo an incoming `X-Request-Id` back on the response untouched (§6).
/// Requests without the header are passed through unchanged.
async fn echo_request_id(request: Request, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
    let incoming = request.headers().get(&header_name).cloned();
    let mut response = next.run(request).await;
    if let Some(value) = incoming {
        response.headers_mut().insert(header_name, value);
    }
    response
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub k8s: KubeFacade,
    pub inference: Option<Arc<InferenceProxy>>,
    pub metrics_provider: Option<Arc<MetricFeatureProvider>>,
    pub started_at: Instant,
}

pub fn build_app_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::liveness))
        .route("/api/v1/health", get(handlers::deep_health))
        .route(
            "/api/v1/remediation/trigger",
            post(handlers::trigger_remediation),
        )
        .route("/api/v1/incidents", get(handlers::list_incidents))
        .route("/api/v1/workflows/:id", get(handlers::get_workflow))
        .with_state(state)
        .layer(middleware::from_fn(echo_request_id));

    if config.enable_cors {
        router.layer(build_cors_layer(&config.cors_allow_origin))
    } else {
        router
    }
}

fn build_cors_layer(allow_origin: &str) -> CorsLayer {
    let origin = if allow_origin == "*" {
        AllowOrigin::any()
    } else {
        allow_origin
            .parse::<HeaderValue>()
            .map(AllowOrigin::exact)
            .unwrap_or_else(|_| AllowOrigin::any())
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
}

pub fn build_metrics_router() -> Router {
    Router::new().route("/metrics", get(handlers::metrics_handler))
}

pub async fn serve_app(
    state: AppState,
    config: &Config,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = build_app_router(state, config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind app server")?;

    info!(addr = %addr, "http_server_started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}

pub async fn serve_metrics(config: &Config, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let app = build_metrics_router();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind metrics server")?;

    info!(addr = %addr, "metrics_server_started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_origin_builds_permissive_layer() {
        // Exercised for its side-effect-free construction only; CorsLayer
        // has no public introspection, so this just asserts it doesn't panic.
        let _ = build_cors_layer("*");
    }

    #[test]
    fn explicit_origin_builds_scoped_layer() {
        let _ = build_cors_layer("https://console.example.com");
    }

    #[tokio::test]
    async fn echoes_x_request_id_when_present() {
        use axum::body::Body;
        use axum::http::Request as HttpRequest;
        use tower::ServiceExt;

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(echo_request_id));

        let request = HttpRequest::builder()
            .uri("/")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            "abc-123"
        );
    }

    #[tokio::test]
    async fn omits_x_request_id_when_absent_from_the_request() {
        use axum::body::Body;
        use axum::http::Request as HttpRequest;
        use tower::ServiceExt;

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(echo_request_id));

        let request = HttpRequest::builder().uri("/").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.headers().get("x-request-id").is_none());
    }
}
