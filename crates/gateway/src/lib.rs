//! HTTP gateway for Dispatch.
//!
//! Serves the lane API under `/api` plus a health check. Lane and standup
//! responses are server-sent-event streams.
//!
//! Built on Axum.

pub mod api;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{self, Next},
    response::Json,
    routing::get,
};
use dispatch_agent::DispatchEngine;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{Instrument, info, info_span};

pub use api::SharedState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the full router.
///
/// Layers applied:
/// - Request id on every response (`x-request-id`)
/// - Permissive CORS for a local browser client
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(engine: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::api_router(engine))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the HTTP server on the configured address.
pub async fn start(config: dispatch_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let engine = Arc::new(DispatchEngine::from_config(&config).await?);
    serve(engine, &addr).await
}

/// Serve an already-built engine.
pub async fn serve(engine: SharedState, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Tags each request with an id, in the logs and on the response.
async fn request_id_middleware(req: axum::extract::Request, next: Next) -> axum::response::Response {
    let id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("request", id = %id, method = %req.method(), path = %req.uri().path());
    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use dispatch_agent::LaneBook;
    use dispatch_config::AppConfig;
    use dispatch_vault::{InMemoryHistory, InMemoryVault};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct Silent;

    #[async_trait::async_trait]
    impl dispatch_core::Provider for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn complete(
            &self,
            _request: dispatch_core::ProviderRequest,
        ) -> Result<dispatch_core::ProviderResponse, dispatch_core::error::ProviderError> {
            Err(dispatch_core::error::ProviderError::NotConfigured("test".into()))
        }
    }

    async fn test_state() -> SharedState {
        let vault = Arc::new(InMemoryVault::new());
        Arc::new(
            DispatchEngine::new(
                &AppConfig::default(),
                Arc::new(Silent),
                vault.clone(),
                vault,
                Arc::new(InMemoryHistory::new()),
                LaneBook::default(),
            )
            .await,
        )
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state().await);

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn api_routes_are_nested() {
        let app = build_router(test_state().await);
        let req = Request::builder()
            .uri("/api/history/jobs")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upstream_failure_is_an_error_event() {
        let app = build_router(test_state().await);
        let req = Request::builder()
            .method("POST")
            .uri("/api/chat/build")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"status?"}"#))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(
            text,
            "data: {\"error\":\"Provider not configured: test\"}\n\n"
        );
    }
}
