//! Market Lane forwarding proxy.
//!
//! Browser clients cannot hold the platform key and cannot call the platform
//! cross-origin. This service sits between them: it forwards `/api/*` calls
//! to the configured upstream, injects the key server-side and answers every
//! response (errors included) with permissive CORS headers.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{Router, middleware::from_fn, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

pub use config::{ConfigError, ProxyConfig, UpstreamConfig};
pub use error::ProxyError;
pub use state::AppState;

/// Build the full proxy application.
///
/// Layer order, outermost first: CORS, request tracing, request ID.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        #[allow(clippy::cast_possible_truncation)]
                        span.record("latency_ms", latency.as_millis() as u64);
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use secrecy::SecretString;
    use tower::ServiceExt;
    use url::Url;

    fn test_app(base: &str) -> Router {
        let upstream = UpstreamConfig::new(
            Url::parse(base).unwrap(),
            SecretString::from("pk_test_9fQ2mXv7RtL3bN6w"),
        );
        app(AppState::new(upstream))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app("http://127.0.0.1:9")
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(middleware::REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_preflight_is_answered_with_cors() {
        let response = test_app("http://127.0.0.1:9")
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/products")
                    .header(header::ORIGIN, "https://shop.test")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway_with_cors() {
        let response = test_app("http://127.0.0.1:9")
            .oneshot(
                Request::get("/api/products")
                    .header(header::ORIGIN, "https://shop.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(
            response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Upstream request failed"));
    }

    #[tokio::test]
    async fn test_forward_without_path_is_bad_request() {
        let response = test_app("http://127.0.0.1:9")
            .oneshot(
                Request::get("/api/forward?currency=USD")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_without_backend_is_not_found() {
        let response = test_app("http://127.0.0.1:9")
            .oneshot(
                Request::post("/api/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"function":"get_products"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Webhook forwarding is not configured");
    }
}
