//! Forwarding routes.
//!
//! | route | target |
//! |-------|--------|
//! | `ANY /api/{*path}` | `{upstream}/{path}?{query}` |
//! | `ANY /api/forward?path=/x&...` | `{upstream}/x?{query without path}` |
//! | `POST /api/webhook` | configured webhook URL |
//!
//! The method, body, `content-type` and `accept` are passed through. The
//! platform key is injected from configuration; nothing else from the
//! client's headers reaches the upstream, so a client-sent key is dropped.
//! The upstream status, body and content type are mirrored back.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{
        HeaderMap, Method,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{any, post},
};
use secrecy::ExposeSecret;
use tracing::{info, instrument};
use url::{Url, form_urlencoded};

use crate::error::{ProxyError, Result};
use crate::middleware::REQUEST_ID_HEADER;
use crate::state::AppState;

/// Query parameter naming the upstream path on `/api/forward`.
const PATH_PARAM: &str = "path";

/// Build the forwarding router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/forward", any(forward_by_query))
        .route("/api/webhook", post(forward_webhook))
        .route("/api/{*path}", any(forward_by_path))
}

// =============================================================================
// Handlers
// =============================================================================

/// Forward `/api/{path}` to the same path under the upstream base URL.
#[instrument(skip_all, fields(path = %path))]
async fn forward_by_path(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let target = upstream_url(&state.upstream().base_url, &path, query.as_deref())?;
    forward(&state, method, target, &headers, body).await
}

/// Forward to the path named by the `path` query parameter.
#[instrument(skip_all)]
async fn forward_by_query(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let (path, rest) = split_path_param(query.as_deref().unwrap_or_default());
    let path = path.ok_or(ProxyError::MissingPath)?;
    let target = upstream_url(&state.upstream().base_url, &path, rest.as_deref())?;
    forward(&state, method, target, &headers, body).await
}

/// Forward a webhook call to the configured webhook backend.
#[instrument(skip_all)]
async fn forward_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let target = state
        .upstream()
        .webhook_url
        .clone()
        .ok_or(ProxyError::WebhookNotConfigured)?;
    forward(&state, Method::POST, target, &headers, body).await
}

// =============================================================================
// Forwarding
// =============================================================================

/// Send the request upstream and mirror the response.
async fn forward(
    state: &AppState,
    method: Method,
    target: Url,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let upstream = state.upstream();
    let mut request = state.client().request(method.clone(), target.clone());

    for name in [CONTENT_TYPE, ACCEPT] {
        if let Some(value) = headers.get(&name) {
            request = request.header(name, value.clone());
        }
    }
    if let Some(value) = headers.get(REQUEST_ID_HEADER) {
        request = request.header(REQUEST_ID_HEADER, value.clone());
    }
    request = request.header(
        upstream.auth_header.clone(),
        upstream.api_key.expose_secret(),
    );
    if !body.is_empty() {
        request = request.body(body);
    }

    let response = request.send().await?;
    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    let bytes = response.bytes().await?;

    info!(
        method = %method,
        target = %redacted(&target),
        status = status.as_u16(),
        "Forwarded request"
    );

    let mut mirrored = (status, bytes).into_response();
    let out_headers = mirrored.headers_mut();
    out_headers.remove(CONTENT_TYPE);
    if let Some(content_type) = content_type {
        out_headers.insert(CONTENT_TYPE, content_type);
    }
    Ok(mirrored)
}

/// Join `path` onto `base`, keeping any path prefix the base carries.
///
/// `.` and `..` segments are rejected so a caller cannot climb out of the
/// base path.
///
/// # Errors
///
/// Returns `ProxyError::InvalidPath` for traversal segments or a base URL
/// that cannot take a path.
pub fn upstream_url(base: &Url, path: &str, query: Option<&str>) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| ProxyError::InvalidPath(base.to_string()))?;
        segments.pop_if_empty();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(ProxyError::InvalidPath(path.to_string()));
            }
            segments.push(segment);
        }
    }
    url.set_query(query.filter(|q| !q.is_empty()));
    Ok(url)
}

/// Split the `path` parameter out of a raw query string.
///
/// Returns the path (if present) and the remaining query re-encoded, or
/// `None` if nothing remains.
#[must_use]
pub fn split_path_param(query: &str) -> (Option<String>, Option<String>) {
    let mut path = None;
    let mut rest = form_urlencoded::Serializer::new(String::new());
    let mut has_rest = false;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == PATH_PARAM {
            path = Some(value.into_owned());
        } else {
            rest.append_pair(&key, &value);
            has_rest = true;
        }
    }

    (path, has_rest.then(|| rest.finish()))
}

/// The target URL without its query string, for logging.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.shop.test/v2/").unwrap()
    }

    #[test]
    fn test_upstream_url_keeps_base_prefix_and_query() {
        let url = upstream_url(&base(), "cart/c1/items/7", Some("qty=2")).unwrap();
        assert_eq!(url.as_str(), "https://api.shop.test/v2/cart/c1/items/7?qty=2");

        let url = upstream_url(&base(), "/products", None).unwrap();
        assert_eq!(url.as_str(), "https://api.shop.test/v2/products");
    }

    #[test]
    fn test_upstream_url_rejects_traversal() {
        assert!(matches!(
            upstream_url(&base(), "products/../../admin", None),
            Err(ProxyError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_split_path_param_strips_only_path() {
        let (path, rest) = split_path_param("path=%2Fproducts%2Fp1&currency=USD&path_hint=x");
        assert_eq!(path.as_deref(), Some("/products/p1"));
        assert_eq!(rest.as_deref(), Some("currency=USD&path_hint=x"));

        let (path, rest) = split_path_param("path=/cart");
        assert_eq!(path.as_deref(), Some("/cart"));
        assert_eq!(rest, None);

        let (path, _) = split_path_param("currency=USD");
        assert_eq!(path, None);
    }
}
