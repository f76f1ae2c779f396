//! Integration test support for Market Lane.
//!
//! Tests run the real proxy and the real storefront client against
//! [`FakePlatform`], an in-memory commerce backend served over HTTP on an
//! ephemeral port. The platform records every request it receives so tests
//! can assert on what actually crossed the wire (headers, paths, bodies).
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p market-lane-integration-tests
//! ```
//!
//! No external services are needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use market_lane_proxy::{AppState, UpstreamConfig};
use parking_lot::Mutex;
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use url::Url;

/// Key the fake platform accepts.
pub const PLATFORM_KEY: &str = "pk_live_Q7mX2vR9tL4nB8kWz3Fh";

/// Header the fake platform reads the key from.
pub const PLATFORM_KEY_HEADER: &str = "x-api-key";

/// A request as received by a fake server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    /// Header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body parsed as JSON, or `Value::Null`.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

/// Bind an ephemeral port and serve `router` on it in the background.
///
/// # Panics
///
/// Panics if no local port can be bound.
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Base URL for a spawned server, with a trailing slash.
///
/// # Panics
///
/// Panics if `path` does not form a valid URL.
#[must_use]
pub fn base_url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{addr}{path}")).expect("Invalid test URL")
}

/// Run the real proxy in front of `upstream`. Returns the proxy's address.
pub async fn spawn_proxy(upstream: UpstreamConfig) -> SocketAddr {
    spawn_router(market_lane_proxy::app(AppState::new(upstream))).await
}

/// Upstream settings pointing at `platform`, keyed with [`PLATFORM_KEY`].
#[must_use]
pub fn upstream_for(platform: &FakePlatform) -> UpstreamConfig {
    let mut upstream = UpstreamConfig::new(platform.url(), SecretString::from(PLATFORM_KEY));
    upstream.webhook_url = Some(base_url(platform.addr, "/webhook"));
    upstream
}

// =============================================================================
// Fake Platform
// =============================================================================

/// An in-memory commerce platform.
///
/// Serves the REST routes (`products`, `cart/...`, `checkout/...`) and a
/// webhook endpoint (`POST /webhook` with a `function` field) over the same
/// state. Every request must carry [`PLATFORM_KEY`] in
/// [`PLATFORM_KEY_HEADER`]; requests without it get 401.
#[derive(Clone)]
pub struct FakePlatform {
    pub addr: SocketAddr,
    state: Arc<PlatformState>,
}

#[derive(Default)]
struct PlatformState {
    requests: Mutex<Vec<RecordedRequest>>,
    carts: Mutex<HashMap<String, CartState>>,
    shipping_methods: Mutex<Vec<Value>>,
    fail_status: Mutex<Option<u16>>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct CartState {
    lines: Vec<Value>,
    shipping_address: Value,
    billing_address: Value,
    shipping_method: Option<Value>,
}

impl FakePlatform {
    /// Start a platform with the default catalog and two shipping methods.
    pub async fn start() -> Self {
        let state = Arc::new(PlatformState::default());
        *state.shipping_methods.lock() = vec![
            json!({ "id": "standard", "name": "Standard", "fee": "5.00" }),
            json!({ "id": "express", "name": "Express", "fee": "15.00", "is_default": true }),
        ];
        let router = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));
        let addr = spawn_router(router).await;
        Self { addr, state }
    }

    /// Base URL of the REST routes.
    #[must_use]
    pub fn url(&self) -> Url {
        base_url(self.addr, "/")
    }

    /// Replace the shipping methods offered for any address.
    pub fn set_shipping_methods(&self, methods: Vec<Value>) {
        *self.state.shipping_methods.lock() = methods;
    }

    /// Answer every request with `status` until cleared with `None`.
    pub fn fail_with(&self, status: Option<u16>) {
        *self.state.fail_status.lock() = status;
    }

    /// All requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Requests whose path starts with `prefix`.
    #[must_use]
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with(prefix))
            .collect()
    }

    /// Number of carts that still exist.
    #[must_use]
    pub fn cart_count(&self) -> usize {
        self.state.carts.lock().len()
    }
}

/// Products in the default catalog.
#[must_use]
pub fn catalog() -> Value {
    json!([
        {
            "product_id": 42,
            "name": "Pineapple Mug",
            "price": "12.50",
            "images": ["https://cdn.shop.test/mug.jpg"],
            "skus": [
                { "sku_id": 4201, "name": "Default Title", "price": "12.50" }
            ]
        },
        {
            "id": "77",
            "title": "Market Tee",
            "price": 20,
            "compare_at_price": "25.00",
            "variants": [
                { "id": "7701", "title": "Medium" },
                { "id": "7702", "title": "Large", "price": "22.00", "available": false }
            ],
            "vendor": "Market Lane"
        }
    ])
}

async fn handle(
    State(state): State<Arc<PlatformState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers.clone(),
        body: body.clone(),
    };
    state.requests.lock().push(request.clone());

    if let Some(status) = *state.fail_status.lock() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "platform unavailable").into_response();
    }

    if request.header(PLATFORM_KEY_HEADER) != Some(PLATFORM_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid API key" })),
        )
            .into_response();
    }

    let segments: Vec<&str> = request
        .path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let call = if segments == ["webhook"] {
        match request.json() {
            Value::Object(mut params) => params
                .remove("function")
                .and_then(|f| f.as_str().map(str::to_string))
                .map(|function| (function, params)),
            _ => None,
        }
    } else {
        rest_call(&method, &segments, request.query.as_deref(), &request.json())
    };

    match call {
        Some((function, params)) => dispatch(&state, &function, &params),
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" }))).into_response(),
    }
}

/// Map a REST request onto a webhook-style function call.
fn rest_call(
    method: &Method,
    segments: &[&str],
    query: Option<&str>,
    body: &Value,
) -> Option<(String, Map<String, Value>)> {
    let mut params = match body {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        params.insert(key.into_owned(), Value::String(value.into_owned()));
    }
    let mut path_param = |key: &str, value: &str| {
        params.insert(key.to_string(), Value::String(value.to_string()));
    };

    let function = match (method.as_str(), segments) {
        ("GET", ["products"]) => "get_products",
        ("GET", ["products", id]) => {
            path_param("product_id", *id);
            "get_product"
        }
        ("POST", ["cart", "items"]) => "add_to_cart",
        ("GET", ["cart", cart_id]) => {
            path_param("cart_id", *cart_id);
            "get_cart_items"
        }
        ("DELETE", ["cart", cart_id, "items", item_id]) => {
            path_param("cart_id", *cart_id);
            path_param("item_id", *item_id);
            "remove_cart_item"
        }
        ("POST", ["checkout", cart_id, "address"]) => {
            path_param("cart_id", *cart_id);
            "set_checkout_address"
        }
        ("POST", ["checkout", cart_id, "shipping-method"]) => {
            path_param("cart_id", *cart_id);
            "set_shipping_method"
        }
        ("GET", ["checkout", cart_id, "confirmation"]) => {
            path_param("cart_id", *cart_id);
            "get_checkout_confirmation"
        }
        ("POST", ["checkout", cart_id, "order"]) => {
            path_param("cart_id", *cart_id);
            "place_order"
        }
        _ => return None,
    };
    Some((function.to_string(), params))
}

fn param(params: &Map<String, Value>, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
}

fn rejected(message: &str) -> Response {
    Json(json!({ "status_code": "1", "message": message })).into_response()
}

#[allow(clippy::too_many_lines)]
fn dispatch(state: &PlatformState, function: &str, params: &Map<String, Value>) -> Response {
    let products = catalog();
    let product_list = products.as_array().cloned().unwrap_or_default();

    match function {
        "get_products" => {
            Json(json!({ "status_code": "0", "data": { "products": products } })).into_response()
        }
        "get_product" => {
            let id = param(params, "product_id").unwrap_or_default();
            match find_product(&product_list, &id) {
                Some(product) => Json(json!({ "data": product })).into_response(),
                None => not_found("Product not found"),
            }
        }
        "add_to_cart" => {
            let Some(variant_id) = param(params, "variant_id") else {
                return rejected("variant_id is required");
            };
            let Some(product) = find_product(&product_list, &variant_id) else {
                return not_found("Variant not found");
            };
            let quantity = params
                .get("quantity")
                .and_then(Value::as_u64)
                .unwrap_or(1);

            let mut carts = state.carts.lock();
            let cart_id = param(params, "cart_id")
                .filter(|id| carts.contains_key(id))
                .unwrap_or_else(|| {
                    format!("cart-{}", state.next_id.fetch_add(1, Ordering::Relaxed) + 1)
                });
            let cart = carts.entry(cart_id.clone()).or_default();
            let line_id = format!("line-{}", state.next_id.fetch_add(1, Ordering::Relaxed) + 1);
            cart.lines.push(line(&product, &variant_id, &line_id, quantity));

            Json(json!({ "status_code": 0, "payload": cart_json(&cart_id, cart) })).into_response()
        }
        "get_cart_items" => {
            let cart_id = param(params, "cart_id").unwrap_or_default();
            match state.carts.lock().get(&cart_id) {
                Some(cart) => Json(cart_json(&cart_id, cart)).into_response(),
                None => not_found("Cart not found"),
            }
        }
        "remove_cart_item" => {
            let cart_id = param(params, "cart_id").unwrap_or_default();
            let item_id = param(params, "item_id").unwrap_or_default();
            let mut carts = state.carts.lock();
            let Some(cart) = carts.get_mut(&cart_id) else {
                return not_found("Cart not found");
            };
            cart.lines.retain(|l| l["item_id"] != item_id.as_str());
            Json(json!({ "status_code": "0", "payload": cart_json(&cart_id, cart) }))
                .into_response()
        }
        "set_checkout_address" => {
            let cart_id = param(params, "cart_id").unwrap_or_default();
            let mut carts = state.carts.lock();
            let Some(cart) = carts.get_mut(&cart_id) else {
                return not_found("Cart not found");
            };
            cart.shipping_address = params.get("shipping_address").cloned().unwrap_or_default();
            cart.billing_address = params.get("billing_address").cloned().unwrap_or_default();
            let methods = state.shipping_methods.lock().clone();
            Json(json!({
                "status_code": "0",
                "payload": { "checkout": { "available_shipping_methods": methods } }
            }))
            .into_response()
        }
        "set_shipping_method" => {
            let cart_id = param(params, "cart_id").unwrap_or_default();
            let method_id = param(params, "shipping_method_id").unwrap_or_default();
            let method = state
                .shipping_methods
                .lock()
                .iter()
                .find(|m| m["id"] == method_id.as_str())
                .cloned();
            let Some(method) = method else {
                return rejected("Shipping method is not available");
            };
            let mut carts = state.carts.lock();
            let Some(cart) = carts.get_mut(&cart_id) else {
                return not_found("Cart not found");
            };
            cart.shipping_method = Some(method);
            Json(json!({ "status_code": "0" })).into_response()
        }
        "get_checkout_confirmation" => {
            let cart_id = param(params, "cart_id").unwrap_or_default();
            match state.carts.lock().get(&cart_id) {
                Some(cart) => {
                    let subtotal = subtotal_cents(cart);
                    let fee = shipping_cents(cart);
                    Json(json!({
                        "data": {
                            "shipping_address": cart.shipping_address,
                            "billing_address": cart.billing_address,
                            "selected_shipping_method": cart.shipping_method,
                            "subtotal": cents(subtotal),
                            "shipping_price": cents(fee),
                            "total_price": cents(subtotal + fee)
                        }
                    }))
                    .into_response()
                }
                None => not_found("Cart not found"),
            }
        }
        "place_order" => {
            let cart_id = param(params, "cart_id").unwrap_or_default();
            if param(params, "payment_mode").as_deref() != Some("cod") {
                return rejected("Only cash on delivery is supported");
            }
            let Some(cart) = state.carts.lock().remove(&cart_id) else {
                return not_found("Cart not found");
            };
            let total = subtotal_cents(&cart) + shipping_cents(&cart);
            let order = 1000 + state.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            Json(json!({ "data": { "order_number": order, "total_price": cents(total) } }))
                .into_response()
        }
        _ => rejected("Unknown function"),
    }
}

fn id_is(value: &Value, id: &str) -> bool {
    match value {
        Value::String(s) => s == id,
        Value::Number(n) => n.to_string() == id,
        _ => false,
    }
}

fn find_product(products: &[Value], id: &str) -> Option<Value> {
    products
        .iter()
        .find(|p| {
            id_is(&p["id"], id)
                || id_is(&p["product_id"], id)
                || variants(p)
                    .iter()
                    .any(|v| id_is(&v["id"], id) || id_is(&v["sku_id"], id))
        })
        .cloned()
}

fn variants(product: &Value) -> Vec<Value> {
    product
        .get("variants")
        .or_else(|| product.get("skus"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn line(product: &Value, variant_id: &str, line_id: &str, quantity: u64) -> Value {
    let variant = variants(product)
        .into_iter()
        .find(|v| id_is(&v["id"], variant_id) || id_is(&v["sku_id"], variant_id))
        .unwrap_or_default();
    let price = variant
        .get("price")
        .filter(|p| !p.is_null())
        .or_else(|| product.get("price"))
        .cloned()
        .unwrap_or(Value::Null);
    json!({
        "item_id": line_id,
        "product_id": product.get("id").or_else(|| product.get("product_id")),
        "sku_id": variant_id,
        "name": product.get("title").or_else(|| product.get("name")),
        "variant_title": variant.get("title").or_else(|| variant.get("name")),
        "quantity": quantity,
        "price": price
    })
}

fn price_cents(value: &Value) -> u64 {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return 0,
    };
    let (whole, frac) = text.split_once('.').unwrap_or((&text, "0"));
    let frac = format!("{frac:0<2}");
    let frac: u64 = frac.get(..2).and_then(|f| f.parse().ok()).unwrap_or(0);
    whole.parse::<u64>().unwrap_or(0) * 100 + frac
}

fn subtotal_cents(cart: &CartState) -> u64 {
    cart.lines
        .iter()
        .map(|l| price_cents(&l["price"]) * l["quantity"].as_u64().unwrap_or(1))
        .sum()
}

fn shipping_cents(cart: &CartState) -> u64 {
    cart.shipping_method
        .as_ref()
        .map_or(0, |m| price_cents(&m["fee"]))
}

fn cents(amount: u64) -> String {
    format!("{}.{:02}", amount / 100, amount % 100)
}

fn cart_json(cart_id: &str, cart: &CartState) -> Value {
    json!({
        "cart_id": cart_id,
        "line_items": cart.lines,
        "total_price": cents(subtotal_cents(cart))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_cents() {
        assert_eq!(price_cents(&json!("12.50")), 1250);
        assert_eq!(price_cents(&json!("5")), 500);
        assert_eq!(price_cents(&json!(20)), 2000);
        assert_eq!(price_cents(&json!("22.0")), 2200);
        assert_eq!(cents(4250), "42.50");
    }

    #[test]
    fn test_rest_call_mapping() {
        let (function, params) = rest_call(
            &Method::DELETE,
            &["cart", "cart-1", "items", "line-2"],
            None,
            &Value::Null,
        )
        .unwrap();
        assert_eq!(function, "remove_cart_item");
        assert_eq!(params["cart_id"], "cart-1");
        assert_eq!(params["item_id"], "line-2");

        assert!(rest_call(&Method::GET, &["admin"], None, &Value::Null).is_none());
    }
}
