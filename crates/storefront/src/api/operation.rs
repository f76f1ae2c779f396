//! Operations and their wire encodings.
//!
//! An [`ApiCall`] is an operation plus named parameters. It encodes either as
//! a REST request (path parameters substituted into the route, the rest in
//! the query string or JSON body) or as a webhook request (one endpoint, the
//! operation named by a `function` field).

use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::ApiStyle;
use crate::error::ApiError;

/// The operations the storefront performs against the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListProducts,
    GetProduct,
    AddItem,
    GetCart,
    RemoveItem,
    SubmitAddress,
    SubmitShippingMethod,
    GetConfirmation,
    PlaceOrder,
}

impl Operation {
    /// Function selector used by the webhook backend.
    #[must_use]
    pub const fn function_name(self) -> &'static str {
        match self {
            Self::ListProducts => "get_products",
            Self::GetProduct => "get_product",
            Self::AddItem => "add_to_cart",
            Self::GetCart => "get_cart_items",
            Self::RemoveItem => "remove_cart_item",
            Self::SubmitAddress => "set_checkout_address",
            Self::SubmitShippingMethod => "set_shipping_method",
            Self::GetConfirmation => "get_checkout_confirmation",
            Self::PlaceOrder => "place_order",
        }
    }

    /// HTTP method and route template for the REST backend.
    ///
    /// `{name}` segments are filled from the call's parameters.
    fn rest_route(self) -> (Method, &'static str) {
        match self {
            Self::ListProducts => (Method::GET, "products"),
            Self::GetProduct => (Method::GET, "products/{product_id}"),
            Self::AddItem => (Method::POST, "cart/items"),
            Self::GetCart => (Method::GET, "cart/{cart_id}"),
            Self::RemoveItem => (Method::DELETE, "cart/{cart_id}/items/{item_id}"),
            Self::SubmitAddress => (Method::POST, "checkout/{cart_id}/address"),
            Self::SubmitShippingMethod => (Method::POST, "checkout/{cart_id}/shipping-method"),
            Self::GetConfirmation => (Method::GET, "checkout/{cart_id}/confirmation"),
            Self::PlaceOrder => (Method::POST, "checkout/{cart_id}/order"),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.function_name())
    }
}

/// An operation with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub operation: Operation,
    pub params: Map<String, Value>,
}

/// An encoded request, relative to a channel's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRequest {
    pub method: Method,
    /// Path segments appended to the base URL (unencoded).
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiCall {
    /// A call with no parameters.
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            params: Map::new(),
        }
    }

    /// Add a parameter.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` if the value cannot be serialized.
    pub fn param(mut self, key: &str, value: &impl Serialize) -> Result<Self, ApiError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ApiError::InvalidRequest(format!("parameter {key}: {e}")))?;
        self.params.insert(key.to_string(), value);
        Ok(self)
    }

    /// Encode for the given backend style.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` if a route parameter is missing.
    pub fn encode(&self, style: &ApiStyle) -> Result<EncodedRequest, ApiError> {
        match style {
            ApiStyle::Rest => self.encode_rest(),
            ApiStyle::Webhook { path } => Ok(self.encode_webhook(path)),
        }
    }

    fn encode_rest(&self) -> Result<EncodedRequest, ApiError> {
        let (method, template) = self.operation.rest_route();
        let mut remaining = self.params.clone();

        let segments = template
            .split('/')
            .map(|segment| {
                match segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                {
                    Some(name) => remaining
                        .remove(name)
                        .map(|value| value_to_string(&value))
                        .ok_or_else(|| {
                            ApiError::InvalidRequest(format!(
                                "{} requires parameter {name}",
                                self.operation
                            ))
                        }),
                    None => Ok(segment.to_string()),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (query, body) = if method == Method::GET || method == Method::DELETE {
            let query = remaining
                .iter()
                .map(|(key, value)| (key.clone(), value_to_string(value)))
                .collect();
            (query, None)
        } else {
            (Vec::new(), Some(Value::Object(remaining)))
        };

        Ok(EncodedRequest {
            method,
            segments,
            query,
            body,
        })
    }

    fn encode_webhook(&self, path: &str) -> EncodedRequest {
        let mut body = Map::new();
        body.insert(
            "function".to_string(),
            Value::String(self.operation.function_name().to_string()),
        );
        body.extend(self.params.clone());

        EncodedRequest {
            method: Method::POST,
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
            query: Vec::new(),
            body: Some(Value::Object(body)),
        }
    }
}

/// Render a parameter for a path segment or query string.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
