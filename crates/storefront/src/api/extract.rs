//! Response envelope checks and payload extraction.
//!
//! The platform wraps payloads inconsistently: sometimes the entity is the
//! whole body, sometimes it sits under `payload`, `payload.checkout` or
//! `data`. Each [`Extraction`] names one nesting path. [`normalize`] tries
//! them in order and returns the first that deserializes into the expected
//! type.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

/// A nesting path at which a payload may be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction {
    pub name: &'static str,
    path: &'static [&'static str],
}

impl Extraction {
    pub const PAYLOAD_CHECKOUT: Self = Self {
        name: "payload.checkout",
        path: &["payload", "checkout"],
    };
    pub const PAYLOAD: Self = Self {
        name: "payload",
        path: &["payload"],
    };
    pub const DATA: Self = Self {
        name: "data",
        path: &["data"],
    };
    pub const ROOT: Self = Self {
        name: "root",
        path: &[],
    };

    /// Strategies in the order they are tried.
    pub const DEFAULT_ORDER: [Self; 4] =
        [Self::PAYLOAD_CHECKOUT, Self::PAYLOAD, Self::DATA, Self::ROOT];

    /// The value at this path, if every step exists.
    #[must_use]
    pub fn extract<'a>(&self, body: &'a Value) -> Option<&'a Value> {
        self.path
            .iter()
            .try_fold(body, |value, key| value.get(*key))
            .filter(|value| !value.is_null())
    }
}

/// Reject bodies whose envelope reports failure.
///
/// A `status_code` of `"0"` (or `0`) means success; any other value is a
/// rejection. Bodies without a `status_code` pass.
///
/// # Errors
///
/// Returns `ApiError::Rejected` with the envelope's `message`.
pub fn check_envelope(body: &Value) -> Result<(), ApiError> {
    let code = match body.get("status_code") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::String(code)) => code.trim().to_string(),
        Some(other) => other.to_string(),
    };
    if code == "0" {
        return Ok(());
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Err(ApiError::Rejected { code, message })
}

/// Check the envelope, then extract a `T` with the default strategy order.
///
/// # Errors
///
/// Returns `ApiError::Rejected` for a failed envelope and
/// `ApiError::UnexpectedShape` when no strategy yields a `T`.
pub fn normalize<T: DeserializeOwned>(body: &Value) -> Result<T, ApiError> {
    normalize_with(body, &Extraction::DEFAULT_ORDER)
}

/// [`normalize`] with an explicit strategy order.
///
/// # Errors
///
/// See [`normalize`].
pub fn normalize_with<T: DeserializeOwned>(
    body: &Value,
    strategies: &[Extraction],
) -> Result<T, ApiError> {
    check_envelope(body)?;

    let mut last_error = None;
    for strategy in strategies {
        let Some(candidate) = strategy.extract(body) else {
            continue;
        };
        match T::deserialize(candidate) {
            Ok(value) => {
                debug!(strategy = strategy.name, "Extracted response payload");
                return Ok(value);
            }
            Err(e) => last_error = Some(format!("{}: {e}", strategy.name)),
        }
    }

    Err(ApiError::UnexpectedShape(format!(
        "expected {} ({})",
        short_type_name::<T>(),
        last_error.unwrap_or_else(|| "no candidate payload".to_string())
    )))
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use market_lane_core::{Cart, ShippingMethods};
    use serde_json::json;

    #[test]
    fn test_extract_paths() {
        let body = json!({ "payload": { "checkout": { "a": 1 } }, "data": null });
        assert_eq!(
            Extraction::PAYLOAD_CHECKOUT.extract(&body),
            Some(&json!({ "a": 1 }))
        );
        assert!(Extraction::PAYLOAD.extract(&body).is_some());
        assert!(Extraction::DATA.extract(&body).is_none());
        assert_eq!(Extraction::ROOT.extract(&body), Some(&body));
    }

    #[test]
    fn test_envelope_status_codes() {
        assert!(check_envelope(&json!({ "items": [] })).is_ok());
        assert!(check_envelope(&json!({ "status_code": "0" })).is_ok());
        assert!(check_envelope(&json!({ "status_code": 0 })).is_ok());

        let err = check_envelope(&json!({ "status_code": "1002", "message": "Bad zip" }))
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                code: "1002".to_string(),
                message: "Bad zip".to_string()
            }
        );
        assert!(matches!(
            check_envelope(&json!({ "status_code": 7 })),
            Err(ApiError::Rejected { code, .. }) if code == "7"
        ));
    }

    #[test]
    fn test_payload_checkout_preferred_over_payload() {
        let body = json!({
            "status_code": "0",
            "payload": {
                "checkout": { "shipping_methods": [{ "id": "std", "name": "Standard" }] },
                "shipping_methods": []
            }
        });
        let methods: ShippingMethods = normalize(&body).unwrap();
        assert_eq!(methods.shipping_methods.len(), 1);
    }

    #[test]
    fn test_falls_through_to_matching_strategy() {
        // `payload` exists but holds something that is not a cart.
        let body = json!({ "payload": "ok", "data": { "items": [{ "id": 1, "title": "Mug" }] } });
        let cart: Cart = normalize(&body).unwrap();
        assert_eq!(cart.items.len(), 1);

        let bare = json!({ "id": "c1", "items": [] });
        let cart: Cart = normalize(&bare).unwrap();
        assert_eq!(cart.id.unwrap().as_str(), "c1");
    }

    #[test]
    fn test_no_match_is_unexpected_shape() {
        let err = normalize::<Cart>(&json!({ "payload": { "nothing": true } })).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedShape(ref m) if m.contains("Cart")));
    }

    #[test]
    fn test_rejection_short_circuits_extraction() {
        let body = json!({ "status_code": "5", "message": "Cart expired", "items": [] });
        assert!(matches!(
            normalize::<Cart>(&body),
            Err(ApiError::Rejected { .. })
        ));
    }
}
