//! Checkout payloads: addresses, shipping methods, confirmation, orders.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{OrderId, ShippingMethodId};
use super::price::Price;

/// Address validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// One or more required fields are blank.
    #[error("Missing required address fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// A postal address used for shipping or billing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub province: String,
    pub city: String,
    pub address1: String,
    pub address2: String,
    #[serde(alias = "zip")]
    pub postal_code: String,
}

impl Address {
    /// Check that every field the platform requires is filled in.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::MissingFields` listing each blank field.
    pub fn validate(&self) -> Result<(), AddressError> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("phone", &self.phone),
            ("address1", &self.address1),
            ("city", &self.city),
            ("country", &self.country),
        ];

        let missing: Vec<&'static str> = required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AddressError::MissingFields(missing))
        }
    }

    /// Single-line summary for display.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            format!("{} {}", self.first_name, self.last_name).trim().to_owned(),
            self.address1.clone(),
            self.address2.clone(),
            self.city.clone(),
            self.province.clone(),
            self.postal_code.clone(),
            self.country.clone(),
        ]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// A shipping option offered after the address is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    /// Platform shipping method ID.
    #[serde(alias = "shipping_method_id")]
    pub id: ShippingMethodId,
    /// Display name.
    #[serde(default, alias = "title")]
    pub name: String,
    /// Shipping fee.
    #[serde(default, alias = "fee")]
    pub price: Option<Price>,
    /// Whether the platform recommends this method.
    #[serde(default)]
    pub is_default: bool,
}

/// The list of shipping methods returned by an address submission.
#[derive(Debug, Clone, Deserialize)]
pub struct ShippingMethods {
    /// Offered methods. An empty list means none are offered; a missing
    /// key means the response was not a shipping-method list at all.
    #[serde(alias = "available_shipping_methods")]
    pub shipping_methods: Vec<ShippingMethod>,
}

impl ShippingMethods {
    /// The method to preselect: the one flagged default, else the first.
    #[must_use]
    pub fn default_method(methods: &[ShippingMethod]) -> Option<&ShippingMethod> {
        methods
            .iter()
            .find(|m| m.is_default)
            .or_else(|| methods.first())
    }
}

/// Everything shown on the confirmation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationSnapshot {
    #[serde(default)]
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Address,
    #[serde(default, alias = "selected_shipping_method")]
    pub shipping_method: Option<ShippingMethod>,
    #[serde(default)]
    pub subtotal: Option<Price>,
    #[serde(default, alias = "shipping_price")]
    pub shipping_fee: Option<Price>,
    /// Amount due. Required: a payload without a total is not a confirmation.
    #[serde(alias = "total_price")]
    pub total: Price,
}

/// Payment mode sent with an order.
///
/// Only cash on delivery is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentMode {
    #[default]
    #[serde(rename = "cod")]
    CashOnDelivery,
}

impl PaymentMode {
    /// Wire value of the payment mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cod",
        }
    }
}

/// The result of placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Platform order ID or number.
    #[serde(alias = "order_number", alias = "id")]
    pub order_id: OrderId,
    /// Amount charged.
    #[serde(default, alias = "total_price")]
    pub total: Option<Price>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_address() -> Address {
        Address {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: "555-0100".to_string(),
            address1: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            country: "GB".to_string(),
            ..Address::default()
        }
    }

    #[test]
    fn test_address_validate_ok() {
        assert!(complete_address().validate().is_ok());
    }

    #[test]
    fn test_address_validate_lists_missing_fields() {
        let address = Address {
            city: "  ".to_string(),
            phone: String::new(),
            ..complete_address()
        };
        let err = address.validate().unwrap_err();
        assert_eq!(err, AddressError::MissingFields(vec!["phone", "city"]));
        assert_eq!(
            err.to_string(),
            "Missing required address fields: phone, city"
        );
    }

    #[test]
    fn test_address_one_line_skips_blank_parts() {
        assert_eq!(
            complete_address().one_line(),
            "Ada Lovelace, 12 Analytical Way, London, GB"
        );
    }

    #[test]
    fn test_default_method_prefers_flag() {
        let methods: ShippingMethods = serde_json::from_value(json!({
            "shipping_methods": [
                { "id": 1, "name": "Standard", "price": "5.00" },
                { "id": 2, "name": "Express", "price": "15.00", "is_default": true }
            ]
        }))
        .unwrap();
        let chosen = ShippingMethods::default_method(&methods.shipping_methods).unwrap();
        assert_eq!(chosen.id, ShippingMethodId::new("2"));
    }

    #[test]
    fn test_default_method_falls_back_to_first() {
        let methods: ShippingMethods = serde_json::from_value(json!({
            "available_shipping_methods": [
                { "id": "a", "name": "Pickup" },
                { "id": "b", "name": "Courier" }
            ]
        }))
        .unwrap();
        let chosen = ShippingMethods::default_method(&methods.shipping_methods).unwrap();
        assert_eq!(chosen.id, ShippingMethodId::new("a"));
        assert!(ShippingMethods::default_method(&[]).is_none());
    }

    #[test]
    fn test_payment_mode_wire_value() {
        assert_eq!(
            serde_json::to_value(PaymentMode::CashOnDelivery).unwrap(),
            json!("cod")
        );
        assert_eq!(PaymentMode::CashOnDelivery.as_str(), "cod");
    }

    #[test]
    fn test_confirmation_requires_total() {
        assert!(serde_json::from_value::<ConfirmationSnapshot>(json!({})).is_err());
        let snapshot: ConfirmationSnapshot =
            serde_json::from_value(json!({ "total_price": "20.00" })).unwrap();
        assert_eq!(snapshot.total, Price::from_cents(2000));
        assert!(snapshot.shipping_method.is_none());
    }
}
