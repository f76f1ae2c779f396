//! Cart payloads.

use serde::{Deserialize, Serialize};

use super::id::{CartId, CartItemId, ProductId, VariantId};
use super::price::Price;

/// A shopping cart as returned by the commerce platform.
///
/// `items` is required when deserializing: a payload without an item list is
/// not a cart, whatever else it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Cart identity, present once the platform has created the cart.
    #[serde(default, alias = "cart_id")]
    pub id: Option<CartId>,
    /// Line items.
    #[serde(alias = "line_items")]
    pub items: Vec<CartItem>,
    /// Sum of line totals before shipping.
    #[serde(default)]
    pub subtotal: Option<Price>,
    /// Amount due.
    #[serde(default, alias = "total_price")]
    pub total: Option<Price>,
}

impl Cart {
    /// An empty cart with no identity.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            id: None,
            items: Vec::new(),
            subtotal: None,
            total: None,
        }
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total quantity across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |count, item| count.saturating_add(item.quantity))
    }

    /// Amount due: the platform total if given, else the sum of line totals.
    #[must_use]
    pub fn total_or_computed(&self) -> Price {
        self.total
            .or(self.subtotal)
            .unwrap_or_else(|| self.items.iter().map(CartItem::line_total_or_computed).sum())
    }
}

/// A single line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Line ID (used for removal).
    #[serde(alias = "item_id", alias = "line_id")]
    pub id: CartItemId,
    /// Product this line refers to.
    #[serde(default)]
    pub product_id: Option<ProductId>,
    /// Variant this line refers to.
    #[serde(default, alias = "sku_id")]
    pub variant_id: Option<VariantId>,
    /// Product title.
    #[serde(default, alias = "name")]
    pub title: String,
    /// Variant title.
    #[serde(default)]
    pub variant_title: Option<String>,
    /// Quantity.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Unit price.
    #[serde(default)]
    pub price: Option<Price>,
    /// Unit price times quantity, after line discounts.
    #[serde(default)]
    pub line_total: Option<Price>,
    /// Image URL.
    #[serde(default)]
    pub image: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

impl CartItem {
    /// Line total from the platform, or unit price times quantity.
    #[must_use]
    pub fn line_total_or_computed(&self) -> Price {
        self.line_total
            .or_else(|| self.price.map(|p| p * self.quantity))
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cart_requires_items() {
        assert!(serde_json::from_value::<Cart>(json!({ "cart_id": "c1" })).is_err());

        let cart: Cart = serde_json::from_value(json!({ "cart_id": "c1", "items": [] })).unwrap();
        assert_eq!(cart.id, Some(CartId::new("c1")));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_totals() {
        let cart: Cart = serde_json::from_value(json!({
            "id": 5,
            "line_items": [
                { "item_id": 1, "title": "Mug", "quantity": 2, "price": "8.00" },
                { "item_id": 2, "title": "Tea", "line_total": 3.5 }
            ]
        }))
        .unwrap();

        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total_or_computed(), Price::from_cents(1950));
    }

    #[test]
    fn test_platform_total_wins() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [{ "id": "a", "price": 1, "quantity": 1 }],
            "total": "0.50"
        }))
        .unwrap();
        assert_eq!(cart.total_or_computed(), Price::from_cents(50));
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::empty();
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.total_or_computed(), Price::ZERO);
    }

    #[test]
    fn test_huge_upstream_amounts_do_not_panic() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [
                { "id": "a", "price": "79228162514264337593543950335", "quantity": 2 },
                { "id": "b", "price": "1.00", "quantity": u32::MAX }
            ]
        }))
        .unwrap();

        let max = Price::new(rust_decimal::Decimal::MAX);
        assert_eq!(cart.items[0].line_total_or_computed(), max);
        assert_eq!(cart.total_or_computed(), max);
        assert_eq!(cart.item_count(), u32::MAX);
    }
}
