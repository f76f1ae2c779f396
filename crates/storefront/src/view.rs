//! Render state derived from API results.

use market_lane_core::{Cart, CartItem, Price};

/// Cart item display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemView {
    pub id: String,
    pub title: String,
    pub variant_title: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<String>,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub cart_id: Option<String>,
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub total: String,
    pub item_count: u32,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            cart_id: None,
            items: Vec::new(),
            subtotal: Price::ZERO.display(),
            total: Price::ZERO.display(),
            item_count: 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Type Conversions
// =============================================================================

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        let subtotal = cart.subtotal.unwrap_or_else(|| {
            cart.items
                .iter()
                .map(CartItem::line_total_or_computed)
                .sum()
        });
        Self {
            cart_id: cart.id.as_ref().map(ToString::to_string),
            items: cart.items.iter().map(CartItemView::from).collect(),
            subtotal: subtotal.display(),
            total: cart.total_or_computed().display(),
            item_count: cart.item_count(),
        }
    }
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.to_string(),
            title: item.title.clone(),
            variant_title: item
                .variant_title
                .clone()
                .filter(|t| !t.is_empty() && t != "Default Title"),
            quantity: item.quantity,
            price: item.price.unwrap_or_default().display(),
            line_price: item.line_total_or_computed().display(),
            image: item.image.clone(),
        }
    }
}
