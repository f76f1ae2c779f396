//! Product payloads as returned by the commerce platform.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};
use super::price::Price;

/// A product with its variants.
///
/// Records are never mutated after they are fetched; a fresher fetch replaces
/// the whole record. Fields the storefront does not model are preserved in
/// `extra` so nothing the platform sends is lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Platform product ID.
    #[serde(alias = "product_id")]
    pub id: ProductId,
    /// Product title.
    #[serde(alias = "name")]
    pub title: String,
    /// Description (may contain HTML).
    #[serde(default)]
    pub description: Option<String>,
    /// Base price (variants may override).
    #[serde(default)]
    pub price: Option<Price>,
    /// Original price when on sale.
    #[serde(default)]
    pub compare_at_price: Option<Price>,
    /// Image URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Purchasable variants.
    #[serde(default, alias = "skus")]
    pub variants: Vec<ProductVariant>,
    /// Any other fields the platform returned.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProductRecord {
    /// IDs of all variants of this product.
    pub fn variant_ids(&self) -> impl Iterator<Item = &VariantId> {
        self.variants.iter().map(|v| &v.id)
    }

    /// Find a variant by ID.
    #[must_use]
    pub fn variant(&self, id: &VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| &v.id == id)
    }

    /// Price of a specific variant, falling back to the product price.
    #[must_use]
    pub fn price_for(&self, id: &VariantId) -> Option<Price> {
        self.variant(id).and_then(|v| v.price).or(self.price)
    }
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Platform variant ID.
    #[serde(alias = "variant_id", alias = "sku_id")]
    pub id: VariantId,
    /// Variant title (e.g. "Large / Blue").
    #[serde(default, alias = "name")]
    pub title: String,
    /// Variant price, if different from the product price.
    #[serde(default)]
    pub price: Option<Price>,
    /// Whether the variant can be added to a cart.
    #[serde(default = "default_available")]
    pub available: bool,
    /// Stock keeping unit.
    #[serde(default)]
    pub sku: Option<String>,
}

const fn default_available() -> bool {
    true
}

/// A product listing.
///
/// The list endpoint returns either a bare array or an object with a
/// `products` field depending on the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProductList {
    /// `[ {...}, {...} ]`
    Bare(Vec<ProductRecord>),
    /// `{ "products": [ ... ] }`
    Wrapped {
        /// The listed products.
        products: Vec<ProductRecord>,
    },
}

impl ProductList {
    /// Unwrap into the listed products.
    #[must_use]
    pub fn into_products(self) -> Vec<ProductRecord> {
        match self {
            Self::Bare(products) | Self::Wrapped { products } => products,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "id": 7,
            "title": "Coffee Beans",
            "price": "14.00",
            "variants": [
                { "id": 71, "title": "250g" },
                { "id": "72", "title": "1kg", "price": 45, "available": false }
            ],
            "vendor": "Roastery"
        })
    }

    #[test]
    fn test_product_deserializes_loose_payload() {
        let product: ProductRecord = serde_json::from_value(sample()).unwrap();
        assert_eq!(product.id, ProductId::new("7"));
        assert_eq!(product.variants.len(), 2);
        assert!(product.variants[0].available);
        assert!(!product.variants[1].available);
        assert_eq!(product.extra.get("vendor"), Some(&json!("Roastery")));
    }

    #[test]
    fn test_price_for_falls_back_to_product_price() {
        let product: ProductRecord = serde_json::from_value(sample()).unwrap();
        assert_eq!(
            product.price_for(&VariantId::new("71")),
            Some(Price::from_cents(1400))
        );
        assert_eq!(
            product.price_for(&VariantId::new("72")),
            Some(Price::from_cents(4500))
        );
    }

    #[test]
    fn test_product_list_shapes() {
        let bare: ProductList = serde_json::from_value(json!([sample()])).unwrap();
        let wrapped: ProductList =
            serde_json::from_value(json!({ "products": [sample(), sample()] })).unwrap();
        assert_eq!(bare.into_products().len(), 1);
        assert_eq!(wrapped.into_products().len(), 2);
    }

    #[test]
    fn test_product_requires_id() {
        let result = serde_json::from_value::<ProductRecord>(json!({ "title": "No id" }));
        assert!(result.is_err());
    }
}
