//! Cart commands.

use market_lane_core::{CartItemId, ProductId, VariantId};
use market_lane_storefront::view::CartView;

use super::{CommandError, client};

/// Show the current cart.
pub async fn show() -> Result<(), CommandError> {
    let client = client()?;
    let cart = client.get_cart().await?;
    print_cart(&CartView::from(&cart));
    Ok(())
}

/// Add a variant to the cart, creating the cart on first use.
pub async fn add(variant: &str, product: Option<&str>, quantity: u32) -> Result<(), CommandError> {
    let client = client()?;
    let product = product.map(ProductId::new);
    let cart = client
        .add_item(&VariantId::new(variant), product.as_ref(), quantity)
        .await?;
    print_cart(&CartView::from(&cart));
    Ok(())
}

/// Remove a line item from the cart.
pub async fn remove(item: &str) -> Result<(), CommandError> {
    let client = client()?;
    let cart = client.remove_item(&CartItemId::new(item)).await?;
    print_cart(&CartView::from(&cart));
    Ok(())
}

pub(crate) fn print_cart(view: &CartView) {
    if view.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    if let Some(cart_id) = &view.cart_id {
        println!("Cart {cart_id} ({} items)", view.item_count);
    }
    for item in &view.items {
        let title = match &item.variant_title {
            Some(variant) => format!("{} - {variant}", item.title),
            None => item.title.clone(),
        };
        println!(
            "  [{}] {title} x{} @ {} = {}",
            item.id, item.quantity, item.price, item.line_price
        );
    }
    println!("  Subtotal: {}", view.subtotal);
    println!("  Total:    {}", view.total);
}
