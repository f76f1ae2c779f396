//! Product listing and lookup.

use market_lane_core::ProductRecord;

use super::{CommandError, client};

/// List all products.
pub async fn list() -> Result<(), CommandError> {
    let client = client()?;
    let products = client.list_products().await?;

    if products.is_empty() {
        println!("No products.");
        return Ok(());
    }
    for product in &products {
        println!(
            "{:<12} {:<40} {}",
            product.id,
            product.title,
            product.price.map(|p| p.display()).unwrap_or_default()
        );
    }
    Ok(())
}

/// Show one product with its variants.
pub async fn show(id: &str) -> Result<(), CommandError> {
    let client = client()?;
    let product = client.get_product(id).await?;
    print_product(&product);
    Ok(())
}

fn print_product(product: &ProductRecord) {
    println!("{} ({})", product.title, product.id);
    if let Some(price) = product.price {
        match product.compare_at_price {
            Some(compare_at) if compare_at != price => {
                println!("  {} (was {})", price.display(), compare_at.display());
            }
            _ => println!("  {}", price.display()),
        }
    }
    if let Some(description) = &product.description {
        println!("  {description}");
    }
    if product.variants.is_empty() {
        return;
    }
    println!("  Variants:");
    for variant in &product.variants {
        let price = variant
            .price
            .or(product.price)
            .map(|p| p.display())
            .unwrap_or_default();
        let stock = if variant.available { "" } else { " (sold out)" };
        println!("    {:<12} {:<28} {price}{stock}", variant.id, variant.title);
    }
}
