//! Market Lane CLI - Command-line storefront.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! ml-cli products
//! ml-cli product 42
//!
//! # Manage the cart (identity kept in STOREFRONT_COOKIE_FILE)
//! ml-cli add 4201 --product 42 --quantity 2
//! ml-cli cart
//! ml-cli remove 9f3c
//!
//! # Check out with cash on delivery
//! ml-cli checkout --address ship.json --shipping-method standard --confirm
//! ```
//!
//! # Commands
//!
//! - `products` / `product` - List products or show one
//! - `cart` / `add` / `remove` - Cart operations
//! - `checkout` - Address, shipping, confirmation, order

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[allow(clippy::print_stdout)]
mod commands;

#[derive(Parser)]
#[command(name = "ml-cli")]
#[command(author, version, about = "Market Lane storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products
    Products,
    /// Show one product and its variants
    Product {
        /// Product or variant ID
        id: String,
    },
    /// Show the current cart
    Cart,
    /// Add a variant to the cart
    Add {
        /// Variant ID
        variant: String,

        /// Product the variant belongs to
        #[arg(short, long)]
        product: Option<String>,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,
    },
    /// Remove a line item from the cart
    Remove {
        /// Cart line item ID
        item: String,
    },
    /// Check out the current cart
    Checkout {
        /// JSON file with the shipping address
        #[arg(short, long)]
        address: PathBuf,

        /// JSON file with a separate billing address
        #[arg(short, long)]
        billing: Option<PathBuf>,

        /// Shipping method ID (defaults to the platform's default)
        #[arg(short, long)]
        shipping_method: Option<String>,

        /// Place the order instead of stopping at confirmation
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "market_lane_cli=info,market_lane_storefront=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Products => commands::catalog::list().await?,
        Commands::Product { id } => commands::catalog::show(&id).await?,
        Commands::Cart => commands::cart::show().await?,
        Commands::Add {
            variant,
            product,
            quantity,
        } => commands::cart::add(&variant, product.as_deref(), quantity).await?,
        Commands::Remove { item } => commands::cart::remove(&item).await?,
        Commands::Checkout {
            address,
            billing,
            shipping_method,
            confirm,
        } => {
            commands::checkout::run(commands::checkout::CheckoutArgs {
                address: &address,
                billing: billing.as_deref(),
                shipping_method: shipping_method.as_deref(),
                confirm,
            })
            .await?;
        }
    }
    Ok(())
}
