//! Checkout from the command line.
//!
//! Drives the same flow a browser would: address, shipping method,
//! confirmation, order. Without `--confirm` the run stops at the confirmation
//! snapshot and never places an order, even when no shipping methods are
//! offered.

use std::path::Path;

use market_lane_core::{Address, ConfirmationSnapshot, OrderReceipt, ShippingMethodId};
use market_lane_storefront::checkout::{CheckoutFlow, StepOutcome};
use market_lane_storefront::config::EmptyShippingPolicy;
use market_lane_storefront::view::CartView;

use super::cart::print_cart;
use super::{CommandError, client};

/// Options collected from the command line.
pub struct CheckoutArgs<'a> {
    pub address: &'a Path,
    pub billing: Option<&'a Path>,
    pub shipping_method: Option<&'a str>,
    pub confirm: bool,
}

/// Run checkout for the current cart.
pub async fn run(args: CheckoutArgs<'_>) -> Result<(), CommandError> {
    let client = client()?;

    let cart = client.get_cart().await?;
    if cart.is_empty() {
        return Err(CommandError::EmptyCart);
    }
    print_cart(&CartView::from(&cart));

    let policy = if args.confirm {
        client.empty_shipping_policy()
    } else {
        EmptyShippingPolicy::ReportSuccess
    };
    let mut flow = CheckoutFlow::new(policy);

    let shipping = read_address(args.address)?;
    flow.update_shipping_address(|a| *a = shipping);
    if let Some(path) = args.billing {
        let billing = read_address(path)?;
        flow.set_same_billing_address(false);
        flow.update_billing_address(|a| *a = billing);
    }

    match flow.submit_address(&client).await? {
        StepOutcome::OrderPlaced(receipt) => {
            print_receipt(&receipt);
            return Ok(());
        }
        StepOutcome::AddressAccepted => {
            println!("Address accepted. No shipping methods are offered for it.");
            return Ok(());
        }
        StepOutcome::Advanced(_) => {}
    }

    println!("Shipping methods:");
    for method in flow.available_shipping_methods() {
        let marker = if flow.selected_shipping_method_id() == Some(&method.id) {
            "*"
        } else {
            " "
        };
        println!(
            " {marker} {:<12} {:<28} {}",
            method.id,
            method.name,
            method.price.map(|p| p.display()).unwrap_or_default()
        );
    }
    if let Some(id) = args.shipping_method {
        flow.select_shipping_method(&ShippingMethodId::new(id))?;
    }

    flow.submit_shipping(&client).await?;
    if let Some(snapshot) = flow.confirmation() {
        print_confirmation(snapshot);
    }

    if !args.confirm {
        println!("Re-run with --confirm to place the order (cash on delivery).");
        return Ok(());
    }

    if let StepOutcome::OrderPlaced(receipt) = flow.place_order(&client).await? {
        print_receipt(&receipt);
    }
    Ok(())
}

fn read_address(path: &Path) -> Result<Address, CommandError> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| CommandError::ReadFile {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CommandError::InvalidAddress {
        path: display,
        source,
    })
}

fn print_confirmation(snapshot: &ConfirmationSnapshot) {
    println!("Confirmation:");
    println!("  Ship to: {}", snapshot.shipping_address.one_line());
    println!("  Bill to: {}", snapshot.billing_address.one_line());
    if let Some(method) = &snapshot.shipping_method {
        println!("  Shipping: {}", method.name);
    }
    if let Some(subtotal) = snapshot.subtotal {
        println!("  Subtotal: {}", subtotal.display());
    }
    if let Some(fee) = snapshot.shipping_fee {
        println!("  Shipping fee: {}", fee.display());
    }
    println!("  Total: {}", snapshot.total.display());
}

fn print_receipt(receipt: &OrderReceipt) {
    match receipt.total {
        Some(total) => println!("Order {} placed ({}).", receipt.order_id, total.display()),
        None => println!("Order {} placed.", receipt.order_id),
    }
}
