//! Core types for Market Lane.
//!
//! This module provides type-safe wrappers for the commerce platform's
//! entities. Upstream payloads are loosely typed (ids arrive as strings or
//! numbers, amounts as strings or numbers), so deserialization here is
//! deliberately lenient while the Rust-side types stay strict.

pub mod cart;
pub mod checkout;
pub mod id;
pub mod price;
pub mod product;

pub use cart::{Cart, CartItem};
pub use checkout::{
    Address, AddressError, ConfirmationSnapshot, OrderReceipt, PaymentMode, ShippingMethod,
    ShippingMethods,
};
pub use id::*;
pub use price::Price;
pub use product::{ProductList, ProductRecord, ProductVariant};
