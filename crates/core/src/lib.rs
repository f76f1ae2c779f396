//! Market Lane Core - Shared types library.
//!
//! This crate provides the types exchanged with the commerce platform and
//! shared across all Market Lane components:
//! - `storefront` - Request client, product cache, and checkout flow
//! - `proxy` - Forwarding service that injects the platform key
//! - `cli` - Command-line storefront
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, products, carts, and checkout payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
