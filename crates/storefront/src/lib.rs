//! Market Lane Storefront library.
//!
//! Client-side core of the storefront: everything between a UI event and the
//! commerce platform.
//!
//! # Architecture
//!
//! - [`cookie`] - Cart identity persisted as the `cart_id` cookie
//! - [`cache`] - Product cache keyed by product and variant id (5 minute freshness)
//! - [`coalesce`] - Collapses duplicate in-flight reads
//! - [`api`] - Request client: proxy/direct channel fallback and response normalization
//! - [`checkout`] - Address → Shipping → Confirmation state machine
//! - [`view`] - Render state derived from API results
//!
//! # Example
//!
//! ```rust,ignore
//! use market_lane_storefront::{StorefrontClient, config::ClientConfig};
//!
//! let config = ClientConfig::from_env()?;
//! let client = StorefrontClient::new(&config, cookies);
//!
//! let products = client.list_products().await?;
//! let cart = client.add_item(&products[0].variants[0].id, None, 1).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod checkout;
pub mod clock;
pub mod coalesce;
pub mod config;
pub mod cookie;
pub mod error;
pub mod view;

pub use api::StorefrontClient;
pub use error::ApiError;
