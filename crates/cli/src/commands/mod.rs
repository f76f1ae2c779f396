//! Command implementations.
//!
//! Every command builds a [`StorefrontClient`] from the environment. The cart
//! identity is kept in a cookie file between invocations, so `add` followed
//! by `cart` sees the same cart.

pub mod cart;
pub mod catalog;
pub mod checkout;

use std::sync::Arc;

use market_lane_storefront::checkout::CheckoutError;
use market_lane_storefront::clock::SystemClock;
use market_lane_storefront::config::{ClientConfig, ConfigError};
use market_lane_storefront::cookie::FileCookieStore;
use market_lane_storefront::{ApiError, StorefrontClient};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("Cannot read {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid address file {path}: {source}")]
    InvalidAddress {
        path: String,
        source: serde_json::Error,
    },

    #[error("Cart is empty")]
    EmptyCart,
}

/// Build a client from the environment with a file-backed cart cookie.
///
/// # Errors
///
/// Returns `CommandError::Config` if the environment is incomplete.
pub fn client() -> Result<StorefrontClient, CommandError> {
    let config = ClientConfig::from_env()?;
    tracing::debug!(
        api_url = %config.api_url,
        proxy = ?config.proxy_for_mode().map(ToString::to_string),
        cookie_file = %config.cookie_file.display(),
        "Client configured"
    );
    let cookies = FileCookieStore::new(config.cookie_file.clone(), Arc::new(SystemClock));
    Ok(StorefrontClient::new(&config, Arc::new(cookies)))
}
