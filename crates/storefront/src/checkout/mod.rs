//! Checkout: Address → Shipping → Confirmation → Complete.
//!
//! [`CheckoutFlow`] holds the in-memory checkout session and drives it
//! through a [`CheckoutApi`]. A failed submission never moves the stage; it
//! records a user-facing message in [`CheckoutFlow::last_error`] and the
//! same step can be submitted again.

mod error;
mod flow;

use async_trait::async_trait;
use market_lane_core::{
    Address, ConfirmationSnapshot, OrderReceipt, PaymentMode, ShippingMethod, ShippingMethodId,
};

use crate::api::StorefrontClient;
use crate::error::ApiError;

pub use error::CheckoutError;
pub use flow::{CheckoutFlow, Stage, StepOutcome};

/// The platform calls the checkout makes.
#[async_trait]
pub trait CheckoutApi: Send + Sync {
    /// Submit both addresses; returns the shipping methods offered.
    async fn submit_address(
        &self,
        shipping: &Address,
        billing: &Address,
    ) -> Result<Vec<ShippingMethod>, ApiError>;

    /// Select a shipping method.
    async fn submit_shipping_method(&self, method_id: &ShippingMethodId) -> Result<(), ApiError>;

    /// Fetch the confirmation snapshot.
    async fn confirmation(&self) -> Result<ConfirmationSnapshot, ApiError>;

    /// Place the order.
    async fn place_order(&self, payment_mode: PaymentMode) -> Result<OrderReceipt, ApiError>;
}

#[async_trait]
impl CheckoutApi for StorefrontClient {
    async fn submit_address(
        &self,
        shipping: &Address,
        billing: &Address,
    ) -> Result<Vec<ShippingMethod>, ApiError> {
        Self::submit_address(self, shipping, billing).await
    }

    async fn submit_shipping_method(&self, method_id: &ShippingMethodId) -> Result<(), ApiError> {
        Self::submit_shipping_method(self, method_id).await
    }

    async fn confirmation(&self) -> Result<ConfirmationSnapshot, ApiError> {
        Self::confirmation(self).await
    }

    async fn place_order(&self, payment_mode: PaymentMode) -> Result<OrderReceipt, ApiError> {
        Self::place_order(self, payment_mode).await
    }
}
