//! Checkout error types.

use market_lane_core::{AddressError, ShippingMethodId};
use thiserror::Error;

use super::Stage;
use crate::error::ApiError;

/// Errors returned by [`CheckoutFlow`](super::CheckoutFlow) transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// The platform call failed or was rejected.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The transition is not available from the current stage.
    #[error("Cannot do that on the {actual} stage (expected {expected})")]
    WrongStage { expected: Stage, actual: Stage },

    /// The address form is incomplete.
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    /// Shipping was submitted with no method selected.
    #[error("Select a shipping method")]
    NoShippingMethodSelected,

    /// The selected method is not one of those offered.
    #[error("Unknown shipping method: {0}")]
    UnknownShippingMethod(ShippingMethodId),

    /// There is no earlier stage to return to.
    #[error("Cannot go back from the {0} stage")]
    CannotGoBack(Stage),

    /// The order has already been placed.
    #[error("The order has already been placed")]
    AlreadyComplete,
}

impl CheckoutError {
    /// Text suitable for showing to a shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
