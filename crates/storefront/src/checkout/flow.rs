use std::fmt;

use market_lane_core::{
    Address, ConfirmationSnapshot, OrderReceipt, PaymentMode, ShippingMethod, ShippingMethodId,
    ShippingMethods,
};
use tracing::{info, instrument, warn};

use super::{CheckoutApi, CheckoutError};
use crate::config::EmptyShippingPolicy;

/// Where the checkout currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Address,
    Shipping,
    Confirmation,
    /// Terminal: the order has been placed.
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Address => "address",
            Self::Shipping => "shipping",
            Self::Confirmation => "confirmation",
            Self::Complete => "complete",
        })
    }
}

/// What a successful submission did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The flow moved to this stage.
    Advanced(Stage),
    /// The address was accepted but no shipping methods were offered; the
    /// flow stays on the address stage.
    AddressAccepted,
    /// The order was placed and the flow is complete.
    OrderPlaced(OrderReceipt),
}

/// An in-progress checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutFlow {
    stage: Stage,
    shipping_address: Address,
    billing_address: Address,
    same_billing_address: bool,
    available_shipping_methods: Vec<ShippingMethod>,
    selected_shipping_method_id: Option<ShippingMethodId>,
    confirmation: Option<ConfirmationSnapshot>,
    receipt: Option<OrderReceipt>,
    last_error: Option<String>,
    empty_shipping: EmptyShippingPolicy,
}

impl CheckoutFlow {
    /// Start a checkout on the address stage.
    ///
    /// Billing starts out mirroring shipping.
    #[must_use]
    pub fn new(empty_shipping: EmptyShippingPolicy) -> Self {
        Self {
            stage: Stage::Address,
            shipping_address: Address::default(),
            billing_address: Address::default(),
            same_billing_address: true,
            available_shipping_methods: Vec::new(),
            selected_shipping_method_id: None,
            confirmation: None,
            receipt: None,
            last_error: None,
            empty_shipping,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub const fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    #[must_use]
    pub const fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    #[must_use]
    pub const fn same_billing_address(&self) -> bool {
        self.same_billing_address
    }

    #[must_use]
    pub fn available_shipping_methods(&self) -> &[ShippingMethod] {
        &self.available_shipping_methods
    }

    #[must_use]
    pub const fn selected_shipping_method_id(&self) -> Option<&ShippingMethodId> {
        self.selected_shipping_method_id.as_ref()
    }

    /// The confirmation snapshot, once the shipping stage has been submitted.
    #[must_use]
    pub const fn confirmation(&self) -> Option<&ConfirmationSnapshot> {
        self.confirmation.as_ref()
    }

    /// The receipt, once the order has been placed.
    #[must_use]
    pub const fn receipt(&self) -> Option<&OrderReceipt> {
        self.receipt.as_ref()
    }

    /// Message from the last failed submission, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // =========================================================================
    // Address Stage
    // =========================================================================

    /// Edit the shipping address. Billing follows while it is marked the same.
    pub fn update_shipping_address(&mut self, edit: impl FnOnce(&mut Address)) {
        edit(&mut self.shipping_address);
        if self.same_billing_address {
            self.billing_address = self.shipping_address.clone();
        }
    }

    /// Toggle "billing same as shipping". Turning it on copies shipping over
    /// billing immediately.
    pub fn set_same_billing_address(&mut self, same: bool) {
        self.same_billing_address = same;
        if same {
            self.billing_address = self.shipping_address.clone();
        }
    }

    /// Edit the billing address.
    pub fn update_billing_address(&mut self, edit: impl FnOnce(&mut Address)) {
        edit(&mut self.billing_address);
    }

    /// Validate and submit both addresses.
    ///
    /// With shipping methods offered the flow advances to the shipping stage
    /// with the default method (or the first) selected. With none offered the
    /// empty-shipping policy decides between placing the order immediately
    /// and staying put.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` for missing fields, `WrongStage` outside the
    /// address stage, or `Api` if the platform call fails.
    #[instrument(skip_all, fields(stage = %self.stage))]
    pub async fn submit_address(
        &mut self,
        api: &dyn CheckoutApi,
    ) -> Result<StepOutcome, CheckoutError> {
        self.expect_stage(Stage::Address)?;

        if self.same_billing_address {
            self.billing_address = self.shipping_address.clone();
        }
        let validation = self.shipping_address.validate().and_then(|()| {
            if self.same_billing_address {
                Ok(())
            } else {
                self.billing_address.validate()
            }
        });
        if let Err(e) = validation {
            return Err(self.fail(e.into()));
        }

        let methods = match api
            .submit_address(&self.shipping_address, &self.billing_address)
            .await
        {
            Ok(methods) => methods,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.last_error = None;
        self.selected_shipping_method_id =
            ShippingMethods::default_method(&methods).map(|m| m.id.clone());
        self.available_shipping_methods = methods;

        if !self.available_shipping_methods.is_empty() {
            self.stage = Stage::Shipping;
            return Ok(StepOutcome::Advanced(Stage::Shipping));
        }

        match self.empty_shipping {
            EmptyShippingPolicy::PlaceOrder => {
                info!("No shipping methods offered, placing order directly");
                self.place(api).await
            }
            EmptyShippingPolicy::ReportSuccess => Ok(StepOutcome::AddressAccepted),
        }
    }

    // =========================================================================
    // Shipping Stage
    // =========================================================================

    /// Select one of the offered shipping methods.
    ///
    /// # Errors
    ///
    /// Returns `WrongStage` outside the shipping stage or
    /// `UnknownShippingMethod` if `id` was not offered.
    pub fn select_shipping_method(&mut self, id: &ShippingMethodId) -> Result<(), CheckoutError> {
        self.expect_stage(Stage::Shipping)?;
        if !self.available_shipping_methods.iter().any(|m| &m.id == id) {
            return Err(CheckoutError::UnknownShippingMethod(id.clone()));
        }
        self.selected_shipping_method_id = Some(id.clone());
        Ok(())
    }

    /// Whether the shipping stage can be submitted.
    #[must_use]
    pub const fn can_submit_shipping(&self) -> bool {
        matches!(self.stage, Stage::Shipping) && self.selected_shipping_method_id.is_some()
    }

    /// Submit the selected method and load the confirmation snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NoShippingMethodSelected` without a selection, `WrongStage`
    /// outside the shipping stage, or `Api` if either platform call fails.
    #[instrument(skip_all, fields(stage = %self.stage))]
    pub async fn submit_shipping(
        &mut self,
        api: &dyn CheckoutApi,
    ) -> Result<StepOutcome, CheckoutError> {
        self.expect_stage(Stage::Shipping)?;
        let Some(method_id) = self.selected_shipping_method_id.clone() else {
            return Err(self.fail(CheckoutError::NoShippingMethodSelected));
        };

        if let Err(e) = api.submit_shipping_method(&method_id).await {
            return Err(self.fail(e.into()));
        }
        let snapshot = match api.confirmation().await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.last_error = None;
        self.confirmation = Some(snapshot);
        self.stage = Stage::Confirmation;
        Ok(StepOutcome::Advanced(Stage::Confirmation))
    }

    // =========================================================================
    // Confirmation Stage
    // =========================================================================

    /// Place the order with cash on delivery.
    ///
    /// # Errors
    ///
    /// Returns `WrongStage` outside the confirmation stage or `Api` if the
    /// platform call fails.
    #[instrument(skip_all, fields(stage = %self.stage))]
    pub async fn place_order(
        &mut self,
        api: &dyn CheckoutApi,
    ) -> Result<StepOutcome, CheckoutError> {
        self.expect_stage(Stage::Confirmation)?;
        self.place(api).await
    }

    async fn place(&mut self, api: &dyn CheckoutApi) -> Result<StepOutcome, CheckoutError> {
        match api.place_order(PaymentMode::CashOnDelivery).await {
            Ok(receipt) => {
                info!(order_id = %receipt.order_id, "Order placed");
                self.last_error = None;
                self.stage = Stage::Complete;
                self.receipt = Some(receipt.clone());
                Ok(StepOutcome::OrderPlaced(receipt))
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Return to the previous stage, keeping everything entered so far.
    ///
    /// # Errors
    ///
    /// Returns `CannotGoBack` from the address stage and `AlreadyComplete`
    /// once the order is placed.
    pub fn back(&mut self) -> Result<Stage, CheckoutError> {
        self.stage = match self.stage {
            Stage::Shipping => Stage::Address,
            Stage::Confirmation => Stage::Shipping,
            Stage::Address => return Err(CheckoutError::CannotGoBack(Stage::Address)),
            Stage::Complete => return Err(CheckoutError::AlreadyComplete),
        };
        self.last_error = None;
        Ok(self.stage)
    }

    fn expect_stage(&self, expected: Stage) -> Result<(), CheckoutError> {
        match self.stage {
            actual if actual == expected => Ok(()),
            Stage::Complete => Err(CheckoutError::AlreadyComplete),
            actual => Err(CheckoutError::WrongStage { expected, actual }),
        }
    }

    /// Record a failed submission and hand the error back.
    fn fail(&mut self, error: CheckoutError) -> CheckoutError {
        let upstream = matches!(&error, CheckoutError::Api(e) if e.is_upstream());
        warn!(stage = %self.stage, upstream, error = %error, "Checkout step failed");
        self.last_error = Some(error.user_message());
        error
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{ApiError, GENERIC_ERROR_MESSAGE};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Checkout API answering from queues and recording what was sent.
    #[derive(Default)]
    struct FakeCheckoutApi {
        address_results: Mutex<VecDeque<Result<Vec<ShippingMethod>, ApiError>>>,
        shipping_results: Mutex<VecDeque<Result<(), ApiError>>>,
        confirmations: Mutex<VecDeque<Result<ConfirmationSnapshot, ApiError>>>,
        orders: Mutex<VecDeque<Result<OrderReceipt, ApiError>>>,
        submitted_addresses: Mutex<Vec<(Address, Address)>>,
        submitted_methods: Mutex<Vec<ShippingMethodId>>,
    }

    #[async_trait]
    impl CheckoutApi for FakeCheckoutApi {
        async fn submit_address(
            &self,
            shipping: &Address,
            billing: &Address,
        ) -> Result<Vec<ShippingMethod>, ApiError> {
            self.submitted_addresses
                .lock()
                .push((shipping.clone(), billing.clone()));
            self.address_results.lock().pop_front().unwrap()
        }

        async fn submit_shipping_method(
            &self,
            method_id: &ShippingMethodId,
        ) -> Result<(), ApiError> {
            self.submitted_methods.lock().push(method_id.clone());
            self.shipping_results.lock().pop_front().unwrap()
        }

        async fn confirmation(&self) -> Result<ConfirmationSnapshot, ApiError> {
            self.confirmations.lock().pop_front().unwrap()
        }

        async fn place_order(&self, _: PaymentMode) -> Result<OrderReceipt, ApiError> {
            self.orders.lock().pop_front().unwrap()
        }
    }

    fn methods_from(body: serde_json::Value) -> Vec<ShippingMethod> {
        crate::api::extract::normalize::<ShippingMethods>(&body)
            .unwrap()
            .shipping_methods
    }

    fn snapshot() -> ConfirmationSnapshot {
        serde_json::from_value(json!({ "total": "42.50" })).unwrap()
    }

    fn receipt(id: &str) -> OrderReceipt {
        serde_json::from_value(json!({ "order_id": id })).unwrap()
    }

    fn filled_flow(policy: EmptyShippingPolicy) -> CheckoutFlow {
        let mut flow = CheckoutFlow::new(policy);
        flow.update_shipping_address(|a| {
            a.first_name = "Ada".to_string();
            a.last_name = "Lovelace".to_string();
            a.phone = "555-0100".to_string();
            a.address1 = "12 Analytical Row".to_string();
            a.city = "London".to_string();
            a.country = "GB".to_string();
        });
        flow
    }

    fn rejected(message: &str) -> ApiError {
        ApiError::Rejected {
            code: "1".to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_address_success_preselects_default_method() {
        let api = FakeCheckoutApi::default();
        api.address_results.lock().push_back(Ok(methods_from(json!({
            "status_code": "0",
            "payload": {
                "shipping_methods": [
                    { "id": "std", "name": "Standard", "price": "5.00" },
                    { "id": "exp", "name": "Express", "price": "15.00", "is_default": true }
                ]
            }
        }))));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        let outcome = flow.submit_address(&api).await.unwrap();

        assert_eq!(outcome, StepOutcome::Advanced(Stage::Shipping));
        assert_eq!(flow.stage(), Stage::Shipping);
        assert_eq!(flow.selected_shipping_method_id().unwrap().as_str(), "exp");
        assert!(flow.can_submit_shipping());
    }

    #[tokio::test]
    async fn test_first_method_selected_without_default() {
        let api = FakeCheckoutApi::default();
        api.address_results.lock().push_back(Ok(methods_from(json!({
            "shipping_methods": [{ "id": "a" }, { "id": "b" }]
        }))));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        flow.submit_address(&api).await.unwrap();
        assert_eq!(flow.selected_shipping_method_id().unwrap().as_str(), "a");
    }

    #[tokio::test]
    async fn test_same_billing_mirrors_shipping() {
        let api = FakeCheckoutApi::default();
        api.address_results
            .lock()
            .push_back(Ok(methods_from(json!({ "shipping_methods": [{ "id": "a" }] }))));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        assert_eq!(flow.billing_address().city, "London");

        flow.set_same_billing_address(false);
        flow.update_billing_address(|a| a.city = "Paris".to_string());
        flow.update_shipping_address(|a| a.city = "Leeds".to_string());
        assert_eq!(flow.billing_address().city, "Paris");

        flow.set_same_billing_address(true);
        assert_eq!(flow.billing_address().city, "Leeds");

        flow.submit_address(&api).await.unwrap();
        let (shipping, billing) = api.submitted_addresses.lock()[0].clone();
        assert_eq!(shipping, billing);
    }

    #[tokio::test]
    async fn test_invalid_address_is_not_submitted() {
        let api = FakeCheckoutApi::default();
        let mut flow = CheckoutFlow::new(EmptyShippingPolicy::PlaceOrder);
        flow.update_shipping_address(|a| a.first_name = "Ada".to_string());

        let err = flow.submit_address(&api).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidAddress(_)));
        assert_eq!(flow.stage(), Stage::Address);
        assert!(flow.last_error().unwrap().contains("last_name"));
        assert!(api.submitted_addresses.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_stage_and_allows_retry() {
        let api = FakeCheckoutApi::default();
        api.address_results
            .lock()
            .push_back(Err(rejected("Postal code is invalid")));
        api.address_results
            .lock()
            .push_back(Ok(methods_from(json!({ "shipping_methods": [{ "id": "a" }] }))));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        assert!(flow.submit_address(&api).await.is_err());
        assert_eq!(flow.stage(), Stage::Address);
        assert_eq!(flow.last_error(), Some("Postal code is invalid"));

        flow.submit_address(&api).await.unwrap();
        assert_eq!(flow.stage(), Stage::Shipping);
        assert_eq!(flow.last_error(), None);
    }

    #[tokio::test]
    async fn test_status_failure_shows_generic_message() {
        let api = FakeCheckoutApi::default();
        api.address_results.lock().push_back(Err(ApiError::Status {
            status: 502,
            body: "Bad Gateway".to_string(),
        }));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        flow.submit_address(&api).await.unwrap_err();
        assert_eq!(flow.last_error(), Some(GENERIC_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn test_empty_methods_place_order_policy() {
        let api = FakeCheckoutApi::default();
        api.address_results.lock().push_back(Ok(Vec::new()));
        api.orders.lock().push_back(Ok(receipt("1001")));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        let outcome = flow.submit_address(&api).await.unwrap();

        assert_eq!(outcome, StepOutcome::OrderPlaced(receipt("1001")));
        assert_eq!(flow.stage(), Stage::Complete);
    }

    #[tokio::test]
    async fn test_empty_methods_report_success_policy() {
        let api = FakeCheckoutApi::default();
        api.address_results.lock().push_back(Ok(Vec::new()));

        let mut flow = filled_flow(EmptyShippingPolicy::ReportSuccess);
        let outcome = flow.submit_address(&api).await.unwrap();

        assert_eq!(outcome, StepOutcome::AddressAccepted);
        assert_eq!(flow.stage(), Stage::Address);
        assert!(api.orders.lock().is_empty());
    }

    #[tokio::test]
    async fn test_full_flow_to_completion() {
        let api = FakeCheckoutApi::default();
        api.address_results.lock().push_back(Ok(methods_from(json!({
            "shipping_methods": [{ "id": "std" }, { "id": "exp" }]
        }))));
        api.shipping_results.lock().push_back(Ok(()));
        api.confirmations.lock().push_back(Ok(snapshot()));
        api.orders.lock().push_back(Ok(receipt("A-7")));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        flow.submit_address(&api).await.unwrap();
        flow.select_shipping_method(&ShippingMethodId::new("exp"))
            .unwrap();
        assert_eq!(
            flow.submit_shipping(&api).await.unwrap(),
            StepOutcome::Advanced(Stage::Confirmation)
        );
        assert_eq!(flow.confirmation().unwrap().total, snapshot().total);

        let outcome = flow.place_order(&api).await.unwrap();
        assert_eq!(outcome, StepOutcome::OrderPlaced(receipt("A-7")));
        assert_eq!(flow.receipt().unwrap().order_id.as_str(), "A-7");
        assert_eq!(
            api.submitted_methods.lock().as_slice(),
            &[ShippingMethodId::new("exp")]
        );

        // Terminal stage rejects everything.
        assert_eq!(
            flow.place_order(&api).await.unwrap_err(),
            CheckoutError::AlreadyComplete
        );
        assert_eq!(flow.back().unwrap_err(), CheckoutError::AlreadyComplete);
    }

    #[tokio::test]
    async fn test_unknown_shipping_method_rejected() {
        let api = FakeCheckoutApi::default();
        api.address_results
            .lock()
            .push_back(Ok(methods_from(json!({ "shipping_methods": [{ "id": "a" }] }))));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        flow.submit_address(&api).await.unwrap();
        assert_eq!(
            flow.select_shipping_method(&ShippingMethodId::new("zzz")),
            Err(CheckoutError::UnknownShippingMethod(ShippingMethodId::new(
                "zzz"
            )))
        );
        assert_eq!(flow.selected_shipping_method_id().unwrap().as_str(), "a");
    }

    #[tokio::test]
    async fn test_confirmation_failure_stays_on_shipping() {
        let api = FakeCheckoutApi::default();
        api.address_results
            .lock()
            .push_back(Ok(methods_from(json!({ "shipping_methods": [{ "id": "a" }] }))));
        api.shipping_results.lock().push_back(Ok(()));
        api.confirmations
            .lock()
            .push_back(Err(rejected("Checkout expired")));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        flow.submit_address(&api).await.unwrap();
        assert!(flow.submit_shipping(&api).await.is_err());
        assert_eq!(flow.stage(), Stage::Shipping);
        assert_eq!(flow.last_error(), Some("Checkout expired"));
    }

    #[tokio::test]
    async fn test_back_navigation() {
        let api = FakeCheckoutApi::default();
        api.address_results
            .lock()
            .push_back(Ok(methods_from(json!({ "shipping_methods": [{ "id": "a" }] }))));
        api.shipping_results.lock().push_back(Ok(()));
        api.confirmations.lock().push_back(Ok(snapshot()));

        let mut flow = filled_flow(EmptyShippingPolicy::PlaceOrder);
        assert_eq!(
            flow.back().unwrap_err(),
            CheckoutError::CannotGoBack(Stage::Address)
        );

        flow.submit_address(&api).await.unwrap();
        flow.submit_shipping(&api).await.unwrap();
        assert_eq!(flow.back().unwrap(), Stage::Shipping);
        assert_eq!(flow.back().unwrap(), Stage::Address);
        assert_eq!(flow.shipping_address().city, "London");

        assert!(matches!(
            flow.submit_shipping(&api).await,
            Err(CheckoutError::WrongStage {
                expected: Stage::Shipping,
                actual: Stage::Address
            })
        ));
    }
}
