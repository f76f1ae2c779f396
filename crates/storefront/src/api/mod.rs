//! Request client for the commerce platform.
//!
//! Every operation encodes an [`ApiCall`](operation::ApiCall) for the
//! configured [`ApiStyle`], sends it through the [`ChannelPlan`] (proxy
//! first, then direct) and normalizes the response envelope into a typed
//! result. Product reads go through the [`ProductCache`]; the product list
//! and cart reads are coalesced.

pub mod channel;
pub mod extract;
pub mod operation;
pub mod transport;

use std::sync::Arc;

use market_lane_core::{
    Address, Cart, CartId, CartItemId, ConfirmationSnapshot, OrderReceipt, PaymentMode,
    ProductId, ProductList, ProductRecord, ShippingMethod, ShippingMethodId, ShippingMethods,
    VariantId,
};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::cache::ProductCache;
use crate::clock::{Clock, SystemClock};
use crate::coalesce::RequestCoalescer;
use crate::config::{ApiStyle, ClientConfig, EmptyShippingPolicy};
use crate::cookie::{CartIdentity, CookieStore};
use crate::error::ApiError;

use channel::ChannelPlan;
use extract::{check_envelope, normalize};
use operation::{ApiCall, Operation};
use transport::{ReqwestTransport, Transport};

/// Coalescing key for the product list.
const PRODUCT_LIST_KEY: &str = "products";

// =============================================================================
// StorefrontClient
// =============================================================================

/// Client for the storefront operations.
///
/// Cheap to clone; clones share the cache, cart identity and pending reads.
#[derive(Clone)]
pub struct StorefrontClient {
    inner: Arc<StorefrontClientInner>,
}

struct StorefrontClientInner {
    transport: Arc<dyn Transport>,
    channels: ChannelPlan,
    style: ApiStyle,
    cache: ProductCache,
    identity: CartIdentity,
    product_lists: RequestCoalescer<&'static str, Vec<Arc<ProductRecord>>>,
    carts: RequestCoalescer<CartId, Cart>,
    empty_shipping: EmptyShippingPolicy,
}

impl StorefrontClient {
    /// Create a client that talks HTTP through `reqwest` on the system clock.
    #[must_use]
    pub fn new(config: &ClientConfig, cookies: Arc<dyn CookieStore>) -> Self {
        Self::with_transport(
            config,
            Arc::new(ReqwestTransport::new()),
            cookies,
            Arc::new(SystemClock),
        )
    }

    /// Create a client over an explicit transport and clock.
    #[must_use]
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        cookies: Arc<dyn CookieStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(StorefrontClientInner {
                transport,
                channels: ChannelPlan::from_config(config),
                style: config.api_style.clone(),
                cache: ProductCache::new(clock, config.cache_ttl),
                identity: CartIdentity::new(cookies),
                product_lists: RequestCoalescer::new(config.coalesce_grace),
                carts: RequestCoalescer::new(config.coalesce_grace),
                empty_shipping: config.empty_shipping,
            }),
        }
    }

    /// The product cache.
    #[must_use]
    pub fn cache(&self) -> &ProductCache {
        &self.inner.cache
    }

    /// The stored cart identity.
    #[must_use]
    pub fn cart_identity(&self) -> &CartIdentity {
        &self.inner.identity
    }

    /// What checkout does when no shipping methods are offered.
    #[must_use]
    pub fn empty_shipping_policy(&self) -> EmptyShippingPolicy {
        self.inner.empty_shipping
    }

    /// Encode and send one call, returning the raw response body.
    async fn send(&self, call: ApiCall) -> Result<Value, ApiError> {
        let request = call.encode(&self.inner.style)?;
        self.inner
            .channels
            .execute(self.inner.transport.as_ref(), &request)
            .await
    }

    fn require_cart(&self) -> Result<CartId, ApiError> {
        self.inner.identity.current().ok_or(ApiError::MissingCart)
    }

    /// Keep the cart cookie in step with a cart returned by the platform.
    ///
    /// An empty cart is forgotten so it is never resumed by id.
    fn sync_identity(&self, cart: &Cart) {
        if cart.is_empty() {
            self.inner.identity.forget();
        } else if let Some(id) = &cart.id {
            self.inner.identity.remember(id);
        }
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// List all products.
    ///
    /// Concurrent callers share one request. Every returned record is cached
    /// under its product id and its variant ids.
    ///
    /// # Errors
    ///
    /// Returns an error if every channel fails or the response has no
    /// product list.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Arc<ProductRecord>>, ApiError> {
        let client = self.clone();
        self.inner
            .product_lists
            .run(PRODUCT_LIST_KEY, move || async move {
                client.fetch_products().await
            })
            .await
    }

    async fn fetch_products(&self) -> Result<Vec<Arc<ProductRecord>>, ApiError> {
        let body = self.send(ApiCall::new(Operation::ListProducts)).await?;
        let records: Vec<Arc<ProductRecord>> = normalize::<ProductList>(&body)?
            .into_products()
            .into_iter()
            .map(Arc::new)
            .collect();

        let cache = &self.inner.cache;
        cache.populate_from_list(&records, cache.now()).await;
        Ok(records)
    }

    /// Get a product by product id or variant id.
    ///
    /// Served from the cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not cached and the request fails.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn get_product(&self, id: &str) -> Result<Arc<ProductRecord>, ApiError> {
        let cache = &self.inner.cache;
        if let Some(record) = cache.lookup(id).await {
            return Ok(record);
        }

        let call = ApiCall::new(Operation::GetProduct).param("product_id", &id)?;
        let body = self.send(call).await?;
        let record = Arc::new(normalize::<ProductRecord>(&body)?);

        let fetched_at = cache.now();
        cache
            .populate_from_list(std::slice::from_ref(&record), fetched_at)
            .await;
        if record.id.as_str() != id {
            cache.put(id, Arc::clone(&record), fetched_at).await;
        }
        Ok(record)
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Add a variant to the cart, creating the cart if none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no cart.
    #[instrument(skip(self), fields(variant_id = %variant_id))]
    pub async fn add_item(
        &self,
        variant_id: &VariantId,
        product_id: Option<&ProductId>,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let current = self.inner.identity.current();

        let mut call = ApiCall::new(Operation::AddItem)
            .param("variant_id", variant_id)?
            .param("quantity", &quantity)?;
        if let Some(product_id) = product_id {
            call = call.param("product_id", product_id)?;
        }
        if let Some(cart_id) = &current {
            call = call.param("cart_id", cart_id)?;
        }

        let body = self.send(call).await?;
        let cart: Cart = normalize(&body)?;

        if let Some(cart_id) = &current {
            self.inner.carts.clear(cart_id);
        }
        self.sync_identity(&cart);
        Ok(cart)
    }

    /// Read the stored cart.
    ///
    /// With no stored cart identity this returns an empty cart without a
    /// request. Concurrent reads of the same cart share one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no cart.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Result<Cart, ApiError> {
        let Some(cart_id) = self.inner.identity.current() else {
            debug!("No stored cart");
            return Ok(Cart::empty());
        };

        let client = self.clone();
        let key = cart_id.clone();
        self.inner
            .carts
            .run(key, move || async move { client.fetch_cart(&cart_id).await })
            .await
    }

    async fn fetch_cart(&self, cart_id: &CartId) -> Result<Cart, ApiError> {
        let call = ApiCall::new(Operation::GetCart).param("cart_id", cart_id)?;
        let body = self.send(call).await?;
        let cart: Cart = normalize(&body)?;
        self.sync_identity(&cart);
        Ok(cart)
    }

    /// Remove a line from the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCart` without a request if no cart is
    /// stored, or an error if the request fails.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_item(&self, item_id: &CartItemId) -> Result<Cart, ApiError> {
        let cart_id = self.require_cart()?;
        let call = ApiCall::new(Operation::RemoveItem)
            .param("cart_id", &cart_id)?
            .param("item_id", item_id)?;

        let body = self.send(call).await?;
        let cart: Cart = normalize(&body)?;

        self.inner.carts.clear(&cart_id);
        self.sync_identity(&cart);
        Ok(cart)
    }

    // =========================================================================
    // Checkout Methods
    // =========================================================================

    /// Submit shipping and billing addresses.
    ///
    /// Returns the shipping methods offered for the address, possibly none.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCart` if no cart is stored, or an error if
    /// the request fails or is rejected.
    #[instrument(skip_all)]
    pub async fn submit_address(
        &self,
        shipping: &Address,
        billing: &Address,
    ) -> Result<Vec<ShippingMethod>, ApiError> {
        let cart_id = self.require_cart()?;
        let call = ApiCall::new(Operation::SubmitAddress)
            .param("cart_id", &cart_id)?
            .param("shipping_address", shipping)?
            .param("billing_address", billing)?;

        let body = self.send(call).await?;
        let methods: ShippingMethods = normalize(&body)?;
        debug!(count = methods.shipping_methods.len(), "Shipping methods offered");
        Ok(methods.shipping_methods)
    }

    /// Select a shipping method.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCart` if no cart is stored, or an error if
    /// the request fails or is rejected.
    #[instrument(skip(self), fields(method_id = %method_id))]
    pub async fn submit_shipping_method(
        &self,
        method_id: &ShippingMethodId,
    ) -> Result<(), ApiError> {
        let cart_id = self.require_cart()?;
        let call = ApiCall::new(Operation::SubmitShippingMethod)
            .param("cart_id", &cart_id)?
            .param("shipping_method_id", method_id)?;

        let body = self.send(call).await?;
        check_envelope(&body)
    }

    /// Fetch the confirmation snapshot for the checkout.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCart` if no cart is stored, or an error if
    /// the request fails or the response has no snapshot.
    #[instrument(skip(self))]
    pub async fn confirmation(&self) -> Result<ConfirmationSnapshot, ApiError> {
        let cart_id = self.require_cart()?;
        let call = ApiCall::new(Operation::GetConfirmation).param("cart_id", &cart_id)?;

        let body = self.send(call).await?;
        normalize(&body)
    }

    /// Place the order. On success the cart identity is cleared.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCart` if no cart is stored, or an error if
    /// the request fails or is rejected.
    #[instrument(skip(self), fields(payment_mode = payment_mode.as_str()))]
    pub async fn place_order(&self, payment_mode: PaymentMode) -> Result<OrderReceipt, ApiError> {
        let cart_id = self.require_cart()?;
        let call = ApiCall::new(Operation::PlaceOrder)
            .param("cart_id", &cart_id)?
            .param("payment_mode", &payment_mode)?;

        let body = self.send(call).await?;
        let receipt: OrderReceipt = normalize(&body)?;

        self.inner.carts.clear(&cart_id);
        self.inner.identity.forget();
        Ok(receipt)
    }
}
