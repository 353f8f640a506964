//! Remote commerce gateway: the only source of truth for catalog, cart,
//! pricing, and locale/shipping data.
//!
//! # Architecture
//!
//! - [`CommerceGateway`] is the async request/response seam the session
//!   components are generic over
//! - [`ChecClient`] speaks the Chec REST API over `reqwest`
//! - [`TimeoutGateway`] bounds every call with a caller-configured deadline
//! - `MockGateway` (feature `test-util`) is a scripted in-memory gateway with
//!   call recording, held responses, and failure injection
//!
//! The gateway is authoritative: every cart mutation returns a full cart
//! snapshot and the client never recomputes totals.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront::gateway::{ChecClient, CommerceGateway, TimeoutGateway};
//!
//! let gateway = TimeoutGateway::new(ChecClient::new(&config.gateway)?, config.gateway.request_timeout);
//!
//! let cart = gateway.retrieve_cart(None).await?;
//! let cart = gateway.add_to_cart(&cart.id, &product.id, 2).await?;
//! ```

mod chec;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
mod payload;
mod timeout;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use shopfront_core::{
    Cart, CartId, CheckoutTokenId, LineItemId, LocaleEntry, OrderConfirmation, Product,
    ProductId, ShippingOption,
};

pub use chec::ChecClient;
pub use payload::{
    CustomerPayload, FulfillmentPayload, LineItemPayload, OrderPayload, PaymentPayload,
    ShippingPayload, TokenGrant,
};
pub use timeout::TimeoutGateway;

/// Errors that can occur when talking to the commerce gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed (connection refused, TLS, reset...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The call did not complete before the configured deadline.
    #[error("Gateway call timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limited by the gateway.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Gateway returned a server error (5xx).
    #[error("Gateway unavailable (HTTP {status}): {message}")]
    Unavailable {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// Gateway rejected the request payload (4xx other than 404/429).
    #[error("Gateway rejected request (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl GatewayError {
    /// Whether the failure is transient (network/availability) rather than a
    /// rejection of the request itself.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::RateLimited(_) | Self::Unavailable { .. }
        )
    }
}

/// Asynchronous request/response access to the commerce backend.
///
/// All calls may fail or be slow. None are idempotent from the caller's
/// perspective except [`retrieve_cart`](Self::retrieve_cart) with a known ID.
pub trait CommerceGateway: Send + Sync + 'static {
    /// List sellable products.
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, GatewayError>> + Send;

    /// Retrieve a cart by ID, or create a new one when `cart_id` is `None`.
    fn retrieve_cart(
        &self,
        cart_id: Option<&CartId>,
    ) -> impl Future<Output = Result<Cart, GatewayError>> + Send;

    /// Add `quantity` of a product to the cart.
    fn add_to_cart(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<Cart, GatewayError>> + Send;

    /// Set the quantity of an existing line item.
    fn update_line_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<Cart, GatewayError>> + Send;

    /// Remove a line item.
    fn remove_line_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
    ) -> impl Future<Output = Result<Cart, GatewayError>> + Send;

    /// Remove every line item.
    fn empty_cart(&self, cart_id: &CartId)
    -> impl Future<Output = Result<Cart, GatewayError>> + Send;

    /// Exchange a cart for a checkout token.
    fn generate_token(
        &self,
        cart_id: &CartId,
    ) -> impl Future<Output = Result<TokenGrant, GatewayError>> + Send;

    /// Countries the merchant ships to, in gateway order.
    fn list_shipping_countries(
        &self,
        token_id: &CheckoutTokenId,
    ) -> impl Future<Output = Result<Vec<LocaleEntry>, GatewayError>> + Send;

    /// Subdivisions of `country_code` the merchant ships to, in gateway order.
    fn list_shipping_subdivisions(
        &self,
        token_id: &CheckoutTokenId,
        country_code: &str,
    ) -> impl Future<Output = Result<Vec<LocaleEntry>, GatewayError>> + Send;

    /// Shipping methods available for a destination.
    fn shipping_options(
        &self,
        token_id: &CheckoutTokenId,
        country_code: &str,
        region_code: &str,
    ) -> impl Future<Output = Result<Vec<ShippingOption>, GatewayError>> + Send;

    /// Capture an order for the checkout token.
    fn capture(
        &self,
        token_id: &CheckoutTokenId,
        order: &OrderPayload,
    ) -> impl Future<Output = Result<OrderConfirmation, GatewayError>> + Send;
}
