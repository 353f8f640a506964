//! Per-call deadline for gateway operations.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use shopfront_core::{
    Cart, CartId, CheckoutTokenId, LineItemId, LocaleEntry, OrderConfirmation, Product,
    ProductId, ShippingOption,
};

use super::{CommerceGateway, GatewayError, OrderPayload, TokenGrant};

/// Wraps a gateway so that every call fails with [`GatewayError::Timeout`]
/// once `limit` elapses.
///
/// The underlying request is dropped on expiry; whether the remote side
/// still applies it is unknown, which is why expiry is reported as a
/// transient failure and never retried automatically.
#[derive(Debug, Clone)]
pub struct TimeoutGateway<G> {
    inner: G,
    limit: Duration,
}

impl<G: CommerceGateway> TimeoutGateway<G> {
    /// Wrap `inner` with a per-call deadline.
    #[must_use]
    pub const fn new(inner: G, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// The configured deadline.
    #[must_use]
    pub const fn limit(&self) -> Duration {
        self.limit
    }

    /// The wrapped gateway.
    #[must_use]
    pub const fn inner(&self) -> &G {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, GatewayError>> + Send,
    ) -> Result<T, GatewayError> {
        if let Ok(result) = tokio::time::timeout(self.limit, call).await {
            result
        } else {
            warn!(operation, limit = ?self.limit, "Gateway call timed out");
            Err(GatewayError::Timeout(self.limit))
        }
    }
}

impl<G: CommerceGateway> CommerceGateway for TimeoutGateway<G> {
    async fn list_products(&self) -> Result<Vec<Product>, GatewayError> {
        self.bounded("list_products", self.inner.list_products())
            .await
    }

    async fn retrieve_cart(&self, cart_id: Option<&CartId>) -> Result<Cart, GatewayError> {
        self.bounded("retrieve_cart", self.inner.retrieve_cart(cart_id))
            .await
    }

    async fn add_to_cart(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        self.bounded(
            "add_to_cart",
            self.inner.add_to_cart(cart_id, product_id, quantity),
        )
        .await
    }

    async fn update_line_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        self.bounded(
            "update_line_item",
            self.inner.update_line_item(cart_id, line_item_id, quantity),
        )
        .await
    }

    async fn remove_line_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
    ) -> Result<Cart, GatewayError> {
        self.bounded(
            "remove_line_item",
            self.inner.remove_line_item(cart_id, line_item_id),
        )
        .await
    }

    async fn empty_cart(&self, cart_id: &CartId) -> Result<Cart, GatewayError> {
        self.bounded("empty_cart", self.inner.empty_cart(cart_id))
            .await
    }

    async fn generate_token(&self, cart_id: &CartId) -> Result<TokenGrant, GatewayError> {
        self.bounded("generate_token", self.inner.generate_token(cart_id))
            .await
    }

    async fn list_shipping_countries(
        &self,
        token_id: &CheckoutTokenId,
    ) -> Result<Vec<LocaleEntry>, GatewayError> {
        self.bounded(
            "list_shipping_countries",
            self.inner.list_shipping_countries(token_id),
        )
        .await
    }

    async fn list_shipping_subdivisions(
        &self,
        token_id: &CheckoutTokenId,
        country_code: &str,
    ) -> Result<Vec<LocaleEntry>, GatewayError> {
        self.bounded(
            "list_shipping_subdivisions",
            self.inner
                .list_shipping_subdivisions(token_id, country_code),
        )
        .await
    }

    async fn shipping_options(
        &self,
        token_id: &CheckoutTokenId,
        country_code: &str,
        region_code: &str,
    ) -> Result<Vec<ShippingOption>, GatewayError> {
        self.bounded(
            "shipping_options",
            self.inner
                .shipping_options(token_id, country_code, region_code),
        )
        .await
    }

    async fn capture(
        &self,
        token_id: &CheckoutTokenId,
        order: &OrderPayload,
    ) -> Result<OrderConfirmation, GatewayError> {
        self.bounded("capture", self.inner.capture(token_id, order))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gateway::mock::{GatewayCall, MockGateway};

    #[tokio::test]
    async fn test_held_call_times_out() {
        let mock = MockGateway::storefront();
        let _gate = mock.hold(GatewayCall::ListProducts);
        let gateway = TimeoutGateway::new(mock, Duration::from_millis(20));

        let err = gateway.list_products().await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(d) if d == Duration::from_millis(20)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let gateway = TimeoutGateway::new(MockGateway::storefront(), Duration::from_secs(5));
        let products = gateway.list_products().await.unwrap();
        assert!(!products.is_empty());
    }
}
