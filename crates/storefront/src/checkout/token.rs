//! Checkout token resolution.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use shopfront_core::{Cart, CheckoutToken};

use crate::error::{Cause, StorefrontError, ValidationError};
use crate::gateway::CommerceGateway;

/// Exchanges a cart snapshot for a checkout token.
pub struct TokenResolver<G> {
    gateway: Arc<G>,
}

impl<G: CommerceGateway> TokenResolver<G> {
    #[must_use]
    pub const fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Generate a token for `cart`, bound to the cart `revision` it was
    /// taken from.
    ///
    /// Issues at most one gateway request and never retries.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::TokenCreation`] with
    /// [`ValidationError::EmptyCart`] for an empty cart (no request is
    /// made), or with the classified gateway failure.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn resolve(&self, cart: &Cart, revision: u64) -> Result<CheckoutToken, StorefrontError> {
        if cart.is_empty() {
            return Err(StorefrontError::TokenCreation(Cause::Validation(
                ValidationError::EmptyCart,
            )));
        }

        let grant = self.gateway.generate_token(&cart.id).await.map_err(|e| {
            warn!(error = %e, "Checkout token generation failed");
            StorefrontError::TokenCreation(Cause::from(e))
        })?;

        if grant.total_items != cart.total_items {
            warn!(
                local = cart.total_items,
                live = grant.total_items,
                "Token totals differ from local cart snapshot"
            );
        }
        info!(token_id = %grant.id, "Checkout token issued");

        Ok(CheckoutToken {
            id: grant.id,
            cart_id: grant.cart_id,
            cart_revision: revision,
            subtotal: grant.subtotal,
            total_items: grant.total_items,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::ProductId;

    use super::*;
    use crate::error::ErrorKind;
    use crate::gateway::mock::{GatewayCall, MockFailure, MockGateway};

    #[tokio::test]
    async fn test_empty_cart_makes_no_request() {
        let gateway = MockGateway::storefront();
        let cart = gateway.retrieve_cart(None).await.unwrap();
        let resolver = TokenResolver::new(Arc::new(gateway.clone()));

        let err = resolver.resolve(&cart, 1).await.unwrap_err();

        assert!(matches!(err, StorefrontError::TokenCreation(_)));
        assert_eq!(err.validation(), Some(&ValidationError::EmptyCart));
        assert_eq!(gateway.tokens_generated(), 0);
    }

    #[tokio::test]
    async fn test_token_bound_to_revision() {
        let gateway = MockGateway::storefront();
        let cart = gateway.retrieve_cart(None).await.unwrap();
        let cart = gateway
            .add_to_cart(&cart.id, &ProductId::new("prod_mug"), 2)
            .await
            .unwrap();
        let resolver = TokenResolver::new(Arc::new(gateway.clone()));

        let token = resolver.resolve(&cart, 7).await.unwrap();

        assert_eq!(token.cart_id, cart.id);
        assert_eq!(token.cart_revision, 7);
        assert_eq!(token.total_items, 2);
        assert_eq!(gateway.tokens_generated(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_token_creation_error() {
        let gateway = MockGateway::storefront();
        let cart = gateway.retrieve_cart(None).await.unwrap();
        let cart = gateway
            .add_to_cart(&cart.id, &ProductId::new("prod_mug"), 1)
            .await
            .unwrap();
        gateway.fail_next(GatewayCall::GenerateToken, MockFailure::Timeout);
        let resolver = TokenResolver::new(Arc::new(gateway.clone()));

        let err = resolver.resolve(&cart, 1).await.unwrap_err();

        assert!(matches!(err, StorefrontError::TokenCreation(Cause::Network(_))));
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(gateway.tokens_generated(), 1);
    }
}
