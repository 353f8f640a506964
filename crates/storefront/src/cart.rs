//! Cart session manager.
//!
//! Keeps the client-held cart in sync with the gateway's authoritative cart.
//! Every mutation issues exactly one gateway request and, on success,
//! replaces the whole local snapshot with the one the gateway returned.
//! Mutations are serialized: the second request is only sent once the first
//! response has been applied.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{Span, debug, field, instrument, warn};

use shopfront_core::{Cart, CartId, LineItemId, ProductId};

use crate::error::{StorefrontError, ValidationError};
use crate::gateway::CommerceGateway;

/// Published cart state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    /// Cart to load; known before the first snapshot when resuming a cart.
    pub cart_id: Option<CartId>,
    /// Last snapshot returned by the gateway.
    pub cart: Option<Cart>,
    /// Incremented on every applied snapshot.
    pub revision: u64,
}

/// Owner of the single local cart snapshot.
pub struct CartSession<G> {
    gateway: Arc<G>,
    /// FIFO: held across the gateway call and the snapshot replacement.
    mutation: Mutex<()>,
    state: watch::Sender<CartState>,
}

impl<G: CommerceGateway> CartSession<G> {
    /// Session that creates a fresh remote cart on [`load`](Self::load).
    #[must_use]
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_state(gateway, CartState::default())
    }

    /// Session that resumes an existing remote cart on [`load`](Self::load).
    #[must_use]
    pub fn resume(gateway: Arc<G>, cart_id: CartId) -> Self {
        Self::with_state(
            gateway,
            CartState {
                cart_id: Some(cart_id),
                ..CartState::default()
            },
        )
    }

    fn with_state(gateway: Arc<G>, state: CartState) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            gateway,
            mutation: Mutex::new(()),
            state,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current cart snapshot, if loaded.
    #[must_use]
    pub fn snapshot(&self) -> Option<Cart> {
        self.state.borrow().cart.clone()
    }

    /// Current state (snapshot plus revision).
    #[must_use]
    pub fn state(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// Revision of the current snapshot; 0 until the first load.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.borrow().revision
    }

    /// Receive every applied snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Retrieve the cart, creating one remotely when no cart ID is known.
    ///
    /// Calling it again refreshes the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the classified gateway error; the snapshot is unchanged.
    #[instrument(skip(self), fields(cart_id = field::Empty))]
    pub async fn load(&self) -> Result<Cart, StorefrontError> {
        let _guard = self.mutation.lock().await;
        let cart_id = self.state.borrow().cart_id.clone();
        if let Some(id) = &cart_id {
            Span::current().record("cart_id", id.as_str());
        }

        let cart = self.gateway.retrieve_cart(cart_id.as_ref()).await?;
        Ok(self.apply(cart))
    }

    /// Add `quantity` of a product.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidQuantity`] for a zero quantity and
    /// [`ValidationError::CartNotLoaded`] before the first load, both
    /// without a gateway request, or the classified gateway error.
    #[instrument(skip(self), fields(cart_id = field::Empty, product_id = %product_id))]
    pub async fn add(&self, product_id: &ProductId, quantity: u32) -> Result<Cart, StorefrontError> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity(quantity).into());
        }

        let _guard = self.mutation.lock().await;
        let cart_id = self.loaded_cart_id()?;
        let cart = self
            .gateway
            .add_to_cart(&cart_id, product_id, quantity)
            .await?;
        Ok(self.apply(cart))
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CartNotLoaded`] before the first load and
    /// [`ValidationError::UnknownLineItem`] for a line not in the snapshot,
    /// both without a gateway request, or the classified gateway error.
    #[instrument(skip(self), fields(cart_id = field::Empty, line_item_id = %line_item_id))]
    pub async fn set_quantity(
        &self,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, StorefrontError> {
        let _guard = self.mutation.lock().await;
        let cart_id = self.loaded_line(line_item_id)?;
        let cart = if quantity == 0 {
            debug!("Zero quantity, removing line");
            self.gateway.remove_line_item(&cart_id, line_item_id).await?
        } else {
            self.gateway
                .update_line_item(&cart_id, line_item_id, quantity)
                .await?
        };
        Ok(self.apply(cart))
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CartNotLoaded`] before the first load and
    /// [`ValidationError::UnknownLineItem`] for a line not in the snapshot,
    /// both without a gateway request, or the classified gateway error.
    #[instrument(skip(self), fields(cart_id = field::Empty, line_item_id = %line_item_id))]
    pub async fn remove(&self, line_item_id: &LineItemId) -> Result<Cart, StorefrontError> {
        let _guard = self.mutation.lock().await;
        let cart_id = self.loaded_line(line_item_id)?;
        let cart = self.gateway.remove_line_item(&cart_id, line_item_id).await?;
        Ok(self.apply(cart))
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CartNotLoaded`] before the first load, or
    /// the classified gateway error.
    #[instrument(skip(self), fields(cart_id = field::Empty))]
    pub async fn clear(&self) -> Result<Cart, StorefrontError> {
        let _guard = self.mutation.lock().await;
        let cart_id = self.loaded_cart_id()?;
        let cart = self.gateway.empty_cart(&cart_id).await?;
        Ok(self.apply(cart))
    }

    fn loaded_cart_id(&self) -> Result<CartId, ValidationError> {
        let state = self.state.borrow();
        let cart_id = state
            .cart
            .as_ref()
            .map(|cart| cart.id.clone())
            .ok_or(ValidationError::CartNotLoaded)?;
        Span::current().record("cart_id", cart_id.as_str());
        Ok(cart_id)
    }

    /// Cart ID, provided the snapshot contains `line_item_id`.
    fn loaded_line(&self, line_item_id: &LineItemId) -> Result<CartId, ValidationError> {
        let cart_id = self.loaded_cart_id()?;
        let state = self.state.borrow();
        if state
            .cart
            .as_ref()
            .is_none_or(|cart| cart.line_item(line_item_id).is_none())
        {
            return Err(ValidationError::UnknownLineItem(line_item_id.to_string()));
        }
        Ok(cart_id)
    }

        /// Replace the snapshot wholesale and publish it.
    fn apply(&self, cart: Cart) -> Cart {
        if !cart.aggregates_consistent() {
            warn!(
                cart_id = %cart.id,
                total_items = cart.total_items,
                subtotal = %cart.subtotal,
                "Gateway cart aggregates disagree with its line items"
            );
        }

        self.state.send_modify(|state| {
            state.cart_id = Some(cart.id.clone());
            state.cart = Some(cart.clone());
            state.revision += 1;
        });
        debug!(
            cart_id = %cart.id,
            total_items = cart.total_items,
            revision = self.revision(),
            "Cart snapshot applied"
        );
        cart
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::error::ErrorKind;
    use crate::gateway::mock::{GatewayCall, MockFailure, MockGateway};

    fn session() -> (MockGateway, CartSession<MockGateway>) {
        let gateway = MockGateway::storefront();
        let session = CartSession::new(Arc::new(gateway.clone()));
        (gateway, session)
    }

    #[tokio::test]
    async fn test_mutation_before_load_is_rejected_locally() {
        let (gateway, session) = session();

        let err = session
            .add(&ProductId::new("prod_mug"), 1)
            .await
            .unwrap_err();

        assert_eq!(err.validation(), Some(&ValidationError::CartNotLoaded));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_quantity_add_is_rejected_without_request() {
        let (gateway, session) = session();
        session.load().await.unwrap();

        let err = session
            .add(&ProductId::new("prod_mug"), 0)
            .await
            .unwrap_err();

        assert_eq!(err.validation(), Some(&ValidationError::InvalidQuantity(0)));
        assert_eq!(gateway.calls(), vec![GatewayCall::RetrieveCart]);
    }

    #[tokio::test]
    async fn test_snapshot_replaced_and_revision_bumped() {
        let (_gateway, session) = session();
        session.load().await.unwrap();
        assert_eq!(session.revision(), 1);

        let cart = session.add(&ProductId::new("prod_mug"), 2).await.unwrap();

        assert_eq!(session.revision(), 2);
        assert_eq!(session.snapshot(), Some(cart.clone()));
        assert_eq!(cart.total_items, 2);
        assert_eq!(cart.subtotal.amount, Decimal::new(2000, 2));
    }

    #[tokio::test]
    async fn test_zero_quantity_update_removes_line() {
        let (gateway, session) = session();
        session.load().await.unwrap();
        let cart = session.add(&ProductId::new("prod_mug"), 2).await.unwrap();
        let line_id = cart.line_items[0].id.clone();

        let cart = session.set_quantity(&line_id, 0).await.unwrap();

        assert!(cart.is_empty());
        assert!(gateway.calls().contains(&GatewayCall::RemoveLineItem {
            line_item_id: line_id
        }));
    }

    #[tokio::test]
    async fn test_unknown_line_is_rejected_without_request() {
        let (gateway, session) = session();
        session.load().await.unwrap();
        session.add(&ProductId::new("prod_mug"), 1).await.unwrap();
        let missing = LineItemId::new("item_missing");

        let err = session.set_quantity(&missing, 2).await.unwrap_err();
        assert_eq!(
            err.validation(),
            Some(&ValidationError::UnknownLineItem("item_missing".to_string()))
        );
        let err = session.remove(&missing).await.unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::UnknownLineItem(_))
        ));

        assert_eq!(gateway.calls().len(), 2);
        assert_eq!(session.revision(), 2);
    }

    #[tokio::test]
    async fn test_failure_leaves_snapshot_untouched() {
        let (gateway, session) = session();
        session.load().await.unwrap();
        let before = session.add(&ProductId::new("prod_mug"), 1).await.unwrap();
        gateway.fail_next(GatewayCall::add("prod_shirt", 1), MockFailure::Unavailable);

        let err = session
            .add(&ProductId::new("prod_shirt"), 1)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(session.snapshot(), Some(before));
        assert_eq!(session.revision(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_applied_snapshots() {
        let (_gateway, session) = session();
        let mut rx = session.subscribe();
        session.load().await.unwrap();

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.revision, 1);
        assert!(state.cart.is_some());
    }

    #[tokio::test]
    async fn test_resume_loads_known_cart() {
        let (gateway, session) = session();
        let cart = session.load().await.unwrap();
        session.add(&ProductId::new("prod_shirt"), 1).await.unwrap();

        let resumed = CartSession::resume(Arc::new(gateway), cart.id.clone());
        let loaded = resumed.load().await.unwrap();

        assert_eq!(loaded.id, cart.id);
        assert_eq!(loaded.total_items, 1);
    }
}
