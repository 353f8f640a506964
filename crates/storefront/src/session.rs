//! Storefront session facade.
//!
//! One [`Storefront`] is one shopper session: a catalog, a cart, and at most
//! one checkout in progress. The checkout is bound to the cart revision its
//! token was issued against; any successful cart change discards it. Changes
//! made through the facade discard it immediately, changes made directly on
//! the [`CartSession`] the next time the checkout is accessed.

use std::sync::Arc;

use tracing::{info, instrument};

use shopfront_core::{Cart, CartId, LineItemId, OrderConfirmation, ProductId};

use crate::cart::CartSession;
use crate::catalog::Catalog;
use crate::checkout::{Checkout, Navigation, Resolution, TokenResolver};
use crate::config::{CatalogConfig, StorefrontConfig};
use crate::error::{Cause, StorefrontError, ValidationError};
use crate::gateway::{ChecClient, CommerceGateway, GatewayError, TimeoutGateway};

/// Gateway stack used against the live API.
pub type LiveGateway = TimeoutGateway<ChecClient>;

/// A shopper session.
pub struct Storefront<G> {
    gateway: Arc<G>,
    catalog: Catalog<G>,
    cart: CartSession<G>,
    tokens: TokenResolver<G>,
    checkout: Option<Checkout<G>>,
}

impl Storefront<LiveGateway> {
    /// Session against the configured Chec API, each call bounded by the
    /// configured request timeout. Resumes `cart_id` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(
        config: &StorefrontConfig,
        cart_id: Option<CartId>,
    ) -> Result<Self, GatewayError> {
        let client = ChecClient::new(&config.gateway)?;
        let gateway = TimeoutGateway::new(client, config.gateway.request_timeout);
        Ok(match cart_id {
            Some(cart_id) => Self::resume(gateway, &config.catalog, cart_id),
            None => Self::new(gateway, &config.catalog),
        })
    }
}

impl<G: CommerceGateway> Storefront<G> {
    /// Session that creates a fresh cart on first load.
    #[must_use]
    pub fn new(gateway: G, config: &CatalogConfig) -> Self {
        let gateway = Arc::new(gateway);
        let cart = CartSession::new(Arc::clone(&gateway));
        Self::assemble(gateway, cart, config)
    }

    /// Session that resumes an existing remote cart.
    #[must_use]
    pub fn resume(gateway: G, config: &CatalogConfig, cart_id: CartId) -> Self {
        let gateway = Arc::new(gateway);
        let cart = CartSession::resume(Arc::clone(&gateway), cart_id);
        Self::assemble(gateway, cart, config)
    }

    fn assemble(gateway: Arc<G>, cart: CartSession<G>, config: &CatalogConfig) -> Self {
        Self {
            catalog: Catalog::new(Arc::clone(&gateway), config),
            tokens: TokenResolver::new(Arc::clone(&gateway)),
            gateway,
            cart,
            checkout: None,
        }
    }

    #[must_use]
    pub const fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog<G> {
        &self.catalog
    }

    /// The cart session (snapshot, revision, subscriptions).
    ///
    /// Mutating it directly invalidates any active checkout.
    #[must_use]
    pub const fn cart(&self) -> &CartSession<G> {
        &self.cart
    }

    /// The active checkout, unless the cart changed since its token was
    /// issued.
    #[must_use]
    pub fn checkout(&self) -> Option<&Checkout<G>> {
        self.checkout
            .as_ref()
            .filter(|checkout| self.is_current(checkout))
    }

    /// Mutable access to the active checkout; a checkout whose cart has
    /// changed is discarded first.
    pub fn checkout_mut(&mut self) -> Option<&mut Checkout<G>> {
        self.discard_stale_checkout();
        self.checkout.as_mut()
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Load or refresh the cart.
    ///
    /// An active checkout survives only if the refreshed cart is identical
    /// to the one its token was issued for.
    ///
    /// # Errors
    ///
    /// Returns the classified gateway error.
    pub async fn load_cart(&mut self) -> Result<Cart, StorefrontError> {
        let cart = self.cart.load().await?;
        let revision = self.cart.revision();
        if let Some(checkout) = self.checkout.as_mut()
            && checkout.cart() == &cart
        {
            checkout.rebind(revision);
        } else {
            self.discard_checkout("cart changed remotely");
        }
        Ok(cart)
    }

    /// Add a product to the cart.
    ///
    /// # Errors
    ///
    /// See [`CartSession::add`].
    pub async fn add_to_cart(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, StorefrontError> {
        let cart = self.cart.add(product_id, quantity).await?;
        self.discard_checkout("cart changed");
        Ok(cart)
    }

    /// Set a line's quantity (zero removes it).
    ///
    /// # Errors
    ///
    /// See [`CartSession::set_quantity`].
    pub async fn set_quantity(
        &mut self,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, StorefrontError> {
        let cart = self.cart.set_quantity(line_item_id, quantity).await?;
        self.discard_checkout("cart changed");
        Ok(cart)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// See [`CartSession::remove`].
    pub async fn remove_from_cart(
        &mut self,
        line_item_id: &LineItemId,
    ) -> Result<Cart, StorefrontError> {
        let cart = self.cart.remove(line_item_id).await?;
        self.discard_checkout("cart changed");
        Ok(cart)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// See [`CartSession::clear`].
    pub async fn clear_cart(&mut self) -> Result<Cart, StorefrontError> {
        let cart = self.cart.clear().await?;
        self.discard_checkout("cart emptied");
        Ok(cart)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Enter checkout for the current cart.
    ///
    /// Resolves one token and starts the shipping pipeline. Re-entering
    /// while the checkout for the same cart revision is still active reuses
    /// it without generating another token.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CartNotLoaded`] before the first load and
    /// [`StorefrontError::TokenCreation`] when no token could be issued (no
    /// checkout is created). A shipping lookup failure is returned as well,
    /// but the checkout is kept so the lookup can be retried.
    #[instrument(skip(self))]
    pub async fn begin_checkout(&mut self) -> Result<Resolution, StorefrontError> {
        let state = self.cart.state();
        if let Some(checkout) = &self.checkout
            && checkout.token().cart_revision == state.revision
            && !checkout.is_complete()
        {
            return Ok(Resolution::Unchanged);
        }

        let cart = state.cart.ok_or(ValidationError::CartNotLoaded)?;
        self.checkout = None;
        let token = self.tokens.resolve(&cart, state.revision).await?;

        let checkout = Checkout::new(Arc::clone(&self.gateway), token.clone(), cart);
        let shipping = Arc::clone(checkout.shipping());
        self.checkout = Some(checkout);

        shipping.start(&token).await
    }

    /// Leave checkout, discarding the token. The cart is left untouched.
    ///
    /// Returns whether a checkout was active.
    pub fn leave_checkout(&mut self) -> bool {
        match self.checkout.take() {
            Some(checkout) => {
                info!(token_id = %checkout.token().id, "Left checkout");
                true
            }
            None => false,
        }
    }

    /// Step back within checkout, leaving it when stepping back from the
    /// first step.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoActiveCheckout`] outside checkout.
    pub fn back(&mut self) -> Result<Navigation, StorefrontError> {
        self.discard_stale_checkout();
        let checkout = self
            .checkout
            .as_mut()
            .ok_or(ValidationError::NoActiveCheckout)?;
        let navigation = checkout.back();
        if navigation == Navigation::Cart {
            self.leave_checkout();
        }
        Ok(navigation)
    }

    /// Submit the active checkout.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoActiveCheckout`] outside checkout,
    /// [`StorefrontError::CheckoutSubmission`] with
    /// [`ValidationError::CartChanged`] when the cart changed after the
    /// token was issued (the checkout is discarded), or the error of
    /// [`Checkout::submit`].
    pub async fn place_order(&mut self) -> Result<OrderConfirmation, StorefrontError> {
        if self.discard_stale_checkout() {
            return Err(StorefrontError::CheckoutSubmission(Cause::Validation(
                ValidationError::CartChanged,
            )));
        }
        let checkout = self
            .checkout
            .as_mut()
            .ok_or(ValidationError::NoActiveCheckout)?;
        checkout.submit().await
    }

    fn is_current(&self, checkout: &Checkout<G>) -> bool {
        checkout.token().cart_revision == self.cart.revision()
    }

    /// Discard the checkout if its cart has changed; returns whether it did.
    fn discard_stale_checkout(&mut self) -> bool {
        let stale = self
            .checkout
            .as_ref()
            .is_some_and(|checkout| !self.is_current(checkout));
        if stale {
            self.discard_checkout("cart changed outside checkout");
        }
        stale
    }

    fn discard_checkout(&mut self, reason: &'static str) {
        if let Some(checkout) = self.checkout.take() {
            info!(token_id = %checkout.token().id, reason, "Discarding checkout token");
        }
    }
}
