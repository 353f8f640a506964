//! Scripted in-memory gateway for tests.
//!
//! Behaves like a tiny commerce backend: it owns a server-side cart and
//! computes totals itself, issues checkout tokens, and serves locale and
//! shipping data from fixtures. On top of that it records every call,
//! can hold a call until the test releases it, and can fail the next
//! matching call.
//!
//! ```rust,ignore
//! let gateway = MockGateway::storefront();
//! let gate = gateway.hold(GatewayCall::subdivisions("CA"));
//! // ... start a lookup, then
//! gateway.wait_until_issued(&GatewayCall::subdivisions("CA")).await;
//! gate.release();
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Notify, oneshot};

use shopfront_core::{
    Cart, CartId, CheckoutTokenId, LineItem, LineItemId, LocaleEntry, Money, OrderConfirmation,
    OrderId, Product, ProductId, ShippingOption, ShippingOptionId,
};

use super::{CommerceGateway, GatewayError, OrderPayload, TokenGrant};

/// A gateway call as observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    ListProducts,
    RetrieveCart,
    AddToCart {
        product_id: ProductId,
        quantity: u32,
    },
    UpdateLineItem {
        line_item_id: LineItemId,
        quantity: u32,
    },
    RemoveLineItem {
        line_item_id: LineItemId,
    },
    EmptyCart,
    GenerateToken,
    ListCountries,
    ListSubdivisions {
        country: String,
    },
    ShippingOptions {
        country: String,
        region: String,
    },
    Capture,
}

impl GatewayCall {
    /// Shorthand for an add call.
    #[must_use]
    pub fn add(product_id: &str, quantity: u32) -> Self {
        Self::AddToCart {
            product_id: ProductId::new(product_id),
            quantity,
        }
    }

    /// Shorthand for a subdivision lookup.
    #[must_use]
    pub fn subdivisions(country: &str) -> Self {
        Self::ListSubdivisions {
            country: country.to_string(),
        }
    }

    /// Shorthand for a shipping option lookup.
    #[must_use]
    pub fn options(country: &str, region: &str) -> Self {
        Self::ShippingOptions {
            country: country.to_string(),
            region: region.to_string(),
        }
    }
}

/// Call lifecycle entry in the mock's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// The call reached the gateway.
    Issued(GatewayCall),
    /// The gateway produced a response (success or failure).
    Completed(GatewayCall),
}

/// Failure to inject into the next matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// 503 from the gateway.
    Unavailable,
    /// Deadline expiry.
    Timeout,
    /// 422 with the given message.
    Rejected(String),
}

impl MockFailure {
    fn into_error(self) -> GatewayError {
        match self {
            Self::Unavailable => GatewayError::Unavailable {
                status: 503,
                message: "Service Unavailable".to_string(),
            },
            Self::Timeout => GatewayError::Timeout(Duration::from_secs(10)),
            Self::Rejected(message) => GatewayError::Rejected {
                status: 422,
                message,
            },
        }
    }
}

/// Handle that keeps a held call waiting until released (or dropped).
#[derive(Debug)]
pub struct Gate {
    release: oneshot::Sender<()>,
}

impl Gate {
    /// Let the held call respond.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[derive(Default)]
struct MockState {
    products: Vec<Product>,
    carts: HashMap<CartId, Cart>,
    tokens: HashMap<CheckoutTokenId, CartId>,
    countries: Vec<LocaleEntry>,
    subdivisions: HashMap<String, Vec<LocaleEntry>>,
    shipping: HashMap<(String, String), Vec<ShippingOption>>,
    events: Vec<CallEvent>,
    holds: HashMap<GatewayCall, VecDeque<oneshot::Receiver<()>>>,
    failures: HashMap<GatewayCall, VecDeque<MockFailure>>,
    captured: Vec<(CheckoutTokenId, OrderPayload)>,
    next_id: u32,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn cart_mut(&mut self, cart_id: &CartId) -> Result<&mut Cart, GatewayError> {
        self.carts
            .get_mut(cart_id)
            .ok_or_else(|| GatewayError::NotFound(format!("carts/{cart_id}")))
    }
}

struct MockInner {
    state: Mutex<MockState>,
    issued: Notify,
}

/// In-memory commerce backend.
#[derive(Clone)]
pub struct MockGateway {
    inner: Arc<MockInner>,
}

/// Format a dollar amount the way the gateway does.
#[must_use]
pub fn usd(amount: Decimal) -> Money {
    let amount = amount.round_dp(2);
    Money::new(amount, format!("{amount:.2}"), format!("${amount:.2}"))
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// An empty backend with no products or locale data.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockInner {
                state: Mutex::new(MockState::default()),
                issued: Notify::new(),
            }),
        }
    }

    /// A backend with two products, two countries (CA then US), their
    /// subdivisions, and a domestic/express option for every subdivision.
    #[must_use]
    pub fn storefront() -> Self {
        let gateway = Self::new()
            .with_product("prod_mug", "Mug", Decimal::new(1000, 2))
            .with_product("prod_shirt", "Shirt", Decimal::new(2500, 2))
            .with_countries(&[("CA", "Canada"), ("US", "United States")])
            .with_subdivisions("CA", &[("ON", "Ontario"), ("QC", "Quebec")])
            .with_subdivisions("US", &[("NY", "New York"), ("WA", "Washington")]);

        [("CA", "ON"), ("CA", "QC"), ("US", "NY"), ("US", "WA")]
            .into_iter()
            .fold(gateway, |gateway, (country, region)| {
                gateway.with_shipping_options(
                    country,
                    region,
                    &[
                        (&format!("ship_{country}_{region}_std"), "Domestic", Decimal::new(500, 2)),
                        (&format!("ship_{country}_{region}_exp"), "Express", Decimal::new(1500, 2)),
                    ],
                )
            })
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Add a catalog product.
    #[must_use]
    pub fn with_product(self, id: &str, name: &str, price: Decimal) -> Self {
        self.lock().products.push(Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: format!("<p>{name}</p>"),
            price: usd(price),
            permalink: Some(name.to_lowercase()),
            image_url: None,
            sellable: true,
            metadata: serde_json::Value::Null,
        });
        self
    }

    /// Replace the shipping country list (order is preserved).
    #[must_use]
    pub fn with_countries(self, countries: &[(&str, &str)]) -> Self {
        self.lock().countries = countries
            .iter()
            .map(|(code, name)| LocaleEntry::new(*code, *name))
            .collect();
        self
    }

    /// Set the subdivisions of a country (order is preserved).
    #[must_use]
    pub fn with_subdivisions(self, country: &str, subdivisions: &[(&str, &str)]) -> Self {
        self.lock().subdivisions.insert(
            country.to_string(),
            subdivisions
                .iter()
                .map(|(code, name)| LocaleEntry::new(*code, *name))
                .collect(),
        );
        self
    }

    /// Set the shipping options of a destination as `(id, description, price)`.
    #[must_use]
    pub fn with_shipping_options(
        self,
        country: &str,
        region: &str,
        options: &[(&str, &str, Decimal)],
    ) -> Self {
        self.lock().shipping.insert(
            (country.to_string(), region.to_string()),
            options
                .iter()
                .map(|(id, description, price)| ShippingOption {
                    id: ShippingOptionId::new(*id),
                    description: (*description).to_string(),
                    price: usd(*price),
                    countries: vec![country.to_string()],
                })
                .collect(),
        );
        self
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Hold the next call equal to `call` until the returned gate is
    /// released. Holds queue up per call.
    #[must_use]
    pub fn hold(&self, call: GatewayCall) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.lock().holds.entry(call).or_default().push_back(rx);
        Gate { release: tx }
    }

    /// Fail the next call equal to `call`.
    pub fn fail_next(&self, call: GatewayCall, failure: MockFailure) {
        self.lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(failure);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Full call log in order.
    #[must_use]
    pub fn events(&self) -> Vec<CallEvent> {
        self.lock().events.clone()
    }

    /// Calls in the order they were issued.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                CallEvent::Issued(call) => Some(call.clone()),
                CallEvent::Completed(_) => None,
            })
            .collect()
    }

    /// How many times `call` has been issued.
    #[must_use]
    pub fn issued_count(&self, call: &GatewayCall) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|event| matches!(event, CallEvent::Issued(c) if c == call))
            .count()
    }

    /// Number of checkout tokens generated.
    #[must_use]
    pub fn tokens_generated(&self) -> usize {
        self.issued_count(&GatewayCall::GenerateToken)
    }

    /// Orders captured so far.
    #[must_use]
    pub fn captured(&self) -> Vec<(CheckoutTokenId, OrderPayload)> {
        self.lock().captured.clone()
    }

    /// The server-side view of a cart.
    #[must_use]
    pub fn server_cart(&self, cart_id: &CartId) -> Option<Cart> {
        self.lock().carts.get(cart_id).cloned()
    }

    /// Wait until `call` has been issued at least once.
    pub async fn wait_until_issued(&self, call: &GatewayCall) {
        loop {
            // Registered before the check so a notification in between is not lost
            let notified = self.inner.issued.notified();
            if self.issued_count(call) > 0 {
                return;
            }
            notified.await;
        }
    }

    // =========================================================================
    // Call plumbing
    // =========================================================================

    async fn call<T>(
        &self,
        call: GatewayCall,
        respond: impl FnOnce(&mut MockState) -> Result<T, GatewayError> + Send,
    ) -> Result<T, GatewayError> {
        let (hold, failure) = {
            let mut state = self.lock();
            state.events.push(CallEvent::Issued(call.clone()));
            let hold = state.holds.get_mut(&call).and_then(VecDeque::pop_front);
            let failure = state.failures.get_mut(&call).and_then(VecDeque::pop_front);
            (hold, failure)
        };
        self.inner.issued.notify_waiters();

        if let Some(hold) = hold {
            // A dropped gate releases the call as well
            let _ = hold.await;
        }

        let mut state = self.lock();
        let result = match failure {
            Some(failure) => Err(failure.into_error()),
            None => respond(&mut state),
        };
        state.events.push(CallEvent::Completed(call));
        result
    }
}

/// Recompute the server-side aggregates after a mutation.
fn recompute(cart: &mut Cart) {
    for item in &mut cart.line_items {
        item.line_total = usd(item.price.amount * Decimal::from(item.quantity));
    }
    cart.subtotal = usd(cart.line_items.iter().map(|i| i.line_total.amount).sum());
    cart.total_items = cart.line_items.iter().map(|i| i.quantity).sum();
    cart.total_unique_items = u32::try_from(cart.line_items.len()).unwrap_or(u32::MAX);
}

fn empty_cart(id: CartId) -> Cart {
    Cart {
        id,
        line_items: Vec::new(),
        subtotal: usd(Decimal::ZERO),
        total_items: 0,
        total_unique_items: 0,
    }
}

impl CommerceGateway for MockGateway {
    async fn list_products(&self) -> Result<Vec<Product>, GatewayError> {
        self.call(GatewayCall::ListProducts, |state| Ok(state.products.clone()))
            .await
    }

    async fn retrieve_cart(&self, cart_id: Option<&CartId>) -> Result<Cart, GatewayError> {
        let cart_id = cart_id.cloned();
        self.call(GatewayCall::RetrieveCart, move |state| match cart_id {
            Some(id) => state
                .carts
                .get(&id)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(format!("carts/{id}"))),
            None => {
                let id = CartId::new(state.next_id("cart"));
                let cart = empty_cart(id.clone());
                state.carts.insert(id, cart.clone());
                Ok(cart)
            }
        })
        .await
    }

    async fn add_to_cart(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        let call = GatewayCall::AddToCart {
            product_id: product_id.clone(),
            quantity,
        };
        self.call(call, |state| {
            let product = state
                .products
                .iter()
                .find(|p| &p.id == product_id)
                .cloned()
                .ok_or_else(|| GatewayError::Rejected {
                    status: 422,
                    message: format!("Product {product_id} does not exist"),
                })?;
            let line_id = LineItemId::new(state.next_id("item"));
            let cart = state.cart_mut(cart_id)?;

            if let Some(line) = cart
                .line_items
                .iter_mut()
                .find(|line| line.product_id == product.id)
            {
                line.quantity += quantity;
            } else {
                cart.line_items.push(LineItem {
                    id: line_id,
                    product_id: product.id,
                    name: product.name,
                    quantity,
                    price: product.price.clone(),
                    line_total: product.price,
                    image_url: product.image_url,
                });
            }
            recompute(cart);
            Ok(cart.clone())
        })
        .await
    }

    async fn update_line_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        let call = GatewayCall::UpdateLineItem {
            line_item_id: line_item_id.clone(),
            quantity,
        };
        self.call(call, |state| {
            let cart = state.cart_mut(cart_id)?;
            let line = cart
                .line_items
                .iter_mut()
                .find(|line| &line.id == line_item_id)
                .ok_or_else(|| GatewayError::NotFound(format!("items/{line_item_id}")))?;
            line.quantity = quantity;
            cart.line_items.retain(|line| line.quantity > 0);
            recompute(cart);
            Ok(cart.clone())
        })
        .await
    }

    async fn remove_line_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
    ) -> Result<Cart, GatewayError> {
        let call = GatewayCall::RemoveLineItem {
            line_item_id: line_item_id.clone(),
        };
        self.call(call, |state| {
            let cart = state.cart_mut(cart_id)?;
            let before = cart.line_items.len();
            cart.line_items.retain(|line| &line.id != line_item_id);
            if cart.line_items.len() == before {
                return Err(GatewayError::NotFound(format!("items/{line_item_id}")));
            }
            recompute(cart);
            Ok(cart.clone())
        })
        .await
    }

    async fn empty_cart(&self, cart_id: &CartId) -> Result<Cart, GatewayError> {
        self.call(GatewayCall::EmptyCart, |state| {
            let cart = state.cart_mut(cart_id)?;
            cart.line_items.clear();
            recompute(cart);
            Ok(cart.clone())
        })
        .await
    }

    async fn generate_token(&self, cart_id: &CartId) -> Result<TokenGrant, GatewayError> {
        self.call(GatewayCall::GenerateToken, |state| {
            let cart = state.cart_mut(cart_id)?.clone();
            if cart.is_empty() {
                return Err(GatewayError::Rejected {
                    status: 422,
                    message: "Cart is empty".to_string(),
                });
            }
            let id = CheckoutTokenId::new(state.next_id("chkt"));
            state.tokens.insert(id.clone(), cart.id.clone());
            Ok(TokenGrant {
                id,
                cart_id: cart.id,
                subtotal: cart.subtotal,
                total_items: cart.total_items,
            })
        })
        .await
    }

    async fn list_shipping_countries(
        &self,
        token_id: &CheckoutTokenId,
    ) -> Result<Vec<LocaleEntry>, GatewayError> {
        self.call(GatewayCall::ListCountries, |state| {
            known_token(state, token_id)?;
            Ok(state.countries.clone())
        })
        .await
    }

    async fn list_shipping_subdivisions(
        &self,
        token_id: &CheckoutTokenId,
        country_code: &str,
    ) -> Result<Vec<LocaleEntry>, GatewayError> {
        self.call(GatewayCall::subdivisions(country_code), |state| {
            known_token(state, token_id)?;
            Ok(state
                .subdivisions
                .get(country_code)
                .cloned()
                .unwrap_or_default())
        })
        .await
    }

    async fn shipping_options(
        &self,
        token_id: &CheckoutTokenId,
        country_code: &str,
        region_code: &str,
    ) -> Result<Vec<ShippingOption>, GatewayError> {
        self.call(GatewayCall::options(country_code, region_code), |state| {
            known_token(state, token_id)?;
            Ok(state
                .shipping
                .get(&(country_code.to_string(), region_code.to_string()))
                .cloned()
                .unwrap_or_default())
        })
        .await
    }

    async fn capture(
        &self,
        token_id: &CheckoutTokenId,
        order: &OrderPayload,
    ) -> Result<OrderConfirmation, GatewayError> {
        self.call(GatewayCall::Capture, |state| {
            let cart_id = known_token(state, token_id)?;
            let cart = state.cart_mut(&cart_id)?.clone();
            if order.line_items.is_empty() {
                return Err(GatewayError::Rejected {
                    status: 422,
                    message: "line_items is required".to_string(),
                });
            }
            let shipping = state
                .shipping
                .get(&(
                    order.shipping.country.clone(),
                    order.shipping.county_state.clone(),
                ))
                .and_then(|options| {
                    options
                        .iter()
                        .find(|o| o.id.as_str() == order.fulfillment.shipping_method)
                })
                .map(|o| o.price.amount)
                .ok_or_else(|| GatewayError::Rejected {
                    status: 422,
                    message: "The selected shipping method is invalid".to_string(),
                })?;

            let reference = state.next_id("ORD");
            let id = OrderId::new(state.next_id("ord"));
            state.captured.push((token_id.clone(), order.clone()));
            Ok(OrderConfirmation {
                id,
                customer_reference: reference,
                order_value: usd(cart.subtotal.amount + shipping),
                customer_email: Some(order.customer.email.clone()),
                created_at: Utc::now(),
            })
        })
        .await
    }
}

fn known_token(state: &MockState, token_id: &CheckoutTokenId) -> Result<CartId, GatewayError> {
    state
        .tokens
        .get(token_id)
        .cloned()
        .ok_or_else(|| GatewayError::NotFound(format!("checkouts/{token_id}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_cart_arithmetic() {
        let gateway = MockGateway::storefront();
        let cart = gateway.retrieve_cart(None).await.unwrap();

        let cart = gateway
            .add_to_cart(&cart.id, &ProductId::new("prod_mug"), 2)
            .await
            .unwrap();
        let cart = gateway
            .add_to_cart(&cart.id, &ProductId::new("prod_shirt"), 1)
            .await
            .unwrap();

        assert_eq!(cart.total_items, 3);
        assert_eq!(cart.subtotal.formatted_with_symbol, "$45.00");
        assert!(cart.aggregates_consistent());
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let gateway = MockGateway::storefront();
        gateway.fail_next(GatewayCall::ListProducts, MockFailure::Unavailable);

        assert!(gateway.list_products().await.is_err());
        assert!(gateway.list_products().await.is_ok());
        assert_eq!(gateway.issued_count(&GatewayCall::ListProducts), 2);
    }

    #[tokio::test]
    async fn test_event_log_records_issue_and_completion() {
        let gateway = MockGateway::storefront();
        gateway.list_products().await.unwrap();

        assert_eq!(
            gateway.events(),
            vec![
                CallEvent::Issued(GatewayCall::ListProducts),
                CallEvent::Completed(GatewayCall::ListProducts),
            ]
        );
    }
}
