//! Checkout step sequencing and order submission.
//!
//! The step functions ([`advance_address`], [`advance_payment`],
//! [`build_order_payload`]) are pure: they take the current form and return
//! the next one (or a validation error) without touching the gateway.
//! [`Checkout`] holds the step pointer and only moves it when a step
//! function succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use shopfront_core::{
    Cart, CheckoutForm, CheckoutStep, CheckoutToken, Email, LocaleSelection, Money,
    OrderConfirmation, PaymentMethod, ShippingAddress,
};

use super::shipping::ShippingPipeline;
use crate::error::{Cause, StorefrontError, ValidationError};
use crate::gateway::{
    CommerceGateway, CustomerPayload, FulfillmentPayload, LineItemPayload, OrderPayload,
    PaymentPayload, ShippingPayload,
};

/// Extra field key the order note is sent under.
const NOTE_FIELD: &str = "order_note";

/// Raw address step input, as typed by the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressInput {
    pub first_name: String,
    pub last_name: String,
    pub address_line1: String,
    pub address_line2: String,
    pub email: String,
    pub city: String,
    pub postal_code: String,
}

/// Where [`Checkout::back`] leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Previous checkout step.
    Step(CheckoutStep),
    /// Out of checkout; the token should be discarded.
    Cart,
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(value.to_string())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Validate the address step.
///
/// # Errors
///
/// Returns [`ValidationError::MissingField`] for the first blank required
/// field, [`ValidationError::InvalidEmail`] for a malformed email, or
/// [`ValidationError::IncompleteShippingSelection`] when the shipping
/// pipeline has not resolved a full selection.
pub fn advance_address(
    form: &CheckoutForm,
    input: &AddressInput,
    selection: Option<LocaleSelection>,
) -> Result<CheckoutForm, ValidationError> {
    let address = ShippingAddress {
        first_name: required(&input.first_name, "first name")?,
        last_name: required(&input.last_name, "last name")?,
        address_line1: required(&input.address_line1, "address line 1")?,
        address_line2: optional(&input.address_line2),
        email: Email::parse(&required(&input.email, "email")?)?,
        city: required(&input.city, "city")?,
        postal_code: required(&input.postal_code, "postal code")?,
    };
    let selection = selection.ok_or(ValidationError::IncompleteShippingSelection)?;

    Ok(CheckoutForm {
        address: Some(address),
        selection: Some(selection),
        ..form.clone()
    })
}

/// Validate the payment step.
///
/// # Errors
///
/// Returns [`ValidationError::MissingField`] when no payment gateway is
/// named.
pub fn advance_payment(
    form: &CheckoutForm,
    payment: &PaymentMethod,
) -> Result<CheckoutForm, ValidationError> {
    let payment = PaymentMethod {
        gateway: required(&payment.gateway, "payment gateway")?,
        reference: payment.reference.as_deref().and_then(optional),
    };

    Ok(CheckoutForm {
        payment: Some(payment),
        ..form.clone()
    })
}

/// Build the capture payload from the completed form.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyCart`] for an empty cart, or a
/// missing-field error when a step was never completed.
pub fn build_order_payload(
    cart: &Cart,
    form: &CheckoutForm,
) -> Result<OrderPayload, ValidationError> {
    if cart.is_empty() {
        return Err(ValidationError::EmptyCart);
    }
    let address = form
        .address
        .as_ref()
        .ok_or(ValidationError::MissingField("shipping address"))?;
    let selection = form
        .selection
        .as_ref()
        .ok_or(ValidationError::IncompleteShippingSelection)?;
    let payment = form
        .payment
        .as_ref()
        .ok_or(ValidationError::MissingField("payment method"))?;

    let line_items = cart
        .line_items
        .iter()
        .map(|item| {
            (
                item.id.to_string(),
                LineItemPayload {
                    quantity: item.quantity,
                },
            )
        })
        .collect();

    Ok(OrderPayload {
        line_items,
        customer: CustomerPayload {
            firstname: address.first_name.clone(),
            lastname: address.last_name.clone(),
            email: address.email.as_str().to_string(),
        },
        shipping: ShippingPayload {
            name: address.full_name(),
            street: address.address_line1.clone(),
            street_2: address.address_line2.clone(),
            town_city: address.city.clone(),
            county_state: selection.subdivision.clone(),
            postal_zip_code: address.postal_code.clone(),
            country: selection.country.clone(),
        },
        fulfillment: FulfillmentPayload {
            shipping_method: selection.shipping_option.to_string(),
        },
        payment: PaymentPayload {
            gateway: payment.gateway.clone(),
            payment_method_id: payment.reference.clone(),
        },
        extra_fields: form
            .note
            .as_ref()
            .map(|note| BTreeMap::from([(NOTE_FIELD.to_string(), note.clone())])),
    })
}

// =============================================================================
// Checkout
// =============================================================================

/// One checkout attempt, bound to a single token and cart snapshot.
pub struct Checkout<G> {
    gateway: Arc<G>,
    token: CheckoutToken,
    cart: Cart,
    shipping: Arc<ShippingPipeline<G>>,
    step: CheckoutStep,
    form: CheckoutForm,
    confirmation: Option<OrderConfirmation>,
}

impl<G: CommerceGateway> Checkout<G> {
    /// Start at the address step with a fresh shipping pipeline.
    ///
    /// The pipeline is idle until [`ShippingPipeline::start`] is called.
    #[must_use]
    pub fn new(gateway: Arc<G>, token: CheckoutToken, cart: Cart) -> Self {
        let shipping = Arc::new(ShippingPipeline::new(Arc::clone(&gateway)));
        Self {
            gateway,
            token,
            cart,
            shipping,
            step: CheckoutStep::Address,
            form: CheckoutForm::default(),
            confirmation: None,
        }
    }

    #[must_use]
    pub const fn token(&self) -> &CheckoutToken {
        &self.token
    }

    /// Re-bind the token to a newer revision of an identical cart.
    pub(crate) const fn rebind(&mut self, cart_revision: u64) {
        self.token.cart_revision = cart_revision;
    }

    /// Cart snapshot the token was issued for.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    #[must_use]
    pub const fn form(&self) -> &CheckoutForm {
        &self.form
    }

    /// The shipping pipeline; shareable with concurrent selection tasks.
    #[must_use]
    pub const fn shipping(&self) -> &Arc<ShippingPipeline<G>> {
        &self.shipping
    }

    #[must_use]
    pub const fn confirmation(&self) -> Option<&OrderConfirmation> {
        self.confirmation.as_ref()
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.confirmation.is_some()
    }

    /// Price of the currently selected shipping option.
    ///
    /// Read from the pipeline; [`submit`](Self::submit) refuses to capture
    /// when that selection has drifted from the one in the form.
    #[must_use]
    pub fn shipping_cost(&self) -> Option<Money> {
        self.shipping
            .snapshot()
            .selected_option()
            .map(|option| option.price.clone())
    }

    fn expect_step(&self, expected: CheckoutStep) -> Result<(), ValidationError> {
        if self.confirmation.is_some() {
            return Err(ValidationError::OrderAlreadyPlaced);
        }
        if self.step != expected {
            return Err(ValidationError::WrongStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }

    fn prepare_payload(&mut self) -> Result<OrderPayload, ValidationError> {
        self.expect_step(CheckoutStep::Confirmation)?;
        if self.shipping.selection() != self.form.selection {
            warn!("Shipping selection changed since the address step");
            self.step = CheckoutStep::Address;
            return Err(ValidationError::ShippingSelectionChanged);
        }
        build_order_payload(&self.cart, &self.form)
    }

    /// Complete the address step with the pipeline's current selection.
    ///
    /// # Errors
    ///
    /// Returns a validation error and stays on the address step.
    #[instrument(skip(self, input), fields(token_id = %self.token.id))]
    pub fn submit_address(&mut self, input: &AddressInput) -> Result<CheckoutStep, StorefrontError> {
        self.expect_step(CheckoutStep::Address)?;
        self.form = advance_address(&self.form, input, self.shipping.selection())?;
        self.step = CheckoutStep::Payment;
        Ok(self.step)
    }

    /// Complete the payment step.
    ///
    /// # Errors
    ///
    /// Returns a validation error and stays on the payment step.
    #[instrument(skip(self, payment), fields(token_id = %self.token.id))]
    pub fn submit_payment(&mut self, payment: &PaymentMethod) -> Result<CheckoutStep, StorefrontError> {
        self.expect_step(CheckoutStep::Payment)?;
        self.form = advance_payment(&self.form, payment)?;
        self.step = CheckoutStep::Confirmation;
        Ok(self.step)
    }

    /// Attach (or clear) a free-form order note.
    pub fn set_note(&mut self, note: Option<String>) {
        self.form.note = note.as_deref().and_then(optional);
    }

    /// Step back. From the address step (or after the order was placed)
    /// this leaves checkout; the form is kept for a later return.
    pub fn back(&mut self) -> Navigation {
        if self.confirmation.is_some() {
            return Navigation::Cart;
        }
        match self.step {
            CheckoutStep::Address => Navigation::Cart,
            CheckoutStep::Payment => {
                self.step = CheckoutStep::Address;
                Navigation::Step(self.step)
            }
            CheckoutStep::Confirmation => {
                self.step = CheckoutStep::Payment;
                Navigation::Step(self.step)
            }
        }
    }

    /// Capture the order. Only allowed on the confirmation step.
    ///
    /// The shipping selection confirmed at the address step must still be
    /// the pipeline's selection; otherwise the checkout returns to the
    /// address step and nothing is captured.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::CheckoutSubmission`] with the local
    /// validation failure (including
    /// [`ValidationError::ShippingSelectionChanged`]) or the classified
    /// gateway failure. The form is retained and submission may be retried.
    #[instrument(skip(self), fields(token_id = %self.token.id))]
    pub async fn submit(&mut self) -> Result<OrderConfirmation, StorefrontError> {
        let payload = self
            .prepare_payload()
            .map_err(|e| StorefrontError::CheckoutSubmission(Cause::Validation(e)))?;

        let confirmation = self
            .gateway
            .capture(&self.token.id, &payload)
            .await
            .map_err(|e| {
                warn!(error = %e, "Order capture failed");
                StorefrontError::CheckoutSubmission(Cause::from(e))
            })?;

        info!(
            order_id = %confirmation.id,
            reference = %confirmation.customer_reference,
            total = %confirmation.order_value,
            "Order placed"
        );
        self.confirmation = Some(confirmation.clone());
        Ok(confirmation)
    }
}
