//! Checkout types: token, locale selection, form, and order confirmation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CartId, CheckoutTokenId, Email, Money, OrderId, ShippingOptionId};

/// Checkout token issued by the gateway for one cart snapshot.
///
/// The token is the sole key for every locale and shipping lookup. It is
/// bound to the cart revision it was issued against; once the cart changes
/// the token must be discarded and a new one resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutToken {
    /// Token ID.
    pub id: CheckoutTokenId,
    /// Cart the token was generated from.
    pub cart_id: CartId,
    /// Local cart revision at issuance.
    pub cart_revision: u64,
    /// Subtotal reported by the gateway at issuance.
    pub subtotal: Money,
    /// Item count reported by the gateway at issuance.
    pub total_items: u32,
}

/// A code/name pair from a locale listing (country or subdivision).
///
/// Lists of entries keep the order the gateway returned them in; "first"
/// always means first in that order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocaleEntry {
    /// ISO code (e.g., "US", "CA", "ON").
    pub code: String,
    /// Display name.
    pub name: String,
}

impl LocaleEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// A shipping method available for a `(country, subdivision)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    /// Option ID (pass to capture as the fulfillment method).
    pub id: ShippingOptionId,
    /// Display description (e.g., "Domestic").
    pub description: String,
    /// Shipping cost.
    pub price: Money,
    /// Country codes the option applies to.
    pub countries: Vec<String>,
}

/// Fully resolved shipping destination and method.
///
/// Only produced by the shipping pipeline once all three stages agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocaleSelection {
    /// Country code.
    pub country: String,
    /// Subdivision (state/province/region) code within `country`.
    pub subdivision: String,
    /// Shipping option valid for `(country, subdivision)`.
    pub shipping_option: ShippingOptionId,
}

/// Customer-entered shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Street address.
    pub address_line1: String,
    /// Apartment, suite, etc.
    pub address_line2: Option<String>,
    /// Contact email.
    pub email: Email,
    /// City.
    pub city: String,
    /// ZIP / postal code.
    pub postal_code: String,
}

impl ShippingAddress {
    /// Full name for the shipping label.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Payment method chosen in the payment step.
///
/// Only a reference is carried; tokenization and capture happen on the
/// gateway side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Gateway name (e.g., `test_gateway`, `stripe`).
    pub gateway: String,
    /// Provider-issued payment reference, if the gateway needs one.
    pub reference: Option<String>,
}

/// Form state accumulated across checkout steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutForm {
    /// Address step result.
    pub address: Option<ShippingAddress>,
    /// Shipping selection captured with the address step.
    pub selection: Option<LocaleSelection>,
    /// Payment step result.
    pub payment: Option<PaymentMethod>,
    /// Optional order note.
    pub note: Option<String>,
}

/// Order record returned by a successful capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    /// Order ID.
    pub id: OrderId,
    /// Human-facing order reference (e.g., "ORD-1234").
    pub customer_reference: String,
    /// Total charged.
    pub order_value: Money,
    /// Email the receipt is sent to.
    pub customer_email: Option<String>,
    /// Capture time.
    pub created_at: DateTime<Utc>,
}
