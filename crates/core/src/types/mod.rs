//! Core types for the storefront client.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod checkout;
pub mod email;
pub mod id;
pub mod money;
pub mod product;
pub mod status;

pub use cart::{Cart, LineItem};
pub use checkout::{
    CheckoutForm, CheckoutToken, LocaleEntry, LocaleSelection, OrderConfirmation,
    PaymentMethod, ShippingAddress, ShippingOption,
};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use product::Product;
pub use status::*;
