//! Unified error handling for storefront session operations.
//!
//! Every session operation returns `Result<T, StorefrontError>`. Gateway
//! failures are classified on conversion: transient failures become
//! [`StorefrontError::Network`], rejections become
//! [`StorefrontError::Validation`]. Nothing here is fatal; the session stays
//! usable after any error.

use std::fmt;

use thiserror::Error;

use shopfront_core::{CheckoutStep, EmailError, PipelinePhase};

use crate::gateway::GatewayError;

/// Storefront-level error type.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Transient gateway failure (connection, timeout, 5xx, rate limit).
    #[error("Network error: {0}")]
    Network(GatewayError),

    /// Input rejected locally or by the gateway.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A checkout token could not be created.
    #[error("Could not create checkout token: {0}")]
    TokenCreation(Cause),

    /// Order capture failed; the checkout form is retained.
    #[error("Could not submit order: {0}")]
    CheckoutSubmission(Cause),

    /// Another session modified the same remote state.
    ///
    /// Reserved: a single session never produces it.
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
}

/// Coarse error category for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Validation,
    ConcurrencyConflict,
}

impl StorefrontError {
    /// Coarse category of this error, looking through wrapped causes.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Validation(_) => ErrorKind::Validation,
            Self::TokenCreation(cause) | Self::CheckoutSubmission(cause) => cause.kind(),
            Self::ConcurrencyConflict(_) => ErrorKind::ConcurrencyConflict,
        }
    }

    /// The underlying validation error, if any.
    #[must_use]
    pub const fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err)
            | Self::TokenCreation(Cause::Validation(err))
            | Self::CheckoutSubmission(Cause::Validation(err)) => Some(err),
            _ => None,
        }
    }

    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network)
    }
}

impl From<GatewayError> for StorefrontError {
    fn from(err: GatewayError) -> Self {
        match Cause::from(err) {
            Cause::Network(err) => Self::Network(err),
            Cause::Validation(err) => Self::Validation(err),
        }
    }
}

/// Underlying cause of a token-creation or submission failure.
#[derive(Debug)]
pub enum Cause {
    Network(GatewayError),
    Validation(ValidationError),
}

impl Cause {
    const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Cause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network(err) => Some(err),
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<GatewayError> for Cause {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { message, .. } => {
                Self::Validation(ValidationError::Rejected(message))
            }
            GatewayError::NotFound(what) => Self::Validation(ValidationError::NotFound(what)),
            // Undecodable bodies are treated like a flaky upstream
            other => Self::Network(other),
        }
    }
}

impl From<ValidationError> for Cause {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

/// Input or state rejected before (or by) the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Quantity must be greater than zero (got {0})")]
    InvalidQuantity(u32),

    #[error("Cart has not been loaded")]
    CartNotLoaded,

    #[error("Line item {0} is not in the cart")]
    UnknownLineItem(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Unknown country: {0}")]
    UnknownCountry(String),

    #[error("Unknown subdivision: {0}")]
    UnknownSubdivision(String),

    #[error("Unknown shipping option: {0}")]
    UnknownShippingOption(String),

    /// A selection was made before the stage's list was loaded.
    #[error("Shipping data not ready (phase: {0})")]
    StageNotReady(PipelinePhase),

    #[error("Shipping selection is incomplete")]
    IncompleteShippingSelection,

    /// The pipeline no longer matches the selection confirmed with the
    /// address.
    #[error("Shipping selection changed after the address step")]
    ShippingSelectionChanged,

    /// The cart changed after the checkout token was issued.
    #[error("Cart changed since checkout started")]
    CartChanged,

    /// Nothing failed, so there is nothing to retry.
    #[error("Nothing to retry")]
    NothingToRetry,

    #[error("Expected checkout step {expected}, currently at {actual}")]
    WrongStep {
        expected: CheckoutStep,
        actual: CheckoutStep,
    },

    #[error("No checkout in progress")]
    NoActiveCheckout,

    #[error("Order has already been placed")]
    OrderAlreadyPlaced,

    #[error("Not found: {0}")]
    NotFound(String),

    /// The gateway rejected the request.
    #[error("Rejected by gateway: {0}")]
    Rejected(String),
}
