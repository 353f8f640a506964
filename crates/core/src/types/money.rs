//! Monetary amounts as reported by the commerce gateway.
//!
//! The gateway returns every price in three forms: a raw numeric amount, a
//! formatted amount, and a formatted amount with the currency symbol. All
//! three are kept verbatim; the client never formats or sums money itself.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price or total with the gateway's own formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// Amount formatted without symbol (e.g., "10.00").
    pub formatted: String,
    /// Amount formatted with symbol (e.g., "$10.00").
    pub formatted_with_symbol: String,
}

impl Money {
    /// Create a new money value.
    #[must_use]
    pub fn new(
        amount: Decimal,
        formatted: impl Into<String>,
        formatted_with_symbol: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            formatted: formatted.into(),
            formatted_with_symbol: formatted_with_symbol.into(),
        }
    }

    /// Zero amount in dollars, used before the gateway has reported a total.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, "0.00", "$0.00")
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted_with_symbol)
    }
}
