//! Status enums for checkout progress.

use serde::{Deserialize, Serialize};

/// Step of the checkout sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Shipping address and destination selection.
    #[default]
    Address,
    /// Payment method.
    Payment,
    /// Review and submit.
    Confirmation,
}

impl CheckoutStep {
    /// One-based position for "step 2 of 3" style renderers.
    #[must_use]
    pub const fn position(self) -> u8 {
        match self {
            Self::Address => 1,
            Self::Payment => 2,
            Self::Confirmation => 3,
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Payment => write!(f, "payment"),
            Self::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// Phase of the shipping resolution pipeline.
///
/// `*Loading` means a fetch for that stage is in flight (or about to be
/// issued); `*Ready` means the stage's list arrived and a default selection
/// was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    #[default]
    Idle,
    CountriesLoading,
    CountriesReady,
    SubdivisionsLoading,
    SubdivisionsReady,
    OptionsLoading,
    OptionsReady,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CountriesLoading => write!(f, "countries_loading"),
            Self::CountriesReady => write!(f, "countries_ready"),
            Self::SubdivisionsLoading => write!(f, "subdivisions_loading"),
            Self::SubdivisionsReady => write!(f, "subdivisions_ready"),
            Self::OptionsLoading => write!(f, "options_loading"),
            Self::OptionsReady => write!(f, "options_ready"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_step_order() {
        assert!(CheckoutStep::Address.position() < CheckoutStep::Payment.position());
        assert!(CheckoutStep::Payment.position() < CheckoutStep::Confirmation.position());
        assert_eq!(CheckoutStep::default(), CheckoutStep::Address);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(
            PipelinePhase::SubdivisionsLoading.to_string(),
            "subdivisions_loading"
        );
    }
}
