//! Integration tests for the shopfront session.
//!
//! Scenarios run the real session components against the scripted
//! in-memory gateway (`shopfront::gateway::mock`), which can hold individual
//! calls and fail them on demand.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_session` - Mutation serialization and snapshot replacement
//! - `shipping_pipeline` - Dependent lookups and stale response handling
//! - `checkout_flow` - Token lifecycle, steps, and order submission

use std::time::Duration;

use shopfront::Storefront;
use shopfront::checkout::AddressInput;
use shopfront::config::CatalogConfig;
use shopfront::gateway::mock::MockGateway;
use shopfront_core::{PaymentMethod, ProductId};

/// Catalog settings for tests.
#[must_use]
pub const fn catalog_config() -> CatalogConfig {
    CatalogConfig {
        cache_ttl: Duration::from_secs(60),
    }
}

/// Fresh session over `gateway`.
#[must_use]
pub fn storefront(gateway: &MockGateway) -> Storefront<MockGateway> {
    Storefront::new(gateway.clone(), &catalog_config())
}

/// Session with a loaded cart holding `items` as `(product_id, quantity)`.
///
/// # Panics
///
/// Panics if the gateway rejects any of the setup calls.
#[allow(clippy::unwrap_used)]
pub async fn storefront_with_items(
    gateway: &MockGateway,
    items: &[(&str, u32)],
) -> Storefront<MockGateway> {
    let mut storefront = storefront(gateway);
    storefront.load_cart().await.unwrap();
    for (product_id, quantity) in items {
        storefront
            .add_to_cart(&ProductId::new(*product_id), *quantity)
            .await
            .unwrap();
    }
    storefront
}

/// A complete, valid address step.
#[must_use]
pub fn address() -> AddressInput {
    AddressInput {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        address_line1: "1 Analytical Way".to_string(),
        address_line2: "Unit 3".to_string(),
        email: "ada@example.com".to_string(),
        city: "Toronto".to_string(),
        postal_code: "M5V 2T6".to_string(),
    }
}

/// Payment step using the gateway's test processor.
#[must_use]
pub fn test_payment() -> PaymentMethod {
    PaymentMethod {
        gateway: "test_gateway".to_string(),
        reference: None,
    }
}
