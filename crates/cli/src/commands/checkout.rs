//! Non-interactive checkout.
//!
//! Runs the whole flow from flags: token, shipping resolution (defaults or
//! overrides), address, payment, and capture.

use std::io::Write;
use std::sync::Arc;

use clap::Args;
use tracing::info;

use shopfront::Storefront;
use shopfront::checkout::AddressInput;
use shopfront::gateway::CommerceGateway;
use shopfront_core::{PaymentMethod, ShippingOptionId};

use crate::render;

#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// Cart to check out
    #[arg(long, env = "SHOPFRONT_CART_ID")]
    pub cart_id: String,

    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    #[arg(long)]
    pub email: String,

    /// Street address
    #[arg(long)]
    pub address: String,

    /// Apartment, suite, etc.
    #[arg(long, default_value = "")]
    pub address2: String,

    #[arg(long)]
    pub city: String,

    #[arg(long)]
    pub postal_code: String,

    /// Country code (defaults to the first the merchant ships to)
    #[arg(long)]
    pub country: Option<String>,

    /// Subdivision code (defaults to the first of the country)
    #[arg(long)]
    pub subdivision: Option<String>,

    /// Shipping option ID (defaults to the first offered)
    #[arg(long)]
    pub shipping_option: Option<String>,

    /// Payment gateway name
    #[arg(long, default_value = "test_gateway")]
    pub payment_gateway: String,

    /// Provider-issued payment reference
    #[arg(long)]
    pub payment_token: Option<String>,

    /// Order note
    #[arg(long)]
    pub note: Option<String>,

    /// Stop before the order is submitted
    #[arg(long)]
    pub dry_run: bool,
}

impl CheckoutArgs {
    fn address_input(&self) -> AddressInput {
        AddressInput {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            address_line1: self.address.clone(),
            address_line2: self.address2.clone(),
            email: self.email.clone(),
            city: self.city.clone(),
            postal_code: self.postal_code.clone(),
        }
    }
}

/// Run the checkout flow for the session's cart.
///
/// # Errors
///
/// Returns the first storefront error encountered, or an output error.
pub async fn run<G: CommerceGateway>(
    storefront: &mut Storefront<G>,
    args: &CheckoutArgs,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let cart = storefront.load_cart().await?;
    render::cart(out, &cart)?;

    storefront.begin_checkout().await?;
    let checkout = storefront
        .checkout_mut()
        .ok_or("checkout did not start")?;
    let shipping = Arc::clone(checkout.shipping());

    if let Some(country) = &args.country {
        shipping.select_country(country).await?;
    }
    if let Some(subdivision) = &args.subdivision {
        shipping.select_subdivision(subdivision).await?;
    }
    if let Some(option) = &args.shipping_option {
        shipping.select_shipping_option(&ShippingOptionId::new(option.as_str()))?;
    }
    render::shipping(out, &shipping.snapshot())?;

    checkout.submit_address(&args.address_input())?;
    checkout.submit_payment(&PaymentMethod {
        gateway: args.payment_gateway.clone(),
        reference: args.payment_token.clone(),
    })?;
    checkout.set_note(args.note.clone());

    if let Some(cost) = checkout.shipping_cost() {
        writeln!(out, "Subtotal {} + shipping {cost}", cart.subtotal)?;
    }
    if args.dry_run {
        info!(token_id = %checkout.token().id, "Dry run, order not submitted");
        writeln!(out, "Dry run: order not submitted")?;
        return Ok(());
    }

    let confirmation = storefront.place_order().await?;
    render::confirmation(out, &confirmation)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use shopfront::config::CatalogConfig;
    use shopfront::gateway::mock::{GatewayCall, MockGateway};
    use shopfront_core::ProductId;

    use super::*;

    fn args(dry_run: bool) -> CheckoutArgs {
        CheckoutArgs {
            cart_id: String::new(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            address: "1 Analytical Way".to_string(),
            address2: String::new(),
            city: "Seattle".to_string(),
            postal_code: "98101".to_string(),
            country: Some("US".to_string()),
            subdivision: Some("WA".to_string()),
            shipping_option: Some("ship_US_WA_exp".to_string()),
            payment_gateway: "test_gateway".to_string(),
            payment_token: None,
            note: None,
            dry_run,
        }
    }

    async fn storefront_with_mug(gateway: &MockGateway) -> Storefront<MockGateway> {
        let mut storefront = Storefront::new(
            gateway.clone(),
            &CatalogConfig {
                cache_ttl: Duration::from_secs(60),
            },
        );
        storefront.load_cart().await.unwrap();
        storefront
            .add_to_cart(&ProductId::new("prod_mug"), 1)
            .await
            .unwrap();
        storefront
    }

    #[tokio::test]
    async fn test_checkout_with_overrides() {
        let gateway = MockGateway::storefront();
        let mut storefront = storefront_with_mug(&gateway).await;
        let mut out = Vec::new();

        run(&mut storefront, &args(false), &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Country: United States"));
        assert!(text.contains("Shipping: Express $15.00"));
        assert!(text.contains("Total: $25.00"));

        let captured = gateway.captured();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].1.shipping.county_state, "WA");
    }

    #[tokio::test]
    async fn test_dry_run_does_not_capture() {
        let gateway = MockGateway::storefront();
        let mut storefront = storefront_with_mug(&gateway).await;
        let mut out = Vec::new();

        run(&mut storefront, &args(true), &mut out).await.unwrap();

        assert_eq!(gateway.issued_count(&GatewayCall::Capture), 0);
        assert!(String::from_utf8(out).unwrap().contains("Dry run"));
    }
}
