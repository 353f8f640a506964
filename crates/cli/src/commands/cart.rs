//! Cart inspection and mutation.

use std::io::Write;

use clap::Subcommand;
use tracing::info;

use shopfront::Storefront;
use shopfront::gateway::CommerceGateway;
use shopfront_core::{LineItemId, ProductId};

use crate::render;

#[derive(Debug, Subcommand)]
pub enum CartAction {
    /// Print the cart
    Show,
    /// Add a product
    Add {
        /// Product ID
        product_id: String,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a line (0 removes it)
    Update {
        /// Line item ID
        line_item_id: String,

        /// New quantity
        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Line item ID
        line_item_id: String,
    },
    /// Remove every line
    Empty,
}

/// Load the cart, apply `action`, and print the resulting snapshot.
///
/// # Errors
///
/// Returns an error if the cart cannot be loaded or the mutation fails.
pub async fn run<G: CommerceGateway>(
    storefront: &mut Storefront<G>,
    action: CartAction,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = storefront.load_cart().await?;
    info!(cart_id = %loaded.id, "Cart loaded");

    let cart = match action {
        CartAction::Show => loaded,
        CartAction::Add {
            product_id,
            quantity,
        } => {
            storefront
                .add_to_cart(&ProductId::new(product_id), quantity)
                .await?
        }
        CartAction::Update {
            line_item_id,
            quantity,
        } => {
            storefront
                .set_quantity(&LineItemId::new(line_item_id), quantity)
                .await?
        }
        CartAction::Remove { line_item_id } => {
            storefront
                .remove_from_cart(&LineItemId::new(line_item_id))
                .await?
        }
        CartAction::Empty => storefront.clear_cart().await?,
    };

    render::cart(out, &cart)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use shopfront::config::CatalogConfig;
    use shopfront::gateway::mock::MockGateway;

    use super::*;

    #[tokio::test]
    async fn test_add_creates_cart_and_prints_totals() {
        let mut storefront = Storefront::new(
            MockGateway::storefront(),
            &CatalogConfig {
                cache_ttl: Duration::from_secs(60),
            },
        );
        let mut out = Vec::new();

        run(
            &mut storefront,
            CartAction::Add {
                product_id: "prod_shirt".to_string(),
                quantity: 2,
            },
            &mut out,
        )
        .await
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Shirt"));
        assert!(text.contains("2 item(s), subtotal $50.00"));
    }
}
