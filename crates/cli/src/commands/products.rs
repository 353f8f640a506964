//! List catalog products.

use std::io::Write;

use shopfront::Storefront;
use shopfront::gateway::CommerceGateway;

use crate::render;

/// Print the product list.
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched or output fails.
pub async fn run<G: CommerceGateway>(
    storefront: &Storefront<G>,
    refresh: bool,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let products = if refresh {
        storefront.catalog().refresh().await?
    } else {
        storefront.catalog().products().await?
    };
    tracing::debug!(count = products.len(), "Listing products");
    render::products(out, &products)?;
    Ok(())
}
