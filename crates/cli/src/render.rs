//! Plain-text rendering of storefront state.

use std::io::{self, Write};

use shopfront::checkout::{PipelineState, StageStatus};
use shopfront_core::{Cart, LocaleEntry, OrderConfirmation, Product};

pub fn products(out: &mut impl Write, products: &[Product]) -> io::Result<()> {
    if products.is_empty() {
        return writeln!(out, "No products.");
    }
    for product in products {
        let availability = if product.sellable { "" } else { " (sold out)" };
        writeln!(
            out,
            "{:<24} {:<32} {:>10}{availability}",
            product.id.as_str(),
            product.name,
            product.price.to_string()
        )?;
    }
    Ok(())
}

pub fn cart(out: &mut impl Write, cart: &Cart) -> io::Result<()> {
    writeln!(out, "Cart {}", cart.id)?;
    if cart.is_empty() {
        writeln!(out, "  (empty)")?;
    }
    for item in &cart.line_items {
        writeln!(
            out,
            "  {:<24} {:<28} {:>3} x {:>10} = {:>10}",
            item.id.as_str(),
            item.name,
            item.quantity,
            item.price.to_string(),
            item.line_total.to_string()
        )?;
    }
    writeln!(
        out,
        "  {} item(s), subtotal {}",
        cart.total_items, cart.subtotal
    )
}

fn locale_stage(
    out: &mut impl Write,
    label: &str,
    status: &StageStatus<LocaleEntry>,
    selected: Option<&str>,
) -> io::Result<()> {
    match status {
        StageStatus::Pending => writeln!(out, "{label}: -"),
        StageStatus::Loading => writeln!(out, "{label}: loading"),
        StageStatus::Unavailable(message) => writeln!(out, "{label}: unavailable ({message})"),
        StageStatus::Ready(entries) => {
            let name = selected
                .and_then(|code| entries.iter().find(|e| e.code == code))
                .map_or("none", |e| e.name.as_str());
            writeln!(out, "{label}: {name} ({} available)", entries.len())
        }
    }
}

pub fn shipping(out: &mut impl Write, state: &PipelineState) -> io::Result<()> {
    locale_stage(out, "Country", state.countries(), state.country())?;
    locale_stage(out, "Subdivision", state.subdivisions(), state.subdivision())?;
    match state.options() {
        StageStatus::Ready(_) => match state.selected_option() {
            Some(option) => writeln!(out, "Shipping: {} {}", option.description, option.price),
            None => writeln!(out, "Shipping: none available"),
        },
        StageStatus::Unavailable(message) => writeln!(out, "Shipping: unavailable ({message})"),
        StageStatus::Loading => writeln!(out, "Shipping: loading"),
        StageStatus::Pending => writeln!(out, "Shipping: -"),
    }
}

pub fn confirmation(out: &mut impl Write, order: &OrderConfirmation) -> io::Result<()> {
    writeln!(out, "Order {} placed", order.customer_reference)?;
    writeln!(out, "  Total: {}", order.order_value)?;
    if let Some(email) = &order.customer_email {
        writeln!(out, "  Receipt sent to {email}")?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use shopfront::gateway::mock::usd;
    use shopfront_core::{CartId, LineItem, LineItemId, ProductId};

    use super::*;

    #[test]
    fn test_cart_rendering() {
        let cart = Cart {
            id: CartId::new("cart_1"),
            line_items: vec![LineItem {
                id: LineItemId::new("item_1"),
                product_id: ProductId::new("prod_mug"),
                name: "Mug".to_string(),
                quantity: 3,
                price: usd(Decimal::new(1000, 2)),
                line_total: usd(Decimal::new(3000, 2)),
                image_url: None,
            }],
            subtotal: usd(Decimal::new(3000, 2)),
            total_items: 3,
            total_unique_items: 1,
        };

        let mut out = Vec::new();
        super::cart(&mut out, &cart).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("Cart cart_1"));
        assert!(text.contains("$30.00"));
        assert!(text.contains("3 item(s), subtotal $30.00"));
    }

    #[test]
    fn test_empty_product_list() {
        let mut out = Vec::new();
        products(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No products.\n");
    }
}
