//! Cart snapshot types.
//!
//! A [`Cart`] is always a complete snapshot returned by the gateway. The
//! client replaces it wholesale after every mutation and never patches
//! quantities or totals locally.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CartId, LineItemId, Money, ProductId};

/// A single line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line item ID (pass to `set_quantity`/`remove`).
    pub id: LineItemId,
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Product name at the time the line was added.
    pub name: String,
    /// Quantity in the cart.
    pub quantity: u32,
    /// Unit price.
    pub price: Money,
    /// Line total (unit price times quantity, as computed by the gateway).
    pub line_total: Money,
    /// Image URL for renderers.
    pub image_url: Option<String>,
}

/// Authoritative cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Gateway cart ID.
    pub id: CartId,
    /// Line items in gateway order.
    pub line_items: Vec<LineItem>,
    /// Sum of line totals.
    pub subtotal: Money,
    /// Sum of line quantities.
    pub total_items: u32,
    /// Number of distinct lines.
    pub total_unique_items: u32,
}

impl Cart {
    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// Find a line item by ID.
    #[must_use]
    pub fn line_item(&self, id: &LineItemId) -> Option<&LineItem> {
        self.line_items.iter().find(|item| &item.id == id)
    }

    /// Find the line holding a given product.
    #[must_use]
    pub fn line_for_product(&self, product_id: &ProductId) -> Option<&LineItem> {
        self.line_items
            .iter()
            .find(|item| &item.product_id == product_id)
    }

    /// Check the aggregate invariant against the line items.
    ///
    /// `total_items` must equal the summed quantities and `subtotal` the
    /// summed line totals. Only used to detect a misbehaving gateway; the
    /// aggregates are never replaced by the local sums.
    #[must_use]
    pub fn aggregates_consistent(&self) -> bool {
        let quantity: u64 = self
            .line_items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum();
        let subtotal: Decimal = self
            .line_items
            .iter()
            .map(|item| item.line_total.amount)
            .sum();

        quantity == u64::from(self.total_items) && subtotal == self.subtotal.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dollars(cents: i64) -> Money {
        let amount = Decimal::new(cents, 2);
        Money::new(amount, format!("{amount:.2}"), format!("${amount:.2}"))
    }

    fn cart_with(quantity: u32, total_items: u32, subtotal_cents: i64) -> Cart {
        Cart {
            id: CartId::new("cart_1"),
            line_items: vec![LineItem {
                id: LineItemId::new("item_1"),
                product_id: ProductId::new("prod_1"),
                name: "Mug".to_string(),
                quantity,
                price: dollars(1000),
                line_total: dollars(1000 * i64::from(quantity)),
                image_url: None,
            }],
            subtotal: dollars(subtotal_cents),
            total_items,
            total_unique_items: 1,
        }
    }

    #[test]
    fn test_aggregates_consistent() {
        assert!(cart_with(3, 3, 3000).aggregates_consistent());
    }

    #[test]
    fn test_aggregates_inconsistent_quantity() {
        assert!(!cart_with(3, 2, 3000).aggregates_consistent());
    }

    #[test]
    fn test_aggregates_inconsistent_subtotal() {
        assert!(!cart_with(3, 3, 2000).aggregates_consistent());
    }

    #[test]
    fn test_line_lookup() {
        let cart = cart_with(1, 1, 1000);
        assert!(cart.line_item(&LineItemId::new("item_1")).is_some());
        assert!(cart.line_item(&LineItemId::new("item_2")).is_none());
        assert!(
            cart.line_for_product(&ProductId::new("prod_1"))
                .is_some()
        );
        assert!(!cart.is_empty());
    }
}
