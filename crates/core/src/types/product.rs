//! Catalog products.

use serde::{Deserialize, Serialize};

use super::{Money, ProductId};

/// A product as listed by the commerce gateway.
///
/// Products are immutable once fetched; a refetch replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Gateway product ID (pass to `add`).
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Description (may contain HTML from the merchant dashboard).
    pub description: String,
    /// Display price.
    pub price: Money,
    /// URL-friendly handle.
    pub permalink: Option<String>,
    /// Primary image URL.
    pub image_url: Option<String>,
    /// Whether the gateway reports the product as purchasable.
    pub sellable: bool,
    /// Arbitrary merchant metadata.
    pub metadata: serde_json::Value,
}

impl Product {
    /// Description with HTML tags stripped, for plain-text renderers.
    #[must_use]
    pub fn plain_description(&self) -> String {
        let mut out = String::with_capacity(self.description.len());
        let mut in_tag = false;
        for c in self.description.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => out.push(c),
                _ => {}
            }
        }
        out.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_plain_description_strips_tags() {
        let product = Product {
            id: ProductId::new("prod_1"),
            name: "Mug".to_string(),
            description: "<p>Holds <b>coffee</b>.</p>".to_string(),
            price: Money::new(Decimal::new(1000, 2), "10.00", "$10.00"),
            permalink: None,
            image_url: None,
            sellable: true,
            metadata: serde_json::Value::Null,
        };
        assert_eq!(product.plain_description(), "Holds coffee.");
    }
}
