//! Conversions from Chec response shapes to core domain types.

use chrono::{DateTime, Utc};
use tracing::warn;

use shopfront_core::{
    Cart, CartId, CheckoutTokenId, LineItem, LineItemId, LocaleEntry, Money, OrderConfirmation,
    OrderId, Product, ProductId, ShippingOption, ShippingOptionId,
};

use super::wire::{
    CartData, LineItemData, OrderData, PriceData, ProductData, ShippingOptionData, TokenData,
};
use crate::gateway::TokenGrant;

pub fn convert_money(price: PriceData) -> Money {
    Money::new(price.raw, price.formatted, price.formatted_with_symbol)
}

pub fn convert_product(product: ProductData) -> Product {
    Product {
        id: ProductId::new(product.id),
        name: product.name,
        description: product.description.unwrap_or_default(),
        price: convert_money(product.price),
        permalink: product.permalink,
        image_url: product.image.map(|img| img.url),
        sellable: !product.is.sold_out,
        metadata: product.meta,
    }
}

fn convert_line_item(item: LineItemData) -> LineItem {
    LineItem {
        id: LineItemId::new(item.id),
        product_id: ProductId::new(item.product_id),
        name: item.name,
        quantity: item.quantity,
        price: convert_money(item.price),
        line_total: convert_money(item.line_total),
        image_url: item.image.map(|img| img.url),
    }
}

pub fn convert_cart(cart: CartData) -> Cart {
    Cart {
        id: CartId::new(cart.id),
        line_items: cart.line_items.into_iter().map(convert_line_item).collect(),
        subtotal: convert_money(cart.subtotal),
        total_items: cart.total_items,
        total_unique_items: cart.total_unique_items,
    }
}

pub fn convert_token(token: TokenData) -> TokenGrant {
    TokenGrant {
        id: CheckoutTokenId::new(token.id),
        cart_id: CartId::new(token.cart_id),
        subtotal: convert_money(token.live.subtotal),
        total_items: token.live.total_items,
    }
}

/// Convert a `code -> name` locale map, keeping the gateway's order.
///
/// Non-string names fall back to the code rather than dropping the entry.
pub fn convert_locale_map(map: serde_json::Map<String, serde_json::Value>) -> Vec<LocaleEntry> {
    map.into_iter()
        .map(|(code, name)| {
            let name = match name {
                serde_json::Value::String(name) => name,
                other => {
                    warn!(code = %code, value = %other, "Locale entry has non-string name");
                    code.clone()
                }
            };
            LocaleEntry { code, name }
        })
        .collect()
}

pub fn convert_shipping_option(option: ShippingOptionData) -> ShippingOption {
    ShippingOption {
        id: ShippingOptionId::new(option.id),
        description: option.description,
        price: convert_money(option.price),
        countries: option.countries,
    }
}

pub fn convert_order(order: OrderData) -> OrderConfirmation {
    let created_at = DateTime::<Utc>::from_timestamp(order.created, 0).unwrap_or_else(|| {
        warn!(created = order.created, "Order has out-of-range creation time");
        Utc::now()
    });

    OrderConfirmation {
        id: OrderId::new(order.id),
        customer_reference: order.customer_reference,
        order_value: convert_money(order.order_value),
        customer_email: order.customer.email,
        created_at,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::super::wire::{CartMutation, CountryList, OrderData, ProductList};
    use super::*;

    #[test]
    fn test_convert_cart_mutation_response() {
        let body = r#"{
            "success": true,
            "event": "Cart.Item.Updated",
            "cart": {
                "id": "cart_ypbroE658n4ea8",
                "total_items": 3,
                "total_unique_items": 1,
                "subtotal": {"raw": 30, "formatted": "30.00", "formatted_with_symbol": "$30.00"},
                "line_items": [{
                    "id": "item_7RyWOwmK5nEa2V",
                    "product_id": "prod_NqKE50BR4wdgBL",
                    "name": "Mug",
                    "quantity": 3,
                    "price": {"raw": 10, "formatted": "10.00", "formatted_with_symbol": "$10.00"},
                    "line_total": {"raw": 30, "formatted": "30.00", "formatted_with_symbol": "$30.00"},
                    "image": null
                }]
            }
        }"#;

        let mutation: CartMutation = serde_json::from_str(body).unwrap();
        let cart = convert_cart(mutation.cart);

        assert_eq!(cart.id.as_str(), "cart_ypbroE658n4ea8");
        assert_eq!(cart.total_items, 3);
        assert_eq!(cart.subtotal.amount, Decimal::new(30, 0));
        assert_eq!(cart.subtotal.formatted_with_symbol, "$30.00");
        assert_eq!(cart.line_items.len(), 1);
        assert!(cart.aggregates_consistent());
    }

    #[test]
    fn test_convert_fractional_price() {
        let body = r#"{"raw": 12.5, "formatted": "12.50", "formatted_with_symbol": "$12.50"}"#;
        let price: PriceData = serde_json::from_str(body).unwrap();
        assert_eq!(convert_money(price).amount, Decimal::new(125, 1));
    }

    #[test]
    fn test_locale_map_keeps_gateway_order() {
        let body = r#"{"countries": {"US": "United States", "CA": "Canada", "AU": "Australia"}}"#;
        let list: CountryList = serde_json::from_str(body).unwrap();
        let entries = convert_locale_map(list.countries);

        let codes: Vec<&str> = entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["US", "CA", "AU"]);
        assert_eq!(entries[1].name, "Canada");
    }

    #[test]
    fn test_locale_map_non_string_name_falls_back_to_code() {
        let body = r#"{"countries": {"XX": 7}}"#;
        let list: CountryList = serde_json::from_str(body).unwrap();
        let entries = convert_locale_map(list.countries);
        assert_eq!(entries, vec![LocaleEntry::new("XX", "XX")]);
    }

    #[test]
    fn test_convert_product_list() {
        let body = r#"{"data": [{
            "id": "prod_1",
            "name": "Mug",
            "description": "<p>Ceramic</p>",
            "price": {"raw": 10, "formatted": "10.00", "formatted_with_symbol": "$10.00"},
            "permalink": "mug",
            "image": {"url": "https://cdn.example.com/mug.png"},
            "is": {"sold_out": true}
        }], "meta": {"pagination": {"total": 1}}}"#;

        let list: ProductList = serde_json::from_str(body).unwrap();
        let product = convert_product(list.data.into_iter().next().unwrap());

        assert_eq!(product.id.as_str(), "prod_1");
        assert_eq!(product.image_url.as_deref(), Some("https://cdn.example.com/mug.png"));
        assert!(!product.sellable);
        assert_eq!(product.metadata, serde_json::Value::Null);
    }

    #[test]
    fn test_convert_order() {
        let body = r#"{
            "id": "ord_p7ZAMo1xwNJ4xX",
            "customer_reference": "ORD-1234",
            "order_value": {"raw": 35, "formatted": "35.00", "formatted_with_symbol": "$35.00"},
            "customer": {"email": "ada@example.com"},
            "created": 1700000000
        }"#;

        let order: OrderData = serde_json::from_str(body).unwrap();
        let confirmation = convert_order(order);

        assert_eq!(confirmation.customer_reference, "ORD-1234");
        assert_eq!(confirmation.customer_email.as_deref(), Some("ada@example.com"));
        assert_eq!(confirmation.created_at.timestamp(), 1_700_000_000);
    }
}
