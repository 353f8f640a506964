//! Request/response payloads exchanged with the gateway that have no
//! counterpart in the core domain types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use shopfront_core::{CartId, CheckoutTokenId, Money};

/// Token data as issued by the gateway, before it is bound to a local cart
/// revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Token ID.
    pub id: CheckoutTokenId,
    /// Cart the token was generated from.
    pub cart_id: CartId,
    /// Live subtotal.
    pub subtotal: Money,
    /// Live item count.
    pub total_items: u32,
}

/// Order capture payload.
///
/// Serializes to the shape `POST /checkouts/{token}` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    /// Line items keyed by line item ID.
    pub line_items: BTreeMap<String, LineItemPayload>,
    /// Customer contact.
    pub customer: CustomerPayload,
    /// Shipping destination.
    pub shipping: ShippingPayload,
    /// Selected shipping method.
    pub fulfillment: FulfillmentPayload,
    /// Payment reference.
    pub payment: PaymentPayload,
    /// Free-form order note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_fields: Option<BTreeMap<String, String>>,
}

/// Quantity for one captured line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemPayload {
    pub quantity: u32,
}

/// Customer contact fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerPayload {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

/// Shipping destination fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPayload {
    pub name: String,
    pub street: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_2: Option<String>,
    pub town_city: String,
    pub county_state: String,
    pub postal_zip_code: String,
    pub country: String,
}

/// Shipping method selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentPayload {
    pub shipping_method: String,
}

/// Payment gateway reference. No card data is ever carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub gateway: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_payload_wire_shape() {
        let payload = OrderPayload {
            line_items: BTreeMap::from([(
                "item_1".to_string(),
                LineItemPayload { quantity: 2 },
            )]),
            customer: CustomerPayload {
                firstname: "Ada".to_string(),
                lastname: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
            shipping: ShippingPayload {
                name: "Ada Lovelace".to_string(),
                street: "1 Analytical Way".to_string(),
                street_2: None,
                town_city: "Toronto".to_string(),
                county_state: "ON".to_string(),
                postal_zip_code: "M5V 2T6".to_string(),
                country: "CA".to_string(),
            },
            fulfillment: FulfillmentPayload {
                shipping_method: "ship_1".to_string(),
            },
            payment: PaymentPayload {
                gateway: "test_gateway".to_string(),
                payment_method_id: None,
            },
            extra_fields: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["line_items"]["item_1"]["quantity"], 2);
        assert_eq!(json["shipping"]["county_state"], "ON");
        assert_eq!(json["fulfillment"]["shipping_method"], "ship_1");
        assert!(json["shipping"].get("street_2").is_none());
        assert!(json["payment"].get("payment_method_id").is_none());
        assert!(json.get("extra_fields").is_none());
    }
}
