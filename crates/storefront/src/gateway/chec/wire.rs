//! Response shapes of the Chec REST API.
//!
//! Only the fields the client uses are declared; everything else in the
//! response body is ignored.

use rust_decimal::Decimal;
use serde::Deserialize;

/// `{ raw, formatted, formatted_with_symbol }` price object.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceData {
    #[serde(with = "rust_decimal::serde::float")]
    pub raw: Decimal,
    pub formatted: String,
    pub formatted_with_symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageData {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFlags {
    #[serde(default)]
    pub sold_out: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: PriceData,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub image: Option<ImageData>,
    #[serde(default)]
    pub is: ProductFlags,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// `GET /products` envelope.
#[derive(Debug, Deserialize)]
pub struct ProductList {
    #[serde(default)]
    pub data: Vec<ProductData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemData {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub price: PriceData,
    pub line_total: PriceData,
    #[serde(default)]
    pub image: Option<ImageData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartData {
    pub id: String,
    pub total_items: u32,
    pub total_unique_items: u32,
    pub subtotal: PriceData,
    #[serde(default)]
    pub line_items: Vec<LineItemData>,
}

/// Envelope of every cart mutation (`{ success, cart, ... }`).
#[derive(Debug, Deserialize)]
pub struct CartMutation {
    pub cart: CartData,
}

#[derive(Debug, Deserialize)]
pub struct TokenLive {
    pub subtotal: PriceData,
    pub total_items: u32,
}

/// `GET /checkouts/{cart}?type=cart` response.
#[derive(Debug, Deserialize)]
pub struct TokenData {
    pub id: String,
    pub cart_id: String,
    pub live: TokenLive,
}

/// `{ "countries": { "CA": "Canada", ... } }`.
///
/// `serde_json::Map` keeps insertion order (`preserve_order`), so the
/// gateway's ordering survives decoding.
#[derive(Debug, Deserialize)]
pub struct CountryList {
    #[serde(default)]
    pub countries: serde_json::Map<String, serde_json::Value>,
}

/// `{ "subdivisions": { "ON": "Ontario", ... } }`.
#[derive(Debug, Deserialize)]
pub struct SubdivisionList {
    #[serde(default)]
    pub subdivisions: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingOptionData {
    pub id: String,
    pub description: String,
    pub price: PriceData,
    #[serde(default)]
    pub countries: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderCustomer {
    #[serde(default)]
    pub email: Option<String>,
}

/// `POST /checkouts/{token}` response.
#[derive(Debug, Deserialize)]
pub struct OrderData {
    pub id: String,
    pub customer_reference: String,
    pub order_value: PriceData,
    #[serde(default)]
    pub customer: OrderCustomer,
    /// Unix timestamp (seconds).
    pub created: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}

/// Error envelope (`{ "status_code": 422, "error": { "message": ... } }`).
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: ErrorDetail,
}
