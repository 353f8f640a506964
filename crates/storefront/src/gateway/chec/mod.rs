//! Chec REST API client implementation.
//!
//! Uses `reqwest` for HTTP and decodes responses with `serde_json` so that
//! locale maps keep the gateway's key order.

mod conversions;
mod wire;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use shopfront_core::{
    Cart, CartId, CheckoutTokenId, LineItemId, LocaleEntry, OrderConfirmation, Product,
    ProductId, ShippingOption,
};

use super::{CommerceGateway, GatewayError, OrderPayload, TokenGrant};
use crate::config::GatewayConfig;

use conversions::{
    convert_cart, convert_locale_map, convert_order, convert_product, convert_shipping_option,
    convert_token,
};
use wire::{
    CartData, CartMutation, CountryList, ErrorBody, OrderData, ProductList, ShippingOptionData,
    SubdivisionList, TokenData,
};

/// Maximum characters of a response body echoed into logs and errors.
const BODY_EXCERPT_CHARS: usize = 200;

// =============================================================================
// ChecClient
// =============================================================================

/// Client for the Chec commerce REST API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ChecClient {
    inner: Arc<ChecClientInner>,
}

struct ChecClientInner {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl ChecClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (e.g., the
    /// TLS backend fails to initialize).
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(concat!("shopfront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ChecClientInner {
                client,
                config: config.clone(),
            }),
        })
    }

    /// Execute a request and decode the JSON response body.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<T, GatewayError> {
        let request_id = uuid::Uuid::new_v4();
        let url = self.inner.config.endpoint(path);

        let mut request = self
            .inner
            .client
            .request(method.clone(), &url)
            .header("X-Authorization", self.inner.config.public_key())
            .header("X-Request-Id", request_id.to_string())
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(%request_id, %method, path, "Sending gateway request");
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            let message = error_message(&response_text);
            tracing::warn!(
                %request_id,
                status = %status,
                message = %message,
                "Gateway returned non-success status"
            );
            return Err(classify_status(status, path, message));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                %request_id,
                error = %e,
                body = %excerpt(&response_text),
                "Failed to parse gateway response"
            );
            GatewayError::Parse(e)
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        self.execute(Method::GET, path, query, None).await
    }

    async fn mutate_cart(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Cart, GatewayError> {
        let mutation: CartMutation = self.execute(method, path, &[], body).await?;
        Ok(convert_cart(mutation.cart))
    }
}

impl CommerceGateway for ChecClient {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, GatewayError> {
        let limit = self.inner.config.product_page_limit.to_string();
        let list: ProductList = self.get("products", &[("limit", &limit)]).await?;
        Ok(list.data.into_iter().map(convert_product).collect())
    }

    #[instrument(skip(self), fields(cart_id = ?cart_id.map(CartId::as_str)))]
    async fn retrieve_cart(&self, cart_id: Option<&CartId>) -> Result<Cart, GatewayError> {
        let data: CartData = match cart_id {
            Some(id) => self.get(&format!("carts/{id}"), &[]).await?,
            // Without an ID the gateway creates a fresh cart
            None => self.get("carts", &[]).await?,
        };
        Ok(convert_cart(data))
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, product_id = %product_id))]
    async fn add_to_cart(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        let body = serde_json::json!({ "id": product_id, "quantity": quantity });
        self.mutate_cart(Method::POST, &format!("carts/{cart_id}"), Some(body))
            .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, line_item_id = %line_item_id))]
    async fn update_line_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        let body = serde_json::json!({ "quantity": quantity });
        self.mutate_cart(
            Method::PUT,
            &format!("carts/{cart_id}/items/{line_item_id}"),
            Some(body),
        )
        .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, line_item_id = %line_item_id))]
    async fn remove_line_item(
        &self,
        cart_id: &CartId,
        line_item_id: &LineItemId,
    ) -> Result<Cart, GatewayError> {
        self.mutate_cart(
            Method::DELETE,
            &format!("carts/{cart_id}/items/{line_item_id}"),
            None,
        )
        .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn empty_cart(&self, cart_id: &CartId) -> Result<Cart, GatewayError> {
        self.mutate_cart(Method::DELETE, &format!("carts/{cart_id}/items"), None)
            .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn generate_token(&self, cart_id: &CartId) -> Result<TokenGrant, GatewayError> {
        let data: TokenData = self
            .get(&format!("checkouts/{cart_id}"), &[("type", "cart")])
            .await?;
        Ok(convert_token(data))
    }

    #[instrument(skip(self), fields(token_id = %token_id))]
    async fn list_shipping_countries(
        &self,
        token_id: &CheckoutTokenId,
    ) -> Result<Vec<LocaleEntry>, GatewayError> {
        let list: CountryList = self
            .get(&format!("services/locale/{token_id}/countries"), &[])
            .await?;
        Ok(convert_locale_map(list.countries))
    }

    #[instrument(skip(self), fields(token_id = %token_id))]
    async fn list_shipping_subdivisions(
        &self,
        token_id: &CheckoutTokenId,
        country_code: &str,
    ) -> Result<Vec<LocaleEntry>, GatewayError> {
        let list: SubdivisionList = self
            .get(
                &format!("services/locale/{token_id}/countries/{country_code}/subdivisions"),
                &[],
            )
            .await?;
        Ok(convert_locale_map(list.subdivisions))
    }

    #[instrument(skip(self), fields(token_id = %token_id))]
    async fn shipping_options(
        &self,
        token_id: &CheckoutTokenId,
        country_code: &str,
        region_code: &str,
    ) -> Result<Vec<ShippingOption>, GatewayError> {
        let options: Vec<ShippingOptionData> = self
            .get(
                &format!("checkouts/{token_id}/helper/shipping_options"),
                &[("country", country_code), ("region", region_code)],
            )
            .await?;
        Ok(options.into_iter().map(convert_shipping_option).collect())
    }

    #[instrument(skip(self, order), fields(token_id = %token_id))]
    async fn capture(
        &self,
        token_id: &CheckoutTokenId,
        order: &OrderPayload,
    ) -> Result<OrderConfirmation, GatewayError> {
        let body = serde_json::to_value(order)?;
        let data: OrderData = self
            .execute(
                Method::POST,
                &format!("checkouts/{token_id}"),
                &[],
                Some(body),
            )
            .await?;
        Ok(convert_order(data))
    }
}

// =============================================================================
// Response helpers
// =============================================================================

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

/// Extract the error message from an error envelope, falling back to a body
/// excerpt when the body is not the expected shape.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| excerpt(body))
}

fn classify_status(status: StatusCode, path: &str, message: String) -> GatewayError {
    if status == StatusCode::NOT_FOUND {
        GatewayError::NotFound(format!("{path}: {message}"))
    } else if status.is_server_error() {
        GatewayError::Unavailable {
            status: status.as_u16(),
            message,
        }
    } else {
        GatewayError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_envelope() {
        let body = r#"{"status_code": 422, "error": {"type": "unprocessable_entity", "message": "The given data was invalid."}}"#;
        assert_eq!(error_message(body), "The given data was invalid.");
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
        let long = "x".repeat(500);
        assert_eq!(error_message(&long).len(), BODY_EXCERPT_CHARS);
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "carts/c1", String::new()),
            GatewayError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "products", String::new()),
            GatewayError::Unavailable { status: 503, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "checkouts/t1", String::new()),
            GatewayError::Rejected { status: 422, .. }
        ));
    }
}
