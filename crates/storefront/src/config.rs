//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHEC_PUBLIC_KEY` - Commerce gateway public API key
//!
//! ## Optional
//! - `CHEC_API_URL` - Gateway base URL (default: <https://api.chec.io/v1>)
//! - `CHEC_REQUEST_TIMEOUT_MS` - Per-call timeout in milliseconds (default: 10000)
//! - `CHEC_PRODUCT_PAGE_LIMIT` - Products fetched per catalog load (default: 100)
//! - `CHEC_PRODUCT_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "https://api.chec.io/v1";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PRODUCT_PAGE_LIMIT: u32 = 100;
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 300;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Commerce gateway connection settings
    pub gateway: GatewayConfig,
    /// Product catalog cache settings
    pub catalog: CatalogConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Commerce gateway connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL of the REST API (no trailing slash required)
    pub api_url: Url,
    /// Public API key sent as `X-Authorization`
    pub public_key: SecretString,
    /// Deadline applied to every gateway call
    pub request_timeout: Duration,
    /// Page size for product listing
    pub product_page_limit: u32,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_url", &self.api_url.as_str())
            .field("public_key", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .field("product_page_limit", &self.product_page_limit)
            .finish()
    }
}

/// Product catalog cache settings.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// How long a fetched product list is served before refetching
    pub cache_ttl: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_PRODUCT_CACHE_TTL_SECS),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let gateway = GatewayConfig::from_env()?;
        let catalog = CatalogConfig {
            cache_ttl: Duration::from_secs(get_parsed_env(
                "CHEC_PRODUCT_CACHE_TTL_SECS",
                DEFAULT_PRODUCT_CACHE_TTL_SECS,
            )?),
        };
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            gateway,
            catalog,
            sentry_dsn,
        })
    }
}

impl GatewayConfig {
    /// Create a configuration with default timeout and page size.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_url` does not parse.
    pub fn new(api_url: &str, public_key: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url("CHEC_API_URL", api_url)?,
            public_key: SecretString::from(public_key.into()),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            product_page_limit: DEFAULT_PRODUCT_PAGE_LIMIT,
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let api_url = get_env_or_default("CHEC_API_URL", DEFAULT_API_URL);
        let request_timeout_ms =
            get_parsed_env("CHEC_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        if request_timeout_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CHEC_REQUEST_TIMEOUT_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_url: parse_api_url("CHEC_API_URL", &api_url)?,
            public_key: get_validated_secret("CHEC_PUBLIC_KEY")?,
            request_timeout: Duration::from_millis(request_timeout_ms),
            product_page_limit: get_parsed_env(
                "CHEC_PRODUCT_PAGE_LIMIT",
                DEFAULT_PRODUCT_PAGE_LIMIT,
            )?,
        })
    }

    /// Build the URL for an API path relative to `api_url`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn public_key(&self) -> &str {
        self.public_key.expose_secret()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn get_parsed_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Parse and sanity-check the gateway base URL.
fn parse_api_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // Key length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that an API key is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the merchant dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("pk_your-key-here", "CHEC_PUBLIC_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("pk_aaaaaaaaaaaaaaaaaaaaaaaa", "CHEC_PUBLIC_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_real_looking_key() {
        let result = validate_secret_strength(
            "pk_184625ed86f36703d7d233bcf6d519a4f9398f20048ec",
            "CHEC_PUBLIC_KEY",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_api_url_rejects_other_schemes() {
        assert!(parse_api_url("CHEC_API_URL", "ftp://api.chec.io/v1").is_err());
        assert!(parse_api_url("CHEC_API_URL", "not a url").is_err());
        assert!(parse_api_url("CHEC_API_URL", "https://api.chec.io/v1").is_ok());
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let config = GatewayConfig::new("https://api.chec.io/v1/", "pk_test").unwrap();
        assert_eq!(
            config.endpoint("/carts/cart_1"),
            "https://api.chec.io/v1/carts/cart_1"
        );

        let config = GatewayConfig::new("https://api.chec.io/v1", "pk_test").unwrap();
        assert_eq!(config.endpoint("products"), "https://api.chec.io/v1/products");
    }

    #[test]
    fn test_gateway_config_debug_redacts_key() {
        let config = GatewayConfig::new("https://api.chec.io/v1", "pk_super_secret_value").unwrap();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("api.chec.io"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("pk_super_secret_value"));
    }
}
