//! Product catalog with an in-memory TTL cache.

use std::sync::Arc;

use moka::future::Cache;
use tracing::{debug, instrument};

use shopfront_core::{Product, ProductId};

use crate::config::CatalogConfig;
use crate::error::StorefrontError;
use crate::gateway::CommerceGateway;

/// Cache key for catalog listings.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum CacheKey {
    Products,
}

/// Product list fetched from the gateway.
///
/// The list is cached as a whole and replaced wholesale on refetch; it is
/// never patched.
pub struct Catalog<G> {
    gateway: Arc<G>,
    cache: Cache<CacheKey, Arc<Vec<Product>>>,
}

impl<G: CommerceGateway> Catalog<G> {
    /// Create a catalog backed by `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<G>, config: &CatalogConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(config.cache_ttl)
            .build();

        Self { gateway, cache }
    }

    /// All products, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns the classified gateway error when the list must be fetched
    /// and the fetch fails.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Arc<Vec<Product>>, StorefrontError> {
        if let Some(products) = self.cache.get(&CacheKey::Products).await {
            debug!(count = products.len(), "Catalog served from cache");
            return Ok(products);
        }

        self.refresh().await
    }

    /// Refetch the list and replace the cached copy.
    ///
    /// # Errors
    ///
    /// Returns the classified gateway error; the cached copy is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Arc<Vec<Product>>, StorefrontError> {
        let products = Arc::new(self.gateway.list_products().await?);
        debug!(count = products.len(), "Catalog fetched");

        self.cache
            .insert(CacheKey::Products, Arc::clone(&products))
            .await;
        Ok(products)
    }

    /// Look up a product in the (cached) list.
    ///
    /// # Errors
    ///
    /// Returns the classified gateway error when the list cannot be fetched.
    pub async fn product(&self, id: &ProductId) -> Result<Option<Product>, StorefrontError> {
        let products = self.products().await?;
        Ok(products.iter().find(|p| &p.id == id).cloned())
    }

    /// Drop the cached list.
    pub async fn invalidate(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::gateway::mock::{GatewayCall, MockFailure, MockGateway};

    fn catalog(gateway: &MockGateway) -> Catalog<MockGateway> {
        Catalog::new(
            Arc::new(gateway.clone()),
            &CatalogConfig {
                cache_ttl: Duration::from_secs(60),
            },
        )
    }

    #[tokio::test]
    async fn test_products_are_cached() {
        let gateway = MockGateway::storefront();
        let catalog = catalog(&gateway);

        let first = catalog.products().await.unwrap();
        let second = catalog.products().await.unwrap();

        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(gateway.issued_count(&GatewayCall::ListProducts), 1);
    }

    #[tokio::test]
    async fn test_refresh_refetches() {
        let gateway = MockGateway::storefront();
        let catalog = catalog(&gateway);

        catalog.products().await.unwrap();
        catalog.refresh().await.unwrap();

        assert_eq!(gateway.issued_count(&GatewayCall::ListProducts), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cached_list() {
        let gateway = MockGateway::storefront();
        let catalog = catalog(&gateway);
        catalog.products().await.unwrap();

        gateway.fail_next(GatewayCall::ListProducts, MockFailure::Unavailable);
        assert!(catalog.refresh().await.is_err());

        assert_eq!(catalog.products().await.unwrap().len(), 2);
        assert_eq!(gateway.issued_count(&GatewayCall::ListProducts), 2);
    }

    #[tokio::test]
    async fn test_product_lookup() {
        let gateway = MockGateway::storefront();
        let catalog = catalog(&gateway);

        let mug = catalog
            .product(&ProductId::new("prod_mug"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mug.name, "Mug");
        assert!(
            catalog
                .product(&ProductId::new("prod_missing"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
