use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::models::{
    Cart, CartError, CartItem, CartOperation, CartResult, CartSummary, CatalogError,
    StorageError, UpdateProductAmount,
};
use crate::observability::Metrics;
use crate::repositories::CartRepository;
use crate::services::catalog::CatalogApi;
use crate::services::notifier::Notifier;

/// Service owning the shopper's cart.
///
/// Reads are served from memory. Mutations run one at a time, consult the
/// catalog for stock, and persist the new cart before it becomes visible.
pub struct CartService {
    repository: Arc<dyn CartRepository>,
    catalog: Arc<dyn CatalogApi>,
    notifier: Arc<dyn Notifier>,
    metrics: Option<Arc<Metrics>>,
    cart: RwLock<Cart>,
    mutation: Mutex<()>,
}

impl CartService {
    /// Create a CartService around an already loaded cart
    pub fn new(
        repository: Arc<dyn CartRepository>,
        catalog: Arc<dyn CatalogApi>,
        notifier: Arc<dyn Notifier>,
        cart: Cart,
    ) -> Self {
        Self {
            repository,
            catalog,
            notifier,
            metrics: None,
            cart: RwLock::new(cart),
            mutation: Mutex::new(()),
        }
    }

    /// Create a CartService seeded from the persisted cart.
    ///
    /// A missing key starts an empty cart. So does a value that no longer
    /// parses as a cart; it is overwritten by the next successful mutation.
    #[instrument(skip_all)]
    pub async fn load(
        repository: Arc<dyn CartRepository>,
        catalog: Arc<dyn CatalogApi>,
        notifier: Arc<dyn Notifier>,
    ) -> CartResult<Self> {
        let cart = match repository.load_cart().await {
            Ok(Some(cart)) => cart,
            Ok(None) => {
                info!("No persisted cart, starting empty");
                Cart::new()
            }
            Err(StorageError::Serialization(e)) => {
                warn!(error = %e, "Persisted cart is malformed, starting empty");
                Cart::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(items = cart.len(), "Cart initialized");
        Ok(Self::new(repository, catalog, notifier, cart))
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Snapshot of the current cart
    pub async fn cart(&self) -> Cart {
        self.cart.read().await.clone()
    }

    pub async fn summary(&self) -> CartSummary {
        self.cart.read().await.summary()
    }

    /// Add one unit of a product, fetching its details if it is new to the cart
    #[instrument(skip(self))]
    pub async fn add_product(&self, product_id: u64) -> CartResult<()> {
        let result = self.try_add_product(product_id).await;
        self.report(CartOperation::AddProduct, result)
    }

    /// Remove a product from the cart entirely
    #[instrument(skip(self))]
    pub async fn remove_product(&self, product_id: u64) -> CartResult<()> {
        let result = self.try_remove_product(product_id).await;
        self.report(CartOperation::RemoveProduct, result)
    }

    /// Set the quantity of a product already in the cart
    #[instrument(skip(self, request), fields(product_id = request.product_id, amount = request.amount))]
    pub async fn update_product_amount(&self, request: UpdateProductAmount) -> CartResult<()> {
        let result = self.try_update_product_amount(request).await;
        self.report(CartOperation::UpdateProductAmount, result)
    }

    async fn try_add_product(&self, product_id: u64) -> CartResult<()> {
        let _guard = self.mutation.lock().await;

        let stock = self.catalog.get_stock(product_id).await?;
        if stock.amount < 1 {
            return Err(CartError::StockUnavailable {
                product_id,
                requested: 1,
                available: stock.amount,
            });
        }

        let current = self.cart().await;
        let updated = match current.get_item(product_id) {
            Some(item) => {
                let requested = item.amount.saturating_add(1);
                if requested > stock.amount {
                    return Err(CartError::StockUnavailable {
                        product_id,
                        requested,
                        available: stock.amount,
                    });
                }
                current.with_item_incremented(product_id)
            }
            None => {
                let product = self.catalog.get_product(product_id).await?;
                if product.id != product_id {
                    return Err(CatalogError::Decode {
                        message: format!(
                            "requested product {} but catalog returned {}",
                            product_id, product.id
                        ),
                    }
                    .into());
                }
                current.with_item_appended(CartItem::from_product(product))
            }
        };

        self.commit(updated).await
    }

    async fn try_remove_product(&self, product_id: u64) -> CartResult<()> {
        let _guard = self.mutation.lock().await;

        let updated = self
            .cart()
            .await
            .without_item(product_id)
            .ok_or(CartError::NotFound { product_id })?;

        self.commit(updated).await
    }

    async fn try_update_product_amount(&self, request: UpdateProductAmount) -> CartResult<()> {
        let UpdateProductAmount { product_id, amount } = request;
        let _guard = self.mutation.lock().await;

        let current = self.cart().await;
        if !current.contains_item(product_id) {
            return Err(CartError::NotFound { product_id });
        }

        // Removal goes through remove_product; amounts below one are ignored here.
        if amount < 1 {
            debug!("Requested amount below one, leaving cart unchanged");
            return Ok(());
        }

        let stock = self.catalog.get_stock(product_id).await?;
        if amount > stock.amount {
            return Err(CartError::StockUnavailable {
                product_id,
                requested: amount,
                available: stock.amount,
            });
        }

        self.commit(current.with_item_amount(product_id, amount)).await
    }

    /// Persist `updated` and make it the visible cart.
    ///
    /// The write lock is held across the save so readers observe either the
    /// old cart or the new one, never a cart that failed to persist.
    async fn commit(&self, updated: Cart) -> CartResult<()> {
        let mut cart = self.cart.write().await;

        let saved = self.repository.save_cart(&updated).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_storage_write(saved.is_ok());
        }
        saved?;

        if let Some(metrics) = &self.metrics {
            metrics.set_cart_items(updated.len());
        }
        *cart = updated;
        Ok(())
    }

    fn report(&self, operation: CartOperation, result: CartResult<()>) -> CartResult<()> {
        if let Some(metrics) = &self.metrics {
            metrics.record_cart_operation(operation.as_str(), result.is_ok());
        }

        match &result {
            Ok(()) => info!(operation = %operation, "Cart operation completed"),
            Err(err) => {
                warn!(
                    operation = %operation,
                    kind = %err.kind(),
                    error = %err,
                    "Cart operation rejected"
                );
                self.notifier.error(err.notification(operation));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CartErrorKind, CatalogResult, Product, Stock, StorageResult, MSG_ADD_FAILED,
        MSG_REMOVE_FAILED, MSG_STOCK_UNAVAILABLE, MSG_UPDATE_FAILED,
    };
    use crate::repositories::{InMemoryStore, KeyValueStore, LocalCartRepository, DEFAULT_CART_KEY};
    use crate::services::notifier::RecordingNotifier;
    use async_trait::async_trait;
    use mockall::{mock, predicate::eq};
    use rust_decimal_macros::dec;

    mock! {
        TestCatalog {}

        #[async_trait]
        impl CatalogApi for TestCatalog {
            async fn get_stock(&self, product_id: u64) -> CatalogResult<Stock>;
            async fn get_product(&self, product_id: u64) -> CatalogResult<Product>;
        }
    }

    mock! {
        TestCartRepository {}

        #[async_trait]
        impl CartRepository for TestCartRepository {
            async fn load_cart(&self) -> StorageResult<Option<Cart>>;
            async fn save_cart(&self, cart: &Cart) -> StorageResult<()>;
        }
    }

    fn sneaker(id: u64, amount: u32) -> CartItem {
        CartItem {
            id,
            title: format!("Tênis {}", id),
            price: dec!(179.9),
            image: format!("https://cdn.example.com/{}.jpg", id),
            amount,
        }
    }

    fn product(id: u64) -> Product {
        Product {
            id,
            title: format!("Tênis {}", id),
            price: dec!(179.9),
            image: format!("https://cdn.example.com/{}.jpg", id),
        }
    }

    fn expect_stock(catalog: &mut MockTestCatalog, product_id: u64, amount: u32) {
        catalog
            .expect_get_stock()
            .with(eq(product_id))
            .times(1)
            .returning(move |id| Ok(Stock { id, amount }));
    }

    struct Harness {
        service: CartService,
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        async fn new(catalog: MockTestCatalog, items: Vec<CartItem>) -> Self {
            let store = Arc::new(InMemoryStore::new());
            let repository = Arc::new(LocalCartRepository::with_default_key(store.clone()));
            if !items.is_empty() {
                repository.save_cart(&Cart::from_items(items)).await.unwrap();
            }
            let notifier = Arc::new(RecordingNotifier::new());

            let service = CartService::load(repository, Arc::new(catalog), notifier.clone())
                .await
                .unwrap();

            Self {
                service,
                store,
                notifier,
            }
        }

        async fn persisted(&self) -> Option<String> {
            self.store.get(DEFAULT_CART_KEY).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_load_empty_store() {
        let harness = Harness::new(MockTestCatalog::new(), vec![]).await;

        assert!(harness.service.cart().await.is_empty());
        assert_eq!(harness.persisted().await, None);
    }

    #[tokio::test]
    async fn test_load_malformed_cart_starts_empty() {
        let store = Arc::new(InMemoryStore::with_entry(DEFAULT_CART_KEY, "not a cart"));
        let repository = Arc::new(LocalCartRepository::with_default_key(store));

        let service = CartService::load(
            repository,
            Arc::new(MockTestCatalog::new()),
            Arc::new(RecordingNotifier::new()),
        )
        .await
        .unwrap();

        assert!(service.cart().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_propagates_store_failure() {
        let mut repository = MockTestCartRepository::new();
        repository.expect_load_cart().times(1).returning(|| {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )))
        });

        let result = CartService::load(
            Arc::new(repository),
            Arc::new(MockTestCatalog::new()),
            Arc::new(RecordingNotifier::new()),
        )
        .await;

        match result {
            Err(CartError::Storage { .. }) => {}
            _ => panic!("Expected Storage error"),
        }
    }

    #[tokio::test]
    async fn test_add_to_empty_cart() {
        let mut catalog = MockTestCatalog::new();
        expect_stock(&mut catalog, 1, 5);
        catalog
            .expect_get_product()
            .with(eq(1))
            .times(1)
            .returning(|id| Ok(product(id)));
        let harness = Harness::new(catalog, vec![]).await;

        harness.service.add_product(1).await.unwrap();

        let cart = harness.service.cart().await;
        assert_eq!(cart.items(), &[sneaker(1, 1)]);
        assert_eq!(
            harness.persisted().await,
            Some(serde_json::to_string(&cart).unwrap())
        );
        assert!(harness.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_add_appends_new_product_at_end() {
        let mut catalog = MockTestCatalog::new();
        expect_stock(&mut catalog, 2, 3);
        catalog
            .expect_get_product()
            .with(eq(2))
            .times(1)
            .returning(|id| Ok(product(id)));
        let harness = Harness::new(catalog, vec![sneaker(7, 2)]).await;

        harness.service.add_product(2).await.unwrap();

        let ids: Vec<u64> = harness
            .service
            .cart()
            .await
            .items()
            .iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec![7, 2]);
    }

    #[tokio::test]
    async fn test_add_existing_item_under_stock_limit() {
        let mut catalog = MockTestCatalog::new();
        expect_stock(&mut catalog, 1, 5);
        catalog.expect_get_product().times(0);
        let harness = Harness::new(catalog, vec![sneaker(1, 1)]).await;

        harness.service.add_product(1).await.unwrap();

        assert_eq!(harness.service.cart().await.items(), &[sneaker(1, 2)]);
    }

    #[tokio::test]
    async fn test_add_existing_item_at_stock_limit() {
        let mut catalog = MockTestCatalog::new();
        expect_stock(&mut catalog, 1, 2);
        let harness = Harness::new(catalog, vec![sneaker(1, 2)]).await;
        let before = harness.persisted().await;

        let result = harness.service.add_product(1).await;

        match result {
            Err(CartError::StockUnavailable {
                product_id,
                requested,
                available,
            }) => {
                assert_eq!(product_id, 1);
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            _ => panic!("Expected StockUnavailable error"),
        }
        assert_eq!(harness.service.cart().await.items(), &[sneaker(1, 2)]);
        assert_eq!(harness.persisted().await, before);
        assert_eq!(harness.notifier.messages(), vec![MSG_STOCK_UNAVAILABLE]);
    }

    #[tokio::test]
    async fn test_add_out_of_stock_product() {
        let mut catalog = MockTestCatalog::new();
        expect_stock(&mut catalog, 4, 0);
        catalog.expect_get_product().times(0);
        let harness = Harness::new(catalog, vec![]).await;

        let result = harness.service.add_product(4).await;

        assert_eq!(
            result.unwrap_err().kind(),
            CartErrorKind::StockUnavailable
        );
        assert!(harness.service.cart().await.is_empty());
        assert_eq!(harness.persisted().await, None);
        assert_eq!(harness.notifier.messages(), vec![MSG_STOCK_UNAVAILABLE]);
    }

    #[tokio::test]
    async fn test_add_lookup_failure() {
        let mut catalog = MockTestCatalog::new();
        catalog
            .expect_get_stock()
            .times(1)
            .returning(|_| Err(CatalogError::Timeout));
        let harness = Harness::new(catalog, vec![sneaker(1, 1)]).await;

        let result = harness.service.add_product(1).await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(harness.service.cart().await.items(), &[sneaker(1, 1)]);
        assert_eq!(harness.notifier.messages(), vec![MSG_ADD_FAILED]);
    }

    #[tokio::test]
    async fn test_add_product_lookup_failure_leaves_cart_unchanged() {
        let mut catalog = MockTestCatalog::new();
        expect_stock(&mut catalog, 9, 10);
        catalog.expect_get_product().times(1).returning(|_| {
            Err(CatalogError::Status {
                status: 404,
                url: "http://localhost:3333/products/9".to_string(),
            })
        });
        let harness = Harness::new(catalog, vec![]).await;

        let result = harness.service.add_product(9).await;

        assert!(matches!(result, Err(CartError::Catalog { .. })));
        assert!(harness.service.cart().await.is_empty());
        assert_eq!(harness.persisted().await, None);
        assert_eq!(harness.notifier.messages(), vec![MSG_ADD_FAILED]);
    }

    #[tokio::test]
    async fn test_add_rejects_mismatched_product() {
        let mut catalog = MockTestCatalog::new();
        expect_stock(&mut catalog, 1, 10);
        catalog
            .expect_get_product()
            .times(1)
            .returning(|_| Ok(product(2)));
        let harness = Harness::new(catalog, vec![]).await;

        let result = harness.service.add_product(1).await;

        assert!(matches!(
            result,
            Err(CartError::Catalog {
                source: CatalogError::Decode { .. }
            })
        ));
        assert!(harness.service.cart().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_existing() {
        let harness = Harness::new(MockTestCatalog::new(), vec![sneaker(1, 1), sneaker(2, 1)]).await;

        harness.service.remove_product(1).await.unwrap();

        let cart = harness.service.cart().await;
        assert_eq!(cart.items(), &[sneaker(2, 1)]);
        assert_eq!(
            harness.persisted().await,
            Some(serde_json::to_string(&cart).unwrap())
        );
    }

    #[tokio::test]
    async fn test_remove_preserves_order() {
        let harness = Harness::new(
            MockTestCatalog::new(),
            vec![sneaker(1, 1), sneaker(2, 3), sneaker(3, 2)],
        )
        .await;

        harness.service.remove_product(2).await.unwrap();

        assert_eq!(
            harness.service.cart().await.items(),
            &[sneaker(1, 1), sneaker(3, 2)]
        );
    }

    #[tokio::test]
    async fn test_remove_missing() {
        let harness = Harness::new(MockTestCatalog::new(), vec![sneaker(2, 1)]).await;
        let before = harness.persisted().await;

        let result = harness.service.remove_product(1).await;

        assert!(matches!(result, Err(CartError::NotFound { product_id: 1 })));
        assert_eq!(harness.service.cart().await.items(), &[sneaker(2, 1)]);
        assert_eq!(harness.persisted().await, before);
        assert_eq!(harness.notifier.messages(), vec![MSG_REMOVE_FAILED]);
    }

    #[tokio::test]
    async fn test_remove_persistence_failure_keeps_memory() {
        let mut repository = MockTestCartRepository::new();
        repository
            .expect_save_cart()
            .times(1)
            .returning(|_| Err(StorageError::Io(std::io::Error::other("disk full"))));
        let notifier = Arc::new(RecordingNotifier::new());
        let service = CartService::new(
            Arc::new(repository),
            Arc::new(MockTestCatalog::new()),
            notifier.clone(),
            Cart::from_items(vec![sneaker(1, 1)]),
        );

        let result = service.remove_product(1).await;

        assert!(matches!(result, Err(CartError::Storage { .. })));
        assert_eq!(service.cart().await.items(), &[sneaker(1, 1)]);
        assert_eq!(notifier.messages(), vec![MSG_REMOVE_FAILED]);
    }

    #[tokio::test]
    async fn test_update_amount_within_stock() {
        let mut catalog = MockTestCatalog::new();
        expect_stock(&mut catalog, 1, 10);
        let harness = Harness::new(catalog, vec![sneaker(1, 2)]).await;

        harness
            .service
            .update_product_amount(UpdateProductAmount {
                product_id: 1,
                amount: 5,
            })
            .await
            .unwrap();

        let cart = harness.service.cart().await;
        assert_eq!(cart.items(), &[sneaker(1, 5)]);
        assert_eq!(
            harness.persisted().await,
            Some(serde_json::to_string(&cart).unwrap())
        );
    }

    #[tokio::test]
    async fn test_update_amount_exceeding_stock() {
        let mut catalog = MockTestCatalog::new();
        expect_stock(&mut catalog, 1, 3);
        let harness = Harness::new(catalog, vec![sneaker(1, 2)]).await;
        let before = harness.persisted().await;

        let result = harness
            .service
            .update_product_amount(UpdateProductAmount {
                product_id: 1,
                amount: 4,
            })
            .await;

        match result {
            Err(CartError::StockUnavailable {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            _ => panic!("Expected StockUnavailable error"),
        }
        assert_eq!(harness.service.cart().await.items(), &[sneaker(1, 2)]);
        assert_eq!(harness.persisted().await, before);
        assert_eq!(harness.notifier.messages(), vec![MSG_STOCK_UNAVAILABLE]);
    }

    #[tokio::test]
    async fn test_update_floor_guard_is_pure_noop() {
        let mut catalog = MockTestCatalog::new();
        catalog.expect_get_stock().times(0);
        let mut repository = MockTestCartRepository::new();
        repository.expect_save_cart().times(0);
        let notifier = Arc::new(RecordingNotifier::new());
        let service = CartService::new(
            Arc::new(repository),
            Arc::new(catalog),
            notifier.clone(),
            Cart::from_items(vec![sneaker(1, 1)]),
        );

        let result = service
            .update_product_amount(UpdateProductAmount {
                product_id: 1,
                amount: 0,
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(service.cart().await.items(), &[sneaker(1, 1)]);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_update_to_zero_never_stores_empty_item() {
        let mut catalog = MockTestCatalog::new();
        catalog.expect_get_stock().times(0);
        let harness = Harness::new(catalog, vec![sneaker(1, 4)]).await;

        harness
            .service
            .update_product_amount(UpdateProductAmount {
                product_id: 1,
                amount: 0,
            })
            .await
            .unwrap();

        assert_eq!(harness.service.cart().await.items(), &[sneaker(1, 4)]);
    }

    #[tokio::test]
    async fn test_update_missing_short_circuits() {
        let mut catalog = MockTestCatalog::new();
        catalog.expect_get_stock().times(0);
        let harness = Harness::new(catalog, vec![sneaker(2, 1)]).await;

        let result = harness
            .service
            .update_product_amount(UpdateProductAmount {
                product_id: 1,
                amount: 0,
            })
            .await;

        assert!(matches!(result, Err(CartError::NotFound { product_id: 1 })));
        assert_eq!(harness.notifier.messages(), vec![MSG_UPDATE_FAILED]);
    }

    #[tokio::test]
    async fn test_update_lookup_failure() {
        let mut catalog = MockTestCatalog::new();
        catalog.expect_get_stock().times(1).returning(|_| {
            Err(CatalogError::Decode {
                message: "expected value at line 1 column 1".to_string(),
            })
        });
        let harness = Harness::new(catalog, vec![sneaker(1, 2)]).await;

        let result = harness
            .service
            .update_product_amount(UpdateProductAmount {
                product_id: 1,
                amount: 3,
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), CartErrorKind::TransientFailure);
        assert_eq!(harness.service.cart().await.items(), &[sneaker(1, 2)]);
        assert_eq!(harness.notifier.messages(), vec![MSG_UPDATE_FAILED]);
    }

    #[tokio::test]
    async fn test_repeated_reads_are_equal() {
        let harness = Harness::new(MockTestCatalog::new(), vec![sneaker(1, 2), sneaker(3, 1)]).await;

        let first = harness.service.cart().await;
        let second = harness.service.cart().await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_summary() {
        let harness = Harness::new(MockTestCatalog::new(), vec![sneaker(1, 2), sneaker(3, 1)]).await;

        let summary = harness.service.summary().await;

        assert_eq!(summary.distinct_items, 2);
        assert_eq!(summary.total_items, 3);
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let harness = Harness::new(MockTestCatalog::new(), vec![sneaker(1, 1)]).await;
        let service = harness.service.with_metrics(metrics.clone());

        service.remove_product(1).await.unwrap();
        let _ = service.remove_product(1).await;

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("cart_operations_total"));
        assert!(encoded.contains("storage_writes_total"));
    }
}
