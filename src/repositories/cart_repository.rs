use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::store::KeyValueStore;
use crate::models::{Cart, StorageResult};

/// Key the storefront has always used for the persisted cart
pub const DEFAULT_CART_KEY: &str = "@RocketShoes:cart";

/// Trait defining the interface for cart persistence
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Load the persisted cart, or `None` if nothing was ever saved
    async fn load_cart(&self) -> StorageResult<Option<Cart>>;

    /// Replace the persisted cart
    async fn save_cart(&self, cart: &Cart) -> StorageResult<()>;
}

/// Cart persisted as JSON under a single key of a [`KeyValueStore`]
pub struct LocalCartRepository {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl LocalCartRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Repository using [`DEFAULT_CART_KEY`]
    pub fn with_default_key(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, DEFAULT_CART_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl CartRepository for LocalCartRepository {
    #[instrument(skip(self), fields(key = %self.key))]
    async fn load_cart(&self) -> StorageResult<Option<Cart>> {
        let Some(serialized) = self.store.get(&self.key).await? else {
            debug!("No persisted cart");
            return Ok(None);
        };

        let cart: Cart = serde_json::from_str(&serialized)?;
        info!(items = cart.len(), "Loaded persisted cart");
        Ok(Some(cart))
    }

    #[instrument(skip(self, cart), fields(key = %self.key, items = cart.len()))]
    async fn save_cart(&self, cart: &Cart) -> StorageResult<()> {
        let serialized = serde_json::to_string(cart)?;
        self.store.set(&self.key, &serialized).await?;
        debug!("Persisted cart");
        Ok(())
    }
}
