use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::models::{CatalogError, CatalogResult, Product, Stock};
use crate::observability::Metrics;

/// Read-only view of the remote stock/product API
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetch the maximum purchasable quantity for a product
    async fn get_stock(&self, product_id: u64) -> CatalogResult<Stock>;

    /// Fetch catalog metadata for a product
    async fn get_product(&self, product_id: u64) -> CatalogResult<Product>;
}

/// HTTP client for `GET stock/{id}` and `GET products/{id}`
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
    metrics: Option<Arc<Metrics>>,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CatalogResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Request {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, product_id: u64) -> CatalogResult<T> {
        let url = format!("{}/{}/{}", self.base_url, endpoint, product_id);
        let start_time = Instant::now();

        let result = self.send::<T>(&url).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_catalog_request(
                endpoint,
                result.is_ok(),
                start_time.elapsed().as_secs_f64(),
            );
        }

        match &result {
            Ok(_) => debug!(url = %url, "Catalog request succeeded"),
            Err(e) => warn!(url = %url, error = %e, "Catalog request failed"),
        }

        result
    }

    async fn send<T: DeserializeOwned>(&self, url: &str) -> CatalogResult<T> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| CatalogError::Decode {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    #[instrument(skip(self))]
    async fn get_stock(&self, product_id: u64) -> CatalogResult<Stock> {
        self.fetch("stock", product_id).await
    }

    #[instrument(skip(self))]
    async fn get_product(&self, product_id: u64) -> CatalogResult<Product> {
        self.fetch("products", product_id).await
    }
}
