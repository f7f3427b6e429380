use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

/// Prometheus metrics for the cart service
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // HTTP metrics
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // Cart metrics
    pub cart_operations_total: CounterVec,
    pub cart_items: Gauge,

    // Collaborator metrics
    pub catalog_requests_total: CounterVec,
    pub catalog_request_duration_seconds: HistogramVec,
    pub storage_writes_total: IntCounterVec,
}

impl Metrics {
    /// Create a new metrics instance with all required metrics registered
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        info!("Initializing Prometheus metrics");

        let http_requests_total = CounterVec::new(
            Opts::new(
                "http_requests_total",
                "Total number of HTTP requests processed",
            ),
            &["method", "endpoint", "status_code"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "endpoint"],
        )?;

        let cart_operations_total = CounterVec::new(
            Opts::new("cart_operations_total", "Total number of cart operations"),
            &["operation", "status"],
        )?;

        let cart_items = Gauge::new("cart_items", "Number of distinct products in the cart")?;

        let catalog_requests_total = CounterVec::new(
            Opts::new(
                "catalog_requests_total",
                "Total number of stock/product API requests",
            ),
            &["endpoint", "status"],
        )?;

        let catalog_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "catalog_request_duration_seconds",
                "Stock/product API request duration in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["endpoint"],
        )?;

        let storage_writes_total = IntCounterVec::new(
            Opts::new("storage_writes_total", "Total number of cart persistence writes"),
            &["status"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(cart_operations_total.clone()))?;
        registry.register(Box::new(cart_items.clone()))?;
        registry.register(Box::new(catalog_requests_total.clone()))?;
        registry.register(Box::new(catalog_request_duration_seconds.clone()))?;
        registry.register(Box::new(storage_writes_total.clone()))?;

        info!("Prometheus metrics initialized successfully");

        Ok(Metrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            cart_operations_total,
            cart_items,
            catalog_requests_total,
            catalog_request_duration_seconds,
            storage_writes_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    pub fn record_http_request(
        &self,
        method: &str,
        endpoint: &str,
        status_code: u16,
        duration_seconds: f64,
    ) {
        let status_str = status_code.to_string();

        self.http_requests_total
            .with_label_values(&[method, endpoint, &status_str])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration_seconds);
    }

    pub fn record_cart_operation(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };

        self.cart_operations_total
            .with_label_values(&[operation, status])
            .inc();
    }

    pub fn record_catalog_request(&self, endpoint: &str, success: bool, duration_seconds: f64) {
        let status = if success { "success" } else { "error" };

        self.catalog_requests_total
            .with_label_values(&[endpoint, status])
            .inc();

        self.catalog_request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_seconds);
    }

    pub fn record_storage_write(&self, success: bool) {
        let status = if success { "success" } else { "error" };

        self.storage_writes_total.with_label_values(&[status]).inc();
    }

    pub fn set_cart_items(&self, count: usize) {
        self.cart_items.set(count as f64);
    }
}
