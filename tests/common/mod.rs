#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use rocketshoes_cart::{
    handlers::create_cart_router,
    repositories::{FileStore, LocalCartRepository, DEFAULT_CART_KEY},
    services::{CartService, HttpCatalogClient, RecordingNotifier},
};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Stand-in for the storefront's stock/product API
pub struct CatalogMock {
    pub server: MockServer,
}

impl CatalogMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub async fn mount_stock(&self, product_id: u64, amount: u32) {
        Mock::given(method("GET"))
            .and(path(format!("/stock/{}", product_id)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": product_id, "amount": amount })),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mount_product(&self, product_id: u64, title: &str, price: f64) {
        Mock::given(method("GET"))
            .and(path(format!("/products/{}", product_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": product_id,
                "title": title,
                "price": price,
                "image": format!("https://rocketseat-cdn.s3-sa-east-1.amazonaws.com/modulo-redux/tenis{}.jpg", product_id)
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount stock and product responses for a product in one go
    pub async fn mount_shoe(&self, product_id: u64, stock: u32) {
        self.mount_stock(product_id, stock).await;
        self.mount_product(product_id, "Tênis de Caminhada Leve Confortável", 179.9)
            .await;
    }

    pub async fn mount_status(&self, endpoint: &str, product_id: u64, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/{}", endpoint, product_id)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }
}

/// A cart service wired to a mocked catalog and a file store in a temp dir
pub struct CartFixture {
    pub catalog: CatalogMock,
    pub notifier: Arc<RecordingNotifier>,
    pub service: Arc<CartService>,
    pub storage_dir: TempDir,
}

impl CartFixture {
    pub async fn new() -> Self {
        let catalog = CatalogMock::start().await;
        let storage_dir = TempDir::new().expect("Failed to create temp dir");
        let notifier = Arc::new(RecordingNotifier::new());
        let service = Arc::new(
            load_service(&catalog.uri(), &storage_path(&storage_dir), notifier.clone()).await,
        );

        Self {
            catalog,
            notifier,
            service,
            storage_dir,
        }
    }

    pub fn storage_path(&self) -> PathBuf {
        storage_path(&self.storage_dir)
    }

    /// Build a fresh service over the same storage file, as a restart would
    pub async fn reload(&self) -> CartService {
        load_service(
            &self.catalog.uri(),
            &self.storage_path(),
            Arc::new(RecordingNotifier::new()),
        )
        .await
    }

    /// Raw value persisted under the cart key, parsed as JSON
    pub async fn persisted_cart(&self) -> Option<serde_json::Value> {
        let contents = tokio::fs::read_to_string(self.storage_path()).await.ok()?;
        let entries: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&contents).expect("Storage file is not a JSON object");
        let serialized = entries.get(DEFAULT_CART_KEY)?.as_str()?.to_string();
        Some(serde_json::from_str(&serialized).expect("Persisted cart is not JSON"))
    }
}

/// HTTP server exposing the cart router over a [`CartFixture`]
pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub fixture: CartFixture,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let fixture = CartFixture::new().await;
        let app = create_cart_router(fixture.service.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Test server failed");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build client");

        Self {
            client,
            base_url: format!("http://{}", addr),
            fixture,
        }
    }
}

fn storage_path(dir: &TempDir) -> PathBuf {
    dir.path().join("storage.json")
}

async fn load_service(
    catalog_uri: &str,
    storage_path: &PathBuf,
    notifier: Arc<RecordingNotifier>,
) -> CartService {
    let store = Arc::new(FileStore::new(storage_path.clone()));
    let repository = Arc::new(LocalCartRepository::with_default_key(store));
    let catalog = Arc::new(
        HttpCatalogClient::new(catalog_uri, Duration::from_secs(5))
            .expect("Failed to build catalog client"),
    );

    CartService::load(repository, catalog, notifier)
        .await
        .expect("Failed to load cart service")
}
