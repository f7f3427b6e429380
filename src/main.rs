use axum::{middleware, routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use rocketshoes_cart::{
    handlers::{create_cart_router, health_check, metrics_handler, CartHandlerState},
    init_observability,
    observability::{observability_middleware, Metrics},
    repositories::{FileStore, LocalCartRepository},
    services::{CartService, HttpCatalogClient, TracingNotifier},
    shutdown_observability, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_environment()?;

    init_observability(&config.observability)?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Catalog API: {}", config.catalog.api_base_url);
    info!(
        "Storage: {} (key {})",
        config.storage.storage_path.display(),
        config.storage.cart_key
    );

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    let store = Arc::new(FileStore::new(config.storage.storage_path.clone()));
    let repository = Arc::new(LocalCartRepository::new(
        store,
        config.storage.cart_key.clone(),
    ));

    let catalog = Arc::new(
        HttpCatalogClient::new(
            config.catalog.api_base_url.clone(),
            config.catalog.request_timeout(),
        )?
        .with_metrics(metrics.clone()),
    );

    let cart_service = Arc::new(
        CartService::load(repository, catalog, Arc::new(TracingNotifier))
            .await?
            .with_metrics(metrics.clone()),
    );
    info!(
        "Cart restored with {} items",
        cart_service.summary().await.distinct_items
    );

    let app = create_app(metrics, cart_service);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
    shutdown_observability().await;
}

fn create_app(metrics: Arc<Metrics>, cart_service: Arc<CartService>) -> Router {
    let metrics_for_middleware = metrics.clone();
    let health_state = CartHandlerState {
        cart_service: cart_service.clone(),
    };

    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .route("/health/status", get(health_check))
        .with_state(health_state)
        .merge(create_cart_router(cart_service))
        // Outermost layer last
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}
