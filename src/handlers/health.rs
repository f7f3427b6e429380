use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::instrument;

use super::cart::CartHandlerState;

/// Health check endpoint handler
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<CartHandlerState>) -> Result<Json<Value>, StatusCode> {
    let summary = state.cart_service.summary().await;

    Ok(Json(json!({
        "status": "healthy",
        "service": "rocketshoes-cart",
        "version": env!("CARGO_PKG_VERSION"),
        "cart_items": summary.distinct_items,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
