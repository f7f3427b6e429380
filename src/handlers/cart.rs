use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    AddProductRequest, CartError, CartItem, CartOperation, CartSummary, UpdateAmountRequest,
    UpdateProductAmount,
};
use crate::services::CartService;

/// State for cart handlers
#[derive(Clone)]
pub struct CartHandlerState {
    pub cart_service: Arc<CartService>,
}

type HandlerError = (StatusCode, Json<Value>);

/// Create cart router with all endpoints
pub fn create_cart_router(cart_service: Arc<CartService>) -> Router {
    let state = CartHandlerState { cart_service };

    Router::new()
        .route("/api/cart", get(get_cart))
        .route("/api/cart/summary", get(get_cart_summary))
        .route("/api/cart/items", axum::routing::post(add_product))
        .route(
            "/api/cart/items/:product_id",
            put(update_product_amount).delete(remove_product),
        )
        .with_state(state)
}

/// Current cart contents, in insertion order
#[instrument(skip(state))]
pub async fn get_cart(State(state): State<CartHandlerState>) -> Json<Vec<CartItem>> {
    Json(state.cart_service.cart().await.into_items())
}

#[instrument(skip(state))]
pub async fn get_cart_summary(State(state): State<CartHandlerState>) -> Json<CartSummary> {
    Json(state.cart_service.summary().await)
}

#[instrument(skip(state, request), fields(product_id = request.product_id))]
pub async fn add_product(
    State(state): State<CartHandlerState>,
    Json(request): Json<AddProductRequest>,
) -> Result<StatusCode, HandlerError> {
    state
        .cart_service
        .add_product(request.product_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|err| cart_error_to_response(CartOperation::AddProduct, err))
}

#[instrument(skip(state, request), fields(amount = request.amount))]
pub async fn update_product_amount(
    State(state): State<CartHandlerState>,
    Path(product_id): Path<u64>,
    Json(request): Json<UpdateAmountRequest>,
) -> Result<StatusCode, HandlerError> {
    let update = UpdateProductAmount {
        product_id,
        amount: request.amount,
    };

    state
        .cart_service
        .update_product_amount(update)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|err| cart_error_to_response(CartOperation::UpdateProductAmount, err))
}

#[instrument(skip(state))]
pub async fn remove_product(
    State(state): State<CartHandlerState>,
    Path(product_id): Path<u64>,
) -> Result<StatusCode, HandlerError> {
    state
        .cart_service
        .remove_product(product_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|err| cart_error_to_response(CartOperation::RemoveProduct, err))
}

/// Map a cart error to a status code and the notification shown to the shopper
fn cart_error_to_response(operation: CartOperation, err: CartError) -> HandlerError {
    let status = match &err {
        CartError::StockUnavailable { .. } => StatusCode::CONFLICT,
        CartError::NotFound { .. } => StatusCode::NOT_FOUND,
        CartError::Catalog { .. } => StatusCode::BAD_GATEWAY,
        CartError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(json!({
            "error": err.notification(operation),
            "kind": err.kind(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
