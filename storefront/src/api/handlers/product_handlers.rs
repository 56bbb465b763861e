use axum::{Json, extract::State};
use std::sync::Arc;

use crate::api::extract::ApiPath;
use crate::app_state::AppState;
use crate::domain::models::Product;
use crate::error::AppError;

pub async fn list_products(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Product>>, AppError> {
    let products = state.catalog_service.list_products().await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Product>, AppError> {
    let product = state.catalog_service.get_product(id).await?;
    Ok(Json(product))
}
