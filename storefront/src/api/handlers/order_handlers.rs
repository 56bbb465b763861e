use axum::{Json, extract::State};
use std::sync::Arc;

use crate::api::extract::ApiPath;
use crate::app_state::AppState;
use crate::domain::models::Order;
use crate::error::AppError;

// 支付跳转回来后前端轮询订单状态
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Order>, AppError> {
    let order = state.checkout_service.get_order(id).await?;
    Ok(Json(order))
}
