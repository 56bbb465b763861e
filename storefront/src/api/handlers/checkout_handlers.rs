use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::extract::ApiJson;
use crate::app_state::AppState;
use crate::error::AppError;
use crate::services::CheckoutHandle;

/// 前端下单请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub product_id: Value,
    #[serde(default)]
    pub quantity: Value,
    #[serde(default)]
    pub coupon: Option<String>,
}

impl CreateCheckoutRequest {
    /// 商品 ID 接受数字或数字字符串
    pub fn product_id(&self) -> Result<i64, AppError> {
        let parsed = match &self.product_id {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| AppError::invalid_input("productId must be an integer"))
    }

    /// 数量必须是正整数，2.0 这类无小数部分的数字也接受
    pub fn quantity(&self) -> Result<i64, AppError> {
        let parsed = match &self.quantity {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };

        match parsed {
            Some(quantity) if quantity > 0 => Ok(quantity),
            _ => Err(AppError::invalid_quantity("Quantity must be a positive integer")),
        }
    }
}

pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CreateCheckoutRequest>,
) -> Result<Json<CheckoutHandle>, AppError> {
    let quantity = request.quantity()?;
    let product_id = request.product_id()?;

    let handle = state
        .checkout_service
        .initiate_checkout(product_id, quantity, request.coupon.as_deref())
        .await?;

    Ok(Json(handle))
}
