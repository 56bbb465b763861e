use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::app_state::AppState;
use crate::error::AppError;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

// 需要原始请求体验签，不能先按 JSON 解析
pub async fn handle_payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());

    let outcome = state
        .fulfillment_service
        .handle_payment_notification(&body, signature)
        .await
        .map_err(|e| {
            log_rejection(&e);
            e
        })?;

    debug!(?outcome, "Payment notification handled");

    Ok(Json(WebhookAck { received: true }))
}

// 验签失败等 4xx 由外部请求触发，只在服务端故障时记 error
fn log_rejection(e: &AppError) -> bool {
    let server_side = e.status_code().is_server_error();
    if server_side {
        error!("Failed to process payment notification: {}", e);
    } else {
        debug!("Payment notification rejected: {}", e);
    }
    server_side
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::SignatureError;

    #[test]
    fn test_only_server_failures_logged_as_errors() {
        assert!(!log_rejection(&AppError::Verification(SignatureError::Mismatch)));
        assert!(!log_rejection(&AppError::Verification(SignatureError::MissingSecret)));
        assert!(!log_rejection(&AppError::invalid_input("Malformed notification payload")));
        assert!(log_rejection(&AppError::internal("database unavailable")));
    }
}
