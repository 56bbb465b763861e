use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentGateway};
use crate::config::PaymentConfig;

const CHECKOUT_SESSIONS_PATH: &str = "/v1/checkout/sessions";

/// Stripe Checkout 接口客户端
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl StripeClient {
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let timeout = config.timeout();
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("storefront/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            timeout,
        })
    }

    /// Stripe 使用表单编码，嵌套字段写成 `a[0][b]=c`
    pub fn session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let mut form = Vec::new();

        for (index, method) in request.payment_method_types.iter().enumerate() {
            form.push((format!("payment_method_types[{}]", index), method.clone()));
        }

        for (index, item) in request.line_items.iter().enumerate() {
            let prefix = format!("line_items[{}]", index);
            form.push((format!("{}[price_data][currency]", prefix), request.currency.clone()));
            form.push((format!("{}[price_data][product_data][name]", prefix), item.name.clone()));
            form.push((format!("{}[price_data][unit_amount]", prefix), item.unit_amount.to_string()));
            form.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
        }

        form.push(("mode".to_string(), request.mode.as_str().to_string()));
        form.push(("success_url".to_string(), request.success_url.clone()));
        form.push(("cancel_url".to_string(), request.cancel_url.clone()));

        if let Some(coupon) = &request.coupon {
            form.push(("discounts[0][coupon]".to_string(), coupon.clone()));
        }

        if let Some(reference) = &request.client_reference_id {
            form.push(("client_reference_id".to_string(), reference.clone()));
        }

        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        form
    }

    fn map_transport_error(&self, err: reqwest::Error) -> PaymentError {
        if err.is_timeout() {
            PaymentError::Timeout(self.timeout)
        } else {
            PaymentError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}{}", self.api_base, CHECKOUT_SESSIONS_PATH);
        let form = Self::session_form(request);
        debug!(url = %url, fields = form.len(), "Creating checkout session");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<StripeErrorBody>(&body).ok().map(|b| b.error);
            let (message, code) = match detail {
                Some(detail) => (
                    detail
                        .message
                        .or(detail.kind)
                        .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
                    detail.code,
                ),
                None => (format!("HTTP {}: {}", status.as_u16(), body), None),
            };

            error!(status = %status.as_u16(), code = ?code, message = %message, "Checkout session rejected");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let session: StripeSession = serde_json::from_str(&body)
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        if session.id.is_empty() {
            return Err(PaymentError::InvalidResponse("empty session id".to_string()));
        }

        info!(session_id = %session.id, "Checkout session created");

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }
}
