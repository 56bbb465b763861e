mod stripe;

pub use stripe::StripeClient;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::domain::money::MinorUnits;

/// 支付模式，目前只有一次性付款
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Payment,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    /// 单价（最小单位），渠道侧乘以数量
    pub unit_amount: MinorUnits,
    pub quantity: i64,
}

/// 创建托管收银台会话的请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub currency: String,
    pub payment_method_types: Vec<String>,
    pub line_items: Vec<LineItem>,
    pub mode: CheckoutMode,
    pub success_url: String,
    pub cancel_url: String,
    pub coupon: Option<String>,
    pub client_reference_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// 渠道返回的会话，id 交给前端跳转
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("payment provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("payment provider rejected the request ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("payment provider request failed: {0}")]
    Transport(String),

    #[error("payment provider returned an unexpected response: {0}")]
    InvalidResponse(String),
}

/// 外部支付渠道
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}
