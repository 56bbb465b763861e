use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::domain::events::ORDER_ID_METADATA_KEY;
use crate::domain::models::{NewOrder, Order};
use crate::domain::money::{MinorUnits, line_total};
use crate::error::AppError;
use crate::infrastructure::payment::{CheckoutMode, CheckoutSessionRequest, LineItem, PaymentGateway};
use crate::repositories::{OrderRepository, ProductRepository};

/// 收银台会话的固定参数
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSettings {
    pub currency: String,
    pub payment_method_types: Vec<String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            currency: config.payment.currency.to_lowercase(),
            payment_method_types: config.payment.payment_method_types.clone(),
            success_url: config.success_url(),
            cancel_url: config.cancel_url(),
        }
    }
}

/// 返回给前端的跳转凭据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutHandle {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip)]
    pub order_id: i64,
}

pub struct CheckoutService {
    settings: CheckoutSettings,
    product_repository: Arc<dyn ProductRepository>,
    order_repository: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CheckoutService {
    pub fn new(
        settings: CheckoutSettings,
        product_repository: Arc<dyn ProductRepository>,
        order_repository: Arc<dyn OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            settings,
            product_repository,
            order_repository,
            gateway,
        }
    }

    /// 创建待支付订单并向支付渠道申请收银台会话
    pub async fn initiate_checkout(
        &self,
        product_id: i64,
        quantity: i64,
        coupon: Option<&str>,
    ) -> Result<CheckoutHandle, AppError> {
        if quantity <= 0 {
            return Err(AppError::invalid_quantity("Quantity must be a positive integer"));
        }

        let product = self
            .product_repository
            .find_by_id(product_id)
            .await?
            .ok_or(AppError::ProductNotFound(product_id))?;

        let unit_amount = MinorUnits::from_major(product.price)
            .ok_or_else(|| AppError::internal(format!("Product {} has an invalid price: {}", product.id, product.price)))?;

        // 渠道侧按最小单位乘以数量，这里提前拒绝溢出
        if unit_amount.value().checked_mul(quantity).is_none() {
            return Err(AppError::invalid_quantity("Quantity is too large"));
        }
        let total = line_total(product.price, quantity)
            .ok_or_else(|| AppError::invalid_quantity("Quantity is too large"))?;

        let order = self
            .order_repository
            .create(&NewOrder {
                product_id: product.id,
                quantity,
                total,
            })
            .await?;

        let order_ref = order.id.to_string();
        let mut metadata = BTreeMap::new();
        metadata.insert(ORDER_ID_METADATA_KEY.to_string(), order_ref.clone());

        let request = CheckoutSessionRequest {
            currency: self.settings.currency.clone(),
            payment_method_types: self.settings.payment_method_types.clone(),
            line_items: vec![LineItem {
                name: product.name.clone(),
                unit_amount,
                quantity,
            }],
            mode: CheckoutMode::Payment,
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
            coupon: coupon.filter(|c| !c.is_empty()).map(str::to_string),
            client_reference_id: Some(order_ref),
            metadata,
        };

        let session = self.gateway.create_checkout_session(&request).await.map_err(|e| {
            error!(order_id = order.id, error = %e, "Failed to create checkout session");
            AppError::from(e)
        })?;

        self.order_repository.attach_session(order.id, &session.id).await?;

        info!(
            order_id = order.id,
            product_id = product.id,
            quantity,
            total = %total,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CheckoutHandle {
            id: session.id,
            url: session.url,
            order_id: order.id,
        })
    }

    pub async fn get_order(&self, id: i64) -> Result<Order, AppError> {
        self.order_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order with ID {} not found", id)))
    }
}
