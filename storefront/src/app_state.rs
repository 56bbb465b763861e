use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::infrastructure::payment::PaymentGateway;
use crate::repositories::{OrderRepository, ProductRepository, SqliteOrderRepository, SqliteProductRepository};
use crate::services::{CatalogService, CheckoutService, CheckoutSettings, FulfillmentQueue, FulfillmentService};
use crate::utils::crypto::WebhookVerifier;

/// 应用状态，包含共享资源和服务
pub struct AppState {
    pub config: AppConfig,
    pub db_pool: SqlitePool,

    // 服务层
    pub catalog_service: Arc<CatalogService>,
    pub checkout_service: Arc<CheckoutService>,
    pub fulfillment_service: Arc<FulfillmentService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db_pool: SqlitePool,
        gateway: Arc<dyn PaymentGateway>,
        fulfillment_queue: FulfillmentQueue,
    ) -> Self {
        // 初始化仓储
        let product_repository: Arc<dyn ProductRepository> = Arc::new(SqliteProductRepository::new(db_pool.clone()));
        let order_repository: Arc<dyn OrderRepository> = Arc::new(SqliteOrderRepository::new(db_pool.clone()));

        // 初始化服务
        let catalog_service = Arc::new(CatalogService::new(product_repository.clone()));

        let checkout_service = Arc::new(CheckoutService::new(
            CheckoutSettings::from_config(&config),
            product_repository,
            order_repository.clone(),
            gateway,
        ));

        let verifier = WebhookVerifier::new(config.webhook.signing_secret.clone(), config.webhook.tolerance());
        let fulfillment_service = Arc::new(FulfillmentService::new(verifier, order_repository, fulfillment_queue));

        Self {
            config,
            db_pool,
            catalog_service,
            checkout_service,
            fulfillment_service,
        }
    }
}
