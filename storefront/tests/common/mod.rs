#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use mockall::mock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

use storefront::{
    api::create_router,
    app_state::AppState,
    config::{AppConfig, DatabaseConfig},
    infrastructure::{
        database::init_database,
        payment::{CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentGateway},
    },
    repositories::SqliteProductRepository,
    services::{CatalogService, FulfillmentJob, FulfillmentQueue},
    utils::crypto::WebhookVerifier,
};

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn create_checkout_session(
            &self,
            request: &CheckoutSessionRequest,
        ) -> Result<CheckoutSession, PaymentError>;
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub jobs: mpsc::Receiver<FulfillmentJob>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = "testing".to_string();
    config.database = DatabaseConfig::in_memory();
    config.webhook.signing_secret = WEBHOOK_SECRET.to_string();
    config
}

/// 内存库 + 示例商品 + 指定的支付渠道
pub async fn spawn_app(gateway: impl PaymentGateway + 'static) -> anyhow::Result<TestApp> {
    let config = test_config();
    let db_pool = init_database(&config.database).await?;

    CatalogService::new(Arc::new(SqliteProductRepository::new(db_pool.clone())))
        .seed_if_empty()
        .await?;

    let (queue, jobs) = FulfillmentQueue::new(config.webhook.queue_capacity);
    let state = Arc::new(AppState::new(config, db_pool, Arc::new(gateway), queue));
    let router = create_router(state.clone());

    Ok(TestApp { router, state, jobs })
}

impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_webhook(&self, payload: &[u8], signature: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method("POST").uri("/webhook");
        if let Some(signature) = signature {
            builder = builder.header("stripe-signature", signature);
        }
        self.request(builder.body(Body::from(payload.to_vec())).unwrap()).await
    }
}

/// 按渠道格式生成签名头
pub fn sign(payload: &[u8]) -> String {
    WebhookVerifier::new(WEBHOOK_SECRET, std::time::Duration::from_secs(300))
        .sign(payload, chrono::Utc::now().timestamp())
        .unwrap()
}
