use crate::api::handlers::{checkout_handlers, order_handlers, product_handlers, webhook_handlers};
use crate::app_state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // 健康检查
        .route("/health", get(|| async { "OK" }))

        // 商品接口
        .route("/api/products", get(product_handlers::list_products))
        .route("/api/products/{id}", get(product_handlers::get_product))

        // 下单与订单查询
        .route("/api/create-checkout", post(checkout_handlers::create_checkout))
        .route("/api/orders/{id}", get(order_handlers::get_order))

        // 支付渠道回调
        .route("/webhook", post(webhook_handlers::handle_payment_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
