use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// 商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub image: String,
    pub stock: i64,
}

/// 新建商品（初始化数据或外部后台录入）
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image: String,
    pub stock: i64,
}

/// 订单状态，只允许 pending -> paid / pending -> failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

/// 订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待写入的订单，总额在创建时按当时单价计算
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub product_id: i64,
    pub quantity: i64,
    pub total: Decimal,
}
