use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::debug;

use crate::domain::models::{NewOrder, Order, OrderStatus};
use crate::error::AppError;
use crate::repositories::product_repo::parse_decimal;

/// 一条待记录的支付回调事件
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub order_id: i64,
}

/// 回调事件应用到订单的结果
#[derive(Debug, Clone, PartialEq)]
pub enum EventApplication {
    /// 订单从 pending 迁移到目标状态
    Applied(Order),
    /// 同一事件已处理过
    Duplicate,
    /// 订单已是终态，保持不变
    Unchanged(Order),
    /// 订单不存在
    OrderMissing,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &NewOrder) -> Result<Order, AppError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, AppError>;
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Order>, AppError>;
    async fn attach_session(&self, order_id: i64, session_id: &str) -> Result<(), AppError>;
    async fn apply_payment_event(
        &self,
        event: &PaymentEventRecord,
        target: OrderStatus,
    ) -> Result<EventApplication, AppError>;
}

pub struct SqliteOrderRepository {
    db_pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[derive(Debug, FromRow)]
struct OrderRecord {
    id: i64,
    product_id: i64,
    quantity: i64,
    total: String,
    status: String,
    session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = AppError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_str(&record.status)
            .map_err(|_| AppError::internal(format!("Unknown order status: {}", record.status)))?;

        Ok(Self {
            id: record.id,
            product_id: record.product_id,
            quantity: record.quantity,
            total: parse_decimal("orders.total", &record.total)?,
            status,
            session_id: record.session_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

const SELECT_ORDER: &str = "SELECT id, product_id, quantity, CAST(total AS TEXT) AS total, \
     COALESCE(status, 'pending') AS status, session_id, created_at, updated_at FROM orders";

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn create(&self, order: &NewOrder) -> Result<Order, AppError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO orders (product_id, quantity, total, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(order.product_id)
        .bind(order.quantity)
        .bind(order.total.to_string())
        .bind(OrderStatus::Pending.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(order_id = id, product_id = order.product_id, "Order created");

        Ok(Order {
            id,
            product_id: order.product_id,
            quantity: order.quantity,
            total: order.total,
            status: OrderStatus::Pending,
            session_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, AppError> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!("{} WHERE id = ?", SELECT_ORDER))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        record.map(Order::try_from).transpose()
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Order>, AppError> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "{} WHERE session_id = ? ORDER BY id DESC LIMIT 1",
            SELECT_ORDER
        ))
        .bind(session_id)
        .fetch_optional(&self.db_pool)
        .await?;

        record.map(Order::try_from).transpose()
    }

    async fn attach_session(&self, order_id: i64, session_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE orders SET session_id = ?, updated_at = ? WHERE id = ?")
            .bind(session_id)
            .bind(Utc::now())
            .bind(order_id)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Order {} not found", order_id)));
        }

        Ok(())
    }

    async fn apply_payment_event(
        &self,
        event: &PaymentEventRecord,
        target: OrderStatus,
    ) -> Result<EventApplication, AppError> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;

        // 事件记录与状态迁移在同一事务中，重复投递只会命中主键冲突
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO payment_events (event_id, event_type, order_id, received_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(event.order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(EventApplication::Duplicate);
        }

        let updated = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(target.to_string())
            .bind(now)
            .bind(event.order_id)
            .bind(OrderStatus::Pending.to_string())
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, OrderRecord>(&format!("{} WHERE id = ?", SELECT_ORDER))
            .bind(event.order_id)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;

        let application = match record {
            None => EventApplication::OrderMissing,
            Some(record) if updated.rows_affected() > 0 => EventApplication::Applied(record.try_into()?),
            Some(record) => EventApplication::Unchanged(record.try_into()?),
        };

        Ok(application)
    }
}
