use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::events::{PaymentNotification, PaymentOutcome};
use crate::domain::models::{Order, OrderStatus};
use crate::error::AppError;
use crate::repositories::{EventApplication, OrderRepository, PaymentEventRecord};
use crate::utils::crypto::WebhookVerifier;

/// 订单进入终态后的后续工作
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentJob {
    pub event_id: String,
    pub order: Order,
}

/// 后续工作队列，满了或关闭时只记日志，不影响回调应答
#[derive(Clone)]
pub struct FulfillmentQueue {
    sender: mpsc::Sender<FulfillmentJob>,
}

impl FulfillmentQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FulfillmentJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn enqueue(&self, job: FulfillmentJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                error!(order_id = job.order.id, event_id = %job.event_id, "Fulfillment queue is full, job dropped");
                false
            }
            Err(TrySendError::Closed(job)) => {
                error!(order_id = job.order.id, event_id = %job.event_id, "Fulfillment queue is closed, job dropped");
                false
            }
        }
    }
}

/// 启动后台消费任务，发送端全部释放后退出
pub fn spawn_fulfillment_worker(mut receiver: mpsc::Receiver<FulfillmentJob>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Fulfillment worker started");

        while let Some(job) = receiver.recv().await {
            process_job(&job);
        }

        info!("Fulfillment worker stopped");
    })
}

fn process_job(job: &FulfillmentJob) {
    let order = &job.order;
    match order.status {
        OrderStatus::Paid => info!(
            order_id = order.id,
            product_id = order.product_id,
            quantity = order.quantity,
            total = %order.total,
            event_id = %job.event_id,
            "Order paid, ready for fulfillment"
        ),
        OrderStatus::Failed => warn!(
            order_id = order.id,
            event_id = %job.event_id,
            "Order payment failed"
        ),
        OrderStatus::Pending => warn!(order_id = order.id, "Fulfillment job received for pending order"),
    }
}

/// 回调处理结果，对渠道一律应答已接收
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationOutcome {
    Applied { order_id: i64, status: OrderStatus },
    Duplicate,
    Unchanged { order_id: i64, status: OrderStatus },
    AwaitingPayment,
    Ignored,
    OrderNotFound,
}

pub struct FulfillmentService {
    verifier: WebhookVerifier,
    order_repository: Arc<dyn OrderRepository>,
    queue: FulfillmentQueue,
}

impl FulfillmentService {
    pub fn new(verifier: WebhookVerifier, order_repository: Arc<dyn OrderRepository>, queue: FulfillmentQueue) -> Self {
        Self {
            verifier,
            order_repository,
            queue,
        }
    }

    /// 验签、解析并把事件应用到订单，同一事件只生效一次
    pub async fn handle_payment_notification(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<NotificationOutcome, AppError> {
        self.verifier.verify(payload, signature).map_err(|e| {
            warn!(error = %e, "Rejected payment notification");
            AppError::from(e)
        })?;

        let notification: PaymentNotification = serde_json::from_slice(payload)
            .map_err(|e| AppError::invalid_input(format!("Malformed notification payload: {}", e)))?;

        info!(
            event_id = %notification.id,
            event_type = %notification.event_type,
            "Payment notification received"
        );

        let outcome = notification.outcome();
        let Some(target) = outcome.target_status() else {
            return Ok(match outcome {
                PaymentOutcome::AwaitingPayment => {
                    info!(event_id = %notification.id, "Payment not completed yet, waiting for async result");
                    NotificationOutcome::AwaitingPayment
                }
                _ => NotificationOutcome::Ignored,
            });
        };

        let Some(order_id) = self.resolve_order(&notification).await? else {
            warn!(
                event_id = %notification.id,
                session_id = ?notification.session_id(),
                "No order linked to payment notification"
            );
            return Ok(NotificationOutcome::OrderNotFound);
        };

        let record = PaymentEventRecord {
            event_id: notification.id.clone(),
            event_type: notification.event_type.clone(),
            order_id,
        };

        let application = self.order_repository.apply_payment_event(&record, target).await?;

        let result = match application {
            EventApplication::Applied(order) => {
                info!(order_id, status = %order.status, event_id = %record.event_id, "Order status updated");
                let status = order.status;
                self.queue.enqueue(FulfillmentJob {
                    event_id: record.event_id,
                    order,
                });
                NotificationOutcome::Applied { order_id, status }
            }
            EventApplication::Duplicate => {
                info!(event_id = %record.event_id, "Payment notification already processed");
                NotificationOutcome::Duplicate
            }
            EventApplication::Unchanged(order) => {
                info!(order_id, status = %order.status, "Order already final, notification ignored");
                NotificationOutcome::Unchanged {
                    order_id,
                    status: order.status,
                }
            }
            EventApplication::OrderMissing => {
                warn!(order_id, event_id = %record.event_id, "Payment notification references unknown order");
                NotificationOutcome::OrderNotFound
            }
        };

        Ok(result)
    }

    // metadata / client_reference_id 优先，其次按会话反查
    async fn resolve_order(&self, notification: &PaymentNotification) -> Result<Option<i64>, AppError> {
        if let Some(order_id) = notification.order_reference() {
            return Ok(Some(order_id));
        }

        match notification.session_id() {
            Some(session_id) => Ok(self
                .order_repository
                .find_by_session_id(session_id)
                .await?
                .map(|order| order.id)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::domain::models::NewOrder;
    use crate::infrastructure::database::init_database;
    use crate::repositories::{SqliteOrderRepository, SqliteProductRepository};
    use crate::services::catalog_service::CatalogService;
    use crate::utils::crypto::SignatureError;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::time::Duration;

    const SECRET: &str = "whsec_test_secret";

    struct Fixture {
        service: FulfillmentService,
        orders: Arc<SqliteOrderRepository>,
        receiver: mpsc::Receiver<FulfillmentJob>,
        verifier: WebhookVerifier,
    }

    async fn fixture() -> anyhow::Result<Fixture> {
        let pool = init_database(&DatabaseConfig::in_memory()).await?;
        let products = Arc::new(SqliteProductRepository::new(pool.clone()));
        CatalogService::new(products).seed_if_empty().await?;

        let orders = Arc::new(SqliteOrderRepository::new(pool));
        let verifier = WebhookVerifier::new(SECRET, Duration::from_secs(300));
        let (queue, receiver) = FulfillmentQueue::new(8);
        let service = FulfillmentService::new(verifier.clone(), orders.clone(), queue);

        Ok(Fixture {
            service,
            orders,
            receiver,
            verifier,
        })
    }

    impl Fixture {
        async fn pending_order(&self, session_id: &str) -> anyhow::Result<Order> {
            let order = self
                .orders
                .create(&NewOrder {
                    product_id: 1,
                    quantity: 2,
                    total: dec!(39.98),
                })
                .await?;
            self.orders.attach_session(order.id, session_id).await?;
            Ok(order)
        }

        async fn deliver(&self, event: serde_json::Value) -> Result<NotificationOutcome, AppError> {
            let payload = serde_json::to_vec(&event).unwrap();
            let header = self.verifier.sign(&payload, chrono::Utc::now().timestamp()).unwrap();
            self.service.handle_payment_notification(&payload, Some(&header)).await
        }
    }

    fn completed(event_id: &str, order_id: i64, session_id: &str) -> serde_json::Value {
        json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": session_id,
                "client_reference_id": order_id.to_string(),
                "metadata": { "order_id": order_id.to_string() },
                "payment_status": "paid"
            }}
        })
    }

    #[tokio::test]
    async fn test_completed_event_marks_order_paid_and_queues_job() -> anyhow::Result<()> {
        let mut fixture = fixture().await?;
        let order = fixture.pending_order("cs_test_1").await?;

        let outcome = fixture.deliver(completed("evt_1", order.id, "cs_test_1")).await?;
        assert_eq!(
            outcome,
            NotificationOutcome::Applied {
                order_id: order.id,
                status: OrderStatus::Paid
            }
        );

        let stored = fixture.orders.find_by_id(order.id).await?.unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);

        let job = fixture.receiver.try_recv()?;
        assert_eq!(job.order.id, order.id);
        assert_eq!(job.event_id, "evt_1");

        Ok(())
    }

    #[tokio::test]
    async fn test_redelivery_applies_once() -> anyhow::Result<()> {
        let mut fixture = fixture().await?;
        let order = fixture.pending_order("cs_test_1").await?;

        fixture.deliver(completed("evt_1", order.id, "cs_test_1")).await?;
        let again = fixture.deliver(completed("evt_1", order.id, "cs_test_1")).await?;
        assert_eq!(again, NotificationOutcome::Duplicate);

        assert!(fixture.receiver.try_recv().is_ok());
        assert!(fixture.receiver.try_recv().is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_signature_changes_nothing() -> anyhow::Result<()> {
        let fixture = fixture().await?;
        let order = fixture.pending_order("cs_test_1").await?;

        let payload = serde_json::to_vec(&completed("evt_1", order.id, "cs_test_1"))?;
        let forged = WebhookVerifier::new("whsec_other", Duration::from_secs(300))
            .sign(&payload, chrono::Utc::now().timestamp())?;

        let result = fixture.service.handle_payment_notification(&payload, Some(&forged)).await;
        assert!(matches!(result, Err(AppError::Verification(_))));

        let missing = fixture.service.handle_payment_notification(&payload, None).await;
        assert!(matches!(missing, Err(AppError::Verification(_))));

        let stored = fixture.orders.find_by_id(order.id).await?.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);

        Ok(())
    }

    #[tokio::test]
    async fn test_unconfigured_secret_rejects_self_signed_event() -> anyhow::Result<()> {
        let fixture = fixture().await?;
        let order = fixture.pending_order("cs_test_1").await?;

        let unconfigured = WebhookVerifier::new("", Duration::from_secs(300));
        let (queue, _receiver) = FulfillmentQueue::new(8);
        let service = FulfillmentService::new(unconfigured.clone(), fixture.orders.clone(), queue);

        let payload = serde_json::to_vec(&completed("evt_1", order.id, "cs_test_1"))?;
        let header = unconfigured.sign(&payload, chrono::Utc::now().timestamp())?;

        let result = service.handle_payment_notification(&payload, Some(&header)).await;
        assert!(matches!(result, Err(AppError::Verification(SignatureError::MissingSecret))));

        let stored = fixture.orders.find_by_id(order.id).await?.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);

        Ok(())
    }

    #[tokio::test]
    async fn test_expired_session_resolved_by_session_id() -> anyhow::Result<()> {
        let fixture = fixture().await?;
        let order = fixture.pending_order("cs_test_9").await?;

        let outcome = fixture
            .deliver(json!({
                "id": "evt_9",
                "type": "checkout.session.expired",
                "data": { "object": { "id": "cs_test_9", "metadata": null } }
            }))
            .await?;

        assert_eq!(
            outcome,
            NotificationOutcome::Applied {
                order_id: order.id,
                status: OrderStatus::Failed
            }
        );

        // 失败后再收到成功事件，状态不变
        let late = fixture.deliver(completed("evt_10", order.id, "cs_test_9")).await?;
        assert_eq!(
            late,
            NotificationOutcome::Unchanged {
                order_id: order.id,
                status: OrderStatus::Failed
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_unresolvable_and_ignored_events_are_acknowledged() -> anyhow::Result<()> {
        let fixture = fixture().await?;

        let unknown = fixture
            .deliver(json!({
                "id": "evt_20",
                "type": "checkout.session.completed",
                "data": { "object": { "id": "cs_nowhere", "payment_status": "paid" } }
            }))
            .await?;
        assert_eq!(unknown, NotificationOutcome::OrderNotFound);

        let ignored = fixture
            .deliver(json!({ "id": "evt_21", "type": "customer.created", "data": { "object": {} } }))
            .await?;
        assert_eq!(ignored, NotificationOutcome::Ignored);

        let waiting = fixture
            .deliver(json!({
                "id": "evt_22",
                "type": "checkout.session.completed",
                "data": { "object": { "id": "cs_x", "payment_status": "unpaid" } }
            }))
            .await?;
        assert_eq!(waiting, NotificationOutcome::AwaitingPayment);

        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected() -> anyhow::Result<()> {
        let fixture = fixture().await?;
        let payload = b"not json";
        let header = fixture.verifier.sign(payload, chrono::Utc::now().timestamp())?;

        let result = fixture.service.handle_payment_notification(payload, Some(&header)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        Ok(())
    }

    #[tokio::test]
    async fn test_full_queue_does_not_fail() {
        let (queue, _receiver) = FulfillmentQueue::new(1);
        let job = FulfillmentJob {
            event_id: "evt_1".to_string(),
            order: Order {
                id: 1,
                product_id: 1,
                quantity: 1,
                total: dec!(9.99),
                status: OrderStatus::Paid,
                session_id: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
        };

        assert!(queue.enqueue(job.clone()));
        assert!(!queue.enqueue(job));
    }
}
