use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::models::OrderStatus;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_FAILED: &str = "checkout.session.async_payment_failed";
pub const CHECKOUT_SESSION_EXPIRED: &str = "checkout.session.expired";

/// 元数据里关联订单的键
pub const ORDER_ID_METADATA_KEY: &str = "order_id";

/// 支付渠道推送的事件通知
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: NotificationData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub object: SessionObject,
}

/// 事件中的 checkout session，其他类型对象的字段缺省即可
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    pub payment_status: Option<String>,
}

/// 事件对订单的影响
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid,
    Failed,
    /// 异步支付尚未完成，等待后续事件
    AwaitingPayment,
    Ignored,
}

impl PaymentOutcome {
    pub fn target_status(&self) -> Option<OrderStatus> {
        match self {
            Self::Paid => Some(OrderStatus::Paid),
            Self::Failed => Some(OrderStatus::Failed),
            Self::AwaitingPayment | Self::Ignored => None,
        }
    }
}

impl PaymentNotification {
    pub fn outcome(&self) -> PaymentOutcome {
        match self.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => match self.data.object.payment_status.as_deref() {
                Some("paid") | Some("no_payment_required") => PaymentOutcome::Paid,
                Some("unpaid") => PaymentOutcome::AwaitingPayment,
                // 旧版本事件不带 payment_status，按已支付处理
                None => PaymentOutcome::Paid,
                Some(_) => PaymentOutcome::Ignored,
            },
            CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED => PaymentOutcome::Paid,
            CHECKOUT_SESSION_ASYNC_PAYMENT_FAILED | CHECKOUT_SESSION_EXPIRED => PaymentOutcome::Failed,
            _ => PaymentOutcome::Ignored,
        }
    }

    /// 先看 metadata，再看 client_reference_id
    pub fn order_reference(&self) -> Option<i64> {
        let object = &self.data.object;
        object
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get(ORDER_ID_METADATA_KEY))
            .and_then(|id| id.trim().parse().ok())
            .or_else(|| object.client_reference_id.as_deref().and_then(|id| id.trim().parse().ok()))
    }

    pub fn session_id(&self) -> Option<&str> {
        self.data.object.id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notification(value: serde_json::Value) -> PaymentNotification {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_completed_paid_session() {
        let event = notification(json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "client_reference_id": "7",
                "metadata": { "order_id": "7" },
                "payment_status": "paid"
            }}
        }));

        assert_eq!(event.outcome(), PaymentOutcome::Paid);
        assert_eq!(event.outcome().target_status(), Some(OrderStatus::Paid));
        assert_eq!(event.order_reference(), Some(7));
        assert_eq!(event.session_id(), Some("cs_test_1"));
    }

    #[test]
    fn test_completed_but_unpaid_waits() {
        let event = notification(json!({
            "id": "evt_2",
            "type": "checkout.session.completed",
            "data": { "object": { "payment_status": "unpaid" } }
        }));

        assert_eq!(event.outcome(), PaymentOutcome::AwaitingPayment);
        assert_eq!(event.outcome().target_status(), None);
    }

    #[test]
    fn test_failure_events() {
        for event_type in [CHECKOUT_SESSION_ASYNC_PAYMENT_FAILED, CHECKOUT_SESSION_EXPIRED] {
            let event = notification(json!({ "id": "evt_3", "type": event_type, "data": { "object": {} } }));
            assert_eq!(event.outcome(), PaymentOutcome::Failed);
        }
    }

    #[test]
    fn test_unrelated_event_ignored() {
        let event = notification(json!({
            "id": "evt_4",
            "type": "customer.created",
            "data": { "object": { "id": "cus_1", "email": "a@b.c" } }
        }));

        assert_eq!(event.outcome(), PaymentOutcome::Ignored);
        assert_eq!(event.order_reference(), None);
    }

    #[test]
    fn test_client_reference_fallback() {
        let event = notification(json!({
            "id": "evt_5",
            "type": "checkout.session.expired",
            "data": { "object": { "client_reference_id": "42" } }
        }));

        assert_eq!(event.order_reference(), Some(42));
    }
}
