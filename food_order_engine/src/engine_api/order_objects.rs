use chrono::{DateTime, Utc};
use order_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{
    Order,
    OrderItem,
    OrderStatusLog,
    OrderStatusType,
    PaymentMethod,
    PaymentRecord,
    PaymentStatus,
    RefundRecord,
    RefundStatus,
    RefundType,
};

/// One line of an order as the client submitted it. `name` and `price` are what the client saw, and are checked
/// against the live menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub dish_id: i64,
    pub name: String,
    pub price: Money,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub restaurant_id: i64,
    pub address_id: i64,
    pub items: Vec<OrderItemRequest>,
    pub payment_method: PaymentMethod,
    /// `asap`, or a time of day in `HH:MM` format
    pub delivery_time: String,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderResult {
    pub order_id: i64,
    pub order_number: String,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub payment_id: i64,
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundOrderRequest {
    pub reason: String,
    /// The amount to refund. If omitted, everything that has not been refunded yet is refunded.
    pub amount: Option<Money>,
}

impl RefundOrderRequest {
    pub fn full<S: Into<String>>(reason: S) -> Self {
        Self { reason: reason.into(), amount: None }
    }

    pub fn partial<S: Into<String>>(reason: S, amount: Money) -> Self {
        Self { reason: reason.into(), amount: Some(amount) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub refund_id: i64,
    pub refund_amount: Money,
    pub refund_status: RefundStatus,
    pub refund_type: RefundType,
}

impl From<&RefundRecord> for RefundResult {
    fn from(refund: &RefundRecord) -> Self {
        Self {
            refund_id: refund.id,
            refund_amount: refund.refund_amount,
            refund_status: refund.refund_status,
            refund_type: refund.refund_type,
        }
    }
}

/// The real outcome of a gateway call that timed out, once an operator has established it with the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// The money moved.
    Approved,
    /// The gateway declined, or never received the request.
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeResult {
    pub order_status: OrderStatusType,
    /// When the restaurant handed the order over for delivery
    pub completed_at: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
}

impl From<&Order> for StatusChangeResult {
    fn from(order: &Order) -> Self {
        Self {
            order_status: order.order_status,
            completed_at: order.completed_at,
            actual_delivery_time: order.actual_delivery_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHistory {
    pub status_log: Vec<OrderStatusLog>,
    pub payments: Vec<PaymentRecord>,
    pub refunds: Vec<RefundRecord>,
}
