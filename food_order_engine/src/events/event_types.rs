use serde::{Deserialize, Serialize};

use crate::db_types::{Operator, Order, OrderItem, OrderStatusType, PaymentRecord, RefundRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderCreatedEvent {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub payment: PaymentRecord,
}

impl OrderPaidEvent {
    pub fn new(order: Order, payment: PaymentRecord) -> Self {
        Self { order, payment }
    }
}

/// Emitted when a refund completes, full or partial. After a full refund, `order` is already `CANCELLED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefundedEvent {
    pub order: Order,
    pub refund: RefundRecord,
}

impl OrderRefundedEvent {
    pub fn new(order: Order, refund: RefundRecord) -> Self {
        Self { order, refund }
    }
}

/// Emitted for every committed order status transition, including those caused by payments and refunds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
    pub operator: Operator,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType, operator: Operator) -> Self {
        let new_status = order.order_status;
        Self { order, old_status, new_status, operator }
    }
}
