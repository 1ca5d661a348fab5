//! # Order state machine
//!
//! The legal order status graph is
//!
//! ```text
//!  CREATED ──► CONFIRMED ──► PREPARING ──► DELIVERING ──► COMPLETED
//!     │            │             │              │
//!     └─(cancel)   └─────────────┴──(refund)────┘
//!          ▼                     ▼
//!      CANCELLED             CANCELLED
//! ```
//!
//! | Transition               | From        | Payment status          | Side effect                          |
//! |--------------------------|-------------|-------------------------|--------------------------------------|
//! | [`OrderTransition::Confirm`]        | CREATED     | PENDING → SUCCESS       | `paid_at`                            |
//! | [`OrderTransition::StartPreparing`] | CONFIRMED   | SUCCESS                 |                                      |
//! | [`OrderTransition::StartDelivery`]  | PREPARING   | SUCCESS                 | `completed_at` (merchant handoff)    |
//! | [`OrderTransition::Complete`]       | DELIVERING  | SUCCESS                 | `actual_delivery_time`               |
//! | [`OrderTransition::Cancel`]         | CREATED     | PENDING                 | `cancelled_at`                       |
//! | [`OrderTransition::RefundCancel`]   | paid states | REFUNDING → REFUNDED    | `cancelled_at`                       |
//!
//! This module only *plans* a transition. [`plan_transition`] checks the precondition against an order snapshot and
//! produces a [`StatusChange`]. The database backend applies the change and writes the status log row in a single
//! transaction, and re-checks `from` and `expected_payment_status` in the update itself, so a change planned against a
//! stale snapshot is rejected rather than applied.
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Operator, Order, OrderPaymentStatus, OrderStatusType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTransition {
    /// Payment succeeded.
    Confirm,
    /// The merchant accepted the order.
    StartPreparing,
    /// A rider picked up the order.
    StartDelivery,
    /// The customer confirmed delivery.
    Complete,
    /// The customer cancelled an unpaid order.
    Cancel,
    /// A paid order was fully refunded.
    RefundCancel,
}

impl OrderTransition {
    pub const ALL: [OrderTransition; 6] = [
        OrderTransition::Confirm,
        OrderTransition::StartPreparing,
        OrderTransition::StartDelivery,
        OrderTransition::Complete,
        OrderTransition::Cancel,
        OrderTransition::RefundCancel,
    ];

    pub fn target(&self) -> OrderStatusType {
        match self {
            OrderTransition::Confirm => OrderStatusType::Confirmed,
            OrderTransition::StartPreparing => OrderStatusType::Preparing,
            OrderTransition::StartDelivery => OrderStatusType::Delivering,
            OrderTransition::Complete => OrderStatusType::Completed,
            OrderTransition::Cancel | OrderTransition::RefundCancel => OrderStatusType::Cancelled,
        }
    }

    /// The transitions that merchants and riders may request by naming the target status.
    pub fn for_operator_target(status: OrderStatusType) -> Option<Self> {
        match status {
            OrderStatusType::Preparing => Some(OrderTransition::StartPreparing),
            OrderStatusType::Delivering => Some(OrderTransition::StartDelivery),
            _ => None,
        }
    }

    pub fn default_remark(&self) -> &'static str {
        match self {
            OrderTransition::Confirm => "payment succeeded",
            OrderTransition::StartPreparing => "merchant accepted the order",
            OrderTransition::StartDelivery => "rider picked up the order",
            OrderTransition::Complete => "delivery confirmed",
            OrderTransition::Cancel => "cancelled by user",
            OrderTransition::RefundCancel => "order refunded",
        }
    }

    fn precondition_holds(&self, status: OrderStatusType, payment: OrderPaymentStatus) -> bool {
        use OrderPaymentStatus as P;
        use OrderStatusType as S;
        match self {
            OrderTransition::Confirm => status == S::Created && payment == P::Pending,
            OrderTransition::StartPreparing => status == S::Confirmed && payment == P::Success,
            OrderTransition::StartDelivery => status == S::Preparing && payment == P::Success,
            OrderTransition::Complete => status == S::Delivering && payment == P::Success,
            OrderTransition::Cancel => status == S::Created && payment == P::Pending,
            OrderTransition::RefundCancel => status.is_paid() && payment == P::Refunding,
        }
    }

    fn resulting_payment_status(&self, current: OrderPaymentStatus) -> OrderPaymentStatus {
        match self {
            OrderTransition::Confirm => OrderPaymentStatus::Success,
            OrderTransition::RefundCancel => OrderPaymentStatus::Refunded,
            _ => current,
        }
    }
}

impl Display for OrderTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderTransition::Confirm => write!(f, "confirm"),
            OrderTransition::StartPreparing => write!(f, "start preparing"),
            OrderTransition::StartDelivery => write!(f, "start delivery of"),
            OrderTransition::Complete => write!(f, "complete"),
            OrderTransition::Cancel => write!(f, "cancel"),
            OrderTransition::RefundCancel => write!(f, "refund and cancel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Precondition mismatch: cannot {transition} an order with status {status} and payment status {payment_status}")]
    PreconditionMismatch {
        transition: OrderTransition,
        status: OrderStatusType,
        payment_status: OrderPaymentStatus,
    },
}

/// A planned, validated status change for a single order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub order_id: i64,
    pub transition: OrderTransition,
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub expected_payment_status: OrderPaymentStatus,
    pub new_payment_status: OrderPaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub operator: Operator,
    pub remark: String,
    pub changed_at: DateTime<Utc>,
}

/// Checks that `transition` is legal for `order` and, if so, returns the change to apply.
///
/// Nothing is mutated. An illegal transition returns [`TransitionError::PreconditionMismatch`].
pub fn plan_transition(
    order: &Order,
    transition: OrderTransition,
    operator: Operator,
    remark: Option<String>,
    now: DateTime<Utc>,
) -> Result<StatusChange, TransitionError> {
    if !transition.precondition_holds(order.order_status, order.payment_status) {
        return Err(TransitionError::PreconditionMismatch {
            transition,
            status: order.order_status,
            payment_status: order.payment_status,
        });
    }
    let mut change = StatusChange {
        order_id: order.id,
        transition,
        from: order.order_status,
        to: transition.target(),
        expected_payment_status: order.payment_status,
        new_payment_status: transition.resulting_payment_status(order.payment_status),
        paid_at: None,
        completed_at: None,
        actual_delivery_time: None,
        cancelled_at: None,
        operator,
        remark: remark.unwrap_or_else(|| transition.default_remark().to_string()),
        changed_at: now,
    };
    match transition {
        OrderTransition::Confirm => change.paid_at = Some(now),
        OrderTransition::StartPreparing => {},
        OrderTransition::StartDelivery => change.completed_at = Some(now),
        OrderTransition::Complete => change.actual_delivery_time = Some(now),
        OrderTransition::Cancel | OrderTransition::RefundCancel => change.cancelled_at = Some(now),
    }
    Ok(change)
}
