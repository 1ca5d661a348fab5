use chrono::{DateTime, Utc};
use order_common::Money;
use thiserror::Error;

use crate::{
    db_types::{
        NewOrder,
        NewPaymentRecord,
        NewRefundRecord,
        Order,
        OrderItem,
        OrderStatusLog,
        PaymentRecord,
        RefundRecord,
    },
    order_state::StatusChange,
    traits::CatalogLookup,
};

/// This trait defines the behaviour that database backends must provide to support the order engine.
///
/// Every method that touches more than one row runs as a single atomic transaction. In particular, every order status
/// change is written together with its status log row, and the payment and refund outcome methods commit the record
/// update and the order update together, or not at all.
///
/// Status changes are compare-and-set operations: the backend only applies a [`StatusChange`] if the order still has
/// the `from` status and `expected_payment_status` recorded in the change. Otherwise
/// [`OrderDatabaseError::PreconditionMismatch`] is returned and nothing is written.
#[allow(async_fn_in_trait)]
pub trait OrderDatabase: Clone + CatalogLookup {
    /// Stores a new order, all of its items, and the initial `CREATED` status log entry in one transaction.
    ///
    /// If the order number is already taken, [`OrderDatabaseError::OrderAlreadyExists`] is returned and nothing is
    /// stored.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderItem>), OrderDatabaseError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderDatabaseError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderDatabaseError>;

    /// Returns the status log for the order, oldest entry first.
    async fn fetch_status_log(&self, order_id: i64) -> Result<Vec<OrderStatusLog>, OrderDatabaseError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<PaymentRecord>, OrderDatabaseError>;

    /// Returns every payment attempt for the order, oldest first.
    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<PaymentRecord>, OrderDatabaseError>;

    async fn fetch_refund(&self, refund_id: i64) -> Result<Option<RefundRecord>, OrderDatabaseError>;

    /// Returns every refund attempt for the order, oldest first.
    async fn fetch_refunds_for_order(&self, order_id: i64) -> Result<Vec<RefundRecord>, OrderDatabaseError>;

    /// Applies the status change and appends the status log entry in a single transaction.
    async fn apply_status_change(&self, change: StatusChange) -> Result<Order, OrderDatabaseError>;

    /// Creates a `PENDING` payment record.
    ///
    /// Fails if the order is no longer awaiting payment, or if it already has a successful payment.
    async fn insert_payment(&self, payment: NewPaymentRecord) -> Result<PaymentRecord, OrderDatabaseError>;

    /// In a single transaction:
    /// * marks the payment record as `SUCCESS` with the given payment time,
    /// * applies `change` (which must be the `CREATED → CONFIRMED` transition) and writes its log entry.
    async fn record_payment_success(
        &self,
        payment_id: i64,
        paid_at: DateTime<Utc>,
        change: StatusChange,
    ) -> Result<(PaymentRecord, Order), OrderDatabaseError>;

    /// Marks a `PENDING` payment record as `FAILED`. The order is not touched.
    async fn record_payment_failure(&self, payment_id: i64) -> Result<PaymentRecord, OrderDatabaseError>;

    /// In a single transaction:
    /// * checks that the refund, together with every other pending or completed refund against the same payment, does
    ///   not exceed the payment amount,
    /// * moves the order payment status from `SUCCESS` to `REFUNDING`,
    /// * creates the `PENDING` refund record.
    async fn begin_refund(&self, refund: NewRefundRecord) -> Result<RefundRecord, OrderDatabaseError>;

    /// In a single transaction:
    /// * marks the refund record `COMPLETED`,
    /// * if `change` is given (a full refund), applies it and writes its log entry,
    /// * otherwise (a partial refund) returns the order payment status from `REFUNDING` to `SUCCESS`.
    async fn record_refund_success(
        &self,
        refund_id: i64,
        completed_at: DateTime<Utc>,
        change: Option<StatusChange>,
    ) -> Result<(RefundRecord, Order), OrderDatabaseError>;

    /// In a single transaction, marks the refund record `FAILED` and returns the order payment status from
    /// `REFUNDING` to `SUCCESS`, leaving the order as it was before the refund was attempted.
    async fn record_refund_failure(&self, refund_id: i64) -> Result<(RefundRecord, Order), OrderDatabaseError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderDatabaseError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderDatabaseError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since order number {0} already exists")]
    OrderAlreadyExists(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested payment record {0} does not exist")]
    PaymentNotFound(i64),
    #[error("The requested refund record {0} does not exist")]
    RefundNotFound(i64),
    #[error("Precondition mismatch. {0}")]
    PreconditionMismatch(String),
    #[error("Order {0} already has a successful payment")]
    PaymentAlreadySucceeded(i64),
    #[error("Refund of {requested} against payment {payment_id} exceeds the refundable amount of {refundable}")]
    RefundExceedsPayment { payment_id: i64, requested: Money, refundable: Money },
    #[error("Illegal record status change. {0}")]
    RecordStatusUpdateError(String),
}

impl From<sqlx::Error> for OrderDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        OrderDatabaseError::DatabaseError(e.to_string())
    }
}
