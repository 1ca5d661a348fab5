use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPaymentRecord, PaymentRecord, PaymentStatus},
    traits::OrderDatabaseError,
};

/// Inserts a new `PENDING` payment record. A duplicate transaction id yields
/// [`OrderDatabaseError::DatabaseError`] rather than a silent overwrite.
pub async fn insert_payment(
    payment: NewPaymentRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, OrderDatabaseError> {
    let record: PaymentRecord = sqlx::query_as(
        r#"
        INSERT INTO payment_records (order_id, payment_method, payment_amount, transaction_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.payment_method)
    .bind(payment.payment_amount)
    .bind(&payment.transaction_id)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            OrderDatabaseError::DatabaseError(format!("Duplicate payment transaction id {}", payment.transaction_id))
        },
        sqlx::Error::Database(err) if err.is_foreign_key_violation() => {
            OrderDatabaseError::OrderNotFound(payment.order_id)
        },
        e => OrderDatabaseError::from(e),
    })?;
    debug!("💰️ Payment record #{} [{}] created for order {}", record.id, record.transaction_id, record.order_id);
    Ok(record)
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payment_records WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payments_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentRecord>, sqlx::Error> {
    let payments = sqlx::query_as("SELECT * FROM payment_records WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

/// Returns the one successful payment for the order, if there is one.
pub async fn fetch_successful_payment(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payment_records WHERE order_id = $1 AND payment_status = 'SUCCESS'")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// Settles a `PENDING` payment record. Records that have already been settled are never changed, and `None` is
/// returned for them.
///
/// Marking a second payment for the same order as `SUCCESS` violates the `payment_records_one_success` index, and the
/// unique violation is passed back to the caller.
pub async fn settle_payment(
    id: i64,
    status: PaymentStatus,
    payment_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
        UPDATE payment_records SET payment_status = $1, payment_time = $2, updated_at = $3
        WHERE id = $4 AND payment_status = 'PENDING'
        RETURNING *;
        "#,
    )
    .bind(status)
    .bind(payment_time)
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}
