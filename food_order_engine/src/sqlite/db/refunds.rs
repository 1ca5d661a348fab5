use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewRefundRecord, RefundRecord, RefundStatus},
    traits::OrderDatabaseError,
};

pub async fn insert_refund(
    refund: NewRefundRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<RefundRecord, OrderDatabaseError> {
    let record: RefundRecord = sqlx::query_as(
        r#"
        INSERT INTO refund_records (
            order_id,
            payment_id,
            refund_amount,
            refund_reason,
            refund_type,
            processor_type,
            refund_transaction_id,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *;
        "#,
    )
    .bind(refund.order_id)
    .bind(refund.payment_id)
    .bind(refund.refund_amount)
    .bind(&refund.refund_reason)
    .bind(refund.refund_type)
    .bind(&refund.processor_type)
    .bind(&refund.refund_transaction_id)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => OrderDatabaseError::DatabaseError(format!(
            "Duplicate refund transaction id {}",
            refund.refund_transaction_id
        )),
        e => OrderDatabaseError::from(e),
    })?;
    debug!(
        "💸️ Refund record #{} [{}] of {} created against payment #{}",
        record.id, record.refund_transaction_id, record.refund_amount, record.payment_id
    );
    Ok(record)
}

pub async fn fetch_refund(id: i64, conn: &mut SqliteConnection) -> Result<Option<RefundRecord>, sqlx::Error> {
    let refund = sqlx::query_as("SELECT * FROM refund_records WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(refund)
}

pub async fn fetch_refunds_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<RefundRecord>, sqlx::Error> {
    let refunds = sqlx::query_as("SELECT * FROM refund_records WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(refunds)
}

pub async fn fetch_refunds_for_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<RefundRecord>, sqlx::Error> {
    let refunds = sqlx::query_as("SELECT * FROM refund_records WHERE payment_id = $1 ORDER BY id ASC")
        .bind(payment_id)
        .fetch_all(conn)
        .await?;
    Ok(refunds)
}

/// Settles a `PENDING` refund record. Returns `None` if the record was already settled.
pub async fn settle_refund(
    id: i64,
    status: RefundStatus,
    completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<RefundRecord>, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
        UPDATE refund_records SET refund_status = $1, completed_at = $2, updated_at = $3
        WHERE id = $4 AND refund_status = 'PENDING'
        RETURNING *;
        "#,
    )
    .bind(status)
    .bind(completed_at)
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}
