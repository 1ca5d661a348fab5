use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{Operator, OrderStatusLog, OrderStatusType};

/// Appends an entry to the order status log. The log is append-only: the schema rejects updates and deletes.
///
/// This is not atomic. Always call it in the same transaction as the status change it records.
pub async fn append(
    order_id: i64,
    status: OrderStatusType,
    operator: Operator,
    remark: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderStatusLog, sqlx::Error> {
    let entry: OrderStatusLog = sqlx::query_as(
        r#"
        INSERT INTO order_status_log (order_id, order_status, operator, remark, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(status)
    .bind(operator.to_string())
    .bind(remark)
    .bind(at)
    .fetch_one(conn)
    .await?;
    trace!("📝️ Status log #{} for order {order_id}: {status} by {operator}", entry.id);
    Ok(entry)
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderStatusLog>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM order_status_log WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
