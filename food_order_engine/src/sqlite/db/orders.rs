use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderPaymentStatus},
    order_state::StatusChange,
};

/// Inserts a new order row using the given connection. The order starts out `CREATED` with payment `PENDING`.
///
/// This is not atomic, and does not insert the order items or the first status log entry. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                user_id,
                restaurant_id,
                restaurant_name,
                address_id,
                contact_name,
                contact_phone,
                delivery_address,
                payment_method,
                subtotal,
                delivery_fee,
                total_amount,
                note,
                estimated_delivery_time,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *;
        "#,
    )
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(order.restaurant_id)
    .bind(&order.restaurant_name)
    .bind(order.address_id)
    .bind(&order.contact_name)
    .bind(&order.contact_phone)
    .bind(&order.delivery_address)
    .bind(order.payment_method)
    .bind(order.subtotal)
    .bind(order.delivery_fee)
    .bind(order.total_amount)
    .bind(&order.note)
    .bind(order.estimated_delivery_time)
    .bind(order.created_at)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order [{}] inserted with id {}", order.order_number, order.id);
    Ok(order)
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Applies a planned status change to the order, but only if the order is still in the state the change was planned
/// against. Returns `None` if the order has moved on (or does not exist), in which case nothing was written.
///
/// Timestamps that the change does not set are left as they are.
pub async fn apply_status_change(
    change: &StatusChange,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            order_status = $1,
            payment_status = $2,
            paid_at = COALESCE($3, paid_at),
            completed_at = COALESCE($4, completed_at),
            actual_delivery_time = COALESCE($5, actual_delivery_time),
            cancelled_at = COALESCE($6, cancelled_at),
            updated_at = $7
        WHERE id = $8 AND order_status = $9 AND payment_status = $10
        RETURNING *;
        "#,
    )
    .bind(change.to)
    .bind(change.new_payment_status)
    .bind(change.paid_at)
    .bind(change.completed_at)
    .bind(change.actual_delivery_time)
    .bind(change.cancelled_at)
    .bind(change.changed_at)
    .bind(change.order_id)
    .bind(change.from)
    .bind(change.expected_payment_status)
    .fetch_optional(conn)
    .await?;
    trace!(
        "📝️ Status change {} -> {} on order {}: {}",
        change.from,
        change.to,
        change.order_id,
        if order.is_some() { "applied" } else { "rejected" }
    );
    Ok(order)
}

/// Moves the order's payment status from `from` to `to` without touching the order status. Returns `None` if the
/// payment status was not `from`.
pub async fn set_payment_status(
    order_id: i64,
    from: OrderPaymentStatus,
    to: OrderPaymentStatus,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET payment_status = $1, updated_at = $2
        WHERE id = $3 AND payment_status = $4
        RETURNING *;
        "#,
    )
    .bind(to)
    .bind(at)
    .bind(order_id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
