use sqlx::SqliteConnection;

use crate::db_types::{NewOrderItem, OrderItem};

/// Inserts the items of an order. This is not atomic; run it inside the transaction that inserts the order.
pub async fn insert_items(
    order_id: i64,
    items: &[NewOrderItem],
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let row: OrderItem = sqlx::query_as(
            r#"
            INSERT INTO order_items (order_id, dish_id, dish_name, dish_image, price, quantity, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
            "#,
        )
        .bind(order_id)
        .bind(item.dish_id)
        .bind(&item.dish_name)
        .bind(&item.dish_image)
        .bind(item.price)
        .bind(item.quantity)
        .bind(item.subtotal)
        .fetch_one(&mut *conn)
        .await?;
        result.push(row);
    }
    Ok(result)
}

pub async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}
