use sqlx::SqliteConnection;

use crate::db_types::{Address, Dish, Restaurant};

pub async fn fetch_restaurant(id: i64, conn: &mut SqliteConnection) -> Result<Option<Restaurant>, sqlx::Error> {
    let restaurant = sqlx::query_as(
        r#"
        SELECT id, name, is_active, delivery_fee, avg_delivery_minutes, merchant_id
        FROM restaurants WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(restaurant)
}

pub async fn fetch_dish(
    dish_id: i64,
    restaurant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Dish>, sqlx::Error> {
    let dish = sqlx::query_as(
        r#"
        SELECT id, restaurant_id, name, image, price
        FROM dishes WHERE id = $1 AND restaurant_id = $2
        "#,
    )
    .bind(dish_id)
    .bind(restaurant_id)
    .fetch_optional(conn)
    .await?;
    Ok(dish)
}

pub async fn fetch_address(id: i64, conn: &mut SqliteConnection) -> Result<Option<Address>, sqlx::Error> {
    let address = sqlx::query_as(
        r#"
        SELECT id, user_id, contact_name, contact_phone, full_address
        FROM addresses WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(address)
}
