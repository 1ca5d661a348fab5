use food_order_engine::{
    db_types::{Money, PaymentMethod},
    order_objects::{NewOrderRequest, OrderItemRequest},
};
use rust_decimal_macros::dec;
use sqlx::SqlitePool;

pub const CUSTOMER: i64 = 1;
pub const STRANGER: i64 = 2;
pub const MERCHANT: i64 = 50;

/// The rows seeded into every fresh test database.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub restaurant_id: i64,
    pub closed_restaurant_id: i64,
    pub other_restaurant_id: i64,
    /// 20.00
    pub noodles_id: i64,
    /// 7.50
    pub dumplings_id: i64,
    /// On the menu of the other restaurant
    pub pizza_id: i64,
    pub address_id: i64,
    pub stranger_address_id: i64,
}

pub async fn seed_catalog(pool: &SqlitePool) -> Catalog {
    let restaurant_id = insert_restaurant(pool, "Noodle House", true, Money::from(dec!(5.00)), 30, Some(MERCHANT)).await;
    let closed_restaurant_id = insert_restaurant(pool, "Closed Cafe", false, Money::from(dec!(3.00)), 20, None).await;
    let other_restaurant_id = insert_restaurant(pool, "Pizza Place", true, Money::from(dec!(4.00)), 40, None).await;
    let noodles_id = insert_dish(pool, restaurant_id, "Beef Noodles", Money::from(dec!(20.00))).await;
    let dumplings_id = insert_dish(pool, restaurant_id, "Dumplings", Money::from(dec!(7.50))).await;
    let pizza_id = insert_dish(pool, other_restaurant_id, "Margherita", Money::from(dec!(15.00))).await;
    let address_id = insert_address(pool, CUSTOMER, "Sam", "555-0100", "1 Main St").await;
    let stranger_address_id = insert_address(pool, STRANGER, "Alex", "555-0199", "9 Side St").await;
    Catalog {
        restaurant_id,
        closed_restaurant_id,
        other_restaurant_id,
        noodles_id,
        dumplings_id,
        pizza_id,
        address_id,
        stranger_address_id,
    }
}

pub async fn insert_restaurant(
    pool: &SqlitePool,
    name: &str,
    is_active: bool,
    delivery_fee: Money,
    avg_delivery_minutes: i64,
    merchant_id: Option<i64>,
) -> i64 {
    sqlx::query(
        "INSERT INTO restaurants (name, is_active, delivery_fee, avg_delivery_minutes, merchant_id) VALUES ($1, $2, \
         $3, $4, $5)",
    )
    .bind(name)
    .bind(is_active)
    .bind(delivery_fee)
    .bind(avg_delivery_minutes)
    .bind(merchant_id)
    .execute(pool)
    .await
    .expect("Error inserting restaurant")
    .last_insert_rowid()
}

pub async fn insert_dish(pool: &SqlitePool, restaurant_id: i64, name: &str, price: Money) -> i64 {
    sqlx::query("INSERT INTO dishes (restaurant_id, name, price) VALUES ($1, $2, $3)")
        .bind(restaurant_id)
        .bind(name)
        .bind(price)
        .execute(pool)
        .await
        .expect("Error inserting dish")
        .last_insert_rowid()
}

pub async fn insert_address(pool: &SqlitePool, user_id: i64, name: &str, phone: &str, address: &str) -> i64 {
    sqlx::query("INSERT INTO addresses (user_id, contact_name, contact_phone, full_address) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(name)
        .bind(phone)
        .bind(address)
        .execute(pool)
        .await
        .expect("Error inserting address")
        .last_insert_rowid()
}

pub async fn set_dish_price(pool: &SqlitePool, dish_id: i64, price: Money) {
    sqlx::query("UPDATE dishes SET price = $1 WHERE id = $2")
        .bind(price)
        .bind(dish_id)
        .execute(pool)
        .await
        .expect("Error updating dish price");
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let (count,): (i64,) =
        sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}")).fetch_one(pool).await.expect("Error counting rows");
    count
}

/// Two bowls of noodles at 20.00 with the 5.00 delivery fee: 40.00 + 5.00 = 45.00, delivered asap, paid from the
/// account balance.
pub fn noodle_order(catalog: &Catalog) -> NewOrderRequest {
    NewOrderRequest {
        restaurant_id: catalog.restaurant_id,
        address_id: catalog.address_id,
        items: vec![OrderItemRequest {
            dish_id: catalog.noodles_id,
            name: "Beef Noodles".into(),
            price: Money::from(dec!(20.00)),
            quantity: 2,
        }],
        payment_method: PaymentMethod::Balance,
        delivery_time: "asap".into(),
        subtotal: Money::from(dec!(40.00)),
        delivery_fee: Money::from(dec!(5.00)),
        total: Money::from(dec!(45.00)),
        note: Some("no chilli".into()),
    }
}
