use food_order_engine::{
    db_types::{Order, OrderStatusLog},
    EventProducers,
    OrderDatabase,
    OrderFlowApi,
    PaymentApi,
    PaymentGateway,
    RefundApi,
    SimulatedGateway,
    SqliteDatabase,
};
use log::*;

use super::{
    catalog::{noodle_order, seed_catalog, Catalog, CUSTOMER},
    prepare_env::{drop_database, prepare_test_env, random_db_path},
};

/// A fresh, migrated and seeded database, plus convenience constructors for the APIs under test.
pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub catalog: Catalog,
    pub producers: EventProducers,
}

impl std::fmt::Debug for TestSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TestSystem ({})", self.url)
    }
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        db.migrate().await.expect("Error running DB migrations");
        let catalog = seed_catalog(db.pool()).await;
        debug!("🚀️ Test database ready at {url}");
        Self { url, db, catalog, producers }
    }

    pub fn orders(&self) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), self.producers.clone())
    }

    pub fn payments<G: PaymentGateway>(&self, gateway: G) -> PaymentApi<SqliteDatabase, G> {
        PaymentApi::new(self.db.clone(), gateway, self.producers.clone())
    }

    pub fn refunds<G: PaymentGateway>(&self, gateway: G) -> RefundApi<SqliteDatabase, G> {
        RefundApi::new(self.db.clone(), gateway, self.producers.clone())
    }

    /// Places the standard noodle order for the customer and returns its id.
    pub async fn place_noodle_order(&self) -> i64 {
        let placed = self.orders().create_order(CUSTOMER, noodle_order(&self.catalog)).await.expect("Error placing order");
        placed.order_id
    }

    /// Places and pays for the standard noodle order.
    pub async fn place_paid_order(&self) -> i64 {
        let order_id = self.place_noodle_order().await;
        self.payments(SimulatedGateway::always_succeeds())
            .pay_order(order_id, CUSTOMER)
            .await
            .expect("Error paying for order");
        order_id
    }

    pub async fn order(&self, order_id: i64) -> Order {
        self.db.fetch_order(order_id).await.expect("Error fetching order").expect("Order does not exist")
    }

    pub async fn status_log(&self, order_id: i64) -> Vec<OrderStatusLog> {
        self.db.fetch_status_log(order_id).await.expect("Error fetching status log")
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        drop_database(&self.url).await;
    }
}
