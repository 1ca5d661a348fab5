use crate::{
    db_types::{Address, Dish, Restaurant},
    traits::OrderDatabaseError,
};

/// Read-only access to the catalog data that orders are validated against.
///
/// Restaurants, dishes and addresses are owned by other parts of the system. The order engine only ever reads them,
/// and always reads the live values, so that an order is priced against what the restaurant charges *now*.
#[allow(async_fn_in_trait)]
pub trait CatalogLookup {
    /// Fetches the restaurant with the given id, active or not. Returns `None` if it does not exist.
    async fn fetch_restaurant(&self, restaurant_id: i64) -> Result<Option<Restaurant>, OrderDatabaseError>;

    /// Fetches the dish with the given id, but only if it is on the menu of the given restaurant.
    async fn fetch_dish(&self, dish_id: i64, restaurant_id: i64) -> Result<Option<Dish>, OrderDatabaseError>;

    /// Fetches the address with the given id, regardless of who owns it. Ownership checks are the caller's job.
    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, OrderDatabaseError>;
}
