//! #  Database management and control.
//!
//! This module defines the interface contracts of the order engine database *backends*.
//!
//! * [`OrderDatabase`] is the main backend trait. It stores orders and their items, payment and refund attempts, and
//!   the order status log, and guarantees that every multi-row change is atomic.
//! * [`CatalogLookup`] provides read-only access to restaurants, dishes and addresses, which are owned by other parts
//!   of the system.
mod catalog_lookup;
mod order_database;

pub use catalog_lookup::CatalogLookup;
pub use order_database::{OrderDatabase, OrderDatabaseError};
