//! Food Order Engine
//!
//! The order engine is the core of the food ordering backend. It turns a customer's basket into a priced, validated
//! order, takes payment for it, moves it through the kitchen and delivery, and refunds it if need be.
//!
//! The library is divided into the following sections:
//! 1. The order lifecycle rules ([`order_state`]). These are pure functions that decide whether a status change is
//!    legal and what it changes.
//! 2. Database backends ([`traits`] and [`SqliteDatabase`]). Every multi-row change is a single transaction, and every
//!    status change is a compare-and-set, so concurrent requests cannot both win.
//! 3. Payment gateways ([`gateway`]). The engine ships with a simulated gateway only.
//! 4. The public API: [`OrderFlowApi`], [`PaymentApi`] and [`RefundApi`].
//!
//! The engine also emits [`events`] after each committed change, so that other parts of the system can react to
//! them.
pub mod config;
pub mod db_types;
mod engine_api;
pub mod events;
pub mod gateway;
pub mod helpers;
pub mod order_state;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{EngineConfig, GatewayConfig};
pub use engine_api::{
    errors::{ErrorKind, OrderFlowError},
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_api::PaymentApi,
    refund_api::RefundApi,
};
pub use events::{EventHandlers, EventHooks, EventProducers};
pub use gateway::{PaymentGateway, SimulatedGateway};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{CatalogLookup, OrderDatabase, OrderDatabaseError};
