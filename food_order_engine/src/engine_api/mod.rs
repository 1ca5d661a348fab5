//! # Food order engine public API
//!
//! The `engine_api` module exposes the programmatic API of the order engine. The API is modular, so that clients can
//! pick the parts they need.
//!
//! * [`order_flow_api`] places orders and handles the status changes that are not driven by money: cancelling an
//!   unpaid order, merchant and rider progress updates, and delivery confirmation. It also serves order details and
//!   history.
//! * [`payment_api`] charges an order through a payment gateway.
//! * [`refund_api`] returns money for a paid order through the same gateway.
//!
//! A gateway call that times out leaves its payment or refund `PENDING`. Once the real outcome is known, an operator
//! settles it with `reconcile_payment` or `reconcile_refund`.
//!
//! # API usage
//!
//! Every API object is created by supplying a database backend that implements
//! [`OrderDatabase`](crate::traits::OrderDatabase), plus a gateway for the payment and refund APIs.
//!
//! ```rust,ignore
//! use food_order_engine::{EngineConfig, EventProducers, OrderFlowApi, PaymentApi, SimulatedGateway, SqliteDatabase};
//! let config = EngineConfig::from_env_or_default();
//! let db = SqliteDatabase::new_from_config(&config).await?;
//! let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
//! let payments = PaymentApi::new(db, SimulatedGateway::from_config(&config.gateway), EventProducers::default());
//! let placed = orders.create_order(user_id, request).await?;
//! let paid = payments.pay_order(placed.order_id, user_id).await?;
//! ```
pub mod errors;
mod order_assembler;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
pub mod refund_api;
