//! Order lifecycle events.
//!
//! Other parts of the system can register hooks with [`EventHooks`] to be told when an order is created, paid,
//! refunded, or changes status. Events are only published after the database transaction that caused them has been
//! committed.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers, HookFuture};
