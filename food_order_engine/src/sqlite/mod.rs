//! SQLite backend for the food order engine.
//!
//! [`SqliteDatabase`] implements [`crate::traits::OrderDatabase`] and [`crate::traits::CatalogLookup`] on top of an
//! `sqlx` connection pool. The query functions it is built from live in [`db`].
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
