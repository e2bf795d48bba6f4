//! SQLite backend for the verbal case-records store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each store call is one closure on that
//! thread; aggregate mutations run inside a single transaction.

mod browse;
mod encode;
mod read;
mod schema;
mod sql;
mod store;
mod write;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
