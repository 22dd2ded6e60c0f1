//! SQLite backend for the splice engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Split and merge each run inside one
//! `BEGIN IMMEDIATE` transaction on that thread.

mod encode;
mod merge;
mod queries;
mod schema;
mod seed;
mod split;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use seed::{NewPost, PostTarget};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
