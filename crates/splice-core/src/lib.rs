//! Core types and algorithms for splitting and merging discussion topics.
//!
//! The planners and calculators here are pure functions over loaded rows.
//! Every store mutation happens inside a [`store::ForumStore`]
//! implementation, and the [`moderator::Moderator`] sequences the store call
//! and the post-commit hooks.

// Hook and store impls are written as `async fn`; the trait declarations
// carry the `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod board;
pub mod error;
pub mod hooks;
pub mod ids;
pub mod merge;
pub mod model;
pub mod moderator;
pub mod redirect;
pub mod settings;
pub mod split;
pub mod store;
pub mod subject;

pub use error::{Error, ErrorClass, Result};
