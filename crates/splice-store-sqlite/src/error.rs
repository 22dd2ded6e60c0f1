//! Error type for `splice-store-sqlite`.

use splice_core::{ids::TopicId, store::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] splice_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },

  /// Redirect stubs and locked topics accept no replies.
  #[error("topic {0} is locked")]
  TopicLocked(TopicId),

  #[error("poll {poll} has no choice #{choice}")]
  PollChoiceNotFound { poll: i64, choice: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<tokio_rusqlite::Error> for Error {
  /// Unwrap errors that were boxed by [`lift`] inside a connection call.
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Error>() {
        Ok(own) => *own,
        Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
      },
      other => Error::Database(other),
    }
  }
}

impl StoreError for Error {
  fn as_core(&self) -> Option<&splice_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

/// Box a domain error so it can cross the `tokio_rusqlite` call boundary.
pub(crate) fn lift(err: impl Into<Error>) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(err.into()))
}
