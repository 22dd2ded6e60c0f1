//! Integer identifiers for the stored entities.
//!
//! Ids are assigned by the store in ascending order, so comparing two topic
//! ids also compares their creation order. Merges rely on that to pick the
//! surviving topic.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
    }

    impl From<i64> for $name {
      fn from(raw: i64) -> Self { Self(raw) }
    }
  };
}

id_type!(
  /// Identifies a board (a forum section holding topics).
  BoardId
);
id_type!(
  /// Identifies a topic.
  TopicId
);
id_type!(
  /// Identifies a single message.
  MessageId
);
id_type!(
  /// Identifies a member account.
  MemberId
);
id_type!(PollId);
