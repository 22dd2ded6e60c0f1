//! Error types for `splice-core`.

use thiserror::Error;

use crate::ids::{BoardId, MessageId, PollId, TopicId};

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ──────────────────────────────────────────────────────────
  #[error("no messages were selected")]
  EmptySelection,

  #[error("message {message} does not belong to topic {topic}")]
  MessageNotInTopic { topic: TopicId, message: MessageId },

  #[error("splitting off message {first_msg} would orphan topic {topic}")]
  WouldOrphanTopic { topic: TopicId, first_msg: MessageId },

  #[error("every message of topic {0} was selected; nothing would remain")]
  SelectedAllMessages(TopicId),

  #[error("at least two distinct topics are required, got {0}")]
  InsufficientTopics(usize),

  #[error("topic {0} is a redirect stub and cannot be merged")]
  ContainsRedirectStub(TopicId),

  #[error("board {0} is not a permitted merge target")]
  TargetBoardNotPermitted(BoardId),

  #[error("poll {0} does not belong to any of the merged topics")]
  TargetPollNotAmongSources(PollId),

  #[error("several merged topics carry polls; one must be chosen")]
  AmbiguousPoll,

  #[error("topic {0} is not among the merged topics")]
  SubjectNotAmongSources(TopicId),

  #[error("subject is empty")]
  EmptySubject,

  #[error("topic not found: {0}")]
  TopicNotFound(TopicId),

  #[error("board not found: {0}")]
  BoardNotFound(BoardId),

  // ── Consistency ─────────────────────────────────────────────────────────
  /// A caller asked for the aggregate of a topic with no messages.
  #[error("cannot compute an aggregate over an empty message set")]
  EmptyPartition,

  #[error("consistency violation: {0}")]
  ConsistencyViolation(String),
}

/// Coarse classification used for logging and caller retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// Bad input; nothing was written.
  Validation,
  /// An invariant failed mid-operation; the transaction was aborted.
  Consistency,
}

impl Error {
  pub fn class(&self) -> ErrorClass {
    match self {
      Self::ConsistencyViolation(_) | Self::EmptyPartition => ErrorClass::Consistency,
      _ => ErrorClass::Validation,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
