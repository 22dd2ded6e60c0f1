//! The `ForumStore` trait and the outcomes of its transactional operations.
//!
//! The trait is implemented by storage backends (e.g. `splice-store-sqlite`).
//! A backend must run each of [`ForumStore::split_topic`] and
//! [`ForumStore::merge_topics`] as a single transaction: load the affected
//! rows, plan with [`crate::split::plan_split`] / [`crate::merge::plan_merge`],
//! and write every change, or write nothing at all.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  board::BoardDeltas,
  ids::{BoardId, MessageId, PollId, TopicId},
  merge::MergeRequest,
  model::{Board, Message, Topic},
  settings::EngineSettings,
  split::SplitRequest,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of a committed split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitOutcome {
  /// The source topic as stored after the split.
  pub source:       Topic,
  pub new_topic:    Topic,
  pub moved:        Vec<MessageId>,
  pub board_deltas: BoardDeltas,
}

/// Result of a committed merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
  pub survivor:         Topic,
  /// Every merged topic id, survivor included.
  pub sources:          Vec<TopicId>,
  /// Redirect stubs left behind, if requested.
  pub redirects:        Vec<Topic>,
  /// Sources deleted outright.
  pub deleted_topics:   Vec<TopicId>,
  pub deleted_polls:    Vec<PollId>,
  /// Every message now in the survivor.
  pub messages:         Vec<MessageId>,
  pub subject_override: Option<String>,
  pub board_deltas:     BoardDeltas,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Backend errors must expose the domain error they wrap so callers can tell
/// validation failures from store failures.
pub trait StoreError: std::error::Error + From<crate::Error> + Send + Sync + 'static {
  fn as_core(&self) -> Option<&crate::Error>;
}

/// Abstraction over the forum database.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ForumStore: Send + Sync {
  type Error: StoreError;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_topic(
    &self,
    id: TopicId,
  ) -> impl Future<Output = Result<Option<Topic>, Self::Error>> + Send + '_;

  /// All messages of a topic, ascending by id.
  fn topic_messages(
    &self,
    id: TopicId,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  fn get_board(
    &self,
    id: BoardId,
  ) -> impl Future<Output = Result<Option<Board>, Self::Error>> + Send + '_;

  // ── Transactional operations ──────────────────────────────────────────

  /// Move the selected messages into a new topic, recomputing both topics'
  /// aggregates and the affected board counters atomically.
  fn split_topic(
    &self,
    request: SplitRequest,
    settings: EngineSettings,
  ) -> impl Future<Output = Result<SplitOutcome, Self::Error>> + Send + '_;

  /// Merge the requested topics into the lowest-id one, redistributing every
  /// referencing row and retiring the other sources atomically.
  fn merge_topics(
    &self,
    request: MergeRequest,
    settings: EngineSettings,
  ) -> impl Future<Output = Result<MergeOutcome, Self::Error>> + Send + '_;
}
