//! Partition planning for splitting one topic into two.
//!
//! [`plan_split`] is a pure function over the source topic and its current
//! messages. It decides what moves, recomputes both aggregates, and derives
//! the board deltas; the store applies the plan inside its transaction.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  aggregate::{TopicAggregate, aggregate_messages},
  board::{BoardDeltas, reconcile_board_totals},
  ids::{BoardId, MemberId, MessageId, TopicId},
  model::{Message, Topic},
  settings::EngineSettings,
  subject::{enforced_subjects, normalize_subject},
};

// ─── Request ─────────────────────────────────────────────────────────────────

/// Which messages move to the new topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "messages", rename_all = "snake_case")]
pub enum SplitSelection {
  /// A single message.
  Only(MessageId),
  /// The given message and every later one.
  From(MessageId),
  /// An arbitrary subset picked by the moderator.
  Selected(BTreeSet<MessageId>),
}

impl SplitSelection {
  /// Resolve against the topic's current messages. Every referenced id must
  /// still belong to the topic, which catches stale client-side selections.
  pub fn resolve(&self, topic: TopicId, messages: &[Message]) -> Result<BTreeSet<MessageId>> {
    let present: BTreeSet<MessageId> = messages.iter().map(|m| m.id).collect();
    let require = |id: MessageId| {
      if present.contains(&id) {
        Ok(id)
      } else {
        Err(Error::MessageNotInTopic { topic, message: id })
      }
    };

    match self {
      Self::Only(id) => Ok(BTreeSet::from([require(*id)?])),
      Self::From(id) => {
        let from = require(*id)?;
        Ok(present.range(from..).copied().collect())
      }
      Self::Selected(ids) => {
        if ids.is_empty() {
          return Err(Error::EmptySelection);
        }
        ids.iter().map(|id| require(*id)).collect()
      }
    }
  }
}

/// Input to [`crate::store::ForumStore::split_topic`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRequest {
  /// The moderator performing the split.
  pub actor:        MemberId,
  pub topic_id:     TopicId,
  pub selection:    SplitSelection,
  /// Subject of the new topic.
  pub subject:      String,
  /// Board for the new topic; defaults to the source topic's board.
  pub target_board: Option<BoardId>,
}

impl SplitRequest {
  /// Checks that need no stored state.
  pub fn validate(&self) -> Result<()> {
    if let SplitSelection::Selected(ids) = &self.selection
      && ids.is_empty()
    {
      return Err(Error::EmptySelection);
    }
    if self.subject.trim().is_empty() {
      return Err(Error::EmptySubject);
    }
    Ok(())
  }
}

// ─── Plan ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
  pub source_topic:    TopicId,
  pub source_board:    BoardId,
  pub target_board:    BoardId,
  pub moved:           BTreeSet<MessageId>,
  pub remaining:       TopicAggregate,
  pub moved_aggregate: TopicAggregate,
  /// Normalised subject of the new topic.
  pub subject:         String,
  /// New subjects for every moved message.
  pub subject_updates: Vec<(MessageId, String)>,
  pub board_deltas:    BoardDeltas,
}

/// Plan splitting `request.selection` out of `topic`.
///
/// `messages` must be every message currently in `topic`.
pub fn plan_split(
  topic: &Topic,
  messages: &[Message],
  request: &SplitRequest,
  settings: &EngineSettings,
) -> Result<SplitPlan> {
  if let Some(stray) = messages.iter().find(|m| m.topic_id != topic.id) {
    return Err(Error::ConsistencyViolation(format!(
      "message {} loaded for topic {} belongs to topic {}",
      stray.id, topic.id, stray.topic_id
    )));
  }

  let moved = request.selection.resolve(topic.id, messages)?;

  if moved.contains(&topic.first_msg_id) {
    return Err(Error::WouldOrphanTopic { topic: topic.id, first_msg: topic.first_msg_id });
  }
  if moved.len() == messages.len() {
    return Err(Error::SelectedAllMessages(topic.id));
  }

  let subject = normalize_subject(&request.subject, settings.subject_max_chars)?;

  let before = aggregate_messages(messages)?;
  let remaining = aggregate_messages(messages.iter().filter(|m| !moved.contains(&m.id)))?;
  let moved_aggregate = aggregate_messages(messages.iter().filter(|m| moved.contains(&m.id)))?;

  if remaining.first_msg != topic.first_msg_id {
    tracing::error!(
      topic = %topic.id,
      stored_first = %topic.first_msg_id,
      computed_first = %remaining.first_msg,
      "remaining messages no longer anchor on the stored first message",
    );
    return Err(Error::WouldOrphanTopic { topic: topic.id, first_msg: topic.first_msg_id });
  }

  let target_board = request.target_board.unwrap_or(topic.board_id);

  let board_deltas = reconcile_board_totals(
    &[(topic.board_id, before.board_totals())],
    &[
      (topic.board_id, remaining.board_totals()),
      (target_board, moved_aggregate.board_totals()),
    ],
  );

  let subject_updates = enforced_subjects(
    moved_aggregate.first_msg,
    moved.iter().copied(),
    &subject,
    &settings.reply_prefix,
  );

  Ok(SplitPlan {
    source_topic: topic.id,
    source_board: topic.board_id,
    target_board,
    moved,
    remaining,
    moved_aggregate,
    subject,
    subject_updates,
    board_deltas,
  })
}
