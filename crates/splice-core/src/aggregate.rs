//! The topic aggregate: first/last message, reply and unapproved counts, and
//! the topic's approval state, derived from its message set.
//!
//! A topic is approved from its first visible message onward. An unapproved
//! message never becomes the canonical first message while an approved one
//! exists, but unapproved messages that precede the first approved message
//! make the whole topic unapproved.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  board::BoardTotals,
  ids::MessageId,
  model::Message,
};

/// The only parts of a message the calculator looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageState {
  pub id:       MessageId,
  pub approved: bool,
}

impl MessageState {
  pub fn approved(id: i64) -> Self { Self { id: MessageId(id), approved: true } }

  pub fn unapproved(id: i64) -> Self { Self { id: MessageId(id), approved: false } }
}

impl From<&Message> for MessageState {
  fn from(m: &Message) -> Self { Self { id: m.id, approved: m.approved } }
}

/// Canonical denormalised values for one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicAggregate {
  pub first_msg:        MessageId,
  pub last_msg:         MessageId,
  pub num_replies:      u32,
  pub unapproved_posts: u32,
  pub approved:         bool,
  /// Number of approved messages; feeds the board's post counter.
  pub approved_posts:   u32,
}

impl TopicAggregate {
  /// What this topic contributes to its board's counters.
  pub fn board_totals(&self) -> BoardTotals {
    BoardTotals {
      num_topics:        u32::from(self.approved),
      unapproved_topics: u32::from(!self.approved),
      num_posts:         self.approved_posts,
      unapproved_posts:  self.unapproved_posts,
    }
  }

  /// The aggregate of a redirect stub: one approved placeholder message.
  pub fn redirect_stub(msg: MessageId) -> Self {
    Self {
      first_msg:        msg,
      last_msg:         msg,
      num_replies:      0,
      unapproved_posts: 0,
      approved:         true,
      approved_posts:   1,
    }
  }
}

/// Compute the aggregate for `messages`.
///
/// Fails with [`Error::EmptyPartition`] when `messages` is empty; callers
/// must guarantee every resulting topic keeps at least one message.
pub fn compute_aggregate(messages: &[MessageState]) -> Result<TopicAggregate> {
  let (approved, unapproved): (Vec<MessageState>, Vec<MessageState>) =
    messages.iter().partition(|m| m.approved);

  let unapproved_posts = count(unapproved.len());

  let first_approved = approved.iter().map(|m| m.id).min();
  let last_approved = approved.iter().map(|m| m.id).max();

  match (first_approved, last_approved) {
    (Some(first_msg), Some(last_msg)) => {
      let earlier_unapproved =
        count(unapproved.iter().filter(|m| m.id < first_msg).count());
      let approved_posts = count(approved.len());

      Ok(TopicAggregate {
        first_msg,
        last_msg,
        num_replies: approved_posts - 1 + earlier_unapproved,
        unapproved_posts,
        approved: earlier_unapproved == 0,
        approved_posts,
      })
    }
    _ => {
      let first_msg = messages.iter().map(|m| m.id).min().ok_or(Error::EmptyPartition)?;
      let last_msg = messages.iter().map(|m| m.id).max().ok_or(Error::EmptyPartition)?;

      Ok(TopicAggregate {
        first_msg,
        last_msg,
        num_replies: 0,
        unapproved_posts,
        approved: false,
        approved_posts: 0,
      })
    }
  }
}

/// Convenience wrapper over full message rows.
pub fn aggregate_messages<'a>(
  messages: impl IntoIterator<Item = &'a Message>,
) -> Result<TopicAggregate> {
  let states: Vec<MessageState> = messages.into_iter().map(MessageState::from).collect();
  compute_aggregate(&states)
}

fn count(n: usize) -> u32 { u32::try_from(n).unwrap_or(u32::MAX) }
