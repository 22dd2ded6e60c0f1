//! Row types for boards, topics, messages and the entities that reference
//! them.
//!
//! These mirror what the store persists. The engine never creates messages
//! other than redirect placeholders; everything else is produced by the
//! posting subsystem and only reshaped here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  board::BoardTotals,
  ids::{BoardId, MemberId, MessageId, PollId, TopicId},
};

// ─── Boards ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
  pub id:     BoardId,
  pub name:   String,
  /// Denormalised counters kept in sync with the board's topics.
  pub totals: BoardTotals,
}

// ─── Messages ────────────────────────────────────────────────────────────────

/// A single post. The id is immutable; split and merge only rewrite the
/// owning topic, the board, and occasionally the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub id:          MessageId,
  pub topic_id:    TopicId,
  pub board_id:    BoardId,
  /// Unapproved messages are hidden from ordinary members until moderated.
  pub approved:    bool,
  pub poster_id:   MemberId,
  pub poster_name: String,
  pub posted_at:   DateTime<Utc>,
  pub subject:     String,
  pub body:        String,
  pub icon:        String,
}

// ─── Topics ──────────────────────────────────────────────────────────────────

/// A thread of messages plus its denormalised aggregate columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
  pub id:                  TopicId,
  pub board_id:            BoardId,
  /// Cached subject of the first message.
  pub subject:             String,
  pub first_msg_id:        MessageId,
  pub last_msg_id:         MessageId,
  pub num_replies:         u32,
  pub unapproved_posts:    u32,
  pub approved:            bool,
  pub is_sticky:           bool,
  pub is_locked:           bool,
  pub num_views:           u32,
  pub poll_id:             Option<PollId>,
  /// Set when the topic has been retired into a placeholder pointing here.
  pub redirect_topic_id:   Option<TopicId>,
  /// `None` means the redirect never expires.
  pub redirect_expires_at: Option<DateTime<Utc>>,
  pub created_at:          DateTime<Utc>,
}

impl Topic {
  pub fn is_redirect(&self) -> bool { self.redirect_topic_id.is_some() }
}

// ─── Per-member topic state ──────────────────────────────────────────────────

/// A topic-level notification subscription. Board-level subscriptions are
/// never touched by split or merge and are not modelled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSubscription {
  pub member_id: MemberId,
  pub topic_id:  TopicId,
  /// A notification has already gone out and no new one fires until the
  /// member visits the topic again.
  pub sent:      bool,
}

/// How far a member has read into a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadMark {
  pub member_id:        MemberId,
  pub topic_id:         TopicId,
  pub last_read_msg_id: MessageId,
  pub unwatched:        bool,
}

// ─── Referencing records ─────────────────────────────────────────────────────

/// A moderator report filed against one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedPost {
  pub report_id: i64,
  pub msg_id:    MessageId,
  pub topic_id:  TopicId,
  pub board_id:  BoardId,
}

/// A calendar event whose discussion lives in a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarLink {
  pub event_id: i64,
  pub title:    String,
  pub topic_id: TopicId,
  pub board_id: BoardId,
}

// ─── Moderation log ──────────────────────────────────────────────────────────

/// Kind of moderation action. The string form is what the log stores.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModerationAction {
  Split,
  Merge,
}

/// Input to [`crate::hooks::ModerationLog::log_action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogAction {
  pub action:    ModerationAction,
  pub member_id: MemberId,
  pub topic_id:  TopicId,
  pub board_id:  BoardId,
  /// The topic created (split) or kept (merge) by the action.
  pub new_topic: Option<TopicId>,
}

/// A persisted moderation log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationLogEntry {
  pub action_id: i64,
  pub action:    ModerationAction,
  pub member_id: MemberId,
  pub topic_id:  TopicId,
  pub board_id:  BoardId,
  pub new_topic: Option<TopicId>,
  pub logged_at: DateTime<Utc>,
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotifyEvent {
  Split,
  Merge,
}
