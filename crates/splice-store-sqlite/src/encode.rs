//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, booleans as 0/1 integers, and
//! ids as plain integers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use splice_core::{
  board::BoardTotals,
  ids::{BoardId, MemberId, MessageId, PollId, TopicId},
  model::{Board, Message, ModerationAction, ModerationLogEntry, Topic},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Counters ────────────────────────────────────────────────────────────────

/// Counter columns are never negative in practice; clamp rather than fail.
pub fn decode_count(v: i64) -> u32 { u32::try_from(v.max(0)).unwrap_or(u32::MAX) }

// ─── ModerationAction ────────────────────────────────────────────────────────

pub fn decode_action(s: &str) -> Result<ModerationAction> {
  ModerationAction::from_str(s)
    .map_err(|_| Error::UnknownValue { column: "log_actions.action", value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `topics` row.
pub struct RawTopic {
  pub topic_id:            i64,
  pub board_id:            i64,
  pub subject:             String,
  pub first_msg_id:        i64,
  pub last_msg_id:         i64,
  pub num_replies:         i64,
  pub unapproved_posts:    i64,
  pub approved:            bool,
  pub is_sticky:           bool,
  pub is_locked:           bool,
  pub num_views:           i64,
  pub poll_id:             Option<i64>,
  pub redirect_topic_id:   Option<i64>,
  pub redirect_expires_at: Option<String>,
  pub created_at:          String,
}

impl RawTopic {
  pub const COLUMNS: &'static str = "topic_id, board_id, subject, first_msg_id, last_msg_id,
    num_replies, unapproved_posts, approved, is_sticky, is_locked, num_views,
    poll_id, redirect_topic_id, redirect_expires_at, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      topic_id:            row.get(0)?,
      board_id:            row.get(1)?,
      subject:             row.get(2)?,
      first_msg_id:        row.get(3)?,
      last_msg_id:         row.get(4)?,
      num_replies:         row.get(5)?,
      unapproved_posts:    row.get(6)?,
      approved:            row.get(7)?,
      is_sticky:           row.get(8)?,
      is_locked:           row.get(9)?,
      num_views:           row.get(10)?,
      poll_id:             row.get(11)?,
      redirect_topic_id:   row.get(12)?,
      redirect_expires_at: row.get(13)?,
      created_at:          row.get(14)?,
    })
  }

  pub fn into_topic(self) -> Result<Topic> {
    Ok(Topic {
      id:                  TopicId(self.topic_id),
      board_id:            BoardId(self.board_id),
      subject:             self.subject,
      first_msg_id:        MessageId(self.first_msg_id),
      last_msg_id:         MessageId(self.last_msg_id),
      num_replies:         decode_count(self.num_replies),
      unapproved_posts:    decode_count(self.unapproved_posts),
      approved:            self.approved,
      is_sticky:           self.is_sticky,
      is_locked:           self.is_locked,
      num_views:           decode_count(self.num_views),
      poll_id:             self.poll_id.map(PollId),
      redirect_topic_id:   self.redirect_topic_id.map(TopicId),
      redirect_expires_at: self.redirect_expires_at.as_deref().map(decode_dt).transpose()?,
      created_at:          decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `messages` row.
pub struct RawMessage {
  pub msg_id:      i64,
  pub topic_id:    i64,
  pub board_id:    i64,
  pub approved:    bool,
  pub poster_id:   i64,
  pub poster_name: String,
  pub posted_at:   String,
  pub subject:     String,
  pub body:        String,
  pub icon:        String,
}

impl RawMessage {
  pub const COLUMNS: &'static str =
    "msg_id, topic_id, board_id, approved, poster_id, poster_name, posted_at, subject, body, icon";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      msg_id:      row.get(0)?,
      topic_id:    row.get(1)?,
      board_id:    row.get(2)?,
      approved:    row.get(3)?,
      poster_id:   row.get(4)?,
      poster_name: row.get(5)?,
      posted_at:   row.get(6)?,
      subject:     row.get(7)?,
      body:        row.get(8)?,
      icon:        row.get(9)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      id:          MessageId(self.msg_id),
      topic_id:    TopicId(self.topic_id),
      board_id:    BoardId(self.board_id),
      approved:    self.approved,
      poster_id:   MemberId(self.poster_id),
      poster_name: self.poster_name,
      posted_at:   decode_dt(&self.posted_at)?,
      subject:     self.subject,
      body:        self.body,
      icon:        self.icon,
    })
  }
}

/// Raw values read directly from a `boards` row.
pub struct RawBoard {
  pub board_id:          i64,
  pub name:              String,
  pub num_topics:        i64,
  pub unapproved_topics: i64,
  pub num_posts:         i64,
  pub unapproved_posts:  i64,
}

impl RawBoard {
  pub const COLUMNS: &'static str =
    "board_id, name, num_topics, unapproved_topics, num_posts, unapproved_posts";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      board_id:          row.get(0)?,
      name:              row.get(1)?,
      num_topics:        row.get(2)?,
      unapproved_topics: row.get(3)?,
      num_posts:         row.get(4)?,
      unapproved_posts:  row.get(5)?,
    })
  }

  pub fn into_board(self) -> Board {
    Board {
      id:     BoardId(self.board_id),
      name:   self.name,
      totals: BoardTotals {
        num_topics:        decode_count(self.num_topics),
        unapproved_topics: decode_count(self.unapproved_topics),
        num_posts:         decode_count(self.num_posts),
        unapproved_posts:  decode_count(self.unapproved_posts),
      },
    }
  }
}

/// Raw values read directly from a `log_actions` row.
pub struct RawLogEntry {
  pub action_id:    i64,
  pub action:       String,
  pub member_id:    i64,
  pub topic_id:     i64,
  pub board_id:     i64,
  pub new_topic_id: Option<i64>,
  pub logged_at:    String,
}

impl RawLogEntry {
  pub fn into_entry(self) -> Result<ModerationLogEntry> {
    Ok(ModerationLogEntry {
      action_id: self.action_id,
      action:    decode_action(&self.action)?,
      member_id: MemberId(self.member_id),
      topic_id:  TopicId(self.topic_id),
      board_id:  BoardId(self.board_id),
      new_topic: self.new_topic_id.map(TopicId),
      logged_at: decode_dt(&self.logged_at)?,
    })
  }
}
