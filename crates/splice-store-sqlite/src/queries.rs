//! Synchronous query helpers shared by the transactional operations.
//!
//! Every helper takes a plain `&Connection` so it can run on a
//! [`rusqlite::Transaction`] (which derefs to one) inside a
//! `tokio_rusqlite` call, and returns that call's error type so `?` composes.

use rusqlite::{Connection, OptionalExtension as _, params};
use splice_core::{
  aggregate::TopicAggregate,
  board::BoardDeltas,
  ids::{BoardId, MessageId, TopicId},
  model::{Board, Message, ReadMark, Topic, TopicSubscription},
  subject::search_words,
};

use crate::{
  encode::{RawBoard, RawMessage, RawTopic},
  error::lift,
};

type CallResult<T> = tokio_rusqlite::Result<T>;

// ─── Loads ───────────────────────────────────────────────────────────────────

pub fn load_topic(conn: &Connection, id: TopicId) -> CallResult<Option<Topic>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM topics WHERE topic_id = ?1", RawTopic::COLUMNS),
      params![id.0],
      RawTopic::from_row,
    )
    .optional()?;
  raw.map(RawTopic::into_topic).transpose().map_err(lift)
}

/// Load a topic that must exist.
pub fn require_topic(conn: &Connection, id: TopicId) -> CallResult<Topic> {
  load_topic(conn, id)?.ok_or_else(|| lift(splice_core::Error::TopicNotFound(id)))
}

pub fn load_messages(conn: &Connection, topic: TopicId) -> CallResult<Vec<Message>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM messages WHERE topic_id = ?1 ORDER BY msg_id",
    RawMessage::COLUMNS
  ))?;
  let raws = stmt
    .query_map(params![topic.0], RawMessage::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(|r| r.into_message().map_err(lift)).collect()
}

pub fn load_message(conn: &Connection, id: MessageId) -> CallResult<Option<Message>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM messages WHERE msg_id = ?1", RawMessage::COLUMNS),
      params![id.0],
      RawMessage::from_row,
    )
    .optional()?;
  raw.map(RawMessage::into_message).transpose().map_err(lift)
}

pub fn load_board(conn: &Connection, id: BoardId) -> CallResult<Option<Board>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM boards WHERE board_id = ?1", RawBoard::COLUMNS),
      params![id.0],
      RawBoard::from_row,
    )
    .optional()?;
  Ok(raw.map(RawBoard::into_board))
}

pub fn require_board(conn: &Connection, id: BoardId) -> CallResult<Board> {
  load_board(conn, id)?.ok_or_else(|| lift(splice_core::Error::BoardNotFound(id)))
}

pub fn topic_subscriptions(
  conn: &Connection,
  topic: TopicId,
) -> CallResult<Vec<TopicSubscription>> {
  let mut stmt = conn.prepare(
    "SELECT member_id, topic_id, sent FROM log_notify WHERE topic_id = ?1 ORDER BY member_id",
  )?;
  let rows = stmt
    .query_map(params![topic.0], |row| {
      Ok(TopicSubscription {
        member_id: row.get::<_, i64>(0)?.into(),
        topic_id:  row.get::<_, i64>(1)?.into(),
        sent:      row.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn read_marks(conn: &Connection, topic: TopicId) -> CallResult<Vec<ReadMark>> {
  let mut stmt = conn.prepare(
    "SELECT member_id, topic_id, last_read_msg_id, unwatched
     FROM log_topics WHERE topic_id = ?1 ORDER BY member_id",
  )?;
  let rows = stmt
    .query_map(params![topic.0], |row| {
      Ok(ReadMark {
        member_id:        row.get::<_, i64>(0)?.into(),
        topic_id:         row.get::<_, i64>(1)?.into(),
        last_read_msg_id: row.get::<_, i64>(2)?.into(),
        unwatched:        row.get(3)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Store `agg` in the topic's aggregate columns.
pub fn write_topic_aggregate(
  conn: &Connection,
  topic: TopicId,
  agg: &TopicAggregate,
) -> CallResult<()> {
  conn.execute(
    "UPDATE topics
     SET first_msg_id = ?2, last_msg_id = ?3, num_replies = ?4,
         unapproved_posts = ?5, approved = ?6
     WHERE topic_id = ?1",
    params![
      topic.0,
      agg.first_msg.0,
      agg.last_msg.0,
      agg.num_replies,
      agg.unapproved_posts,
      agg.approved,
    ],
  )?;
  Ok(())
}

/// Rewrite the subject of each listed message.
pub fn write_subjects(conn: &Connection, updates: &[(MessageId, String)]) -> CallResult<()> {
  let mut stmt = conn.prepare("UPDATE messages SET subject = ?2 WHERE msg_id = ?1")?;
  for (id, subject) in updates {
    stmt.execute(params![id.0, subject])?;
  }
  Ok(())
}

/// Apply signed deltas to every touched board, flooring counters at zero.
pub fn apply_board_deltas(conn: &Connection, deltas: &BoardDeltas) -> CallResult<()> {
  for (board_id, delta) in deltas.iter() {
    let board = require_board(conn, board_id)?;
    let next = board.totals.apply(delta);
    tracing::debug!(board = %board_id, ?delta, ?next, "reconciling board totals");
    conn.execute(
      "UPDATE boards
       SET num_topics = ?2, unapproved_topics = ?3, num_posts = ?4, unapproved_posts = ?5
       WHERE board_id = ?1",
      params![
        board_id.0,
        next.num_topics,
        next.unapproved_topics,
        next.num_posts,
        next.unapproved_posts,
      ],
    )?;
  }
  Ok(())
}

/// Replace the cached subject words of `topic`.
pub fn rebuild_search_subjects(conn: &Connection, topic: TopicId, subject: &str) -> CallResult<()> {
  delete_search_subjects(conn, topic)?;
  let mut stmt =
    conn.prepare("INSERT OR IGNORE INTO search_subjects (word, topic_id) VALUES (?1, ?2)")?;
  for word in search_words(subject) {
    stmt.execute(params![word, topic.0])?;
  }
  Ok(())
}

pub fn delete_search_subjects(conn: &Connection, topic: TopicId) -> CallResult<()> {
  conn.execute("DELETE FROM search_subjects WHERE topic_id = ?1", params![topic.0])?;
  Ok(())
}
