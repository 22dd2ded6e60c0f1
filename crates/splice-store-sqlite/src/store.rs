//! [`SqliteStore`], the SQLite implementation of [`ForumStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::params;
use splice_core::{
  hooks::{HookError, ModerationLog},
  ids::{BoardId, TopicId},
  merge::MergeRequest,
  model::{Board, LogAction, Message, ModerationLogEntry, Topic},
  settings::EngineSettings,
  split::SplitRequest,
  store::{ForumStore, MergeOutcome, SplitOutcome},
};

use crate::{
  Error, Result,
  encode::{RawLogEntry, encode_dt},
  merge::run_merge,
  queries::{load_board, load_messages, load_topic},
  schema::SCHEMA,
  split::run_split,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A forum store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised on the connection's thread, and split/merge take an
/// immediate write lock, so overlapping operations never interleave.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by the tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every moderation log row, oldest first.
  pub async fn moderation_log(&self) -> Result<Vec<ModerationLogEntry>> {
    let raws: Vec<RawLogEntry> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT action_id, action, member_id, topic_id, board_id, new_topic_id, logged_at
           FROM log_actions ORDER BY action_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawLogEntry {
              action_id:    row.get(0)?,
              action:       row.get(1)?,
              member_id:    row.get(2)?,
              topic_id:     row.get(3)?,
              board_id:     row.get(4)?,
              new_topic_id: row.get(5)?,
              logged_at:    row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLogEntry::into_entry).collect()
  }

  async fn append_log(&self, entry: LogAction) -> Result<()> {
    let action = entry.action.as_ref().to_owned();
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO log_actions (action, member_id, topic_id, board_id, new_topic_id, logged_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            action,
            entry.member_id.0,
            entry.topic_id.0,
            entry.board_id.0,
            entry.new_topic.map(|t| t.0),
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ForumStore impl ─────────────────────────────────────────────────────────

impl ForumStore for SqliteStore {
  type Error = Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>> {
    Ok(self.conn.call(move |conn| load_topic(conn, id)).await?)
  }

  async fn topic_messages(&self, id: TopicId) -> Result<Vec<Message>> {
    Ok(self.conn.call(move |conn| load_messages(conn, id)).await?)
  }

  async fn get_board(&self, id: BoardId) -> Result<Option<Board>> {
    Ok(self.conn.call(move |conn| load_board(conn, id)).await?)
  }

  // ── Transactional operations ──────────────────────────────────────────────

  async fn split_topic(
    &self,
    request: SplitRequest,
    settings: EngineSettings,
  ) -> Result<SplitOutcome> {
    let now = Utc::now();
    Ok(self.conn.call(move |conn| run_split(conn, request, settings, now)).await?)
  }

  async fn merge_topics(
    &self,
    request: MergeRequest,
    settings: EngineSettings,
  ) -> Result<MergeOutcome> {
    let now = Utc::now();
    Ok(self.conn.call(move |conn| run_merge(conn, request, settings, now)).await?)
  }
}

// ─── ModerationLog impl ──────────────────────────────────────────────────────

impl ModerationLog for SqliteStore {
  async fn log_action(&self, entry: LogAction) -> std::result::Result<(), HookError> {
    self.append_log(entry).await.map_err(|e| Box::new(e) as HookError)
  }
}
