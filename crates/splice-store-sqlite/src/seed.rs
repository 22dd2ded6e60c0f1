//! Content creation and inspection outside the split/merge core.
//!
//! Posting, polls, subscriptions, reports and calendar links belong to other
//! subsystems of the forum. This module carries just enough of each to
//! populate a store and observe what split and merge did to it.

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior, params};
use splice_core::{
  aggregate::aggregate_messages,
  board::reconcile_board_totals,
  ids::{BoardId, MemberId, MessageId, PollId, TopicId},
  model::{Board, CalendarLink, Message, ReadMark, ReportedPost, TopicSubscription},
};

use crate::{
  Error, Result,
  encode::encode_dt,
  error::lift,
  queries::{
    apply_board_deltas, load_message, load_messages, read_marks, rebuild_search_subjects,
    require_board, require_topic, topic_subscriptions, write_topic_aggregate,
  },
  store::SqliteStore,
};

// ─── NewPost ─────────────────────────────────────────────────────────────────

/// Where a new message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostTarget {
  /// Start a topic on this board.
  NewTopic(BoardId),
  Reply(TopicId),
}

/// Input to [`SqliteStore::post`].
#[derive(Debug, Clone)]
pub struct NewPost {
  pub target:      PostTarget,
  pub poster_id:   MemberId,
  pub poster_name: String,
  pub subject:     String,
  pub body:        String,
  pub approved:    bool,
}

impl NewPost {
  /// An approved post by an anonymous poster with an empty body.
  pub fn new(target: PostTarget, subject: impl Into<String>) -> Self {
    Self {
      target,
      poster_id: MemberId(0),
      poster_name: "Guest".into(),
      subject: subject.into(),
      body: String::new(),
      approved: true,
    }
  }

  pub fn by(mut self, poster_id: MemberId, poster_name: impl Into<String>) -> Self {
    self.poster_id = poster_id;
    self.poster_name = poster_name.into();
    self
  }

  pub fn unapproved(mut self) -> Self {
    self.approved = false;
    self
  }
}

// ─── Seeding ─────────────────────────────────────────────────────────────────

impl SqliteStore {
  pub async fn create_board(&self, name: impl Into<String>) -> Result<Board> {
    let name = name.into();
    let id = self
      .conn
      .call(move |conn| {
        conn.execute("INSERT INTO boards (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(self.conn.call(move |conn| require_board(conn, BoardId(id))).await?)
  }

  /// Post a message, keeping the topic aggregate and board totals current.
  pub async fn post(&self, post: NewPost) -> Result<Message> {
    let at_str = encode_dt(Utc::now());

    let msg_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (topic_id, board_id, before) = match post.target {
          PostTarget::Reply(id) => {
            let topic = require_topic(&tx, id)?;
            if topic.is_locked || topic.is_redirect() {
              return Err(lift(Error::TopicLocked(id)));
            }
            let before = aggregate_messages(&load_messages(&tx, id)?).map_err(lift)?;
            (id, topic.board_id, vec![(topic.board_id, before.board_totals())])
          }
          PostTarget::NewTopic(board_id) => {
            require_board(&tx, board_id)?;
            tx.execute(
              "INSERT INTO topics (board_id, subject, first_msg_id, last_msg_id, created_at)
               VALUES (?1, ?2, 0, 0, ?3)",
              params![board_id.0, post.subject, at_str],
            )?;
            let topic_id = TopicId(tx.last_insert_rowid());
            rebuild_search_subjects(&tx, topic_id, &post.subject)?;
            (topic_id, board_id, Vec::new())
          }
        };

        tx.execute(
          "INSERT INTO messages (
             topic_id, board_id, approved, poster_id, poster_name, posted_at, subject, body
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![
            topic_id.0,
            board_id.0,
            post.approved,
            post.poster_id.0,
            post.poster_name,
            at_str,
            post.subject,
            post.body,
          ],
        )?;
        let msg_id = MessageId(tx.last_insert_rowid());

        let after = aggregate_messages(&load_messages(&tx, topic_id)?).map_err(lift)?;
        write_topic_aggregate(&tx, topic_id, &after)?;
        let deltas = reconcile_board_totals(&before, &[(board_id, after.board_totals())]);
        apply_board_deltas(&tx, &deltas)?;

        tx.commit()?;
        Ok(msg_id)
      })
      .await?;

    let message = self.conn.call(move |conn| load_message(conn, msg_id)).await?;
    message.ok_or_else(|| {
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows))
    })
  }

  /// Count a view of the topic.
  pub async fn record_view(&self, topic: TopicId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE topics SET num_views = num_views + 1 WHERE topic_id = ?1",
          params![topic.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn set_topic_flags(&self, topic: TopicId, sticky: bool, locked: bool) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE topics SET is_sticky = ?2, is_locked = ?3 WHERE topic_id = ?1",
          params![topic.0, sticky, locked],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Attach a new poll to `topic`.
  pub async fn create_poll(
    &self,
    topic: TopicId,
    question: impl Into<String>,
    choices: &[&str],
  ) -> Result<PollId> {
    let question = question.into();
    let choices: Vec<String> = choices.iter().map(|c| (*c).to_owned()).collect();

    let id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        require_topic(&tx, topic)?;
        tx.execute("INSERT INTO polls (question) VALUES (?1)", params![question])?;
        let poll_id = tx.last_insert_rowid();
        for (choice_id, label) in choices.iter().enumerate() {
          tx.execute(
            "INSERT INTO poll_choices (poll_id, choice_id, label) VALUES (?1, ?2, ?3)",
            params![poll_id, choice_id as i64, label],
          )?;
        }
        tx.execute(
          "UPDATE topics SET poll_id = ?2 WHERE topic_id = ?1",
          params![topic.0, poll_id],
        )?;
        tx.commit()?;
        Ok(poll_id)
      })
      .await?;
    Ok(PollId(id))
  }

  pub async fn cast_vote(&self, poll: PollId, member: MemberId, choice: usize) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE poll_choices SET votes = votes + 1 WHERE poll_id = ?1 AND choice_id = ?2",
          params![poll.0, choice as i64],
        )?;
        if updated == 0 {
          return Err(lift(Error::PollChoiceNotFound { poll: poll.0, choice }));
        }
        tx.execute(
          "INSERT INTO log_polls (poll_id, member_id, choice_id) VALUES (?1, ?2, ?3)",
          params![poll.0, member.0, choice as i64],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn subscribe_topic(&self, member: MemberId, topic: TopicId, sent: bool) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO log_notify (member_id, topic_id, board_id, sent)
           VALUES (?1, ?2, NULL, ?3)",
          params![member.0, topic.0, sent],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn subscribe_board(&self, member: MemberId, board: BoardId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO log_notify (member_id, topic_id, board_id, sent)
           VALUES (?1, NULL, ?2, 0)",
          params![member.0, board.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn mark_read(
    &self,
    member: MemberId,
    topic: TopicId,
    last_read: MessageId,
    unwatched: bool,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO log_topics (member_id, topic_id, last_read_msg_id, unwatched)
           VALUES (?1, ?2, ?3, ?4)",
          params![member.0, topic.0, last_read.0, unwatched],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// File a moderator report against a message.
  pub async fn report_post(&self, msg: MessageId) -> Result<ReportedPost> {
    let report = self
      .conn
      .call(move |conn| {
        let message = load_message(conn, msg)?.ok_or_else(|| {
          tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows)
        })?;
        conn.execute(
          "INSERT INTO log_reported (msg_id, topic_id, board_id) VALUES (?1, ?2, ?3)",
          params![msg.0, message.topic_id.0, message.board_id.0],
        )?;
        Ok(ReportedPost {
          report_id: conn.last_insert_rowid(),
          msg_id:    msg,
          topic_id:  message.topic_id,
          board_id:  message.board_id,
        })
      })
      .await?;
    Ok(report)
  }

  /// Link a calendar event to a topic.
  pub async fn link_event(&self, title: impl Into<String>, topic: TopicId) -> Result<CalendarLink> {
    let title = title.into();
    let link = self
      .conn
      .call(move |conn| {
        let t = require_topic(conn, topic)?;
        conn.execute(
          "INSERT INTO calendar (title, topic_id, board_id) VALUES (?1, ?2, ?3)",
          params![title, topic.0, t.board_id.0],
        )?;
        Ok(CalendarLink {
          event_id: conn.last_insert_rowid(),
          title,
          topic_id: topic,
          board_id: t.board_id,
        })
      })
      .await?;
    Ok(link)
  }
}

// ─── Inspection ──────────────────────────────────────────────────────────────

impl SqliteStore {
  pub async fn topic_subscriptions(&self, topic: TopicId) -> Result<Vec<TopicSubscription>> {
    Ok(self.conn.call(move |conn| topic_subscriptions(conn, topic)).await?)
  }

  /// Number of board-level subscriptions on `board`.
  pub async fn board_subscriber_count(&self, board: BoardId) -> Result<usize> {
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM log_notify WHERE board_id = ?1",
          params![board.0],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or_default())
  }

  pub async fn read_marks(&self, topic: TopicId) -> Result<Vec<ReadMark>> {
    Ok(self.conn.call(move |conn| read_marks(conn, topic)).await?)
  }

  pub async fn reported_posts(&self) -> Result<Vec<ReportedPost>> {
    let rows = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT report_id, msg_id, topic_id, board_id FROM log_reported ORDER BY report_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(ReportedPost {
              report_id: row.get(0)?,
              msg_id:    row.get::<_, i64>(1)?.into(),
              topic_id:  row.get::<_, i64>(2)?.into(),
              board_id:  row.get::<_, i64>(3)?.into(),
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  pub async fn calendar_links(&self) -> Result<Vec<CalendarLink>> {
    let rows = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT event_id, title, topic_id, board_id FROM calendar ORDER BY event_id")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(CalendarLink {
              event_id: row.get(0)?,
              title:    row.get(1)?,
              topic_id: row.get::<_, i64>(2)?.into(),
              board_id: row.get::<_, i64>(3)?.into(),
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  /// Whether the poll row still exists, and how many choice and vote rows
  /// reference it.
  pub async fn poll_footprint(&self, poll: PollId) -> Result<(bool, usize, usize)> {
    let (exists, choices, votes): (bool, i64, i64) = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row("SELECT 1 FROM polls WHERE poll_id = ?1", params![poll.0], |_| Ok(true))
          .optional()?
          .unwrap_or(false);
        let choices = conn.query_row(
          "SELECT COUNT(*) FROM poll_choices WHERE poll_id = ?1",
          params![poll.0],
          |r| r.get(0),
        )?;
        let votes = conn.query_row(
          "SELECT COUNT(*) FROM log_polls WHERE poll_id = ?1",
          params![poll.0],
          |r| r.get(0),
        )?;
        Ok((exists, choices, votes))
      })
      .await?;
    Ok((
      exists,
      usize::try_from(choices).unwrap_or_default(),
      usize::try_from(votes).unwrap_or_default(),
    ))
  }

  /// Topics whose cached subject contains `word`.
  pub async fn topics_with_subject_word(&self, word: impl Into<String>) -> Result<Vec<TopicId>> {
    let word = word.into().to_lowercase();
    let ids: Vec<i64> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare("SELECT topic_id FROM search_subjects WHERE word = ?1 ORDER BY topic_id")?;
        let ids = stmt
          .query_map(params![word], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
      })
      .await?;
    Ok(ids.into_iter().map(TopicId).collect())
  }
}
