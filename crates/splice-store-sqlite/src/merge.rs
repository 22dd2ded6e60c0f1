//! The merge transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior, params};
use splice_core::{
  aggregate::TopicAggregate,
  ids::MessageId,
  merge::{MergeRequest, MergeSource, merge_read_marks, merge_subscriptions, plan_merge},
  settings::EngineSettings,
  store::MergeOutcome,
};

use crate::{
  encode::encode_dt,
  error::lift,
  queries::{
    apply_board_deltas, delete_search_subjects, load_messages, read_marks,
    rebuild_search_subjects, require_board, require_topic, topic_subscriptions, write_subjects,
    write_topic_aggregate,
  },
};

pub fn run_merge(
  conn: &mut Connection,
  request: MergeRequest,
  settings: EngineSettings,
  now: DateTime<Utc>,
) -> tokio_rusqlite::Result<MergeOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let ids = request.topic_ids().map_err(lift)?;
  let mut sources = Vec::with_capacity(ids.len());
  for id in &ids {
    let topic = require_topic(&tx, *id)?;
    let messages = load_messages(&tx, *id)?;
    sources.push(MergeSource { topic, messages });
  }

  let plan = plan_merge(&sources, &request.options, &settings, now).map_err(lift)?;
  require_board(&tx, plan.target_board)?;
  let survivor = plan.survivor;

  // ── Messages and the rows that follow them ────────────────────────────
  for source in &plan.sources {
    for sql in [
      "UPDATE messages     SET topic_id = ?1, board_id = ?2 WHERE topic_id = ?3",
      "UPDATE log_reported SET topic_id = ?1, board_id = ?2 WHERE topic_id = ?3",
      "UPDATE calendar     SET topic_id = ?1, board_id = ?2 WHERE topic_id = ?3",
    ] {
      tx.execute(sql, params![survivor.0, plan.target_board.0, source.0])?;
    }
  }
  write_subjects(&tx, &plan.subject_updates)?;

  // ── Per-member state ──────────────────────────────────────────────────
  let mut subscriptions = Vec::new();
  let mut marks = Vec::new();
  for source in &plan.sources {
    subscriptions.extend(topic_subscriptions(&tx, *source)?);
    marks.extend(read_marks(&tx, *source)?);
    tx.execute("DELETE FROM log_notify WHERE topic_id = ?1", params![source.0])?;
    tx.execute("DELETE FROM log_topics WHERE topic_id = ?1", params![source.0])?;
  }
  for sub in merge_subscriptions(&subscriptions, survivor) {
    tx.execute(
      "INSERT INTO log_notify (member_id, topic_id, board_id, sent) VALUES (?1, ?2, NULL, ?3)",
      params![sub.member_id.0, sub.topic_id.0, sub.sent],
    )?;
  }
  for mark in merge_read_marks(&marks, survivor) {
    tx.execute(
      "INSERT INTO log_topics (member_id, topic_id, last_read_msg_id, unwatched)
       VALUES (?1, ?2, ?3, ?4)",
      params![mark.member_id.0, mark.topic_id.0, mark.last_read_msg_id.0, mark.unwatched],
    )?;
  }

  // ── Survivor row ──────────────────────────────────────────────────────
  tx.execute(
    "UPDATE topics
     SET board_id = ?2, subject = ?3, is_sticky = ?4, is_locked = ?5,
         num_views = ?6, poll_id = ?7
     WHERE topic_id = ?1",
    params![
      survivor.0,
      plan.target_board.0,
      plan.subject,
      plan.is_sticky,
      plan.is_locked,
      plan.num_views,
      plan.poll.map(|p| p.0),
    ],
  )?;
  write_topic_aggregate(&tx, survivor, &plan.aggregate)?;
  rebuild_search_subjects(&tx, survivor, &plan.subject)?;

  // ── Retired sources ───────────────────────────────────────────────────
  for retired in &plan.retired {
    delete_search_subjects(&tx, *retired)?;
  }

  let mut redirects = Vec::with_capacity(plan.stubs.len());
  let mut deleted_topics = Vec::new();
  if plan.stubs.is_empty() {
    for retired in &plan.retired {
      tx.execute(
        "UPDATE log_actions SET topic_id = ?1, board_id = ?2 WHERE topic_id = ?3",
        params![survivor.0, plan.target_board.0, retired.0],
      )?;
      tx.execute("DELETE FROM topics WHERE topic_id = ?1", params![retired.0])?;
      deleted_topics.push(*retired);
    }
  } else {
    for stub in &plan.stubs {
      tx.execute(
        "INSERT INTO messages (
           topic_id, board_id, approved, poster_id, poster_name, posted_at, subject, body, icon
         ) VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
          stub.topic_id.0,
          stub.board_id.0,
          stub.poster_id.0,
          stub.poster_name,
          encode_dt(now),
          stub.subject,
          stub.body,
          stub.icon,
        ],
      )?;
      let msg_id = MessageId(tx.last_insert_rowid());
      write_topic_aggregate(&tx, stub.topic_id, &TopicAggregate::redirect_stub(msg_id))?;
      tx.execute(
        "UPDATE topics
         SET subject = ?2, is_sticky = 0, is_locked = 1, poll_id = NULL,
             redirect_topic_id = ?3, redirect_expires_at = ?4
         WHERE topic_id = ?1",
        params![stub.topic_id.0, stub.subject, stub.target.0, stub.expires_at.map(encode_dt)],
      )?;
      redirects.push(require_topic(&tx, stub.topic_id)?);
    }
  }

  // Orphaned polls go with their choices and votes.
  for poll in &plan.deleted_polls {
    for sql in [
      "DELETE FROM log_polls    WHERE poll_id = ?1",
      "DELETE FROM poll_choices WHERE poll_id = ?1",
      "DELETE FROM polls        WHERE poll_id = ?1",
    ] {
      tx.execute(sql, params![poll.0])?;
    }
  }

  apply_board_deltas(&tx, &plan.board_deltas)?;

  let survivor_row = require_topic(&tx, survivor)?;
  tx.commit()?;

  Ok(MergeOutcome {
    survivor: survivor_row,
    sources: plan.sources,
    redirects,
    deleted_topics,
    deleted_polls: plan.deleted_polls,
    messages: plan.messages,
    subject_override: plan.subject_override,
    board_deltas: plan.board_deltas,
  })
}
