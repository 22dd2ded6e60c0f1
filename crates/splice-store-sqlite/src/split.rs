//! The split transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior, params};
use splice_core::{
  ids::TopicId,
  settings::EngineSettings,
  split::{SplitRequest, plan_split},
  store::SplitOutcome,
};

use crate::{
  encode::encode_dt,
  error::lift,
  queries::{
    apply_board_deltas, load_messages, rebuild_search_subjects, require_board, require_topic,
    write_subjects, write_topic_aggregate,
  },
};

pub fn run_split(
  conn: &mut Connection,
  request: SplitRequest,
  settings: EngineSettings,
  now: DateTime<Utc>,
) -> tokio_rusqlite::Result<SplitOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let topic = require_topic(&tx, request.topic_id)?;
  let messages = load_messages(&tx, topic.id)?;
  let plan = plan_split(&topic, &messages, &request, &settings).map_err(lift)?;
  if plan.target_board != topic.board_id {
    require_board(&tx, plan.target_board)?;
  }

  // New topic, seeded with the moved aggregate.
  let moved = &plan.moved_aggregate;
  tx.execute(
    "INSERT INTO topics (
       board_id, subject, first_msg_id, last_msg_id, num_replies,
       unapproved_posts, approved, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    params![
      plan.target_board.0,
      plan.subject,
      moved.first_msg.0,
      moved.last_msg.0,
      moved.num_replies,
      moved.unapproved_posts,
      moved.approved,
      encode_dt(now),
    ],
  )?;
  let new_id = TopicId(tx.last_insert_rowid());

  {
    let mut stmt =
      tx.prepare("UPDATE messages SET topic_id = ?1, board_id = ?2 WHERE msg_id = ?3")?;
    for id in &plan.moved {
      stmt.execute(params![new_id.0, plan.target_board.0, id.0])?;
    }
  }
  write_subjects(&tx, &plan.subject_updates)?;
  write_topic_aggregate(&tx, topic.id, &plan.remaining)?;

  // Reports follow their messages.
  {
    let mut stmt =
      tx.prepare("UPDATE log_reported SET topic_id = ?1, board_id = ?2 WHERE msg_id = ?3")?;
    for id in &plan.moved {
      stmt.execute(params![new_id.0, plan.target_board.0, id.0])?;
    }
  }

  // Followers and readers of the source keep their state on both halves.
  tx.execute(
    "INSERT OR IGNORE INTO log_notify (member_id, topic_id, board_id, sent)
     SELECT member_id, ?2, NULL, sent FROM log_notify WHERE topic_id = ?1",
    params![topic.id.0, new_id.0],
  )?;
  tx.execute(
    "INSERT OR IGNORE INTO log_topics (member_id, topic_id, last_read_msg_id, unwatched)
     SELECT member_id, ?2, last_read_msg_id, unwatched FROM log_topics WHERE topic_id = ?1",
    params![topic.id.0, new_id.0],
  )?;

  rebuild_search_subjects(&tx, new_id, &plan.subject)?;
  apply_board_deltas(&tx, &plan.board_deltas)?;

  let source = require_topic(&tx, topic.id)?;
  let new_topic = require_topic(&tx, new_id)?;

  tx.commit()?;

  Ok(SplitOutcome {
    source,
    new_topic,
    moved: plan.moved.into_iter().collect(),
    board_deltas: plan.board_deltas,
  })
}
