//! Merge planning: combining several topics into the lowest-id survivor.
//!
//! [`plan_merge`] is pure. It validates the request against the loaded
//! sources, recomputes the merged aggregate over the union of all messages
//! (approval spans topic boundaries), resolves the poll and subject, and
//! prepares redirect stubs and board deltas for the store to apply.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  aggregate::{TopicAggregate, aggregate_messages},
  board::{BoardDeltas, BoardTotals, reconcile_board_totals},
  ids::{BoardId, MemberId, MessageId, PollId, TopicId},
  model::{Message, ReadMark, Topic, TopicSubscription},
  redirect::{RedirectOptions, RedirectStub, build_redirect_stub},
  settings::EngineSettings,
  subject::{enforced_subjects, normalize_subject},
};

// ─── Request ─────────────────────────────────────────────────────────────────

/// Where the merged topic's subject comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SubjectChoice {
  /// Keep the subject of the earliest-created source.
  #[default]
  Survivor,
  /// Use the subject of one of the sources.
  FromTopic(TopicId),
  /// A moderator-supplied subject.
  Custom(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
  /// Board of the merged topic; defaults to the survivor's board.
  pub target_board:     Option<BoardId>,
  /// Boards the moderator may merge into besides the sources' own boards.
  /// `None` places no restriction.
  pub permitted_boards: Option<BTreeSet<BoardId>>,
  pub subject:          SubjectChoice,
  /// Poll to keep; required when more than one source has a poll.
  pub target_poll:      Option<PollId>,
  /// Rewrite every merged message's subject to match the topic.
  pub enforce_subject:  bool,
  /// Turn retired sources into redirect stubs instead of deleting them.
  pub create_redirects: bool,
  pub redirect:         RedirectOptions,
}

/// Input to [`crate::store::ForumStore::merge_topics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
  /// The moderator performing the merge.
  pub actor:   MemberId,
  pub topics:  Vec<TopicId>,
  pub options: MergeOptions,
}

impl MergeRequest {
  /// The distinct topic ids, in ascending order.
  pub fn topic_ids(&self) -> Result<BTreeSet<TopicId>> {
    let ids: BTreeSet<TopicId> = self.topics.iter().copied().collect();
    if ids.len() < 2 {
      return Err(Error::InsufficientTopics(ids.len()));
    }
    Ok(ids)
  }

  /// Checks that need no stored state.
  pub fn validate(&self) -> Result<()> {
    self.topic_ids()?;
    if let SubjectChoice::Custom(s) = &self.options.subject
      && s.trim().is_empty()
    {
      return Err(Error::EmptySubject);
    }
    Ok(())
  }
}

// ─── Plan ────────────────────────────────────────────────────────────────────

/// A loaded source topic with every message it currently holds.
#[derive(Debug, Clone)]
pub struct MergeSource {
  pub topic:    Topic,
  pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
  pub survivor:         TopicId,
  /// Every source, survivor included, ascending.
  pub sources:          Vec<TopicId>,
  /// Sources other than the survivor.
  pub retired:          Vec<TopicId>,
  pub target_board:     BoardId,
  pub subject:          String,
  /// Set when the subject differs from the survivor's current one.
  pub subject_override: Option<String>,
  pub aggregate:        TopicAggregate,
  pub is_sticky:        bool,
  pub is_locked:        bool,
  pub num_views:        u32,
  pub poll:             Option<PollId>,
  pub deleted_polls:    Vec<PollId>,
  /// Every message of every source, ascending.
  pub messages:         Vec<MessageId>,
  pub subject_updates:  Vec<(MessageId, String)>,
  pub stubs:            Vec<RedirectStub>,
  pub board_deltas:     BoardDeltas,
}

/// Plan merging `sources` according to `options`.
pub fn plan_merge(
  sources: &[MergeSource],
  options: &MergeOptions,
  settings: &EngineSettings,
  now: DateTime<Utc>,
) -> Result<MergePlan> {
  let mut ordered: Vec<&MergeSource> = sources.iter().collect();
  ordered.sort_by_key(|s| s.topic.id);
  ordered.dedup_by_key(|s| s.topic.id);

  let [survivor, rest @ ..] = ordered.as_slice() else {
    return Err(Error::InsufficientTopics(0));
  };
  if rest.is_empty() {
    return Err(Error::InsufficientTopics(1));
  }

  if let Some(stub) = ordered.iter().find(|s| s.topic.is_redirect()) {
    return Err(Error::ContainsRedirectStub(stub.topic.id));
  }

  for source in &ordered {
    if let Some(stray) = source.messages.iter().find(|m| m.topic_id != source.topic.id) {
      return Err(Error::ConsistencyViolation(format!(
        "message {} loaded for topic {} belongs to topic {}",
        stray.id, source.topic.id, stray.topic_id
      )));
    }
  }

  let target_board = resolve_target_board(&ordered, survivor, options)?;
  let (poll, deleted_polls) = resolve_poll(&ordered, options.target_poll)?;
  let subject = resolve_subject(&ordered, survivor, &options.subject, settings)?;

  // Approval is recomputed across the union, not per source.
  let all_messages: Vec<&Message> = ordered.iter().flat_map(|s| s.messages.iter()).collect();
  let aggregate = aggregate_messages(all_messages.iter().copied())?;

  let mut messages: Vec<MessageId> = all_messages.iter().map(|m| m.id).collect();
  messages.sort_unstable();

  let subject_updates = if options.enforce_subject {
    enforced_subjects(
      aggregate.first_msg,
      messages.iter().copied(),
      &subject,
      &settings.reply_prefix,
    )
  } else {
    vec![(aggregate.first_msg, subject.clone())]
  };

  let stubs: Vec<RedirectStub> = if options.create_redirects {
    rest
      .iter()
      .map(|s| build_redirect_stub(&s.topic, survivor.topic.id, &options.redirect, settings, now))
      .collect()
  } else {
    Vec::new()
  };

  let mut before = Vec::with_capacity(ordered.len());
  for source in &ordered {
    let agg = aggregate_messages(&source.messages)?;
    before.push((source.topic.board_id, agg.board_totals()));
  }
  let mut after = vec![(target_board, aggregate.board_totals())];
  after.extend(stubs.iter().map(|s| (s.board_id, BoardTotals::REDIRECT_STUB)));
  let board_deltas = reconcile_board_totals(&before, &after);

  let subject_override = (subject != survivor.topic.subject).then(|| subject.clone());

  Ok(MergePlan {
    survivor: survivor.topic.id,
    sources: ordered.iter().map(|s| s.topic.id).collect(),
    retired: rest.iter().map(|s| s.topic.id).collect(),
    target_board,
    subject,
    subject_override,
    aggregate,
    is_sticky: ordered.iter().any(|s| s.topic.is_sticky),
    is_locked: ordered.iter().any(|s| s.topic.is_locked),
    num_views: ordered.iter().fold(0u32, |acc, s| acc.saturating_add(s.topic.num_views)),
    poll,
    deleted_polls,
    messages,
    subject_updates,
    stubs,
    board_deltas,
  })
}

fn resolve_target_board(
  ordered: &[&MergeSource],
  survivor: &MergeSource,
  options: &MergeOptions,
) -> Result<BoardId> {
  let target = options.target_board.unwrap_or(survivor.topic.board_id);
  let is_source_board = ordered.iter().any(|s| s.topic.board_id == target);
  match &options.permitted_boards {
    Some(permitted) if !is_source_board && !permitted.contains(&target) => {
      Err(Error::TargetBoardNotPermitted(target))
    }
    _ => Ok(target),
  }
}

/// Returns the poll to keep and the polls to delete.
fn resolve_poll(
  ordered: &[&MergeSource],
  requested: Option<PollId>,
) -> Result<(Option<PollId>, Vec<PollId>)> {
  let polls: BTreeSet<PollId> = ordered.iter().filter_map(|s| s.topic.poll_id).collect();

  let keep = match requested {
    Some(p) if polls.contains(&p) => Some(p),
    Some(p) => return Err(Error::TargetPollNotAmongSources(p)),
    None if polls.len() > 1 => return Err(Error::AmbiguousPoll),
    None => polls.first().copied(),
  };

  let deleted = polls.into_iter().filter(|p| Some(*p) != keep).collect();
  Ok((keep, deleted))
}

fn resolve_subject(
  ordered: &[&MergeSource],
  survivor: &MergeSource,
  choice: &SubjectChoice,
  settings: &EngineSettings,
) -> Result<String> {
  let raw = match choice {
    SubjectChoice::Custom(s) => s.as_str(),
    SubjectChoice::FromTopic(id) => ordered
      .iter()
      .find(|s| s.topic.id == *id)
      .map(|s| s.topic.subject.as_str())
      .ok_or(Error::SubjectNotAmongSources(*id))?,
    SubjectChoice::Survivor => survivor.topic.subject.as_str(),
  };
  normalize_subject(raw, settings.subject_max_chars)
}

// ─── Per-member state ────────────────────────────────────────────────────────

/// Collapse topic subscriptions from every merged topic into one row per
/// member on the survivor. A member subscribed anywhere stays subscribed,
/// and `sent` is kept if any row had it so no duplicate notice fires.
pub fn merge_subscriptions(
  rows: &[TopicSubscription],
  survivor: TopicId,
) -> Vec<TopicSubscription> {
  let mut by_member: BTreeMap<MemberId, bool> = BTreeMap::new();
  for row in rows {
    let sent = by_member.entry(row.member_id).or_insert(false);
    *sent |= row.sent;
  }
  by_member
    .into_iter()
    .map(|(member_id, sent)| TopicSubscription { member_id, topic_id: survivor, sent })
    .collect()
}

/// Collapse read marks into one row per member on the survivor. The lowest
/// read position wins so merged-in content shows as unread; the watch
/// setting comes from the member's row on the oldest topic.
pub fn merge_read_marks(rows: &[ReadMark], survivor: TopicId) -> Vec<ReadMark> {
  let mut by_member: BTreeMap<MemberId, (MessageId, TopicId, bool)> = BTreeMap::new();
  for row in rows {
    by_member
      .entry(row.member_id)
      .and_modify(|(last_read, oldest, unwatched)| {
        *last_read = (*last_read).min(row.last_read_msg_id);
        if row.topic_id < *oldest {
          *oldest = row.topic_id;
          *unwatched = row.unwatched;
        }
      })
      .or_insert((row.last_read_msg_id, row.topic_id, row.unwatched));
  }
  by_member
    .into_iter()
    .map(|(member_id, (last_read_msg_id, _, unwatched))| ReadMark {
      member_id,
      topic_id: survivor,
      last_read_msg_id,
      unwatched,
    })
    .collect()
}
