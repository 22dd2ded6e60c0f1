//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeSet;

use splice_core::{
  board::BoardTotals,
  hooks::{HookError, SearchIndex},
  ids::{BoardId, MemberId, MessageId, TopicId},
  merge::{MergeOptions, MergeRequest, SubjectChoice},
  model::{Message, ModerationAction, NotifyEvent, Topic},
  moderator::Moderator,
  redirect::{REDIRECT_ICON, RedirectOptions},
  settings::EngineSettings,
  split::{SplitRequest, SplitSelection},
  store::ForumStore,
};

use crate::{Error, NewPost, PostTarget, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

const MOD: MemberId = MemberId(1);

/// Start a topic on `board` and post one reply per entry of `replies`
/// (`true` = approved). Returns the topic and its message ids in order.
async fn seed_topic(
  s: &SqliteStore,
  board: BoardId,
  subject: &str,
  replies: &[bool],
) -> (TopicId, Vec<MessageId>) {
  let first = s
    .post(NewPost::new(PostTarget::NewTopic(board), subject))
    .await
    .unwrap();
  let mut ids = vec![first.id];
  for approved in replies {
    let mut post = NewPost::new(PostTarget::Reply(first.topic_id), format!("Re: {subject}"));
    if !approved {
      post = post.unapproved();
    }
    ids.push(s.post(post).await.unwrap().id);
  }
  (first.topic_id, ids)
}

async fn topic(s: &SqliteStore, id: TopicId) -> Topic {
  s.get_topic(id).await.unwrap().expect("topic exists")
}

async fn totals(s: &SqliteStore, id: BoardId) -> BoardTotals {
  s.get_board(id).await.unwrap().expect("board exists").totals
}

async fn message_ids(s: &SqliteStore, id: TopicId) -> Vec<MessageId> {
  s.topic_messages(id).await.unwrap().iter().map(|m| m.id).collect()
}

fn split_request(topic: TopicId, selection: SplitSelection, subject: &str) -> SplitRequest {
  SplitRequest {
    actor: MOD,
    topic_id: topic,
    selection,
    subject: subject.into(),
    target_board: None,
  }
}

fn merge_request(topics: &[TopicId], options: MergeOptions) -> MergeRequest {
  MergeRequest { actor: MOD, topics: topics.to_vec(), options }
}

/// Make every later write to `boards` abort. Splits and merges reconcile
/// board totals after rewriting messages, so this fails them mid-transaction.
async fn freeze_boards(s: &SqliteStore) {
  s.conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER boards_frozen BEFORE UPDATE ON boards
         BEGIN SELECT RAISE(ABORT, 'boards frozen'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();
}

// ─── Seeding ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn posting_maintains_topic_and_board_counters() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;

  let (t, ids) = seed_topic(&s, board, "Hello", &[true, false]).await;

  let row = topic(&s, t).await;
  assert_eq!(row.first_msg_id, ids[0]);
  assert_eq!(row.last_msg_id, ids[1]);
  assert_eq!(row.num_replies, 1);
  assert_eq!(row.unapproved_posts, 1);
  assert!(row.approved);

  assert_eq!(
    totals(&s, board).await,
    BoardTotals { num_topics: 1, unapproved_topics: 0, num_posts: 2, unapproved_posts: 1 }
  );
}

#[tokio::test]
async fn posting_to_a_locked_topic_is_rejected() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, _) = seed_topic(&s, board, "Closed", &[]).await;
  s.set_topic_flags(t, false, true).await.unwrap();

  let err = s.post(NewPost::new(PostTarget::Reply(t), "Re: Closed")).await.unwrap_err();
  assert!(matches!(err, Error::TopicLocked(id) if id == t));
}

#[tokio::test]
async fn get_topic_missing_returns_none() {
  let s = store().await;
  assert!(s.get_topic(TopicId(999)).await.unwrap().is_none());
}

// ─── Split ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn split_unapproved_tail_into_new_topic() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Original", &[true, false]).await;

  let outcome = s
    .split_topic(
      split_request(t, SplitSelection::Only(ids[2]), "Split off"),
      EngineSettings::default(),
    )
    .await
    .unwrap();

  let source = topic(&s, t).await;
  assert_eq!(source.first_msg_id, ids[0]);
  assert_eq!(source.last_msg_id, ids[1]);
  assert_eq!(source.num_replies, 1);
  assert_eq!(source.unapproved_posts, 0);
  assert!(source.approved);

  let new_topic = topic(&s, outcome.new_topic.id).await;
  assert_eq!(new_topic.first_msg_id, ids[2]);
  assert_eq!(new_topic.last_msg_id, ids[2]);
  assert_eq!(new_topic.num_replies, 0);
  assert_eq!(new_topic.unapproved_posts, 1);
  assert!(!new_topic.approved);
  assert_eq!(new_topic.subject, "Split off");

  assert_eq!(
    totals(&s, board).await,
    BoardTotals { num_topics: 1, unapproved_topics: 1, num_posts: 2, unapproved_posts: 1 }
  );
}

#[tokio::test]
async fn split_partitions_messages_without_loss() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Busy thread", &[true, true, true, true]).await;

  let outcome = s
    .split_topic(
      split_request(t, SplitSelection::From(ids[3]), "Tangent"),
      EngineSettings::default(),
    )
    .await
    .unwrap();

  let remaining = message_ids(&s, t).await;
  let moved = message_ids(&s, outcome.new_topic.id).await;
  assert_eq!(moved, vec![ids[3], ids[4]]);
  assert_eq!(outcome.moved, moved);

  let union: BTreeSet<MessageId> = remaining.iter().chain(&moved).copied().collect();
  assert_eq!(union.len(), ids.len());
  assert_eq!(union, ids.iter().copied().collect());
}

#[tokio::test]
async fn split_rewrites_moved_subjects() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Original", &[true, true, true]).await;

  let outcome = s
    .split_topic(
      split_request(t, SplitSelection::Selected(BTreeSet::from([ids[1], ids[3]])), "Side topic"),
      EngineSettings::default(),
    )
    .await
    .unwrap();

  let moved: Vec<Message> = s.topic_messages(outcome.new_topic.id).await.unwrap();
  assert_eq!(moved[0].subject, "Side topic");
  assert_eq!(moved[1].subject, "Re: Side topic");
  assert!(moved.iter().all(|m| m.board_id == board));
}

#[tokio::test]
async fn split_to_another_board_moves_counters() {
  let s = store().await;
  let general = s.create_board("General").await.unwrap().id;
  let offtopic = s.create_board("Off-topic").await.unwrap().id;
  let (t, ids) = seed_topic(&s, general, "Original", &[true, true]).await;

  let mut request = split_request(t, SplitSelection::From(ids[1]), "Chatter");
  request.target_board = Some(offtopic);
  let outcome = s.split_topic(request, EngineSettings::default()).await.unwrap();

  assert_eq!(outcome.new_topic.board_id, offtopic);
  assert_eq!(
    totals(&s, general).await,
    BoardTotals { num_topics: 1, unapproved_topics: 0, num_posts: 1, unapproved_posts: 0 }
  );
  assert_eq!(
    totals(&s, offtopic).await,
    BoardTotals { num_topics: 1, unapproved_topics: 0, num_posts: 2, unapproved_posts: 0 }
  );
}

#[tokio::test]
async fn split_selecting_first_message_changes_nothing() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Original", &[true, true]).await;
  let before_topic = topic(&s, t).await;
  let before_totals = totals(&s, board).await;

  let err = s
    .split_topic(
      split_request(t, SplitSelection::Only(ids[0]), "Nope"),
      EngineSettings::default(),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(splice_core::Error::WouldOrphanTopic { .. })));

  assert_eq!(topic(&s, t).await, before_topic);
  assert_eq!(totals(&s, board).await, before_totals);
  assert_eq!(message_ids(&s, t).await, ids);
}

#[tokio::test]
async fn split_selecting_everything_is_rejected() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Original", &[true]).await;

  let err = s
    .split_topic(
      split_request(t, SplitSelection::Selected(ids.iter().copied().collect()), "All"),
      EngineSettings::default(),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(splice_core::Error::WouldOrphanTopic { .. })));
  assert_eq!(message_ids(&s, t).await, ids);
}

#[tokio::test]
async fn split_with_stale_selection_is_rejected() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, _) = seed_topic(&s, board, "Original", &[true]).await;
  let (_, other) = seed_topic(&s, board, "Elsewhere", &[true]).await;

  let err = s
    .split_topic(
      split_request(t, SplitSelection::Only(other[1]), "Stale"),
      EngineSettings::default(),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(splice_core::Error::MessageNotInTopic { message, .. }) if message == other[1]
  ));
}

#[tokio::test]
async fn split_missing_target_board_rolls_back() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Original", &[true]).await;

  let mut request = split_request(t, SplitSelection::Only(ids[1]), "Nowhere");
  request.target_board = Some(BoardId(404));
  let err = s.split_topic(request, EngineSettings::default()).await.unwrap_err();

  assert!(matches!(err, Error::Core(splice_core::Error::BoardNotFound(BoardId(404)))));
  assert_eq!(message_ids(&s, t).await, ids);
}

#[tokio::test]
async fn split_failing_after_message_rewrite_rolls_back() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Original", &[true, false]).await;
  let before_topic = topic(&s, t).await;
  let before_totals = totals(&s, board).await;

  freeze_boards(&s).await;
  let err = s
    .split_topic(
      split_request(t, SplitSelection::From(ids[2]), "Pending"),
      EngineSettings::default(),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));

  assert_eq!(message_ids(&s, t).await, ids);
  assert_eq!(topic(&s, t).await, before_topic);
  assert!(s.get_topic(TopicId(t.0 + 1)).await.unwrap().is_none());
  assert_eq!(totals(&s, board).await, before_totals);
}

#[tokio::test]
async fn split_moves_reports_and_copies_member_state() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Original", &[true, true]).await;

  let kept_report = s.report_post(ids[1]).await.unwrap();
  let moved_report = s.report_post(ids[2]).await.unwrap();
  s.subscribe_topic(MemberId(7), t, true).await.unwrap();
  s.mark_read(MemberId(7), t, ids[2], false).await.unwrap();

  let outcome = s
    .split_topic(
      split_request(t, SplitSelection::Only(ids[2]), "Moved"),
      EngineSettings::default(),
    )
    .await
    .unwrap();
  let new_id = outcome.new_topic.id;

  let reports = s.reported_posts().await.unwrap();
  let find = |id| reports.iter().find(|r| r.report_id == id).unwrap();
  assert_eq!(find(kept_report.report_id).topic_id, t);
  assert_eq!(find(moved_report.report_id).topic_id, new_id);

  let subs = s.topic_subscriptions(new_id).await.unwrap();
  assert_eq!(subs.len(), 1);
  assert_eq!(subs[0].member_id, MemberId(7));
  assert!(subs[0].sent);
  assert_eq!(s.topic_subscriptions(t).await.unwrap().len(), 1);

  let marks = s.read_marks(new_id).await.unwrap();
  assert_eq!(marks.len(), 1);
  assert_eq!(marks[0].last_read_msg_id, ids[2]);
}

#[tokio::test]
async fn split_indexes_new_subject() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Gardening tips", &[true]).await;

  let outcome = s
    .split_topic(
      split_request(t, SplitSelection::Only(ids[1]), "Tomato troubles"),
      EngineSettings::default(),
    )
    .await
    .unwrap();

  assert_eq!(s.topics_with_subject_word("tomato").await.unwrap(), vec![outcome.new_topic.id]);
  assert_eq!(s.topics_with_subject_word("gardening").await.unwrap(), vec![t]);
}

// ─── Merge ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_with_redirect_leaves_locked_stub() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t1, a) = seed_topic(&s, board, "First", &[true]).await;
  let (t2, b) = seed_topic(&s, board, "Second", &[false]).await;

  let options = MergeOptions {
    create_redirects: true,
    redirect: RedirectOptions { poster_name: "Mod".into(), ..RedirectOptions::default() },
    ..MergeOptions::default()
  };
  let outcome = s
    .merge_topics(merge_request(&[t2, t1], options), EngineSettings::default())
    .await
    .unwrap();

  assert_eq!(outcome.survivor.id, t1);
  assert_eq!(outcome.sources, vec![t1, t2]);
  assert!(outcome.deleted_topics.is_empty());

  let survivor = topic(&s, t1).await;
  assert_eq!(survivor.first_msg_id, a[0]);
  assert_eq!(survivor.last_msg_id, b[0]);
  assert_eq!(survivor.num_replies, 2);
  assert_eq!(survivor.unapproved_posts, 1);
  assert!(survivor.approved);
  assert_eq!(message_ids(&s, t1).await, vec![a[0], a[1], b[0], b[1]]);

  let stub = topic(&s, t2).await;
  assert!(stub.is_locked);
  assert_eq!(stub.redirect_topic_id, Some(t1));
  assert_eq!(stub.redirect_expires_at, None);
  assert_eq!(stub.subject, "Merged: Second");

  let stub_messages = s.topic_messages(t2).await.unwrap();
  assert_eq!(stub_messages.len(), 1);
  assert_eq!(stub_messages[0].icon, REDIRECT_ICON);
  assert_eq!((stub.first_msg_id, stub.last_msg_id), (stub_messages[0].id, stub_messages[0].id));
  assert_eq!((stub.num_replies, stub.unapproved_posts), (0, 0));
  assert!(stub_messages[0].body.contains(&format!("[iurl]?topic={t1}.0[/iurl]")));

  assert_eq!(
    totals(&s, board).await,
    BoardTotals { num_topics: 2, unapproved_topics: 0, num_posts: 4, unapproved_posts: 1 }
  );
}

#[tokio::test]
async fn merge_without_redirect_deletes_sources() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t1, _) = seed_topic(&s, board, "First", &[true]).await;
  let (t2, _) = seed_topic(&s, board, "Second", &[true]).await;
  let (t3, _) = seed_topic(&s, board, "Third", &[]).await;

  let moderator = Moderator::new(s.clone()).with_moderation_log(s.clone());
  moderator
    .split_topic(split_request(t2, SplitSelection::From(message_ids(&s, t2).await[1]), "Aside"))
    .await
    .unwrap();

  let outcome = s
    .merge_topics(merge_request(&[t1, t2, t3], MergeOptions::default()), EngineSettings::default())
    .await
    .unwrap();

  assert_eq!(outcome.deleted_topics, vec![t2, t3]);
  assert!(s.get_topic(t2).await.unwrap().is_none());
  assert!(s.get_topic(t3).await.unwrap().is_none());

  // Log rows of deleted topics now point at the survivor.
  let log = s.moderation_log().await.unwrap();
  assert_eq!(log.len(), 1);
  assert_eq!(log[0].topic_id, t1);

  assert_eq!(totals(&s, board).await.num_topics, 2);
  assert_eq!(totals(&s, board).await.num_posts, 5);
}

#[tokio::test]
async fn merge_moves_log_rows_of_deleted_topics_to_target_board() {
  let s = store().await;
  let general = s.create_board("General").await.unwrap().id;
  let events = s.create_board("Events").await.unwrap().id;
  let (t1, _) = seed_topic(&s, general, "Meetup", &[]).await;
  let (t2, b) = seed_topic(&s, events, "Meetup details", &[true, true]).await;

  let moderator = Moderator::new(s.clone()).with_moderation_log(s.clone());
  moderator
    .split_topic(split_request(t2, SplitSelection::Only(b[2]), "Carpool"))
    .await
    .unwrap();
  assert_eq!(s.moderation_log().await.unwrap()[0].board_id, events);

  let options = MergeOptions { target_board: Some(general), ..MergeOptions::default() };
  let outcome = s
    .merge_topics(merge_request(&[t1, t2], options), EngineSettings::default())
    .await
    .unwrap();
  assert_eq!(outcome.deleted_topics, vec![t2]);

  let log = s.moderation_log().await.unwrap();
  assert_eq!((log[0].topic_id, log[0].board_id), (t1, general));
}

#[tokio::test]
async fn merge_failing_after_message_rewrite_rolls_back() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t1, a) = seed_topic(&s, board, "First", &[true]).await;
  let (t2, b) = seed_topic(&s, board, "Second", &[false]).await;
  let before = (topic(&s, t1).await, topic(&s, t2).await);
  let before_totals = totals(&s, board).await;

  freeze_boards(&s).await;
  let options = MergeOptions { create_redirects: true, ..MergeOptions::default() };
  let err = s
    .merge_topics(merge_request(&[t1, t2], options), EngineSettings::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));

  assert_eq!(message_ids(&s, t1).await, a);
  assert_eq!(message_ids(&s, t2).await, b);
  assert_eq!((topic(&s, t1).await, topic(&s, t2).await), before);
  assert_eq!(topic(&s, t2).await.redirect_topic_id, None);
  assert!(!topic(&s, t2).await.is_locked);
  assert_eq!(totals(&s, board).await, before_totals);
}

#[tokio::test]
async fn merge_keeps_chosen_poll_and_deletes_the_rest() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t1, _) = seed_topic(&s, board, "Poll one", &[]).await;
  let (t2, _) = seed_topic(&s, board, "Poll two", &[]).await;

  let keep = s.create_poll(t1, "Tabs or spaces?", &["Tabs", "Spaces"]).await.unwrap();
  let dropped = s.create_poll(t2, "Vim or Emacs?", &["Vim", "Emacs"]).await.unwrap();
  s.cast_vote(dropped, MemberId(4), 0).await.unwrap();
  s.cast_vote(dropped, MemberId(5), 1).await.unwrap();

  let ambiguous = s
    .merge_topics(merge_request(&[t1, t2], MergeOptions::default()), EngineSettings::default())
    .await
    .unwrap_err();
  assert!(matches!(ambiguous, Error::Core(splice_core::Error::AmbiguousPoll)));

  let options = MergeOptions { target_poll: Some(keep), ..MergeOptions::default() };
  let outcome = s
    .merge_topics(merge_request(&[t1, t2], options), EngineSettings::default())
    .await
    .unwrap();

  assert_eq!(outcome.survivor.poll_id, Some(keep));
  assert_eq!(outcome.deleted_polls, vec![dropped]);
  assert_eq!(s.poll_footprint(dropped).await.unwrap(), (false, 0, 0));
  assert_eq!(s.poll_footprint(keep).await.unwrap(), (true, 2, 0));
}

#[tokio::test]
async fn merge_collapses_member_state() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t1, a) = seed_topic(&s, board, "First", &[true]).await;
  let (t2, b) = seed_topic(&s, board, "Second", &[true]).await;

  s.subscribe_topic(MemberId(7), t1, false).await.unwrap();
  s.subscribe_topic(MemberId(7), t2, true).await.unwrap();
  s.subscribe_topic(MemberId(8), t2, false).await.unwrap();
  s.subscribe_board(MemberId(9), board).await.unwrap();
  s.mark_read(MemberId(7), t1, a[1], true).await.unwrap();
  s.mark_read(MemberId(7), t2, b[0], false).await.unwrap();

  s.merge_topics(merge_request(&[t1, t2], MergeOptions::default()), EngineSettings::default())
    .await
    .unwrap();

  let subs = s.topic_subscriptions(t1).await.unwrap();
  assert_eq!(subs.len(), 2);
  assert_eq!((subs[0].member_id, subs[0].sent), (MemberId(7), true));
  assert_eq!((subs[1].member_id, subs[1].sent), (MemberId(8), false));
  assert_eq!(s.board_subscriber_count(board).await.unwrap(), 1);

  let marks = s.read_marks(t1).await.unwrap();
  assert_eq!(marks.len(), 1);
  assert_eq!(marks[0].last_read_msg_id, a[1]);
  assert!(marks[0].unwatched);
}

#[tokio::test]
async fn merge_repoints_reports_and_calendar_links() {
  let s = store().await;
  let general = s.create_board("General").await.unwrap().id;
  let events = s.create_board("Events").await.unwrap().id;
  let (t1, _) = seed_topic(&s, general, "Meetup", &[]).await;
  let (t2, b) = seed_topic(&s, events, "Meetup details", &[true]).await;

  s.report_post(b[1]).await.unwrap();
  s.link_event("Spring meetup", t2).await.unwrap();

  let options = MergeOptions { target_board: Some(events), ..MergeOptions::default() };
  s.merge_topics(merge_request(&[t1, t2], options), EngineSettings::default())
    .await
    .unwrap();

  let reports = s.reported_posts().await.unwrap();
  assert_eq!((reports[0].topic_id, reports[0].board_id), (t1, events));
  let links = s.calendar_links().await.unwrap();
  assert_eq!((links[0].topic_id, links[0].board_id), (t1, events));

  assert_eq!(totals(&s, general).await, BoardTotals::default());
  assert_eq!(
    totals(&s, events).await,
    BoardTotals { num_topics: 1, unapproved_topics: 0, num_posts: 3, unapproved_posts: 0 }
  );
}

#[tokio::test]
async fn merge_outside_permitted_boards_is_rejected() {
  let s = store().await;
  let general = s.create_board("General").await.unwrap().id;
  let archive = s.create_board("Archive").await.unwrap().id;
  let (t1, _) = seed_topic(&s, general, "First", &[]).await;
  let (t2, _) = seed_topic(&s, general, "Second", &[]).await;

  let options = MergeOptions {
    target_board: Some(archive),
    permitted_boards: Some(BTreeSet::from([general])),
    ..MergeOptions::default()
  };
  let err = s
    .merge_topics(merge_request(&[t1, t2], options), EngineSettings::default())
    .await
    .unwrap_err();

  assert!(matches!(err, Error::Core(splice_core::Error::TargetBoardNotPermitted(b)) if b == archive));
  assert!(s.get_topic(t2).await.unwrap().is_some());
}

#[tokio::test]
async fn merge_refuses_redirect_stubs() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t1, _) = seed_topic(&s, board, "First", &[]).await;
  let (t2, _) = seed_topic(&s, board, "Second", &[]).await;
  let (t3, _) = seed_topic(&s, board, "Third", &[]).await;

  let options = MergeOptions { create_redirects: true, ..MergeOptions::default() };
  s.merge_topics(merge_request(&[t1, t2], options), EngineSettings::default())
    .await
    .unwrap();

  let err = s
    .merge_topics(merge_request(&[t2, t3], MergeOptions::default()), EngineSettings::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(splice_core::Error::ContainsRedirectStub(id)) if id == t2));
}

#[tokio::test]
async fn merge_custom_subject_is_enforced_and_indexed() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t1, _) = seed_topic(&s, board, "Bug report", &[true]).await;
  let (t2, _) = seed_topic(&s, board, "Same bug again", &[]).await;

  let options = MergeOptions {
    subject: SubjectChoice::Custom("  Crash on startup  ".into()),
    enforce_subject: true,
    ..MergeOptions::default()
  };
  let outcome = s
    .merge_topics(merge_request(&[t1, t2], options), EngineSettings::default())
    .await
    .unwrap();

  assert_eq!(outcome.subject_override.as_deref(), Some("Crash on startup"));
  let messages = s.topic_messages(t1).await.unwrap();
  assert_eq!(messages[0].subject, "Crash on startup");
  assert!(messages[1..].iter().all(|m| m.subject == "Re: Crash on startup"));

  assert_eq!(s.topics_with_subject_word("crash").await.unwrap(), vec![t1]);
  assert!(s.topics_with_subject_word("again").await.unwrap().is_empty());
}

#[tokio::test]
async fn merge_combines_topic_flags() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t1, _) = seed_topic(&s, board, "First", &[]).await;
  let (t2, _) = seed_topic(&s, board, "Second", &[]).await;
  s.set_topic_flags(t2, true, true).await.unwrap();
  s.record_view(t1).await.unwrap();
  s.record_view(t2).await.unwrap();
  s.record_view(t2).await.unwrap();

  let outcome = s
    .merge_topics(merge_request(&[t1, t2], MergeOptions::default()), EngineSettings::default())
    .await
    .unwrap();

  assert!(outcome.survivor.is_sticky);
  assert!(outcome.survivor.is_locked);
  assert_eq!(outcome.survivor.num_views, 3);
}

#[tokio::test]
async fn split_then_merge_restores_aggregate() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, ids) = seed_topic(&s, board, "Round trip", &[true, false, true]).await;
  let before = topic(&s, t).await;
  let before_totals = totals(&s, board).await;

  let outcome = s
    .split_topic(
      split_request(t, SplitSelection::From(ids[2]), "Detour"),
      EngineSettings::default(),
    )
    .await
    .unwrap();
  s.merge_topics(
    merge_request(&[t, outcome.new_topic.id], MergeOptions::default()),
    EngineSettings::default(),
  )
  .await
  .unwrap();

  let after = topic(&s, t).await;
  assert_eq!(after.first_msg_id, before.first_msg_id);
  assert_eq!(after.last_msg_id, before.last_msg_id);
  assert_eq!(after.num_replies, before.num_replies);
  assert_eq!(after.unapproved_posts, before.unapproved_posts);
  assert_eq!(after.approved, before.approved);
  assert_eq!(totals(&s, board).await, before_totals);
}

// ─── Moderator ───────────────────────────────────────────────────────────────

struct BrokenIndex;

impl SearchIndex for BrokenIndex {
  async fn on_topic_split(&self, _: TopicId, _: Vec<MessageId>) -> Result<(), HookError> {
    Err("index offline".into())
  }

  async fn on_topic_merge(
    &self,
    _: TopicId,
    _: Vec<TopicId>,
    _: Vec<MessageId>,
    _: Option<String>,
  ) -> Result<(), HookError> {
    Err("index offline".into())
  }
}

struct BrokenNotifier;

impl splice_core::hooks::Notifier for BrokenNotifier {
  async fn notify_subscribers(&self, _: TopicId, _: NotifyEvent) -> Result<(), HookError> {
    Err("mail queue full".into())
  }
}

#[tokio::test]
async fn failing_hooks_do_not_fail_the_operation() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t1, ids) = seed_topic(&s, board, "First", &[true]).await;
  let (t2, _) = seed_topic(&s, board, "Second", &[]).await;

  let moderator = Moderator::new(s.clone())
    .with_search_index(BrokenIndex)
    .with_moderation_log(s.clone())
    .with_notifier(BrokenNotifier);

  let split = moderator
    .split_topic(split_request(t1, SplitSelection::Only(ids[1]), "Split"))
    .await
    .unwrap();
  let merge = moderator
    .merge_topics(merge_request(&[t1, t2], MergeOptions::default()))
    .await
    .unwrap();

  let log = s.moderation_log().await.unwrap();
  assert_eq!(log.len(), 2);
  assert_eq!(log[0].action, ModerationAction::Split);
  assert_eq!(log[0].new_topic, Some(split.new_topic.id));
  assert_eq!(log[1].action, ModerationAction::Merge);
  assert_eq!(log[1].topic_id, merge.survivor.id);
  assert_eq!(log[1].new_topic, None);
}

#[tokio::test]
async fn moderator_rejects_invalid_requests_before_the_store() {
  let s = store().await;
  let board = s.create_board("General").await.unwrap().id;
  let (t, _) = seed_topic(&s, board, "Only", &[]).await;
  let moderator = Moderator::new(s.clone()).with_moderation_log(s.clone());

  let err = moderator
    .merge_topics(merge_request(&[t, t], MergeOptions::default()))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(splice_core::Error::InsufficientTopics(1))));

  let err = moderator
    .split_topic(split_request(t, SplitSelection::Selected(BTreeSet::new()), "Empty"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(splice_core::Error::EmptySelection)));

  assert!(s.moderation_log().await.unwrap().is_empty());
}
