//! [`Moderator`] sequences a transactional store operation and the
//! best-effort hooks that follow it.

use std::future::Future;

use tracing::Instrument as _;
use uuid::Uuid;

use crate::{
  ErrorClass,
  hooks::{Disabled, HookError, ModerationLog, Notifier, SearchIndex},
  merge::MergeRequest,
  model::{LogAction, ModerationAction, NotifyEvent},
  settings::EngineSettings,
  split::SplitRequest,
  store::{ForumStore, MergeOutcome, SplitOutcome, StoreError},
};

/// Entry point for split and merge.
///
/// The store call is atomic. Search indexing, the moderation log and
/// notifications run afterwards; a failing hook is logged and the operation
/// still reports success.
pub struct Moderator<S, X = Disabled, L = Disabled, N = Disabled> {
  store:    S,
  search:   X,
  log:      L,
  notify:   N,
  settings: EngineSettings,
}

impl<S: ForumStore> Moderator<S> {
  pub fn new(store: S) -> Self {
    Self {
      store,
      search: Disabled,
      log: Disabled,
      notify: Disabled,
      settings: EngineSettings::default(),
    }
  }
}

impl<S, X, L, N> Moderator<S, X, L, N> {
  pub fn with_settings(mut self, settings: EngineSettings) -> Self {
    self.settings = settings;
    self
  }

  pub fn with_search_index<X2: SearchIndex>(self, search: X2) -> Moderator<S, X2, L, N> {
    Moderator {
      store: self.store,
      search,
      log: self.log,
      notify: self.notify,
      settings: self.settings,
    }
  }

  pub fn with_moderation_log<L2: ModerationLog>(self, log: L2) -> Moderator<S, X, L2, N> {
    Moderator {
      store: self.store,
      search: self.search,
      log,
      notify: self.notify,
      settings: self.settings,
    }
  }

  pub fn with_notifier<N2: Notifier>(self, notify: N2) -> Moderator<S, X, L, N2> {
    Moderator {
      store: self.store,
      search: self.search,
      log: self.log,
      notify,
      settings: self.settings,
    }
  }
}

impl<S, X, L, N> Moderator<S, X, L, N>
where
  S: ForumStore,
  X: SearchIndex,
  L: ModerationLog,
  N: Notifier,
{
  /// Split messages out of a topic into a new one.
  pub async fn split_topic(&self, request: SplitRequest) -> Result<SplitOutcome, S::Error> {
    let span = tracing::info_span!(
      "split_topic",
      op = %Uuid::new_v4(),
      topic = %request.topic_id,
    );
    self.split_inner(request).instrument(span).await
  }

  /// Merge several topics into the one with the lowest id.
  pub async fn merge_topics(&self, request: MergeRequest) -> Result<MergeOutcome, S::Error> {
    let span = tracing::info_span!(
      "merge_topics",
      op = %Uuid::new_v4(),
      topics = ?request.topics,
    );
    self.merge_inner(request).instrument(span).await
  }

  async fn split_inner(&self, request: SplitRequest) -> Result<SplitOutcome, S::Error> {
    if let Err(e) = request.validate() {
      tracing::debug!(error = %e, "split rejected");
      return Err(e.into());
    }
    let actor = request.actor;

    let outcome = self
      .store
      .split_topic(request, self.settings.clone())
      .await
      .inspect_err(report_failure)?;

    tracing::info!(
      new_topic = %outcome.new_topic.id,
      moved = outcome.moved.len(),
      "split committed",
    );

    best_effort(
      "search index",
      self.search.on_topic_split(outcome.new_topic.id, outcome.moved.clone()),
    )
    .await;
    best_effort(
      "moderation log",
      self.log.log_action(LogAction {
        action:    ModerationAction::Split,
        member_id: actor,
        topic_id:  outcome.source.id,
        board_id:  outcome.source.board_id,
        new_topic: Some(outcome.new_topic.id),
      }),
    )
    .await;
    best_effort(
      "notification",
      self.notify.notify_subscribers(outcome.source.id, NotifyEvent::Split),
    )
    .await;

    Ok(outcome)
  }

  async fn merge_inner(&self, request: MergeRequest) -> Result<MergeOutcome, S::Error> {
    if let Err(e) = request.validate() {
      tracing::debug!(error = %e, "merge rejected");
      return Err(e.into());
    }
    let actor = request.actor;

    let outcome = self
      .store
      .merge_topics(request, self.settings.clone())
      .await
      .inspect_err(report_failure)?;

    tracing::info!(
      survivor = %outcome.survivor.id,
      redirects = outcome.redirects.len(),
      deleted = outcome.deleted_topics.len(),
      "merge committed",
    );

    best_effort(
      "search index",
      self.search.on_topic_merge(
        outcome.survivor.id,
        outcome.sources.clone(),
        outcome.messages.clone(),
        outcome.subject_override.clone(),
      ),
    )
    .await;
    best_effort(
      "moderation log",
      self.log.log_action(LogAction {
        action:    ModerationAction::Merge,
        member_id: actor,
        topic_id:  outcome.survivor.id,
        board_id:  outcome.survivor.board_id,
        new_topic: None,
      }),
    )
    .await;
    best_effort(
      "notification",
      self.notify.notify_subscribers(outcome.survivor.id, NotifyEvent::Merge),
    )
    .await;

    Ok(outcome)
  }
}

fn report_failure<E: StoreError>(err: &E) {
  match err.as_core().map(crate::Error::class) {
    Some(ErrorClass::Validation) => tracing::debug!(error = %err, "operation rejected"),
    Some(ErrorClass::Consistency) => {
      tracing::error!(error = %err, "consistency violation; transaction aborted")
    }
    None => tracing::warn!(error = %err, "store failure; transaction aborted"),
  }
}

async fn best_effort(hook: &'static str, call: impl Future<Output = Result<(), HookError>>) {
  if let Err(e) = call.await {
    tracing::warn!(hook, error = %e, "post-commit hook failed");
  }
}
