//! Post-commit collaborators: search indexing, the moderation log, and
//! subscriber notifications.
//!
//! These run only after the structural change has committed. Their failures
//! are logged by the [`crate::moderator::Moderator`] and never reach the
//! caller.

use std::future::Future;

use crate::{
  ids::{MessageId, TopicId},
  model::{LogAction, NotifyEvent},
};

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Incremental reindexing hooks of the search subsystem.
pub trait SearchIndex: Send + Sync {
  fn on_topic_split(
    &self,
    new_topic: TopicId,
    moved: Vec<MessageId>,
  ) -> impl Future<Output = Result<(), HookError>> + Send + '_;

  fn on_topic_merge(
    &self,
    survivor: TopicId,
    sources: Vec<TopicId>,
    messages: Vec<MessageId>,
    subject_override: Option<String>,
  ) -> impl Future<Output = Result<(), HookError>> + Send + '_;
}

/// Append-only record of moderator actions.
pub trait ModerationLog: Send + Sync {
  fn log_action(&self, entry: LogAction) -> impl Future<Output = Result<(), HookError>> + Send + '_;
}

/// Delivers notices to the members subscribed to a topic.
pub trait Notifier: Send + Sync {
  fn notify_subscribers(
    &self,
    topic: TopicId,
    event: NotifyEvent,
  ) -> impl Future<Output = Result<(), HookError>> + Send + '_;
}

/// A collaborator that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl SearchIndex for Disabled {
  async fn on_topic_split(&self, _: TopicId, _: Vec<MessageId>) -> Result<(), HookError> { Ok(()) }

  async fn on_topic_merge(
    &self,
    _: TopicId,
    _: Vec<TopicId>,
    _: Vec<MessageId>,
    _: Option<String>,
  ) -> Result<(), HookError> {
    Ok(())
  }
}

impl ModerationLog for Disabled {
  async fn log_action(&self, _: LogAction) -> Result<(), HookError> { Ok(()) }
}

impl Notifier for Disabled {
  async fn notify_subscribers(&self, _: TopicId, _: NotifyEvent) -> Result<(), HookError> { Ok(()) }
}
