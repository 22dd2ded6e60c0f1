//! Post-commit hooks for the command-line tool.
//!
//! There is no search daemon or mailer behind the CLI, so reindexing and
//! notification requests are emitted as tracing events for whoever tails
//! the log.

use splice_core::{
  hooks::{HookError, Notifier, SearchIndex},
  ids::{MessageId, TopicId},
  model::NotifyEvent,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSearchIndex;

impl SearchIndex for TracingSearchIndex {
  async fn on_topic_split(&self, new_topic: TopicId, moved: Vec<MessageId>) -> Result<(), HookError> {
    tracing::info!(target: "splice::search", %new_topic, moved = moved.len(), "reindex split");
    Ok(())
  }

  async fn on_topic_merge(
    &self,
    survivor: TopicId,
    sources: Vec<TopicId>,
    messages: Vec<MessageId>,
    subject_override: Option<String>,
  ) -> Result<(), HookError> {
    tracing::info!(
      target: "splice::search",
      %survivor,
      ?sources,
      messages = messages.len(),
      subject = subject_override.as_deref(),
      "reindex merge",
    );
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  async fn notify_subscribers(&self, topic: TopicId, event: NotifyEvent) -> Result<(), HookError> {
    tracing::info!(target: "splice::notify", %topic, %event, "notify subscribers");
    Ok(())
  }
}
