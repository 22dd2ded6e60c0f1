//! Engine tunables.

use serde::{Deserialize, Serialize};

/// Subject and redirect formatting used by the planners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
  /// Subjects are trimmed and cut to this many characters.
  pub subject_max_chars:       usize,
  /// Prepended to the subject of every non-first message of a topic.
  pub reply_prefix:            String,
  /// Prepended to the original subject of a redirect stub.
  pub redirect_subject_prefix: String,
  /// Link to a topic; `{topic}` is replaced by the topic id.
  pub topic_link_template:     String,
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self {
      subject_max_chars:       100,
      reply_prefix:            "Re: ".into(),
      redirect_subject_prefix: "Merged: ".into(),
      topic_link_template:     "?topic={topic}.0".into(),
    }
  }
}
