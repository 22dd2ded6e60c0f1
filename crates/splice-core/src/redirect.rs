//! Redirect stubs: retired merge sources reduced to one placeholder message
//! that links to the surviving topic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  ids::{BoardId, MemberId, TopicId},
  model::Topic,
  settings::EngineSettings,
};

/// Placeholder in [`RedirectOptions::reason`] replaced by the survivor link.
pub const TOPIC_LINK_TOKEN: &str = "[TOPIC LINK]";

/// Message icon of every redirect placeholder.
pub const REDIRECT_ICON: &str = "moved";

/// How merge sources are retired when redirects are requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectOptions {
  /// Body of the placeholder message; may contain [`TOPIC_LINK_TOKEN`].
  pub reason:      String,
  /// Seconds until the stub expires; zero keeps it forever.
  pub ttl_secs:    u64,
  pub poster_id:   MemberId,
  pub poster_name: String,
}

impl Default for RedirectOptions {
  fn default() -> Self {
    Self {
      reason:      format!("This topic has been merged into {TOPIC_LINK_TOKEN}."),
      ttl_secs:    0,
      poster_id:   MemberId(0),
      poster_name: String::new(),
    }
  }
}

impl RedirectOptions {
  pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if self.ttl_secs == 0 {
      return None;
    }
    let secs = i64::try_from(self.ttl_secs).ok()?;
    now.checked_add_signed(Duration::try_seconds(secs)?)
  }
}

/// The placeholder message and topic columns for one retired topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectStub {
  pub topic_id:    TopicId,
  pub board_id:    BoardId,
  pub target:      TopicId,
  pub subject:     String,
  pub body:        String,
  pub icon:        String,
  pub poster_id:   MemberId,
  pub poster_name: String,
  pub expires_at:  Option<DateTime<Utc>>,
}

/// Build the stub that replaces `retired`, pointing at `survivor`.
pub fn build_redirect_stub(
  retired: &Topic,
  survivor: TopicId,
  options: &RedirectOptions,
  settings: &EngineSettings,
  now: DateTime<Utc>,
) -> RedirectStub {
  let link = settings.topic_link_template.replace("{topic}", &survivor.to_string());
  let body = options.reason.replace(TOPIC_LINK_TOKEN, &format!("[iurl]{link}[/iurl]"));

  RedirectStub {
    topic_id: retired.id,
    board_id: retired.board_id,
    target: survivor,
    subject: format!("{}{}", settings.redirect_subject_prefix, retired.subject),
    body,
    icon: REDIRECT_ICON.to_owned(),
    poster_id: options.poster_id,
    poster_name: options.poster_name.clone(),
    expires_at: options.expires_at(now),
  }
}
