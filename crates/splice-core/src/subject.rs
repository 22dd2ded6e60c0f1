//! Subject normalisation and the words cached for subject search.

use std::collections::BTreeSet;

use crate::{Error, Result, ids::MessageId};

/// Trim `raw` and cut it to `max_chars` characters.
pub fn normalize_subject(raw: &str, max_chars: usize) -> Result<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(Error::EmptySubject);
  }
  Ok(trimmed.chars().take(max_chars).collect::<String>().trim_end().to_owned())
}

/// The subject a reply carries, e.g. `Re: Weekend plans`.
pub fn reply_subject(prefix: &str, subject: &str) -> String { format!("{prefix}{subject}") }

/// Subjects for a topic's messages once `subject` is enforced on all of
/// them: the first message gets it verbatim, the rest as replies.
pub fn enforced_subjects(
  first: MessageId,
  messages: impl IntoIterator<Item = MessageId>,
  subject: &str,
  reply_prefix: &str,
) -> Vec<(MessageId, String)> {
  messages
    .into_iter()
    .map(|id| {
      let s = if id == first {
        subject.to_owned()
      } else {
        reply_subject(reply_prefix, subject)
      };
      (id, s)
    })
    .collect()
}

/// Lower-cased alphanumeric words of `subject`, deduplicated.
pub fn search_words(subject: &str) -> BTreeSet<String> {
  subject
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .map(str::to_lowercase)
    .collect()
}
