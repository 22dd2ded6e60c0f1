//! Board counters and the reconciler that turns before/after topic
//! aggregates into per-board signed deltas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::BoardId;

/// The denormalised per-board counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardTotals {
  pub num_topics:        u32,
  pub unapproved_topics: u32,
  pub num_posts:         u32,
  pub unapproved_posts:  u32,
}

impl BoardTotals {
  /// A redirect stub counts as one approved topic holding one post.
  pub const REDIRECT_STUB: Self =
    Self { num_topics: 1, unapproved_topics: 0, num_posts: 1, unapproved_posts: 0 };

  /// Apply `delta`, flooring every counter at zero so earlier drift can
  /// never produce a negative total.
  pub fn apply(self, delta: CounterDelta) -> Self {
    Self {
      num_topics:        floor_add(self.num_topics, delta.topics),
      unapproved_topics: floor_add(self.unapproved_topics, delta.unapproved_topics),
      num_posts:         floor_add(self.num_posts, delta.posts),
      unapproved_posts:  floor_add(self.unapproved_posts, delta.unapproved_posts),
    }
  }
}

fn floor_add(current: u32, delta: i64) -> u32 {
  let next = i64::from(current) + delta;
  u32::try_from(next.max(0)).unwrap_or(u32::MAX)
}

/// Signed change to a board's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta {
  pub topics:            i64,
  pub unapproved_topics: i64,
  pub posts:             i64,
  pub unapproved_posts:  i64,
}

impl CounterDelta {
  pub fn is_zero(&self) -> bool { *self == Self::default() }

  fn add(&mut self, totals: BoardTotals, sign: i64) {
    self.topics += sign * i64::from(totals.num_topics);
    self.unapproved_topics += sign * i64::from(totals.unapproved_topics);
    self.posts += sign * i64::from(totals.num_posts);
    self.unapproved_posts += sign * i64::from(totals.unapproved_posts);
  }
}

/// Per-board deltas produced by [`reconcile_board_totals`]. Boards whose
/// delta nets out to zero are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDeltas(BTreeMap<BoardId, CounterDelta>);

impl BoardDeltas {
  pub fn get(&self, board: BoardId) -> Option<&CounterDelta> { self.0.get(&board) }

  pub fn iter(&self) -> impl Iterator<Item = (BoardId, CounterDelta)> + '_ {
    self.0.iter().map(|(b, d)| (*b, *d))
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// Compare the topic contributions touched by an operation before and after
/// it ran and return what each board's counters must change by.
///
/// Redirect stubs are passed in `after` as [`BoardTotals::REDIRECT_STUB`].
pub fn reconcile_board_totals(
  before: &[(BoardId, BoardTotals)],
  after: &[(BoardId, BoardTotals)],
) -> BoardDeltas {
  let mut deltas: BTreeMap<BoardId, CounterDelta> = BTreeMap::new();
  for (board, totals) in before {
    deltas.entry(*board).or_default().add(*totals, -1);
  }
  for (board, totals) in after {
    deltas.entry(*board).or_default().add(*totals, 1);
  }
  deltas.retain(|_, d| !d.is_zero());
  BoardDeltas(deltas)
}
