//! Per-frame traversal counters.

/// Statistics from one or more tile walker runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraverseStats {
  /// Cells whose placement was decided.
  pub visited: usize,
  /// Cells skipped by the clip-plane test.
  pub culled: usize,
  /// Cells handed to their flake cache for rendering.
  pub rendered: usize,
  /// Cells dropped: unresolvable level at the floor, too coarse, or no
  /// elevation data.
  pub dropped: usize,
  /// Visited cells whose tile failed to decode, or rendered cells where at
  /// least one layer failed to evaluate.
  pub failed: usize,
  /// Time spent in traversal (microseconds).
  pub traverse_us: u64,
}

impl TraverseStats {
  /// Accumulate another walker's counters.
  pub fn merge(&mut self, other: &TraverseStats) {
    self.visited += other.visited;
    self.culled += other.culled;
    self.rendered += other.rendered;
    self.dropped += other.dropped;
    self.failed += other.failed;
    self.traverse_us += other.traverse_us;
  }

  /// Cells that produced no output.
  #[inline]
  pub fn discarded(&self) -> usize {
    self.culled + self.dropped
  }
}
