//! Outstanding tile request budget.
//!
//! Bounds the number of tile fetches in flight across every flake cache of
//! a scene. A fetch may only start while holding a [`RequestSlot`]; the
//! slot is released when dropped, so success, failure, cancellation and
//! cache disposal each give the slot back exactly once.

use std::cell::Cell;
use std::rc::Rc;

struct BudgetState {
  max_outstanding: usize,
  outstanding: Cell<usize>,
}

/// Shared counter of outstanding tile requests.
///
/// Cloning shares the same counter. Not `Send`: the budget belongs to the
/// traversal thread.
#[derive(Clone)]
pub struct RequestBudget {
  state: Rc<BudgetState>,
}

impl RequestBudget {
  /// Default maximum number of concurrent tile requests.
  pub const DEFAULT_MAX_OUTSTANDING: usize = 8;

  /// Budget allowing `max_outstanding` concurrent requests.
  pub fn new(max_outstanding: usize) -> Self {
    Self {
      state: Rc::new(BudgetState {
        max_outstanding,
        outstanding: Cell::new(0),
      }),
    }
  }

  /// Budget that never declines.
  pub fn unlimited() -> Self {
    Self::new(usize::MAX)
  }

  /// Take a slot if one is free; `None` defers the request to a later frame.
  pub fn try_acquire(&self) -> Option<RequestSlot> {
    let current = self.state.outstanding.get();
    if current >= self.state.max_outstanding {
      return None;
    }
    self.state.outstanding.set(current + 1);
    Some(RequestSlot {
      state: Rc::clone(&self.state),
    })
  }

  /// Requests currently in flight.
  pub fn outstanding(&self) -> usize {
    self.state.outstanding.get()
  }

  /// Configured maximum.
  pub fn max_outstanding(&self) -> usize {
    self.state.max_outstanding
  }
}

impl Default for RequestBudget {
  fn default() -> Self {
    Self::new(Self::DEFAULT_MAX_OUTSTANDING)
  }
}

impl std::fmt::Debug for RequestBudget {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RequestBudget")
      .field("outstanding", &self.outstanding())
      .field("max_outstanding", &self.max_outstanding())
      .finish()
  }
}

/// One unit of the request budget, released on drop.
pub struct RequestSlot {
  state: Rc<BudgetState>,
}

impl Drop for RequestSlot {
  fn drop(&mut self) {
    let current = self.state.outstanding.get();
    debug_assert!(current > 0, "request budget underflow");
    self.state.outstanding.set(current.saturating_sub(1));
  }
}

impl std::fmt::Debug for RequestSlot {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("RequestSlot")
  }
}
