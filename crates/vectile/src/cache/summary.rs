//! Per-visit evaluation summary.

use std::collections::BTreeSet;

use crate::style::BindingId;

/// What changed in one layer cache during one visit.
///
/// Feature entries are tile-layer feature indices. Renderable content is
/// updated from this record only, so per-frame cost follows the number of
/// changed entities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
  /// Features that started passing the filter.
  pub added_features: BTreeSet<usize>,
  /// Features that stopped passing the filter.
  pub deleted_features: BTreeSet<usize>,
  /// Layout bindings whose value changed, at either cache level.
  pub evaluated_properties: BTreeSet<BindingId>,
  /// Surviving features with at least one changed per-feature layout value.
  pub changed_features: BTreeSet<usize>,
  /// A layer-level layout value changed; every feature is affected.
  pub layer_layout_changed: bool,
  /// Features with at least one changed per-feature paint value.
  pub repainted_features: BTreeSet<usize>,
  /// A layer-level paint value changed.
  pub layer_paint_changed: bool,
}

impl EvaluationSummary {
  /// Nothing to update.
  pub fn is_empty(&self) -> bool {
    self.added_features.is_empty()
      && self.deleted_features.is_empty()
      && self.evaluated_properties.is_empty()
      && self.changed_features.is_empty()
      && !self.layer_layout_changed
      && self.repainted_features.is_empty()
      && !self.layer_paint_changed
  }

  /// No layout-derived data changed; paint values may have.
  pub fn layout_unchanged(&self) -> bool {
    self.added_features.is_empty()
      && self.deleted_features.is_empty()
      && self.evaluated_properties.is_empty()
      && self.changed_features.is_empty()
      && !self.layer_layout_changed
  }

  /// Layout-derived data of `feature` must be rebuilt.
  pub fn needs_rebuild(&self, feature: usize) -> bool {
    self.layer_layout_changed
      || self.added_features.contains(&feature)
      || self.changed_features.contains(&feature)
  }
}
