//! Per-feature evaluated values.

use std::collections::HashMap;

use serde_json::Value;

use super::summary::EvaluationSummary;
use crate::feature_state::FeatureStateStore;
use crate::style::expr::values_equal;
use crate::style::{BindingId, EvalContext, PropertyCategory, StyleLayer};
use crate::tile::TileFeature;

/// Which frame inputs moved since the previous visit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct VisitChanges {
  /// Continuous zoom differs.
  pub zoom: bool,
  /// Integer zoom differs.
  pub level: bool,
}

/// Values of one feature's feature-dependent bindings in one cell and layer.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureCache {
  values: HashMap<BindingId, Value>,
  state_revision: u64,
}

impl FeatureCache {
  /// Evaluate every feature-dependent binding of `layer` for `feature`.
  pub fn new(
    layer: &StyleLayer,
    feature: &TileFeature,
    ctx: &EvalContext,
    states: &FeatureStateStore,
  ) -> Self {
    let state = feature.id.and_then(|id| states.lookup(id));
    let values = layer
      .feature_bindings()
      .map(|(id, binding)| (id, binding.evaluate(ctx, Some(feature), state)))
      .collect();
    Self {
      values,
      state_revision: feature.id.map_or(0, |id| states.revision(id)),
    }
  }

  /// Own value of `id`, if this level holds it.
  #[inline]
  pub fn value(&self, id: BindingId) -> Option<&Value> {
    self.values.get(&id)
  }

  /// Re-evaluate the bindings whose inputs changed. Changed layout and
  /// paint values are recorded in `summary` under `index`.
  #[allow(clippy::too_many_arguments)]
  pub(crate) fn update(
    &mut self,
    index: usize,
    layer: &StyleLayer,
    feature: &TileFeature,
    ctx: &EvalContext,
    changes: VisitChanges,
    states: &FeatureStateStore,
    summary: &mut EvaluationSummary,
  ) {
    let revision = feature.id.map_or(0, |id| states.revision(id));
    let state_changed = revision != self.state_revision;
    if !changes.zoom && !changes.level && !state_changed {
      return;
    }

    let state = feature.id.and_then(|id| states.lookup(id));
    for (id, binding) in layer.feature_bindings() {
      let due = match binding.category() {
        PropertyCategory::Paint => {
          (binding.has_zoom() && changes.zoom) || (binding.has_feature_state() && state_changed)
        }
        PropertyCategory::Layout => binding.has_zoom() && changes.level,
      };
      if !due {
        continue;
      }
      let value = binding.evaluate(ctx, Some(feature), state);
      if self.values.get(&id).is_some_and(|old| values_equal(old, &value)) {
        continue;
      }
      match binding.category() {
        PropertyCategory::Layout => {
          summary.evaluated_properties.insert(id);
          summary.changed_features.insert(index);
        }
        PropertyCategory::Paint => {
          summary.repainted_features.insert(index);
        }
      }
      self.values.insert(id, value);
    }
    self.state_revision = revision;
  }
}
