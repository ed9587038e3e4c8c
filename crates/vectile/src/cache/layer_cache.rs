//! Per-cell, per-style-layer evaluation cache.
//!
//! # Re-evaluation Rules
//!
//! ```text
//!   binding class          │ paint                      │ layout
//!   ───────────────────────┼────────────────────────────┼──────────────────
//!   Constant               │ never (StyleLayer)         │ never
//!   LayerZoom              │ zoom changed               │ integer zoom changed
//!   Feature, zoom          │ zoom changed               │ integer zoom changed
//!   Feature, state         │ feature state revised      │ (rejected at load)
//!   Feature, data only     │ never                      │ never
//! ```
//!
//! A zoom-dependent filter is re-run whenever the integer zoom changes;
//! features entering or leaving the pass-set become added or deleted
//! entries of the visit's [`EvaluationSummary`]. A filter without zoom is
//! applied once, at construction.
//!
//! When only feature state moved and the cache was last visited in the
//! current frame, just the features of the store's modified ids are
//! re-checked.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use smallvec::SmallVec;

use super::content::LayerContent;
use super::feature_cache::{FeatureCache, VisitChanges};
use super::primitive::{Primitive, RenderStage};
use super::summary::EvaluationSummary;
use crate::area::Area;
use crate::feature_state::FeatureStateStore;
use crate::style::expr::{to_string, values_equal};
use crate::style::{BindingId, EvalContext, PropertyCategory, StyleLayer};
use crate::tile::{TileFeature, TileLayer};

/// Incremental cache of one style layer over one cell's tile layer.
#[derive(Clone, Debug)]
pub struct LayerCache {
  last_zoom: f64,
  last_level: i64,
  state_generation: u64,
  zoom_values: HashMap<BindingId, Value>,
  features: BTreeMap<usize, FeatureCache>,
  /// Tile-layer feature indices by feature id.
  by_id: HashMap<u64, SmallVec<[usize; 1]>>,
  content: LayerContent,
}

fn level_of(zoom: f64) -> i64 {
  zoom.floor() as i64
}

fn passes(layer: &StyleLayer, feature: &TileFeature, ctx: &EvalContext) -> bool {
  if !layer.kind().supports(feature.geometry.kind()) {
    return false;
  }
  layer
    .filter()
    .map_or(true, |filter| filter.evaluate(ctx, Some(feature), None) == Value::Bool(true))
}

impl LayerCache {
  /// Build the cache with a full evaluation, then let the content build
  /// its renderables for every accepted feature.
  pub fn new(
    layer: &StyleLayer,
    tile_layer: &TileLayer,
    ctx: &EvalContext,
    states: &FeatureStateStore,
  ) -> Self {
    let zoom_values = layer
      .layer_zoom_bindings()
      .map(|(id, binding)| (id, binding.evaluate(ctx, None, None)))
      .collect();

    let features: BTreeMap<usize, FeatureCache> = tile_layer
      .features
      .iter()
      .enumerate()
      .filter(|(_, feature)| passes(layer, feature, ctx))
      .map(|(index, feature)| (index, FeatureCache::new(layer, feature, ctx, states)))
      .collect();

    let mut by_id: HashMap<u64, SmallVec<[usize; 1]>> = HashMap::new();
    for (index, feature) in tile_layer.features.iter().enumerate() {
      if let Some(id) = feature.id {
        by_id.entry(id).or_default().push(index);
      }
    }

    let mut cache = Self {
      last_zoom: ctx.zoom,
      last_level: level_of(ctx.zoom),
      state_generation: states.generation(),
      zoom_values,
      features,
      by_id,
      content: LayerContent::for_kind(layer.kind()),
    };

    let initial = EvaluationSummary {
      added_features: cache.features.keys().copied().collect(),
      ..Default::default()
    };
    cache.finish_visit(layer, tile_layer, &initial);
    cache
  }

  /// Re-evaluate what changed since the previous visit.
  pub fn evaluate_features(
    &mut self,
    layer: &StyleLayer,
    tile_layer: &TileLayer,
    ctx: &EvalContext,
    states: &FeatureStateStore,
  ) -> EvaluationSummary {
    let level = level_of(ctx.zoom);
    let changes = VisitChanges {
      zoom: ctx.zoom != self.last_zoom,
      level: level != self.last_level,
    };
    let state_changed = states.generation() != self.state_generation;
    let mut summary = EvaluationSummary::default();

    if !changes.zoom && !changes.level && !state_changed {
      return summary;
    }

    for (id, binding) in layer.layer_zoom_bindings() {
      let due = match binding.category() {
        PropertyCategory::Paint => changes.zoom,
        PropertyCategory::Layout => changes.level,
      };
      if !due {
        continue;
      }
      let value = binding.evaluate(ctx, None, None);
      if self.zoom_values.get(&id).is_some_and(|old| values_equal(old, &value)) {
        continue;
      }
      match binding.category() {
        PropertyCategory::Layout => {
          summary.evaluated_properties.insert(id);
          summary.layer_layout_changed = true;
        }
        PropertyCategory::Paint => summary.layer_paint_changed = true,
      }
      self.zoom_values.insert(id, value);
    }

    if changes.level && !layer.filter_is_static() {
      for (index, feature) in tile_layer.features.iter().enumerate() {
        let passing = passes(layer, feature, ctx);
        let present = self.features.contains_key(&index);
        if passing && !present {
          self
            .features
            .insert(index, FeatureCache::new(layer, feature, ctx, states));
          summary.added_features.insert(index);
        } else if !passing && present {
          self.features.remove(&index);
          summary.deleted_features.insert(index);
        }
      }
    }

    let state_only = !changes.zoom && !changes.level;
    let modified = state_only
      .then(|| states.modified_since(self.state_generation))
      .flatten();
    match modified {
      Some(ids) => {
        let by_id = &self.by_id;
        let indices: SmallVec<[usize; 8]> = ids
          .filter_map(|id| by_id.get(&id))
          .flatten()
          .copied()
          .collect();
        for index in indices {
          let (Some(cache), Some(feature)) = (self.features.get_mut(&index), tile_layer.features.get(index)) else {
            continue;
          };
          cache.update(index, layer, feature, ctx, changes, states, &mut summary);
        }
      }
      None => {
        for (&index, cache) in self.features.iter_mut() {
          if summary.added_features.contains(&index) {
            continue;
          }
          let Some(feature) = tile_layer.features.get(index) else {
            continue;
          };
          cache.update(index, layer, feature, ctx, changes, states, &mut summary);
        }
      }
    }

    self.last_zoom = ctx.zoom;
    self.last_level = level;
    self.state_generation = states.generation();

    if !summary.is_empty() {
      self.finish_visit(layer, tile_layer, &summary);
    }
    summary
  }

  fn finish_visit(&mut self, layer: &StyleLayer, tile_layer: &TileLayer, summary: &EvaluationSummary) {
    let lookup = PropertyLookup {
      layer,
      zoom_values: &self.zoom_values,
      features: &self.features,
    };
    self.content.update(summary, tile_layer, &lookup);
  }

  /// Renderables of this layer in `area`, if any.
  ///
  /// The payload is shared with the cache; it is only copied if the cache
  /// patches it while the caller still holds it.
  pub fn primitive(&self, layer: &StyleLayer, area: Area, stage: RenderStage, extent: u32) -> Option<Primitive> {
    let payload = self.content.payload()?;
    Some(Primitive {
      area,
      layer_id: layer.id().to_string(),
      stage,
      extent,
      payload,
    })
  }

  /// Property lookup over this cache's levels.
  pub fn lookup<'a>(&'a self, layer: &'a StyleLayer) -> PropertyLookup<'a> {
    PropertyLookup {
      layer,
      zoom_values: &self.zoom_values,
      features: &self.features,
    }
  }

  /// Features currently passing the filter.
  pub fn feature_indices(&self) -> impl Iterator<Item = usize> + '_ {
    self.features.keys().copied()
  }

  pub fn feature_count(&self) -> usize {
    self.features.len()
  }

  pub fn feature(&self, index: usize) -> Option<&FeatureCache> {
    self.features.get(&index)
  }

  pub fn content(&self) -> &LayerContent {
    &self.content
  }
}

/// Resolves evaluated values: feature cache, then layer cache, then the
/// style layer's constants, then the property default.
#[derive(Clone, Copy)]
pub struct PropertyLookup<'a> {
  layer: &'a StyleLayer,
  zoom_values: &'a HashMap<BindingId, Value>,
  features: &'a BTreeMap<usize, FeatureCache>,
}

impl<'a> PropertyLookup<'a> {
  pub fn value(&self, feature: usize, id: BindingId) -> &'a Value {
    self
      .features
      .get(&feature)
      .and_then(|cache| cache.value(id))
      .or_else(|| self.zoom_values.get(&id))
      .or_else(|| self.layer.constant(id))
      .unwrap_or_else(|| self.layer.binding(id).default_value())
  }

  /// Value of the property named `name`, or its default when unset.
  pub fn property(&self, feature: usize, name: &str) -> &'a Value {
    match self.layer.binding_id(name) {
      Some(id) => self.value(feature, id),
      None => self.layer.default_for(name),
    }
  }

  pub fn number(&self, feature: usize, name: &str) -> f64 {
    self
      .property(feature, name)
      .as_f64()
      .or_else(|| self.layer.default_for(name).as_f64())
      .unwrap_or(0.0)
  }

  pub fn string(&self, feature: usize, name: &str) -> String {
    to_string(self.property(feature, name))
  }

  /// Like [`PropertyLookup::string`], `None` for null or empty values.
  pub fn optional_string(&self, feature: usize, name: &str) -> Option<String> {
    Some(self.string(feature, name)).filter(|s| !s.is_empty())
  }

  /// Features currently cached.
  pub fn features(&self) -> impl Iterator<Item = usize> + 'a {
    self.features.keys().copied()
  }
}

#[cfg(test)]
#[path = "layer_cache_test.rs"]
mod layer_cache_test;
