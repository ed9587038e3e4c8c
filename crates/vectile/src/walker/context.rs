//! TraverseContext - per-frame inputs and outputs shared by every walker.

use super::stats::TraverseStats;
use crate::area::Area;
use crate::cache::{Primitive, RenderStage};
use crate::camera::FrameView;
use crate::feature_state::FeatureStateStore;
use crate::geom::Plane;
use crate::lod::LevelEstimator;

/// One frame's traversal state.
///
/// Clip planes, the estimator and the feature-state store are read-only for
/// the frame; walkers append to `primitives`, `rendered` and `stats`.
pub struct TraverseContext<'a> {
  /// Frustum and horizon planes.
  pub clip_planes: &'a [Plane],
  pub estimator: &'a dyn LevelEstimator,
  pub feature_states: &'a FeatureStateStore,
  pub stage: RenderStage,
  /// Renderables in traversal order.
  pub primitives: Vec<Primitive>,
  /// Cells rendered this frame, across all walkers.
  pub rendered: Vec<Area>,
  pub stats: TraverseStats,
}

impl<'a> TraverseContext<'a> {
  pub fn new(
    clip_planes: &'a [Plane],
    estimator: &'a dyn LevelEstimator,
    feature_states: &'a FeatureStateStore,
  ) -> Self {
    Self {
      clip_planes,
      estimator,
      feature_states,
      stage: RenderStage::Render,
      primitives: Vec::new(),
      rendered: Vec::new(),
      stats: TraverseStats::default(),
    }
  }

  /// Context culling against `view`'s planes.
  pub fn for_view(
    view: &'a FrameView,
    estimator: &'a dyn LevelEstimator,
    feature_states: &'a FeatureStateStore,
  ) -> Self {
    Self::new(&view.clip_planes, estimator, feature_states)
  }

  pub fn with_stage(mut self, stage: RenderStage) -> Self {
    self.stage = stage;
    self
  }

  /// Move the collected primitives out, leaving the list empty.
  pub fn take_primitives(&mut self) -> Vec<Primitive> {
    std::mem::take(&mut self.primitives)
  }
}
