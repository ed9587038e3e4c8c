//! Adaptive corner-sampling estimator of a cell's ideal level.
//!
//! The ideal level at a surface point is the level whose texel footprint
//! matches one screen pixel there. For a corner with normal `N`, latitude
//! `φ` and local radius `r`, seen from camera `Q`:
//!
//! ```text
//!   d   = (w·U)·(r·N − Q) / (r·cos φ)        (Mercator scale per pixel)
//!   lod = −log2(d) + zbias                    zbias = log2(2π / resolution)
//! ```
//!
//! A region is sampled at its four corners. It is accepted when the corner
//! spread is below `DELTA` and the region is not much coarser than the
//! levels it reports; otherwise it is split into quadrants, each culled
//! against the clip planes before recursing. The recursion keeps no nodes:
//! subdivide, recurse, discard.

use crate::area::{gudermannian, Area};
use crate::camera::FrameView;
use crate::config::LodConfig;
use crate::geom::{surface_normal, HeightRange, RegionBounds};

use super::{LevelEstimator, LodRange};

/// Level estimator for one frame's camera.
pub struct LodCalculator<'a> {
  view: &'a FrameView,
  config: LodConfig,
}

/// Running bounds over accepted leaves (unbiased).
struct Accumulator {
  min: f64,
  max: f64,
  accepted: usize,
}

/// Scratch description of a region being sampled.
struct Region {
  area: Area,
  heights: HeightRange,
  radius: f64,
}

impl<'a> LodCalculator<'a> {
  /// Create an estimator for `view` with default thresholds.
  pub fn new(view: &'a FrameView) -> Self {
    Self::with_config(view, LodConfig::default())
  }

  /// Create an estimator with explicit thresholds.
  pub fn with_config(view: &'a FrameView, config: LodConfig) -> Self {
    Self { view, config }
  }

  /// Unbiased LOD bounds at the four corners, or `None` if any corner is
  /// at or behind the camera plane.
  fn corner_bounds(&self, region: &Region) -> Option<(f64, f64)> {
    let m = region.area.mercator();
    let (lam0, lam1) = m.longitudes();
    let phi0 = gudermannian(m.my_min);
    let phi1 = gudermannian(m.my_min + m.msize);

    let mut d_min = f64::INFINITY;
    let mut d_max = 0.0_f64;
    for (lam, phi) in [(lam0, phi0), (lam1, phi0), (lam0, phi1), (lam1, phi1)] {
      let n = surface_normal(lam, phi);
      let along = self
        .view
        .pixel_direction
        .dot(n * region.radius - self.view.position);
      if !(along > 0.0) {
        return None;
      }
      let d = along / (region.radius * phi.cos());
      d_min = d_min.min(d);
      d_max = d_max.max(d);
    }
    Some((-d_max.log2(), -d_min.log2()))
  }

  fn needs_split(&self, area: &Area, lod_min: f64, lod_max: f64) -> bool {
    lod_max - lod_min >= self.config.delta
      || f64::from(area.z) + self.config.eta < (lod_min + lod_max) * 0.5
  }

  fn visit(&self, region: &Region, acc: &mut Accumulator) {
    if region.area.z > self.config.max_level {
      return;
    }

    if region.area.z >= self.config.zeta {
      if let Some((lod_min, lod_max)) = self.corner_bounds(region) {
        if !self.needs_split(&region.area, lod_min, lod_max) {
          acc.min = acc.min.min(lod_min);
          acc.max = acc.max.max(lod_max);
          acc.accepted += 1;
          return;
        }
      }
    }

    let Some(children) = region.area.children() else {
      return;
    };
    for child in children {
      let bounds = RegionBounds::new(&child, region.heights, self.view.planet_radius);
      if bounds.is_outside(&self.view.clip_planes) {
        continue;
      }
      self.visit(
        &Region {
          area: child,
          heights: region.heights,
          radius: region.radius,
        },
        acc,
      );
    }
  }
}

impl LevelEstimator for LodCalculator<'_> {
  #[cfg_attr(
    feature = "trace_spans",
    tracing::instrument(skip_all, name = "lod::calculate", fields(area = %area))
  )]
  fn calculate(&self, area: &Area, heights: HeightRange) -> Option<LodRange> {
    let region = Region {
      area: *area,
      heights,
      radius: self.view.planet_radius + heights.mid(),
    };
    let mut acc = Accumulator {
      min: f64::INFINITY,
      max: f64::NEG_INFINITY,
      accepted: 0,
    };
    self.visit(&region, &mut acc);

    if acc.accepted == 0 || !acc.min.is_finite() || !acc.max.is_finite() {
      return None;
    }
    let bias = self.view.zbias;
    Some(LodRange::from_bounds(acc.min + bias, acc.max + bias))
  }
}

#[cfg(test)]
#[path = "calculator_test.rs"]
mod calculator_test;
