//! Perspective camera and its per-frame derived quantities.
//!
//! [`FrameView`] is computed once per frame and shared by reference with the
//! level estimator and every tile walker: frustum and horizon clip planes,
//! the per-pixel view vector `w·U` and the level bias.

use glam::DVec3;
use smallvec::SmallVec;

use crate::config::WalkerConfig;
use crate::constants::level_bias;
use crate::geom::Plane;

/// Perspective camera in geocentric coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
  /// Eye position.
  pub position: DVec3,
  /// View direction (need not be normalized).
  pub forward: DVec3,
  /// Approximate up vector.
  pub up: DVec3,
  /// Vertical field of view in radians.
  pub fov_y: f64,
  /// Viewport width in pixels.
  pub viewport_width: f64,
  /// Viewport height in pixels.
  pub viewport_height: f64,
  /// Near clip distance.
  pub near: f64,
  /// Far clip distance.
  pub far: f64,
}

impl Camera {
  /// Camera at `position` looking at `target`.
  ///
  /// Near and far distances are derived from the distance to the target.
  pub fn looking_at(
    position: DVec3,
    target: DVec3,
    up: DVec3,
    fov_y: f64,
    viewport_width: f64,
    viewport_height: f64,
  ) -> Self {
    let distance = position.distance(target).max(1.0);
    Self {
      position,
      forward: target - position,
      up,
      fov_y,
      viewport_width,
      viewport_height,
      near: (distance * 1e-3).max(0.1),
      far: distance * 1e3 + position.length(),
    }
  }

  /// Precompute the per-frame view.
  ///
  /// Returns `None` when the camera basis or viewport is degenerate.
  pub fn frame_view(&self, config: &WalkerConfig) -> Option<FrameView> {
    if !(self.viewport_height > 0.0 && self.viewport_width > 0.0) {
      return None;
    }
    if !(self.fov_y > 0.0 && self.fov_y < std::f64::consts::PI) {
      return None;
    }
    let forward = self.forward.try_normalize()?;
    let right = forward.cross(self.up).try_normalize()?;
    let up = right.cross(forward);

    let tan_y = (self.fov_y * 0.5).tan();
    let tan_x = tan_y * self.viewport_width / self.viewport_height;
    let q = self.position;

    let mut clip_planes = SmallVec::new();
    // Sides: left, right, bottom, top.
    for normal in [
      right + forward * tan_x,
      -right + forward * tan_x,
      up + forward * tan_y,
      -up + forward * tan_y,
    ] {
      clip_planes.push(Plane::from_point_normal(q, normal)?);
    }
    // Near and far.
    clip_planes.push(Plane::new(forward, -(forward.dot(q) + self.near))?);
    clip_planes.push(Plane::new(-forward, forward.dot(q) + self.far)?);

    // Horizon: points with p·Q >= R² can be seen over the planet.
    let altitude_radius = q.length();
    if altitude_radius > config.planet_radius {
      let r2 = config.planet_radius * config.planet_radius;
      clip_planes.push(Plane::new(q / altitude_radius, -r2 / altitude_radius)?);
    }

    let pixel_step = 2.0 * tan_y / self.viewport_height;

    Some(FrameView {
      position: q,
      forward,
      clip_planes,
      pixel_direction: forward * pixel_step,
      zbias: level_bias(config.tile_resolution),
      planet_radius: config.planet_radius,
    })
  }
}

/// Camera-derived values valid for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameView {
  /// Camera position `Q`.
  pub position: DVec3,
  /// Unit view direction `U`.
  pub forward: DVec3,
  /// Frustum sides, near, far and (when above ground) the horizon plane.
  pub clip_planes: SmallVec<[Plane; 7]>,
  /// `w·U`: view direction scaled by the angular size of one pixel.
  pub pixel_direction: DVec3,
  /// `log2(2π / tile_resolution)`.
  pub zbias: f64,
  /// Planet radius used for the horizon plane.
  pub planet_radius: f64,
}

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;
