//! Oriented plane used for frustum and horizon culling.

use glam::DVec3;

/// Plane `n·p + d = 0`; points with `n·p + d >= 0` are on the inner side.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Plane {
  /// Unit normal pointing into the visible half-space.
  pub normal: DVec3,
  /// Signed offset from the origin.
  pub distance: f64,
}

impl Plane {
  /// Create a plane, normalizing `normal`.
  ///
  /// Returns `None` for a zero-length normal.
  pub fn new(normal: DVec3, distance: f64) -> Option<Self> {
    let length = normal.length();
    if !(length > 0.0) || !length.is_finite() {
      return None;
    }
    Some(Self {
      normal: normal / length,
      distance: distance / length,
    })
  }

  /// Plane through `point` facing `normal`.
  pub fn from_point_normal(point: DVec3, normal: DVec3) -> Option<Self> {
    let normal = normal.try_normalize()?;
    Some(Self {
      normal,
      distance: -normal.dot(point),
    })
  }

  /// Signed distance from `point` to the plane (positive = inside).
  #[inline]
  pub fn distance_to(&self, point: DVec3) -> f64 {
    self.normal.dot(point) + self.distance
  }
}
