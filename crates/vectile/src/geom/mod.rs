//! Geocentric geometry for culling spherical tile regions.
//!
//! All positions are planet-centered Cartesian coordinates in meters:
//! `+z` through the north pole, `+x` through (λ = 0, φ = 0), `+y` through
//! (λ = π/2, φ = 0).

pub mod bounds;
pub mod plane;

pub use bounds::{DAabb3, HeightRange, RegionBounds};
pub use plane::Plane;

use glam::DVec3;

/// Unit surface normal at longitude `lambda` and latitude `phi`.
#[inline]
pub fn surface_normal(lambda: f64, phi: f64) -> DVec3 {
  let (sin_phi, cos_phi) = phi.sin_cos();
  let (sin_lam, cos_lam) = lambda.sin_cos();
  DVec3::new(cos_phi * cos_lam, cos_phi * sin_lam, sin_phi)
}

/// Geocentric position at the given longitude, latitude and radius.
#[inline]
pub fn geocentric(lambda: f64, phi: f64, radius: f64) -> DVec3 {
  surface_normal(lambda, phi) * radius
}
