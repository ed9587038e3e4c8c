use std::f64::consts::FRAC_PI_3;

use super::*;
use crate::constants::PLANET_RADIUS;

fn orbit_camera(altitude: f64) -> Camera {
  Camera::looking_at(
    DVec3::new(PLANET_RADIUS + altitude, 0.0, 0.0),
    DVec3::ZERO,
    DVec3::Z,
    FRAC_PI_3,
    1024.0,
    768.0,
  )
}

fn inside_all(view: &FrameView, p: DVec3) -> bool {
  view.clip_planes.iter().all(|plane| plane.distance_to(p) >= 0.0)
}

/// Orbit camera sees the sub-camera point and not the far side of the planet.
#[test]
fn test_orbit_camera_visibility() {
  let view = orbit_camera(2.0 * PLANET_RADIUS)
    .frame_view(&WalkerConfig::default())
    .expect("valid camera");
  assert_eq!(view.clip_planes.len(), 7, "6 frustum planes + horizon");
  assert!(inside_all(&view, DVec3::new(PLANET_RADIUS, 0.0, 0.0)));
  assert!(!inside_all(&view, DVec3::new(-PLANET_RADIUS, 0.0, 0.0)));
  assert!(
    !inside_all(&view, DVec3::new(PLANET_RADIUS * 3.5, 0.0, 0.0)),
    "point behind the camera"
  );
}

/// The per-pixel vector has the angular pixel size as its length.
#[test]
fn test_pixel_direction_length() {
  let camera = orbit_camera(1000.0);
  let view = camera.frame_view(&WalkerConfig::default()).unwrap();
  let expected = 2.0 * (FRAC_PI_3 * 0.5).tan() / 768.0;
  assert!((view.pixel_direction.length() - expected).abs() < 1e-15);
  assert!(view.pixel_direction.dot(DVec3::X) < 0.0, "looks towards the planet");
  assert!((view.zbias - level_bias(256.0)).abs() < 1e-12);
}

/// No horizon plane when the camera is underground.
#[test]
fn test_no_horizon_below_surface() {
  let mut camera = orbit_camera(0.0);
  camera.position = DVec3::new(PLANET_RADIUS - 10.0, 0.0, 0.0);
  let view = camera.frame_view(&WalkerConfig::default()).unwrap();
  assert_eq!(view.clip_planes.len(), 6);
}

/// Degenerate camera bases are rejected.
#[test]
fn test_degenerate_camera() {
  let mut camera = orbit_camera(1000.0);
  camera.up = -DVec3::X;
  assert!(camera.frame_view(&WalkerConfig::default()).is_none());

  let mut camera = orbit_camera(1000.0);
  camera.viewport_height = 0.0;
  assert!(camera.frame_view(&WalkerConfig::default()).is_none());
}
