//! Renderable output of a traversal.
//!
//! Coordinates stay tile-local (`0..extent`); the renderer maps them onto
//! the sphere using the primitive's area.

use std::rc::Rc;

use glam::DVec2;

use crate::area::Area;

/// Pass a traversal produces primitives for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderStage {
  #[default]
  Render,
  Pick,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CircleInstance {
  pub feature: usize,
  pub center: DVec2,
  pub radius: f64,
  pub color: String,
  pub opacity: f64,
  pub stroke_width: f64,
  pub stroke_color: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FillMesh {
  pub feature: usize,
  /// Polygons, each an outer ring followed by holes.
  pub polygons: Vec<Vec<Vec<DVec2>>>,
  pub color: String,
  pub opacity: f64,
  pub outline_color: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineStrip {
  pub feature: usize,
  pub points: Vec<DVec2>,
  pub width: f64,
  pub color: String,
  pub opacity: f64,
  pub cap: String,
  pub join: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymbolLabel {
  pub feature: usize,
  pub anchor: DVec2,
  pub text: String,
  pub icon: Option<String>,
  pub size: f64,
  pub color: String,
  pub opacity: f64,
  pub halo_width: f64,
  pub halo_color: String,
}

/// Per-kind draw data.
#[derive(Clone, Debug, PartialEq)]
pub enum PrimitivePayload {
  Circles(Vec<CircleInstance>),
  Fills(Vec<FillMesh>),
  Lines(Vec<LineStrip>),
  Symbols(Vec<SymbolLabel>),
}

impl PrimitivePayload {
  /// Number of drawable items.
  pub fn len(&self) -> usize {
    match self {
      Self::Circles(v) => v.len(),
      Self::Fills(v) => v.len(),
      Self::Lines(v) => v.len(),
      Self::Symbols(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Draw data of one style layer in one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
  pub area: Area,
  pub layer_id: String,
  pub stage: RenderStage,
  /// Tile-local coordinate extent.
  pub extent: u32,
  /// Shared with the layer cache that produced it.
  pub payload: Rc<PrimitivePayload>,
}
