//! Decoded vector tile contents.

use std::collections::HashMap;

use glam::DVec2;
use serde_json::{Map, Value};

/// Geometry class of a feature, as exposed to `["geometry-type"]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GeometryType {
  Point,
  Line,
  Polygon,
}

impl GeometryType {
  /// Name used by style expressions.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Point => "Point",
      Self::Line => "LineString",
      Self::Polygon => "Polygon",
    }
  }
}

/// Feature geometry in tile-local coordinates (`0..extent`).
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
  /// One or more points.
  Points(Vec<DVec2>),
  /// One or more polylines.
  Lines(Vec<Vec<DVec2>>),
  /// One or more polygons, each an outer ring followed by holes.
  Polygons(Vec<Vec<Vec<DVec2>>>),
}

impl Geometry {
  /// Geometry class.
  pub fn kind(&self) -> GeometryType {
    match self {
      Self::Points(_) => GeometryType::Point,
      Self::Lines(_) => GeometryType::Line,
      Self::Polygons(_) => GeometryType::Polygon,
    }
  }
}

/// One feature of a tile layer.
#[derive(Clone, Debug, PartialEq)]
pub struct TileFeature {
  /// Feature id, used as the feature-state key.
  pub id: Option<u64>,
  /// Geometry in tile-local coordinates.
  pub geometry: Geometry,
  /// String-keyed property bag.
  pub properties: Map<String, Value>,
}

impl TileFeature {
  /// Property by key.
  #[inline]
  pub fn property(&self, key: &str) -> Option<&Value> {
    self.properties.get(key)
  }
}

/// Named layer of a decoded tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileLayer {
  /// Layer name, matched against a style layer's `source-layer`.
  pub name: String,
  /// Coordinate extent of the tile square.
  pub extent: u32,
  /// Features in decode order; indices are stable for the tile's lifetime.
  pub features: Vec<TileFeature>,
}

/// All layers of one decoded tile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedTile {
  layers: HashMap<String, TileLayer>,
}

impl DecodedTile {
  /// Build from layers, keyed by their names.
  pub fn new(layers: impl IntoIterator<Item = TileLayer>) -> Self {
    Self {
      layers: layers.into_iter().map(|l| (l.name.clone(), l)).collect(),
    }
  }

  /// Layer by name.
  pub fn layer(&self, name: &str) -> Option<&TileLayer> {
    self.layers.get(name)
  }

  /// Number of layers.
  pub fn len(&self) -> usize {
    self.layers.len()
  }

  /// True when the tile carries no layers.
  pub fn is_empty(&self) -> bool {
    self.layers.is_empty()
  }
}
