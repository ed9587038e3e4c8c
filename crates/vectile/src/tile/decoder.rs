//! Tile decoders.
//!
//! The binary vector-tile codec lives outside this crate; anything that
//! turns bytes into a [`DecodedTile`] can be plugged in through
//! [`TileDecoder`]. [`JsonTileDecoder`] reads a GeoJSON-like layout:
//!
//! ```text
//! { "layers": { "roads": { "extent": 4096, "features": [
//!     { "id": 7,
//!       "geometry": { "type": "LineString", "coordinates": [[[0,0],[10,5]]] },
//!       "properties": { "class": "primary" } } ] } } }
//! ```

use std::collections::HashMap;

use glam::DVec2;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::feature::{DecodedTile, Geometry, TileFeature, TileLayer};
use crate::error::DecodeError;

/// Turns fetched tile bytes into typed features.
pub trait TileDecoder {
  /// Decode one tile.
  fn decode(&self, bytes: &[u8]) -> Result<DecodedTile, DecodeError>;
}

/// Decoder for the JSON tile layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonTileDecoder;

fn default_extent() -> u32 {
  4096
}

#[derive(Deserialize)]
struct RawTile {
  #[serde(default)]
  layers: HashMap<String, RawLayer>,
}

#[derive(Deserialize)]
struct RawLayer {
  #[serde(default = "default_extent")]
  extent: u32,
  #[serde(default)]
  features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
  #[serde(default)]
  id: Option<u64>,
  geometry: RawGeometry,
  #[serde(default)]
  properties: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum RawGeometry {
  Point(Vec<[f64; 2]>),
  LineString(Vec<Vec<[f64; 2]>>),
  Polygon(Vec<Vec<Vec<[f64; 2]>>>),
}

fn points(raw: Vec<[f64; 2]>) -> Vec<DVec2> {
  raw.into_iter().map(DVec2::from_array).collect()
}

fn convert_geometry(layer: &str, raw: RawGeometry) -> Result<Geometry, DecodeError> {
  let invalid = |reason: &str| DecodeError::Geometry {
    layer: layer.to_string(),
    reason: reason.to_string(),
  };
  match raw {
    RawGeometry::Point(p) => {
      if p.is_empty() {
        return Err(invalid("point feature without coordinates"));
      }
      Ok(Geometry::Points(points(p)))
    }
    RawGeometry::LineString(lines) => {
      if lines.is_empty() || lines.iter().any(|l| l.len() < 2) {
        return Err(invalid("line with fewer than 2 vertices"));
      }
      Ok(Geometry::Lines(lines.into_iter().map(points).collect()))
    }
    RawGeometry::Polygon(polys) => {
      if polys.is_empty() || polys.iter().any(|rings| rings.is_empty()) {
        return Err(invalid("polygon without rings"));
      }
      if polys.iter().flatten().any(|ring| ring.len() < 3) {
        return Err(invalid("ring with fewer than 3 vertices"));
      }
      Ok(Geometry::Polygons(
        polys
          .into_iter()
          .map(|rings| rings.into_iter().map(points).collect())
          .collect(),
      ))
    }
  }
}

impl TileDecoder for JsonTileDecoder {
  fn decode(&self, bytes: &[u8]) -> Result<DecodedTile, DecodeError> {
    let raw: RawTile = serde_json::from_slice(bytes)?;
    let mut layers = Vec::with_capacity(raw.layers.len());
    for (name, layer) in raw.layers {
      let features = layer
        .features
        .into_iter()
        .map(|f| {
          Ok(TileFeature {
            id: f.id,
            geometry: convert_geometry(&name, f.geometry)?,
            properties: f.properties,
          })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;
      layers.push(TileLayer {
        name,
        extent: layer.extent,
        features,
      });
    }
    Ok(DecodedTile::new(layers))
  }
}
