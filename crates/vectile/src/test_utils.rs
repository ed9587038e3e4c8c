//! Shared fixtures for unit tests.

use std::cell::RefCell;

use glam::DVec2;
use serde_json::Value;

use crate::area::Area;
use crate::error::FetchError;
use crate::geom::HeightRange;
use crate::lod::{LevelEstimator, LodRange};
use crate::tile::{Geometry, PendingRequest, Responder, SourceMeta, TileFeature, TileLayer, TileProvider};

fn properties(props: Value) -> serde_json::Map<String, Value> {
  props.as_object().cloned().unwrap_or_default()
}

pub fn point_feature(id: Option<u64>, props: Value) -> TileFeature {
  TileFeature {
    id,
    geometry: Geometry::Points(vec![DVec2::new(10.0, 20.0)]),
    properties: properties(props),
  }
}

pub fn line_feature(id: Option<u64>, props: Value) -> TileFeature {
  TileFeature {
    id,
    geometry: Geometry::Lines(vec![vec![
      DVec2::new(0.0, 0.0),
      DVec2::new(50.0, 0.0),
      DVec2::new(100.0, 50.0),
    ]]),
    properties: properties(props),
  }
}

pub fn polygon_feature(id: Option<u64>, props: Value) -> TileFeature {
  TileFeature {
    id,
    geometry: Geometry::Polygons(vec![vec![vec![
      DVec2::new(0.0, 0.0),
      DVec2::new(40.0, 0.0),
      DVec2::new(40.0, 40.0),
      DVec2::new(0.0, 40.0),
      DVec2::new(0.0, 0.0),
    ]]]),
    properties: properties(props),
  }
}

pub fn tile_layer(name: &str, features: Vec<TileFeature>) -> TileLayer {
  TileLayer {
    name: name.to_string(),
    extent: 4096,
    features,
  }
}

pub fn range(lower: i32, upper: i32, center: f64) -> LodRange {
  LodRange {
    lower,
    upper,
    center,
  }
}

/// Estimator answering from a closure and logging every call.
pub struct ScriptedEstimator<F> {
  script: F,
  calls: RefCell<Vec<Area>>,
}

impl<F: Fn(&Area) -> Option<LodRange>> ScriptedEstimator<F> {
  pub fn new(script: F) -> Self {
    Self {
      script,
      calls: RefCell::new(Vec::new()),
    }
  }

  pub fn calls(&self) -> Vec<Area> {
    self.calls.borrow().clone()
  }
}

impl<F: Fn(&Area) -> Option<LodRange>> LevelEstimator for ScriptedEstimator<F> {
  fn calculate(&self, area: &Area, _heights: HeightRange) -> Option<LodRange> {
    self.calls.borrow_mut().push(*area);
    (self.script)(area)
  }
}

/// Provider whose requests stay pending until resolved by the test.
#[derive(Default)]
pub struct ManualProvider {
  pub meta: Option<SourceMeta>,
  pending: RefCell<Vec<(Area, Responder<Option<Vec<u8>>>)>>,
}

impl ManualProvider {
  pub fn new(meta: SourceMeta) -> Self {
    Self {
      meta: Some(meta),
      pending: RefCell::new(Vec::new()),
    }
  }

  /// Areas with an unresolved request, in request order.
  pub fn requested(&self) -> Vec<Area> {
    self.pending.borrow().iter().map(|(a, _)| *a).collect()
  }

  /// Resolve the oldest pending request for `area`.
  pub fn resolve(&self, area: Area, result: Result<Option<Vec<u8>>, FetchError>) {
    let mut pending = self.pending.borrow_mut();
    let index = pending
      .iter()
      .position(|(a, _)| *a == area)
      .expect("no pending request for area");
    let (_, responder) = pending.remove(index);
    responder.respond(result);
  }

  /// Drop a pending request without answering it.
  pub fn abandon(&self, area: Area) {
    self.pending.borrow_mut().retain(|(a, _)| *a != area);
  }
}

impl TileProvider for ManualProvider {
  fn request_meta(&self) -> PendingRequest<Option<SourceMeta>> {
    PendingRequest::ready(Ok(self.meta))
  }

  fn request_tile(&self, area: Area) -> PendingRequest<Option<Vec<u8>>> {
    let (request, responder) = PendingRequest::channel();
    self.pending.borrow_mut().push((area, responder));
    request
  }
}

/// JSON tile bytes with one layer.
pub fn json_tile(layer: &str, features: Value) -> Vec<u8> {
  let mut layers = serde_json::Map::new();
  layers.insert(layer.to_string(), serde_json::json!({ "features": features }));
  serde_json::to_vec(&serde_json::json!({ "layers": layers })).expect("serializable tile")
}
