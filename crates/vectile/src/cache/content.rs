//! Renderable content of a layer cache, one variant per layer kind.
//!
//! Layout-derived data (strips, label text, sort order) is held per
//! feature, and the assembled draw payload is kept between visits. An
//! [`EvaluationSummary`] names what to touch:
//!
//! ```text
//!   summary entry                       payload work
//!   ──────────────────────────────────  ──────────────────────────────────
//!   nothing                             none, the shared payload is reused
//!   repainted_features                  paint fields of those items only
//!   layer_paint_changed                 paint fields of every item
//!   added / changed / deleted features  rebuild those, move the rest over
//!   layer_layout_changed                rebuild every feature
//! ```
//!
//! The payload is handed out as an `Rc`; patching it while a renderer still
//! holds the previous frame's handle copies it once.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::rc::Rc;

use glam::DVec2;

use super::layer_cache::PropertyLookup;
use super::primitive::{CircleInstance, FillMesh, LineStrip, PrimitivePayload, SymbolLabel};
use super::summary::EvaluationSummary;
use crate::style::LayerKind;
use crate::tile::{Geometry, TileFeature, TileLayer};

trait Shape: Sized {
  type Item: Clone;

  const SORT_KEY: &'static str;

  /// Layout data of one feature; `None` when it draws nothing.
  fn build(index: usize, feature: &TileFeature, lookup: &PropertyLookup<'_>) -> Option<Self>;

  fn sort_key(&self) -> f64;

  /// Append the feature's draw items with current paint values.
  fn assemble(&self, index: usize, feature: &TileFeature, lookup: &PropertyLookup<'_>, out: &mut Vec<Self::Item>);

  /// Refresh the paint fields of one item.
  fn repaint(item: &mut Self::Item, lookup: &PropertyLookup<'_>);

  fn wrap(items: Vec<Self::Item>) -> PrimitivePayload;

  fn items_mut(payload: &mut PrimitivePayload) -> Option<&mut Vec<Self::Item>>;

  fn into_items(payload: PrimitivePayload) -> Option<Vec<Self::Item>>;
}

fn sort_key_of(index: usize, name: &str, lookup: &PropertyLookup<'_>) -> f64 {
  lookup.property(index, name).as_f64().unwrap_or(0.0)
}

#[derive(Clone, Debug, PartialEq)]
pub struct CircleShape {
  sort_key: f64,
}

impl Shape for CircleShape {
  type Item = CircleInstance;

  const SORT_KEY: &'static str = "circle-sort-key";

  fn build(index: usize, feature: &TileFeature, lookup: &PropertyLookup<'_>) -> Option<Self> {
    match &feature.geometry {
      Geometry::Points(_) => Some(Self {
        sort_key: sort_key_of(index, Self::SORT_KEY, lookup),
      }),
      _ => None,
    }
  }

  fn sort_key(&self) -> f64 {
    self.sort_key
  }

  fn assemble(&self, index: usize, feature: &TileFeature, lookup: &PropertyLookup<'_>, out: &mut Vec<CircleInstance>) {
    let Geometry::Points(points) = &feature.geometry else {
      return;
    };
    for center in points {
      let mut item = CircleInstance {
        feature: index,
        center: *center,
        radius: 0.0,
        color: String::new(),
        opacity: 0.0,
        stroke_width: 0.0,
        stroke_color: String::new(),
      };
      Self::repaint(&mut item, lookup);
      out.push(item);
    }
  }

  fn repaint(item: &mut CircleInstance, lookup: &PropertyLookup<'_>) {
    let index = item.feature;
    item.radius = lookup.number(index, "circle-radius");
    item.color = lookup.string(index, "circle-color");
    item.opacity = lookup.number(index, "circle-opacity");
    item.stroke_width = lookup.number(index, "circle-stroke-width");
    item.stroke_color = lookup.string(index, "circle-stroke-color");
  }

  fn wrap(items: Vec<CircleInstance>) -> PrimitivePayload {
    PrimitivePayload::Circles(items)
  }

  fn items_mut(payload: &mut PrimitivePayload) -> Option<&mut Vec<CircleInstance>> {
    match payload {
      PrimitivePayload::Circles(items) => Some(items),
      _ => None,
    }
  }

  fn into_items(payload: PrimitivePayload) -> Option<Vec<CircleInstance>> {
    match payload {
      PrimitivePayload::Circles(items) => Some(items),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FillShape {
  sort_key: f64,
}

impl Shape for FillShape {
  type Item = FillMesh;

  const SORT_KEY: &'static str = "fill-sort-key";

  fn build(index: usize, feature: &TileFeature, lookup: &PropertyLookup<'_>) -> Option<Self> {
    match &feature.geometry {
      Geometry::Polygons(_) => Some(Self {
        sort_key: sort_key_of(index, Self::SORT_KEY, lookup),
      }),
      _ => None,
    }
  }

  fn sort_key(&self) -> f64 {
    self.sort_key
  }

  fn assemble(&self, index: usize, feature: &TileFeature, lookup: &PropertyLookup<'_>, out: &mut Vec<FillMesh>) {
    let Geometry::Polygons(polygons) = &feature.geometry else {
      return;
    };
    let mut item = FillMesh {
      feature: index,
      polygons: polygons.clone(),
      color: String::new(),
      opacity: 0.0,
      outline_color: None,
    };
    Self::repaint(&mut item, lookup);
    out.push(item);
  }

  fn repaint(item: &mut FillMesh, lookup: &PropertyLookup<'_>) {
    let index = item.feature;
    item.color = lookup.string(index, "fill-color");
    item.opacity = lookup.number(index, "fill-opacity");
    item.outline_color = lookup.optional_string(index, "fill-outline-color");
  }

  fn wrap(items: Vec<FillMesh>) -> PrimitivePayload {
    PrimitivePayload::Fills(items)
  }

  fn items_mut(payload: &mut PrimitivePayload) -> Option<&mut Vec<FillMesh>> {
    match payload {
      PrimitivePayload::Fills(items) => Some(items),
      _ => None,
    }
  }

  fn into_items(payload: PrimitivePayload) -> Option<Vec<FillMesh>> {
    match payload {
      PrimitivePayload::Fills(items) => Some(items),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineShape {
  cap: String,
  join: String,
  sort_key: f64,
}

fn closed(ring: &[DVec2]) -> Vec<DVec2> {
  let mut strip = ring.to_vec();
  if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
    if first != last {
      strip.push(*first);
    }
  }
  strip
}

impl Shape for LineShape {
  type Item = LineStrip;

  const SORT_KEY: &'static str = "line-sort-key";

  fn build(index: usize, feature: &TileFeature, lookup: &PropertyLookup<'_>) -> Option<Self> {
    if matches!(feature.geometry, Geometry::Points(_)) {
      return None;
    }
    Some(Self {
      cap: lookup.string(index, "line-cap"),
      join: lookup.string(index, "line-join"),
      sort_key: sort_key_of(index, Self::SORT_KEY, lookup),
    })
  }

  fn sort_key(&self) -> f64 {
    self.sort_key
  }

  fn assemble(&self, index: usize, feature: &TileFeature, lookup: &PropertyLookup<'_>, out: &mut Vec<LineStrip>) {
    let strips: Vec<Vec<DVec2>> = match &feature.geometry {
      Geometry::Lines(lines) => lines.clone(),
      Geometry::Polygons(polygons) => polygons.iter().flatten().map(|r| closed(r)).collect(),
      Geometry::Points(_) => return,
    };
    for points in strips {
      let mut item = LineStrip {
        feature: index,
        points,
        width: 0.0,
        color: String::new(),
        opacity: 0.0,
        cap: self.cap.clone(),
        join: self.join.clone(),
      };
      Self::repaint(&mut item, lookup);
      out.push(item);
    }
  }

  fn repaint(item: &mut LineStrip, lookup: &PropertyLookup<'_>) {
    let index = item.feature;
    item.width = lookup.number(index, "line-width");
    item.color = lookup.string(index, "line-color");
    item.opacity = lookup.number(index, "line-opacity");
  }

  fn wrap(items: Vec<LineStrip>) -> PrimitivePayload {
    PrimitivePayload::Lines(items)
  }

  fn items_mut(payload: &mut PrimitivePayload) -> Option<&mut Vec<LineStrip>> {
    match payload {
      PrimitivePayload::Lines(items) => Some(items),
      _ => None,
    }
  }

  fn into_items(payload: PrimitivePayload) -> Option<Vec<LineStrip>> {
    match payload {
      PrimitivePayload::Lines(items) => Some(items),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymbolShape {
  anchor: DVec2,
  text: String,
  icon: Option<String>,
  size: f64,
  sort_key: f64,
}

/// Label anchor: first point, middle vertex of the first line, or the
/// vertex centroid of the first outer ring.
fn anchor_of(geometry: &Geometry) -> Option<DVec2> {
  match geometry {
    Geometry::Points(points) => points.first().copied(),
    Geometry::Lines(lines) => lines.first().and_then(|l| l.get(l.len() / 2)).copied(),
    Geometry::Polygons(polygons) => {
      let ring = polygons.first()?.first()?;
      let open = match (ring.first(), ring.last()) {
        (Some(a), Some(b)) if a == b && ring.len() > 1 => &ring[..ring.len() - 1],
        _ => &ring[..],
      };
      if open.is_empty() {
        return None;
      }
      Some(open.iter().copied().sum::<DVec2>() / open.len() as f64)
    }
  }
}

impl Shape for SymbolShape {
  type Item = SymbolLabel;

  const SORT_KEY: &'static str = "symbol-sort-key";

  fn build(index: usize, feature: &TileFeature, lookup: &PropertyLookup<'_>) -> Option<Self> {
    let text = lookup.string(index, "text-field");
    let icon = lookup.optional_string(index, "icon-image");
    if text.is_empty() && icon.is_none() {
      return None;
    }
    Some(Self {
      anchor: anchor_of(&feature.geometry)?,
      text,
      icon,
      size: lookup.number(index, "text-size"),
      sort_key: sort_key_of(index, Self::SORT_KEY, lookup),
    })
  }

  fn sort_key(&self) -> f64 {
    self.sort_key
  }

  fn assemble(&self, index: usize, _feature: &TileFeature, lookup: &PropertyLookup<'_>, out: &mut Vec<SymbolLabel>) {
    let mut item = SymbolLabel {
      feature: index,
      anchor: self.anchor,
      text: self.text.clone(),
      icon: self.icon.clone(),
      size: self.size,
      color: String::new(),
      opacity: 0.0,
      halo_width: 0.0,
      halo_color: String::new(),
    };
    Self::repaint(&mut item, lookup);
    out.push(item);
  }

  fn repaint(item: &mut SymbolLabel, lookup: &PropertyLookup<'_>) {
    let index = item.feature;
    item.color = lookup.string(index, "text-color");
    item.opacity = lookup.number(index, "text-opacity");
    item.halo_width = lookup.number(index, "text-halo-width");
    item.halo_color = lookup.string(index, "text-halo-color");
  }

  fn wrap(items: Vec<SymbolLabel>) -> PrimitivePayload {
    PrimitivePayload::Symbols(items)
  }

  fn items_mut(payload: &mut PrimitivePayload) -> Option<&mut Vec<SymbolLabel>> {
    match payload {
      PrimitivePayload::Symbols(items) => Some(items),
      _ => None,
    }
  }

  fn into_items(payload: PrimitivePayload) -> Option<Vec<SymbolLabel>> {
    match payload {
      PrimitivePayload::Symbols(items) => Some(items),
      _ => None,
    }
  }
}

/// Shapes by feature index, their draw order, and the assembled payload
/// with each feature's item range in it.
#[derive(Clone, Debug, PartialEq)]
pub struct Shapes<S> {
  shapes: BTreeMap<usize, S>,
  order: Vec<usize>,
  slots: BTreeMap<usize, Range<usize>>,
  payload: Option<Rc<PrimitivePayload>>,
}

impl<S> Default for Shapes<S> {
  fn default() -> Self {
    Self {
      shapes: BTreeMap::new(),
      order: Vec::new(),
      slots: BTreeMap::new(),
      payload: None,
    }
  }
}

impl<S: Shape> Shapes<S> {
  fn update(&mut self, summary: &EvaluationSummary, tile_layer: &TileLayer, lookup: &PropertyLookup<'_>) {
    let mut removed = false;
    for index in &summary.deleted_features {
      removed |= self.shapes.remove(index).is_some();
    }

    let rebuild: Vec<usize> = if summary.layer_layout_changed {
      lookup.features().collect()
    } else {
      summary
        .added_features
        .union(&summary.changed_features)
        .copied()
        .collect()
    };
    let mut rebuilt = BTreeSet::new();
    for index in rebuild {
      let shape = tile_layer
        .features
        .get(index)
        .and_then(|feature| S::build(index, feature, lookup));
      match shape {
        Some(shape) => {
          self.shapes.insert(index, shape);
        }
        None => {
          self.shapes.remove(&index);
        }
      }
      rebuilt.insert(index);
    }

    if removed || !rebuilt.is_empty() {
      self.sort();
      self.reassemble(&rebuilt, tile_layer, lookup);
    }
    self.repaint(summary, &rebuilt, lookup);
  }

  fn sort(&mut self) {
    let shapes = &self.shapes;
    self.order = shapes.keys().copied().collect();
    self.order.sort_by(|a, b| {
      shapes[a]
        .sort_key()
        .total_cmp(&shapes[b].sort_key())
        .then(a.cmp(b))
    });
  }

  /// Lay the payload out in draw order again. Items of features not in
  /// `rebuilt` are moved over from the previous payload.
  fn reassemble(&mut self, rebuilt: &BTreeSet<usize>, tile_layer: &TileLayer, lookup: &PropertyLookup<'_>) {
    let previous = self
      .payload
      .take()
      .map(|shared| Rc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone()))
      .and_then(S::into_items)
      .unwrap_or_default();
    let mut previous: Vec<Option<S::Item>> = previous.into_iter().map(Some).collect();
    let old_slots = std::mem::take(&mut self.slots);

    let mut items = Vec::with_capacity(previous.len());
    for &index in &self.order {
      let start = items.len();
      match old_slots.get(&index).filter(|_| !rebuilt.contains(&index)) {
        Some(range) => items.extend(
          previous
            .get_mut(range.clone())
            .into_iter()
            .flatten()
            .filter_map(Option::take),
        ),
        None => {
          if let (Some(shape), Some(feature)) = (self.shapes.get(&index), tile_layer.features.get(index)) {
            shape.assemble(index, feature, lookup, &mut items);
          }
        }
      }
      if items.len() > start {
        self.slots.insert(index, start..items.len());
      }
    }

    self.payload = (!items.is_empty()).then(|| Rc::new(S::wrap(items)));
  }

  /// Refresh paint fields of the features whose paint values changed.
  fn repaint(&mut self, summary: &EvaluationSummary, rebuilt: &BTreeSet<usize>, lookup: &PropertyLookup<'_>) {
    let Some(shared) = self.payload.as_mut() else {
      return;
    };
    let targets: Vec<Range<usize>> = if summary.layer_paint_changed {
      self
        .slots
        .iter()
        .filter(|(index, _)| !rebuilt.contains(index))
        .map(|(_, range)| range.clone())
        .collect()
    } else {
      summary
        .repainted_features
        .iter()
        .filter(|index| !rebuilt.contains(index))
        .filter_map(|index| self.slots.get(index).cloned())
        .collect()
    };
    if targets.is_empty() {
      return;
    }

    let Some(items) = S::items_mut(Rc::make_mut(shared)) else {
      return;
    };
    for range in targets {
      for item in items.get_mut(range).into_iter().flatten() {
        S::repaint(item, lookup);
      }
    }
  }
}

impl<S> Shapes<S> {
  pub fn len(&self) -> usize {
    self.shapes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.shapes.is_empty()
  }

  /// Feature indices in draw order.
  pub fn order(&self) -> &[usize] {
    &self.order
  }

  /// Range of `feature`'s items in the payload.
  pub fn slot(&self, feature: usize) -> Option<Range<usize>> {
    self.slots.get(&feature).cloned()
  }

  fn payload(&self) -> Option<Rc<PrimitivePayload>> {
    self.payload.clone()
  }
}

/// Per-kind renderable builder.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerContent {
  Circle(Shapes<CircleShape>),
  Fill(Shapes<FillShape>),
  Line(Shapes<LineShape>),
  Symbol(Shapes<SymbolShape>),
  /// Unknown layer type: holds and draws nothing.
  Unsupported,
}

impl LayerContent {
  pub fn for_kind(kind: &LayerKind) -> Self {
    match kind {
      LayerKind::Circle => Self::Circle(Shapes::default()),
      LayerKind::Fill => Self::Fill(Shapes::default()),
      LayerKind::Line => Self::Line(Shapes::default()),
      LayerKind::Symbol => Self::Symbol(Shapes::default()),
      LayerKind::Unsupported(_) => Self::Unsupported,
    }
  }

  pub(crate) fn update(&mut self, summary: &EvaluationSummary, tile_layer: &TileLayer, lookup: &PropertyLookup<'_>) {
    match self {
      Self::Circle(shapes) => shapes.update(summary, tile_layer, lookup),
      Self::Fill(shapes) => shapes.update(summary, tile_layer, lookup),
      Self::Line(shapes) => shapes.update(summary, tile_layer, lookup),
      Self::Symbol(shapes) => shapes.update(summary, tile_layer, lookup),
      Self::Unsupported => {}
    }
  }

  /// Number of features with renderables.
  pub fn len(&self) -> usize {
    match self {
      Self::Circle(shapes) => shapes.len(),
      Self::Fill(shapes) => shapes.len(),
      Self::Line(shapes) => shapes.len(),
      Self::Symbol(shapes) => shapes.len(),
      Self::Unsupported => 0,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Shared handle to the current draw data; `None` when empty.
  pub fn payload(&self) -> Option<Rc<PrimitivePayload>> {
    match self {
      Self::Circle(shapes) => shapes.payload(),
      Self::Fill(shapes) => shapes.payload(),
      Self::Line(shapes) => shapes.payload(),
      Self::Symbol(shapes) => shapes.payload(),
      Self::Unsupported => None,
    }
  }
}
