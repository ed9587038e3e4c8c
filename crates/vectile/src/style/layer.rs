//! Style layers and the layer-kind registry.
//!
//! Every binding of a layer is classified once, when the layer is built:
//!
//! ```text
//!   depends on        │ class         │ evaluated by
//!   ──────────────────┼───────────────┼──────────────────────────────
//!   nothing           │ Constant      │ StyleLayer, at construction
//!   zoom only         │ LayerZoom     │ LayerCache, per cell
//!   feature / state   │ Feature       │ FeatureCache, per feature
//! ```

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::binding::{Binding, BindingId, PropertyCategory, PropertySpec, SpecDefault, FILTER_SPEC};
use super::expr::EvalContext;
use crate::error::StyleError;
use crate::tile::GeometryType;

static NULL: Value = Value::Null;

use SpecDefault::{Null as NoDefault, Number, Str};

const CIRCLE_PROPERTIES: &[PropertySpec] = &[
  PropertySpec::paint("circle-radius", Number(5.0)),
  PropertySpec::paint("circle-color", Str("#000000")),
  PropertySpec::paint("circle-opacity", Number(1.0)),
  PropertySpec::paint("circle-stroke-width", Number(0.0)),
  PropertySpec::paint("circle-stroke-color", Str("#000000")),
  PropertySpec::layout("circle-sort-key", NoDefault),
];

const FILL_PROPERTIES: &[PropertySpec] = &[
  PropertySpec::paint("fill-color", Str("#000000")),
  PropertySpec::paint("fill-opacity", Number(1.0)),
  PropertySpec::paint("fill-outline-color", NoDefault),
  PropertySpec::layout("fill-sort-key", NoDefault),
];

const LINE_PROPERTIES: &[PropertySpec] = &[
  PropertySpec::paint("line-color", Str("#000000")),
  PropertySpec::paint("line-width", Number(1.0)),
  PropertySpec::paint("line-opacity", Number(1.0)),
  PropertySpec::layout("line-cap", Str("butt")),
  PropertySpec::layout("line-join", Str("miter")),
  PropertySpec::layout("line-sort-key", NoDefault),
];

const SYMBOL_PROPERTIES: &[PropertySpec] = &[
  PropertySpec::paint("text-color", Str("#000000")),
  PropertySpec::paint("text-opacity", Number(1.0)),
  PropertySpec::paint("text-halo-width", Number(0.0)),
  PropertySpec::paint("text-halo-color", Str("rgba(0,0,0,0)")),
  PropertySpec::layout("text-field", Str("")),
  PropertySpec::layout("text-size", Number(16.0)),
  PropertySpec::layout("icon-image", Str("")),
  PropertySpec::layout("symbol-sort-key", NoDefault),
];

/// Style layer type, keyed by the style's `type` string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayerKind {
  Circle,
  Fill,
  Line,
  Symbol,
  /// Any other type; parsed, kept, and never rendered.
  Unsupported(String),
}

impl LayerKind {
  /// Registry lookup.
  pub fn from_type(name: &str) -> Self {
    match name {
      "circle" => Self::Circle,
      "fill" => Self::Fill,
      "line" => Self::Line,
      "symbol" => Self::Symbol,
      other => Self::Unsupported(other.to_string()),
    }
  }

  pub fn type_name(&self) -> &str {
    match self {
      Self::Circle => "circle",
      Self::Fill => "fill",
      Self::Line => "line",
      Self::Symbol => "symbol",
      Self::Unsupported(name) => name,
    }
  }

  #[inline]
  pub fn is_supported(&self) -> bool {
    !matches!(self, Self::Unsupported(_))
  }

  /// Property table of this kind.
  pub fn properties(&self) -> &'static [PropertySpec] {
    match self {
      Self::Circle => CIRCLE_PROPERTIES,
      Self::Fill => FILL_PROPERTIES,
      Self::Line => LINE_PROPERTIES,
      Self::Symbol => SYMBOL_PROPERTIES,
      Self::Unsupported(_) => &[],
    }
  }

  pub fn property(&self, name: &str) -> Option<&'static PropertySpec> {
    self.properties().iter().find(|spec| spec.name == name)
  }

  /// Geometry classes this kind can draw.
  pub fn supports(&self, geometry: GeometryType) -> bool {
    match self {
      Self::Circle => geometry == GeometryType::Point,
      Self::Fill => geometry == GeometryType::Polygon,
      Self::Line => geometry != GeometryType::Point,
      Self::Symbol => true,
      Self::Unsupported(_) => false,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
  Visible,
  None,
}

/// Where a binding's value is evaluated and cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingClass {
  Constant,
  LayerZoom,
  Feature,
}

#[derive(Deserialize)]
pub(crate) struct RawLayer {
  id: String,
  #[serde(rename = "type")]
  kind: String,
  #[serde(default)]
  source: Option<String>,
  #[serde(default, rename = "source-layer")]
  source_layer: Option<String>,
  #[serde(default)]
  minzoom: Option<f64>,
  #[serde(default)]
  maxzoom: Option<f64>,
  #[serde(default)]
  filter: Option<Value>,
  #[serde(default)]
  layout: Map<String, Value>,
  #[serde(default)]
  paint: Map<String, Value>,
}

/// One layer of a style, with its bindings compiled and classified.
#[derive(Clone, Debug)]
pub struct StyleLayer {
  id: String,
  kind: LayerKind,
  source: String,
  source_layer: Option<String>,
  minzoom: f64,
  maxzoom: f64,
  visibility: Visibility,
  filter: Option<Binding>,
  bindings: Vec<Binding>,
  classes: Vec<BindingClass>,
  constants: Vec<Option<Value>>,
  by_name: HashMap<&'static str, BindingId>,
  defaults: HashMap<&'static str, Value>,
}

impl StyleLayer {
  /// Build a layer from its JSON definition.
  pub fn from_json(json: &Value) -> Result<Self, StyleError> {
    let raw: RawLayer = serde_json::from_value(json.clone())?;
    Self::from_raw(raw)
  }

  pub(crate) fn from_raw(raw: RawLayer) -> Result<Self, StyleError> {
    let kind = LayerKind::from_type(&raw.kind);
    let invalid = |reason: String| StyleError::InvalidLayer {
      layer: raw.id.clone(),
      reason,
    };

    let minzoom = raw.minzoom.unwrap_or(0.0);
    let maxzoom = raw.maxzoom.unwrap_or(24.0);
    if minzoom > maxzoom {
      return Err(invalid(format!("minzoom {} exceeds maxzoom {}", minzoom, maxzoom)));
    }

    let visibility = match raw.layout.get("visibility") {
      None => Visibility::Visible,
      Some(Value::String(v)) if v == "visible" => Visibility::Visible,
      Some(Value::String(v)) if v == "none" => Visibility::None,
      Some(other) => return Err(invalid(format!("invalid visibility {}", other))),
    };

    let mut layer = Self {
      id: raw.id.clone(),
      kind,
      source: raw.source.clone().unwrap_or_default(),
      source_layer: raw.source_layer.clone(),
      minzoom,
      maxzoom,
      visibility,
      filter: None,
      bindings: Vec::new(),
      classes: Vec::new(),
      constants: Vec::new(),
      by_name: HashMap::new(),
      defaults: HashMap::new(),
    };

    if !layer.kind.is_supported() {
      return Ok(layer);
    }
    if raw.source.is_none() {
      return Err(invalid("missing `source`".into()));
    }

    if let Some(json) = &raw.filter {
      let filter = Binding::compile(json, FILTER_SPEC)?;
      if filter.has_feature_state() {
        return Err(invalid("filter cannot read feature-state".into()));
      }
      layer.filter = Some(filter);
    }

    for spec in layer.kind.properties() {
      layer.defaults.insert(spec.name, spec.default.to_value());
    }

    let sections = [
      (PropertyCategory::Layout, &raw.layout),
      (PropertyCategory::Paint, &raw.paint),
    ];
    for (category, section) in sections {
      for (name, json) in section {
        if category == PropertyCategory::Layout && name == "visibility" {
          continue;
        }
        let spec = match layer.kind.property(name) {
          Some(spec) if spec.category == category => *spec,
          _ => {
            return Err(StyleError::UnknownProperty {
              layer: raw.id.clone(),
              property: name.clone(),
            })
          }
        };
        let binding = Binding::compile(json, spec)?;
        if category == PropertyCategory::Layout && binding.has_feature_state() {
          return Err(invalid(format!("layout property `{}` cannot read feature-state", name)));
        }
        layer.push_binding(binding);
      }
    }

    Ok(layer)
  }

  fn push_binding(&mut self, binding: Binding) {
    let deps = binding.dependencies();
    let class = if deps.is_constant() {
      BindingClass::Constant
    } else if deps.is_feature_dependent() {
      BindingClass::Feature
    } else {
      BindingClass::LayerZoom
    };
    let constant = match class {
      BindingClass::Constant => Some(binding.evaluate(&EvalContext::new(0.0), None, None)),
      _ => None,
    };
    let id = BindingId(self.bindings.len());
    self.by_name.insert(binding.name(), id);
    self.bindings.push(binding);
    self.classes.push(class);
    self.constants.push(constant);
  }

  #[inline]
  pub fn id(&self) -> &str {
    &self.id
  }

  #[inline]
  pub fn kind(&self) -> &LayerKind {
    &self.kind
  }

  #[inline]
  pub fn source(&self) -> &str {
    &self.source
  }

  /// Tile layer this style layer draws; defaults to the layer id.
  pub fn source_layer(&self) -> &str {
    self.source_layer.as_deref().unwrap_or(&self.id)
  }

  pub fn visibility(&self) -> Visibility {
    self.visibility
  }

  /// Shown at `zoom`: visible and `minzoom <= zoom < maxzoom`.
  pub fn is_visible_at(&self, zoom: f64) -> bool {
    self.visibility == Visibility::Visible
      && self.kind.is_supported()
      && self.minzoom <= zoom
      && zoom < self.maxzoom
  }

  pub fn filter(&self) -> Option<&Binding> {
    self.filter.as_ref()
  }

  /// True when the pass-set of a cell never changes after construction.
  pub fn filter_is_static(&self) -> bool {
    self.filter.as_ref().map_or(true, |f| !f.has_zoom())
  }

  #[inline]
  pub fn binding(&self, id: BindingId) -> &Binding {
    &self.bindings[id.0]
  }

  pub fn binding_id(&self, name: &str) -> Option<BindingId> {
    self.by_name.get(name).copied()
  }

  pub fn binding_class(&self, id: BindingId) -> BindingClass {
    self.classes[id.0]
  }

  /// Value of a constant binding, computed at construction.
  pub fn constant(&self, id: BindingId) -> Option<&Value> {
    self.constants.get(id.0).and_then(Option::as_ref)
  }

  /// Default of a property of this layer's kind (null if unknown).
  pub fn default_for(&self, name: &str) -> &Value {
    self.defaults.get(name).unwrap_or(&NULL)
  }

  fn bindings_of(&self, class: BindingClass) -> impl Iterator<Item = (BindingId, &Binding)> + '_ {
    self
      .bindings
      .iter()
      .enumerate()
      .filter(move |(i, _)| self.classes[*i] == class)
      .map(|(i, b)| (BindingId(i), b))
  }

  /// Zoom-dependent bindings evaluated once per cell.
  pub fn layer_zoom_bindings(&self) -> impl Iterator<Item = (BindingId, &Binding)> + '_ {
    self.bindings_of(BindingClass::LayerZoom)
  }

  /// Bindings evaluated per feature.
  pub fn feature_bindings(&self) -> impl Iterator<Item = (BindingId, &Binding)> + '_ {
    self.bindings_of(BindingClass::Feature)
  }
}

#[cfg(test)]
#[path = "layer_test.rs"]
mod layer_test;
