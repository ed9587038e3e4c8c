//! Style documents.
//!
//! A [`Style`] is loaded from a Mapbox-like JSON document:
//!
//! ```text
//! {
//!   "sources": { "osm": { "type": "vector" } },
//!   "layers": [
//!     { "id": "roads", "type": "line", "source": "osm", "source-layer": "road",
//!       "filter": ["==", ["get", "class"], "primary"],
//!       "paint": { "line-width": ["interpolate", ["linear"], ["zoom"], 5, 1, 15, 8] } }
//!   ]
//! }
//! ```
//!
//! Malformed documents and expressions are rejected at load time.
//!
//! # Module Structure
//!
//! - [`expr`]: expression compiler and evaluator
//! - [`binding`]: compiled properties with dependency flags
//! - [`layer`]: `StyleLayer` and the `LayerKind` registry

pub mod binding;
pub mod expr;
pub mod layer;

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

pub use binding::{Binding, BindingId, PropertyCategory, PropertySpec, SpecDefault};
pub use expr::{Dependencies, EvalContext, Expr};
pub use layer::{BindingClass, LayerKind, StyleLayer, Visibility};

use crate::error::StyleError;
use layer::RawLayer;

#[derive(Deserialize)]
struct RawStyle {
  #[serde(default)]
  sources: BTreeMap<String, Value>,
  #[serde(default)]
  layers: Vec<RawLayer>,
}

/// A loaded style: named sources and layers in declaration order.
#[derive(Clone, Debug, Default)]
pub struct Style {
  sources: Vec<String>,
  layers: Vec<StyleLayer>,
}

impl Style {
  /// Parse and compile a style document.
  pub fn from_json(text: &str) -> Result<Self, StyleError> {
    let raw: RawStyle = serde_json::from_str(text)?;
    let sources: Vec<String> = raw.sources.into_keys().collect();

    let mut seen = HashSet::new();
    let mut layers = Vec::with_capacity(raw.layers.len());
    for raw_layer in raw.layers {
      let layer = StyleLayer::from_raw(raw_layer)?;
      if !seen.insert(layer.id().to_string()) {
        return Err(StyleError::DuplicateLayer(layer.id().to_string()));
      }
      if layer.kind().is_supported() && !sources.iter().any(|s| s == layer.source()) {
        return Err(StyleError::InvalidLayer {
          layer: layer.id().to_string(),
          reason: format!("unknown source `{}`", layer.source()),
        });
      }
      layers.push(layer);
    }

    tracing::debug!(sources = sources.len(), layers = layers.len(), "style loaded");
    Ok(Self { sources, layers })
  }

  /// Source names, sorted.
  pub fn sources(&self) -> &[String] {
    &self.sources
  }

  /// All layers in declaration order.
  pub fn layers(&self) -> &[StyleLayer] {
    &self.layers
  }

  pub fn layer(&self, id: &str) -> Option<&StyleLayer> {
    self.layers.iter().find(|l| l.id() == id)
  }

  /// Layers drawing from `source`, in declaration order.
  pub fn layers_for_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a StyleLayer> + 'a {
    self.layers.iter().filter(move |l| l.source() == source)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const STYLE: &str = r##"{
    "sources": {"osm": {"type": "vector"}, "sat": {"type": "raster"}},
    "layers": [
      {"id": "bg", "type": "background"},
      {"id": "water", "type": "fill", "source": "osm", "paint": {"fill-color": "#0af"}},
      {"id": "poi", "type": "circle", "source": "osm", "source-layer": "points"}
    ]
  }"##;

  #[test]
  fn test_load_style() {
    let style = Style::from_json(STYLE).unwrap();
    assert_eq!(style.sources(), &["osm".to_string(), "sat".to_string()]);
    assert_eq!(style.layers().len(), 3);
    assert_eq!(style.layer("bg").unwrap().kind(), &LayerKind::Unsupported("background".into()));

    let ids: Vec<_> = style.layers_for_source("osm").map(|l| l.id()).collect();
    assert_eq!(ids, ["water", "poi"]);
    assert_eq!(style.layer("poi").unwrap().source_layer(), "points");
    assert_eq!(style.layer("water").unwrap().source_layer(), "water");
  }

  #[test]
  fn test_duplicate_layer_rejected() {
    let text = r#"{"sources": {"s": {}}, "layers": [
      {"id": "a", "type": "line", "source": "s"},
      {"id": "a", "type": "fill", "source": "s"}]}"#;
    assert!(matches!(Style::from_json(text), Err(StyleError::DuplicateLayer(id)) if id == "a"));
  }

  #[test]
  fn test_unknown_source_rejected() {
    let text = r#"{"layers": [{"id": "a", "type": "line", "source": "nope"}]}"#;
    assert!(matches!(Style::from_json(text), Err(StyleError::InvalidLayer { .. })));
  }

  #[test]
  fn test_malformed_expression_rejected() {
    let text = r#"{"sources": {"s": {}}, "layers": [
      {"id": "a", "type": "line", "source": "s", "paint": {"line-width": ["bogus"]}}]}"#;
    assert!(matches!(Style::from_json(text), Err(StyleError::UnknownOperator(_))));
    assert!(matches!(Style::from_json("{"), Err(StyleError::Json(_))));
  }
}
