//! Compiled style properties.

use serde_json::{Map, Value};

use super::expr::{Dependencies, EvalContext, Expr};
use crate::error::{EvalError, StyleError};
use crate::tile::TileFeature;

/// How often a property may change.
///
/// Paint properties track the continuous zoom; layout properties only
/// change when the integer zoom does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyCategory {
  Paint,
  Layout,
}

/// Default value of a property, constructible in `const` tables.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpecDefault {
  Null,
  Bool(bool),
  Number(f64),
  Str(&'static str),
}

impl SpecDefault {
  pub fn to_value(self) -> Value {
    match self {
      Self::Null => Value::Null,
      Self::Bool(b) => Value::Bool(b),
      Self::Number(n) => Value::from(n),
      Self::Str(s) => Value::from(s),
    }
  }
}

/// Static description of one style property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PropertySpec {
  pub name: &'static str,
  pub category: PropertyCategory,
  pub default: SpecDefault,
}

impl PropertySpec {
  pub const fn paint(name: &'static str, default: SpecDefault) -> Self {
    Self {
      name,
      category: PropertyCategory::Paint,
      default,
    }
  }

  pub const fn layout(name: &'static str, default: SpecDefault) -> Self {
    Self {
      name,
      category: PropertyCategory::Layout,
      default,
    }
  }
}

/// Descriptor of a layer's `filter`. Evaluated like a layout property; a failing
/// evaluation rejects the feature.
pub const FILTER_SPEC: PropertySpec = PropertySpec::layout("filter", SpecDefault::Bool(false));

/// Index of a binding within its style layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub usize);

/// A property expression compiled once, with its dependency flags.
#[derive(Clone, Debug)]
pub struct Binding {
  spec: PropertySpec,
  expr: Expr,
  deps: Dependencies,
  default: Value,
}

impl Binding {
  /// Compile `json` as the value of `spec`.
  pub fn compile(json: &Value, spec: PropertySpec) -> Result<Self, StyleError> {
    let expr = Expr::compile(json)?;
    let deps = expr.dependencies();
    Ok(Self {
      spec,
      expr,
      deps,
      default: spec.default.to_value(),
    })
  }

  #[inline]
  pub fn name(&self) -> &'static str {
    self.spec.name
  }

  #[inline]
  pub fn category(&self) -> PropertyCategory {
    self.spec.category
  }

  #[inline]
  pub fn dependencies(&self) -> Dependencies {
    self.deps
  }

  #[inline]
  pub fn has_zoom(&self) -> bool {
    self.deps.zoom
  }

  #[inline]
  pub fn has_feature_data(&self) -> bool {
    self.deps.feature_data
  }

  #[inline]
  pub fn has_feature_state(&self) -> bool {
    self.deps.feature_state
  }

  /// Value used when evaluation fails.
  #[inline]
  pub fn default_value(&self) -> &Value {
    &self.default
  }

  /// Evaluate, surfacing runtime errors.
  pub fn try_evaluate(
    &self,
    ctx: &EvalContext,
    feature: Option<&TileFeature>,
    state: Option<&Map<String, Value>>,
  ) -> Result<Value, EvalError> {
    self.expr.evaluate(ctx, feature, state)
  }

  /// Evaluate, falling back to the property default on error.
  ///
  /// Layout properties are evaluated at the integer zoom.
  pub fn evaluate(
    &self,
    ctx: &EvalContext,
    feature: Option<&TileFeature>,
    state: Option<&Map<String, Value>>,
  ) -> Value {
    let ctx = match self.spec.category {
      PropertyCategory::Paint => *ctx,
      PropertyCategory::Layout => ctx.floored(),
    };
    match self.expr.evaluate(&ctx, feature, state) {
      Ok(Value::Null) => self.default.clone(),
      Ok(value) => value,
      Err(err) => {
        tracing::trace!(property = self.spec.name, %err, "evaluation failed, using default");
        self.default.clone()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::test_utils::point_feature;

  const RADIUS: PropertySpec = PropertySpec::paint("circle-radius", SpecDefault::Number(5.0));
  const SIZE: PropertySpec = PropertySpec::layout("text-size", SpecDefault::Number(16.0));

  #[test]
  fn test_flags_from_expression() {
    let binding = Binding::compile(&json!(["*", ["zoom"], ["get", "scale"]]), RADIUS).unwrap();
    assert!(binding.has_zoom());
    assert!(binding.has_feature_data());
    assert!(!binding.has_feature_state());
    assert_eq!(binding.name(), "circle-radius");
    assert_eq!(binding.category(), PropertyCategory::Paint);
  }

  #[test]
  fn test_error_falls_back_to_default() {
    let binding = Binding::compile(&json!(["+", ["get", "name"], 1]), RADIUS).unwrap();
    let feature = point_feature(None, json!({"name": "text"}));
    let ctx = EvalContext::new(3.0);
    assert!(binding.try_evaluate(&ctx, Some(&feature), None).is_err());
    assert_eq!(binding.evaluate(&ctx, Some(&feature), None), json!(5.0));
  }

  #[test]
  fn test_null_falls_back_to_default() {
    let binding = Binding::compile(&json!(["get", "missing"]), RADIUS).unwrap();
    let feature = point_feature(None, json!({}));
    assert_eq!(
      binding.evaluate(&EvalContext::new(0.0), Some(&feature), None),
      json!(5.0)
    );
  }

  #[test]
  fn test_layout_uses_integer_zoom() {
    let expr = json!(["interpolate", ["linear"], ["zoom"], 0, 0, 8, 8]);
    let paint = Binding::compile(&expr, RADIUS).unwrap();
    let layout = Binding::compile(&expr, SIZE).unwrap();
    let ctx = EvalContext::new(4.5);
    assert_eq!(paint.evaluate(&ctx, None, None), json!(4.5));
    assert_eq!(layout.evaluate(&ctx, None, None), json!(4.0));
  }
}
