use serde_json::json;

use super::*;
use crate::test_utils::point_feature;

fn eval(expr: Value, zoom: f64) -> Result<Value, EvalError> {
  Expr::compile(&expr).unwrap().evaluate(&EvalContext::new(zoom), None, None)
}

fn eval_feature(expr: Value, feature: &TileFeature) -> Value {
  Expr::compile(&expr)
    .unwrap()
    .evaluate(&EvalContext::new(10.0), Some(feature), None)
    .unwrap()
}

// =============================================================================
// Compilation
// =============================================================================

/// Bare JSON values are literals.
#[test]
fn test_literals() {
  assert_eq!(Expr::compile(&json!(3)).unwrap(), Expr::Literal(json!(3)));
  assert_eq!(Expr::compile(&json!("red")).unwrap(), Expr::Literal(json!("red")));
  assert_eq!(
    Expr::compile(&json!(["literal", [1, 2]])).unwrap(),
    Expr::Literal(json!([1, 2]))
  );
}

/// Unknown operators and wrong arities are compile-time errors.
#[test]
fn test_compile_errors() {
  assert!(matches!(
    Expr::compile(&json!(["frobnicate", 1])),
    Err(StyleError::UnknownOperator(op)) if op == "frobnicate"
  ));
  assert!(matches!(Expr::compile(&json!(["==", 1])), Err(StyleError::Arity { .. })));
  assert!(matches!(Expr::compile(&json!(["zoom", 1])), Err(StyleError::Arity { .. })));
  assert!(matches!(Expr::compile(&json!([])), Err(StyleError::Malformed(_))));
  assert!(matches!(Expr::compile(&json!([1, 2])), Err(StyleError::Malformed(_))));
  assert!(matches!(
    Expr::compile(&json!(["step", ["zoom"], 0, 5, 1, 3, 2])),
    Err(StyleError::Malformed(_))
  ));
  assert!(matches!(
    Expr::compile(&json!(["interpolate", ["cubic"], ["zoom"], 0, 1])),
    Err(StyleError::Malformed(_))
  ));
}

/// Dependency flags follow the operators used anywhere in the tree.
#[test]
fn test_dependencies() {
  let deps = |v: Value| Expr::compile(&v).unwrap().dependencies();

  assert!(deps(json!(["+", 1, 2])).is_constant());

  let zoom = deps(json!(["interpolate", ["linear"], ["zoom"], 0, 1, 10, 5]));
  assert!(zoom.zoom && !zoom.feature_data && !zoom.feature_state);

  let data = deps(json!(["case", ["has", "name"], ["get", "name"], "?"]));
  assert!(data.feature_data && !data.zoom);
  assert!(data.is_feature_dependent());

  let state = deps(json!(["coalesce", ["feature-state", "hover"], false]));
  assert!(state.feature_state && !state.feature_data);

  let mixed = deps(json!(["step", ["zoom"], ["id"], 5, ["feature-state", "size"]]));
  assert_eq!(
    mixed,
    Dependencies {
      zoom: true,
      feature_data: true,
      feature_state: true
    }
  );
}

// =============================================================================
// Evaluation
// =============================================================================

/// Comparisons treat integers and floats alike.
#[test]
fn test_comparisons() {
  assert_eq!(eval(json!(["==", 1, 1.0]), 0.0), Ok(json!(true)));
  assert_eq!(eval(json!(["!=", "a", "b"]), 0.0), Ok(json!(true)));
  assert_eq!(eval(json!(["<", ["zoom"], 5]), 4.9), Ok(json!(true)));
  assert_eq!(eval(json!(["<", ["zoom"], 5]), 5.0), Ok(json!(false)));
  assert_eq!(eval(json!([">=", "b", "a"]), 0.0), Ok(json!(true)));
  assert!(matches!(eval(json!(["<", 1, "a"]), 0.0), Err(EvalError::Type { .. })));
}

/// Boolean operators require booleans and short-circuit.
#[test]
fn test_logic() {
  assert_eq!(eval(json!(["all", true, ["<", 1, 2]]), 0.0), Ok(json!(true)));
  assert_eq!(eval(json!(["all", false, 3]), 0.0), Ok(json!(false)));
  assert_eq!(eval(json!(["any", false, true]), 0.0), Ok(json!(true)));
  assert_eq!(eval(json!(["!", false]), 0.0), Ok(json!(true)));
  assert!(eval(json!(["!", 1]), 0.0).is_err());
}

/// `step` picks the output of the last stop not above the input.
#[test]
fn test_step() {
  let expr = json!(["step", ["zoom"], "small", 5, "medium", 10, "large"]);
  assert_eq!(eval(expr.clone(), 2.0), Ok(json!("small")));
  assert_eq!(eval(expr.clone(), 5.0), Ok(json!("medium")));
  assert_eq!(eval(expr, 12.5), Ok(json!("large")));
}

/// Linear and exponential interpolation clamp outside the stops.
#[test]
fn test_interpolate() {
  let linear = json!(["interpolate", ["linear"], ["zoom"], 0, 0, 10, 100]);
  assert_eq!(eval(linear.clone(), -1.0), Ok(json!(0)));
  assert_eq!(eval(linear.clone(), 2.5), Ok(json!(25.0)));
  assert_eq!(eval(linear, 20.0), Ok(json!(100)));

  let exp = json!(["interpolate", ["exponential", 2], ["zoom"], 0, 0, 2, 3]);
  let mid = eval(exp, 1.0).unwrap().as_f64().unwrap();
  assert!((mid - 1.0).abs() < 1e-12, "got {}", mid);

  let arrays = json!(["interpolate", ["linear"], ["zoom"], 0, ["literal", [0, 10]], 1, ["literal", [10, 20]]]);
  assert_eq!(eval(arrays, 0.5), Ok(json!([5.0, 15.0])));
}

/// Arithmetic, `coalesce`, `to-string` and `concat`.
#[test]
fn test_arithmetic_and_strings() {
  assert_eq!(eval(json!(["+", 1, 2, 3]), 0.0), Ok(json!(6.0)));
  assert_eq!(eval(json!(["-", 4]), 0.0), Ok(json!(-4.0)));
  assert_eq!(eval(json!(["/", ["zoom"], 2]), 3.0), Ok(json!(1.5)));
  assert_eq!(eval(json!(["coalesce", null, "x"]), 0.0), Ok(json!("x")));
  assert_eq!(eval(json!(["to-string", 3.0]), 0.0), Ok(json!("3")));
  assert_eq!(eval(json!(["concat", "z", ["zoom"], "!"]), 7.0), Ok(json!("z7!")));
}

/// Feature accessors read properties, id and geometry type.
#[test]
fn test_feature_accessors() {
  let feature = point_feature(Some(42), json!({"class": "cafe", "rank": 3}));
  assert_eq!(eval_feature(json!(["get", "class"]), &feature), json!("cafe"));
  assert_eq!(eval_feature(json!(["get", "missing"]), &feature), Value::Null);
  assert_eq!(eval_feature(json!(["has", "rank"]), &feature), json!(true));
  assert_eq!(eval_feature(json!(["id"]), &feature), json!(42));
  assert_eq!(eval_feature(json!(["geometry-type"]), &feature), json!("Point"));
  assert_eq!(
    eval_feature(json!(["match", ["get", "class"], ["bar", "cafe"], 1, 0]), &feature),
    json!(1)
  );
  assert_eq!(
    eval_feature(json!(["match", ["get", "rank"], 3, "third", "other"]), &feature),
    json!("third")
  );
}

/// `feature-state` reads the state map handed to evaluation.
#[test]
fn test_feature_state() {
  let expr = Expr::compile(&json!(["case", ["==", ["feature-state", "hover"], true], 2, 1])).unwrap();
  let ctx = EvalContext::new(0.0);
  let mut state = Map::new();
  assert_eq!(expr.evaluate(&ctx, None, Some(&state)), Ok(json!(1)));
  state.insert("hover".into(), json!(true));
  assert_eq!(expr.evaluate(&ctx, None, Some(&state)), Ok(json!(2)));
}
