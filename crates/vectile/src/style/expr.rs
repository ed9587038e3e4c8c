//! JSON style expressions.
//!
//! Expressions are compiled once from their JSON form into an [`Expr`]
//! tree and evaluated many times. Compilation also records which inputs
//! the tree reads, as [`Dependencies`]:
//!
//! | Input           | Operators                               |
//! |-----------------|-----------------------------------------|
//! | camera zoom     | `zoom`                                  |
//! | feature data    | `get`, `has`, `id`, `geometry-type`     |
//! | feature state   | `feature-state`                         |
//!
//! An expression with no dependencies is a constant.

use serde_json::{Map, Value};

use crate::error::{EvalError, StyleError};
use crate::tile::TileFeature;

/// Inputs an expression reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dependencies {
  pub zoom: bool,
  pub feature_data: bool,
  pub feature_state: bool,
}

impl Dependencies {
  /// Reads nothing: the value never changes.
  #[inline]
  pub fn is_constant(&self) -> bool {
    !self.zoom && !self.feature_data && !self.feature_state
  }

  /// Needs a feature to evaluate.
  #[inline]
  pub fn is_feature_dependent(&self) -> bool {
    self.feature_data || self.feature_state
  }
}

/// Frame-level evaluation inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvalContext {
  pub zoom: f64,
}

impl EvalContext {
  pub fn new(zoom: f64) -> Self {
    Self { zoom }
  }

  /// Same context at the integer level below `zoom`.
  pub fn floored(&self) -> Self {
    Self {
      zoom: self.zoom.floor(),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
  Add,
  Sub,
  Mul,
  Div,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interpolation {
  Linear,
  Exponential(f64),
}

/// Compiled expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
  Literal(Value),
  Zoom,
  Get(String),
  Has(String),
  Id,
  FeatureState(String),
  GeometryType,
  Compare(CompareOp, Box<Expr>, Box<Expr>),
  Not(Box<Expr>),
  All(Vec<Expr>),
  Any(Vec<Expr>),
  Case {
    branches: Vec<(Expr, Expr)>,
    fallback: Box<Expr>,
  },
  Match {
    input: Box<Expr>,
    arms: Vec<(Vec<Value>, Expr)>,
    fallback: Box<Expr>,
  },
  Coalesce(Vec<Expr>),
  Arithmetic(ArithOp, Vec<Expr>),
  Step {
    input: Box<Expr>,
    base: Box<Expr>,
    stops: Vec<(f64, Expr)>,
  },
  Interpolate {
    interpolation: Interpolation,
    input: Box<Expr>,
    stops: Vec<(f64, Expr)>,
  },
  ToString(Box<Expr>),
  Concat(Vec<Expr>),
}

fn malformed(msg: impl Into<String>) -> StyleError {
  StyleError::Malformed(msg.into())
}

fn arity(op: &str, expected: &'static str, got: usize) -> StyleError {
  StyleError::Arity {
    op: op.to_string(),
    expected,
    got,
  }
}

fn string_arg(op: &str, args: &[Value]) -> Result<String, StyleError> {
  match args {
    [Value::String(key)] => Ok(key.clone()),
    [_] => Err(malformed(format!("`{}` expects a string key", op))),
    _ => Err(arity(op, "1", args.len())),
  }
}

fn number_arg(op: &str, value: &Value) -> Result<f64, StyleError> {
  value
    .as_f64()
    .ok_or_else(|| malformed(format!("`{}` stop inputs must be numeric literals", op)))
}

fn compile_all(args: &[Value]) -> Result<Vec<Expr>, StyleError> {
  args.iter().map(Expr::compile).collect()
}

fn compile_stops(op: &str, args: &[Value]) -> Result<Vec<(f64, Expr)>, StyleError> {
  if args.is_empty() || args.len() % 2 != 0 {
    return Err(arity(op, "input/output pairs", args.len()));
  }
  let mut stops = Vec::with_capacity(args.len() / 2);
  for pair in args.chunks_exact(2) {
    let at = number_arg(op, &pair[0])?;
    if let Some((prev, _)) = stops.last() {
      if at <= *prev {
        return Err(malformed(format!("`{}` stops must be strictly ascending", op)));
      }
    }
    stops.push((at, Expr::compile(&pair[1])?));
  }
  Ok(stops)
}

fn compile_interpolation(value: &Value) -> Result<Interpolation, StyleError> {
  let parts = value
    .as_array()
    .ok_or_else(|| malformed("interpolation type must be an array"))?;
  match (parts.first().and_then(Value::as_str), parts.get(1)) {
    (Some("linear"), None) => Ok(Interpolation::Linear),
    (Some("exponential"), Some(base)) => base
      .as_f64()
      .filter(|b| *b > 0.0)
      .map(Interpolation::Exponential)
      .ok_or_else(|| malformed("exponential base must be a positive number")),
    _ => Err(malformed(format!("unsupported interpolation {}", value))),
  }
}

fn match_labels(value: &Value) -> Result<Vec<Value>, StyleError> {
  let labels = match value {
    Value::Array(items) => items.clone(),
    other => vec![other.clone()],
  };
  if labels.is_empty() {
    return Err(malformed("`match` label list is empty"));
  }
  if labels.iter().any(|l| !(l.is_string() || l.is_number())) {
    return Err(malformed("`match` labels must be strings or numbers"));
  }
  Ok(labels)
}

impl Expr {
  /// Compile an expression from its JSON form.
  ///
  /// Non-array values are literals. Arrays must start with an operator
  /// name; array literals are written `["literal", [...]]`.
  pub fn compile(json: &Value) -> Result<Self, StyleError> {
    let items = match json {
      Value::Array(items) => items,
      other => return Ok(Expr::Literal(other.clone())),
    };
    let (op, args) = match items.split_first() {
      Some((Value::String(op), args)) => (op.as_str(), args),
      Some(_) => return Err(malformed("expression must start with an operator name")),
      None => return Err(malformed("empty expression")),
    };

    let expr = match op {
      "literal" => match args {
        [value] => Expr::Literal(value.clone()),
        _ => return Err(arity(op, "1", args.len())),
      },
      "zoom" if args.is_empty() => Expr::Zoom,
      "id" if args.is_empty() => Expr::Id,
      "geometry-type" if args.is_empty() => Expr::GeometryType,
      "zoom" | "id" | "geometry-type" => return Err(arity(op, "0", args.len())),
      "get" => Expr::Get(string_arg(op, args)?),
      "has" => Expr::Has(string_arg(op, args)?),
      "feature-state" => Expr::FeatureState(string_arg(op, args)?),
      "==" | "!=" | "<" | "<=" | ">" | ">=" => {
        let [lhs, rhs] = args else {
          return Err(arity(op, "2", args.len()));
        };
        let cmp = match op {
          "==" => CompareOp::Eq,
          "!=" => CompareOp::Ne,
          "<" => CompareOp::Lt,
          "<=" => CompareOp::Le,
          ">" => CompareOp::Gt,
          _ => CompareOp::Ge,
        };
        Expr::Compare(cmp, Box::new(Expr::compile(lhs)?), Box::new(Expr::compile(rhs)?))
      }
      "!" => match args {
        [arg] => Expr::Not(Box::new(Expr::compile(arg)?)),
        _ => return Err(arity(op, "1", args.len())),
      },
      "all" => Expr::All(compile_all(args)?),
      "any" => Expr::Any(compile_all(args)?),
      "case" => {
        if args.len() < 3 || args.len() % 2 == 0 {
          return Err(arity(op, "an odd number >= 3", args.len()));
        }
        let (fallback, pairs) = args.split_last().ok_or_else(|| malformed("case"))?;
        let branches = pairs
          .chunks_exact(2)
          .map(|p| Ok((Expr::compile(&p[0])?, Expr::compile(&p[1])?)))
          .collect::<Result<Vec<_>, StyleError>>()?;
        Expr::Case {
          branches,
          fallback: Box::new(Expr::compile(fallback)?),
        }
      }
      "match" => {
        if args.len() < 4 || args.len() % 2 != 0 {
          return Err(arity(op, "an even number >= 4", args.len()));
        }
        let input = Expr::compile(&args[0])?;
        let (fallback, pairs) = args[1..].split_last().ok_or_else(|| malformed("match"))?;
        let arms = pairs
          .chunks_exact(2)
          .map(|p| Ok((match_labels(&p[0])?, Expr::compile(&p[1])?)))
          .collect::<Result<Vec<_>, StyleError>>()?;
        Expr::Match {
          input: Box::new(input),
          arms,
          fallback: Box::new(Expr::compile(fallback)?),
        }
      }
      "coalesce" => Expr::Coalesce(compile_all(args)?),
      "+" | "*" => {
        if args.len() < 2 {
          return Err(arity(op, "at least 2", args.len()));
        }
        let arith = if op == "+" { ArithOp::Add } else { ArithOp::Mul };
        Expr::Arithmetic(arith, compile_all(args)?)
      }
      "-" => {
        if !(1..=2).contains(&args.len()) {
          return Err(arity(op, "1 or 2", args.len()));
        }
        Expr::Arithmetic(ArithOp::Sub, compile_all(args)?)
      }
      "/" => {
        if args.len() != 2 {
          return Err(arity(op, "2", args.len()));
        }
        Expr::Arithmetic(ArithOp::Div, compile_all(args)?)
      }
      "step" => {
        let [input, base, stops @ ..] = args else {
          return Err(arity(op, "at least 2", args.len()));
        };
        Expr::Step {
          input: Box::new(Expr::compile(input)?),
          base: Box::new(Expr::compile(base)?),
          stops: if stops.is_empty() {
            Vec::new()
          } else {
            compile_stops(op, stops)?
          },
        }
      }
      "interpolate" => {
        let [kind, input, stops @ ..] = args else {
          return Err(arity(op, "at least 4", args.len()));
        };
        Expr::Interpolate {
          interpolation: compile_interpolation(kind)?,
          input: Box::new(Expr::compile(input)?),
          stops: compile_stops(op, stops)?,
        }
      }
      "to-string" => match args {
        [arg] => Expr::ToString(Box::new(Expr::compile(arg)?)),
        _ => return Err(arity(op, "1", args.len())),
      },
      "concat" => Expr::Concat(compile_all(args)?),
      _ => return Err(StyleError::UnknownOperator(op.to_string())),
    };
    Ok(expr)
  }

  /// Inputs read anywhere in the tree.
  pub fn dependencies(&self) -> Dependencies {
    let mut deps = Dependencies::default();
    self.collect(&mut deps);
    deps
  }

  fn collect(&self, deps: &mut Dependencies) {
    match self {
      Expr::Literal(_) => {}
      Expr::Zoom => deps.zoom = true,
      Expr::Get(_) | Expr::Has(_) | Expr::Id | Expr::GeometryType => deps.feature_data = true,
      Expr::FeatureState(_) => deps.feature_state = true,
      Expr::Compare(_, lhs, rhs) => {
        lhs.collect(deps);
        rhs.collect(deps);
      }
      Expr::Not(arg) | Expr::ToString(arg) => arg.collect(deps),
      Expr::All(args)
      | Expr::Any(args)
      | Expr::Coalesce(args)
      | Expr::Arithmetic(_, args)
      | Expr::Concat(args) => args.iter().for_each(|a| a.collect(deps)),
      Expr::Case { branches, fallback } => {
        for (cond, out) in branches {
          cond.collect(deps);
          out.collect(deps);
        }
        fallback.collect(deps);
      }
      Expr::Match {
        input,
        arms,
        fallback,
      } => {
        input.collect(deps);
        arms.iter().for_each(|(_, out)| out.collect(deps));
        fallback.collect(deps);
      }
      Expr::Step { input, base, stops } => {
        input.collect(deps);
        base.collect(deps);
        stops.iter().for_each(|(_, out)| out.collect(deps));
      }
      Expr::Interpolate { input, stops, .. } => {
        input.collect(deps);
        stops.iter().for_each(|(_, out)| out.collect(deps));
      }
    }
  }

  /// Evaluate against a context, an optional feature and its optional state.
  pub fn evaluate(
    &self,
    ctx: &EvalContext,
    feature: Option<&TileFeature>,
    state: Option<&Map<String, Value>>,
  ) -> Result<Value, EvalError> {
    let eval = |e: &Expr| e.evaluate(ctx, feature, state);
    match self {
      Expr::Literal(value) => Ok(value.clone()),
      Expr::Zoom => Ok(Value::from(ctx.zoom)),
      Expr::Get(key) => Ok(
        feature
          .and_then(|f| f.property(key))
          .cloned()
          .unwrap_or(Value::Null),
      ),
      Expr::Has(key) => Ok(Value::Bool(
        feature.map_or(false, |f| f.properties.contains_key(key)),
      )),
      Expr::Id => Ok(feature.and_then(|f| f.id).map_or(Value::Null, Value::from)),
      Expr::FeatureState(key) => Ok(state.and_then(|s| s.get(key)).cloned().unwrap_or(Value::Null)),
      Expr::GeometryType => Ok(
        feature.map_or(Value::Null, |f| Value::from(f.geometry.kind().as_str())),
      ),
      Expr::Compare(op, lhs, rhs) => compare(*op, &eval(lhs)?, &eval(rhs)?).map(Value::Bool),
      Expr::Not(arg) => Ok(Value::Bool(!as_bool(&eval(arg)?)?)),
      Expr::All(args) => {
        for arg in args {
          if !as_bool(&eval(arg)?)? {
            return Ok(Value::Bool(false));
          }
        }
        Ok(Value::Bool(true))
      }
      Expr::Any(args) => {
        for arg in args {
          if as_bool(&eval(arg)?)? {
            return Ok(Value::Bool(true));
          }
        }
        Ok(Value::Bool(false))
      }
      Expr::Case { branches, fallback } => {
        for (cond, out) in branches {
          if as_bool(&eval(cond)?)? {
            return eval(out);
          }
        }
        eval(fallback)
      }
      Expr::Match {
        input,
        arms,
        fallback,
      } => {
        let value = eval(input)?;
        for (labels, out) in arms {
          if labels.iter().any(|l| values_equal(l, &value)) {
            return eval(out);
          }
        }
        eval(fallback)
      }
      Expr::Coalesce(args) => {
        for arg in args {
          let value = eval(arg)?;
          if !value.is_null() {
            return Ok(value);
          }
        }
        Ok(Value::Null)
      }
      Expr::Arithmetic(op, args) => {
        let nums = args
          .iter()
          .map(|a| as_number(&eval(a)?))
          .collect::<Result<Vec<f64>, EvalError>>()?;
        Ok(Value::from(arithmetic(*op, &nums)))
      }
      Expr::Step { input, base, stops } => {
        let at = as_number(&eval(input)?)?;
        match stops.iter().rev().find(|(stop, _)| *stop <= at) {
          Some((_, out)) => eval(out),
          None => eval(base),
        }
      }
      Expr::Interpolate {
        interpolation,
        input,
        stops,
      } => {
        let at = as_number(&eval(input)?)?;
        interpolate(*interpolation, at, stops, eval)
      }
      Expr::ToString(arg) => Ok(Value::String(to_string(&eval(arg)?))),
      Expr::Concat(args) => {
        let mut out = String::new();
        for arg in args {
          out.push_str(&to_string(&eval(arg)?));
        }
        Ok(Value::String(out))
      }
    }
  }
}

fn type_name(value: &Value) -> String {
  match value {
    Value::Null => "null".into(),
    Value::Bool(_) => "boolean".into(),
    Value::Number(_) => "number".into(),
    Value::String(_) => "string".into(),
    Value::Array(_) => "array".into(),
    Value::Object(_) => "object".into(),
  }
}

fn as_bool(value: &Value) -> Result<bool, EvalError> {
  value.as_bool().ok_or_else(|| EvalError::Type {
    expected: "boolean",
    found: type_name(value),
  })
}

fn as_number(value: &Value) -> Result<f64, EvalError> {
  value.as_f64().ok_or_else(|| EvalError::Type {
    expected: "number",
    found: type_name(value),
  })
}

/// Equality with numbers compared by value (`1 == 1.0`).
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
  match (a.as_f64(), b.as_f64()) {
    (Some(x), Some(y)) => x == y,
    _ => a == b,
  }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
  match op {
    CompareOp::Eq => return Ok(values_equal(lhs, rhs)),
    CompareOp::Ne => return Ok(!values_equal(lhs, rhs)),
    _ => {}
  }
  let ordering = match (lhs, rhs) {
    (Value::Number(_), Value::Number(_)) => as_number(lhs)?.partial_cmp(&as_number(rhs)?),
    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
    _ => {
      return Err(EvalError::Type {
        expected: "two numbers or two strings",
        found: format!("{} and {}", type_name(lhs), type_name(rhs)),
      })
    }
  };
  let Some(ordering) = ordering else {
    return Ok(false);
  };
  Ok(match op {
    CompareOp::Lt => ordering.is_lt(),
    CompareOp::Le => ordering.is_le(),
    CompareOp::Gt => ordering.is_gt(),
    _ => ordering.is_ge(),
  })
}

fn arithmetic(op: ArithOp, nums: &[f64]) -> f64 {
  match (op, nums) {
    (ArithOp::Add, _) => nums.iter().sum(),
    (ArithOp::Mul, _) => nums.iter().product(),
    (ArithOp::Sub, [x]) => -x,
    (ArithOp::Sub, [x, y]) => x - y,
    (ArithOp::Div, [x, y]) => x / y,
    _ => f64::NAN,
  }
}

fn interpolate<F>(
  interpolation: Interpolation,
  at: f64,
  stops: &[(f64, Expr)],
  eval: F,
) -> Result<Value, EvalError>
where
  F: Fn(&Expr) -> Result<Value, EvalError>,
{
  let upper = stops.iter().position(|(stop, _)| *stop > at);
  let (lo, hi) = match upper {
    Some(0) => return eval(&stops[0].1),
    None => return stops.last().map_or(Ok(Value::Null), |(_, out)| eval(out)),
    Some(i) => (&stops[i - 1], &stops[i]),
  };
  let t = match interpolation {
    Interpolation::Linear => (at - lo.0) / (hi.0 - lo.0),
    Interpolation::Exponential(base) if (base - 1.0).abs() < 1e-12 => (at - lo.0) / (hi.0 - lo.0),
    Interpolation::Exponential(base) => {
      (base.powf(at - lo.0) - 1.0) / (base.powf(hi.0 - lo.0) - 1.0)
    }
  };
  let (a, b) = (eval(&lo.1)?, eval(&hi.1)?);
  match (&a, &b) {
    (Value::Array(xs), Value::Array(ys)) if xs.len() == ys.len() => xs
      .iter()
      .zip(ys)
      .map(|(x, y)| Ok(Value::from(lerp(as_number(x)?, as_number(y)?, t))))
      .collect::<Result<Vec<_>, EvalError>>()
      .map(Value::Array),
    _ => Ok(Value::from(lerp(as_number(&a)?, as_number(&b)?, t))),
  }
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
  a + (b - a) * t
}

/// String form used by `to-string` and `concat`.
pub(crate) fn to_string(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => match n.as_f64() {
      Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
      _ => n.to_string(),
    },
    other => other.to_string(),
  }
}

#[cfg(test)]
#[path = "expr_test.rs"]
mod expr_test;
