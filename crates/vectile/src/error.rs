//! Error types.

use thiserror::Error;

use crate::area::Area;

/// A style document or expression that cannot be compiled.
#[derive(Debug, Error)]
pub enum StyleError {
  #[error("invalid style json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("unknown expression operator `{0}`")]
  UnknownOperator(String),
  #[error("operator `{op}` expects {expected} arguments, got {got}")]
  Arity {
    op: String,
    expected: &'static str,
    got: usize,
  },
  #[error("malformed expression: {0}")]
  Malformed(String),
  #[error("layer `{layer}`: unknown property `{property}`")]
  UnknownProperty { layer: String, property: String },
  #[error("layer `{layer}`: {reason}")]
  InvalidLayer { layer: String, reason: String },
  #[error("duplicate layer id `{0}`")]
  DuplicateLayer(String),
}

/// Runtime failure while evaluating a compiled expression.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
  #[error("expected {expected}, found {found}")]
  Type {
    expected: &'static str,
    found: String,
  },
  #[error("no matching branch")]
  NoMatch,
}

/// Tile or metadata fetch failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
  #[error("request cancelled")]
  Cancelled,
  #[error("provider dropped the request")]
  Disconnected,
  #[error("fetch failed: {0}")]
  Provider(String),
}

/// Tile bytes that cannot be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
  #[error("invalid tile json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("invalid geometry in layer `{layer}`: {reason}")]
  Geometry { layer: String, reason: String },
}

/// Per-cell failure; the walker drops the cell and keeps traversing.
#[derive(Debug, Error)]
pub enum FlakeError {
  #[error("elevation unavailable for {0}")]
  ElevationUnavailable(Area),
  #[error("tile {area} could not be decoded: {source}")]
  Decode {
    area: Area,
    #[source]
    source: DecodeError,
  },
}
