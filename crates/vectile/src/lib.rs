//! vectile - Adaptive level-of-detail walker for spherical vector-tile maps
//!
//! Decides each frame which tiles of a spherical quadtree to draw for the
//! current camera, and keeps style evaluation incremental so a moving
//! camera only pays for what changed.
//!
//! # Features
//!
//! - **Level estimation**: adaptive corner sampling of a cell's ideal
//!   screen-space level, with frustum and horizon culling
//! - **Tile walker**: render / split / drop placement with a ±0.5 level
//!   hysteresis band
//! - **Incremental caches**: per cell, per style layer and per feature;
//!   properties are re-evaluated only when their zoom or feature-state
//!   dependencies change
//! - **Non-blocking fetch**: cancellable tile requests under a shared
//!   outstanding-request budget
//!
//! # Example
//!
//! ```ignore
//! use vectile::{Camera, LodCalculator, MemoryProvider, JsonTileDecoder, Style};
//! use vectile::{TileSource, TileWalker, TraverseContext, WalkerConfig, FeatureStateStore};
//!
//! let config = WalkerConfig::default();
//! let style = Style::from_json(STYLE_JSON)?;
//! let mut walker = TileWalker::new(
//!     TileSource::new("osm", provider, JsonTileDecoder),
//!     config.clone(),
//! );
//! let states = FeatureStateStore::new();
//!
//! // Every frame:
//! let view = camera.frame_view(&config).expect("valid camera");
//! let estimator = LodCalculator::with_config(&view, config.lod);
//! let mut ctx = TraverseContext::for_view(&view, &estimator, &states);
//! walker.run(&style, &mut ctx);
//! renderer.draw(ctx.take_primitives());
//! ```

pub mod area;
pub mod camera;
pub mod config;
pub mod constants;
pub mod error;
pub mod feature_state;
pub mod geom;

// Ideal-level estimation
pub mod lod;
pub use lod::{LevelEstimator, LodCalculator, LodRange};

// Style documents and compiled bindings
pub mod style;
pub use style::{Binding, LayerKind, Style, StyleLayer};

// Tile data, providers and the request budget
pub mod tile;
pub use tile::{
  JsonTileDecoder, MemoryProvider, RequestBudget, SourceMeta, ThreadedProvider, TileDecoder,
  TileProvider,
};

// Incremental evaluation caches
pub mod cache;
pub use cache::{EvaluationSummary, Primitive, PrimitivePayload, RenderStage};

// Quadtree traversal
pub mod walker;
pub use walker::{TileSource, TileWalker, TraverseContext, TraverseStats};

pub use area::Area;
pub use camera::{Camera, FrameView};
pub use config::{LodConfig, WalkerConfig};
pub use error::{DecodeError, EvalError, FetchError, FlakeError, StyleError};
pub use feature_state::FeatureStateStore;
pub use geom::{HeightRange, Plane};

#[cfg(test)]
mod test_utils;
