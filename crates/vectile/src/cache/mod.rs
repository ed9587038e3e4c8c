//! Incremental per-cell evaluation caches.
//!
//! ```text
//!   FlakeCache   (cell)            tile fetch state per source
//!     └─ LayerCache  (cell, layer)     layer-zoom values, filter pass-set
//!          ├─ FeatureCache (cell, layer, feature)  feature-dependent values
//!          └─ LayerContent                         per-kind renderables
//! ```
//!
//! Each visit produces an [`EvaluationSummary`]; content updates from it
//! instead of rebuilding.

pub mod content;
pub mod feature_cache;
pub mod flake_cache;
pub mod layer_cache;
pub mod primitive;
pub mod summary;

pub use content::LayerContent;
pub use feature_cache::FeatureCache;
pub use flake_cache::{FlakeCache, SourceHandle, SourceTile, TileContext};
pub use layer_cache::{LayerCache, PropertyLookup};
pub use primitive::{
  CircleInstance, FillMesh, LineStrip, Primitive, PrimitivePayload, RenderStage, SymbolLabel,
};
pub use summary::EvaluationSummary;
