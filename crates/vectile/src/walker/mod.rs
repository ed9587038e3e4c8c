//! Per-source traversal of the spherical tile quadtree.
//!
//! ```text
//!   TileWalker (per source)
//!     ├─ source metadata      level bounds, requested on first run
//!     ├─ RequestBudget        shared outstanding-request counter
//!     └─ Flake tree           materialized cells, each owning a FlakeCache
//!
//!   TraverseContext (per frame)
//!     clip planes, level estimator, feature states  ─► read
//!     primitives, rendered cells, stats             ◄─ written
//! ```
//!
//! All walkers of a frame share one [`TraverseContext`]; primitives come
//! out in walker order, then traversal order within a walker.

pub mod context;
pub mod flake;
pub mod stats;
pub mod tile_walker;

pub use context::TraverseContext;
pub use flake::{ElevationModel, Flake, UniformElevation};
pub use stats::TraverseStats;
pub use tile_walker::{TileSource, TileWalker};
