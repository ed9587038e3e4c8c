//! Tile data, decoding and asynchronous fetching.
//!
//! # Module Structure
//!
//! - [`feature`]: decoded features, layers and tiles
//! - [`decoder`]: `TileDecoder` seam and the JSON decoder
//! - [`request`]: cancellable `PendingRequest` / `Responder` pairs
//! - [`provider`]: `TileProvider` seam, threaded and in-memory providers
//! - [`budget`]: outstanding request budget with RAII slots

pub mod budget;
pub mod decoder;
pub mod feature;
pub mod provider;
pub mod request;

pub use budget::{RequestBudget, RequestSlot};
pub use decoder::{JsonTileDecoder, TileDecoder};
pub use feature::{DecodedTile, Geometry, GeometryType, TileFeature, TileLayer};
pub use provider::{FetchFn, MemoryProvider, SourceMeta, ThreadedProvider, TileProvider};
pub use request::{CancelToken, PendingRequest, Responder};
