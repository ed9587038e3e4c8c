//! Per-cell cache: tile fetch state per source and one layer cache per
//! style layer.
//!
//! # Source States
//!
//! ```text
//!                 budget slot
//!   (absent) ─────────────────► Requested ──┬─► Existence(Some(tile))
//!      │  no slot: retry next frame         ├─► Existence(None)   no tile here
//!      ▼                                    ├─► Failed            fetch/decode error
//!   (absent)                                └─► Cancelled
//! ```
//!
//! Terminal states are kept for the cache's lifetime; a failed fetch is
//! not retried until the cell is pruned and rebuilt. The budget slot lives
//! inside `Requested`, so it is released exactly once whichever way the
//! request ends, including when the cache is dropped. The walker settles
//! requests on every visit of a cell, not only when it renders it.

use std::collections::HashMap;
use std::task::Poll;

use super::layer_cache::LayerCache;
use super::primitive::{Primitive, RenderStage};
use crate::area::Area;
use crate::error::{FetchError, FlakeError};
use crate::feature_state::FeatureStateStore;
use crate::geom::Plane;
use crate::style::{EvalContext, StyleLayer};
use crate::tile::{DecodedTile, PendingRequest, RequestBudget, RequestSlot, TileDecoder, TileProvider};

/// Per-cell evaluation context built by the walker for a rendered cell.
#[derive(Clone, Copy, Debug)]
pub struct TileContext<'a> {
  pub area: Area,
  /// Continuous zoom: the level estimate's center.
  pub zoom: f64,
  pub clip_planes: &'a [Plane],
  pub stage: RenderStage,
}

impl TileContext<'_> {
  pub fn eval_context(&self) -> EvalContext {
    EvalContext::new(self.zoom)
  }
}

/// What a flake cache needs to fetch and decode one source's tiles.
#[derive(Clone, Copy)]
pub struct SourceHandle<'a> {
  pub name: &'a str,
  pub provider: &'a dyn TileProvider,
  pub decoder: &'a dyn TileDecoder,
  pub budget: &'a RequestBudget,
}

/// Fetch state of one source in one cell.
pub enum SourceTile {
  Requested {
    request: PendingRequest<Option<Vec<u8>>>,
    _slot: RequestSlot,
  },
  Cancelled,
  /// Fetched; `None` when the source has no tile at this cell.
  Existence(Option<DecodedTile>),
  Failed,
}

impl SourceTile {
  pub fn is_pending(&self) -> bool {
    matches!(self, Self::Requested { .. })
  }
}

impl std::fmt::Debug for SourceTile {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Requested { .. } => f.write_str("Requested"),
      Self::Cancelled => f.write_str("Cancelled"),
      Self::Existence(tile) => f
        .debug_tuple("Existence")
        .field(&tile.as_ref().map(DecodedTile::len))
        .finish(),
      Self::Failed => f.write_str("Failed"),
    }
  }
}

/// Cache owned by one rendered cell.
#[derive(Debug)]
pub struct FlakeCache {
  area: Area,
  sources: HashMap<String, SourceTile>,
  layers: HashMap<String, LayerCache>,
}

impl FlakeCache {
  pub fn new(area: Area) -> Self {
    Self {
      area,
      sources: HashMap::new(),
      layers: HashMap::new(),
    }
  }

  #[inline]
  pub fn area(&self) -> Area {
    self.area
  }

  /// Fetch state of `source`, if a request was ever made.
  pub fn source_state(&self, source: &str) -> Option<&SourceTile> {
    self.sources.get(source)
  }

  pub fn layer_cache(&self, layer_id: &str) -> Option<&LayerCache> {
    self.layers.get(layer_id)
  }

  /// Renderables of `layer` in this cell. Never blocks: without tile data
  /// the result is empty for this frame.
  pub fn primitives(
    &mut self,
    layer: &StyleLayer,
    source: SourceHandle<'_>,
    ctx: &TileContext<'_>,
    states: &FeatureStateStore,
  ) -> Result<Option<Primitive>, FlakeError> {
    self.advance_source(source)?;

    let Some(SourceTile::Existence(Some(tile))) = self.sources.get(source.name) else {
      return Ok(None);
    };
    let Some(tile_layer) = tile.layer(layer.source_layer()) else {
      return Ok(None);
    };

    let eval_ctx = ctx.eval_context();
    let cache = match self.layers.entry(layer.id().to_string()) {
      std::collections::hash_map::Entry::Occupied(entry) => {
        let cache = entry.into_mut();
        cache.evaluate_features(layer, tile_layer, &eval_ctx, states);
        cache
      }
      std::collections::hash_map::Entry::Vacant(entry) => {
        entry.insert(LayerCache::new(layer, tile_layer, &eval_ctx, states))
      }
    };
    Ok(cache.primitive(layer, self.area, ctx.stage, tile_layer.extent))
  }

  /// Issue the request for `source` if none exists, then settle it.
  fn advance_source(&mut self, source: SourceHandle<'_>) -> Result<(), FlakeError> {
    if !self.sources.contains_key(source.name) {
      let Some(slot) = source.budget.try_acquire() else {
        tracing::trace!(area = %self.area, source = source.name, "request budget exhausted, deferring");
        return Ok(());
      };
      tracing::trace!(area = %self.area, source = source.name, "requesting tile");
      let request = source.provider.request_tile(self.area);
      self.sources.insert(
        source.name.to_string(),
        SourceTile::Requested { request, _slot: slot },
      );
    }

    self.settle(source)
  }

  /// Apply the result of `source`'s request once it has settled, releasing
  /// its budget slot. Never issues a request, so cells that are visited
  /// but not rendered still give their slots back.
  pub fn settle(&mut self, source: SourceHandle<'_>) -> Result<(), FlakeError> {
    let Some(SourceTile::Requested { request, .. }) = self.sources.get(source.name) else {
      return Ok(());
    };
    let outcome = match request.poll() {
      Poll::Pending => return Ok(()),
      Poll::Ready(outcome) => outcome,
    };

    let (next, result) = match outcome {
      Ok(Some(bytes)) => match source.decoder.decode(&bytes) {
        Ok(tile) => (SourceTile::Existence(Some(tile)), Ok(())),
        Err(source_err) => (
          SourceTile::Failed,
          Err(FlakeError::Decode {
            area: self.area,
            source: source_err,
          }),
        ),
      },
      Ok(None) => (SourceTile::Existence(None), Ok(())),
      Err(FetchError::Cancelled) => {
        tracing::debug!(area = %self.area, source = source.name, "tile request cancelled");
        (SourceTile::Cancelled, Ok(()))
      }
      Err(err) => {
        tracing::debug!(area = %self.area, source = source.name, %err, "tile request failed");
        (SourceTile::Failed, Ok(()))
      }
    };
    // Replacing `Requested` drops its budget slot.
    self.sources.insert(source.name.to_string(), next);
    result
  }

  /// Cancel every in-flight request. Idempotent.
  pub fn cancel_requests(&mut self) {
    for (name, state) in self.sources.iter_mut() {
      if let SourceTile::Requested { request, .. } = state {
        request.cancel();
        tracing::trace!(area = %self.area, source = %name, "tile request cancelled");
        *state = SourceTile::Cancelled;
      }
    }
  }

  /// Requests still in flight.
  pub fn pending_requests(&self) -> usize {
    self.sources.values().filter(|s| s.is_pending()).count()
  }
}

impl Drop for FlakeCache {
  fn drop(&mut self) {
    self.cancel_requests();
  }
}

#[cfg(test)]
#[path = "flake_cache_test.rs"]
mod flake_cache_test;
