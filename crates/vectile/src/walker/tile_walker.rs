//! TileWalker - per-source traversal of the spherical quadtree.
//!
//! # Placement
//!
//! Each visited cell is placed from its ideal-level estimate `L` and the
//! source's level bounds `[zmin, zmax]`. Rules are checked top to bottom:
//!
//! ```text
//!   condition                                   action
//!   ──────────────────────────────────────────  ─────────────────────────────
//!   outside a clip plane                        stop (subtree invisible)
//!   L = none,  z = zmax                         drop
//!   L = none,  z < zmax                         split
//!   z = zmax                                    drop if coarser-dominant or
//!                                               L.lower < z-1, else render
//!   L.upper > z+1                               split
//!   L.lower < z-1  and  L.upper >= z+1          split
//!   L.lower < z-1                               drop
//!   coarser-dominant  (center - z < -0.5)       drop
//!   finer-dominant    (center - z >  0.5)       render each visible child
//!   otherwise                                   render if z >= zmin
//! ```
//!
//! The ±0.5 band around the cell's own level keeps a camera hovering near a
//! level boundary from flipping between a cell and its children each frame.
//!
//! # Soft failures
//!
//! Nothing in a frame is fatal. A cell without elevation data is dropped,
//! a cell whose tile fails to decode is logged and skipped, and every
//! other cell still renders.
//!
//! # Requests
//!
//! Every visited cell settles its finished tile requests before placement,
//! so a cell that is split or dropped after its fetch completes still
//! releases its budget slot.

use std::task::Poll;

use smallvec::SmallVec;
use web_time::Instant;

use super::context::TraverseContext;
use super::flake::{ElevationModel, Flake, UniformElevation};
use crate::area::Area;
use crate::cache::{SourceHandle, TileContext};
use crate::config::WalkerConfig;
use crate::constants::MAX_AREA_LEVEL;
use crate::lod::LodRange;
use crate::style::{Style, StyleLayer};
use crate::tile::{PendingRequest, RequestBudget, SourceMeta, TileDecoder, TileProvider};

/// A named tile source: where tiles come from and how they are decoded.
pub struct TileSource {
  pub name: String,
  pub provider: Box<dyn TileProvider>,
  pub decoder: Box<dyn TileDecoder>,
}

impl TileSource {
  pub fn new(
    name: impl Into<String>,
    provider: impl TileProvider + 'static,
    decoder: impl TileDecoder + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      provider: Box::new(provider),
      decoder: Box::new(decoder),
    }
  }
}

impl std::fmt::Debug for TileSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TileSource").field("name", &self.name).finish_non_exhaustive()
  }
}

/// Metadata fetch state of a source.
enum MetaState {
  Unrequested,
  Pending(PendingRequest<Option<SourceMeta>>),
  Ready(SourceMeta),
  /// No metadata, or the request failed. The source renders nothing.
  Unavailable,
}

/// Why a cell produced nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DropReason {
  /// No estimate and no finer level to try.
  Unresolvable,
  /// Wants a coarser level than splitting can reach.
  TooCoarse,
  /// More than half the cell wants a coarser level.
  CoarserDominant,
  /// The cell is above the source's shallowest level.
  BelowMinLevel,
}

/// Outcome of the placement rules for one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Placement {
  Drop(DropReason),
  Split,
  Render(LodRange),
  RenderChildren,
}

/// Apply the placement rules to a cell at level `z`.
pub(crate) fn place(z: u8, zmin: u8, zmax: u8, estimate: Option<LodRange>) -> Placement {
  let Some(lod) = estimate else {
    return if z >= zmax {
      Placement::Drop(DropReason::Unresolvable)
    } else {
      Placement::Split
    };
  };
  let zi = i32::from(z);

  if z >= zmax {
    return if lod.lower_half_dominant(z) || lod.lower < zi - 1 {
      Placement::Drop(DropReason::CoarserDominant)
    } else {
      Placement::Render(lod)
    };
  }
  if lod.upper > zi + 1 {
    return Placement::Split;
  }
  if lod.lower < zi - 1 {
    return if lod.upper >= zi + 1 {
      Placement::Split
    } else {
      Placement::Drop(DropReason::TooCoarse)
    };
  }
  if lod.lower_half_dominant(z) {
    return Placement::Drop(DropReason::CoarserDominant);
  }
  if lod.upper_half_dominant(z) {
    return Placement::RenderChildren;
  }
  if z >= zmin {
    Placement::Render(lod)
  } else {
    Placement::Drop(DropReason::BelowMinLevel)
  }
}

/// Traversal driver for one tile source.
pub struct TileWalker {
  source: TileSource,
  meta: MetaState,
  root: Flake,
  budget: RequestBudget,
  config: WalkerConfig,
  elevation: Box<dyn ElevationModel>,
  frame: u64,
}

impl TileWalker {
  /// Walker with its own request budget and the configured default heights
  /// as elevation everywhere.
  pub fn new(source: TileSource, config: WalkerConfig) -> Self {
    let elevation = UniformElevation(config.default_heights);
    Self {
      source,
      meta: MetaState::Unrequested,
      root: Flake::new(Area::ROOT, &elevation),
      budget: RequestBudget::default(),
      config,
      elevation: Box::new(elevation),
      frame: 0,
    }
  }

  /// Share `budget` with other walkers.
  pub fn with_budget(mut self, budget: RequestBudget) -> Self {
    self.budget = budget;
    self
  }

  /// Use `elevation` for terrain bounds. Resets the cell tree.
  pub fn with_elevation(mut self, elevation: impl ElevationModel + 'static) -> Self {
    self.root = Flake::new(Area::ROOT, &elevation);
    self.elevation = Box::new(elevation);
    self
  }

  pub fn source_name(&self) -> &str {
    &self.source.name
  }

  /// Source level bounds, once known.
  pub fn meta(&self) -> Option<SourceMeta> {
    match self.meta {
      MetaState::Ready(meta) => Some(meta),
      _ => None,
    }
  }

  /// True when the source reported no metadata or its request failed.
  pub fn is_unavailable(&self) -> bool {
    matches!(self.meta, MetaState::Unavailable)
  }

  pub fn root(&self) -> &Flake {
    &self.root
  }

  pub fn budget(&self) -> &RequestBudget {
    &self.budget
  }

  pub fn config(&self) -> &WalkerConfig {
    &self.config
  }

  /// Frames run so far.
  pub fn frame(&self) -> u64 {
    self.frame
  }

  /// Traverse from the root, appending this source's primitives to `ctx`.
  #[cfg_attr(
    feature = "trace_spans",
    tracing::instrument(skip_all, name = "walker::run", fields(source = %self.source.name))
  )]
  pub fn run(&mut self, style: &Style, ctx: &mut TraverseContext<'_>) {
    let start = Instant::now();
    self.frame += 1;

    let Some(meta) = self.poll_meta() else {
      return;
    };
    let layers: SmallVec<[&StyleLayer; 8]> = style.layers_for_source(&self.source.name).collect();
    if layers.is_empty() {
      return;
    }

    let pass = Pass {
      source: SourceHandle {
        name: &self.source.name,
        provider: self.source.provider.as_ref(),
        decoder: self.source.decoder.as_ref(),
        budget: &self.budget,
      },
      layers: &layers,
      elevation: self.elevation.as_ref(),
      config: &self.config,
      frame: self.frame,
      zmin: meta.min_level.min(MAX_AREA_LEVEL),
      zmax: meta.max_level.min(MAX_AREA_LEVEL),
    };
    pass.visit(&mut self.root, ctx);

    ctx.stats.traverse_us += start.elapsed().as_micros() as u64;
  }

  /// Issue the metadata request on first use and pick up its result.
  fn poll_meta(&mut self) -> Option<SourceMeta> {
    if matches!(self.meta, MetaState::Unrequested) {
      tracing::trace!(source = %self.source.name, "requesting source metadata");
      self.meta = MetaState::Pending(self.source.provider.request_meta());
    }
    if let MetaState::Pending(request) = &self.meta {
      self.meta = match request.poll() {
        Poll::Pending => return None,
        Poll::Ready(Ok(Some(meta))) => {
          tracing::debug!(
            source = %self.source.name,
            min_level = meta.min_level,
            max_level = meta.max_level,
            "source metadata ready"
          );
          MetaState::Ready(meta)
        }
        Poll::Ready(Ok(None)) => {
          tracing::debug!(source = %self.source.name, "source has no metadata");
          MetaState::Unavailable
        }
        Poll::Ready(Err(err)) => {
          tracing::debug!(source = %self.source.name, %err, "source metadata request failed");
          MetaState::Unavailable
        }
      };
    }
    self.meta()
  }

  /// Drop cells not visited within the last `max_age` frames, cancelling
  /// their requests. Returns the number of cells removed.
  pub fn prune(&mut self, max_age: u64) -> usize {
    let removed = self.root.prune_stale(self.frame, max_age);
    if removed > 0 {
      tracing::debug!(source = %self.source.name, removed, "pruned stale cells");
    }
    removed
  }
}

impl std::fmt::Debug for TileWalker {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TileWalker")
      .field("source", &self.source.name)
      .field("meta", &self.meta())
      .field("frame", &self.frame)
      .field("cells", &self.root.count())
      .field("budget", &self.budget)
      .finish()
  }
}

/// One frame's traversal of one source.
struct Pass<'a> {
  source: SourceHandle<'a>,
  layers: &'a [&'a StyleLayer],
  elevation: &'a dyn ElevationModel,
  config: &'a WalkerConfig,
  frame: u64,
  zmin: u8,
  zmax: u8,
}

impl Pass<'_> {
  /// Visit a cell; `false` when it is culled.
  fn enter(&self, flake: &mut Flake, ctx: &mut TraverseContext<'_>) -> bool {
    flake.touch(self.frame);
    ctx.stats.visited += 1;
    if let Err(err) = flake.settle_requests(self.source) {
      tracing::warn!(area = %flake.area(), %err, "tile request settled with an error");
      ctx.stats.failed += 1;
    }
    let culled = flake.is_invisible(
      ctx.clip_planes,
      self.config.default_heights,
      self.config.planet_radius,
    );
    if culled {
      ctx.stats.culled += 1;
    }
    !culled
  }

  fn estimate(&self, flake: &Flake, ctx: &TraverseContext<'_>) -> Option<LodRange> {
    ctx
      .estimator
      .calculate(&flake.area(), flake.bounding_heights(self.config.default_heights))
  }

  fn visit(&self, flake: &mut Flake, ctx: &mut TraverseContext<'_>) {
    if !self.enter(flake, ctx) {
      return;
    }
    let area = flake.area();
    let estimate = self.estimate(flake, ctx);

    match place(area.z, self.zmin, self.zmax, estimate) {
      Placement::Split => match flake.children_mut(self.elevation) {
        Some(children) => {
          for child in children.iter_mut() {
            self.visit(child, ctx);
          }
        }
        None => self.drop_cell(area, DropReason::Unresolvable, ctx),
      },
      Placement::Render(lod) => self.render(flake, lod, ctx),
      Placement::RenderChildren => self.render_children(flake, ctx),
      Placement::Drop(reason) => self.drop_cell(area, reason, ctx),
    }
  }

  /// Render each visible child with its own estimate, without further
  /// placement.
  fn render_children(&self, flake: &mut Flake, ctx: &mut TraverseContext<'_>) {
    let area = flake.area();
    let Some(children) = flake.children_mut(self.elevation) else {
      self.drop_cell(area, DropReason::Unresolvable, ctx);
      return;
    };
    for child in children.iter_mut() {
      if !self.enter(child, ctx) {
        continue;
      }
      if child.area().z < self.zmin {
        self.drop_cell(child.area(), DropReason::BelowMinLevel, ctx);
        continue;
      }
      match self.estimate(child, ctx) {
        Some(lod) => self.render(child, lod, ctx),
        None => self.drop_cell(child.area(), DropReason::Unresolvable, ctx),
      }
    }
  }

  fn drop_cell(&self, area: Area, reason: DropReason, ctx: &mut TraverseContext<'_>) {
    ctx.stats.dropped += 1;
    match reason {
      DropReason::Unresolvable => {
        tracing::debug!(%area, source = self.source.name, "level unresolvable, dropping tile");
      }
      _ => tracing::trace!(%area, ?reason, "dropping tile"),
    }
  }

  /// Collect the primitives of every visible layer of this source.
  fn render(&self, flake: &mut Flake, lod: LodRange, ctx: &mut TraverseContext<'_>) {
    let area = flake.area();
    let cache = match flake.cache_mut() {
      Ok(cache) => cache,
      Err(err) => {
        tracing::debug!(%area, %err, "dropping tile");
        ctx.stats.dropped += 1;
        return;
      }
    };

    let tile = TileContext {
      area,
      zoom: lod.center,
      clip_planes: ctx.clip_planes,
      stage: ctx.stage,
    };
    let mut failed = false;
    for layer in self.layers.iter().filter(|l| l.is_visible_at(lod.center)) {
      match cache.primitives(layer, self.source, &tile, ctx.feature_states) {
        Ok(Some(primitive)) => ctx.primitives.push(primitive),
        Ok(None) => {}
        Err(err) => {
          tracing::warn!(%area, layer = layer.id(), %err, "layer evaluation failed");
          failed = true;
        }
      }
    }

    ctx.stats.rendered += 1;
    if failed {
      ctx.stats.failed += 1;
    }
    ctx.rendered.push(area);
  }
}

#[cfg(test)]
#[path = "tile_walker_test.rs"]
mod tile_walker_test;
