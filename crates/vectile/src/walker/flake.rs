//! Flake - one materialized node of the spherical tile quadtree.
//!
//! Children are created on first descent and kept across frames together
//! with the flake's [`FlakeCache`], so revisiting a cell reuses its fetched
//! tile and evaluated properties. [`Flake::prune_stale`] discards subtrees
//! that have not been visited for a while.

use crate::area::Area;
use crate::cache::{FlakeCache, SourceHandle};
use crate::error::FlakeError;
use crate::geom::{HeightRange, Plane, RegionBounds};

/// Source of terrain elevation bounds per cell.
///
/// `None` means the bounds are not available; such a cell is still culled
/// and estimated with the configured default range but is never rendered.
pub trait ElevationModel {
  fn height_range(&self, area: &Area) -> Option<HeightRange>;
}

/// The same height range everywhere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformElevation(pub HeightRange);

impl ElevationModel for UniformElevation {
  fn height_range(&self, _area: &Area) -> Option<HeightRange> {
    Some(self.0)
  }
}

impl<F> ElevationModel for F
where
  F: Fn(&Area) -> Option<HeightRange>,
{
  fn height_range(&self, area: &Area) -> Option<HeightRange> {
    self(area)
  }
}

/// Materialized quadtree cell.
#[derive(Debug)]
pub struct Flake {
  area: Area,
  heights: Option<HeightRange>,
  children: Option<Box<[Flake; 4]>>,
  cache: Option<FlakeCache>,
  last_visited: u64,
}

impl Flake {
  pub fn new(area: Area, elevation: &dyn ElevationModel) -> Self {
    Self {
      area,
      heights: elevation.height_range(&area),
      children: None,
      cache: None,
      last_visited: 0,
    }
  }

  #[inline]
  pub fn area(&self) -> Area {
    self.area
  }

  /// Known terrain bounds.
  #[inline]
  pub fn heights(&self) -> Option<HeightRange> {
    self.heights
  }

  /// Terrain bounds for culling and estimation, `default` when unknown.
  #[inline]
  pub fn bounding_heights(&self, default: HeightRange) -> HeightRange {
    self.heights.unwrap_or(default)
  }

  /// True when the cell lies entirely outside one of `planes`.
  pub fn is_invisible(&self, planes: &[Plane], default: HeightRange, planet_radius: f64) -> bool {
    RegionBounds::new(&self.area, self.bounding_heights(default), planet_radius).is_outside(planes)
  }

  pub fn touch(&mut self, frame: u64) {
    self.last_visited = frame;
  }

  #[inline]
  pub fn last_visited(&self) -> u64 {
    self.last_visited
  }

  /// The four children, created on first call. `None` at the deepest level.
  pub fn children_mut(&mut self, elevation: &dyn ElevationModel) -> Option<&mut [Flake; 4]> {
    if self.children.is_none() {
      let areas = self.area.children()?;
      self.children = Some(Box::new(areas.map(|area| Flake::new(area, elevation))));
    }
    self.children.as_deref_mut()
  }

  pub fn children(&self) -> Option<&[Flake; 4]> {
    self.children.as_deref()
  }

  pub fn cache(&self) -> Option<&FlakeCache> {
    self.cache.as_ref()
  }

  /// This cell's cache, created on first render.
  ///
  /// Fails when the cell's elevation is unavailable.
  pub fn cache_mut(&mut self) -> Result<&mut FlakeCache, FlakeError> {
    if self.heights.is_none() {
      return Err(FlakeError::ElevationUnavailable(self.area));
    }
    let area = self.area;
    Ok(self.cache.get_or_insert_with(|| FlakeCache::new(area)))
  }

  /// Pick up settled tile requests of `source`, if this cell has a cache.
  pub fn settle_requests(&mut self, source: SourceHandle<'_>) -> Result<(), FlakeError> {
    match self.cache.as_mut() {
      Some(cache) => cache.settle(source),
      None => Ok(()),
    }
  }

  /// Drop caches and subtrees not visited within `max_age` frames of
  /// `frame`. The flake itself is kept. Returns the number of flakes
  /// removed.
  pub fn prune_stale(&mut self, frame: u64, max_age: u64) -> usize {
    let stale = |f: &Flake| frame.saturating_sub(f.last_visited) > max_age;

    if stale(self) {
      // Dropping the cache cancels its requests.
      self.cache = None;
    }

    let Some(children) = self.children.as_deref_mut() else {
      return 0;
    };
    // A visit to any descendant also visits every ancestor, so a stale
    // child has a stale subtree.
    if children.iter().all(|c| stale(c)) {
      let removed = children.iter().map(Flake::count).sum();
      self.children = None;
      return removed;
    }
    children.iter_mut().map(|c| c.prune_stale(frame, max_age)).sum()
  }

  /// Flakes in this subtree, including this one.
  pub fn count(&self) -> usize {
    1 + self
      .children
      .as_deref()
      .map_or(0, |children| children.iter().map(Flake::count).sum())
  }

  /// Flakes in this subtree holding a cache.
  pub fn cached_count(&self) -> usize {
    usize::from(self.cache.is_some())
      + self
        .children
        .as_deref()
        .map_or(0, |children| children.iter().map(Flake::cached_count).sum())
  }
}
