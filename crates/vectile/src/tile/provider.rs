//! Tile and metadata providers.
//!
//! A provider answers two kinds of request, both asynchronously:
//!
//! - [`TileProvider::request_meta`]: the source's level bounds, or `None`
//!   when the source does not exist.
//! - [`TileProvider::request_tile`]: the encoded bytes of one tile, or
//!   `None` when the source has no tile at that area.
//!
//! [`ThreadedProvider`] runs a blocking fetch closure on rayon's pool, the
//! same `rayon::spawn` model used for background work elsewhere. That works
//! natively and on wasm targets that ship a rayon pool.
//! [`MemoryProvider`] answers from an in-memory map and resolves immediately.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::request::PendingRequest;
use crate::area::Area;
use crate::error::FetchError;

/// Level bounds declared by a tile source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceMeta {
  /// Coarsest level the source serves.
  pub min_level: u8,
  /// Finest level the source serves.
  pub max_level: u8,
}

impl SourceMeta {
  /// Bounds, swapped if given in reverse order.
  pub fn new(min_level: u8, max_level: u8) -> Self {
    Self {
      min_level: min_level.min(max_level),
      max_level: min_level.max(max_level),
    }
  }
}

/// Asynchronous source of tile bytes.
pub trait TileProvider {
  /// Request the source's level bounds.
  fn request_meta(&self) -> PendingRequest<Option<SourceMeta>>;

  /// Request the encoded tile at `area`.
  fn request_tile(&self, area: Area) -> PendingRequest<Option<Vec<u8>>>;
}

impl<P: TileProvider + ?Sized> TileProvider for Rc<P> {
  fn request_meta(&self) -> PendingRequest<Option<SourceMeta>> {
    (**self).request_meta()
  }

  fn request_tile(&self, area: Area) -> PendingRequest<Option<Vec<u8>>> {
    (**self).request_tile(area)
  }
}

/// Blocking fetch function run on a worker thread.
pub type FetchFn = dyn Fn(Area) -> Result<Option<Vec<u8>>, FetchError> + Send + Sync;

/// Provider running a blocking fetch closure on rayon's thread pool.
#[derive(Clone)]
pub struct ThreadedProvider {
  meta: Option<SourceMeta>,
  fetch: Arc<FetchFn>,
  in_flight: Arc<AtomicUsize>,
}

impl ThreadedProvider {
  /// Provider for a source with known bounds.
  pub fn new<F>(meta: Option<SourceMeta>, fetch: F) -> Self
  where
    F: Fn(Area) -> Result<Option<Vec<u8>>, FetchError> + Send + Sync + 'static,
  {
    Self {
      meta,
      fetch: Arc::new(fetch),
      in_flight: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// Fetches queued or running on the pool.
  pub fn pending_count(&self) -> usize {
    self.in_flight.load(Ordering::Acquire)
  }

  /// Worker threads in rayon's pool.
  pub fn num_threads(&self) -> usize {
    rayon::current_num_threads()
  }
}

impl TileProvider for ThreadedProvider {
  fn request_meta(&self) -> PendingRequest<Option<SourceMeta>> {
    PendingRequest::ready(Ok(self.meta))
  }

  fn request_tile(&self, area: Area) -> PendingRequest<Option<Vec<u8>>> {
    let (request, responder) = PendingRequest::channel();
    let fetch = Arc::clone(&self.fetch);
    let in_flight = Arc::clone(&self.in_flight);
    in_flight.fetch_add(1, Ordering::AcqRel);

    rayon::spawn(move || {
      // Skip the fetch entirely if the cell went away while queued.
      if !responder.is_cancelled() {
        let result = fetch(area);
        responder.respond(result);
      }
      in_flight.fetch_sub(1, Ordering::AcqRel);
    });

    request
  }
}

impl std::fmt::Debug for ThreadedProvider {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ThreadedProvider")
      .field("meta", &self.meta)
      .field("pending", &self.pending_count())
      .finish()
  }
}

/// Provider serving tiles from memory; every request resolves immediately.
#[derive(Clone, Debug, Default)]
pub struct MemoryProvider {
  meta: Option<SourceMeta>,
  tiles: HashMap<Area, Vec<u8>>,
}

impl MemoryProvider {
  /// Empty provider with the given bounds.
  pub fn new(meta: SourceMeta) -> Self {
    Self {
      meta: Some(meta),
      tiles: HashMap::new(),
    }
  }

  /// Store the encoded tile for `area`.
  pub fn insert(&mut self, area: Area, bytes: impl Into<Vec<u8>>) {
    self.tiles.insert(area, bytes.into());
  }

  /// Builder form of [`MemoryProvider::insert`].
  pub fn with_tile(mut self, area: Area, bytes: impl Into<Vec<u8>>) -> Self {
    self.insert(area, bytes);
    self
  }
}

impl TileProvider for MemoryProvider {
  fn request_meta(&self) -> PendingRequest<Option<SourceMeta>> {
    PendingRequest::ready(Ok(self.meta))
  }

  fn request_tile(&self, area: Area) -> PendingRequest<Option<Vec<u8>>> {
    PendingRequest::ready(Ok(self.tiles.get(&area).cloned()))
  }
}

#[cfg(test)]
mod tests {
  use std::task::Poll;
  use std::time::Duration;

  use super::*;

  fn wait<T>(request: &PendingRequest<T>) -> Result<T, FetchError> {
    for _ in 0..2000 {
      if let Poll::Ready(result) = request.poll() {
        return result;
      }
      std::thread::sleep(Duration::from_millis(1));
    }
    panic!("request did not resolve");
  }

  #[test]
  fn test_threaded_fetch_resolves() {
    let provider = ThreadedProvider::new(Some(SourceMeta::new(0, 4)), |area: Area| {
      Ok(Some(vec![area.z, area.x as u8, area.y as u8]))
    });
    let request = provider.request_tile(Area::new(2, 1, 3).unwrap());
    assert_eq!(wait(&request), Ok(Some(vec![2, 1, 3])));
  }

  #[test]
  fn test_threaded_fetch_error() {
    let provider = ThreadedProvider::new(None, |_area: Area| Err(FetchError::Provider("offline".into())));
    let request = provider.request_tile(Area::ROOT);
    assert_eq!(wait(&request), Err(FetchError::Provider("offline".into())));
    assert_eq!(wait(&provider.request_meta()), Ok(None));
  }

  #[test]
  fn test_threaded_many_requests() {
    let provider = ThreadedProvider::new(Some(SourceMeta::new(0, 8)), |area: Area| Ok(Some(vec![area.z])));
    let requests: Vec<_> = (0..16)
      .map(|i| provider.request_tile(Area::new(4, i, 0).unwrap()))
      .collect();
    for request in &requests {
      assert_eq!(wait(request), Ok(Some(vec![4])));
    }
  }

  #[test]
  fn test_memory_provider() {
    let area = Area::new(1, 0, 1).unwrap();
    let provider = MemoryProvider::new(SourceMeta::new(3, 1)).with_tile(area, b"abc".to_vec());
    assert_eq!(
      provider.request_meta().poll(),
      Poll::Ready(Ok(Some(SourceMeta {
        min_level: 1,
        max_level: 3
      })))
    );
    assert_eq!(provider.request_tile(area).poll(), Poll::Ready(Ok(Some(b"abc".to_vec()))));
    assert_eq!(provider.request_tile(Area::ROOT).poll(), Poll::Ready(Ok(None)));
  }
}
