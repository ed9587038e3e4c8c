//! Mutable per-feature state shared by every cache.
//!
//! State lives here once, keyed by feature id; caches only consult it.
//! Ids written since the last [`FeatureStateStore::end_frame`] are marked
//! modified so that state-dependent properties know to re-evaluate. Every
//! write also bumps a store-wide generation and records it as the id's
//! revision, so a cache that skipped some frames can still tell whether
//! the state it evaluated against is current.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

/// Key-value store of feature state plus the per-frame modified set.
#[derive(Clone, Debug, Default)]
pub struct FeatureStateStore {
  states: HashMap<u64, Map<String, Value>>,
  modified: HashSet<u64>,
  revisions: HashMap<u64, u64>,
  generation: u64,
  /// Generation when the current frame began.
  frame_generation: u64,
}

impl FeatureStateStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Merge `key = value` into the state of `id`.
  pub fn set_state(&mut self, id: u64, key: impl Into<String>, value: Value) {
    let state = self.states.entry(id).or_default();
    let key = key.into();
    if state.get(&key) != Some(&value) {
      state.insert(key, value);
      self.touch(id);
    }
  }

  /// Drop one key, or the whole state when `key` is `None`.
  pub fn remove_state(&mut self, id: u64, key: Option<&str>) {
    let removed = match key {
      Some(key) => self
        .states
        .get_mut(&id)
        .map_or(false, |state| state.remove(key).is_some()),
      None => self.states.remove(&id).is_some(),
    };
    if removed {
      self.touch(id);
    }
  }

  fn touch(&mut self, id: u64) {
    self.generation += 1;
    self.revisions.insert(id, self.generation);
    self.modified.insert(id);
  }

  /// Current state of `id`.
  #[inline]
  pub fn lookup(&self, id: u64) -> Option<&Map<String, Value>> {
    self.states.get(&id)
  }

  /// True when `id` changed since the previous frame.
  #[inline]
  pub fn is_modified(&self, id: u64) -> bool {
    self.modified.contains(&id)
  }

  /// Generation of the last write to `id`; 0 if never written.
  #[inline]
  pub fn revision(&self, id: u64) -> u64 {
    self.revisions.get(&id).copied().unwrap_or(0)
  }

  /// Generation of the last write to any id.
  #[inline]
  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// Ids written after `generation`, if the modified set still holds all
  /// of them. `None` when some of those writes predate the current frame.
  /// May also yield ids written earlier in this frame.
  pub fn modified_since(&self, generation: u64) -> Option<impl Iterator<Item = u64> + '_> {
    (generation >= self.frame_generation).then(|| self.modified.iter().copied())
  }

  /// Close the frame: forget which ids were modified.
  pub fn end_frame(&mut self) {
    self.modified.clear();
    self.frame_generation = self.generation;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_marks_modified_until_end_frame() {
    let mut store = FeatureStateStore::new();
    store.set_state(7, "hover", Value::Bool(true));
    assert!(store.is_modified(7));
    assert_eq!(store.lookup(7).unwrap()["hover"], Value::Bool(true));

    store.end_frame();
    assert!(!store.is_modified(7));
    assert_eq!(store.modified_since(store.generation()).unwrap().count(), 0);
    assert!(store.lookup(7).is_some(), "state survives the frame");
  }

  #[test]
  fn test_unchanged_value_is_not_modified() {
    let mut store = FeatureStateStore::new();
    store.set_state(1, "hover", Value::Bool(true));
    store.end_frame();
    let generation = store.generation();
    store.set_state(1, "hover", Value::Bool(true));
    assert!(!store.is_modified(1));
    assert_eq!(store.generation(), generation);
  }

  #[test]
  fn test_revisions_survive_end_frame() {
    let mut store = FeatureStateStore::new();
    assert_eq!(store.revision(5), 0);
    store.set_state(5, "selected", Value::Bool(true));
    let first = store.revision(5);
    assert!(first > 0);

    store.end_frame();
    store.set_state(6, "selected", Value::Bool(true));
    assert_eq!(store.revision(5), first, "other ids leave the revision alone");

    store.set_state(5, "selected", Value::Bool(false));
    assert!(store.revision(5) > first);
    assert_eq!(store.generation(), store.revision(5));
  }

  #[test]
  fn test_modified_since_covers_current_frame() {
    let mut store = FeatureStateStore::new();
    store.set_state(1, "a", Value::from(1));
    store.end_frame();
    let seen = store.generation();

    store.set_state(2, "a", Value::from(1));
    let ids: Vec<u64> = store.modified_since(seen).unwrap().collect();
    assert_eq!(ids, vec![2]);

    store.end_frame();
    store.set_state(3, "a", Value::from(1));
    assert!(store.modified_since(seen).is_none(), "write to 2 is no longer tracked");
  }

  #[test]
  fn test_remove_state() {
    let mut store = FeatureStateStore::new();
    store.set_state(3, "a", Value::from(1));
    store.set_state(3, "b", Value::from(2));
    store.end_frame();

    store.remove_state(3, Some("a"));
    assert!(store.is_modified(3));
    assert!(store.lookup(3).unwrap().get("a").is_none());

    store.end_frame();
    store.remove_state(3, None);
    assert!(store.is_modified(3));
    assert!(store.lookup(3).is_none());

    store.end_frame();
    store.remove_state(99, None);
    assert!(!store.is_modified(99));
  }
}
