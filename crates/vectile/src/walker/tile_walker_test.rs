use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::DVec3;
use serde_json::json;

use super::*;
use crate::feature_state::FeatureStateStore;
use crate::geom::{HeightRange, Plane};
use crate::lod::LevelEstimator;
use crate::test_utils::{json_tile, range, ManualProvider, ScriptedEstimator};
use crate::tile::{JsonTileDecoder, MemoryProvider, Responder};
use crate::walker::TraverseContext;

const STYLE: &str = r#"{
  "sources": {"osm": {"type": "vector"}},
  "layers": [{"id": "poi", "type": "circle", "source": "osm"}]
}"#;

fn style() -> Style {
  Style::from_json(STYLE).unwrap()
}

fn config() -> WalkerConfig {
  WalkerConfig {
    default_heights: HeightRange::FLAT,
    ..Default::default()
  }
}

fn walker(provider: impl TileProvider + 'static) -> TileWalker {
  TileWalker::new(TileSource::new("osm", provider, JsonTileDecoder), config())
}

fn target() -> Area {
  Area::new(2, 1, 1).unwrap()
}

fn poi_tile() -> Vec<u8> {
  json_tile(
    "poi",
    json!([{"id": 1, "geometry": {"type": "Point", "coordinates": [[100, 100]]}}]),
  )
}

/// Run one frame without clip planes.
fn frame<'a>(
  walker: &mut TileWalker,
  style: &Style,
  estimator: &'a dyn LevelEstimator,
  states: &'a FeatureStateStore,
) -> TraverseContext<'a> {
  let mut ctx = TraverseContext::new(&[], estimator, states);
  walker.run(style, &mut ctx);
  ctx
}

/// Every cell at or above level 1 wants level 1.
fn level_one(area: &Area) -> Option<LodRange> {
  (area.z <= 1).then_some(range(1, 1, 1.0))
}

// =============================================================================
// Placement rules
// =============================================================================

/// Each row of the placement table, checked in order.
#[test]
fn test_place_rules() {
  use DropReason::*;
  use Placement::*;

  let cases = [
    (4, None, Drop(Unresolvable)),
    (2, None, Split),
    (4, Some(range(3, 4, 3.4)), Drop(CoarserDominant)),
    (4, Some(range(2, 4, 3.6)), Drop(CoarserDominant)),
    (4, Some(range(4, 5, 4.2)), Render(range(4, 5, 4.2))),
    (2, Some(range(2, 4, 3.0)), Split),
    (3, Some(range(1, 4, 2.5)), Split),
    (3, Some(range(1, 3, 2.0)), Drop(TooCoarse)),
    (2, Some(range(1, 2, 1.4)), Drop(CoarserDominant)),
    (2, Some(range(2, 3, 2.6)), RenderChildren),
    (2, Some(range(2, 3, 2.5)), Render(range(2, 3, 2.5))),
    (2, Some(range(1, 2, 1.5)), Render(range(1, 2, 1.5))),
  ];
  for (z, estimate, expected) in cases {
    assert_eq!(place(z, 0, 4, estimate), expected, "z={} {:?}", z, estimate);
  }

  assert_eq!(
    place(2, 3, 4, Some(range(2, 2, 2.0))),
    Drop(BelowMinLevel)
  );
}

// =============================================================================
// Scenarios
// =============================================================================

/// A camera above (2,1,1) renders that cell and nothing else.
#[test]
fn test_renders_only_the_ideal_cell() {
  let provider = MemoryProvider::new(SourceMeta::new(0, 4)).with_tile(target(), poi_tile());
  let mut walker = walker(provider);
  let estimator =
    ScriptedEstimator::new(|a: &Area| a.contains(&target()).then_some(range(2, 2, 2.0)));
  let states = FeatureStateStore::new();

  let ctx = frame(&mut walker, &style(), &estimator, &states);

  assert_eq!(ctx.rendered, vec![target()]);
  assert_eq!(ctx.stats.rendered, 1);
  assert_eq!(ctx.primitives.len(), 1);
  assert_eq!(ctx.primitives[0].area, target());
  assert!(
    !estimator
      .calls()
      .iter()
      .any(|a| a.z > target().z && target().contains(a)),
    "descendants of the rendered cell are never estimated"
  );
}

/// Pulled back far enough, only the root renders.
#[test]
fn test_pulled_back_renders_root() {
  let mut walker = walker(MemoryProvider::new(SourceMeta::new(0, 4)));
  let estimator = ScriptedEstimator::new(|a: &Area| (a.z == 0).then_some(range(0, 0, 0.2)));
  let states = FeatureStateStore::new();

  let ctx = frame(&mut walker, &style(), &estimator, &states);

  assert_eq!(ctx.rendered, vec![Area::ROOT]);
  assert_eq!(estimator.calls(), vec![Area::ROOT]);
  assert_eq!(ctx.stats.visited, 1);
}

/// Oscillating within ±0.4 of the cell's level never leaves the cell.
#[test]
fn test_hovering_keeps_the_cell() {
  let center = Cell::new(2.0);
  let estimator = ScriptedEstimator::new(|a: &Area| {
    (a.contains(&target()) || target().contains(a)).then_some(range(1, 3, center.get()))
  });
  let mut walker = walker(MemoryProvider::new(SourceMeta::new(0, 3)));
  let states = FeatureStateStore::new();
  let style = style();

  for c in [1.6, 2.4, 1.7, 2.3, 1.9, 2.2] {
    center.set(c);
    let ctx = frame(&mut walker, &style, &estimator, &states);
    assert_eq!(ctx.rendered, vec![target()], "center {}", c);
  }
}

/// A trajectory crossing `z + 0.5` once switches to the children once.
#[test]
fn test_hysteresis_switches_once() {
  let center = Cell::new(2.0);
  let estimator = ScriptedEstimator::new(|a: &Area| {
    (a.contains(&target()) || target().contains(a)).then_some(range(2, 3, center.get()))
  });
  let mut walker = walker(MemoryProvider::new(SourceMeta::new(0, 3)));
  let states = FeatureStateStore::new();
  let style = style();
  let children: Vec<Area> = target().children().unwrap().to_vec();

  let mut modes = Vec::new();
  for c in [2.1, 2.4, 2.3, 2.45, 2.6, 2.55, 2.7] {
    center.set(c);
    let ctx = frame(&mut walker, &style, &estimator, &states);
    if ctx.rendered == vec![target()] {
      modes.push("cell");
    } else {
      assert_eq!(ctx.rendered, children, "center {}", c);
      modes.push("children");
    }
  }

  assert_eq!(modes, ["cell", "cell", "cell", "cell", "children", "children", "children"]);
  let switches = modes.windows(2).filter(|w| w[0] != w[1]).count();
  assert_eq!(switches, 1);
}

/// Cells outside a clip plane are never estimated or descended into.
#[test]
fn test_invisible_cells_are_skipped() {
  // Keeps only the x > 1000 m half of the planet.
  let planes = [Plane::new(DVec3::X, -1000.0).unwrap()];
  let estimator = ScriptedEstimator::new(|a: &Area| {
    let z = i32::from(a.z) + 2;
    Some(range(z, z, f64::from(z)))
  });
  let mut walker = walker(MemoryProvider::new(SourceMeta::new(0, 3)));
  let states = FeatureStateStore::new();

  let mut ctx = TraverseContext::new(&planes, &estimator, &states);
  walker.run(&style(), &mut ctx);

  let in_hidden_quadrant = |a: &Area| a.z >= 2 && matches!(a.x >> (a.z - 2), 0 | 3);
  assert!(!estimator.calls().iter().any(in_hidden_quadrant));
  assert!(!ctx.rendered.iter().any(in_hidden_quadrant));
  assert_eq!(ctx.stats.culled, 8);
  assert_eq!(ctx.rendered.len(), 32);
  assert!(ctx.rendered.iter().all(|a| a.z == 3));
}

// =============================================================================
// Source metadata
// =============================================================================

/// Provider whose metadata arrives when the test says so.
#[derive(Default)]
struct DeferredMeta {
  responder: RefCell<Option<Responder<Option<SourceMeta>>>>,
}

impl TileProvider for DeferredMeta {
  fn request_meta(&self) -> PendingRequest<Option<SourceMeta>> {
    let (request, responder) = PendingRequest::channel();
    *self.responder.borrow_mut() = Some(responder);
    request
  }

  fn request_tile(&self, _area: Area) -> PendingRequest<Option<Vec<u8>>> {
    PendingRequest::ready(Ok(None))
  }
}

/// Nothing renders until the metadata resolves.
#[test]
fn test_waits_for_metadata() {
  let provider = Rc::new(DeferredMeta::default());
  let mut walker = walker(Rc::clone(&provider));
  let estimator = ScriptedEstimator::new(|a: &Area| (a.z == 0).then_some(range(0, 0, 0.0)));
  let states = FeatureStateStore::new();
  let style = style();

  let ctx = frame(&mut walker, &style, &estimator, &states);
  assert!(ctx.rendered.is_empty());
  assert_eq!(ctx.stats.visited, 0);
  assert!(walker.meta().is_none() && !walker.is_unavailable());

  let responder = provider.responder.borrow_mut().take().unwrap();
  responder.respond(Ok(Some(SourceMeta::new(0, 6))));

  let ctx = frame(&mut walker, &style, &estimator, &states);
  assert_eq!(ctx.rendered, vec![Area::ROOT]);
  assert_eq!(walker.meta(), Some(SourceMeta::new(0, 6)));
}

/// A source without metadata never renders.
#[test]
fn test_unavailable_source() {
  let mut walker = walker(ManualProvider::default());
  let estimator = ScriptedEstimator::new(|_: &Area| Some(range(0, 0, 0.0)));
  let states = FeatureStateStore::new();

  for _ in 0..3 {
    let ctx = frame(&mut walker, &style(), &estimator, &states);
    assert!(ctx.rendered.is_empty());
  }
  assert!(walker.is_unavailable());
  assert!(estimator.calls().is_empty());
}

// =============================================================================
// Soft failures
// =============================================================================

/// One undecodable tile does not keep the other cells from rendering.
#[test]
fn test_decode_failure_is_scoped_to_its_cell() {
  let broken = Area::new(1, 0, 0).unwrap();
  let mut provider = MemoryProvider::new(SourceMeta::new(0, 4)).with_tile(broken, b"{oops".to_vec());
  for area in Area::ROOT.children().unwrap().into_iter().skip(1) {
    provider.insert(area, poi_tile());
  }
  let mut walker = walker(provider);
  let estimator = ScriptedEstimator::new(level_one);
  let states = FeatureStateStore::new();

  let ctx = frame(&mut walker, &style(), &estimator, &states);

  assert_eq!(ctx.rendered.len(), 4);
  assert_eq!(ctx.stats.failed, 1);
  assert_eq!(ctx.primitives.len(), 3);
  assert!(ctx.primitives.iter().all(|p| p.area != broken));
}

/// A cell without elevation data is dropped quietly.
#[test]
fn test_missing_elevation_drops_cell() {
  let missing = Area::new(1, 0, 0).unwrap();
  let mut walker = walker(MemoryProvider::new(SourceMeta::new(0, 4)))
    .with_elevation(move |a: &Area| (*a != missing).then_some(HeightRange::FLAT));
  let estimator = ScriptedEstimator::new(level_one);
  let states = FeatureStateStore::new();

  let ctx = frame(&mut walker, &style(), &estimator, &states);

  assert_eq!(ctx.rendered.len(), 3);
  assert!(!ctx.rendered.contains(&missing));
  assert_eq!(ctx.stats.dropped, 1);
  assert_eq!(ctx.stats.failed, 0);
}

// =============================================================================
// Requests and layers
// =============================================================================

/// Requests beyond the budget are deferred to later frames.
#[test]
fn test_budget_defers_across_frames() {
  let provider = Rc::new(ManualProvider::new(SourceMeta::new(0, 4)));
  let budget = RequestBudget::new(2);
  let mut walker = walker(Rc::clone(&provider)).with_budget(budget.clone());
  let estimator = ScriptedEstimator::new(level_one);
  let states = FeatureStateStore::new();
  let style = style();

  frame(&mut walker, &style, &estimator, &states);
  let first = provider.requested();
  assert_eq!(first.len(), 2);
  assert_eq!(budget.outstanding(), 2);
  for area in first.iter().copied() {
    provider.resolve(area, Ok(None));
  }

  frame(&mut walker, &style, &estimator, &states);
  let second = provider.requested();
  assert_eq!(second.len(), 2);
  assert!(second.iter().all(|a| !first.contains(a)));
  assert_eq!(budget.outstanding(), 2);
  for area in second {
    provider.resolve(area, Ok(None));
  }

  frame(&mut walker, &style, &estimator, &states);
  assert!(provider.requested().is_empty());
  assert_eq!(budget.outstanding(), 0);
}

/// A fetch that finishes after its cell stopped rendering still frees its
/// slot, so the children can load.
#[test]
fn test_slot_released_when_settled_cell_is_split() {
  let provider = Rc::new(ManualProvider::new(SourceMeta::new(0, 4)));
  let budget = RequestBudget::new(1);
  let mut walker = walker(Rc::clone(&provider)).with_budget(budget.clone());
  let level = Cell::new(0);
  let estimator = ScriptedEstimator::new(|a: &Area| {
    let z = level.get();
    (i32::from(a.z) <= z).then_some(range(z, z, f64::from(z)))
  });
  let states = FeatureStateStore::new();
  let style = style();

  let ctx = frame(&mut walker, &style, &estimator, &states);
  assert_eq!(ctx.rendered, vec![Area::ROOT]);
  assert_eq!(provider.requested(), vec![Area::ROOT]);
  assert_eq!(budget.outstanding(), 1);

  provider.resolve(Area::ROOT, Ok(Some(poi_tile())));
  level.set(1);
  for _ in 0..4 {
    let ctx = frame(&mut walker, &style, &estimator, &states);
    assert_eq!(ctx.rendered.len(), 4);
    assert!(!ctx.rendered.contains(&Area::ROOT));
  }

  assert!(matches!(
    walker.root().cache().and_then(|c| c.source_state("osm")),
    Some(crate::cache::SourceTile::Existence(Some(_)))
  ));
  let requested = provider.requested();
  assert_eq!(requested.len(), 1, "one child holds the only slot");
  assert_eq!(requested[0].z, 1);
  assert_eq!(budget.outstanding(), 1);

  provider.resolve(requested[0], Ok(None));
  frame(&mut walker, &style, &estimator, &states);
  assert_eq!(provider.requested().len(), 1, "the next child takes the slot");
}

/// Layers outside their zoom range produce nothing.
#[test]
fn test_layer_zoom_range() {
  let style = Style::from_json(
    r#"{
      "sources": {"osm": {}},
      "layers": [
        {"id": "poi", "type": "circle", "source": "osm"},
        {"id": "poi-detail", "type": "circle", "source": "osm", "source-layer": "poi", "minzoom": 3},
        {"id": "hidden", "type": "circle", "source": "osm", "source-layer": "poi",
         "layout": {"visibility": "none"}}
      ]
    }"#,
  )
  .unwrap();
  let mut walker = walker(MemoryProvider::new(SourceMeta::new(0, 4)).with_tile(Area::ROOT, poi_tile()));
  let estimator = ScriptedEstimator::new(|a: &Area| (a.z == 0).then_some(range(0, 0, 0.2)));
  let states = FeatureStateStore::new();

  let mut ctx = frame(&mut walker, &style, &estimator, &states);
  let primitives = ctx.take_primitives();
  assert_eq!(primitives.len(), 1);
  assert_eq!(primitives[0].layer_id, "poi");
  assert!(ctx.primitives.is_empty());
}

/// Pruning drops cells that left the view and cancels their requests.
#[test]
fn test_prune_cancels_offscreen_requests() {
  let provider = Rc::new(ManualProvider::new(SourceMeta::new(0, 4)));
  let mut walker = walker(Rc::clone(&provider));
  let zoomed_in = Cell::new(true);
  let estimator = ScriptedEstimator::new(|a: &Area| {
    if zoomed_in.get() {
      a.contains(&target()).then_some(range(2, 2, 2.0))
    } else {
      (a.z == 0).then_some(range(0, 0, 0.2))
    }
  });
  let states = FeatureStateStore::new();
  let style = style();

  frame(&mut walker, &style, &estimator, &states);
  assert_eq!(provider.requested(), vec![target()]);
  assert_eq!(walker.budget().outstanding(), 1);

  zoomed_in.set(false);
  for _ in 0..4 {
    frame(&mut walker, &style, &estimator, &states);
  }
  assert_eq!(walker.budget().outstanding(), 2, "root and the stale target");

  assert!(walker.prune(2) > 0);
  assert_eq!(walker.root().count(), 1);
  assert_eq!(walker.budget().outstanding(), 1);
  assert_eq!(walker.frame(), 5);
}
