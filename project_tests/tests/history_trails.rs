use std::sync::Arc;

use lib_seawatch::core::icons::NoopIconLoader;
use lib_seawatch::core::styles::ResolvedStyle;
use lib_seawatch::core::{DispatchOutcome, Dispatcher, Geometry, StreamEvent};
use project_tests::{ais, dispatcher};

fn fresh() -> Dispatcher {
    dispatcher(Arc::new(NoopIconLoader)).0
}

fn start(d: &mut Dispatcher, id: &str) -> i32 {
    d.dispatch(StreamEvent::HistoryStart { feature_id: id.into() });
    d.trail(id).unwrap().z_index()
}

#[test]
fn trail_stack_reuses_the_freed_top_slot() {
    let mut d = fresh();
    assert_eq!(start(&mut d, "A"), 31);
    assert_eq!(start(&mut d, "B"), 32);
    d.dispatch(StreamEvent::HistoryStop { feature_id: "B".into() });
    assert!(d.trail("B").is_none());
    assert_eq!(start(&mut d, "C"), 32);
}

#[test]
fn trails_draw_above_every_base_layer() {
    let mut d = fresh();
    let top = d.layers().last().unwrap().z_index();
    assert!(start(&mut d, "A") > top);
}

#[test]
fn history_points_land_in_the_owner_trail() {
    let mut d = fresh();
    d.dispatch(StreamEvent::Current { feature: ais("v1", "237000001", 70) });
    start(&mut d, "v1");

    for lon in [23.0, 23.1, 23.2] {
        let mut past = ais(&format!("v1@{lon}"), "237000001", 70);
        past.geometry = Geometry::Point { coordinates: [lon, 37.9] };
        assert_eq!(
            d.dispatch(StreamEvent::History { feature: past, owner: Some("v1".into()) }),
            DispatchOutcome::Applied
        );
    }

    let trail = d.trail("v1").unwrap();
    assert_eq!(trail.source().len(), 3);
    let point = trail
        .source()
        .get_features()
        .find(|p| p.id().starts_with("v1@23.1#"))
        .unwrap();
    assert!(point.flags().historical);
    match &point.style().unwrap()[0] {
        ResolvedStyle::Icon { opacity, label, .. } => {
            assert!(*opacity < 1.0);
            assert!(label.is_none());
        }
        other => panic!("expected an icon, got {other:?}"),
    }
    // The live layer is untouched.
    assert_eq!(d.counts().total, 1);
}

#[test]
fn positions_without_an_owner_accumulate_in_their_own_trail() {
    let mut d = fresh();
    d.dispatch(StreamEvent::Current { feature: ais("v1", "237000001", 70) });
    start(&mut d, "v1");

    for lon in [23.0, 23.1, 23.2] {
        let mut past = ais("v1", "237000001", 70);
        past.geometry = Geometry::Point { coordinates: [lon, 37.9] };
        assert_eq!(
            d.dispatch(StreamEvent::History { feature: past, owner: None }),
            DispatchOutcome::Applied
        );
    }

    let trail = d.trail("v1").unwrap();
    assert_eq!(trail.source().len(), 3);
    assert!(trail.source().get_features().all(|p| p.flags().historical));
    // The live feature keeps its id and its own layer.
    assert!(!d.feature("v1").unwrap().flags().historical);
    assert_eq!(d.counts().total, 1);
}

#[test]
fn history_without_an_open_trail_is_dropped() {
    let mut d = fresh();
    assert_eq!(
        d.dispatch(StreamEvent::History { feature: ais("v1", "237000001", 70), owner: None }),
        DispatchOutcome::Ignored
    );
    assert_eq!(
        d.dispatch(StreamEvent::HistoryStop { feature_id: "v1".into() }),
        DispatchOutcome::Ignored
    );
}

#[test]
fn clear_all_closes_every_trail() {
    let mut d = fresh();
    start(&mut d, "A");
    start(&mut d, "B");
    d.dispatch(StreamEvent::HistoryClearAll);
    assert!(d.trail("A").is_none());
    assert!(d.trail("B").is_none());
    assert_eq!(start(&mut d, "C"), 31);
}
