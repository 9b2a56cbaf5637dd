use std::sync::Arc;

use lib_seawatch::core::icons::NoopIconLoader;
use lib_seawatch::core::{DispatchOutcome, Dispatcher, Feature, StreamEvent};
use project_tests::{ais, dispatcher, group, point, reference};

fn fresh() -> Dispatcher {
    dispatcher(Arc::new(NoopIconLoader)).0
}

fn marker(id: &str) -> Feature {
    point(id, "marker", 23.4, 37.8)
}

fn filter(d: &mut Dispatcher, groups: Vec<lib_seawatch::core::FilterGroup>, manual: &[&str]) {
    d.dispatch(StreamEvent::FilterTracks {
        groups,
        manual_features: manual.iter().map(|m| m.to_string()).collect(),
    });
}

#[test]
fn hidden_group_empties_its_layers() {
    let mut d = fresh();
    d.dispatch(StreamEvent::Current { feature: ais("v1", "237000001", 70) });
    d.dispatch(StreamEvent::Current { feature: point("s1", "sat-ais", 23.0, 37.0) });
    d.dispatch(StreamEvent::Current { feature: point("p1", "adsb", 23.0, 37.0) });

    filter(&mut d, vec![group("ais", false, &["ais", "sat-ais"])], &[]);

    assert_eq!(d.layer_for("ais").unwrap().source().len(), 0);
    assert_eq!(d.layer_for("sat-ais").unwrap().source().len(), 0);
    assert_eq!(d.layer_for("adsb").unwrap().source().len(), 1);
    assert!(d.feature("v1").is_none());
}

#[test]
fn evicted_features_do_not_come_back_while_hidden() {
    let mut d = fresh();
    let vessel = ais("v1", "237000001", 70);
    d.dispatch(StreamEvent::Current { feature: vessel.clone() });
    filter(&mut d, vec![group("ais", false, &["ais"])], &[]);

    assert_eq!(
        d.dispatch(StreamEvent::Current { feature: vessel.clone() }),
        DispatchOutcome::Ignored
    );
    assert_eq!(d.layer_for("ais").unwrap().source().len(), 0);
    // A timeout for an evicted feature is logged, nothing more.
    assert_eq!(
        d.dispatch(StreamEvent::Timeout { feature: reference(&vessel) }),
        DispatchOutcome::Ignored
    );

    filter(&mut d, vec![group("ais", true, &["ais"])], &[]);
    // No backfill: the layer fills again with the next update.
    assert_eq!(d.layer_for("ais").unwrap().source().len(), 0);
    assert_eq!(
        d.dispatch(StreamEvent::Current { feature: vessel }),
        DispatchOutcome::Applied
    );
    assert_eq!(d.layer_for("ais").unwrap().source().len(), 1);
}

#[test]
fn manual_features_are_hidden_not_evicted() {
    let mut d = fresh();
    d.dispatch(StreamEvent::AddMarker { feature: marker("m1") });
    d.dispatch(StreamEvent::AddMarker { feature: marker("m2") });

    filter(&mut d, vec![group("manual", false, &["marker"])], &["m1", "m2"]);
    assert_eq!(d.layer_for("marker").unwrap().source().len(), 2);
    assert!(d.feature("m1").unwrap().style().is_none());
    assert!(d.feature("m2").unwrap().style().is_none());

    filter(&mut d, vec![group("manual", true, &["marker"])], &["m1"]);
    assert!(d.feature("m1").unwrap().style().is_some());
    assert!(d.feature("m2").unwrap().style().is_none());
}

#[test]
fn markers_are_accepted_while_tracks_are_filtered() {
    let mut d = fresh();
    filter(
        &mut d,
        vec![group("ais", false, &["ais"]), group("manual", false, &["marker"])],
        &[],
    );
    assert_eq!(
        d.dispatch(StreamEvent::AddMarker { feature: marker("m1") }),
        DispatchOutcome::Applied
    );
    assert_eq!(d.counts().total, 1);
}

#[test]
fn eviction_also_clears_heatmap_samples() {
    let mut d = fresh();
    d.dispatch(StreamEvent::HeatmapStart { enabled: true });
    d.dispatch(StreamEvent::Current { feature: ais("v1", "237000001", 70) });
    d.dispatch(StreamEvent::Current { feature: point("r1", "radar", 23.0, 37.0) });
    assert_eq!(d.heatmap().unwrap().source().len(), 2);

    filter(&mut d, vec![group("ais", false, &["ais"])], &[]);
    assert_eq!(d.heatmap().unwrap().source().len(), 1);
}

#[test]
fn user_features_survive_eviction_of_their_layer() {
    let mut d = fresh();
    d.dispatch(StreamEvent::Current { feature: ais("v1", "237000001", 70) });
    d.dispatch(StreamEvent::AddMarker { feature: ais("m1", "237000002", 70) });

    filter(&mut d, vec![group("ais", false, &["ais"])], &[]);

    assert!(d.feature("v1").is_none());
    assert!(d.feature("m1").is_some());
    assert_eq!(d.layer_for("ais").unwrap().source().len(), 1);
    assert!(d.hide("m1").is_ok());
    assert!(d.feature("m1").unwrap().style().is_none());
}
