use std::sync::Arc;
use std::time::Duration;

use lib_seawatch::core::icons::NoopIconLoader;
use lib_seawatch::core::styles::{IconSource, ResolvedStyle};
use lib_seawatch::core::{
    CustomIconTable, Engine, FeatureCounts, StreamEvent, UiIntent,
};
use project_tests::{ais, dispatcher, icon_entry, MemoryIconLoader};

const CARGO: &str = "https://icons.example/cargo.png";

#[tokio::test]
async fn closing_the_stream_waits_for_pending_icons() {
    let loader = Arc::new(MemoryIconLoader::new().with_image(CARGO, Duration::from_millis(30)));
    let (d, icon_rx) = dispatcher(loader);
    let (handle, task) = Engine::spawn(d, icon_rx, 16);

    handle
        .swap_icon_table(CustomIconTable::new(vec![icon_entry("ais", None, CARGO)]))
        .unwrap();
    handle
        .send(StreamEvent::Current { feature: ais("v1", "237000001", 70) })
        .await
        .unwrap();
    drop(handle);

    let d = task.await.unwrap();
    match &d.feature("v1").unwrap().style().unwrap()[0] {
        ResolvedStyle::Icon { source: IconSource::Image { url, .. }, .. } => assert_eq!(url, CARGO),
        other => panic!("expected the custom image, got {other:?}"),
    }
}

#[tokio::test]
async fn intents_and_events_share_one_loop() {
    let (d, icon_rx) = dispatcher(Arc::new(NoopIconLoader));
    let (handle, task) = Engine::spawn(d, icon_rx, 4);

    for i in 0..20 {
        handle
            .send(StreamEvent::Current { feature: ais(&format!("v{i}"), &format!("2370000{i:02}"), 70) })
            .await
            .unwrap();
    }
    handle.intent(UiIntent::Select(Some("v7".into()))).unwrap();
    handle
        .send(StreamEvent::CountOnly { total: 20, visible: 20 })
        .await
        .unwrap();
    let mut counts = handle.counts();
    drop(handle);

    let d = task.await.unwrap();
    assert_eq!(d.counts().total, 20);
    assert!(d.feature("v7").unwrap().flags().selected);
    assert_eq!(*counts.borrow_and_update(), FeatureCounts { total: 20, visible: 20 });
}

#[tokio::test]
async fn shutdown_returns_the_dispatcher() {
    let (d, icon_rx) = dispatcher(Arc::new(NoopIconLoader));
    let (handle, task) = Engine::spawn(d, icon_rx, 4);
    handle
        .send(StreamEvent::Current { feature: ais("v1", "237000001", 70) })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.shutdown();
    let d = task.await.unwrap();
    assert!(handle.is_shutdown());
    assert_eq!(d.counts().total, 1);
}
