//! Shared fixtures for the integration tests: feature builders, a ready-made
//! dispatcher and an in-memory icon loader with per-URL latency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use lib_seawatch::core::alerts::{Notice, NoticeAction};
use lib_seawatch::core::icons::{IconError, IconLoader, IconReady, LoadedIcon};
use lib_seawatch::core::{
    maritime_registry, CustomIconEntry, CustomIconTable, Dispatcher, DispatcherConfig, Feature,
    FeatureRef, FilterGroup, Geometry, TargetInfo,
};

/// A point feature at `[lon, lat]`.
pub fn point(id: &str, type_tag: &str, lon: f64, lat: f64) -> Feature {
    Feature::new(id, type_tag, Geometry::Point { coordinates: [lon, lat] })
}

/// An AIS contact with an MMSI and ship type code.
pub fn ais(id: &str, mmsi: &str, vessel_type: u16) -> Feature {
    let mut feature = point(id, "ais", 23.6, 37.9);
    feature.properties.target = TargetInfo {
        mmsi: Some(mmsi.to_string()),
        vessel_type: Some(vessel_type),
        course: Some(45.0),
        ..TargetInfo::default()
    };
    feature
}

pub fn reference(feature: &Feature) -> FeatureRef {
    FeatureRef::from(feature)
}

pub fn group(tag: &str, show: bool, children: &[&str]) -> FilterGroup {
    FilterGroup {
        group_tag: tag.to_string(),
        show,
        child_type_tags: children.iter().map(|c| c.to_string()).collect(),
    }
}

pub fn notice(id: &str, target_key: &str, action: NoticeAction) -> Notice {
    Notice {
        id: id.to_string(),
        target_key: target_key.to_string(),
        action,
    }
}

pub fn icon_entry(group: &str, sub_type: Option<&str>, url: &str) -> CustomIconEntry {
    CustomIconEntry {
        track_group: group.to_string(),
        track_sub_type: sub_type.map(str::to_string),
        image_url: url.to_string(),
        deleted: false,
    }
}

pub fn icon_table(entries: Vec<CustomIconEntry>) -> Arc<CustomIconTable> {
    Arc::new(CustomIconTable::new(entries))
}

/// Dispatcher over the maritime registry with default settings.
pub fn dispatcher(loader: Arc<dyn IconLoader>) -> (Dispatcher, mpsc::UnboundedReceiver<IconReady>) {
    let registry = match maritime_registry() {
        Ok(registry) => registry,
        Err(e) => panic!("maritime registry is inconsistent: {e}"),
    };
    Dispatcher::new(registry, DispatcherConfig::default(), loader)
}

/// Serves images from memory. URLs not registered fail with `NotFound`.
#[derive(Debug, Default)]
pub struct MemoryIconLoader {
    images: HashMap<String, Duration>,
    failing: HashMap<String, Duration>,
    loads: AtomicUsize,
}

impl MemoryIconLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `url` after `delay`.
    pub fn with_image(mut self, url: &str, delay: Duration) -> Self {
        self.images.insert(url.to_string(), delay);
        self
    }

    /// Fails `url` after `delay`.
    pub fn with_failure(mut self, url: &str, delay: Duration) -> Self {
        self.failing.insert(url.to_string(), delay);
        self
    }

    /// How many loads were started.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl IconLoader for MemoryIconLoader {
    fn load(&self, url: &str) -> BoxFuture<'static, Result<LoadedIcon, IconError>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let url = url.to_string();
        let served = self.images.get(&url).copied();
        let failed = self.failing.get(&url).copied();
        Box::pin(async move {
            match (served, failed) {
                (Some(delay), _) => {
                    tokio::time::sleep(delay).await;
                    Ok(LoadedIcon {
                        bytes: url.as_bytes().to_vec(),
                        content_type: Some("image/png".to_string()),
                        url,
                    })
                }
                (None, Some(delay)) => {
                    tokio::time::sleep(delay).await;
                    Err(IconError::Status { url, status: 500 })
                }
                (None, None) => Err(IconError::NotFound { url }),
            }
        })
    }
}
