//! # Rendering Seam
//!
//! The engine never talks to a map library directly. It drives layers through
//! the [`LayerSource`] trait, the only interface a renderer has to implement.
//! [`VectorSource`] is the in-memory implementation used by default and in tests.
//!
//! Features do not point back at their layer. The dispatcher keeps an explicit
//! `feature id -> layer` index instead, so a feature can be moved or evicted
//! without the renderer's object model being involved.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::feature::{FeatureId, FeatureProperties, Geometry, StyleFlags, TypeTag};
use crate::core::styles::ResolvedStyle;

/// Identifier of a render layer, assigned at registration.
pub type LayerId = u32;

/// A feature as held by a layer source.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFeature {
    id: FeatureId,
    type_tag: TypeTag,
    /// Monotonic insertion number. Unchanged by in-place updates, so it stands
    /// in for object identity.
    serial: u64,
    geometry: Geometry,
    properties: FeatureProperties,
    flags: StyleFlags,
    style: Option<Vec<ResolvedStyle>>,
}

impl RenderFeature {
    pub fn new(
        id: FeatureId,
        type_tag: TypeTag,
        serial: u64,
        geometry: Geometry,
        properties: FeatureProperties,
        flags: StyleFlags,
    ) -> Self {
        Self {
            id,
            type_tag,
            serial,
            geometry,
            properties,
            flags,
            style: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
    }

    pub fn properties(&self) -> &FeatureProperties {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: FeatureProperties) {
        self.properties = properties;
    }

    pub fn flags(&self) -> &StyleFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut StyleFlags {
        &mut self.flags
    }

    /// `None` means the feature is in its layer but draws nothing.
    pub fn style(&self) -> Option<&[ResolvedStyle]> {
        self.style.as_deref()
    }

    pub fn set_style(&mut self, style: Option<Vec<ResolvedStyle>>) {
        self.style = style;
    }
}

/// Storage behind one render layer.
pub trait LayerSource: Send {
    /// Inserts a feature, replacing any feature with the same id.
    fn add_feature(&mut self, feature: RenderFeature);
    fn remove_feature(&mut self, id: &str) -> Option<RenderFeature>;
    fn get_feature_by_id(&self, id: &str) -> Option<&RenderFeature>;
    fn get_feature_by_id_mut(&mut self, id: &str) -> Option<&mut RenderFeature>;
    fn get_features(&self) -> Box<dyn Iterator<Item = &RenderFeature> + '_>;
    fn clear(&mut self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash-map backed source.
#[derive(Debug, Default)]
pub struct VectorSource {
    features: HashMap<FeatureId, RenderFeature>,
}

impl VectorSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayerSource for VectorSource {
    fn add_feature(&mut self, feature: RenderFeature) {
        self.features.insert(feature.id.clone(), feature);
    }

    fn remove_feature(&mut self, id: &str) -> Option<RenderFeature> {
        self.features.remove(id)
    }

    fn get_feature_by_id(&self, id: &str) -> Option<&RenderFeature> {
        self.features.get(id)
    }

    fn get_feature_by_id_mut(&mut self, id: &str) -> Option<&mut RenderFeature> {
        self.features.get_mut(id)
    }

    fn get_features(&self) -> Box<dyn Iterator<Item = &RenderFeature> + '_> {
        Box::new(self.features.values())
    }

    fn clear(&mut self) {
        self.features.clear();
    }

    fn len(&self) -> usize {
        self.features.len()
    }
}

/// Static description of a layer, handed to a [`SourceFactory`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: LayerId,
    pub name: String,
    pub z_index: i32,
}

/// Builds the source for a new layer. Renderers plug in here.
pub type SourceFactory = Box<dyn Fn(&LayerSpec) -> Box<dyn LayerSource> + Send>;

/// The default factory: every layer gets a [`VectorSource`].
pub fn vector_sources() -> SourceFactory {
    Box::new(|_spec: &LayerSpec| Box::new(VectorSource::new()) as Box<dyn LayerSource>)
}

/// Capability to toggle one layer's visibility.
///
/// Returned at registration time and handed to whichever caller needs it; the
/// layer itself reads the same flag.
#[derive(Debug, Clone)]
pub struct LayerHandle {
    layer: LayerId,
    name: String,
    visible: Arc<AtomicBool>,
}

impl LayerHandle {
    pub(crate) fn new(layer: LayerId, name: String) -> Self {
        Self {
            layer,
            name,
            visible: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Relaxed);
        log::debug!("Layer '{}' visibility set to {}", self.name, visible);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }
}

/// A layer: spec, visibility and its source.
pub struct RenderLayer {
    spec: LayerSpec,
    handle: LayerHandle,
    source: Box<dyn LayerSource>,
}

impl RenderLayer {
    pub fn new(spec: LayerSpec, handle: LayerHandle, source: Box<dyn LayerSource>) -> Self {
        Self { spec, handle, source }
    }

    pub fn id(&self) -> LayerId {
        self.spec.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn z_index(&self) -> i32 {
        self.spec.z_index
    }

    pub fn is_visible(&self) -> bool {
        self.handle.is_visible()
    }

    pub fn source(&self) -> &dyn LayerSource {
        self.source.as_ref()
    }

    pub fn source_mut(&mut self) -> &mut dyn LayerSource {
        self.source.as_mut()
    }
}

impl std::fmt::Debug for RenderLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLayer")
            .field("spec", &self.spec)
            .field("visible", &self.is_visible())
            .field("features", &self.source.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, serial: u64) -> RenderFeature {
        RenderFeature::new(
            id.to_string(),
            "ais".to_string(),
            serial,
            Geometry::Point { coordinates: [0.0, 0.0] },
            FeatureProperties::default(),
            StyleFlags::default(),
        )
    }

    #[test]
    fn vector_source_replaces_by_id() {
        let mut source = VectorSource::new();
        source.add_feature(point("a", 1));
        source.add_feature(point("a", 2));
        assert_eq!(source.len(), 1);
        assert_eq!(source.get_feature_by_id("a").map(RenderFeature::serial), Some(2));
        assert!(source.remove_feature("missing").is_none());
    }

    #[test]
    fn handle_and_layer_share_visibility() {
        let handle = LayerHandle::new(3, "ais".to_string());
        let layer = RenderLayer::new(
            LayerSpec { id: 3, name: "ais".to_string(), z_index: 18 },
            handle.clone(),
            Box::new(VectorSource::new()),
        );
        assert!(layer.is_visible());
        handle.set_visible(false);
        assert!(!layer.is_visible());
    }
}
