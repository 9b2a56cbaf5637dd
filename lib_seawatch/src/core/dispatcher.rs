//! # Feature Dispatcher
//!
//! The `Dispatcher` is the single entry and exit point between the stream and
//! the rendering surface. Every stream event, UI intent and icon completion
//! goes through it, one at a time, and runs to completion before the next.
//!
//! ## Core Design Principles:
//!
//! 1.  **Upsert by id**: a `Current` event for a known id updates geometry and
//!     properties in place. The feature keeps its identity (insertion serial),
//!     and a given id lives in at most one base layer.
//!
//! 2.  **Explicit ownership index**: instead of features pointing at their
//!     layer, the dispatcher keeps `feature id -> {layer, lookup key,
//!     classification generation}`. Eviction, moves and alert matching all go
//!     through it.
//!
//! 3.  **Never block, never throw**: image loads are spawned and applied when
//!     they complete, after re-checking the feature's current state. Failures
//!     inside an operation are logged and turned into
//!     [`DispatchOutcome::Ignored`]; nothing escapes the loop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::alerts::{AlertColors, AlertHighlighter, Notice};
use crate::core::classify::{classify, ClassifyConfig, DEFAULT_STATIONARY_KNOTS};
use crate::core::events::{DispatchOutcome, FeatureCounts, StreamEvent, UiIntent};
use crate::core::feature::{
    AnchorError, Feature, FeatureId, FeatureRef, Geometry, StyleFlags, TrackSubType, TypeTag,
};
use crate::core::filter::{FilterAction, FilterEngine, FilterGroup};
use crate::core::geo::Coordinate;
use crate::core::history::{HistoryManager, TrailLayer, DEFAULT_HISTORY_BASE_Z};
use crate::core::icons::{CustomIconTable, IconLoader, IconReady, IconTasks};
use crate::core::registry::{Handler, LayerRegistry, RegistryError, UNKNOWN_TYPE};
use crate::core::render::{
    vector_sources, LayerHandle, LayerId, LayerSpec, RenderFeature, RenderLayer, SourceFactory,
};
use crate::core::styles::{StyleResolver, DEFAULT_MAX_RESOLUTION};

/// Layer id reserved for the heatmap.
pub const HEATMAP_LAYER: LayerId = 0;
/// Z-index of the heatmap, below every track layer.
pub const HEATMAP_Z_INDEX: i32 = 5;
/// Trail layers get ids from here up so they never collide with registered layers.
const FIRST_TRAIL_LAYER: LayerId = 1_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("feature '{0}' is not present in any layer")]
    MissingFeature(FeatureId),

    #[error("no trail layer is open for '{0}'")]
    MissingTrail(FeatureId),

    #[error("layer {0} is not registered")]
    MissingLayer(LayerId),
}

/// Settings the dispatcher needs from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub max_resolution: f64,
    pub base_scale: f64,
    pub initial_resolution: f64,
    pub history_base_z: i32,
    pub stationary_knots: f64,
    pub alert_colors: AlertColors,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_resolution: DEFAULT_MAX_RESOLUTION,
            base_scale: 1.0,
            // Zoom 8, a regional view.
            initial_resolution: DEFAULT_MAX_RESOLUTION / 256.0,
            history_base_z: DEFAULT_HISTORY_BASE_Z,
            stationary_knots: DEFAULT_STATIONARY_KNOTS,
            alert_colors: AlertColors::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    layer: LayerId,
    type_tag: TypeTag,
    lookup_key: String,
    /// Bumped whenever the subtype or custom icon changes; keys icon loads.
    generation: u64,
    classification: (Option<TrackSubType>, Option<String>),
    manual: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusKind {
    Selected,
    Hovering,
    Crosshairs,
    Editing,
}

impl FocusKind {
    fn apply(self, flags: &mut StyleFlags, on: bool) {
        match self {
            FocusKind::Selected => flags.selected = on,
            FocusKind::Hovering => flags.hovering = on,
            FocusKind::Crosshairs => flags.crosshairs = on,
            FocusKind::Editing => flags.editing = on,
        }
    }
}

#[derive(Debug, Default)]
struct Focus {
    selected: Option<FeatureId>,
    hovering: Option<FeatureId>,
    crosshairs: Option<FeatureId>,
    editing: Option<FeatureId>,
}

impl Focus {
    fn slot_mut(&mut self, kind: FocusKind) -> &mut Option<FeatureId> {
        match kind {
            FocusKind::Selected => &mut self.selected,
            FocusKind::Hovering => &mut self.hovering,
            FocusKind::Crosshairs => &mut self.crosshairs,
            FocusKind::Editing => &mut self.editing,
        }
    }

    fn flags_for(&self, id: &str) -> StyleFlags {
        let is = |slot: &Option<FeatureId>| slot.as_deref() == Some(id);
        StyleFlags {
            selected: is(&self.selected),
            hovering: is(&self.hovering),
            crosshairs: is(&self.crosshairs),
            editing: is(&self.editing),
            ..StyleFlags::default()
        }
    }
}

/// # Core Dispatcher
///
/// Owns the base layers, the ownership index, the trail stack, the filter
/// state, the alert buckets and the icon tasks.
pub struct Dispatcher {
    registry: LayerRegistry,
    layers: HashMap<LayerId, RenderLayer>,
    index: HashMap<FeatureId, IndexEntry>,
    history: HistoryManager,
    filters: FilterEngine,
    alerts: AlertHighlighter,
    resolver: StyleResolver,
    classify: ClassifyConfig,
    icons: IconTasks,
    icon_table: Arc<CustomIconTable>,
    source_factory: SourceFactory,
    heatmap: Option<RenderLayer>,
    focus: Focus,
    resolution: f64,
    next_serial: u64,
    next_trail_layer: LayerId,
}

impl Dispatcher {
    /// Creates a dispatcher with in-memory layer sources. Icon completions
    /// arrive on the returned receiver and must be fed back through
    /// [`Dispatcher::on_icon_ready`].
    pub fn new(
        registry: LayerRegistry,
        config: DispatcherConfig,
        loader: Arc<dyn IconLoader>,
    ) -> (Self, mpsc::UnboundedReceiver<IconReady>) {
        Self::with_source_factory(registry, config, loader, vector_sources())
    }

    /// Same as [`Dispatcher::new`], with renderer-provided layer sources.
    pub fn with_source_factory(
        registry: LayerRegistry,
        config: DispatcherConfig,
        loader: Arc<dyn IconLoader>,
        source_factory: SourceFactory,
    ) -> (Self, mpsc::UnboundedReceiver<IconReady>) {
        if config.history_base_z < registry.max_z_index() {
            log::warn!(
                "History base z {} is below the top base layer (z {}); trails may render underneath tracks",
                config.history_base_z,
                registry.max_z_index()
            );
        }
        let layers = registry
            .layers()
            .iter()
            .map(|(spec, handle)| {
                let layer = RenderLayer::new(spec.clone(), handle.clone(), source_factory(spec));
                (spec.id, layer)
            })
            .collect();
        let (icons, ready_rx) = IconTasks::new(loader);
        let dispatcher = Self {
            registry,
            layers,
            index: HashMap::new(),
            history: HistoryManager::new(config.history_base_z),
            filters: FilterEngine::new(),
            alerts: AlertHighlighter::new(config.alert_colors),
            resolver: StyleResolver::new(config.max_resolution).with_base_scale(config.base_scale),
            classify: ClassifyConfig {
                stationary_knots: config.stationary_knots,
            },
            icons,
            icon_table: Arc::new(CustomIconTable::default()),
            source_factory,
            heatmap: None,
            focus: Focus::default(),
            resolution: config.initial_resolution,
            next_serial: 0,
            next_trail_layer: FIRST_TRAIL_LAYER,
        };
        (dispatcher, ready_rx)
    }

    // --- Entry points ---

    /// Applies one stream event. Failures are logged, never returned.
    pub fn dispatch(&mut self, event: StreamEvent) -> DispatchOutcome {
        let status = event.status();
        let result = match event {
            StreamEvent::Current { feature } => self.add(feature),
            StreamEvent::Timeout { feature } | StreamEvent::LeftGeoRange { feature } => {
                self.remove(&feature)
            }
            StreamEvent::History { feature, owner } => self.history(feature, owner),
            StreamEvent::HistoryStart { feature_id } => {
                self.history_start(&feature_id);
                Ok(DispatchOutcome::Applied)
            }
            StreamEvent::HistoryStop { feature_id } => Ok(self.history_stop(&feature_id)),
            StreamEvent::HistoryClearAll => Ok(self.history_clear_all()),
            StreamEvent::FilterTracks {
                groups,
                manual_features,
            } => Ok(self.filter_tracks(&groups, &manual_features)),
            StreamEvent::AddMarker { feature } => self.add_marker(feature),
            StreamEvent::HideFeature { feature_id, hidden } => {
                if hidden {
                    self.hide(&feature_id)
                } else {
                    self.show(&feature_id)
                }
            }
            StreamEvent::RedrawTracks { track_group } => Ok(self.redraw(&track_group)),
            StreamEvent::HeatmapStart { enabled } => Ok(self.set_heatmap(enabled)),
            StreamEvent::CountOnly { total, visible } => {
                Ok(DispatchOutcome::Counts(FeatureCounts { total, visible }))
            }
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("{} dispatch failed: {}", status, e);
                DispatchOutcome::Ignored
            }
        }
    }

    /// Applies one UI intent. Failures are logged, never returned.
    pub fn handle_intent(&mut self, intent: UiIntent) -> DispatchOutcome {
        let result = match intent {
            UiIntent::Select(id) => Ok(self.set_focus(FocusKind::Selected, id)),
            UiIntent::Hover(id) => Ok(self.set_focus(FocusKind::Hovering, id)),
            UiIntent::Crosshairs(id) => Ok(self.set_focus(FocusKind::Crosshairs, id)),
            UiIntent::Edit(id) => Ok(self.set_focus(FocusKind::Editing, id)),
            UiIntent::SetResolution(resolution) => Ok(self.set_resolution(resolution)),
            UiIntent::Notice(notice) => Ok(self.apply_notice(&notice)),
            UiIntent::Show(id) => self.show(&id),
            UiIntent::Hide(id) => self.hide(&id),
        };
        result.unwrap_or_else(|e| {
            log::error!("UI intent failed: {}", e);
            DispatchOutcome::Ignored
        })
    }

    // --- Live features ---

    /// Inserts or updates a streamed feature.
    pub fn add(&mut self, feature: Feature) -> Result<DispatchOutcome, DispatchError> {
        self.upsert(feature, false)
    }

    /// Inserts or updates a user-authored feature. Markers bypass group
    /// suppression and keep the style flags they were authored with.
    pub fn add_marker(&mut self, feature: Feature) -> Result<DispatchOutcome, DispatchError> {
        self.upsert(feature, true)
    }

    fn upsert(&mut self, feature: Feature, manual: bool) -> Result<DispatchOutcome, DispatchError> {
        let handler = self.resolve_handler(&feature.type_tag)?;
        if !manual && self.filters.is_suppressed(&handler.type_tag) {
            log::debug!("Dropping '{}': type '{}' is filtered out", feature.id, handler.type_tag);
            return Ok(DispatchOutcome::Ignored);
        }
        if let Some(entry) = self.index.get(&feature.id) {
            if entry.layer != handler.layer {
                log::debug!("Moving '{}' from '{}' to '{}'", feature.id, entry.type_tag, handler.type_tag);
                self.detach(&feature.id);
            }
        }

        let lookup_key = feature.lookup_key().to_string();
        let Feature {
            id,
            geometry,
            properties,
            style_flags,
            ..
        } = feature;
        let geometry = geometry.to_display();
        let sub_type = classify(&handler.type_tag, &properties.target, &self.classify);
        let priority_color = self.alerts.color_for(&lookup_key).map(str::to_string);

        let layer = self
            .layers
            .get_mut(&handler.layer)
            .ok_or(DispatchError::MissingLayer(handler.layer))?;
        let source = layer.source_mut();
        match source.get_feature_by_id_mut(&id) {
            Some(existing) => {
                existing.set_geometry(geometry);
                existing.set_properties(properties);
                let flags = existing.flags_mut();
                flags.track_sub_type = sub_type;
                if manual {
                    flags.custom_icon = style_flags.custom_icon;
                }
                if let Some(entry) = self.index.get_mut(&id) {
                    if entry.lookup_key != lookup_key {
                        entry.lookup_key = lookup_key;
                        flags.priority_color = priority_color;
                    }
                }
            }
            None => {
                let mut flags = if manual {
                    StyleFlags {
                        selected: false,
                        hovering: false,
                        crosshairs: false,
                        editing: false,
                        ..style_flags
                    }
                } else {
                    StyleFlags::default()
                };
                let focus = self.focus.flags_for(&id);
                flags.selected = focus.selected;
                flags.hovering = focus.hovering;
                flags.crosshairs = focus.crosshairs;
                flags.editing = focus.editing;
                flags.historical = false;
                flags.track_sub_type = sub_type;
                flags.priority_color = priority_color;

                self.next_serial += 1;
                source.add_feature(RenderFeature::new(
                    id.clone(),
                    handler.type_tag.clone(),
                    self.next_serial,
                    geometry,
                    properties,
                    flags,
                ));
                self.index.insert(
                    id.clone(),
                    IndexEntry {
                        layer: handler.layer,
                        type_tag: handler.type_tag.clone(),
                        lookup_key,
                        generation: 0,
                        classification: (None, None),
                        manual,
                    },
                );
            }
        }

        self.set_style(&handler, &id)?;
        self.heatmap_upsert(&handler, &id);
        Ok(DispatchOutcome::Applied)
    }

    /// Removes a feature that timed out or left the covered area.
    pub fn remove(&mut self, feature: &FeatureRef) -> Result<DispatchOutcome, DispatchError> {
        self.resolve_handler(&feature.type_tag)?;
        match self.detach(&feature.id) {
            Some(_) => Ok(DispatchOutcome::Applied),
            // Already evicted by a filter, or never seen.
            None => Err(DispatchError::MissingFeature(feature.id.clone())),
        }
    }

    /// Drops a feature from its layer and from every side table.
    fn detach(&mut self, id: &str) -> Option<RenderFeature> {
        let entry = self.index.remove(id)?;
        self.icons.cancel(id);
        if let Some(heatmap) = self.heatmap.as_mut() {
            heatmap.source_mut().remove_feature(id);
        }
        self.layers
            .get_mut(&entry.layer)
            .and_then(|layer| layer.source_mut().remove_feature(id))
    }

    /// Nulls a feature's style without removing it from its layer.
    pub fn hide(&mut self, id: &str) -> Result<DispatchOutcome, DispatchError> {
        let feature = self.feature_mut(id)?;
        feature.flags_mut().hidden = true;
        feature.set_style(None);
        Ok(DispatchOutcome::Applied)
    }

    /// Restyles a hidden feature back in.
    pub fn show(&mut self, id: &str) -> Result<DispatchOutcome, DispatchError> {
        self.feature_mut(id)?.flags_mut().hidden = false;
        self.restyle(id)?;
        Ok(DispatchOutcome::Applied)
    }

    /// Restyles every live feature of a track group, e.g. after the custom
    /// icon table changed.
    pub fn redraw(&mut self, track_group: &str) -> DispatchOutcome {
        let types: HashSet<&str> = self
            .registry
            .handlers_in_group(track_group)
            .map(|h| h.type_tag.as_str())
            .collect();
        let ids: Vec<FeatureId> = self
            .index
            .iter()
            .filter(|(_, e)| types.contains(e.type_tag.as_str()))
            .map(|(id, _)| id.clone())
            .collect();
        if ids.is_empty() {
            return DispatchOutcome::Ignored;
        }
        log::debug!("Redrawing {} features of group '{}'", ids.len(), track_group);
        for id in ids {
            if let Err(e) = self.restyle(&id) {
                log::error!("Redraw of '{}' failed: {}", id, e);
            }
        }
        DispatchOutcome::Applied
    }

    /// Replaces the custom icon table as a whole and redraws every group it
    /// touched, before or after.
    pub fn swap_icon_table(&mut self, table: Arc<CustomIconTable>) -> DispatchOutcome {
        let groups: HashSet<String> = self
            .icon_table
            .groups()
            .into_iter()
            .chain(table.groups())
            .map(str::to_string)
            .collect();
        self.icon_table = table;
        self.icons.forget_failures();
        log::info!(
            "Custom icon table swapped ({} entries)",
            self.icon_table.entries().len()
        );
        for group in groups {
            self.redraw(&group);
        }
        DispatchOutcome::Applied
    }

    // --- Styling ---

    fn resolve_handler(&self, type_tag: &str) -> Result<Arc<Handler>, DispatchError> {
        let resolved = self.registry.resolve(type_tag)?;
        if resolved.fallback {
            log::warn!("Unknown type tag '{}', using the '{}' handler", type_tag, UNKNOWN_TYPE);
        }
        Ok(resolved.handler)
    }

    fn restyle(&mut self, id: &str) -> Result<(), DispatchError> {
        let handler = self
            .index
            .get(id)
            .and_then(|entry| self.registry.get(&entry.type_tag))
            .cloned()
            .ok_or_else(|| DispatchError::MissingFeature(id.to_string()))?;
        self.set_style(&handler, id)
    }

    /// Classification, custom-icon lookup, resolution and apply. When the
    /// custom image is not loaded yet the default style goes on now and the
    /// image follows once its load completes.
    fn set_style(&mut self, handler: &Handler, id: &str) -> Result<(), DispatchError> {
        let entry = self
            .index
            .get_mut(id)
            .ok_or_else(|| DispatchError::MissingFeature(id.to_string()))?;
        let feature = self
            .layers
            .get_mut(&entry.layer)
            .ok_or(DispatchError::MissingLayer(entry.layer))?
            .source_mut()
            .get_feature_by_id_mut(id)
            .ok_or_else(|| DispatchError::MissingFeature(id.to_string()))?;

        let sub_type = feature.flags().track_sub_type;
        let custom_icon = match handler.icon_initializer {
            Some(init) => init(feature),
            None => self
                .icon_table
                .lookup(&handler.track_group, sub_type.map(|s| s.as_str()))
                .map(|entry| entry.image_url.clone()),
        };
        let classification = (sub_type, custom_icon.clone());
        if entry.classification != classification {
            entry.generation += 1;
            entry.classification = classification;
            self.icons.cancel(id);
        }
        feature.flags_mut().custom_icon = custom_icon.clone();

        let image = custom_icon.and_then(|url| match self.icons.cached(&url) {
            Some(image) => Some(image),
            None => {
                self.icons.request(id, entry.generation, &url);
                None
            }
        });
        let style = self.resolver.resolve(handler, feature, self.resolution, image);
        feature.set_style(style);
        Ok(())
    }

    /// Applies a finished icon load if it still matches the feature's state.
    pub fn on_icon_ready(&mut self, ready: IconReady) -> DispatchOutcome {
        if !self.icons.complete(&ready) {
            log::debug!("Discarding stale icon for '{}'", ready.feature_id);
            return DispatchOutcome::Ignored;
        }
        if ready.result.is_err() {
            return DispatchOutcome::Ignored;
        }
        let current = match self.index.get(&ready.feature_id) {
            Some(entry) => {
                entry.generation == ready.generation
                    && entry.classification.1.as_deref() == Some(ready.url.as_str())
            }
            None => false,
        };
        if !current {
            log::debug!("Icon for '{}' no longer applies", ready.feature_id);
            return DispatchOutcome::Ignored;
        }
        match self.restyle(&ready.feature_id) {
            Ok(()) => DispatchOutcome::Applied,
            Err(e) => {
                log::error!("Applying icon for '{}' failed: {}", ready.feature_id, e);
                DispatchOutcome::Ignored
            }
        }
    }

    /// Changes the view resolution and resizes everything on the map.
    pub fn set_resolution(&mut self, resolution: f64) -> DispatchOutcome {
        if !(resolution.is_finite() && resolution > 0.0) {
            log::warn!("Ignoring invalid view resolution {}", resolution);
            return DispatchOutcome::Ignored;
        }
        self.resolution = resolution;
        let ids: Vec<FeatureId> = self.index.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.restyle(&id) {
                log::error!("Restyle of '{}' failed: {}", id, e);
            }
        }
        for trail in self.history.trails_mut() {
            let points: Vec<FeatureId> = trail
                .source()
                .get_features()
                .map(|p| p.id().to_string())
                .collect();
            for point_id in points {
                let Some(point) = trail.source_mut().get_feature_by_id_mut(&point_id) else {
                    continue;
                };
                if let Some(handler) = self.registry.get(point.type_tag()) {
                    let style = self.resolver.resolve(handler, point, self.resolution, None);
                    point.set_style(style);
                }
            }
        }
        DispatchOutcome::Applied
    }

    fn set_focus(&mut self, kind: FocusKind, id: Option<FeatureId>) -> DispatchOutcome {
        let previous = std::mem::replace(self.focus.slot_mut(kind), id.clone());
        if previous == id {
            return DispatchOutcome::Ignored;
        }
        if let Some(prev) = previous {
            // The previously focused feature may have left the map meanwhile.
            let _ = self.update_flags(&prev, |flags| kind.apply(flags, false));
        }
        if let Some(next) = id {
            if let Err(e) = self.update_flags(&next, |flags| kind.apply(flags, true)) {
                log::debug!("Focus target not on the map yet: {}", e);
            }
        }
        DispatchOutcome::Applied
    }

    fn update_flags(
        &mut self,
        id: &str,
        change: impl FnOnce(&mut StyleFlags),
    ) -> Result<(), DispatchError> {
        change(self.feature_mut(id)?.flags_mut());
        self.restyle(id)
    }

    /// Feeds a notice to the alert highlighter and writes the resulting
    /// overlay color onto every feature with the notice's lookup key.
    pub fn apply_notice(&mut self, notice: &Notice) -> DispatchOutcome {
        let Some(update) = self.alerts.update(notice) else {
            return DispatchOutcome::Ignored;
        };
        let ids: Vec<FeatureId> = self
            .index
            .iter()
            .filter(|(_, e)| e.lookup_key == update.key)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            let color = update.color.clone();
            if let Err(e) = self.update_flags(&id, move |flags| flags.priority_color = color) {
                log::error!("Priority color for '{}' not applied: {}", id, e);
            }
        }
        DispatchOutcome::Applied
    }

    // --- History trails ---

    /// Appends a past position to its owner's trail. Every point gets its
    /// own id (`<feature id>#<serial>`) so positions accumulate.
    pub fn history(
        &mut self,
        feature: Feature,
        owner: Option<FeatureId>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let handler = self.resolve_handler(&feature.type_tag)?;
        let owner = owner.unwrap_or_else(|| feature.id.clone());
        if self.history.trail(&owner).is_none() {
            return Err(DispatchError::MissingTrail(owner));
        }
        let sub_type = classify(&handler.type_tag, &feature.properties.target, &self.classify);
        self.next_serial += 1;
        let point_id = format!("{}#{}", feature.id, self.next_serial);
        let mut point = RenderFeature::new(
            point_id,
            handler.type_tag.clone(),
            self.next_serial,
            feature.geometry.to_display(),
            feature.properties,
            StyleFlags {
                historical: true,
                track_sub_type: sub_type,
                ..StyleFlags::default()
            },
        );
        let style = self.resolver.resolve(&handler, &point, self.resolution, None);
        point.set_style(style);
        if let Some(trail) = self.history.trail_mut(&owner) {
            trail.source_mut().add_feature(point);
        }
        Ok(DispatchOutcome::Applied)
    }

    /// Opens a trail for `feature_id` and returns its z-index.
    pub fn history_start(&mut self, feature_id: &str) -> i32 {
        if let Some(trail) = self.history.trail(feature_id) {
            return trail.z_index();
        }
        let spec = LayerSpec {
            id: self.next_trail_layer,
            name: format!("history:{feature_id}"),
            z_index: self.history.next_z(),
        };
        self.next_trail_layer += 1;
        let source = (self.source_factory)(&spec);
        self.history.start(feature_id, source)
    }

    pub fn history_stop(&mut self, feature_id: &str) -> DispatchOutcome {
        match self.history.stop(feature_id) {
            Some(_) => DispatchOutcome::Applied,
            None => DispatchOutcome::Ignored,
        }
    }

    pub fn history_clear_all(&mut self) -> DispatchOutcome {
        let closed = self.history.clear_all();
        log::debug!("Closed {} trails", closed);
        DispatchOutcome::Applied
    }

    // --- Filtering ---

    /// Applies a filter configuration: hidden groups are evicted, manual
    /// features are hidden or shown one by one.
    pub fn filter_tracks(&mut self, groups: &[FilterGroup], manual_features: &[FeatureId]) -> DispatchOutcome {
        let actions = self.filters.filter_tracks(&self.registry, groups, manual_features);
        for action in actions {
            match action {
                FilterAction::Evict { type_tag, layer } => {
                    let evicted = self.evict_layer(layer);
                    log::info!("Filter evicted {} '{}' features", evicted, type_tag);
                }
                FilterAction::Hide(id) => {
                    if let Err(e) = self.hide(&id) {
                        log::error!("Filter could not hide '{}': {}", id, e);
                    }
                }
                FilterAction::Show(id) => {
                    if let Err(e) = self.show(&id) {
                        log::error!("Filter could not show '{}': {}", id, e);
                    }
                }
            }
        }
        DispatchOutcome::Applied
    }

    /// Drops every stream feature of a layer. User-authored features stay.
    fn evict_layer(&mut self, layer_id: LayerId) -> usize {
        let ids: Vec<FeatureId> = self
            .index
            .iter()
            .filter(|(_, e)| e.layer == layer_id && !e.manual)
            .map(|(id, _)| id.clone())
            .collect();
        let keeps_manual = self
            .index
            .values()
            .any(|e| e.layer == layer_id && e.manual);
        for id in &ids {
            self.index.remove(id);
            self.icons.cancel(id);
            if let Some(heatmap) = self.heatmap.as_mut() {
                heatmap.source_mut().remove_feature(id);
            }
        }
        if let Some(layer) = self.layers.get_mut(&layer_id) {
            if keeps_manual {
                for id in &ids {
                    layer.source_mut().remove_feature(id);
                }
            } else {
                layer.source_mut().clear();
            }
        }
        ids.len()
    }

    // --- Heatmap ---

    /// Turns the heatmap layer on (filled from every heatmap member) or off.
    pub fn set_heatmap(&mut self, enabled: bool) -> DispatchOutcome {
        match (enabled, self.heatmap.is_some()) {
            (true, true) | (false, false) => DispatchOutcome::Ignored,
            (false, true) => {
                self.heatmap = None;
                DispatchOutcome::Applied
            }
            (true, false) => {
                let spec = LayerSpec {
                    id: HEATMAP_LAYER,
                    name: "heatmap".to_string(),
                    z_index: HEATMAP_Z_INDEX,
                };
                let handle = LayerHandle::new(HEATMAP_LAYER, spec.name.clone());
                let source = (self.source_factory)(&spec);
                self.heatmap = Some(RenderLayer::new(spec, handle, source));
                let members: Vec<(Arc<Handler>, FeatureId)> = self
                    .index
                    .iter()
                    .filter_map(|(id, e)| {
                        let handler = self.registry.get(&e.type_tag)?;
                        handler.heatmap_member.then(|| (Arc::clone(handler), id.clone()))
                    })
                    .collect();
                for (handler, id) in members {
                    self.heatmap_upsert(&handler, &id);
                }
                DispatchOutcome::Applied
            }
        }
    }

    fn heatmap_upsert(&mut self, handler: &Handler, id: &str) {
        if !handler.heatmap_member {
            return;
        }
        let Some(heatmap) = self.heatmap.as_mut() else {
            return;
        };
        let Some(feature) = self
            .layers
            .get(&handler.layer)
            .and_then(|layer| layer.source().get_feature_by_id(id))
        else {
            return;
        };
        match feature.geometry().anchor() {
            Ok(coordinates) => {
                let sample = RenderFeature::new(
                    id.to_string(),
                    handler.type_tag.clone(),
                    feature.serial(),
                    Geometry::Point { coordinates },
                    Default::default(),
                    StyleFlags::default(),
                );
                heatmap.source_mut().add_feature(sample);
            }
            Err(e) => log::debug!("'{}' left out of the heatmap: {}", id, e),
        }
    }

    // --- Queries ---

    /// Where a tooltip for `id` should point, in display coordinates.
    pub fn anchor_point(&self, id: &str) -> Result<Coordinate, AnchorError> {
        self.feature(id)
            .ok_or_else(|| AnchorError::UnknownFeature(id.to_string()))?
            .geometry()
            .anchor()
    }

    /// `{total, visible}` over the base layers. A feature is visible when its
    /// layer is and its style is not nulled.
    pub fn counts(&self) -> FeatureCounts {
        self.layers.values().fold(FeatureCounts::default(), |mut acc, layer| {
            acc.total += layer.source().len() as u64;
            if layer.is_visible() {
                acc.visible += layer
                    .source()
                    .get_features()
                    .filter(|f| f.style().is_some())
                    .count() as u64;
            }
            acc
        })
    }

    pub fn feature(&self, id: &str) -> Option<&RenderFeature> {
        let entry = self.index.get(id)?;
        self.layers.get(&entry.layer)?.source().get_feature_by_id(id)
    }

    fn feature_mut(&mut self, id: &str) -> Result<&mut RenderFeature, DispatchError> {
        let layer = self
            .index
            .get(id)
            .map(|e| e.layer)
            .ok_or_else(|| DispatchError::MissingFeature(id.to_string()))?;
        self.layers
            .get_mut(&layer)
            .and_then(|l| l.source_mut().get_feature_by_id_mut(id))
            .ok_or_else(|| DispatchError::MissingFeature(id.to_string()))
    }

    /// The base layer a type tag renders into.
    pub fn layer_for(&self, type_tag: &str) -> Option<&RenderLayer> {
        let handler = self.registry.get(type_tag)?;
        self.layers.get(&handler.layer)
    }

    /// Base layers sorted by z-index.
    pub fn layers(&self) -> Vec<&RenderLayer> {
        let mut layers: Vec<&RenderLayer> = self.layers.values().collect();
        layers.sort_by_key(|l| l.z_index());
        layers
    }

    pub fn trail(&self, owner: &str) -> Option<&TrailLayer> {
        self.history.trail(owner)
    }

    pub fn heatmap(&self) -> Option<&RenderLayer> {
        self.heatmap.as_ref()
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn icon_table(&self) -> &Arc<CustomIconTable> {
        &self.icon_table
    }

    /// Icon loads currently in flight.
    pub fn pending_icons(&self) -> usize {
        self.icons.pending_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handlers::maritime_registry;
    use crate::core::icons::NoopIconLoader;

    fn dispatcher() -> Dispatcher {
        let (dispatcher, _rx) = Dispatcher::new(
            maritime_registry().unwrap(),
            DispatcherConfig::default(),
            Arc::new(NoopIconLoader),
        );
        dispatcher
    }

    fn vessel(id: &str, type_tag: &str, lon: f64) -> Feature {
        Feature::new(id, type_tag, Geometry::Point { coordinates: [lon, 38.0] })
    }

    #[test]
    fn type_change_moves_feature_between_layers() {
        let mut d = dispatcher();
        d.add(vessel("v1", "ais", 23.0)).unwrap();
        d.add(vessel("v1", "sat-ais", 23.1)).unwrap();
        assert_eq!(d.layer_for("ais").unwrap().source().len(), 0);
        assert_eq!(d.layer_for("sat-ais").unwrap().source().len(), 1);
        assert_eq!(d.counts().total, 1);
    }

    #[test]
    fn unregistered_tag_lands_on_unknown_layer() {
        let mut d = dispatcher();
        assert_eq!(d.add(vessel("d1", "drone", 23.0)).unwrap(), DispatchOutcome::Applied);
        assert_eq!(d.layer_for(UNKNOWN_TYPE).unwrap().source().len(), 1);
    }

    #[test]
    fn geometry_is_reprojected() {
        let mut d = dispatcher();
        d.add(vessel("v1", "ais", 180.0)).unwrap();
        let anchor = d.anchor_point("v1").unwrap();
        assert!((anchor[0] - std::f64::consts::PI * crate::core::geo::EARTH_RADIUS).abs() < 1e-6);
    }

    #[test]
    fn multipoint_anchor_error_stays_local() {
        let mut d = dispatcher();
        let cloud = Feature::new(
            "r1",
            "radar",
            Geometry::MultiPoint { coordinates: vec![[23.0, 38.0], [23.1, 38.1]] },
        );
        d.add(cloud).unwrap();
        assert_eq!(d.anchor_point("r1"), Err(AnchorError::Unsupported("MultiPoint")));
        // The stream keeps flowing.
        assert_eq!(d.add(vessel("v2", "ais", 23.0)).unwrap(), DispatchOutcome::Applied);
    }

    #[test]
    fn selection_restyles_old_and_new_target() {
        let mut d = dispatcher();
        d.add(vessel("a", "ais", 23.0)).unwrap();
        d.add(vessel("b", "ais", 23.2)).unwrap();
        d.handle_intent(UiIntent::Select(Some("a".into())));
        assert_eq!(d.feature("a").unwrap().style().unwrap().len(), 2);
        d.handle_intent(UiIntent::Select(Some("b".into())));
        assert_eq!(d.feature("a").unwrap().style().unwrap().len(), 1);
        assert!(d.feature("b").unwrap().flags().selected);
    }

    #[test]
    fn focus_applies_to_features_arriving_later() {
        let mut d = dispatcher();
        d.handle_intent(UiIntent::Select(Some("late".into())));
        d.add(vessel("late", "ais", 23.0)).unwrap();
        assert!(d.feature("late").unwrap().flags().selected);
    }

    #[test]
    fn heatmap_mirrors_member_layers() {
        let mut d = dispatcher();
        d.add(vessel("a", "ais", 23.0)).unwrap();
        d.add(vessel("p", "adsb", 23.0)).unwrap();
        d.dispatch(StreamEvent::HeatmapStart { enabled: true });
        assert_eq!(d.heatmap().unwrap().source().len(), 1);
        d.add(vessel("b", "ais", 23.5)).unwrap();
        assert_eq!(d.heatmap().unwrap().source().len(), 2);
        d.remove(&FeatureRef { id: "a".into(), type_tag: "ais".into() }).unwrap();
        assert_eq!(d.heatmap().unwrap().source().len(), 1);
        d.dispatch(StreamEvent::HeatmapStart { enabled: false });
        assert!(d.heatmap().is_none());
    }

    #[test]
    fn resolution_change_resizes_icons() {
        let mut d = dispatcher();
        d.add(vessel("a", "ais", 23.0)).unwrap();
        let before = d.feature("a").unwrap().style().unwrap()[0].clone();
        d.handle_intent(UiIntent::SetResolution(DEFAULT_MAX_RESOLUTION / 2f64.powi(14)));
        let after = d.feature("a").unwrap().style().unwrap()[0].clone();
        match (before, after) {
            (
                crate::core::styles::ResolvedStyle::Icon { scale: s0, .. },
                crate::core::styles::ResolvedStyle::Icon { scale: s1, .. },
            ) => assert!(s1 > s0),
            other => panic!("unexpected styles {other:?}"),
        }
        assert_eq!(d.handle_intent(UiIntent::SetResolution(-1.0)), DispatchOutcome::Ignored);
    }
}
