//! # Core Engine Module
//!
//! This module forms the heart of the `seawatch` feature dispatch engine. It
//! takes a real-time stream of maritime and aerial tracks, routes every event
//! to the layer its type belongs to, and resolves each feature's visual style
//! from its type, subtype, alert state and the current UI focus.
//!
//! ## Core Components:
//!
//! - **`dispatcher`**: The single entry point. It applies stream events and UI
//!   intents, keeps the feature ownership index and the icon tasks, and never
//!   lets one bad event stop the stream.
//!
//! - **`registry`**: The static table of type handlers. Each handler owns one
//!   layer at a fixed z-index; unknown types fall back to the `unknown` handler.
//!
//! - **`styles`**: The style parameter object and the ordered overlay pipeline
//!   (history, hover, hidden, priority color, selection, editing, crosshairs).
//!
//! - **`history`**, **`filter`**, **`alerts`**: trail layers on their own z
//!   stack, group visibility with eviction, and per-target notice buckets.
//!
//! - **`event_loop`**: Runs a dispatcher on one tokio task behind a cloneable
//!   [`EngineHandle`].
//!
//! By declaring and re-exporting these components, the `core` module provides a
//! unified public API for the binaries and integration tests.

#![forbid(unsafe_code)]

/// Alert notice buckets and their overlay colors.
pub mod alerts;
/// Track subtype classification.
pub mod classify;
/// The central dispatcher applying stream events and UI intents.
pub mod dispatcher;
/// The tokio task that owns a dispatcher.
pub mod event_loop;
/// Stream events, UI intents and dispatch outcomes.
pub mod events;
/// Features, geometries and style flags.
pub mod feature;
/// Group visibility and eviction.
pub mod filter;
/// Coordinate reprojection.
pub mod geo;
/// The built-in maritime type handlers.
pub mod handlers;
/// Per-feature history trails.
pub mod history;
/// Custom icon table and async icon loads.
pub mod icons;
/// Type-tag to handler and layer registry.
pub mod registry;
/// Render layers and the source seam renderers implement.
pub mod render;
/// Style parameters and the resolution pipeline.
pub mod styles;

// --- Public API Re-exports ---
pub use alerts::{AlertColors, AlertHighlighter, Notice, NoticeAction};
pub use dispatcher::{DispatchError, Dispatcher, DispatcherConfig};
pub use event_loop::{Engine, EngineError, EngineHandle};
pub use events::{DispatchOutcome, FeatureCounts, StreamEvent, UiIntent};
pub use feature::{Feature, FeatureId, FeatureRef, Geometry, StyleFlags, TargetInfo, TrackSubType};
pub use filter::FilterGroup;
pub use handlers::maritime_registry;
pub use icons::{CustomIconEntry, CustomIconTable, IconLoader, NoopIconLoader};
pub use registry::{LayerRegistry, RegistryError};
pub use render::{LayerHandle, LayerSource, RenderFeature, RenderLayer};
