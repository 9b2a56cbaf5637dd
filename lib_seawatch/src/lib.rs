//! # Seawatch Engine Library
//!
//! Real-time feature dispatch and styling for the Seawatch map. The `core`
//! module is always compiled; configuration, logging and the HTTP icon loader
//! are gated behind cargo features so embedders only pull what they use.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// The dispatch engine: feature model, registry, styling, alerts, trails and filters.
pub mod core;

/// Engine configuration and administrative snapshots (icon table, filter groups).
#[cfg(feature = "configs")]
pub mod configs;

/// Tracing subscriber initialisation for binaries embedding the engine.
#[cfg(feature = "loggers")]
pub mod loggers;

// Re-export the types most callers need.
pub use crate::core::{
    Dispatcher, DispatchOutcome, Engine, EngineHandle, Feature, FeatureCounts, LayerHandle,
    LayerRegistry, StreamEvent, UiIntent,
};
