//! # Styles
//!
//! Parameter object, overlay pipeline and the primitives a renderer draws.

/// Style parameters and resolved primitives.
pub mod params;
/// The ordered stylers and the resolver that runs them.
pub mod resolver;

pub use params::{IconSource, OverlayIcon, ResolvedStyle, Stroke, StyleParams};
pub use resolver::{
    apply_overlays, resolve_stylers, scale_styler, target_styler, StyleResolver,
    DEFAULT_MAX_RESOLUTION,
};
