//! Style parameter object and the renderable primitives it resolves into.

use std::sync::Arc;

use crate::core::icons::LoadedIcon;

/// Where the primary icon comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum IconSource {
    /// A bitmap shipped with the application, tinted by `StyleParams::color`.
    Builtin { src: String },
    /// An uploaded image, already loaded.
    Image { url: String, image: Arc<LoadedIcon> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
    pub dashed: bool,
}

impl Stroke {
    pub fn solid(color: impl Into<String>, width: f64) -> Self {
        Self {
            color: color.into(),
            width,
            dashed: false,
        }
    }
}

/// Second icon drawn on top of the primary one (selection ring, crosshairs).
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayIcon {
    pub src: String,
    pub color: Option<String>,
    pub scale: f64,
}

/// Mutable parameter object threaded through the style pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleParams {
    /// `None` for area features drawn with stroke and fill only.
    pub icon: Option<IconSource>,
    pub color: Option<String>,
    pub base_scale: f64,
    pub scale: f64,
    /// Radians, clockwise from north.
    pub rotation: f64,
    pub opacity: f64,
    pub stroke: Option<Stroke>,
    pub fill: Option<String>,
    pub label: Option<String>,
    pub overlay: Option<OverlayIcon>,
    pub z_index: i32,
    pub visible: bool,
}

impl StyleParams {
    /// Parameters for a point feature drawn with a builtin icon.
    pub fn icon(src: impl Into<String>, color: Option<&str>) -> Self {
        Self {
            icon: Some(IconSource::Builtin { src: src.into() }),
            color: color.map(str::to_string),
            ..Self::blank()
        }
    }

    /// Parameters for an area feature.
    pub fn shape(stroke: Stroke, fill: Option<&str>) -> Self {
        Self {
            stroke: Some(stroke),
            fill: fill.map(str::to_string),
            ..Self::blank()
        }
    }

    pub fn with_base_scale(mut self, base_scale: f64) -> Self {
        self.base_scale = base_scale;
        self.scale = base_scale;
        self
    }

    fn blank() -> Self {
        Self {
            icon: None,
            color: None,
            base_scale: 1.0,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            stroke: None,
            fill: None,
            label: None,
            overlay: None,
            z_index: 0,
            visible: true,
        }
    }
}

/// A renderable style primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedStyle {
    Icon {
        source: IconSource,
        color: Option<String>,
        scale: f64,
        rotation: f64,
        opacity: f64,
        label: Option<String>,
        z_index: i32,
    },
    Shape {
        stroke: Option<Stroke>,
        fill: Option<String>,
        opacity: f64,
        label: Option<String>,
        z_index: i32,
    },
}

impl ResolvedStyle {
    pub fn z_index(&self) -> i32 {
        match self {
            ResolvedStyle::Icon { z_index, .. } | ResolvedStyle::Shape { z_index, .. } => *z_index,
        }
    }
}
