//! # Style Resolution Pipeline
//!
//! A handler's style function produces the base [`StyleParams`]; the resolver
//! then runs the scale and target stylers and the overlay stages in a fixed
//! order before turning the parameters into one or two [`ResolvedStyle`]s.
//!
//! Overlay order: history, hover, hidden, priority color, selection, editing,
//! crosshairs. Selection and crosshairs both write the overlay icon slot, so
//! crosshairs wins when both are set; neither touches the primary icon.

use std::sync::Arc;

use crate::core::feature::{FeatureProperties, StyleFlags, TargetInfo};
use crate::core::icons::LoadedIcon;
use crate::core::registry::Handler;
use crate::core::render::RenderFeature;
use crate::core::styles::params::{IconSource, OverlayIcon, ResolvedStyle, StyleParams};

/// Resolution at zoom level 0 of the web Mercator tile pyramid (metres/pixel).
pub const DEFAULT_MAX_RESOLUTION: f64 = 156_543.033_928_040_97;

const SELECTION_ICON: &str = "icons/overlay/selection.svg";
const SELECTION_COLOR: &str = "#00e5ff";
const CROSSHAIRS_ICON: &str = "icons/overlay/crosshairs.svg";
const EDITING_COLOR: &str = "#ffa000";

/// Sizes icons for the view resolution.
///
/// `zoom = log2(max_resolution / resolution)` and
/// `scale = base_scale * log10((zoom / 20) * 10)`. The curve is a visual tuning
/// shared by every track type; keep it as is.
pub fn scale_styler(params: &mut StyleParams, resolution: f64, max_resolution: f64) {
    if !(resolution.is_finite() && resolution > 0.0) {
        log::warn!("Ignoring invalid view resolution {}", resolution);
        return;
    }
    let zoom = (max_resolution / resolution).log2();
    params.scale = params.base_scale * ((zoom / 20.0) * 10.0).log10();
}

/// Rotates the icon along the course, falling back to the heading. A zero
/// bearing leaves the rotation alone.
pub fn target_styler(params: &mut StyleParams, target: &TargetInfo) {
    let usable = |deg: &f64| deg.is_finite() && *deg != 0.0 && *deg < 360.0;
    let bearing = target
        .course
        .filter(usable)
        .or_else(|| target.heading.filter(usable));
    if let Some(deg) = bearing {
        params.rotation = deg.to_radians();
    }
}

fn history_styler(params: &mut StyleParams, flags: &StyleFlags) {
    if flags.historical {
        params.opacity *= 0.6;
        params.scale *= 0.6;
        params.label = None;
    }
}

fn hover_styler(params: &mut StyleParams, flags: &StyleFlags, properties: &FeatureProperties) {
    if flags.hovering {
        params.scale *= 1.25;
        if params.label.is_none() {
            params.label = properties.target.name.clone();
        }
    }
}

fn hidden_styler(params: &mut StyleParams, flags: &StyleFlags) {
    if flags.hidden {
        params.visible = false;
    }
}

fn priority_color_styler(params: &mut StyleParams, flags: &StyleFlags) {
    if let Some(color) = &flags.priority_color {
        params.color = Some(color.clone());
        if let Some(stroke) = params.stroke.as_mut() {
            stroke.color = color.clone();
        }
    }
}

fn selection_styler(params: &mut StyleParams, flags: &StyleFlags) {
    if flags.selected {
        params.overlay = Some(OverlayIcon {
            src: SELECTION_ICON.to_string(),
            color: Some(SELECTION_COLOR.to_string()),
            scale: params.scale * 1.4,
        });
        if let Some(stroke) = params.stroke.as_mut() {
            stroke.width += 2.0;
        }
    }
}

fn editing_styler(params: &mut StyleParams, flags: &StyleFlags) {
    if flags.editing {
        match params.stroke.as_mut() {
            Some(stroke) => {
                stroke.dashed = true;
                stroke.color = EDITING_COLOR.to_string();
            }
            None => params.opacity *= 0.8,
        }
    }
}

fn crosshairs_styler(params: &mut StyleParams, flags: &StyleFlags) {
    if flags.crosshairs {
        params.overlay = Some(OverlayIcon {
            src: CROSSHAIRS_ICON.to_string(),
            color: params.color.clone(),
            scale: params.scale * 2.0,
        });
    }
}

/// Runs the overlay stages in their fixed order.
pub fn apply_overlays(params: &mut StyleParams, flags: &StyleFlags, properties: &FeatureProperties) {
    history_styler(params, flags);
    hover_styler(params, flags, properties);
    hidden_styler(params, flags);
    priority_color_styler(params, flags);
    selection_styler(params, flags);
    editing_styler(params, flags);
    crosshairs_styler(params, flags);
}

/// Turns parameters into renderable styles: the primary style plus the
/// overlay icon when one is set. Invisible parameters resolve to `None`.
pub fn resolve_stylers(params: &StyleParams) -> Option<Vec<ResolvedStyle>> {
    if !params.visible {
        return None;
    }
    let primary = match &params.icon {
        Some(source) => ResolvedStyle::Icon {
            source: source.clone(),
            color: match source {
                IconSource::Builtin { .. } => params.color.clone(),
                IconSource::Image { .. } => None,
            },
            scale: params.scale,
            rotation: params.rotation,
            opacity: params.opacity,
            label: params.label.clone(),
            z_index: params.z_index,
        },
        None => ResolvedStyle::Shape {
            stroke: params.stroke.clone(),
            fill: params.fill.clone(),
            opacity: params.opacity,
            label: params.label.clone(),
            z_index: params.z_index,
        },
    };
    let mut styles = vec![primary];
    if let Some(overlay) = &params.overlay {
        styles.push(ResolvedStyle::Icon {
            source: IconSource::Builtin { src: overlay.src.clone() },
            color: overlay.color.clone(),
            scale: overlay.scale,
            rotation: 0.0,
            opacity: params.opacity,
            label: None,
            z_index: params.z_index + 1,
        });
    }
    Some(styles)
}

/// Holds the view constants the pipeline needs.
#[derive(Debug, Clone)]
pub struct StyleResolver {
    max_resolution: f64,
    /// Global multiplier on every handler's base scale.
    base_scale: f64,
}

impl Default for StyleResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESOLUTION)
    }
}

impl StyleResolver {
    pub fn new(max_resolution: f64) -> Self {
        Self {
            max_resolution,
            base_scale: 1.0,
        }
    }

    pub fn with_base_scale(mut self, base_scale: f64) -> Self {
        self.base_scale = base_scale;
        self
    }

    pub fn max_resolution(&self) -> f64 {
        self.max_resolution
    }

    /// Computes the parameter object for `feature`, without resolving it.
    pub fn params(
        &self,
        handler: &Handler,
        feature: &RenderFeature,
        resolution: f64,
        image: Option<Arc<LoadedIcon>>,
    ) -> StyleParams {
        let mut params = (handler.style_fn)(feature, resolution);
        params.z_index = handler.z_index;
        if params.icon.is_some() {
            params.base_scale *= self.base_scale;
            if let Some(image) = image {
                params.icon = Some(IconSource::Image {
                    url: image.url.clone(),
                    image,
                });
            }
            scale_styler(&mut params, resolution, self.max_resolution);
            target_styler(&mut params, &feature.properties().target);
        }
        apply_overlays(&mut params, feature.flags(), feature.properties());
        params
    }

    /// Full pipeline: parameters, then renderable styles.
    pub fn resolve(
        &self,
        handler: &Handler,
        feature: &RenderFeature,
        resolution: f64,
        image: Option<Arc<LoadedIcon>>,
    ) -> Option<Vec<ResolvedStyle>> {
        resolve_stylers(&self.params(handler, feature, resolution, image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::styles::params::Stroke;

    fn base() -> StyleParams {
        StyleParams::icon("icons/ais/cargo.svg", Some("#4caf50"))
    }

    #[test]
    fn scale_at_zoom_twenty_is_base_scale() {
        let mut params = base().with_base_scale(0.8);
        let resolution = DEFAULT_MAX_RESOLUTION / 2f64.powi(20);
        scale_styler(&mut params, resolution, DEFAULT_MAX_RESOLUTION);
        assert!((params.scale - 0.8).abs() < 1e-9);
    }

    #[test]
    fn scale_ignores_non_positive_resolution() {
        let mut params = base();
        scale_styler(&mut params, 0.0, DEFAULT_MAX_RESOLUTION);
        assert_eq!(params.scale, 1.0);
    }

    #[test]
    fn course_wins_over_heading() {
        let mut params = base();
        let target = TargetInfo { course: Some(90.0), heading: Some(180.0), ..Default::default() };
        target_styler(&mut params, &target);
        assert!((params.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn zero_course_falls_back_to_heading() {
        let mut params = base();
        let target = TargetInfo { course: Some(0.0), heading: Some(180.0), ..Default::default() };
        target_styler(&mut params, &target);
        assert!((params.rotation - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn unavailable_heading_is_ignored() {
        let mut params = base();
        let target = TargetInfo { heading: Some(511.0), ..Default::default() };
        target_styler(&mut params, &target);
        assert_eq!(params.rotation, 0.0);
    }

    #[test]
    fn crosshairs_take_the_overlay_slot_from_selection() {
        let mut params = base();
        let flags = StyleFlags { selected: true, crosshairs: true, ..Default::default() };
        apply_overlays(&mut params, &flags, &FeatureProperties::default());
        let styles = resolve_stylers(&params).unwrap();
        assert_eq!(styles.len(), 2);
        match &styles[1] {
            ResolvedStyle::Icon { source: IconSource::Builtin { src }, .. } => {
                assert_eq!(src, CROSSHAIRS_ICON)
            }
            other => panic!("unexpected overlay {other:?}"),
        }
        // The primary icon is untouched.
        assert!(matches!(&styles[0], ResolvedStyle::Icon { source: IconSource::Builtin { src }, .. } if src == "icons/ais/cargo.svg"));
    }

    #[test]
    fn priority_color_tints_icon_and_stroke() {
        let mut params = StyleParams::shape(Stroke::solid("#3f51b5", 2.0), Some("rgba(63,81,181,0.2)"));
        let flags = StyleFlags { priority_color: Some("#ff0000".into()), ..Default::default() };
        apply_overlays(&mut params, &flags, &FeatureProperties::default());
        assert_eq!(params.stroke.unwrap().color, "#ff0000");
        assert_eq!(params.color.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn hidden_resolves_to_nothing() {
        let mut params = base();
        let flags = StyleFlags { hidden: true, selected: true, ..Default::default() };
        apply_overlays(&mut params, &flags, &FeatureProperties::default());
        assert!(resolve_stylers(&params).is_none());
    }

    #[test]
    fn history_fades_and_shrinks() {
        let mut params = base();
        let flags = StyleFlags { historical: true, ..Default::default() };
        apply_overlays(&mut params, &flags, &FeatureProperties::default());
        assert!((params.opacity - 0.6).abs() < 1e-12);
        assert!((params.scale - 0.6).abs() < 1e-12);
    }
}
