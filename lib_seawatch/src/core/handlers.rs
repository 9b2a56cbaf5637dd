//! Per-type handler descriptors for the maritime picture.
//!
//! Each track type gets a style function that picks its builtin icon and
//! color from the classification flags. [`maritime_registry`] registers the
//! full set used by the application.

use crate::core::feature::TrackSubType;
use crate::core::registry::{
    HandlerDescriptor, IconInitializer, LayerRegistry, RegistryError, StyleFn, UNKNOWN_TYPE,
};
use crate::core::render::RenderFeature;
use crate::core::styles::{Stroke, StyleParams};

/// Filter group whose members are toggled one by one instead of evicted.
pub const MANUAL_GROUP: &str = "manual";

/// Type tag of user-authored markers.
pub const MARKER_TYPE: &str = "marker";

fn sub_type(feature: &RenderFeature) -> Option<TrackSubType> {
    feature.flags().track_sub_type
}

fn ais_color(sub: Option<TrackSubType>) -> &'static str {
    match sub {
        Some(TrackSubType::Cargo) => "#4caf50",
        Some(TrackSubType::Tanker) => "#f44336",
        Some(TrackSubType::Passenger) => "#2196f3",
        Some(TrackSubType::Fishing) => "#ff9800",
        Some(TrackSubType::HighSpeed) => "#ffeb3b",
        Some(TrackSubType::Military) => "#607d8b",
        Some(TrackSubType::Sailing | TrackSubType::Pleasure) => "#9c27b0",
        Some(TrackSubType::Tug | TrackSubType::Towing | TrackSubType::Pilot) => "#00bcd4",
        Some(TrackSubType::SearchAndRescue) => "#e91e63",
        _ => "#9e9e9e",
    }
}

fn ais_style(feature: &RenderFeature, _resolution: f64) -> StyleParams {
    let sub = sub_type(feature);
    let name = sub.map(|s| s.as_str()).unwrap_or("other");
    StyleParams::icon(format!("icons/ais/{name}.svg"), Some(ais_color(sub))).with_base_scale(0.8)
}

fn sat_ais_style(feature: &RenderFeature, resolution: f64) -> StyleParams {
    let mut params = ais_style(feature, resolution);
    params.opacity = 0.85;
    params
}

fn omnicom_style(feature: &RenderFeature, _resolution: f64) -> StyleParams {
    match sub_type(feature) {
        Some(TrackSubType::Stationary) => {
            StyleParams::icon("icons/omnicom/stationary.svg", Some("#795548")).with_base_scale(0.7)
        }
        _ => StyleParams::icon("icons/omnicom/normal.svg", Some("#3f51b5")).with_base_scale(0.8),
    }
}

fn beacon_style(feature: &RenderFeature, _resolution: f64) -> StyleParams {
    let (src, color) = match sub_type(feature) {
        Some(TrackSubType::Mob) => ("icons/beacon/mob.svg", "#ff1744"),
        Some(TrackSubType::Epirb) => ("icons/beacon/epirb.svg", "#ff9100"),
        _ => ("icons/beacon/sart.svg", "#ff3d00"),
    };
    StyleParams::icon(src, Some(color)).with_base_scale(1.0)
}

fn vms_style(_feature: &RenderFeature, _resolution: f64) -> StyleParams {
    StyleParams::icon("icons/vms/vessel.svg", Some("#009688")).with_base_scale(0.8)
}

fn adsb_style(_feature: &RenderFeature, _resolution: f64) -> StyleParams {
    StyleParams::icon("icons/air/aircraft.svg", Some("#212121")).with_base_scale(0.9)
}

fn radar_style(_feature: &RenderFeature, _resolution: f64) -> StyleParams {
    StyleParams::icon("icons/radar/plot.svg", Some("#8bc34a")).with_base_scale(0.6)
}

fn alert_style(feature: &RenderFeature, _resolution: f64) -> StyleParams {
    match feature.geometry() {
        crate::core::feature::Geometry::Point { .. } => {
            StyleParams::icon("icons/alert/alert.svg", Some("#d50000")).with_base_scale(1.0)
        }
        _ => StyleParams::shape(Stroke::solid("#d50000", 2.0), Some("rgba(213,0,0,0.15)")),
    }
}

fn zone_style(feature: &RenderFeature, _resolution: f64) -> StyleParams {
    let mut params = StyleParams::shape(Stroke::solid("#3f51b5", 2.0), Some("rgba(63,81,181,0.12)"));
    params.label = feature
        .properties()
        .metadata
        .as_ref()
        .and_then(|m| m.get("name"))
        .and_then(|n| n.as_str())
        .map(str::to_string);
    params
}

fn marker_style(feature: &RenderFeature, _resolution: f64) -> StyleParams {
    let color = feature
        .properties()
        .metadata
        .as_ref()
        .and_then(|m| m.get("color"))
        .and_then(|c| c.as_str())
        .unwrap_or("#ff4081");
    let mut params = StyleParams::icon("icons/marker/pin.svg", Some(color)).with_base_scale(1.0);
    params.label = feature.properties().target.name.clone();
    params
}

fn unknown_style(_feature: &RenderFeature, _resolution: f64) -> StyleParams {
    StyleParams::icon("icons/unknown.svg", Some("#757575")).with_base_scale(0.7)
}

/// Markers carry their own icon, either in the style flags or as
/// `metadata.icon`.
fn marker_icon(feature: &RenderFeature) -> Option<String> {
    feature.flags().custom_icon.clone().or_else(|| {
        feature
            .properties()
            .metadata
            .as_ref()
            .and_then(|m| m.get("icon"))
            .and_then(|i| i.as_str())
            .map(str::to_string)
    })
}

fn descriptor(
    type_tag: &str,
    track_group: &str,
    z_index: i32,
    style_fn: StyleFn,
    icon_initializer: Option<IconInitializer>,
    heatmap_member: bool,
) -> HandlerDescriptor {
    HandlerDescriptor {
        type_tag: type_tag.to_string(),
        track_group: track_group.to_string(),
        z_index,
        style_fn,
        icon_initializer,
        heatmap_member,
    }
}

/// Descriptors for every track type the application knows, lowest layer first.
pub fn maritime_descriptors() -> Vec<HandlerDescriptor> {
    vec![
        descriptor("zone", "zone", 10, zone_style, None, false),
        descriptor(UNKNOWN_TYPE, "unknown", 11, unknown_style, None, false),
        descriptor("radar", "radar", 12, radar_style, None, true),
        descriptor("vms", "vms", 14, vms_style, None, true),
        descriptor("omnicom", "omnicom", 16, omnicom_style, None, true),
        descriptor("sat-ais", "ais", 17, sat_ais_style, None, true),
        descriptor("ais", "ais", 18, ais_style, None, true),
        descriptor("adsb", "air", 20, adsb_style, None, false),
        descriptor("sart", "beacon", 22, beacon_style, None, false),
        descriptor("epirb", "beacon", 23, beacon_style, None, false),
        descriptor("alert", "alert", 24, alert_style, None, false),
        descriptor(MARKER_TYPE, MANUAL_GROUP, 26, marker_style, Some(marker_icon), false),
    ]
}

/// Registry with all maritime track types.
pub fn maritime_registry() -> Result<LayerRegistry, RegistryError> {
    let mut builder = LayerRegistry::builder();
    for descriptor in maritime_descriptors() {
        builder.register(descriptor)?;
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feature::{FeatureProperties, Geometry, StyleFlags};
    use crate::core::styles::IconSource;
    use serde_json::json;

    fn feature(type_tag: &str, flags: StyleFlags, properties: FeatureProperties) -> RenderFeature {
        RenderFeature::new(
            "f".into(),
            type_tag.into(),
            1,
            Geometry::Point { coordinates: [0.0, 0.0] },
            properties,
            flags,
        )
    }

    #[test]
    fn registry_covers_all_types_below_history() {
        let registry = maritime_registry().unwrap();
        assert!(registry.get("ais").is_some());
        assert!(registry.get(UNKNOWN_TYPE).is_some());
        assert!(registry.max_z_index() < 30);
        assert_eq!(registry.handlers_in_group("ais").count(), 2);
    }

    #[test]
    fn ais_icon_follows_subtype() {
        let flags = StyleFlags { track_sub_type: Some(TrackSubType::Tanker), ..Default::default() };
        let params = ais_style(&feature("ais", flags, FeatureProperties::default()), 10.0);
        assert_eq!(params.icon, Some(IconSource::Builtin { src: "icons/ais/tanker.svg".into() }));
        assert_eq!(params.color.as_deref(), Some("#f44336"));
    }

    #[test]
    fn marker_icon_prefers_flags_then_metadata() {
        let props = FeatureProperties { metadata: Some(json!({ "icon": "meta.png" })), ..Default::default() };
        let plain = feature(MARKER_TYPE, StyleFlags::default(), props.clone());
        assert_eq!(marker_icon(&plain).as_deref(), Some("meta.png"));

        let flags = StyleFlags { custom_icon: Some("flag.png".into()), ..Default::default() };
        let flagged = feature(MARKER_TYPE, flags, props);
        assert_eq!(marker_icon(&flagged).as_deref(), Some("flag.png"));
    }
}
