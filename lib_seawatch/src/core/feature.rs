//! # Feature Data Model
//!
//! The shapes that arrive on the stream: a feature is one trackable entity
//! (vessel, aircraft, beacon, marker, zone) identified by `id` and routed by
//! `type_tag`. Geometry arrives in longitude/latitude and is reprojected with
//! [`Geometry::to_display`] before it enters a layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::geo::{self, Coordinate};

/// Identity of a feature. Unique across every live layer at any instant.
pub type FeatureId = String;

/// A track-type tag such as `"ais"` or `"sart"`.
pub type TypeTag = String;

/// Raised when an anchor point is requested for a geometry that has none.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnchorError {
    #[error("cannot compute an anchor point for {0} geometry")]
    Unsupported(&'static str),

    #[error("polygon has no coordinates")]
    EmptyPolygon,

    #[error("feature '{0}' is not present in any layer")]
    UnknownFeature(FeatureId),
}

/// GeoJSON-like geometry. Circles carry a ground radius in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Coordinate },
    MultiPoint { coordinates: Vec<Coordinate> },
    Polygon { coordinates: Vec<Vec<Coordinate>> },
    Circle { center: Coordinate, radius: f64 },
}

impl Geometry {
    /// Short name used in log lines and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::Circle { .. } => "Circle",
        }
    }

    /// Reprojects into the display CRS.
    pub fn to_display(&self) -> Geometry {
        match self {
            Geometry::Point { coordinates } => Geometry::Point {
                coordinates: geo::to_display(*coordinates),
            },
            Geometry::MultiPoint { coordinates } => Geometry::MultiPoint {
                coordinates: coordinates.iter().copied().map(geo::to_display).collect(),
            },
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: coordinates
                    .iter()
                    .map(|ring| ring.iter().copied().map(geo::to_display).collect())
                    .collect(),
            },
            Geometry::Circle { center, radius } => Geometry::Circle {
                center: geo::to_display(*center),
                radius: geo::display_radius(*radius, center[1]),
            },
        }
    }

    /// Single point a tooltip or heatmap sample hangs off.
    ///
    /// Points anchor on themselves, circles on their centre and polygons on the
    /// vertex average of the outer ring. Multi-point geometries have no single
    /// anchor and yield [`AnchorError::Unsupported`].
    pub fn anchor(&self) -> Result<Coordinate, AnchorError> {
        match self {
            Geometry::Point { coordinates } => Ok(*coordinates),
            Geometry::Circle { center, .. } => Ok(*center),
            Geometry::Polygon { coordinates } => {
                let ring = coordinates.first().ok_or(AnchorError::EmptyPolygon)?;
                // A closed ring repeats its first vertex at the end.
                let open = match ring.split_last() {
                    Some((last, rest)) if !rest.is_empty() && Some(last) == rest.first() => rest,
                    _ => ring.as_slice(),
                };
                if open.is_empty() {
                    return Err(AnchorError::EmptyPolygon);
                }
                let n = open.len() as f64;
                let (sx, sy) = open
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), [x, y]| (sx + x, sy + y));
                Ok([sx / n, sy / n])
            }
            Geometry::MultiPoint { .. } => Err(AnchorError::Unsupported(self.kind())),
        }
    }
}

/// Derived classification used to pick icons and custom-icon overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackSubType {
    Fishing,
    Towing,
    Military,
    Sailing,
    Pleasure,
    HighSpeed,
    Pilot,
    SearchAndRescue,
    Tug,
    Passenger,
    Cargo,
    Tanker,
    Other,
    Stationary,
    Normal,
    Sart,
    Mob,
    Epirb,
}

impl TrackSubType {
    /// Key used in the custom-icon table and in builtin icon paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSubType::Fishing => "fishing",
            TrackSubType::Towing => "towing",
            TrackSubType::Military => "military",
            TrackSubType::Sailing => "sailing",
            TrackSubType::Pleasure => "pleasure",
            TrackSubType::HighSpeed => "highSpeed",
            TrackSubType::Pilot => "pilot",
            TrackSubType::SearchAndRescue => "searchAndRescue",
            TrackSubType::Tug => "tug",
            TrackSubType::Passenger => "passenger",
            TrackSubType::Cargo => "cargo",
            TrackSubType::Tanker => "tanker",
            TrackSubType::Other => "other",
            TrackSubType::Stationary => "stationary",
            TrackSubType::Normal => "normal",
            TrackSubType::Sart => "sart",
            TrackSubType::Mob => "mob",
            TrackSubType::Epirb => "epirb",
        }
    }
}

/// Live telemetry of the tracked target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Coordinate>,
    /// Course over ground, degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    /// True heading, degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Speed over ground, knots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mmsi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// ITU-R M.1371 ship-and-cargo type code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_type: Option<u16>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Domain properties as delivered by the stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    #[serde(default)]
    pub target: TargetInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Visual state flags read by the style pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleFlags {
    pub selected: bool,
    pub hovering: bool,
    pub historical: bool,
    pub hidden: bool,
    pub crosshairs: bool,
    pub editing: bool,
    /// Image URL overriding the builtin icon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_sub_type: Option<TrackSubType>,
    /// Alert overlay color; absent when no notice is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_color: Option<String>,
}

/// One feature as received from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: FeatureId,
    pub type_tag: TypeTag,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: FeatureProperties,
    #[serde(default)]
    pub style_flags: StyleFlags,
}

impl Feature {
    pub fn new(id: impl Into<FeatureId>, type_tag: impl Into<TypeTag>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            geometry,
            properties: FeatureProperties::default(),
            style_flags: StyleFlags::default(),
        }
    }

    /// Key alerts are matched against: the MMSI when known, else the id.
    pub fn lookup_key(&self) -> &str {
        self.properties.target.mmsi.as_deref().unwrap_or(&self.id)
    }
}

/// Just enough of a feature to route a removal. A full feature payload also
/// deserialises into this, the extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRef {
    pub id: FeatureId,
    pub type_tag: TypeTag,
}

impl From<&Feature> for FeatureRef {
    fn from(feature: &Feature) -> Self {
        Self {
            id: feature.id.clone(),
            type_tag: feature.type_tag.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialises_stream_payload() {
        let feature: Feature = serde_json::from_value(json!({
            "id": "ais-237000001",
            "typeTag": "ais",
            "geometry": { "type": "Point", "coordinates": [23.6, 37.9] },
            "properties": {
                "target": { "mmsi": "237000001", "course": 90.0, "vesselType": 70, "imo": 9000001 },
                "source": "terrestrial"
            }
        }))
        .unwrap();
        assert_eq!(feature.lookup_key(), "237000001");
        assert_eq!(feature.properties.target.vessel_type, Some(70));
        assert_eq!(feature.properties.target.extra["imo"], json!(9000001));
        assert_eq!(feature.properties.extra["source"], json!("terrestrial"));
        assert!(!feature.style_flags.selected);
    }

    #[test]
    fn polygon_anchor_ignores_closing_vertex() {
        let square = Geometry::Polygon {
            coordinates: vec![vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]],
        };
        assert_eq!(square.anchor(), Ok([1.0, 1.0]));
    }

    #[test]
    fn multipoint_has_no_anchor() {
        let cloud = Geometry::MultiPoint { coordinates: vec![[0.0, 0.0], [1.0, 1.0]] };
        assert_eq!(cloud.anchor(), Err(AnchorError::Unsupported("MultiPoint")));
    }

    #[test]
    fn full_payload_reads_as_reference() {
        let r: FeatureRef = serde_json::from_value(json!({
            "id": "x", "typeTag": "adsb", "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
        }))
        .unwrap();
        assert_eq!(r.type_tag, "adsb");
    }
}
