//! Inputs and outputs of the dispatcher.
//!
//! Stream events deserialise straight from the transport's JSON, tagged by
//! `"status"`:
//!
//! ```json
//! { "status": "Current", "feature": { "id": "ais-1", "typeTag": "ais", "geometry": { ... } } }
//! { "status": "HistoryStart", "featureId": "ais-1" }
//! { "status": "CountOnly", "total": 812, "visible": 640 }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::alerts::Notice;
use crate::core::feature::{Feature, FeatureId, FeatureRef};
use crate::core::filter::FilterGroup;

/// One message from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    Current {
        feature: Feature,
    },
    Timeout {
        feature: FeatureRef,
    },
    LeftGeoRange {
        feature: FeatureRef,
    },
    /// A past position of `owner` (defaults to the feature's own id).
    History {
        feature: Feature,
        #[serde(default)]
        owner: Option<FeatureId>,
    },
    HistoryStart {
        feature_id: FeatureId,
    },
    HistoryStop {
        feature_id: FeatureId,
    },
    HistoryClearAll,
    FilterTracks {
        groups: Vec<FilterGroup>,
        #[serde(default)]
        manual_features: Vec<FeatureId>,
    },
    AddMarker {
        feature: Feature,
    },
    HideFeature {
        feature_id: FeatureId,
        #[serde(default = "hidden_by_default")]
        hidden: bool,
    },
    RedrawTracks {
        track_group: String,
    },
    HeatmapStart {
        #[serde(default = "enabled_by_default")]
        enabled: bool,
    },
    CountOnly {
        total: u64,
        visible: u64,
    },
}

fn hidden_by_default() -> bool {
    true
}

fn enabled_by_default() -> bool {
    true
}

impl StreamEvent {
    /// The status tag as sent on the wire.
    pub fn status(&self) -> &'static str {
        match self {
            StreamEvent::Current { .. } => "Current",
            StreamEvent::Timeout { .. } => "Timeout",
            StreamEvent::LeftGeoRange { .. } => "LeftGeoRange",
            StreamEvent::History { .. } => "History",
            StreamEvent::HistoryStart { .. } => "HistoryStart",
            StreamEvent::HistoryStop { .. } => "HistoryStop",
            StreamEvent::HistoryClearAll => "HistoryClearAll",
            StreamEvent::FilterTracks { .. } => "FilterTracks",
            StreamEvent::AddMarker { .. } => "AddMarker",
            StreamEvent::HideFeature { .. } => "HideFeature",
            StreamEvent::RedrawTracks { .. } => "RedrawTracks",
            StreamEvent::HeatmapStart { .. } => "HeatmapStart",
            StreamEvent::CountOnly { .. } => "CountOnly",
        }
    }
}

/// User-driven intents from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiIntent {
    Select(Option<FeatureId>),
    Hover(Option<FeatureId>),
    Crosshairs(Option<FeatureId>),
    Edit(Option<FeatureId>),
    /// The view zoomed; icons are resized for the new resolution.
    SetResolution(f64),
    Notice(Notice),
    Show(FeatureId),
    Hide(FeatureId),
}

/// Aggregate feature counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCounts {
    pub total: u64,
    pub visible: u64,
}

impl fmt::Display for FeatureCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} features ({} visible)", self.total, self.visible)
    }
}

/// What a dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied,
    /// Nothing changed: a no-op, a dropped update or a logged failure.
    Ignored,
    /// Counts from the stream, passed through unchanged.
    Counts(FeatureCounts),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_format_round_trips_through_tags() {
        let event: StreamEvent = serde_json::from_value(json!({
            "status": "FilterTracks",
            "groups": [{ "groupTag": "ais", "show": false, "childTypeTags": ["ais"] }],
            "manualFeatures": ["m1"]
        }))
        .unwrap();
        assert_eq!(event.status(), "FilterTracks");

        let event: StreamEvent =
            serde_json::from_value(json!({ "status": "HistoryStart", "featureId": "ais-1" })).unwrap();
        assert_eq!(event, StreamEvent::HistoryStart { feature_id: "ais-1".into() });

        let event: StreamEvent = serde_json::from_value(json!({ "status": "HistoryClearAll" })).unwrap();
        assert_eq!(event, StreamEvent::HistoryClearAll);
    }

    #[test]
    fn timeout_accepts_full_feature_payload() {
        let event: StreamEvent = serde_json::from_value(json!({
            "status": "Timeout",
            "feature": {
                "id": "ais-1", "typeTag": "ais",
                "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }
            }
        }))
        .unwrap();
        assert!(matches!(event, StreamEvent::Timeout { feature } if feature.id == "ais-1"));
    }

    #[test]
    fn bare_heatmap_start_turns_it_on() {
        let event: StreamEvent = serde_json::from_value(json!({ "status": "HeatmapStart" })).unwrap();
        assert_eq!(event, StreamEvent::HeatmapStart { enabled: true });
    }

    #[test]
    fn unknown_status_is_rejected() {
        let parsed: Result<StreamEvent, _> = serde_json::from_value(json!({ "status": "Bogus" }));
        assert!(parsed.is_err());
    }
}
