//! Domain classification: derives a [`TrackSubType`] from live telemetry.
//!
//! - AIS: ITU-R M.1371 ship-and-cargo type code buckets.
//! - Omnicom VMS: speed below a threshold reads as stationary.
//! - SART/EPIRB beacons: the MMSI prefix tells SART (970), man overboard (972)
//!   and EPIRB-AIS (974) apart.

use crate::core::feature::{TargetInfo, TrackSubType};

/// Default speed (knots) under which an Omnicom track counts as stationary.
pub const DEFAULT_STATIONARY_KNOTS: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyConfig {
    pub stationary_knots: f64,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            stationary_knots: DEFAULT_STATIONARY_KNOTS,
        }
    }
}

/// Classifies a target of the given track type. Types without subtypes yield `None`.
pub fn classify(type_tag: &str, target: &TargetInfo, config: &ClassifyConfig) -> Option<TrackSubType> {
    match type_tag {
        "ais" | "sat-ais" => Some(ais_bucket(target.vessel_type)),
        "omnicom" => Some(omnicom_motion(target.speed, config.stationary_knots)),
        "sart" | "epirb" => Some(beacon_kind(target.mmsi.as_deref())),
        _ => None,
    }
}

/// Buckets an AIS ship type code.
pub fn ais_bucket(vessel_type: Option<u16>) -> TrackSubType {
    match vessel_type {
        Some(30) => TrackSubType::Fishing,
        Some(31 | 32) => TrackSubType::Towing,
        Some(35) => TrackSubType::Military,
        Some(36) => TrackSubType::Sailing,
        Some(37) => TrackSubType::Pleasure,
        Some(40..=49) => TrackSubType::HighSpeed,
        Some(50) => TrackSubType::Pilot,
        Some(51) => TrackSubType::SearchAndRescue,
        Some(52) => TrackSubType::Tug,
        Some(60..=69) => TrackSubType::Passenger,
        Some(70..=79) => TrackSubType::Cargo,
        Some(80..=89) => TrackSubType::Tanker,
        _ => TrackSubType::Other,
    }
}

/// Stationary below the threshold, normal otherwise. Unknown speed is normal.
pub fn omnicom_motion(speed: Option<f64>, stationary_knots: f64) -> TrackSubType {
    match speed {
        Some(knots) if knots < stationary_knots => TrackSubType::Stationary,
        _ => TrackSubType::Normal,
    }
}

/// Tells beacon kinds apart by MMSI prefix.
pub fn beacon_kind(mmsi: Option<&str>) -> TrackSubType {
    match mmsi {
        Some(m) if m.starts_with("972") => TrackSubType::Mob,
        Some(m) if m.starts_with("974") => TrackSubType::Epirb,
        _ => TrackSubType::Sart,
    }
}
