//! # Display Projection
//!
//! Stream payloads carry WGS84 longitude/latitude pairs. The map renders in
//! spherical (web) Mercator, so every geometry is reprojected once on the way
//! into a layer.

use std::f64::consts::PI;

/// A `[x, y]` pair. Longitude/latitude on input, metres in the display CRS.
pub type Coordinate = [f64; 2];

/// Semi-major axis of the WGS84 ellipsoid, used as the sphere radius.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude at which spherical Mercator becomes a square world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

/// Projects a longitude/latitude pair into spherical Mercator metres.
///
/// Latitudes beyond [`MAX_LATITUDE`] are clamped so poles stay finite.
pub fn to_display([lon, lat]: Coordinate) -> Coordinate {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    [x, y]
}

/// Inverse of [`to_display`].
pub fn from_display([x, y]: Coordinate) -> Coordinate {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    [lon, lat]
}

/// Mercator stretches distances by `1 / cos(lat)`; a radius given in ground
/// metres must be scaled by the same factor to keep its on-screen size.
pub fn display_radius(radius_m: f64, lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    radius_m / lat.to_radians().cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_maps_to_origin() {
        let [x, y] = to_display([0.0, 0.0]);
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn antimeridian_is_half_circumference() {
        let [x, _] = to_display([180.0, 0.0]);
        assert!((x - PI * EARTH_RADIUS).abs() < 1e-6);
    }

    #[test]
    fn round_trip_is_stable_in_the_mid_latitudes() {
        let [lon, lat] = from_display(to_display([23.72, 37.98]));
        assert!((lon - 23.72).abs() < 1e-9);
        assert!((lat - 37.98).abs() < 1e-9);
    }

    #[test]
    fn radius_grows_away_from_the_equator() {
        assert!((display_radius(1000.0, 0.0) - 1000.0).abs() < 1e-9);
        assert!(display_radius(1000.0, 60.0) > 1999.0);
    }
}
