//! Great-circle distance and angular helpers.
//!
//! Everything here works on a spherical Earth of radius [`EARTH_RADIUS_KM`].

use crate::{Position, Position2D};

/// Mean Earth radius used by every distance computation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two lat/lng pairs (Haversine formula).
///
/// Longitude wraparound at ±180° needs no special casing: the sine of the
/// half-delta is identical for `Δλ` and `Δλ ± 360°`.
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Distance in kilometers between two positions, ignoring altitude.
#[must_use]
pub fn distance(a: &Position, b: &Position) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Distance in kilometers between two projected positions.
#[must_use]
pub fn distance_2d(a: &Position2D, b: &Position2D) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Wrap a longitude into `[-180, 180)`.
#[must_use]
pub fn normalize_longitude(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

/// Relative surface area of a latitude band, proportional to `cos(lat)`.
#[must_use]
pub fn area_weight(lat: f64) -> f64 {
    lat.to_radians().cos().max(0.0)
}

/// Point reached by travelling `distance_km` from a start along an initial
/// bearing (degrees clockwise from north).
#[must_use]
pub fn destination(lat: f64, lng: f64, bearing_deg: f64, distance_km: f64) -> Position2D {
    let phi1 = lat.to_radians();
    let lambda1 = lng.to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_km / EARTH_RADIUS_KM;

    let sin_phi2 = phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos();
    let phi2 = sin_phi2.clamp(-1.0, 1.0).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * sin_phi2);

    Position2D {
        latitude: phi2.to_degrees(),
        longitude: normalize_longitude(lambda2.to_degrees()),
    }
}

/// Mean of latitude and longitude. `None` for an empty slice.
///
/// Longitudes are unwrapped relative to the first point before averaging,
/// so a group straddling ±180° averages to a point inside the group.
#[must_use]
pub fn mean_position(points: &[Position2D]) -> Option<Position2D> {
    let first = points.first()?;
    let n = points.len() as f64;
    let (lat_sum, lng_sum) = points.iter().fold((0.0, 0.0), |(lat, lng), p| {
        (lat + p.latitude, lng + unwrap_longitude(p.longitude, first.longitude))
    });

    let longitude = lng_sum / n;
    Some(Position2D {
        latitude: lat_sum / n,
        longitude: if (-180.0..180.0).contains(&longitude) {
            longitude
        } else {
            normalize_longitude(longitude)
        },
    })
}

/// Shift `lng` by a full turn so it lies within 180° of `reference`.
fn unwrap_longitude(lng: f64, reference: f64) -> f64 {
    let delta = lng - reference;
    if delta > 180.0 {
        lng - 360.0
    } else if delta < -180.0 {
        lng + 360.0
    } else {
        lng
    }
}
