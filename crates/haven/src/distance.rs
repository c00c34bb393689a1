//! Great-circle distances between coordinates.

use haven_data_processing::{Coordinates, ShelterRecord};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers.
#[must_use]
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance in kilometers, or `None` when either side has no coordinates.
#[must_use]
pub fn distance_between(from: Option<Coordinates>, to: Option<Coordinates>) -> Option<f64> {
    Some(haversine_km(from?, to?))
}

/// Distance from a record to a reference location. `None` for ungeocoded records.
#[must_use]
pub fn distance_to(record: &ShelterRecord, reference: Coordinates) -> Option<f64> {
    distance_between(record.coordinates, Some(reference))
}
