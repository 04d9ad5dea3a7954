//! Spherical geodesy: destination points and great-circle distance.
//!
//! All angles are degrees at the API boundary and radians internally.
//! Every function here is pure: label placement must be reproducible
//! across re-renders without drift.

use crate::error::{VizError, VizResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt: f64,
}

impl GeoPoint {
    /// Build a point from degrees, clamping latitude into [-90, 90] and
    /// wrapping longitude into (-180, 180].
    pub fn new(lat: f64, lon: f64) -> Self {
        Self::with_alt(lat, lon, 0.0)
    }

    pub fn with_alt(lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lon: normalize_lon(lon),
            alt,
        }
    }

    /// Validating constructor for untrusted input. Rejects non-finite
    /// values and latitudes outside [-90, 90]; longitude is still wrapped.
    pub fn checked(lat: f64, lon: f64, alt: f64) -> VizResult<Self> {
        if !lat.is_finite() || !lon.is_finite() || !alt.is_finite() {
            return Err(VizError::InvalidArgument(format!(
                "non-finite coordinate ({lat}, {lon}, {alt})"
            )));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(VizError::InvalidArgument(format!(
                "latitude {lat} outside [-90, 90]"
            )));
        }
        Ok(Self { lat, lon: normalize_lon(lon), alt })
    }
}

/// Wrap a longitude in degrees into (-180, 180].
pub fn normalize_lon(lon: f64) -> f64 {
    // Leave in-range values bit-exact.
    if lon > -180.0 && lon <= 180.0 {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

/// Direct geodesic problem on a sphere: the point reached by travelling
/// `distance_m` from `origin` along the initial `bearing_deg`
/// (clockwise from north). Altitude is carried through from the origin.
pub fn destination_point(
    origin:          GeoPoint,
    bearing_deg:     f64,
    distance_m:      f64,
    sphere_radius_m: f64,
) -> VizResult<GeoPoint> {
    if !distance_m.is_finite() || distance_m < 0.0 {
        return Err(VizError::InvalidArgument(format!(
            "distance must be >= 0, got {distance_m}"
        )));
    }
    if !sphere_radius_m.is_finite() || sphere_radius_m <= 0.0 {
        return Err(VizError::InvalidArgument(format!(
            "sphere radius must be > 0, got {sphere_radius_m}"
        )));
    }
    if !bearing_deg.is_finite() {
        return Err(VizError::InvalidArgument(format!(
            "bearing must be finite, got {bearing_deg}"
        )));
    }

    // Exact identity for zero distance; the trig round trip would
    // otherwise perturb the last bits of the coordinates.
    if distance_m == 0.0 {
        return Ok(GeoPoint::with_alt(origin.lat, origin.lon, origin.alt));
    }

    let delta = distance_m / sphere_radius_m;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.lat.to_radians();
    let lambda1 = origin.lon.to_radians();

    let sin_phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos())
        .clamp(-1.0, 1.0);
    let phi2 = sin_phi2.asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * sin_phi2);

    Ok(GeoPoint::with_alt(phi2.to_degrees(), lambda2.to_degrees(), origin.alt))
}

/// Haversine great-circle distance in metres.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint, sphere_radius_m: f64) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);
    2.0 * sphere_radius_m * h.sqrt().atan2((1.0 - h).sqrt())
}
