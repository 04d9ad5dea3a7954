//! Destination-point and great-circle distance checks.

use impactviz_core::{
    error::VizError,
    geo::{destination_point, haversine_distance, GeoPoint},
    types::EARTH_RADIUS_M,
};

#[test]
fn zero_distance_returns_origin() {
    let origin = GeoPoint::with_alt(40.7128, -74.006, 120.0);
    let p = destination_point(origin, 137.0, 0.0, EARTH_RADIUS_M).unwrap();
    assert_eq!(p, origin, "zero distance must be the identity");
}

#[test]
fn due_north_moves_only_latitude() {
    let origin = GeoPoint::new(10.0, 20.0);
    // One degree of arc.
    let d = EARTH_RADIUS_M * 1f64.to_radians();
    let p = destination_point(origin, 0.0, d, EARTH_RADIUS_M).unwrap();
    assert!((p.lat - 11.0).abs() < 1e-9, "expected lat 11, got {}", p.lat);
    assert!((p.lon - 20.0).abs() < 1e-9, "expected lon unchanged, got {}", p.lon);
}

#[test]
fn due_east_on_equator_moves_only_longitude() {
    let d = EARTH_RADIUS_M * 5f64.to_radians();
    let p = destination_point(GeoPoint::new(0.0, 0.0), 90.0, d, EARTH_RADIUS_M).unwrap();
    assert!(p.lat.abs() < 1e-9, "expected to stay on the equator, got {}", p.lat);
    assert!((p.lon - 5.0).abs() < 1e-9, "expected lon 5, got {}", p.lon);
}

#[test]
fn results_stay_in_range_for_any_bearing() {
    let origins = [
        GeoPoint::new(0.0, 179.9),
        GeoPoint::new(89.5, 0.0),
        GeoPoint::new(-89.5, -179.5),
        GeoPoint::new(45.0, -120.0),
    ];
    for origin in origins {
        for step in 0..24 {
            let bearing = step as f64 * 15.0;
            for d in [1.0, 5_000.0, 250_000.0, 3_000_000.0] {
                let p = destination_point(origin, bearing, d, EARTH_RADIUS_M).unwrap();
                assert!(
                    (-90.0..=90.0).contains(&p.lat),
                    "lat {} out of range for origin {origin:?} bearing {bearing} d {d}",
                    p.lat
                );
                assert!(
                    p.lon > -180.0 && p.lon <= 180.0,
                    "lon {} out of range for origin {origin:?} bearing {bearing} d {d}",
                    p.lon
                );
            }
        }
    }
}

#[test]
fn crossing_the_antimeridian_wraps_longitude() {
    let d = EARTH_RADIUS_M * 1f64.to_radians();
    let p = destination_point(GeoPoint::new(0.0, 179.5), 90.0, d, EARTH_RADIUS_M).unwrap();
    assert!((p.lon - (-179.5)).abs() < 1e-9, "expected -179.5, got {}", p.lon);
}

#[test]
fn destination_distance_matches_haversine() {
    let origin = GeoPoint::new(40.7128, -74.006);
    for bearing in [0.0, 45.0, 133.0, 270.0] {
        let p = destination_point(origin, bearing, 21_000.0, EARTH_RADIUS_M).unwrap();
        let back = haversine_distance(origin, p, EARTH_RADIUS_M);
        assert!(
            (back - 21_000.0).abs() < 1e-3,
            "bearing {bearing}: haversine says {back} m"
        );
    }
}

#[test]
fn altitude_is_carried_through() {
    let origin = GeoPoint::with_alt(10.0, 20.0, 1_500.0);
    let p = destination_point(origin, 45.0, 5_000.0, EARTH_RADIUS_M).unwrap();
    assert_eq!(p.alt, 1_500.0);
}

#[test]
fn negative_distance_is_invalid_argument() {
    let err = destination_point(GeoPoint::new(0.0, 0.0), 0.0, -1.0, EARTH_RADIUS_M).unwrap_err();
    assert!(matches!(err, VizError::InvalidArgument(_)), "got {err:?}");
}

#[test]
fn non_positive_radius_is_invalid_argument() {
    for r in [0.0, -6_371_000.0, f64::NAN] {
        let err = destination_point(GeoPoint::new(0.0, 0.0), 0.0, 10.0, r).unwrap_err();
        assert!(matches!(err, VizError::InvalidArgument(_)), "radius {r}: got {err:?}");
    }
}

#[test]
fn non_finite_bearing_is_invalid_argument() {
    let err = destination_point(GeoPoint::new(0.0, 0.0), f64::INFINITY, 10.0, EARTH_RADIUS_M)
        .unwrap_err();
    assert!(matches!(err, VizError::InvalidArgument(_)), "got {err:?}");
}

#[test]
fn haversine_of_identical_points_is_zero() {
    let p = GeoPoint::new(-33.86, 151.21);
    assert_eq!(haversine_distance(p, p, EARTH_RADIUS_M), 0.0);
}
