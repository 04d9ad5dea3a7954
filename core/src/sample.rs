//! Generated demo trajectories: an inclined ellipse around the Earth.
//!
//! The ellipse's eccentricity comes from an `a/b = semi_major_factor`
//! shape; it is focused on the Earth's centre with periapsis at
//! `R⊕ + altitude`, so the path never dips below ground. It wobbles out of
//! the equatorial plane by `r·sin(2θ)·inclination_factor`. Positions are
//! converted to latitude/longitude/altitude on a sphere.

use crate::{
    error::{VizError, VizResult},
    rng::SampleRng,
    trajectory::{generate, Interpolation, Trajectory},
    types::EARTH_RADIUS_M,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleOrbit {
    pub duration_s:         f64,
    /// Number of intervals; the trajectory has `steps + 1` samples.
    pub steps:              usize,
    pub orbit_altitude_m:   f64,
    pub semi_major_factor:  f64,
    pub inclination_factor: f64,
    /// Rotation of the whole ellipse about the polar axis, degrees.
    #[serde(default)]
    pub phase_deg:          f64,
}

impl Default for SampleOrbit {
    fn default() -> Self {
        Self {
            duration_s:         3600.0,
            steps:              100,
            orbit_altitude_m:   1_000_000.0,
            semi_major_factor:  1.5,
            inclination_factor: 0.1,
            phase_deg:          0.0,
        }
    }
}

impl SampleOrbit {
    /// Same timing as `self`, with shape and phase drawn from `seed`.
    pub fn randomized(&self, seed: u64) -> Self {
        let mut rng = SampleRng::new(seed);
        Self {
            semi_major_factor:  rng.range(1.2, 1.8),
            inclination_factor: rng.range(0.05, 0.3),
            phase_deg:          rng.range(0.0, 360.0),
            ..self.clone()
        }
    }

    /// Flat `[t, lon, lat, alt, ...]` samples.
    pub fn flat_samples(&self) -> VizResult<Vec<f64>> {
        if self.steps == 0
            || self.duration_s.is_nan()
            || self.duration_s <= 0.0
            || self.semi_major_factor.is_nan()
            || self.semi_major_factor < 1.0
            || self.orbit_altitude_m.is_nan()
            || self.orbit_altitude_m < 0.0
        {
            return Err(VizError::InvalidArgument(format!(
                "sample orbit needs steps > 0, duration > 0, semi-major factor >= 1, altitude >= 0 \
                 (got {}, {}, {}, {})",
                self.steps, self.duration_s, self.semi_major_factor, self.orbit_altitude_m
            )));
        }

        let periapsis = EARTH_RADIUS_M + self.orbit_altitude_m;
        let e = (1.0 - 1.0 / (self.semi_major_factor * self.semi_major_factor)).sqrt();
        // Semi-latus rectum for r(0) = periapsis.
        let p = periapsis * (1.0 + e);
        let phase = self.phase_deg.to_radians();

        let mut out = Vec::with_capacity((self.steps + 1) * 4);
        for i in 0..=self.steps {
            let frac = i as f64 / self.steps as f64;
            let time = frac * self.duration_s;
            let angle = frac * TAU;

            let r = p / (1.0 + e * angle.cos());
            let x = r * (angle + phase).cos();
            let y = r * (angle + phase).sin();
            let z = r * (angle * 2.0).sin() * self.inclination_factor;

            let norm = (x * x + y * y + z * z).sqrt();
            let lon = y.atan2(x).to_degrees();
            let lat = (z / norm).asin().to_degrees();
            out.extend_from_slice(&[time, lon, lat, norm - EARTH_RADIUS_M]);
        }
        Ok(out)
    }

    pub fn trajectory(&self, epoch: DateTime<Utc>) -> VizResult<Trajectory> {
        generate(&self.flat_samples()?, epoch, Interpolation::Lagrange)
    }
}
