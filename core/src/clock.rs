//! Playback clock: owns the rate at which real time advances
//! trajectory time.

use crate::error::{VizError, VizResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlaybackClock {
    /// Trajectory seconds per real second.
    pub multiplier: f64,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self { multiplier: 1.0 }
    }
}

impl PlaybackClock {
    pub fn new(multiplier: f64) -> VizResult<Self> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(VizError::InvalidArgument(format!(
                "clock multiplier must be > 0, got {multiplier}"
            )));
        }
        Ok(Self { multiplier })
    }

    pub fn from_speed(speed: ClockSpeed) -> Self {
        Self { multiplier: speed.multiplier() }
    }

    pub fn set_speed(&mut self, speed: ClockSpeed) {
        self.multiplier = speed.multiplier();
    }

    /// Trajectory seconds covered by `real_dt_s` of wall time.
    /// Negative or non-finite deltas advance nothing.
    pub fn scaled(&self, real_dt_s: f64) -> f64 {
        if real_dt_s.is_finite() && real_dt_s > 0.0 {
            real_dt_s * self.multiplier
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClockSpeed {
    Realtime, // 1 s/s
    Sample,   // 10 s/s, the generated-sample default
    Fast,     // 1 min/s
}

impl ClockSpeed {
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Realtime => 1.0,
            Self::Sample   => 10.0,
            Self::Fast     => 60.0,
        }
    }
}
