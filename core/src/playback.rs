//! Playback controller: the play/pause/reset state machine for one
//! loaded trajectory.
//!
//! STATES:
//!   Idle     no trajectory loaded
//!   Paused   loaded, offset frozen
//!   Playing  loaded, `tick` advances the offset
//!
//! RULES:
//!   - `load` replaces the whole loaded state; nothing is mutated in place.
//!   - `play`/`pause`/`reset` on an inapplicable state are silent no-ops.
//!   - Reaching the end pauses at max offset unless looping was requested
//!     at load time.
//!   - Calls are serialized by `&mut self`; there are no concurrent ticks.

use crate::{
    clock::PlaybackClock,
    geo::GeoPoint,
    trajectory::Trajectory,
    types::OffsetSeconds,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    Idle,
    Paused,
    Playing,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackOptions {
    /// Wrap to the start instead of pausing at the end.
    #[serde(default)]
    pub looping: bool,
}

#[derive(Debug, Clone)]
struct Loaded {
    trajectory: Trajectory,
    options:    PlaybackOptions,
    is_playing: bool,
    offset_s:   OffsetSeconds,
}

/// Result of a tick that moved the offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub offset_s: OffsetSeconds,
    pub position: GeoPoint,
    pub time:     DateTime<Utc>,
    /// This tick reached the end and paused.
    pub finished: bool,
    /// This tick wrapped around to the start.
    pub wrapped:  bool,
}

/// Serializable view of the controller for UIs and the runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackStatus {
    pub phase:      PlaybackPhase,
    pub offset_s:   OffsetSeconds,
    pub max_offset: OffsetSeconds,
    pub multiplier: f64,
    pub looping:    bool,
}

#[derive(Debug, Clone, Default)]
pub struct PlaybackController {
    clock: PlaybackClock,
    state: Option<Loaded>,
}

impl PlaybackController {
    pub fn new(clock: PlaybackClock) -> Self {
        Self { clock, state: None }
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }

    pub fn phase(&self) -> PlaybackPhase {
        match &self.state {
            None => PlaybackPhase::Idle,
            Some(l) if l.is_playing => PlaybackPhase::Playing,
            Some(_) => PlaybackPhase::Paused,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.phase() == PlaybackPhase::Playing
    }

    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.state.as_ref().map(|l| &l.trajectory)
    }

    pub fn current_offset(&self) -> OffsetSeconds {
        self.state.as_ref().map(|l| l.offset_s).unwrap_or(0.0)
    }

    pub fn max_offset(&self) -> OffsetSeconds {
        self.trajectory().map(Trajectory::max_offset).unwrap_or(0.0)
    }

    /// Interpolated position at the current offset. Idempotent.
    pub fn current_position(&self) -> Option<GeoPoint> {
        self.state.as_ref().map(|l| l.trajectory.position_at(l.offset_s))
    }

    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.state.as_ref().map(|l| l.trajectory.time_at(l.offset_s))
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            phase:      self.phase(),
            offset_s:   self.current_offset(),
            max_offset: self.max_offset(),
            multiplier: self.clock.multiplier,
            looping:    self.state.as_ref().map(|l| l.options.looping).unwrap_or(false),
        }
    }

    /// Any state → Paused at offset 0 with the new trajectory.
    pub fn load(&mut self, trajectory: Trajectory, options: PlaybackOptions) {
        log::debug!(
            "playback load: {} samples, {:.1}s, looping={}",
            trajectory.samples().len(),
            trajectory.max_offset(),
            options.looping
        );
        self.state = Some(Loaded { trajectory, options, is_playing: false, offset_s: 0.0 });
    }

    /// Drop the loaded trajectory; back to Idle.
    pub fn unload(&mut self) {
        self.state = None;
    }

    /// Paused → Playing. Returns whether the phase changed.
    pub fn play(&mut self) -> bool {
        match &mut self.state {
            Some(l) if !l.is_playing => {
                l.is_playing = true;
                true
            }
            _ => false,
        }
    }

    /// Playing → Paused. Returns whether the phase changed.
    pub fn pause(&mut self) -> bool {
        match &mut self.state {
            Some(l) if l.is_playing => {
                l.is_playing = false;
                true
            }
            _ => false,
        }
    }

    /// Loaded → Paused at offset 0. Returns false in Idle.
    pub fn reset(&mut self) -> bool {
        match &mut self.state {
            Some(l) => {
                l.is_playing = false;
                l.offset_s = 0.0;
                true
            }
            None => false,
        }
    }

    /// Advance by `real_dt_s` of wall time while Playing. Returns the new
    /// frame when the offset moved or playback finished, None otherwise.
    pub fn tick(&mut self, real_dt_s: f64) -> Option<Frame> {
        let step = self.clock.scaled(real_dt_s);
        let l = self.state.as_mut().filter(|l| l.is_playing)?;
        let max = l.trajectory.max_offset();

        let mut finished = false;
        let mut wrapped = false;
        let next = l.offset_s + step;
        if next >= max {
            if l.options.looping && max > 0.0 {
                l.offset_s = next % max;
                wrapped = true;
            } else {
                l.offset_s = max;
                l.is_playing = false;
                finished = true;
            }
        } else if step > 0.0 {
            l.offset_s = next;
        } else {
            return None;
        }

        if finished {
            log::debug!("playback reached end at {max:.1}s, paused");
        }
        Some(Frame {
            offset_s: l.offset_s,
            position: l.trajectory.position_at(l.offset_s),
            time: l.trajectory.time_at(l.offset_s),
            finished,
            wrapped,
        })
    }
}
