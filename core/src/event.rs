//! The viewer event log: every observable transition of a session.
//!
//! RULE: the session reports what happened ONLY through these events.
//! Callers never read SceneSync or the controller to find out what
//! changed after a command.

use crate::{
    geo::GeoPoint,
    playback::{PlaybackPhase, PlaybackStatus},
    scale::{ModelPose, ModelSelection},
    simulation::DataOrigin,
    trajectory::Interpolation,
    types::{OffsetSeconds, PrimitiveId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerEvent {
    // ── Scenario ───────────────────────────────────
    ScenarioLoaded {
        simulation_id: String,
        origin:        DataOrigin,
        rings:         usize,
    },
    CameraFramed {
        target:     GeoPoint,
        duration_s: f64,
    },

    // ── Scene ──────────────────────────────────────
    OverlaySynced {
        added:     usize,
        removed:   usize,
        replaced:  usize,
        unchanged: usize,
        failed:    usize,
    },
    EngineSyncFailed {
        op:     String,
        id:     PrimitiveId,
        reason: String,
    },
    ViewTornDown {
        removed: usize,
    },

    // ── Trajectory / playback ──────────────────────
    TrajectoryLoaded {
        /// The requested trajectory was unusable; this is the sample orbit.
        fallback:      bool,
        epoch:         DateTime<Utc>,
        samples:       usize,
        max_offset:    OffsetSeconds,
        interpolation: Interpolation,
    },
    PlaybackChanged {
        phase:    PlaybackPhase,
        offset_s: OffsetSeconds,
    },
    Frame {
        offset_s: OffsetSeconds,
        time:     DateTime<Utc>,
        position: GeoPoint,
    },

    // ── Model ──────────────────────────────────────
    ModelChanged {
        pose: ModelPose,
    },

    // ── Misc ───────────────────────────────────────
    Warning {
        message: String,
    },
    State {
        playback:   PlaybackStatus,
        selection:  ModelSelection,
        primitives: Vec<PrimitiveId>,
    },
}
