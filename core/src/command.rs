use crate::clock::ClockSpeed;
use serde::{Deserialize, Serialize};

/// All commands a viewer front end can issue. The runner reads them
/// as JSON lines in IPC mode.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ViewerCommand {
    // ── Playback control ──────────────────────────
    Play,
    Pause,
    Reset,
    Tick { dt_s: f64 },
    SetSpeed { speed: ClockSpeed },

    // ── Model ─────────────────────────────────────
    SelectModel { key: String },
    SetSize { size_m: f64 },

    // ── Views ─────────────────────────────────────
    /// Show an impact scenario. `inputs` are raw form values; missing
    /// fields take the service defaults.
    ShowScenario {
        #[serde(default)]
        inputs: Option<serde_json::Value>,
    },
    LoadSample {
        #[serde(default)]
        seed: Option<u64>,
    },
    LoadTrajectory {
        data: serde_json::Value,
        #[serde(default)]
        looping: Option<bool>,
    },
    Teardown,

    // ── Session ───────────────────────────────────
    GetState,
    Quit,
}
