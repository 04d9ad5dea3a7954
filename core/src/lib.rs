//! Scenario overlay and trajectory playback engine.
//!
//! Leaves first:
//!   geo        → destination-point math on a sphere
//!   scale      → model registry and render scale resolution
//!   simulation → result documents and live/fallback resolution
//!   overlay    → simulation result → ordered overlay primitives
//!   trajectory → time-tagged position parsing, generation, interpolation
//!   sample     → seeded demo orbits
//!   clock      → wall time → trajectory time scaling
//!   playback   → play/pause/reset state machine bound to a clock
//!   scene      → id-diffing sync against an external rendering engine
//!   session    → composition root owning the single engine handle
//!
//! `config`, `event` and `command` carry the viewer's file and wire formats.

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod geo;
pub mod overlay;
pub mod playback;
pub mod rng;
pub mod sample;
pub mod scale;
pub mod scene;
pub mod session;
pub mod simulation;
pub mod trajectory;
pub mod types;
