//! Shared primitive types used across the engine.

/// Stable identifier of an overlay primitive, derived from its
/// semantic role and index (e.g. `"ring-2-label"`).
pub type PrimitiveId = String;

/// Seconds since a trajectory's epoch.
pub type OffsetSeconds = f64;

/// Key into the asteroid model registry (e.g. `"bennu"`).
pub type ModelKey = String;

/// Mean Earth radius used for label placement, metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
