//! Scene sync: the only code that talks to the rendering engine.
//!
//! RULES:
//!   - SceneSync exclusively owns the id → engine handle map. Nothing
//!     else keeps engine handles.
//!   - Every sync removes before it adds, so an id is never live twice.
//!   - A primitive whose content changed is replaced (remove + add);
//!     engines give no cheap in-place style mutation guarantee.
//!   - A failed engine call drops the primitive from the tracked set and
//!     is reported, never retried in place. The next rebuild re-adds it.
//!   - A handle whose removal failed is still live in the engine. It is
//!     kept as an orphan and its removal retried at the start of every
//!     sync and teardown; its id is not re-added while the orphan lives.
//!   - Teardown always runs to completion. `ViewerSession` runs it on drop,
//!     so early returns and error paths release the engine too.

use crate::{
    error::VizError,
    geo::GeoPoint,
    overlay::OverlayPrimitive,
    simulation::SimulationResult,
    types::PrimitiveId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// The three operations the core needs from a rendering engine.
pub trait RenderEngine {
    type Handle: Clone + std::fmt::Debug;

    fn add_primitive(&mut self, primitive: &OverlayPrimitive) -> anyhow::Result<Self::Handle>;
    fn remove_primitive(&mut self, handle: Self::Handle) -> anyhow::Result<()>;
    fn fly_to(&mut self, target: GeoPoint, duration_s: f64);
}

/// Lend an engine to a session without giving it away.
impl<E: RenderEngine + ?Sized> RenderEngine for &mut E {
    type Handle = E::Handle;

    fn add_primitive(&mut self, primitive: &OverlayPrimitive) -> anyhow::Result<Self::Handle> {
        (**self).add_primitive(primitive)
    }

    fn remove_primitive(&mut self, handle: Self::Handle) -> anyhow::Result<()> {
        (**self).remove_primitive(handle)
    }

    fn fly_to(&mut self, target: GeoPoint, duration_s: f64) {
        (**self).fly_to(target, duration_s)
    }
}

// ── Diff ───────────────────────────────────────────────────────────

/// What a sync has to do, computed purely from two primitive sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub remove:    Vec<PrimitiveId>,
    pub add:       Vec<PrimitiveId>,
    pub replace:   Vec<PrimitiveId>,
    pub unchanged: Vec<PrimitiveId>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty() && self.replace.is_empty()
    }
}

/// Id-set difference of `previous` against `next`. Output lists follow
/// `previous` order for removals and `next` order for everything else.
pub fn diff(previous: &[OverlayPrimitive], next: &[OverlayPrimitive]) -> SyncPlan {
    let prev_by_id: HashMap<&str, &OverlayPrimitive> =
        previous.iter().map(|p| (p.id(), p)).collect();
    let next_ids: HashSet<&str> = next.iter().map(OverlayPrimitive::id).collect();

    let mut plan = SyncPlan::default();
    for p in previous {
        if !next_ids.contains(p.id()) {
            plan.remove.push(p.id().to_string());
        }
    }
    let mut seen = HashSet::new();
    for p in next {
        if !seen.insert(p.id()) {
            log::warn!("duplicate primitive id '{}' ignored", p.id());
            continue;
        }
        match prev_by_id.get(p.id()) {
            None => plan.add.push(p.id().to_string()),
            Some(old) if *old != p => plan.replace.push(p.id().to_string()),
            Some(_) => plan.unchanged.push(p.id().to_string()),
        }
    }
    plan
}

// ── Sync ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SyncReport {
    pub added:     usize,
    pub removed:   usize,
    pub replaced:  usize,
    pub unchanged: usize,
    pub failures:  Vec<VizError>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
struct Tracked<H> {
    handle:    H,
    primitive: OverlayPrimitive,
}

#[derive(Debug)]
pub struct SceneSync<H> {
    live:    BTreeMap<PrimitiveId, Tracked<H>>,
    /// Handles the engine refused to remove, oldest first.
    orphans: Vec<(PrimitiveId, H)>,
}

impl<H> Default for SceneSync<H> {
    fn default() -> Self {
        Self { live: BTreeMap::new(), orphans: Vec::new() }
    }
}

impl<H: Clone + std::fmt::Debug> SceneSync<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.live.contains_key(id)
    }

    /// Untracked handles still awaiting a successful engine removal.
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    pub fn primitive(&self, id: &str) -> Option<&OverlayPrimitive> {
        self.live.get(id).map(|t| &t.primitive)
    }

    /// Primitives currently live in the engine, ordered by id.
    pub fn current(&self) -> Vec<OverlayPrimitive> {
        self.live.values().map(|t| t.primitive.clone()).collect()
    }

    /// Bring the engine from the tracked set to exactly `next`.
    pub fn sync<E>(&mut self, engine: &mut E, next: &[OverlayPrimitive]) -> SyncReport
    where
        E: RenderEngine<Handle = H>,
    {
        let plan = diff(&self.current(), next);
        let mut report = SyncReport { unchanged: plan.unchanged.len(), ..SyncReport::default() };
        self.retry_orphans(engine, &mut report);

        for id in &plan.remove {
            if self.remove_tracked(engine, id, &mut report) {
                report.removed += 1;
            }
        }
        for id in &plan.replace {
            self.remove_tracked(engine, id, &mut report);
        }

        let blocked: HashSet<PrimitiveId> = self.orphans.iter().map(|(id, _)| id.clone()).collect();

        let replace: HashSet<&str> = plan.replace.iter().map(String::as_str).collect();
        let add: HashSet<&str> = plan.add.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        for p in next {
            let id = p.id();
            if !seen.insert(id) || blocked.contains(id) {
                continue;
            }
            let is_replace = replace.contains(id);
            if !(is_replace || add.contains(id)) {
                continue;
            }
            match engine.add_primitive(p) {
                Ok(handle) => {
                    self.live.insert(id.to_string(), Tracked { handle, primitive: p.clone() });
                    if is_replace {
                        report.replaced += 1;
                    } else {
                        report.added += 1;
                    }
                }
                Err(e) => {
                    let err = VizError::EngineSyncFailure {
                        op:     "add",
                        id:     id.to_string(),
                        reason: e.to_string(),
                    };
                    log::warn!("{err}");
                    report.failures.push(err);
                }
            }
        }

        if !plan.is_empty() {
            log::debug!(
                "scene sync: +{} -{} ~{} ={} ({} failed)",
                report.added,
                report.removed,
                report.replaced,
                report.unchanged,
                report.failures.len()
            );
        }
        report
    }

    /// Remove every tracked primitive. The tracked set is empty afterwards
    /// whatever the engine reports; refused removals stay as orphans.
    pub fn teardown<E>(&mut self, engine: &mut E) -> SyncReport
    where
        E: RenderEngine<Handle = H>,
    {
        let mut report = SyncReport::default();
        self.retry_orphans(engine, &mut report);
        let ids: Vec<PrimitiveId> = self.live.keys().cloned().collect();
        for id in &ids {
            if self.remove_tracked(engine, id, &mut report) {
                report.removed += 1;
            }
        }
        self.live.clear();
        log::debug!(
            "scene teardown: {} removed, {} failed, {} orphaned",
            report.removed,
            report.failures.len(),
            self.orphans.len()
        );
        report
    }

    /// Untrack `id` and remove it from the engine. Returns false when
    /// the engine refused; the handle is then kept as an orphan.
    fn remove_tracked<E>(&mut self, engine: &mut E, id: &str, report: &mut SyncReport) -> bool
    where
        E: RenderEngine<Handle = H>,
    {
        let Some(tracked) = self.live.remove(id) else {
            return true;
        };
        self.remove_handle(engine, id.to_string(), tracked.handle, report)
    }

    fn retry_orphans<E>(&mut self, engine: &mut E, report: &mut SyncReport)
    where
        E: RenderEngine<Handle = H>,
    {
        for (id, handle) in std::mem::take(&mut self.orphans) {
            if self.remove_handle(engine, id, handle, report) {
                report.removed += 1;
            }
        }
    }

    fn remove_handle<E>(
        &mut self,
        engine: &mut E,
        id:     PrimitiveId,
        handle: H,
        report: &mut SyncReport,
    ) -> bool
    where
        E: RenderEngine<Handle = H>,
    {
        match engine.remove_primitive(handle.clone()) {
            Ok(()) => true,
            Err(e) => {
                let err = VizError::EngineSyncFailure {
                    op:     "remove",
                    id:     id.clone(),
                    reason: e.to_string(),
                };
                log::warn!("{err}");
                report.failures.push(err);
                self.orphans.push((id, handle));
                false
            }
        }
    }
}

// ── Camera ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    pub fly_duration_s:       f64,
    /// Camera distance as a multiple of the largest ring radius.
    pub ring_distance_factor: f64,
    pub min_distance_m:       f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { fly_duration_s: 2.0, ring_distance_factor: 3.0, min_distance_m: 10_000.0 }
    }
}

/// Camera position framing every ring: above the impact center at
/// `factor × max ring radius`. Without rings the final crater radius is
/// used; `min_distance_m` is a floor either way.
pub fn camera_target(result: &SimulationResult, camera: &CameraConfig) -> GeoPoint {
    let extent = result
        .max_ring_radius_m()
        .unwrap_or(result.final_crater_diameter_m / 2.0);
    let distance = (extent * camera.ring_distance_factor).max(camera.min_distance_m);
    GeoPoint::with_alt(result.center.lat, result.center.lon, distance)
}

// ── Headless engine ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineOp {
    Add { id: PrimitiveId, handle: Uuid },
    Remove { handle: Uuid },
    FlyTo { target: GeoPoint, duration_s: f64 },
}

/// In-memory `RenderEngine` that records every call. Used by the runner
/// as its headless engine and by tests to observe sync behaviour.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    live:           HashMap<Uuid, OverlayPrimitive>,
    ops:            Vec<EngineOp>,
    rejects:        HashSet<PrimitiveId>,
    remove_rejects: HashSet<PrimitiveId>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future add of `id` fail.
    pub fn reject(&mut self, id: &str) {
        self.rejects.insert(id.to_string());
    }

    pub fn accept(&mut self, id: &str) {
        self.rejects.remove(id);
    }

    /// Make every future removal of a primitive with `id` fail, leaving
    /// it live.
    pub fn reject_remove(&mut self, id: &str) {
        self.remove_rejects.insert(id.to_string());
    }

    pub fn accept_remove(&mut self, id: &str) {
        self.remove_rejects.remove(id);
    }

    pub fn ops(&self) -> &[EngineOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Ids of primitives currently in the engine, sorted.
    pub fn live_ids(&self) -> Vec<PrimitiveId> {
        let mut ids: Vec<_> = self.live.values().map(|p| p.id().to_string()).collect();
        ids.sort();
        ids
    }

    pub fn count_adds(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, EngineOp::Add { .. })).count()
    }

    pub fn count_removes(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, EngineOp::Remove { .. })).count()
    }

    pub fn last_fly_to(&self) -> Option<(GeoPoint, f64)> {
        self.ops.iter().rev().find_map(|op| match op {
            EngineOp::FlyTo { target, duration_s } => Some((*target, *duration_s)),
            _ => None,
        })
    }
}

impl RenderEngine for RecordingEngine {
    type Handle = Uuid;

    fn add_primitive(&mut self, primitive: &OverlayPrimitive) -> anyhow::Result<Uuid> {
        if self.rejects.contains(primitive.id()) {
            anyhow::bail!("engine rejected '{}'", primitive.id());
        }
        let handle = Uuid::new_v4();
        self.live.insert(handle, primitive.clone());
        self.ops.push(EngineOp::Add { id: primitive.id().to_string(), handle });
        Ok(handle)
    }

    fn remove_primitive(&mut self, handle: Uuid) -> anyhow::Result<()> {
        let Some(primitive) = self.live.get(&handle) else {
            anyhow::bail!("unknown handle {handle}");
        };
        if self.remove_rejects.contains(primitive.id()) {
            anyhow::bail!("engine refused to remove '{}'", primitive.id());
        }
        self.live.remove(&handle);
        self.ops.push(EngineOp::Remove { handle });
        Ok(())
    }

    fn fly_to(&mut self, target: GeoPoint, duration_s: f64) {
        self.ops.push(EngineOp::FlyTo { target, duration_s });
    }
}
