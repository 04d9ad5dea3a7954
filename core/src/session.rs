//! Viewer session: the composition root. Owns the one engine handle
//! and everything that feeds it.
//!
//! EXECUTION ORDER for a view switch:
//!   1. Tear down every primitive of the old view
//!   2. Build the new view's primitives (pure)
//!   3. Sync them into the engine
//!   4. Frame the camera (scenario views only)
//!
//! RULES:
//!   - No global engine: the handle lives here and is lent to SceneSync
//!     for each call.
//!   - Model pose is re-derived whenever model or size changes, then the
//!     trajectory frame is re-synced.
//!   - Recoverable failures become `Warning` / `EngineSyncFailed` events;
//!     only invalid commands return `Err`.
//!   - Dropping the session tears the scene down. Lend the engine as
//!     `&mut E` to inspect it afterwards.

use crate::{
    command::ViewerCommand,
    config::ViewerConfig,
    error::{VizError, VizResult},
    event::ViewerEvent,
    overlay::{build_trajectory_frame, OverlayBuilder, OverlayPrimitive},
    playback::{PlaybackController, PlaybackOptions},
    sample::SampleOrbit,
    scale::{derive_model_pose, ModelPose, ModelRegistry, ModelSelection},
    scene::{camera_target, CameraConfig, RenderEngine, SceneSync, SyncReport},
    simulation::{
        resolve_simulation, DataOrigin, SimulationRequest, SimulationResult, SimulationSource,
    },
    trajectory::{self, Trajectory},
};
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Empty,
    Scenario,
    Trajectory,
}

pub struct ViewerSession<E: RenderEngine> {
    engine:       E,
    scene:        SceneSync<E::Handle>,
    source:       Box<dyn SimulationSource>,
    playback:     PlaybackController,
    registry:     ModelRegistry,
    overlay:      OverlayBuilder,
    camera:       CameraConfig,
    sample_orbit: SampleOrbit,
    options:      PlaybackOptions,
    selection:    ModelSelection,
    pose:         ModelPose,
    view:         ViewKind,
    scenario:     Option<SimulationResult>,
}

impl<E: RenderEngine> ViewerSession<E> {
    pub fn new(
        config: &ViewerConfig,
        engine: E,
        source: Box<dyn SimulationSource>,
    ) -> VizResult<Self> {
        let registry = config.registry()?;
        let selection = config.default_selection();
        let pose = derive_model_pose(&registry, &selection);
        Ok(Self {
            engine,
            scene: SceneSync::new(),
            source,
            playback: PlaybackController::new(config.clock()?),
            registry,
            overlay: config.overlay_builder(),
            camera: config.camera.clone(),
            sample_orbit: config.sample_orbit.clone(),
            options: config.playback_options(),
            selection,
            pose,
            view: ViewKind::Empty,
            scenario: None,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn scene(&self) -> &SceneSync<E::Handle> {
        &self.scene
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn pose(&self) -> &ModelPose {
        &self.pose
    }

    pub fn selection(&self) -> &ModelSelection {
        &self.selection
    }

    pub fn view(&self) -> ViewKind {
        self.view
    }

    pub fn scenario(&self) -> Option<&SimulationResult> {
        self.scenario.as_ref()
    }

    // ── Views ──────────────────────────────────────────────────────

    /// Resolve a simulation (live, else bundled example), then show its
    /// overlay and frame the camera on the outermost ring.
    pub fn show_scenario(&mut self, request: &SimulationRequest) -> VizResult<Vec<ViewerEvent>> {
        let resolved = resolve_simulation(self.source.as_mut(), &request.normalized())?;
        let result = resolved.value;
        let primitives = self.overlay.build(&result)?;

        let mut events = vec![ViewerEvent::ScenarioLoaded {
            simulation_id: result.id.clone(),
            origin:        resolved.origin,
            rings:         result.rings.len(),
        }];
        if resolved.origin == DataOrigin::Fallback {
            events.push(ViewerEvent::Warning {
                message: "simulation service unavailable, showing bundled example".into(),
            });
        }

        self.playback.unload();
        self.switch_view(ViewKind::Scenario, &primitives, &mut events);

        let target = camera_target(&result, &self.camera);
        self.engine.fly_to(target, self.camera.fly_duration_s);
        events.push(ViewerEvent::CameraFramed { target, duration_s: self.camera.fly_duration_s });

        self.scenario = Some(result);
        Ok(events)
    }

    /// Parse and load an untrusted trajectory. A malformed document is
    /// replaced by the sample orbit and reported as a warning.
    pub fn load_trajectory(
        &mut self,
        raw:     &Value,
        looping: Option<bool>,
    ) -> VizResult<Vec<ViewerEvent>> {
        let options = PlaybackOptions { looping: looping.unwrap_or(self.options.looping) };
        match trajectory::parse(raw) {
            Ok(t) => Ok(self.show_trajectory(t, options, false)),
            Err(e) => {
                log::warn!("trajectory rejected, showing sample orbit: {e}");
                let t = self.sample_orbit.trajectory(Utc::now())?;
                let mut events = vec![ViewerEvent::Warning {
                    message: format!("{e}; showing sample orbit"),
                }];
                events.extend(self.show_trajectory(t, options, true));
                Ok(events)
            }
        }
    }

    /// Generate and load the demo orbit. With a seed the orbit shape is
    /// randomized reproducibly.
    pub fn load_sample(
        &mut self,
        seed:  Option<u64>,
        epoch: DateTime<Utc>,
    ) -> VizResult<Vec<ViewerEvent>> {
        let orbit = match seed {
            Some(s) => self.sample_orbit.randomized(s),
            None => self.sample_orbit.clone(),
        };
        let t = orbit.trajectory(epoch)?;
        Ok(self.show_trajectory(t, self.options, false))
    }

    fn show_trajectory(
        &mut self,
        t:        Trajectory,
        options:  PlaybackOptions,
        fallback: bool,
    ) -> Vec<ViewerEvent> {
        let mut events = vec![ViewerEvent::TrajectoryLoaded {
            fallback,
            epoch:         t.epoch(),
            samples:       t.samples().len(),
            max_offset:    t.max_offset(),
            interpolation: t.interpolation(),
        }];
        self.playback.load(t, options);
        self.scenario = None;
        events.push(self.playback_changed());

        let primitives = self.trajectory_frame();
        self.switch_view(ViewKind::Trajectory, &primitives, &mut events);
        events
    }

    /// Remove everything and return to the empty view.
    pub fn teardown(&mut self) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        self.retract(&mut events);
        self.playback.unload();
        self.scenario = None;
        self.view = ViewKind::Empty;
        events
    }

    fn switch_view(
        &mut self,
        next:       ViewKind,
        primitives: &[OverlayPrimitive],
        events:     &mut Vec<ViewerEvent>,
    ) {
        self.retract(events);
        let report = self.scene.sync(&mut self.engine, primitives);
        push_sync_events(report, events);
        log::debug!("view switched {:?} → {:?}", self.view, next);
        self.view = next;
    }

    fn retract(&mut self, events: &mut Vec<ViewerEvent>) {
        if self.scene.is_empty() && self.scene.orphan_count() == 0 {
            return;
        }
        let report = self.scene.teardown(&mut self.engine);
        let removed = report.removed;
        for err in report.failures {
            events.push(failure_event(err));
        }
        events.push(ViewerEvent::ViewTornDown { removed });
    }

    fn trajectory_frame(&self) -> Vec<OverlayPrimitive> {
        match self.playback.trajectory() {
            Some(t) => {
                let offset = self.playback.current_offset();
                build_trajectory_frame(t.position_at(offset), &t.trail_until(offset), &self.pose)
            }
            None => Vec::new(),
        }
    }

    fn resync_trajectory(&mut self, events: &mut Vec<ViewerEvent>) {
        if self.view != ViewKind::Trajectory {
            return;
        }
        let primitives = self.trajectory_frame();
        let report = self.scene.sync(&mut self.engine, &primitives);
        push_sync_events(report, events);
    }

    // ── Playback ───────────────────────────────────────────────────

    pub fn play(&mut self) -> Vec<ViewerEvent> {
        if self.playback.play() { vec![self.playback_changed()] } else { Vec::new() }
    }

    pub fn pause(&mut self) -> Vec<ViewerEvent> {
        if self.playback.pause() { vec![self.playback_changed()] } else { Vec::new() }
    }

    pub fn reset(&mut self) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        if self.playback.reset() {
            events.push(self.playback_changed());
            self.resync_trajectory(&mut events);
        }
        events
    }

    /// Advance playback by `real_dt_s` of wall time and re-sync the
    /// trajectory primitives for the new offset.
    pub fn tick(&mut self, real_dt_s: f64) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        let Some(frame) = self.playback.tick(real_dt_s) else {
            return events;
        };
        events.push(ViewerEvent::Frame {
            offset_s: frame.offset_s,
            time:     frame.time,
            position: frame.position,
        });
        if frame.finished {
            events.push(self.playback_changed());
        }
        self.resync_trajectory(&mut events);
        events
    }

    fn playback_changed(&self) -> ViewerEvent {
        ViewerEvent::PlaybackChanged {
            phase:    self.playback.phase(),
            offset_s: self.playback.current_offset(),
        }
    }

    // ── Model ──────────────────────────────────────────────────────

    /// Switch model. Unknown keys are accepted and render at unit scale.
    pub fn select_model(&mut self, key: &str) -> Vec<ViewerEvent> {
        if self.selection.model_key == key {
            return Vec::new();
        }
        let mut events = Vec::new();
        if let Err(e) = self.registry.get(key) {
            events.push(ViewerEvent::Warning { message: e.to_string() });
        }
        self.selection.model_key = key.to_string();
        self.rederive_pose(&mut events);
        events
    }

    pub fn set_size(&mut self, size_m: f64) -> VizResult<Vec<ViewerEvent>> {
        if !size_m.is_finite() || size_m <= 0.0 {
            return Err(VizError::InvalidArgument(format!(
                "asteroid size must be > 0 m, got {size_m}"
            )));
        }
        let mut events = Vec::new();
        if self.selection.size_m != size_m {
            self.selection.size_m = size_m;
            self.rederive_pose(&mut events);
        }
        Ok(events)
    }

    fn rederive_pose(&mut self, events: &mut Vec<ViewerEvent>) {
        self.pose = derive_model_pose(&self.registry, &self.selection);
        log::debug!("model pose: {} at scale {}", self.pose.model_key, self.pose.scale);
        events.push(ViewerEvent::ModelChanged { pose: self.pose.clone() });
        self.resync_trajectory(events);
    }

    // ── Commands ───────────────────────────────────────────────────

    pub fn state(&self) -> ViewerEvent {
        ViewerEvent::State {
            playback:   self.playback.status(),
            selection:  self.selection.clone(),
            primitives: self.scene.current().iter().map(|p| p.id().to_string()).collect(),
        }
    }

    /// Dispatch one command. `Quit` is the caller's concern and yields
    /// no events.
    pub fn apply(&mut self, command: ViewerCommand) -> VizResult<Vec<ViewerEvent>> {
        match command {
            ViewerCommand::Play => Ok(self.play()),
            ViewerCommand::Pause => Ok(self.pause()),
            ViewerCommand::Reset => Ok(self.reset()),
            ViewerCommand::Tick { dt_s } => Ok(self.tick(dt_s)),
            ViewerCommand::SetSpeed { speed } => {
                self.playback.clock_mut().set_speed(speed);
                Ok(Vec::new())
            }
            ViewerCommand::SelectModel { key } => Ok(self.select_model(&key)),
            ViewerCommand::SetSize { size_m } => self.set_size(size_m),
            ViewerCommand::ShowScenario { inputs } => {
                let request = match inputs {
                    Some(v) => SimulationRequest::from_inputs(&v)?,
                    None => SimulationRequest::default(),
                };
                self.show_scenario(&request)
            }
            ViewerCommand::LoadSample { seed } => self.load_sample(seed, Utc::now()),
            ViewerCommand::LoadTrajectory { data, looping } => self.load_trajectory(&data, looping),
            ViewerCommand::Teardown => Ok(self.teardown()),
            ViewerCommand::GetState => Ok(vec![self.state()]),
            ViewerCommand::Quit => Ok(Vec::new()),
        }
    }
}

impl<E: RenderEngine> Drop for ViewerSession<E> {
    fn drop(&mut self) {
        if !self.scene.is_empty() || self.scene.orphan_count() > 0 {
            self.scene.teardown(&mut self.engine);
        }
    }
}

fn push_sync_events(report: SyncReport, events: &mut Vec<ViewerEvent>) {
    events.push(ViewerEvent::OverlaySynced {
        added:     report.added,
        removed:   report.removed,
        replaced:  report.replaced,
        unchanged: report.unchanged,
        failed:    report.failures.len(),
    });
    for err in report.failures {
        events.push(failure_event(err));
    }
}

fn failure_event(err: VizError) -> ViewerEvent {
    match err {
        VizError::EngineSyncFailure { op, id, reason } => {
            ViewerEvent::EngineSyncFailed { op: op.to_string(), id, reason }
        }
        other => ViewerEvent::Warning { message: other.to_string() },
    }
}
