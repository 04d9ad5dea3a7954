//! End-to-end: a viewer session over the recording engine.

use chrono::{TimeZone, Utc};
use impactviz_core::{
    command::ViewerCommand,
    config::ViewerConfig,
    event::ViewerEvent,
    geo::{destination_point, GeoPoint},
    overlay::OverlayPrimitive,
    playback::PlaybackPhase,
    scene::RecordingEngine,
    session::{ViewKind, ViewerSession},
    simulation::{DataOrigin, OfflineSource, SimulationRequest, SimulationSource},
    types::EARTH_RADIUS_M,
};
use serde_json::{json, Value};

struct OneRingSource;

impl SimulationSource for OneRingSource {
    fn fetch(&mut self, _request: &SimulationRequest) -> anyhow::Result<Value> {
        Ok(json!({
            "id": "one-ring",
            "map": { "center": { "lat": 10.0, "lon": 20.0 } },
            "panel": {
                "crater_final": { "diameter_m": 500.0 },
                "rings": [{ "threshold_kpa": 50.0, "radius_m": 5000.0 }],
                "totals": { "total_estimated_deaths": 0 }
            },
            "meta": { "version": "test", "units": "SI", "notes": [] }
        }))
    }
}

fn session(source: Box<dyn SimulationSource>) -> ViewerSession<RecordingEngine> {
    let _ = env_logger::builder().is_test(true).try_init();
    ViewerSession::new(&ViewerConfig::default_test(), RecordingEngine::new(), source).unwrap()
}

fn short_track() -> Value {
    json!({
        "epoch": "2025-10-04T12:00:00Z",
        "cartographicDegrees": [0.0, 10.0, 0.0, 1000.0, 60.0, 11.0, 1.0, 1000.0]
    })
}

#[test]
fn one_ring_scenario_end_to_end() {
    let mut s = session(Box::new(OneRingSource));
    let events = s.show_scenario(&SimulationRequest::default()).unwrap();

    assert!(
        events.iter().any(|e| matches!(
            e,
            ViewerEvent::ScenarioLoaded { origin: DataOrigin::Live, rings: 1, .. }
        )),
        "expected a live one-ring scenario, got {events:?}"
    );
    assert_eq!(s.engine().live_count(), 8, "6 base primitives + ring + ring label");

    let label = s.scene().primitive("ring-0-label").unwrap();
    let expected =
        destination_point(GeoPoint::new(10.0, 20.0), 45.0, 5000.0, EARTH_RADIUS_M).unwrap();
    assert!((label.anchor().lat - expected.lat).abs() < 1e-6);
    assert!((label.anchor().lon - expected.lon).abs() < 1e-6);

    let (target, duration) = s.engine().last_fly_to().unwrap();
    assert_eq!(target.alt, 15_000.0);
    assert_eq!(duration, 2.0);
}

#[test]
fn offline_scenario_uses_fallback_and_warns() {
    let mut s = session(Box::new(OfflineSource));
    let events = s.show_scenario(&SimulationRequest::default()).unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        ViewerEvent::ScenarioLoaded { origin: DataOrigin::Fallback, rings: 6, .. }
    )));
    assert!(events.iter().any(|e| matches!(e, ViewerEvent::Warning { .. })));
    assert_eq!(s.engine().live_count(), 18);
    assert_eq!(s.view(), ViewKind::Scenario);
}

#[test]
fn switching_views_removes_old_primitives_before_adding_new() {
    let mut s = session(Box::new(OfflineSource));
    s.show_scenario(&SimulationRequest::default()).unwrap();
    s.engine_mut().clear_ops();

    s.load_trajectory(&short_track(), None).unwrap();
    let ops = s.engine().ops();
    let first_add = ops
        .iter()
        .position(|op| matches!(op, impactviz_core::scene::EngineOp::Add { .. }))
        .unwrap();
    assert_eq!(first_add, 18, "all 18 scenario primitives go before any trajectory primitive");
    assert_eq!(s.engine().live_ids(), vec!["asteroid", "asteroid-label"]);
    assert!(s.scenario().is_none());
}

#[test]
fn playback_ticks_resync_the_asteroid() {
    let mut s = session(Box::new(OfflineSource));
    s.load_trajectory(&short_track(), None).unwrap();
    assert!(s.tick(1.0).is_empty(), "paused session must not emit frames");

    let events = s.play();
    assert!(matches!(
        events[..],
        [ViewerEvent::PlaybackChanged { phase: PlaybackPhase::Playing, .. }]
    ));

    // Multiplier 10: one second of wall time is 10 s of trajectory.
    let events = s.tick(1.0);
    assert!(events.iter().any(|e| matches!(e, ViewerEvent::Frame { offset_s, .. } if *offset_s == 10.0)));
    assert!(s.scene().contains("asteroid-path"), "trail appears once the asteroid moves");

    s.tick(10.0);
    assert_eq!(s.playback().phase(), PlaybackPhase::Paused);
    assert_eq!(s.playback().current_offset(), 60.0);
}

#[test]
fn reset_moves_the_asteroid_back_to_start() {
    let mut s = session(Box::new(OfflineSource));
    s.load_trajectory(&short_track(), None).unwrap();
    s.play();
    s.tick(3.0);
    s.reset();
    let marker = s.scene().primitive("asteroid").unwrap();
    assert_eq!(marker.anchor(), GeoPoint::with_alt(0.0, 10.0, 1000.0));
    assert!(!s.scene().contains("asteroid-path"));
}

#[test]
fn size_change_rederives_pose_and_replaces_marker() {
    let mut s = session(Box::new(OfflineSource));
    s.load_trajectory(&short_track(), None).unwrap();
    s.engine_mut().clear_ops();

    let events = s.set_size(250.0).unwrap();
    assert!(events.iter().any(|e| matches!(e, ViewerEvent::ModelChanged { pose } if pose.scale == 250.0)));
    match s.scene().primitive("asteroid").unwrap() {
        OverlayPrimitive::PointMarker { style, .. } => {
            assert_eq!(style.model.as_ref().map(|m| m.scale), Some(250.0))
        }
        other => panic!("expected a point marker, got {other:?}"),
    }
    assert_eq!(s.engine().count_removes(), 2, "marker and label are replaced");
    assert!(s.set_size(0.0).is_err());
    assert!(s.set_size(250.0).unwrap().is_empty(), "unchanged size is a no-op");
}

#[test]
fn unknown_model_warns_and_uses_unit_scale() {
    let mut s = session(Box::new(OfflineSource));
    let events = s.select_model("vesta");
    assert!(events.iter().any(|e| matches!(e, ViewerEvent::Warning { .. })));
    assert_eq!(s.pose().scale, 1.0);
    assert_eq!(s.selection().model_key, "vesta");
}

#[test]
fn malformed_trajectory_falls_back_to_sample_orbit() {
    let mut s = session(Box::new(OfflineSource));
    let events = s.load_trajectory(&json!({ "nope": true }), None).unwrap();
    assert!(matches!(events[0], ViewerEvent::Warning { .. }));
    assert!(events.iter().any(|e| matches!(
        e,
        ViewerEvent::TrajectoryLoaded { fallback: true, samples: 101, .. }
    )));
    assert_eq!(s.view(), ViewKind::Trajectory);
}

#[test]
fn seeded_sample_is_reproducible() {
    let epoch = Utc.with_ymd_and_hms(2025, 10, 4, 12, 0, 0).unwrap();
    let mut a = session(Box::new(OfflineSource));
    let mut b = session(Box::new(OfflineSource));
    a.load_sample(Some(42), epoch).unwrap();
    b.load_sample(Some(42), epoch).unwrap();
    assert_eq!(a.playback().trajectory(), b.playback().trajectory());
}

#[test]
fn teardown_leaves_engine_empty() {
    let mut s = session(Box::new(OfflineSource));
    s.show_scenario(&SimulationRequest::default()).unwrap();
    let events = s.teardown();
    assert!(matches!(events[..], [ViewerEvent::ViewTornDown { removed: 18 }]));
    assert_eq!(s.engine().live_count(), 0);
    assert_eq!(s.playback().phase(), PlaybackPhase::Idle);
    assert!(s.teardown().is_empty(), "second teardown has nothing to do");
}

#[test]
fn commands_deserialize_and_dispatch() {
    let mut s = session(Box::new(OneRingSource));
    let script = [
        r#"{"cmd":"show_scenario","inputs":{"diameter_m":50}}"#,
        r#"{"cmd":"load_trajectory","data":[0.0,10.0,0.0,0.0,30.0,11.0,0.0,0.0],"looping":true}"#,
        r#"{"cmd":"set_speed","speed":"realtime"}"#,
        r#"{"cmd":"play"}"#,
        r#"{"cmd":"tick","dt_s":45.0}"#,
        r#"{"cmd":"get_state"}"#,
    ];
    let mut last = Vec::new();
    for line in script {
        let cmd: ViewerCommand = serde_json::from_str(line).unwrap();
        last = s.apply(cmd).unwrap();
    }
    match &last[..] {
        [ViewerEvent::State { playback, primitives, .. }] => {
            assert_eq!(playback.phase, PlaybackPhase::Playing, "looping keeps playing");
            assert_eq!(playback.offset_s, 15.0);
            assert!(primitives.iter().any(|id| id == "asteroid"));
        }
        other => panic!("expected a single state event, got {other:?}"),
    }
}

#[test]
fn events_serialize_with_type_tag() {
    let v = serde_json::to_value(ViewerEvent::ViewTornDown { removed: 3 }).unwrap();
    assert_eq!(v, json!({ "type": "view_torn_down", "removed": 3 }));
}

#[test]
fn refused_remove_on_view_switch_is_reported() {
    let mut s = session(Box::new(OfflineSource));
    s.show_scenario(&SimulationRequest::default()).unwrap();
    s.engine_mut().reject_remove("impact-center");

    let events = s.load_trajectory(&short_track(), None).unwrap();
    assert!(
        events.iter().any(|e| matches!(
            e,
            ViewerEvent::EngineSyncFailed { op, id, .. } if op == "remove" && id == "impact-center"
        )),
        "expected a remove failure event, got {events:?}"
    );
    assert!(events.iter().any(|e| matches!(e, ViewerEvent::ViewTornDown { removed: 17 })));
    assert_eq!(s.view(), ViewKind::Trajectory);
    assert!(s.scene().contains("asteroid"));

    s.engine_mut().accept_remove("impact-center");
    s.teardown();
    assert_eq!(s.engine().live_count(), 0, "the orphaned center marker goes on teardown");
}

#[test]
fn dropping_the_session_releases_the_engine() {
    fn show_then_fail(engine: &mut RecordingEngine) -> anyhow::Result<()> {
        let mut s = ViewerSession::new(&ViewerConfig::default_test(), engine, Box::new(OfflineSource))?;
        s.show_scenario(&SimulationRequest::default())?;
        anyhow::bail!("viewer closed mid-scenario")
    }

    let mut engine = RecordingEngine::new();
    assert!(show_then_fail(&mut engine).is_err());
    assert_eq!(engine.count_adds(), 18);
    assert_eq!(engine.live_count(), 0, "drop must remove every primitive");
}
