//! Overlay primitive construction from simulation results.

use impactviz_core::{
    geo::{destination_point, GeoPoint},
    overlay::{
        build_trajectory_frame, default_palette, Color, OverlayBuilder, OverlayPrimitive,
        RING_LABEL_BEARING_DEG,
    },
    scale::{derive_model_pose, ModelRegistry, ModelSelection},
    simulation::{Ring, SimulationMeta, SimulationResult, Totals},
    types::EARTH_RADIUS_M,
};

fn ring(threshold_kpa: f64, radius_m: f64) -> Ring {
    Ring {
        threshold_kpa,
        radius_m,
        population: 1_000,
        estimated_deaths: 10,
        blurb: String::new(),
    }
}

fn result_with(rings: Vec<Ring>) -> SimulationResult {
    SimulationResult {
        id: "test".into(),
        center: GeoPoint::new(10.0, 20.0),
        transient_crater_diameter_m: 800.0,
        final_crater_diameter_m: 1_000.0,
        rings,
        totals: Totals::default(),
        energy_released_megatons: None,
        meta: SimulationMeta::default(),
    }
}

fn six_rings() -> Vec<Ring> {
    vec![
        ring(70.0, 2_100.0),
        ring(50.0, 2_800.0),
        ring(35.0, 3_600.0),
        ring(20.0, 5_200.0),
        ring(10.0, 8_900.0),
        ring(3.0, 21_000.0),
    ]
}

fn ids(prims: &[OverlayPrimitive]) -> Vec<&str> {
    prims.iter().map(OverlayPrimitive::id).collect()
}

#[test]
fn six_rings_yield_eighteen_primitives() {
    let prims = OverlayBuilder::default().build(&result_with(six_rings())).unwrap();
    assert_eq!(prims.len(), 18, "expected 6 + 2*6 primitives, got {}", prims.len());
}

#[test]
fn zero_rings_yield_center_and_craters_only() {
    let prims = OverlayBuilder::default().build(&result_with(vec![])).unwrap();
    assert_eq!(
        ids(&prims),
        vec![
            "impact-center",
            "impact-center-label",
            "crater-transient",
            "crater-transient-label",
            "crater-final",
            "crater-final-label",
        ]
    );
}

#[test]
fn ring_primitives_follow_ring_order() {
    let prims = OverlayBuilder::default()
        .build(&result_with(vec![ring(50.0, 1_000.0), ring(20.0, 4_000.0)]))
        .unwrap();
    assert_eq!(&ids(&prims)[6..], &["ring-0", "ring-0-label", "ring-1", "ring-1-label"]);
}

#[test]
fn ids_are_unique() {
    let prims = OverlayBuilder::default().build(&result_with(six_rings())).unwrap();
    let mut seen = std::collections::HashSet::new();
    for id in ids(&prims) {
        assert!(seen.insert(id), "duplicate id {id}");
    }
}

#[test]
fn build_is_deterministic() {
    let result = result_with(six_rings());
    let a = OverlayBuilder::default().build(&result).unwrap();
    let b = OverlayBuilder::default().build(&result).unwrap();
    assert_eq!(a, b, "rebuilding the same result must not drift");
}

#[test]
fn ring_label_sits_at_45_degrees_on_the_ring() {
    let result = result_with(vec![ring(50.0, 5_000.0)]);
    let prims = OverlayBuilder::default().build(&result).unwrap();
    let label = prims.iter().find(|p| p.id() == "ring-0-label").unwrap();
    let expected =
        destination_point(result.center, RING_LABEL_BEARING_DEG, 5_000.0, EARTH_RADIUS_M).unwrap();
    assert_eq!(label.anchor(), expected);
    match label {
        OverlayPrimitive::Label { text, .. } => assert_eq!(text, "50 kPa (5.0 km)"),
        other => panic!("expected a label, got {other:?}"),
    }
}

#[test]
fn ring_circle_is_centered_with_ring_radius() {
    let prims = OverlayBuilder::default().build(&result_with(vec![ring(50.0, 5_000.0)])).unwrap();
    match prims.iter().find(|p| p.id() == "ring-0").unwrap() {
        OverlayPrimitive::Circle { anchor, radius_m, .. } => {
            assert_eq!(*anchor, GeoPoint::new(10.0, 20.0));
            assert_eq!(*radius_m, 5_000.0);
        }
        other => panic!("expected a circle, got {other:?}"),
    }
}

#[test]
fn crater_circles_use_half_the_diameter() {
    let prims = OverlayBuilder::default().build(&result_with(vec![])).unwrap();
    let radius = |id: &str| match prims.iter().find(|p| p.id() == id).unwrap() {
        OverlayPrimitive::Circle { radius_m, .. } => *radius_m,
        other => panic!("expected a circle, got {other:?}"),
    };
    assert_eq!(radius("crater-transient"), 400.0);
    assert_eq!(radius("crater-final"), 500.0);
}

#[test]
fn zero_radius_ring_label_sits_on_center() {
    let result = result_with(vec![ring(50.0, 0.0)]);
    let prims = OverlayBuilder::default().build(&result).unwrap();
    let label = prims.iter().find(|p| p.id() == "ring-0-label").unwrap();
    assert_eq!(label.anchor(), result.center);
}

#[test]
fn rings_past_the_palette_use_the_fallback_color() {
    let builder = OverlayBuilder::new(default_palette(), Color::NEUTRAL);
    let mut rings = six_rings();
    rings.push(ring(1.0, 40_000.0));
    let prims = builder.build(&result_with(rings)).unwrap();
    match prims.iter().find(|p| p.id() == "ring-6").unwrap() {
        OverlayPrimitive::Circle { style, .. } => assert_eq!(style.outline, Color::NEUTRAL),
        other => panic!("expected a circle, got {other:?}"),
    }
    assert_eq!(builder.ring_color(0), default_palette()[0]);
}

#[test]
fn trajectory_frame_has_path_only_with_two_points() {
    let registry = ModelRegistry::default();
    let pose = derive_model_pose(&registry, &ModelSelection { model_key: "x".into(), size_m: 10.0 });
    let here = GeoPoint::new(1.0, 2.0);

    let lone = build_trajectory_frame(here, &[here], &pose);
    assert_eq!(ids(&lone), vec!["asteroid", "asteroid-label"]);

    let trail = [GeoPoint::new(0.0, 0.0), here];
    let full = build_trajectory_frame(here, &trail, &pose);
    assert_eq!(ids(&full), vec!["asteroid", "asteroid-label", "asteroid-path"]);
    match &full[0] {
        OverlayPrimitive::PointMarker { style, .. } => {
            assert_eq!(style.model.as_ref(), Some(&pose), "marker must carry the model pose")
        }
        other => panic!("expected a point marker, got {other:?}"),
    }
}

#[test]
fn primitives_serialize_with_kind_tag_and_hex_colors() {
    let prims = OverlayBuilder::default().build(&result_with(vec![])).unwrap();
    let v = serde_json::to_value(&prims[2]).unwrap();
    assert_eq!(v["kind"], "circle");
    assert_eq!(v["id"], "crater-transient");
    assert_eq!(v["style"]["outline"], "#ffff00");
}
