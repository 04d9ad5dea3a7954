//! Model registry, render scale and pose derivation.

use impactviz_core::{
    config::ViewerConfig,
    error::VizError,
    scale::{
        derive_model_pose, resolve_scale, scale_or_default, AsteroidModelSpec, ModelRegistry,
        ModelSelection, MAXIMUM_SCALE, MINIMUM_PIXEL_SIZE,
    },
};

fn model_spec(key: &str, native: f64) -> AsteroidModelSpec {
    AsteroidModelSpec {
        key:               key.into(),
        display_name:      key.to_uppercase(),
        asset_path:        format!("assets/{key}.gltf"),
        native_size_units: native,
    }
}

#[test]
fn scale_is_linear_in_target_size() {
    let m = model_spec("rock", 4.0);
    for size in [1.0, 10.0, 250.0, 1_000.0] {
        let s1 = resolve_scale(size, &m).unwrap();
        let s2 = resolve_scale(size * 2.0, &m).unwrap();
        assert_eq!(s2, 2.0 * s1, "doubling size {size} must double scale");
    }
    assert_eq!(resolve_scale(100.0, &m).unwrap(), 25.0);
}

#[test]
fn non_positive_target_size_is_rejected() {
    let m = model_spec("rock", 1.0);
    for size in [0.0, -5.0, f64::NAN] {
        let err = resolve_scale(size, &m).unwrap_err();
        assert!(matches!(err, VizError::InvalidArgument(_)), "size {size}: got {err:?}");
    }
}

#[test]
fn registry_rejects_non_positive_native_size() {
    let err = ModelRegistry::new(vec![model_spec("ok", 1.0), model_spec("flat", 0.0)]).unwrap_err();
    assert!(matches!(err, VizError::InvalidArgument(_)), "got {err:?}");
}

#[test]
fn unknown_model_lookup_fails_but_scale_falls_back_to_one() {
    let registry = ModelRegistry::new(vec![model_spec("bennu", 1.0)]).unwrap();
    let err = registry.get("vesta").unwrap_err();
    assert!(matches!(err, VizError::UnknownModel { ref key } if key == "vesta"), "got {err:?}");
    assert_eq!(scale_or_default(&registry, "vesta", 500.0), 1.0);
    assert_eq!(scale_or_default(&registry, "bennu", 500.0), 500.0);
}

#[test]
fn pose_carries_scale_clamps_and_label() {
    let registry = ViewerConfig::default_test().registry().unwrap();
    let pose = derive_model_pose(
        &registry,
        &ModelSelection { model_key: "gaspra".into(), size_m: 250.0 },
    );
    assert_eq!(pose.model_key, "gaspra");
    assert_eq!(pose.asset_path.as_deref(), Some("assets/gaspra/gaspra.gltf"));
    assert_eq!(pose.scale, 250.0);
    assert_eq!(pose.minimum_pixel_size, MINIMUM_PIXEL_SIZE);
    assert_eq!(pose.maximum_scale, MAXIMUM_SCALE);
    assert_eq!(pose.label, "Asteroid (250m)");
}

#[test]
fn pose_for_unknown_model_has_unit_scale_and_no_asset() {
    let registry = ViewerConfig::default_test().registry().unwrap();
    let pose = derive_model_pose(
        &registry,
        &ModelSelection { model_key: "nope".into(), size_m: 500.0 },
    );
    assert_eq!(pose.scale, 1.0);
    assert!(pose.asset_path.is_none(), "unknown model must not resolve an asset");
}

#[test]
fn pose_derivation_is_pure() {
    let registry = ViewerConfig::default_test().registry().unwrap();
    let sel = ModelSelection { model_key: "bennu".into(), size_m: 120.5 };
    assert_eq!(derive_model_pose(&registry, &sel), derive_model_pose(&registry, &sel));
}
