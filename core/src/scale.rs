//! Model registry and render scale resolution.
//!
//! A model's native size is its bounding dimension in the asset's own
//! unit space. The render scale maps a desired physical size in metres
//! onto that: `scale = target_m / native_units`.

use crate::{
    error::{VizError, VizResult},
    types::ModelKey,
};
use serde::{Deserialize, Serialize};

/// Clamp hints handed to the rendering engine alongside the scale.
pub const MINIMUM_PIXEL_SIZE: u32 = 64;
pub const MAXIMUM_SCALE: f64 = 50_000.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AsteroidModelSpec {
    pub key:               ModelKey,
    pub display_name:      String,
    pub asset_path:        String,
    pub native_size_units: f64,
}

/// Static table of models, keyed by string id. Populated at startup
/// from config; never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<AsteroidModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Vec<AsteroidModelSpec>) -> VizResult<Self> {
        for m in &models {
            if !(m.native_size_units.is_finite() && m.native_size_units > 0.0) {
                return Err(VizError::InvalidArgument(format!(
                    "model '{}' has non-positive native size {}",
                    m.key, m.native_size_units
                )));
            }
        }
        Ok(Self { models })
    }

    pub fn get(&self, key: &str) -> VizResult<&AsteroidModelSpec> {
        self.models
            .iter()
            .find(|m| m.key == key)
            .ok_or_else(|| VizError::UnknownModel { key: key.to_string() })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.key.as_str())
    }

    pub fn first(&self) -> Option<&AsteroidModelSpec> {
        self.models.first()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Render scale for a model so that it appears `target_size_m` across.
pub fn resolve_scale(target_size_m: f64, model: &AsteroidModelSpec) -> VizResult<f64> {
    if !target_size_m.is_finite() || target_size_m <= 0.0 {
        return Err(VizError::InvalidArgument(format!(
            "target size must be > 0, got {target_size_m}"
        )));
    }
    if model.native_size_units.is_nan() || model.native_size_units <= 0.0 {
        return Err(VizError::InvalidArgument(format!(
            "model '{}' has non-positive native size",
            model.key
        )));
    }
    Ok(target_size_m / model.native_size_units)
}

/// Registry lookup + scale, recovering to unit scale on any failure.
/// Visualization proceeds at default scale; the caller gets a warning.
pub fn scale_or_default(registry: &ModelRegistry, key: &str, target_size_m: f64) -> f64 {
    match registry.get(key).and_then(|m| resolve_scale(target_size_m, m)) {
        Ok(scale) => scale,
        Err(e) => {
            log::warn!("scale for model '{key}' unavailable, using 1.0: {e}");
            1.0
        }
    }
}

/// The user's current model choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSelection {
    pub model_key: ModelKey,
    pub size_m:    f64,
}

/// Everything the rendering engine needs to draw the selected model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelPose {
    pub model_key:          ModelKey,
    /// None when the key is not in the registry.
    pub asset_path:         Option<String>,
    pub scale:              f64,
    pub minimum_pixel_size: u32,
    pub maximum_scale:      f64,
    pub label:              String,
}

/// Re-derive the model pose from a selection. Called whenever the model
/// or size changes; pure apart from the fallback warning.
pub fn derive_model_pose(registry: &ModelRegistry, selection: &ModelSelection) -> ModelPose {
    let asset_path = registry
        .get(&selection.model_key)
        .ok()
        .map(|m| m.asset_path.clone());
    ModelPose {
        model_key:          selection.model_key.clone(),
        asset_path,
        scale:              scale_or_default(registry, &selection.model_key, selection.size_m),
        minimum_pixel_size: MINIMUM_PIXEL_SIZE,
        maximum_scale:      MAXIMUM_SCALE,
        label:              format!("Asteroid ({}m)", selection.size_m),
    }
}
