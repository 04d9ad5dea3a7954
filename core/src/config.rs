use crate::{
    clock::PlaybackClock,
    error::VizResult,
    overlay::{default_palette, Color, OverlayBuilder},
    playback::PlaybackOptions,
    sample::SampleOrbit,
    scale::{AsteroidModelSpec, ModelRegistry, ModelSelection},
    scene::CameraConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    /// Trajectory seconds per real second.
    pub multiplier:     f64,
    #[serde(default)]
    pub looping:        bool,
    pub default_model:  String,
    pub default_size_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub models:         Vec<AsteroidModelSpec>,
    pub palette:        Vec<Color>,
    pub fallback_color: Color,
    pub playback:       PlaybackConfig,
    pub camera:         CameraConfig,
    #[serde(default)]
    pub sample_orbit:   SampleOrbit,
}

impl ViewerConfig {
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/viewer_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ViewerConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.registry()?;
        PlaybackClock::new(config.playback.multiplier)?;
        log::debug!(
            "viewer config loaded from {path}: {} models, {} palette colors",
            config.models.len(),
            config.palette.len()
        );
        Ok(config)
    }

    /// Hard-coded config for tests; matches the shipped data file.
    pub fn default_test() -> Self {
        let model = |key: &str, display_name: &str, asset_path: &str| AsteroidModelSpec {
            key:               key.into(),
            display_name:      display_name.into(),
            asset_path:        asset_path.into(),
            native_size_units: 1.0,
        };
        Self {
            models: vec![
                model("bennu", "Bennu", "assets/bennu/Bennu.gltf"),
                model("gaspra", "Gaspra", "assets/gaspra/gaspra.gltf"),
                model(
                    "asteroid2",
                    "Generic Asteroid 2",
                    "assets/generic_asteroid_2/generic_asteroid_2.gltf",
                ),
                model(
                    "asteroid3",
                    "Generic Asteroid 3",
                    "assets/generic_asteroid_3/generic_asteroid_3.gltf",
                ),
            ],
            palette:        default_palette(),
            fallback_color: Color::NEUTRAL,
            playback: PlaybackConfig {
                multiplier:     10.0,
                looping:        false,
                default_model:  "bennu".into(),
                default_size_m: 500.0,
            },
            camera:       CameraConfig::default(),
            sample_orbit: SampleOrbit::default(),
        }
    }

    pub fn registry(&self) -> VizResult<ModelRegistry> {
        ModelRegistry::new(self.models.clone())
    }

    pub fn overlay_builder(&self) -> OverlayBuilder {
        OverlayBuilder::new(self.palette.clone(), self.fallback_color)
    }

    pub fn clock(&self) -> VizResult<PlaybackClock> {
        PlaybackClock::new(self.playback.multiplier)
    }

    pub fn playback_options(&self) -> PlaybackOptions {
        PlaybackOptions { looping: self.playback.looping }
    }

    pub fn default_selection(&self) -> ModelSelection {
        ModelSelection {
            model_key: self.playback.default_model.clone(),
            size_m:    self.playback.default_size_m,
        }
    }
}
