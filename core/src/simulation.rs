//! Simulation results: the document the impact service returns, its
//! validation, and two-step live/fallback resolution.
//!
//! The service nests the result under `map`, `panel` and `meta`. Any
//! deviation from that shape is `InvalidSimulationResult`; the caller
//! never sees it as a crash because `resolve_simulation` substitutes the
//! bundled example and tags the result as fallback data.

use crate::{
    error::{VizError, VizResult},
    geo::GeoPoint,
};
use serde::{Deserialize, Serialize};

const BUNDLED_EXAMPLE: &str = include_str!("../../data/simulation_example.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ring {
    pub threshold_kpa:    f64,
    pub radius_m:         f64,
    #[serde(default)]
    pub population:       u64,
    #[serde(default)]
    pub estimated_deaths: u64,
    #[serde(default)]
    pub blurb:            String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Totals {
    pub total_estimated_deaths: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SimulationMeta {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub units:   String,
    #[serde(default)]
    pub notes:   Vec<String>,
}

/// One scenario's result. Immutable once received; builders take it by
/// shared reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub id:                          String,
    pub center:                      GeoPoint,
    pub transient_crater_diameter_m: f64,
    pub final_crater_diameter_m:     f64,
    /// Most severe first: thresholds descend, radii ascend.
    pub rings:                       Vec<Ring>,
    pub totals:                      Totals,
    pub energy_released_megatons:    Option<f64>,
    pub meta:                        SimulationMeta,
}

impl SimulationResult {
    /// Parse the service's `{id, map, panel, meta}` document.
    pub fn from_document(doc: &serde_json::Value) -> VizResult<Self> {
        let raw: RawDocument = serde_json::from_value(doc.clone())
            .map_err(|e| VizError::InvalidSimulationResult(e.to_string()))?;

        let map = raw.map.ok_or_else(|| missing("map"))?;
        let panel = raw.panel.ok_or_else(|| missing("panel"))?;
        let meta = raw.meta.ok_or_else(|| missing("meta"))?;

        let center = GeoPoint::checked(map.center.lat, map.center.lon, 0.0)
            .map_err(|e| VizError::InvalidSimulationResult(format!("map.center: {e}")))?;

        // Older documents only carry the final crater.
        let transient = panel
            .crater_transient
            .map(|c| c.diameter_m)
            .unwrap_or(panel.crater_final.diameter_m);

        let result = Self {
            id: raw.id,
            center,
            transient_crater_diameter_m: transient,
            final_crater_diameter_m: panel.crater_final.diameter_m,
            rings: panel.rings,
            totals: panel.totals,
            energy_released_megatons: panel.energy_released_megatons,
            meta,
        };
        result.validate()?;
        Ok(result)
    }

    pub fn from_json(json: &str) -> VizResult<Self> {
        let doc: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| VizError::InvalidSimulationResult(e.to_string()))?;
        Self::from_document(&doc)
    }

    /// The example scenario compiled into the binary.
    pub fn bundled_example() -> VizResult<Self> {
        Self::from_json(BUNDLED_EXAMPLE)
    }

    /// Re-check the invariants the service is supposed to guarantee.
    pub fn validate(&self) -> VizResult<()> {
        for (name, d) in [
            ("transient crater diameter", self.transient_crater_diameter_m),
            ("final crater diameter", self.final_crater_diameter_m),
        ] {
            if !d.is_finite() || d < 0.0 {
                return Err(VizError::InvalidSimulationResult(format!("{name} must be >= 0, got {d}")));
            }
        }

        for (i, ring) in self.rings.iter().enumerate() {
            if !ring.threshold_kpa.is_finite() || ring.threshold_kpa <= 0.0 {
                return Err(VizError::InvalidSimulationResult(format!(
                    "ring {i}: threshold must be > 0, got {}",
                    ring.threshold_kpa
                )));
            }
            if !ring.radius_m.is_finite() || ring.radius_m < 0.0 {
                return Err(VizError::InvalidSimulationResult(format!(
                    "ring {i}: radius must be >= 0, got {}",
                    ring.radius_m
                )));
            }
            if ring.estimated_deaths > ring.population {
                return Err(VizError::InvalidSimulationResult(format!(
                    "ring {i}: {} deaths exceed population {}",
                    ring.estimated_deaths, ring.population
                )));
            }
        }

        for (i, pair) in self.rings.windows(2).enumerate() {
            let (inner, outer) = (&pair[0], &pair[1]);
            if outer.threshold_kpa >= inner.threshold_kpa || outer.radius_m <= inner.radius_m {
                return Err(VizError::InvalidSimulationResult(format!(
                    "rings {i} and {} out of severity order ({} kPa @ {} m, {} kPa @ {} m)",
                    i + 1,
                    inner.threshold_kpa,
                    inner.radius_m,
                    outer.threshold_kpa,
                    outer.radius_m
                )));
            }
        }
        Ok(())
    }

    pub fn max_ring_radius_m(&self) -> Option<f64> {
        self.rings.iter().map(|r| r.radius_m).reduce(f64::max)
    }
}

fn missing(section: &str) -> VizError {
    VizError::InvalidSimulationResult(format!("missing '{section}' section"))
}

// ── Wire shape ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    id:    String,
    map:   Option<RawMap>,
    panel: Option<RawPanel>,
    meta:  Option<SimulationMeta>,
}

#[derive(Debug, Deserialize)]
struct RawMap {
    center: RawCenter,
}

#[derive(Debug, Deserialize)]
struct RawCenter {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RawCrater {
    diameter_m: f64,
}

#[derive(Debug, Deserialize)]
struct RawPanel {
    #[serde(default)]
    energy_released_megatons: Option<f64>,
    #[serde(default)]
    crater_transient:         Option<RawCrater>,
    crater_final:             RawCrater,
    #[serde(default)]
    totals:                   Totals,
    #[serde(default)]
    rings:                    Vec<Ring>,
}

// ── Request ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AimPoint {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
}

/// Scenario parameters posted to the service as `{"inputs": {...}}`.
/// Unknown fields are preserved untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationRequest {
    #[serde(default = "defaults::diameter_m")]
    pub diameter_m:      f64,
    #[serde(default = "defaults::density_kg_m3")]
    pub density_kg_m3:   f64,
    #[serde(default = "defaults::material_type")]
    pub material_type:   String,
    #[serde(default = "defaults::entry_speed_m_s")]
    pub entry_speed_m_s: f64,
    #[serde(default = "defaults::entry_angle_deg")]
    pub entry_angle_deg: f64,
    #[serde(default = "defaults::azimuth_deg")]
    pub azimuth_deg:     f64,
    #[serde(default = "defaults::aim_point")]
    pub aim_point:       AimPoint,
    #[serde(flatten)]
    pub extra:           serde_json::Map<String, serde_json::Value>,
}

mod defaults {
    use super::AimPoint;

    pub fn diameter_m() -> f64 { 100.0 }
    pub fn density_kg_m3() -> f64 { 3000.0 }
    pub fn material_type() -> String { "crystalline rock".into() }
    pub fn entry_speed_m_s() -> f64 { 20_000.0 }
    pub fn entry_angle_deg() -> f64 { 45.0 }
    pub fn azimuth_deg() -> f64 { 90.0 }
    pub fn aim_point() -> AimPoint { AimPoint { lat: 0.0, lon: 0.0 } }
}

impl Default for SimulationRequest {
    fn default() -> Self {
        Self {
            diameter_m:      defaults::diameter_m(),
            density_kg_m3:   defaults::density_kg_m3(),
            material_type:   defaults::material_type(),
            entry_speed_m_s: defaults::entry_speed_m_s(),
            entry_angle_deg: defaults::entry_angle_deg(),
            azimuth_deg:     defaults::azimuth_deg(),
            aim_point:       defaults::aim_point(),
            extra:           serde_json::Map::new(),
        }
    }
}

impl SimulationRequest {
    /// Fill defaults from a loose `inputs` object.
    pub fn from_inputs(inputs: &serde_json::Value) -> VizResult<Self> {
        if !inputs.is_object() {
            return Err(VizError::InvalidArgument("inputs must be an object".into()));
        }
        Ok(serde_json::from_value::<Self>(inputs.clone())?.normalized())
    }

    /// Round every numeric field to the precision the service keys on,
    /// so equal scenarios produce byte-identical request bodies.
    pub fn normalized(&self) -> Self {
        Self {
            diameter_m:      round_to(self.diameter_m, 3),
            density_kg_m3:   round_to(self.density_kg_m3, 1),
            material_type:   self.material_type.clone(),
            entry_speed_m_s: round_to(self.entry_speed_m_s, 3),
            entry_angle_deg: round_to(self.entry_angle_deg, 3),
            azimuth_deg:     round_to(self.azimuth_deg, 3),
            aim_point:       AimPoint {
                lat: round_to(self.aim_point.lat, 5),
                lon: round_to(self.aim_point.lon, 5),
            },
            extra:           self.extra.clone(),
        }
    }

    pub fn to_body(&self) -> VizResult<serde_json::Value> {
        Ok(serde_json::json!({ "inputs": serde_json::to_value(self.normalized())? }))
    }
}

fn round_to(x: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (x * f).round() / f
}

// ── Resolution ─────────────────────────────────────────────────────

/// Anything that can produce a raw simulation document: the HTTP
/// service in production, a file or canned value in tooling and tests.
pub trait SimulationSource {
    fn fetch(&mut self, request: &SimulationRequest) -> anyhow::Result<serde_json::Value>;
}

/// A source with no service behind it; every fetch fails, so the
/// bundled example is always used.
pub struct OfflineSource;

impl SimulationSource for OfflineSource {
    fn fetch(&mut self, _request: &SimulationRequest) -> anyhow::Result<serde_json::Value> {
        Err(anyhow::anyhow!("no simulation service configured"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Live,
    Fallback,
}

/// A value tagged with where it came from, so the UI can tell live
/// data from the bundled sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value:  T,
    pub origin: DataOrigin,
}

/// Try the source once; on any failure use the bundled example.
/// Only errors if the bundled example itself is unusable.
pub fn resolve_simulation(
    source:  &mut dyn SimulationSource,
    request: &SimulationRequest,
) -> VizResult<Resolved<SimulationResult>> {
    let live = source
        .fetch(request)
        .map_err(VizError::from)
        .and_then(|doc| SimulationResult::from_document(&doc));

    match live {
        Ok(value) => {
            log::debug!("simulation '{}' resolved live ({} rings)", value.id, value.rings.len());
            Ok(Resolved { value, origin: DataOrigin::Live })
        }
        Err(e) => {
            log::warn!("simulation fetch failed, using bundled example: {e}");
            Ok(Resolved {
                value:  SimulationResult::bundled_example()?,
                origin: DataOrigin::Fallback,
            })
        }
    }
}
