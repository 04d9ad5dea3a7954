//! Trajectory loading: untrusted time-tagged positions in, a validated
//! canonical `Trajectory` out.
//!
//! Accepted inputs (all CZML-flavoured, offsets in seconds from epoch):
//!   - a flat array `[t, lon, lat, alt, t, lon, lat, alt, ...]`
//!   - an array of `[t, lon, lat, alt]` tuples
//!   - a position object `{ epoch, cartographicDegrees, interpolationAlgorithm? }`
//!   - an envelope `{ epoch?, interval: "start/stop", positions: [...] }`
//!   - a CZML packet array (document packet + one packet with a position)
//!
//! Nothing here touches the rendering engine.

use crate::{
    error::{VizError, VizResult},
    geo::{normalize_lon, GeoPoint},
    scale::ModelPose,
    types::OffsetSeconds,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Samples in the Lagrange window (degree = window - 1).
pub const LAGRANGE_WINDOW: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub offset_s: OffsetSeconds,
    pub position: GeoPoint,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Interpolation {
    #[default]
    Linear,
    Lagrange,
}

/// What the source document asked the clock to do at the end of its
/// interval. Recorded, never acted on by default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClockRange {
    Clamped,
    LoopStop,
    Unbounded,
}

/// Only constructible through `Trajectory::new` (or the parsers built on
/// it), so every value upholds the sample invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    epoch:         DateTime<Utc>,
    /// Offsets strictly increasing, all >= 0. Never empty.
    samples:       Vec<Sample>,
    interpolation: Interpolation,
    clock_range:   Option<ClockRange>,
}

impl Trajectory {
    pub fn new(
        epoch:         DateTime<Utc>,
        samples:       Vec<Sample>,
        interpolation: Interpolation,
    ) -> VizResult<Self> {
        validate_samples(&samples)?;
        Ok(Self { epoch, samples, interpolation, clock_range: None })
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn clock_range(&self) -> Option<ClockRange> {
        self.clock_range
    }

    pub fn with_clock_range(mut self, clock_range: Option<ClockRange>) -> Self {
        self.clock_range = clock_range;
        self
    }

    pub fn max_offset(&self) -> OffsetSeconds {
        self.samples.last().map(|s| s.offset_s).unwrap_or(0.0)
    }

    /// A single sample is a static pose: nothing to animate.
    pub fn is_static(&self) -> bool {
        self.samples.len() < 2
    }

    /// Wall-clock time at `offset_s`. Offsets beyond chrono's range clamp
    /// to its bounds; NaN maps to the epoch.
    pub fn time_at(&self, offset_s: OffsetSeconds) -> DateTime<Utc> {
        if offset_s.is_nan() {
            return self.epoch;
        }
        let delta = Duration::try_seconds(offset_s.trunc() as i64).and_then(|whole| {
            whole.checked_add(&Duration::nanoseconds((offset_s.fract() * 1e9).round() as i64))
        });
        match delta.and_then(|d| self.epoch.checked_add_signed(d)) {
            Some(t) => t,
            None => {
                log::warn!("offset {offset_s}s is outside the representable time range, clamped");
                if offset_s < 0.0 { DateTime::<Utc>::MIN_UTC } else { DateTime::<Utc>::MAX_UTC }
            }
        }
    }

    /// Interpolated position at `offset_s`, clamped to the sampled range.
    /// Pure: the same offset always yields the same point.
    pub fn position_at(&self, offset_s: OffsetSeconds) -> GeoPoint {
        let first = self.samples[0];
        let last = self.samples[self.samples.len() - 1];
        if self.samples.len() == 1 || !offset_s.is_finite() || offset_s <= first.offset_s {
            return first.position;
        }
        if offset_s >= last.offset_s {
            return last.position;
        }

        // Index of the first sample strictly after offset_s; >= 1 here.
        let upper = self.samples.partition_point(|s| s.offset_s <= offset_s);
        match self.interpolation {
            Interpolation::Linear => lerp(&self.samples[upper - 1], &self.samples[upper], offset_s),
            Interpolation::Lagrange => {
                let window = LAGRANGE_WINDOW.min(self.samples.len());
                let start = upper
                    .saturating_sub(window / 2)
                    .min(self.samples.len() - window);
                lagrange(&self.samples[start..start + window], offset_s)
            }
        }
    }

    /// Sample positions up to and including `offset_s`, followed by the
    /// interpolated point itself. Used for the trailing path.
    pub fn trail_until(&self, offset_s: OffsetSeconds) -> Vec<GeoPoint> {
        let mut out: Vec<GeoPoint> = self
            .samples
            .iter()
            .take_while(|s| s.offset_s <= offset_s)
            .map(|s| s.position)
            .collect();
        let here = self.position_at(offset_s);
        if out.last() != Some(&here) {
            out.push(here);
        }
        out
    }
}

fn lerp(a: &Sample, b: &Sample, offset_s: f64) -> GeoPoint {
    let t = (offset_s - a.offset_s) / (b.offset_s - a.offset_s);
    let d_lon = wrap_delta(b.position.lon - a.position.lon);
    GeoPoint::with_alt(
        a.position.lat + (b.position.lat - a.position.lat) * t,
        a.position.lon + d_lon * t,
        a.position.alt + (b.position.alt - a.position.alt) * t,
    )
}

fn lagrange(window: &[Sample], offset_s: f64) -> GeoPoint {
    // Unwrap longitudes so the polynomial never sees the antimeridian jump.
    let mut lons = Vec::with_capacity(window.len());
    for (i, s) in window.iter().enumerate() {
        let lon = if i == 0 {
            s.position.lon
        } else {
            lons[i - 1] + wrap_delta(s.position.lon - window[i - 1].position.lon)
        };
        lons.push(lon);
    }

    let (mut lat, mut lon, mut alt) = (0.0, 0.0, 0.0);
    for (j, sj) in window.iter().enumerate() {
        let mut basis = 1.0;
        for (m, sm) in window.iter().enumerate() {
            if m != j {
                basis *= (offset_s - sm.offset_s) / (sj.offset_s - sm.offset_s);
            }
        }
        lat += basis * sj.position.lat;
        lon += basis * lons[j];
        alt += basis * sj.position.alt;
    }
    GeoPoint::with_alt(lat, lon, alt)
}

/// Shortest signed longitude difference, in (-180, 180].
fn wrap_delta(d: f64) -> f64 {
    normalize_lon(d)
}

fn validate_samples(samples: &[Sample]) -> VizResult<()> {
    let first = samples
        .first()
        .ok_or_else(|| VizError::MalformedTrajectory("no samples".into()))?;
    if !(first.offset_s.is_finite() && first.offset_s >= 0.0) {
        return Err(VizError::MalformedTrajectory(format!(
            "first offset must be >= 0, got {}",
            first.offset_s
        )));
    }
    for (i, pair) in samples.windows(2).enumerate() {
        if !(pair[1].offset_s.is_finite() && pair[1].offset_s > pair[0].offset_s) {
            return Err(VizError::MalformedTrajectory(format!(
                "offsets not strictly increasing at sample {}: {} after {}",
                i + 1,
                pair[1].offset_s,
                pair[0].offset_s
            )));
        }
    }
    Ok(())
}

// ── Construction ───────────────────────────────────────────────────

/// Build a trajectory from a flat `[t, lon, lat, alt, ...]` list.
/// Used for generated sample data; validation is the same as `parse`.
pub fn generate(
    flat:          &[f64],
    epoch:         DateTime<Utc>,
    interpolation: Interpolation,
) -> VizResult<Trajectory> {
    if flat.is_empty() || flat.len() % 4 != 0 {
        return Err(VizError::MalformedTrajectory(format!(
            "expected a non-empty multiple of 4 values, got {}",
            flat.len()
        )));
    }
    let samples = flat
        .chunks_exact(4)
        .enumerate()
        .map(|(i, c)| {
            GeoPoint::checked(c[2], c[1], c[3])
                .map(|position| Sample { offset_s: c[0], position })
                .map_err(|e| VizError::MalformedTrajectory(format!("sample {i}: {e}")))
        })
        .collect::<VizResult<Vec<_>>>()?;
    Trajectory::new(epoch, samples, interpolation)
}

/// Parse any accepted trajectory document. The only entry point for
/// imported files.
pub fn parse(raw: &Value) -> VizResult<Trajectory> {
    match raw {
        Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
            parse_czml_packets(items)
        }
        Value::Array(_) => generate(&flat_numbers(raw)?, DateTime::<Utc>::UNIX_EPOCH, Interpolation::Linear),
        Value::Object(obj) => {
            if obj.contains_key("cartographicDegrees") {
                parse_position(raw, None)
            } else if let Some(positions) = obj.get("positions") {
                parse_envelope(raw, positions)
            } else if let Some(position) = obj.get("position") {
                parse_position(position, None)
            } else {
                Err(VizError::MalformedTrajectory(
                    "object has no 'cartographicDegrees', 'positions' or 'position'".into(),
                ))
            }
        }
        other => Err(VizError::MalformedTrajectory(format!(
            "expected an array or object, got {}",
            json_kind(other)
        ))),
    }
}

pub fn parse_str(json: &str) -> VizResult<Trajectory> {
    let raw: Value = serde_json::from_str(json)
        .map_err(|e| VizError::MalformedTrajectory(e.to_string()))?;
    parse(&raw)
}

fn parse_czml_packets(packets: &[Value]) -> VizResult<Trajectory> {
    let document = packets.iter().find(|p| p["id"] == "document");
    let interval_start = document
        .and_then(|d| d["clock"]["interval"].as_str())
        .map(interval_start)
        .transpose()?;
    let clock_range = document
        .and_then(|d| d["clock"].get("range"))
        .map(|r| serde_json::from_value::<ClockRange>(r.clone()))
        .transpose()
        .map_err(|e| VizError::MalformedTrajectory(format!("clock.range: {e}")))?;

    let position = packets
        .iter()
        .map(|p| &p["position"])
        .find(|pos| pos.get("cartographicDegrees").is_some())
        .ok_or_else(|| {
            VizError::MalformedTrajectory("no packet with position.cartographicDegrees".into())
        })?;

    Ok(parse_position(position, interval_start)?.with_clock_range(clock_range))
}

fn parse_envelope(raw: &Value, positions: &Value) -> VizResult<Trajectory> {
    let fallback_epoch = raw["interval"].as_str().map(interval_start).transpose()?;
    let epoch = match raw.get("epoch") {
        Some(e) => parse_epoch(e)?,
        None => fallback_epoch.ok_or_else(|| {
            VizError::MalformedTrajectory("envelope needs 'epoch' or 'interval'".into())
        })?,
    };
    let interpolation = parse_interpolation(raw)?;
    Ok(generate(&flat_numbers(positions)?, epoch, interpolation)?
        .with_clock_range(parse_clock_range(raw)?))
}

fn parse_position(pos: &Value, fallback_epoch: Option<DateTime<Utc>>) -> VizResult<Trajectory> {
    let epoch = match pos.get("epoch") {
        Some(e) => parse_epoch(e)?,
        None => fallback_epoch.ok_or_else(|| {
            VizError::MalformedTrajectory("position has no 'epoch'".into())
        })?,
    };
    let interpolation = parse_interpolation(pos)?;
    Ok(generate(&flat_numbers(&pos["cartographicDegrees"])?, epoch, interpolation)?
        .with_clock_range(parse_clock_range(pos)?))
}

fn parse_interpolation(obj: &Value) -> VizResult<Interpolation> {
    match obj.get("interpolationAlgorithm") {
        None => Ok(Interpolation::Linear),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| VizError::MalformedTrajectory(format!("interpolationAlgorithm: {e}"))),
    }
}

fn parse_clock_range(obj: &Value) -> VizResult<Option<ClockRange>> {
    obj.get("clockRange")
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| VizError::MalformedTrajectory(format!("clockRange: {e}")))
}

fn parse_epoch(v: &Value) -> VizResult<DateTime<Utc>> {
    let s = v
        .as_str()
        .ok_or_else(|| VizError::MalformedTrajectory("epoch must be an ISO-8601 string".into()))?;
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| VizError::MalformedTrajectory(format!("epoch '{s}': {e}")))
}

fn interval_start(interval: &str) -> VizResult<DateTime<Utc>> {
    let (start, _stop) = interval.split_once('/').ok_or_else(|| {
        VizError::MalformedTrajectory(format!("interval '{interval}' is not 'start/stop'"))
    })?;
    parse_epoch(&Value::String(start.to_string()))
}

/// Flatten `[t, lon, lat, alt, ...]` or `[[t, lon, lat, alt], ...]`.
fn flat_numbers(v: &Value) -> VizResult<Vec<f64>> {
    let items = v
        .as_array()
        .ok_or_else(|| VizError::MalformedTrajectory(format!("expected an array, got {}", json_kind(v))))?;
    let mut out = Vec::with_capacity(items.len() * 4);
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::Number(n) => out.push(number(n.as_f64(), i)?),
            Value::Array(tuple) if tuple.len() == 4 => {
                for x in tuple {
                    out.push(number(x.as_f64(), i)?);
                }
            }
            other => {
                return Err(VizError::MalformedTrajectory(format!(
                    "element {i}: expected a number or 4-tuple, got {}",
                    json_kind(other)
                )))
            }
        }
    }
    Ok(out)
}

fn number(x: Option<f64>, i: usize) -> VizResult<f64> {
    x.ok_or_else(|| VizError::MalformedTrajectory(format!("element {i} is not numeric")))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null      => "null",
        Value::Bool(_)   => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_)  => "array",
        Value::Object(_) => "object",
    }
}

// ── Serialization ──────────────────────────────────────────────────

fn iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn flat_samples(t: &Trajectory) -> Vec<f64> {
    t.samples
        .iter()
        .flat_map(|s| [s.offset_s, s.position.lon, s.position.lat, s.position.alt])
        .collect()
}

/// Canonical position-object form; `parse(&serialize(t)) == t`.
pub fn serialize(t: &Trajectory) -> Value {
    let mut v = json!({
        "epoch": iso(t.epoch),
        "interpolationAlgorithm": t.interpolation,
        "cartographicDegrees": flat_samples(t),
    });
    if let Some(range) = t.clock_range {
        v["clockRange"] = json!(range);
    }
    v
}

/// Export as a two-packet CZML document (clock + asteroid with model
/// and trailing path).
pub fn to_czml(t: &Trajectory, name: &str, multiplier: f64, pose: Option<&ModelPose>) -> Value {
    let interval = format!("{}/{}", iso(t.epoch), iso(t.time_at(t.max_offset())));
    let range = t.clock_range.unwrap_or(ClockRange::Clamped);
    let mut asteroid = json!({
        "id": "asteroid_sample",
        "name": name,
        "availability": interval,
        "position": {
            "epoch": iso(t.epoch),
            "interpolationAlgorithm": t.interpolation,
            "cartographicDegrees": flat_samples(t),
        },
        "path": {
            "material": {
                "polylineOutline": {
                    "color": { "rgba": [255, 255, 0, 255] },
                    "outlineColor": { "rgba": [255, 0, 0, 255] },
                    "outlineWidth": 2
                }
            },
            "width": 3,
            "leadTime": 0,
            "trailTime": t.max_offset(),
            "resolution": 5
        }
    });
    if let Some(pose) = pose {
        asteroid["model"] = json!({
            "gltf": pose.asset_path,
            "minimumPixelSize": pose.minimum_pixel_size,
            "maximumScale": pose.maximum_scale,
            "scale": pose.scale,
        });
    }
    json!([
        {
            "id": "document",
            "name": name,
            "version": "1.0",
            "clock": {
                "interval": interval,
                "currentTime": iso(t.epoch),
                "multiplier": multiplier,
                "range": range,
                "step": "SYSTEM_CLOCK_MULTIPLIER"
            }
        },
        asteroid
    ])
}
