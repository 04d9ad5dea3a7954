//! Overlay builder: turns a simulation result into an ordered list of
//! georeferenced primitives.
//!
//! EMISSION ORDER (fixed; SceneSync diffs by id and ids follow order):
//!   1. impact center marker + label
//!   2. transient crater circle + label, final crater circle + label
//!   3. per ring, most severe first: circle + label
//!
//! Crater labels sit due north of the center. Ring labels sit on a
//! fixed 45° diagonal so they fan out and never overlap the craters.

use crate::{
    error::{VizError, VizResult},
    geo::{destination_point, GeoPoint},
    scale::ModelPose,
    simulation::SimulationResult,
    types::{PrimitiveId, EARTH_RADIUS_M},
};
use serde::{Deserialize, Serialize};

pub const RING_LABEL_BEARING_DEG: f64 = 45.0;
pub const CRATER_LABEL_BEARING_DEG: f64 = 0.0;

// ── Color ──────────────────────────────────────────────────────────

/// RGBA color, serialized as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE:   Color = Color::rgb(255, 255, 255);
    pub const BLACK:   Color = Color::rgb(0, 0, 0);
    pub const YELLOW:  Color = Color::rgb(255, 255, 0);
    pub const RED:     Color = Color::rgb(255, 0, 0);
    pub const NEUTRAL: Color = Color::rgb(158, 158, 158);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub fn from_hex(hex: &str) -> VizResult<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let well_formed = matches!(digits.len(), 6 | 8) && digits.bytes().all(|b| b.is_ascii_hexdigit());
        if !well_formed {
            return Err(VizError::InvalidArgument(format!("bad color '{hex}'")));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| VizError::InvalidArgument(format!("bad color '{hex}'")))
        };
        let a = if digits.len() == 8 { byte(6)? } else { 255 };
        Ok(Self { r: byte(0)?, g: byte(2)?, b: byte(4)?, a })
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = VizError;
    fn try_from(s: String) -> VizResult<Self> {
        Self::from_hex(&s)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

/// Ring colors, most severe first.
pub fn default_palette() -> Vec<Color> {
    vec![
        Color::rgb(0x7f, 0x00, 0x00),
        Color::rgb(0xb3, 0x00, 0x00),
        Color::rgb(0xe3, 0x4a, 0x33),
        Color::rgb(0xfc, 0x8d, 0x59),
        Color::rgb(0xfd, 0xbb, 0x84),
        Color::rgb(0xfd, 0xd4, 0x9e),
    ]
}

// ── Primitives ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkerStyle {
    pub color:      Color,
    pub pixel_size: f64,
    /// 3D model drawn at the marker, if any.
    #[serde(default)]
    pub model:      Option<ModelPose>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircleStyle {
    pub fill:          Color,
    pub outline:       Color,
    pub outline_width: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelStyle {
    pub fill:         Color,
    pub outline:      Color,
    pub font:         String,
    /// Screen-space offset (x, y) in pixels.
    pub pixel_offset: (f64, f64),
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            fill:         Color::WHITE,
            outline:      Color::BLACK,
            font:         "14pt sans-serif".into(),
            pixel_offset: (0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolylineStyle {
    pub color:         Color,
    pub outline:       Color,
    pub width:         f64,
    pub outline_width: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayPrimitive {
    PointMarker {
        id:     PrimitiveId,
        anchor: GeoPoint,
        style:  MarkerStyle,
    },
    Circle {
        id:       PrimitiveId,
        anchor:   GeoPoint,
        radius_m: f64,
        style:    CircleStyle,
    },
    Label {
        id:     PrimitiveId,
        anchor: GeoPoint,
        text:   String,
        style:  LabelStyle,
    },
    Polyline {
        id:     PrimitiveId,
        anchor: GeoPoint,
        points: Vec<GeoPoint>,
        style:  PolylineStyle,
    },
}

impl OverlayPrimitive {
    pub fn id(&self) -> &str {
        match self {
            Self::PointMarker { id, .. }
            | Self::Circle { id, .. }
            | Self::Label { id, .. }
            | Self::Polyline { id, .. } => id,
        }
    }

    pub fn anchor(&self) -> GeoPoint {
        match self {
            Self::PointMarker { anchor, .. }
            | Self::Circle { anchor, .. }
            | Self::Label { anchor, .. }
            | Self::Polyline { anchor, .. } => *anchor,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PointMarker { .. } => "point_marker",
            Self::Circle { .. }      => "circle",
            Self::Label { .. }       => "label",
            Self::Polyline { .. }    => "polyline",
        }
    }
}

// ── Builder ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OverlayBuilder {
    palette:  Vec<Color>,
    fallback: Color,
}

impl Default for OverlayBuilder {
    fn default() -> Self {
        Self::new(default_palette(), Color::NEUTRAL)
    }
}

impl OverlayBuilder {
    pub fn new(palette: Vec<Color>, fallback: Color) -> Self {
        Self { palette, fallback }
    }

    /// Severity color for ring `index`. Rings past the palette reuse the
    /// neutral fallback; overflow is never an error.
    pub fn ring_color(&self, index: usize) -> Color {
        self.palette.get(index).copied().unwrap_or(self.fallback)
    }

    pub fn build(&self, result: &SimulationResult) -> VizResult<Vec<OverlayPrimitive>> {
        let center = result.center;
        let mut out = Vec::with_capacity(6 + 2 * result.rings.len());

        out.push(OverlayPrimitive::PointMarker {
            id:     "impact-center".into(),
            anchor: center,
            style:  MarkerStyle { color: Color::RED, pixel_size: 10.0, model: None },
        });
        out.push(OverlayPrimitive::Label {
            id:     "impact-center-label".into(),
            anchor: center,
            text:   "Impact Center".into(),
            style:  LabelStyle { pixel_offset: (0.0, -20.0), ..LabelStyle::default() },
        });

        for (role, title, diameter_m, outline) in [
            ("crater-transient", "Transient crater", result.transient_crater_diameter_m, Color::YELLOW),
            ("crater-final", "Final crater", result.final_crater_diameter_m, Color::rgb(0x8b, 0x45, 0x13)),
        ] {
            let radius_m = diameter_m / 2.0;
            out.push(OverlayPrimitive::Circle {
                id: role.into(),
                anchor: center,
                radius_m,
                style: CircleStyle {
                    fill:          outline.with_alpha(64),
                    outline,
                    outline_width: 2.0,
                },
            });
            out.push(OverlayPrimitive::Label {
                id:     format!("{role}-label"),
                anchor: destination_point(center, CRATER_LABEL_BEARING_DEG, radius_m, EARTH_RADIUS_M)?,
                text:   format!("{title}: {:.2} km", diameter_m / 1000.0),
                style:  LabelStyle::default(),
            });
        }

        for (i, ring) in result.rings.iter().enumerate() {
            let color = self.ring_color(i);
            out.push(OverlayPrimitive::Circle {
                id:       format!("ring-{i}"),
                anchor:   center,
                radius_m: ring.radius_m,
                style:    CircleStyle {
                    fill:          color.with_alpha(48),
                    outline:       color,
                    outline_width: 2.0,
                },
            });
            out.push(OverlayPrimitive::Label {
                id:     format!("ring-{i}-label"),
                anchor: destination_point(center, RING_LABEL_BEARING_DEG, ring.radius_m, EARTH_RADIUS_M)?,
                text:   ring_label_text(ring.threshold_kpa, ring.radius_m),
                style:  LabelStyle { fill: color, ..LabelStyle::default() },
            });
        }

        log::debug!(
            "overlay for '{}': {} primitives ({} rings)",
            result.id,
            out.len(),
            result.rings.len()
        );
        Ok(out)
    }
}

pub fn ring_label_text(threshold_kpa: f64, radius_m: f64) -> String {
    format!("{threshold_kpa} kPa ({:.1} km)", radius_m / 1000.0)
}

/// Primitives for a trajectory frame: the asteroid marker, its label,
/// and the path flown so far (only when it has at least two points).
pub fn build_trajectory_frame(
    position: GeoPoint,
    trail:    &[GeoPoint],
    pose:     &ModelPose,
) -> Vec<OverlayPrimitive> {
    let mut out = vec![
        OverlayPrimitive::PointMarker {
            id:     "asteroid".into(),
            anchor: position,
            style:  MarkerStyle {
                color:      Color::WHITE,
                pixel_size: f64::from(pose.minimum_pixel_size),
                model:      Some(pose.clone()),
            },
        },
        OverlayPrimitive::Label {
            id:     "asteroid-label".into(),
            anchor: position,
            text:   pose.label.clone(),
            style:  LabelStyle { pixel_offset: (0.0, -20.0), ..LabelStyle::default() },
        },
    ];
    if trail.len() >= 2 {
        out.push(OverlayPrimitive::Polyline {
            id:     "asteroid-path".into(),
            anchor: trail[0],
            points: trail.to_vec(),
            style:  PolylineStyle {
                color:         Color::YELLOW,
                outline:       Color::RED,
                width:         3.0,
                outline_width: 2.0,
            },
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_round_trip() {
        let c = Color::from_hex("#fc8d59").unwrap();
        assert_eq!(c, Color::rgb(0xfc, 0x8d, 0x59));
        assert_eq!(c.to_hex(), "#fc8d59");
        assert_eq!(Color::from_hex("7f000080").unwrap().a, 0x80);
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn hex_colors_reject_signs_and_spaces() {
        assert!(Color::from_hex("#+f+f+f").is_err());
        assert!(Color::from_hex("-1-1-1").is_err());
        assert!(Color::from_hex("# ffff ").is_err());
        assert!(Color::from_hex("#FC8D59").is_ok());
    }

    #[test]
    fn ring_label_uses_one_decimal_km() {
        assert_eq!(ring_label_text(50.0, 5000.0), "50 kPa (5.0 km)");
        assert_eq!(ring_label_text(3.5, 21_049.0), "3.5 kPa (21.0 km)");
    }
}
