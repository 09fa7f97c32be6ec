use eframe::egui;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::AnnotateError;

// ── Colors ──────────────────────────────────────────────────────────────────

/// An opaque RGB color, serialized as `#rrggbb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const BLUE: HexColor = HexColor::rgb(0x00, 0x00, 0xff);
    pub const GREEN: HexColor = HexColor::rgb(0x00, 0xff, 0x00);
    pub const MAGENTA: HexColor = HexColor::rgb(0xff, 0x00, 0xff);
    pub const ORIGIN_RED: HexColor = HexColor::rgb(0xff, 0x26, 0x26);
    pub const RED: HexColor = HexColor::rgb(0xff, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_egui(self) -> egui::Color32 {
        egui::Color32::from_rgb(self.r, self.g, self.b)
    }

    /// Parse `#rrggbb` or the short `#rgb` form.
    pub fn parse(s: &str) -> Result<Self, AnnotateError> {
        let invalid = || AnnotateError::InvalidInput(format!("not a hex color: {s:?}"));
        let digits = s.strip_prefix('#').ok_or_else(invalid)?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |hex: &str| u8::from_str_radix(hex, 16).map_err(|_| invalid());
        match digits.len() {
            6 => Ok(Self::rgb(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                let short = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
                Ok(Self::rgb(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }

    /// Distinct color for the `index`-th legend of an image.
    pub fn for_legend(index: usize) -> Self {
        // golden-angle hue stepping keeps consecutive legends far apart
        let hue = (index as f32 * 137.508) % 360.0;
        let (r, g, b) = hsv_to_rgb(hue, 0.75, 0.9);
        Self::rgb(
            (r * 255.0).round() as u8,
            (g * 255.0).round() as u8,
            (b * 255.0).round() as u8,
        )
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<HexColor> for String {
    fn from(c: HexColor) -> Self {
        c.to_string()
    }
}

impl TryFrom<String> for HexColor {
    type Error = AnnotateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        HexColor::parse(&s)
    }
}

/// Convert HSV (hue in degrees, saturation and value in 0..=1) to RGB in 0..=1.
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (r + m, g + m, b + m)
}

// ── Points & Legends ────────────────────────────────────────────────────────

/// Which Y axis a point or legend is measured against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    Left,
    Right,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::Left => "left",
            Axis::Right => "right",
        }
    }
}

/// Semantic role of a click.
#[derive(Clone, Debug, PartialEq)]
pub enum PointKind {
    Origin,
    /// X axis tick; the value stays empty until the ticks are relabelled.
    XTick(String),
    YMin(f64),
    YMax(f64),
    /// A data point belonging to the legend with this label.
    Legend(String),
}

impl PointKind {
    /// The label string the chart service understands, e.g. `X=2019` or `Ymax=5`.
    pub fn label(&self) -> String {
        match self {
            PointKind::Origin => "Origin".to_string(),
            PointKind::XTick(value) => format!("X={value}"),
            PointKind::YMin(v) => format!("Ymin={v}"),
            PointKind::YMax(v) => format!("Ymax={v}"),
            PointKind::Legend(label) => label.clone(),
        }
    }

    /// Color used when the click does not carry its own.
    pub fn default_color(&self) -> Option<HexColor> {
        match self {
            PointKind::Origin => Some(HexColor::ORIGIN_RED),
            PointKind::XTick(_) => Some(HexColor::BLUE),
            PointKind::YMin(_) => Some(HexColor::MAGENTA),
            PointKind::YMax(_) => Some(HexColor::GREEN),
            PointKind::Legend(_) => None,
        }
    }

    pub fn is_x_tick(&self) -> bool {
        matches!(self, PointKind::XTick(_))
    }
}

/// One recorded click, in image pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(into = "WirePoint")]
pub struct ClickPoint {
    pub x: f32,
    pub y: f32,
    pub kind: PointKind,
    pub color: HexColor,
    pub axis: Axis,
}

impl ClickPoint {
    pub fn label(&self) -> String {
        self.kind.label()
    }
}

#[derive(Serialize)]
struct WirePoint {
    x: f32,
    y: f32,
    label: String,
    color: HexColor,
    axis: Axis,
}

impl From<ClickPoint> for WirePoint {
    fn from(p: ClickPoint) -> Self {
        Self {
            label: p.kind.label(),
            x: p.x,
            y: p.y,
            color: p.color,
            axis: p.axis,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegendDef {
    pub label: String,
    pub color: HexColor,
    pub axis: Axis,
}

// ── Per-image state ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationRecord {
    pub operations: Vec<ClickPoint>,
    pub legends: Vec<LegendDef>,
    /// Free-text (normally JSON) pre-annotation, edited by the user and exported.
    pub pre_annotate_data: String,
    /// Axis tick labels suggested by the chart service.
    pub axis_labels: Vec<String>,
}

impl AnnotationRecord {
    pub fn legend(&self, label: &str) -> Option<&LegendDef> {
        self.legends.iter().find(|l| l.label == label)
    }

    pub fn x_tick_count(&self) -> usize {
        self.operations.iter().filter(|p| p.kind.is_x_tick()).count()
    }
}

/// Payload for the service's `process-data` endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessDataRequest {
    pub operations: Vec<ClickPoint>,
    pub legends: Vec<LegendDef>,
}

impl From<&AnnotationRecord> for ProcessDataRequest {
    fn from(record: &AnnotationRecord) -> Self {
        Self {
            operations: record.operations.clone(),
            legends: record.legends.clone(),
        }
    }
}

pub struct ImageEntry {
    pub file_name: String,
    pub path: PathBuf,
    pub image: image::DynamicImage,
}

impl ImageEntry {
    pub fn size(&self) -> (f32, f32) {
        (self.image.width() as f32, self.image.height() as f32)
    }
}
