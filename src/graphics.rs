use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::surface::Surface;
use crate::units::Length;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// Four corners of a (possibly rotated) box, clockwise from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quad {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

impl Quad {
    pub fn bounds(&self) -> BBox {
        let xs = [self.p0.x, self.p1.x, self.p2.x, self.p3.x];
        let ys = [self.p0.y, self.p1.y, self.p2.y, self.p3.y];
        BBox {
            left: xs.iter().copied().fold(f32::INFINITY, f32::min),
            top: ys.iter().copied().fold(f32::INFINITY, f32::min),
            right: xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            bottom: ys.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XAnchor {
    Left,
    Center,
    Right,
    #[serde(untagged)]
    Fraction(f32),
}

impl XAnchor {
    /// Horizontal distance from the box origin to the caret.
    pub fn offset(self, width: f32) -> f32 {
        match self {
            Self::Fraction(fraction) => fraction * width,
            Self::Left => 0.0,
            Self::Center => 0.5 * width,
            Self::Right => width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YAnchor {
    Top,
    Center,
    Bottom,
    Baseline,
    #[serde(untagged)]
    Fraction(f32),
}

impl FromStr for XAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            other => other
                .parse::<f32>()
                .map(Self::Fraction)
                .map_err(|_| format!("invalid x anchor: {other}")),
        }
    }
}

impl FromStr for YAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "top" => Ok(Self::Top),
            "center" => Ok(Self::Center),
            "bottom" => Ok(Self::Bottom),
            "baseline" => Ok(Self::Baseline),
            other => other
                .parse::<f32>()
                .map(Self::Fraction)
                .map_err(|_| format!("invalid y anchor: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBaseline {
    Top,
    Middle,
    Bottom,
    #[default]
    Alphabetic,
    Hanging,
    Ideographic,
}

impl TextAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

impl TextBaseline {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Middle => "middle",
            Self::Bottom => "bottom",
            Self::Alphabetic => "alphabetic",
            Self::Hanging => "hanging",
            Self::Ideographic => "ideographic",
        }
    }
}

impl FromStr for TextAlign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            other => Err(format!("invalid text align: {other}")),
        }
    }
}

impl FromStr for TextBaseline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "top" => Ok(Self::Top),
            "middle" => Ok(Self::Middle),
            "bottom" => Ok(Self::Bottom),
            "alphabetic" => Ok(Self::Alphabetic),
            "hanging" => Ok(Self::Hanging),
            "ideographic" => Ok(Self::Ideographic),
            other => Err(format!("invalid text baseline: {other}")),
        }
    }
}

impl fmt::Display for TextAlign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TextBaseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TextAlign> for XAnchor {
    fn from(align: TextAlign) -> Self {
        match align {
            TextAlign::Left => Self::Left,
            TextAlign::Center => Self::Center,
            TextAlign::Right => Self::Right,
        }
    }
}

impl From<TextBaseline> for YAnchor {
    fn from(baseline: TextBaseline) -> Self {
        match baseline {
            TextBaseline::Top => Self::Top,
            TextBaseline::Middle => Self::Center,
            TextBaseline::Bottom => Self::Bottom,
            _ => Self::Baseline,
        }
    }
}

/// Caret position in screen space with optional anchor overrides.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub sx: f32,
    pub sy: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_anchor: Option<XAnchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_anchor: Option<YAnchor>,
}

impl Position {
    pub fn new(sx: f32, sy: f32) -> Self {
        Self {
            sx,
            sy,
            x_anchor: None,
            y_anchor: None,
        }
    }

    pub fn with_anchors(mut self, x_anchor: Option<XAnchor>, y_anchor: Option<YAnchor>) -> Self {
        self.x_anchor = x_anchor;
        self.y_anchor = y_anchor;
        self
    }
}

/// Snapshot of the text visuals a box is painted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextVisuals {
    pub color: String,
    pub alpha: f32,
    pub font_style: String,
    pub font_size: String,
    pub font_size_scale: f32,
    pub base_font_size: Option<f32>,
    pub font_family: String,
    pub align: TextAlign,
    pub baseline: TextBaseline,
}

impl Default for TextVisuals {
    fn default() -> Self {
        Self {
            color: "#444444".to_string(),
            alpha: 1.0,
            font_style: "normal".to_string(),
            font_size: "13px".to_string(),
            font_size_scale: 1.0,
            base_font_size: None,
            font_family: "helvetica".to_string(),
            align: TextAlign::Left,
            baseline: TextBaseline::Bottom,
        }
    }
}

/// Normalises a CSS color and opacity into `#rrggbb` or `rgba(...)`.
/// Colors that do not parse are returned as given.
pub fn color_to_css(color: &str, alpha: f32) -> String {
    let Ok(parsed) = svgtypes::Color::from_str(color.trim()) else {
        return color.to_string();
    };
    let alpha = (parsed.alpha as f32 / 255.0) * alpha.clamp(0.0, 1.0);
    if alpha >= 1.0 {
        format!("#{:02x}{:02x}{:02x}", parsed.red, parsed.green, parsed.blue)
    } else {
        format!(
            "rgba({}, {}, {}, {})",
            parsed.red,
            parsed.green,
            parsed.blue,
            (alpha * 1000.0).round() / 1000.0
        )
    }
}

pub fn color_to_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let parsed = svgtypes::Color::from_str(color.trim()).ok()?;
    Some((parsed.red, parsed.green, parsed.blue))
}

/// Contract shared by anything that can be measured, placed and painted.
pub trait GraphicsBox {
    fn position(&self) -> Position;
    fn set_position(&mut self, position: Position);
    /// Rotation in radians about the caret.
    fn angle(&self) -> f32;
    fn set_angle(&mut self, angle: f32);
    fn set_visuals(&mut self, visuals: &TextVisuals);

    fn size(&self) -> Size;
    /// Top-left drawing origin after anchor resolution, before rotation.
    fn computed_position(&self) -> Point;
    fn paint(&self, surface: &mut dyn Surface);

    fn rect(&self) -> Quad {
        rotated_rect(
            self.computed_position(),
            self.size(),
            self.position(),
            self.angle(),
        )
    }

    fn bbox(&self) -> BBox {
        self.rect().bounds()
    }
}

/// Corners of the `size` box at `origin`, rotated by `angle` about the caret.
pub fn rotated_rect(origin: Point, size: Size, caret: Position, angle: f32) -> Quad {
    let Size { width, height } = size;
    let Point { x, y } = origin;
    let Position { sx, sy, .. } = caret;
    let (sin, cos) = angle.sin_cos();
    let rotate = |px: f32, py: f32| {
        let dx = px - sx;
        let dy = py - sy;
        Point {
            x: sx + dx * cos - dy * sin,
            y: sy + dx * sin + dy * cos,
        }
    };
    Quad {
        p0: rotate(x, y),
        p1: rotate(x + width, y),
        p2: rotate(x + width, y + height),
        p3: rotate(x, y + height),
    }
}

/// Optional per-axis size constraints. A percentage scales the measured
/// dimension (`50%` halves it); other units leave it unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SizeConstraint {
    pub width: Option<Length>,
    pub height: Option<Length>,
}

impl SizeConstraint {
    pub fn apply(&self, size: Size) -> Size {
        let sx = self.width.as_ref().map(Length::scale_factor).unwrap_or(1.0);
        let sy = self.height.as_ref().map(Length::scale_factor).unwrap_or(1.0);
        Size {
            width: size.width * sx,
            height: size.height * sy,
        }
    }
}
