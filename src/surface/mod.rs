use std::ops::{Deref, DerefMut};

use crate::error::RenderError;
use crate::graphics::{Size, TextAlign, TextBaseline};
use crate::svg::VectorGraphic;
use crate::text_metrics::FontSpec;

#[cfg(feature = "png")]
mod raster;
mod svg;

#[cfg(feature = "png")]
pub use raster::PixmapSurface;
pub use svg::SvgSurface;

pub trait Surface {
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, dx: f32, dy: f32);
    /// Rotates the current transform by `angle` radians.
    fn rotate(&mut self, angle: f32);
    fn set_fill_style(&mut self, color: &str);
    fn set_font(&mut self, font: &str);
    fn set_text_align(&mut self, align: TextAlign);
    fn set_text_baseline(&mut self, baseline: TextBaseline);
    /// Draws plain text. Never fails; problems are logged and the text skipped.
    fn fill_text(&mut self, text: &str, x: f32, y: f32);
    /// Composites `graphic` stretched to `size` at the current origin.
    fn draw_svg(&mut self, graphic: &VectorGraphic, size: Size) -> Result<(), RenderError>;
}

/// A guard for saving and restoring the surface state.
///
/// The state is saved when the guard is created and restored when it is
/// dropped, on every exit path.
pub struct SurfaceStateGuard<'a> {
    surface: &'a mut dyn Surface,
}

impl<'a> SurfaceStateGuard<'a> {
    pub fn new(surface: &'a mut dyn Surface) -> Self {
        surface.save();
        Self { surface }
    }
}

impl<'a> Deref for SurfaceStateGuard<'a> {
    type Target = dyn Surface + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.surface
    }
}

impl DerefMut for SurfaceStateGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.surface
    }
}

impl Drop for SurfaceStateGuard<'_> {
    fn drop(&mut self) {
        self.surface.restore();
    }
}

/// 2-D affine transform `[a c e; b d f]`, composed canvas-style (new
/// operations apply in the local frame).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            e: self.a * dx + self.c * dy + self.e,
            f: self.b * dx + self.d * dy + self.f,
            ..self
        }
    }

    pub fn rotate(self, angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            a: self.a * cos + self.c * sin,
            b: self.b * cos + self.d * sin,
            c: -self.a * sin + self.c * cos,
            d: -self.b * sin + self.d * cos,
            ..self
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn to_svg_attr(&self) -> String {
        format!(
            "matrix({:.4} {:.4} {:.4} {:.4} {:.3} {:.3})",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

/// One entry of a surface's save/restore stack.
#[derive(Debug, Clone)]
pub(crate) struct DrawState {
    pub transform: Transform,
    pub fill_style: String,
    pub font: String,
    pub text_align: TextAlign,
    pub text_baseline: TextBaseline,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            fill_style: "#000000".to_string(),
            font: "10px sans-serif".to_string(),
            text_align: TextAlign::Left,
            text_baseline: TextBaseline::Alphabetic,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StateStack {
    current: DrawState,
    saved: Vec<DrawState>,
}

impl StateStack {
    pub fn current(&self) -> &DrawState {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut DrawState {
        &mut self.current
    }

    pub fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    pub fn restore(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.current = state;
        } else {
            log::warn!("surface restore without matching save");
        }
    }
}

/// `<text>` element for `text` drawn with `state` at `(x, y)`.
pub(crate) fn text_element(state: &DrawState, text: &str, x: f32, y: f32) -> String {
    let spec = FontSpec::parse(&state.font);
    let anchor = match state.text_align {
        TextAlign::Left => "start",
        TextAlign::Center => "middle",
        TextAlign::Right => "end",
    };
    let baseline = match state.text_baseline {
        TextBaseline::Top => "text-before-edge",
        TextBaseline::Middle => "central",
        TextBaseline::Bottom => "text-after-edge",
        TextBaseline::Alphabetic => "alphabetic",
        TextBaseline::Hanging => "hanging",
        TextBaseline::Ideographic => "ideographic",
    };
    let transform = if state.transform.is_identity() {
        String::new()
    } else {
        format!(" transform=\"{}\"", state.transform.to_svg_attr())
    };
    format!(
        "<text x=\"{x:.2}\" y=\"{y:.2}\"{transform} font-family=\"{}\" font-size=\"{}\" font-style=\"{}\" font-weight=\"{}\" fill=\"{}\" text-anchor=\"{anchor}\" dominant-baseline=\"{baseline}\">{}</text>",
        escape_xml(&spec.family),
        spec.size_px,
        spec.style,
        if spec.bold { "bold" } else { "normal" },
        escape_xml(&state.fill_style),
        escape_xml(text)
    )
}

pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
