use futures::future::BoxFuture;
use std::cell::Cell;

use crate::dialect::{AnyDialect, AsciiMath, Dialect, DialectKind, MathML, StyleContext, TeX};
use crate::error::RenderError;
use crate::graphics::{
    GraphicsBox, Point, Position, Quad, Size, SizeConstraint, TextAlign, TextBaseline,
    TextVisuals, XAnchor, YAnchor, color_to_css, rotated_rect,
};
use crate::provider::{ProviderStatus, TypesettingProvider};
use crate::surface::{Surface, SurfaceStateGuard};
use crate::svg::VectorGraphic;
use crate::text_metrics::{FontMetrics, FontSpec, approximate_font_metrics, font_metrics};
use crate::units::{Length, Unit, scale_font_size};

/// Width and height reported while no typeset graphic is available.
pub const PLACEHOLDER_SIZE: f32 = 13.0;

/// Where font metrics come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsMode {
    /// Resolve the face through the system font database.
    #[default]
    System,
    /// Size-proportional approximation, independent of installed fonts.
    Approximate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Measure {
    size: Size,
    valign: f32,
}

impl Measure {
    fn placeholder() -> Self {
        Self {
            size: Size {
                width: PLACEHOLDER_SIZE,
                height: PLACEHOLDER_SIZE,
            },
            valign: 0.0,
        }
    }
}

/// Resolved geometry of a box from a single conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    pub size: Size,
    pub origin: Point,
    pub valign: f32,
    pub rect: Quad,
}

/// Everything one size/paint pass derives from the current state.
struct Layout {
    graphic: Result<VectorGraphic, RenderError>,
    measure: Measure,
    metrics: FontMetrics,
    origin: Point,
}

pub struct MathBox<D: Dialect> {
    dialect: D,
    provider: TypesettingProvider,
    text: String,
    position: Position,
    angle: f32,
    constraint: SizeConstraint,
    font: String,
    color: String,
    em_px: f32,
    x_anchor: XAnchor,
    y_anchor: YAnchor,
    metrics_mode: MetricsMode,
    last_measure: Cell<Option<Measure>>,
}

pub type TeXBox = MathBox<TeX>;
pub type MathMLBox = MathBox<MathML>;
pub type AsciiMathBox = MathBox<AsciiMath>;

impl TeXBox {
    pub fn tex(text: impl Into<String>, provider: TypesettingProvider) -> Self {
        Self::new(TeX::default(), text, provider)
    }
}

impl MathMLBox {
    pub fn mathml(text: impl Into<String>, provider: TypesettingProvider) -> Self {
        Self::new(MathML, text, provider)
    }
}

impl AsciiMathBox {
    pub fn ascii(text: impl Into<String>, provider: TypesettingProvider) -> Self {
        Self::new(AsciiMath, text, provider)
    }
}

impl MathBox<AnyDialect> {
    pub fn of_kind(
        kind: DialectKind,
        text: impl Into<String>,
        provider: TypesettingProvider,
    ) -> Self {
        Self::new(AnyDialect::from(kind), text, provider)
    }
}

impl<D: Dialect> MathBox<D> {
    pub fn new(dialect: D, text: impl Into<String>, provider: TypesettingProvider) -> Self {
        let mut math_box = Self {
            dialect,
            provider,
            text: text.into(),
            position: Position::default(),
            angle: 0.0,
            constraint: SizeConstraint::default(),
            font: String::new(),
            color: String::new(),
            em_px: 16.0,
            x_anchor: XAnchor::Left,
            y_anchor: YAnchor::Baseline,
            metrics_mode: MetricsMode::default(),
            last_measure: Cell::new(None),
        };
        math_box.set_visuals(&TextVisuals::default());
        math_box
    }

    pub fn with_metrics_mode(mut self, mode: MetricsMode) -> Self {
        self.metrics_mode = mode;
        self.last_measure.set(None);
        self
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn dialect_mut(&mut self) -> &mut D {
        self.last_measure.set(None);
        &mut self.dialect
    }

    pub fn provider(&self) -> &TypesettingProvider {
        &self.provider
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.last_measure.set(None);
    }

    /// Resolved CSS font shorthand.
    pub fn font(&self) -> &str {
        &self.font
    }

    /// Resolved CSS color.
    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn default_anchors(&self) -> (XAnchor, YAnchor) {
        (self.x_anchor, self.y_anchor)
    }

    /// `%` lengths scale the measured width, `Length::percent(50.0)` or a
    /// parsed `"50%"` halving it. Other units are ignored.
    pub fn set_width(&mut self, width: Option<Length>) {
        self.constraint.width = width;
        self.last_measure.set(None);
    }

    pub fn set_height(&mut self, height: Option<Length>) {
        self.constraint.height = height;
        self.last_measure.set(None);
    }

    pub fn is_bold(&self) -> bool {
        self.font.contains("bold")
    }

    /// Starts (or joins) loading of the shared provider.
    pub fn load(&self) -> BoxFuture<'static, ProviderStatus> {
        self.provider.load()
    }

    pub fn font_metrics(&self) -> FontMetrics {
        match self.metrics_mode {
            MetricsMode::System => font_metrics(&self.font),
            MetricsMode::Approximate => approximate_font_metrics(&self.font),
        }
    }

    pub fn styled_formula(&self) -> String {
        self.dialect
            .styled_formula(&self.text, &self.color, self.is_bold())
    }

    /// Converts the formula through the provider. Fails with
    /// [`RenderError::ProviderNotLoaded`] if the provider is not ready.
    pub fn to_svg(&self) -> Result<VectorGraphic, RenderError> {
        let metrics = self.font_metrics();
        self.convert(&metrics)
    }

    /// Baseline correction from the last measurement, in device units.
    pub fn valign(&self) -> f32 {
        self.layout().measure.valign
    }

    /// Size, origin, valign and rotated corners, converting the formula once.
    pub fn geometry(&self) -> BoxGeometry {
        let Layout {
            measure, origin, ..
        } = self.layout();
        BoxGeometry {
            size: measure.size,
            origin,
            valign: measure.valign,
            rect: rotated_rect(origin, measure.size, self.position, self.angle),
        }
    }

    fn convert(&self, metrics: &FontMetrics) -> Result<VectorGraphic, RenderError> {
        let ctx = StyleContext {
            color: &self.color,
            bold: self.is_bold(),
            em: self.em_px,
            ex: metrics.x_height,
        };
        self.dialect.to_svg(&self.provider, &self.text, &ctx)
    }

    fn layout(&self) -> Layout {
        let metrics = self.font_metrics();
        let (graphic, measure) = if self.provider.is_loaded() {
            let graphic = self.convert(&metrics);
            let measure = match &graphic {
                Ok(graphic) => match self.measure_graphic(graphic, &metrics) {
                    Some(measure) => {
                        self.last_measure.set(Some(measure));
                        measure
                    }
                    None => self.last_measure.get().unwrap_or_else(Measure::placeholder),
                },
                Err(err) => {
                    log::debug!("{} conversion failed while sizing: {err}", self.dialect.kind());
                    self.last_measure.get().unwrap_or_else(Measure::placeholder)
                }
            };
            (graphic, measure)
        } else {
            (Err(RenderError::ProviderNotLoaded), Measure::placeholder())
        };
        let origin = self.origin(&measure, &metrics);
        Layout {
            graphic,
            measure,
            metrics,
            origin,
        }
    }

    fn measure_graphic(&self, graphic: &VectorGraphic, metrics: &FontMetrics) -> Option<Measure> {
        let ex = metrics.x_height;
        let width = graphic.width.as_ref()?.to_px(self.em_px, ex)?;
        let height = graphic.height.as_ref()?.to_px(self.em_px, ex)?;
        let valign = match &graphic.vertical_align {
            Some(Length {
                value,
                unit: Unit::Ex,
            }) => value * ex,
            Some(Length {
                value,
                unit: Unit::Px,
            }) => *value,
            _ => 0.0,
        };
        let size = self.constraint.apply(Size {
            width,
            height: height.max(metrics.height),
        });
        Some(Measure { size, valign })
    }

    fn origin(&self, measure: &Measure, metrics: &FontMetrics) -> Point {
        let Size { width, height } = measure.size;
        let Position {
            sx,
            sy,
            x_anchor,
            y_anchor,
        } = self.position;
        let x_anchor = x_anchor.unwrap_or(self.x_anchor);
        let y_anchor = y_anchor.unwrap_or(self.y_anchor);
        Point {
            x: sx - x_anchor.offset(width),
            y: sy - vertical_offset(y_anchor, height, measure.valign, metrics),
        }
    }
}

/// Distance from the box top to the caret for a vertical anchor.
///
/// `top` and `bottom` correct for glyphs whose line height overflows the box
/// so the cap (or descender) stays on the nominal edge. `center` and
/// `baseline` both resolve to the midpoint.
pub fn vertical_offset(anchor: YAnchor, height: f32, valign: f32, metrics: &FontMetrics) -> f32 {
    let overflows = metrics.height > height;
    match anchor {
        YAnchor::Fraction(fraction) => fraction * height,
        YAnchor::Top if overflows => height - (-valign - metrics.descent) - metrics.height,
        YAnchor::Top => 0.0,
        YAnchor::Bottom if overflows => height + metrics.descent + valign,
        YAnchor::Bottom => height,
        YAnchor::Center | YAnchor::Baseline => 0.5 * height,
    }
}

impl<D: Dialect> GraphicsBox for MathBox<D> {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    fn angle(&self) -> f32 {
        self.angle
    }

    fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    fn set_visuals(&mut self, visuals: &TextVisuals) {
        let size = scale_font_size(
            &visuals.font_size,
            visuals.font_size_scale,
            visuals.base_font_size,
        );
        self.font = format!("{} {} {}", visuals.font_style, size, visuals.font_family);
        self.color = color_to_css(&visuals.color, visuals.alpha);
        self.x_anchor = visuals.align.into();
        self.y_anchor = visuals.baseline.into();
        self.em_px = visuals
            .base_font_size
            .unwrap_or_else(|| FontSpec::parse(&self.font).size_px);
        self.last_measure.set(None);
    }

    fn size(&self) -> Size {
        self.layout().measure.size
    }

    fn computed_position(&self) -> Point {
        self.layout().origin
    }

    fn rect(&self) -> Quad {
        self.geometry().rect
    }

    fn paint(&self, surface: &mut dyn Surface) {
        let Layout {
            graphic,
            measure,
            metrics,
            origin,
        } = self.layout();
        let mut surface = SurfaceStateGuard::new(surface);

        if self.angle != 0.0 {
            let Position { sx, sy, .. } = self.position;
            surface.translate(sx, sy);
            surface.rotate(self.angle);
            surface.translate(-sx, -sy);
        }

        let Point { x, y } = origin;
        let drawn = graphic.and_then(|graphic| {
            surface.translate(x, y);
            let result = surface.draw_svg(&graphic, measure.size);
            surface.translate(-x, -y);
            result
        });

        if let Err(err) = drawn {
            match err {
                RenderError::ProviderNotLoaded => {
                    log::debug!("typesetting provider not ready, painting {:?} as text", self.text)
                }
                err => log::warn!(
                    "failed to paint {} formula {:?}, falling back to text: {err}",
                    self.dialect.kind(),
                    self.text
                ),
            }
            surface.set_fill_style(&self.color);
            surface.set_font(&self.font);
            surface.set_text_align(TextAlign::Left);
            surface.set_text_baseline(TextBaseline::Alphabetic);
            surface.fill_text(&self.text, x, y + metrics.ascent);
        }
    }
}
