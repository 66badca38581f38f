use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt};
use mathtext_renderer::graphics::{TextAlign, TextBaseline};
use mathtext_renderer::layout_dump::LayoutDump;
use mathtext_renderer::provider::ConversionOptions;
use mathtext_renderer::{
    AsciiMathBox, Dialect, EngineError, EngineLoader, GraphicsBox, MathMLBox, MetricsMode,
    Position, ProviderStatus, RenderError, Size, Surface, SvgSurface, TeXBox, TextVisuals,
    TypesettingEngine, TypesettingProvider, VectorGraphic, XAnchor, YAnchor,
};

struct FakeEngine {
    width: String,
    height: String,
    style: Option<String>,
    fail: AtomicBool,
    seen: Mutex<Vec<(String, ConversionOptions)>>,
}

impl FakeEngine {
    fn new(width: &str, height: &str) -> Arc<Self> {
        Self::with_style(width, height, None)
    }

    fn with_style(width: &str, height: &str, style: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            width: width.to_string(),
            height: height.to_string(),
            style: style.map(str::to_string),
            fail: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn container(&self, formula: &str, options: &ConversionOptions) -> Result<String, EngineError> {
        self.seen
            .lock()
            .unwrap()
            .push((formula.to_string(), options.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::MalformedOutput("bad formula".to_string()));
        }
        let style = self
            .style
            .as_deref()
            .map(|s| format!(" style=\"{s}\""))
            .unwrap_or_default();
        Ok(format!(
            "<mjx-container><svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\"{style} viewBox=\"0 0 100 50\"><path d=\"M0 0L10 10\"/></svg></mjx-container>",
            self.width, self.height
        ))
    }
}

impl TypesettingEngine for FakeEngine {
    fn tex_to_svg(
        &self,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError> {
        self.container(formula, options)
    }

    fn mathml_to_svg(
        &self,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError> {
        self.container(formula, options)
    }

    fn ascii_to_svg(
        &self,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError> {
        self.container(formula, options)
    }
}

struct MalformedEngine;

impl TypesettingEngine for MalformedEngine {
    fn tex_to_svg(&self, _: &str, _: &ConversionOptions) -> Result<String, EngineError> {
        Ok("<div><span/></div>".to_string())
    }

    fn mathml_to_svg(&self, f: &str, o: &ConversionOptions) -> Result<String, EngineError> {
        self.tex_to_svg(f, o)
    }

    fn ascii_to_svg(&self, f: &str, o: &ConversionOptions) -> Result<String, EngineError> {
        self.tex_to_svg(f, o)
    }
}

/// Resolves to `Pending` once before completing.
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

struct Loader {
    engine: Option<Arc<dyn TypesettingEngine>>,
    fetches: Arc<AtomicUsize>,
}

impl Loader {
    fn ok(engine: Arc<dyn TypesettingEngine>) -> Self {
        Self {
            engine: Some(engine),
            fetches: Arc::default(),
        }
    }

    fn failing() -> Self {
        Self {
            engine: None,
            fetches: Arc::default(),
        }
    }
}

impl EngineLoader for Loader {
    fn fetch(&self) -> BoxFuture<'static, Result<Arc<dyn TypesettingEngine>, EngineError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let engine = self.engine.clone();
        async move {
            YieldOnce(false).await;
            engine.ok_or_else(|| EngineError::Unavailable("no network".to_string()))
        }
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Save,
    Restore,
    Translate(f32, f32),
    Rotate(f32),
    FillStyle(String),
    Font(String),
    Align(TextAlign),
    Baseline(TextBaseline),
    FillText(String, f32, f32),
    DrawSvg(Size),
}

#[derive(Default)]
struct RecordingSurface {
    calls: Vec<Call>,
    reject_graphics: bool,
}

impl RecordingSurface {
    fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    fn fill_texts(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::FillText(..)))
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn save(&mut self) {
        self.calls.push(Call::Save);
    }
    fn restore(&mut self) {
        self.calls.push(Call::Restore);
    }
    fn translate(&mut self, dx: f32, dy: f32) {
        self.calls.push(Call::Translate(dx, dy));
    }
    fn rotate(&mut self, angle: f32) {
        self.calls.push(Call::Rotate(angle));
    }
    fn set_fill_style(&mut self, color: &str) {
        self.calls.push(Call::FillStyle(color.to_string()));
    }
    fn set_font(&mut self, font: &str) {
        self.calls.push(Call::Font(font.to_string()));
    }
    fn set_text_align(&mut self, align: TextAlign) {
        self.calls.push(Call::Align(align));
    }
    fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.calls.push(Call::Baseline(baseline));
    }
    fn fill_text(&mut self, text: &str, x: f32, y: f32) {
        self.calls.push(Call::FillText(text.to_string(), x, y));
    }
    fn draw_svg(&mut self, _: &VectorGraphic, size: Size) -> Result<(), RenderError> {
        if self.reject_graphics {
            return Err(RenderError::Compositor("device lost".to_string()));
        }
        self.calls.push(Call::DrawSvg(size));
        Ok(())
    }
}

fn visuals_20px() -> TextVisuals {
    TextVisuals {
        color: "red".to_string(),
        font_size: "20px".to_string(),
        font_family: "serif".to_string(),
        ..TextVisuals::default()
    }
}

fn loaded_provider(engine: Arc<dyn TypesettingEngine>) -> TypesettingProvider {
    let provider = TypesettingProvider::new(Loader::ok(engine));
    assert_eq!(provider.load_blocking(), ProviderStatus::Loaded);
    provider
}

fn tex_box(provider: TypesettingProvider, text: &str) -> TeXBox {
    let mut math_box = TeXBox::tex(text, provider).with_metrics_mode(MetricsMode::Approximate);
    math_box.set_visuals(&visuals_20px());
    math_box
}

fn caret(x_anchor: XAnchor, y_anchor: YAnchor) -> Position {
    Position::new(100.0, 50.0).with_anchors(Some(x_anchor), Some(y_anchor))
}

fn placeholder() -> Size {
    Size {
        width: 13.0,
        height: 13.0,
    }
}

#[test]
fn placeholder_size_until_provider_loads() {
    let provider = TypesettingProvider::new(Loader::ok(FakeEngine::new("4ex", "2ex")));
    for formula in ["x", "\\int_0^1 f(x)\\,dx", ""] {
        let tex = tex_box(provider.clone(), formula);
        assert_eq!(tex.size(), placeholder());
    }
    let mut mathml = MathMLBox::mathml("<math><mi>x</mi></math>", provider.clone());
    mathml.set_visuals(&TextVisuals {
        font_size: "40px".to_string(),
        ..TextVisuals::default()
    });
    assert_eq!(mathml.size(), placeholder());
    assert_eq!(provider.status(), ProviderStatus::NotStarted);
}

#[test]
fn placeholder_size_when_provider_failed() {
    let provider = TypesettingProvider::new(Loader::failing());
    assert_eq!(provider.load_blocking(), ProviderStatus::Failed);
    let mut ascii = AsciiMathBox::ascii("sum_(i=1)^n i", provider);
    ascii.set_width(Some(mathtext_renderer::units::Length::percent(300.0)));
    assert_eq!(ascii.size(), placeholder());
    assert!(matches!(ascii.to_svg(), Err(RenderError::ProviderNotLoaded)));
}

#[test]
fn to_svg_requires_loaded_provider() {
    let provider = TypesettingProvider::new(Loader::ok(FakeEngine::new("4ex", "2ex")));
    let tex = tex_box(provider.clone(), "x");
    let _pending = provider.load();
    assert_eq!(provider.status(), ProviderStatus::Loading);
    assert!(matches!(tex.to_svg(), Err(RenderError::ProviderNotLoaded)));
    assert_eq!(tex.size(), placeholder());
}

#[test]
fn converts_ex_units_with_x_height() {
    let engine = FakeEngine::new("4ex", "3ex");
    let tex = tex_box(loaded_provider(engine), "x^2");
    // 20px approximate metrics: x-height 10, line height 20
    assert_eq!(
        tex.size(),
        Size {
            width: 40.0,
            height: 30.0
        }
    );
}

#[test]
fn height_never_below_line_height() {
    for height in ["0.1ex", "1ex", "1.9ex"] {
        let tex = tex_box(loaded_provider(FakeEngine::new("2ex", height)), "-");
        let metrics = tex.font_metrics();
        assert_eq!(tex.size().height, metrics.height, "height {height}");
    }
}

#[test]
fn vertical_align_hint_becomes_valign() {
    let engine = FakeEngine::with_style("2ex", "1ex", Some("vertical-align: -0.5ex;"));
    let tex = tex_box(loaded_provider(engine), "y");
    assert_eq!(tex.valign(), -5.0);

    let engine = FakeEngine::with_style("2ex", "1ex", Some("vertical-align: 3px"));
    let tex = tex_box(loaded_provider(engine), "y");
    assert_eq!(tex.valign(), 3.0);
}

#[test]
fn percent_constraints_scale_measured_size() {
    let engine = FakeEngine::new("4ex", "4ex");
    let mut tex = tex_box(loaded_provider(engine), "x");
    tex.set_width(mathtext_renderer::units::parse_length("50%"));
    tex.set_height(Some(mathtext_renderer::units::Length::px(500.0)));
    assert_eq!(
        tex.size(),
        Size {
            width: 20.0,
            height: 40.0
        }
    );
}

#[test]
fn styling_and_unit_hints_reach_engine() {
    let engine = FakeEngine::new("1ex", "1ex");
    let provider = loaded_provider(engine.clone());
    let mut tex = TeXBox::tex("E = mc^2", provider).with_metrics_mode(MetricsMode::Approximate);
    tex.set_visuals(&TextVisuals {
        font_style: "bold".to_string(),
        font_size: "1.5em".to_string(),
        base_font_size: Some(16.0),
        ..visuals_20px()
    });
    assert_eq!(tex.font(), "bold 24px serif");
    tex.size();

    let seen = engine.seen.lock().unwrap();
    let (formula, options) = seen.last().unwrap();
    assert_eq!(formula, "\\color[RGB]{255, 0, 0} \\pmb{E = mc^2}");
    assert_eq!(options.em, 16.0);
    assert_eq!(options.ex, 12.0);
    assert!(options.display);
}

#[test]
fn visuals_set_default_anchors_and_color() {
    let provider = TypesettingProvider::new(Loader::failing());
    let mut tex = TeXBox::tex("x", provider);
    tex.set_visuals(&TextVisuals {
        color: "#00ff00".to_string(),
        alpha: 0.5,
        align: TextAlign::Right,
        baseline: TextBaseline::Middle,
        ..TextVisuals::default()
    });
    assert_eq!(tex.color(), "rgba(0, 255, 0, 0.5)");
    assert_eq!(tex.default_anchors(), (XAnchor::Right, YAnchor::Center));
}

#[test]
fn anchors_resolve_against_caret() {
    let tex_provider = loaded_provider(FakeEngine::new("4ex", "3ex"));
    let mut tex = tex_box(tex_provider, "x");
    // size 40 x 30, line height 20 so no overflow correction
    tex.set_position(caret(XAnchor::Right, YAnchor::Bottom));
    let origin = tex.computed_position();
    assert_eq!((origin.x, origin.y), (60.0, 20.0));

    tex.set_position(caret(XAnchor::Fraction(0.25), YAnchor::Top));
    let origin = tex.computed_position();
    assert_eq!((origin.x, origin.y), (90.0, 50.0));

    tex.set_position(caret(XAnchor::Center, YAnchor::Baseline));
    let center = tex.computed_position();
    tex.set_position(caret(XAnchor::Center, YAnchor::Center));
    assert_eq!(tex.computed_position(), center);
    assert_eq!((center.x, center.y), (80.0, 35.0));
}

#[test]
fn degraded_paint_draws_text_with_top_overflow_correction() {
    let provider = TypesettingProvider::new(Loader::failing());
    let mut tex = tex_box(provider, "a+b");
    tex.set_position(caret(XAnchor::Left, YAnchor::Top));

    let mut surface = RecordingSurface::default();
    tex.paint(&mut surface);

    // placeholder height 13 < line height 20: offset = 13 - (0 - 4) - 20 = -3
    assert_eq!(
        surface.fill_texts(),
        vec![&Call::FillText("a+b".to_string(), 100.0, 53.0 + 16.0)]
    );
    assert!(surface.calls.contains(&Call::FillStyle("#ff0000".to_string())));
    assert!(surface.calls.contains(&Call::Font("normal 20px serif".to_string())));
    assert!(surface.calls.contains(&Call::Align(TextAlign::Left)));
    assert!(surface.calls.contains(&Call::Baseline(TextBaseline::Alphabetic)));
    assert_eq!(surface.calls.first(), Some(&Call::Save));
    assert_eq!(surface.calls.last(), Some(&Call::Restore));
}

#[test]
fn malformed_graphic_falls_back_to_text() {
    let provider = loaded_provider(Arc::new(MalformedEngine));
    let tex = tex_box(provider, "x");
    let mut surface = RecordingSurface::default();
    tex.paint(&mut surface);
    assert_eq!(surface.fill_texts().len(), 1);
    assert_eq!(surface.count(&Call::Save), 1);
    assert_eq!(surface.count(&Call::Restore), 1);
    assert_eq!(tex.size(), placeholder());
}

#[test]
fn compositor_failure_falls_back_to_text() {
    let tex = tex_box(loaded_provider(FakeEngine::new("4ex", "3ex")), "x");
    let mut surface = RecordingSurface {
        reject_graphics: true,
        ..RecordingSurface::default()
    };
    tex.paint(&mut surface);
    let origin = tex.computed_position();
    let ascent = tex.font_metrics().ascent;
    assert_eq!(
        surface.fill_texts(),
        vec![&Call::FillText("x".to_string(), origin.x, origin.y + ascent)]
    );
    assert_eq!(surface.count(&Call::Restore), 1);
}

#[test]
fn ready_paint_rotates_about_caret_then_composites() {
    let mut tex = tex_box(loaded_provider(FakeEngine::new("4ex", "3ex")), "x");
    tex.set_position(caret(XAnchor::Left, YAnchor::Top));
    tex.set_angle(0.5);
    let mut surface = RecordingSurface::default();
    tex.paint(&mut surface);
    assert_eq!(
        surface.calls,
        vec![
            Call::Save,
            Call::Translate(100.0, 50.0),
            Call::Rotate(0.5),
            Call::Translate(-100.0, -50.0),
            Call::Translate(100.0, 50.0),
            Call::DrawSvg(Size {
                width: 40.0,
                height: 30.0
            }),
            Call::Translate(-100.0, -50.0),
            Call::Restore,
        ]
    );
}

#[test]
fn conversion_failure_reuses_last_measurement() {
    let engine = FakeEngine::new("4ex", "3ex");
    let tex = tex_box(loaded_provider(engine.clone()), "x");
    let measured = tex.size();
    engine.fail.store(true, Ordering::SeqCst);
    assert_eq!(tex.size(), measured);

    let fresh = tex_box(tex.provider().clone(), "y");
    assert_eq!(fresh.size(), placeholder());
}

#[test]
fn concurrent_loads_share_one_fetch() {
    let engine = FakeEngine::new("1ex", "1ex");
    let loader = Loader::ok(engine);
    let fetches = loader.fetches.clone();
    let provider = TypesettingProvider::new(loader);

    let a = tex_box(provider.clone(), "a");
    let b = MathMLBox::mathml("<math><mi>b</mi></math>", provider.clone());
    let c = AsciiMathBox::ascii("c", provider.clone());

    let (sa, sb, sc) = pollster::block_on(async { futures::join!(a.load(), b.load(), c.load()) });
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!([sa, sb, sc], [ProviderStatus::Loaded; 3]);
    assert_eq!(provider.status(), ProviderStatus::Loaded);
}

#[test]
fn concurrent_loads_share_one_failure() {
    let loader = Loader::failing();
    let fetches = loader.fetches.clone();
    let provider = TypesettingProvider::new(loader);
    let loads = [provider.load(), provider.load(), provider.load()];
    assert_eq!(provider.status(), ProviderStatus::Loading);
    let statuses = pollster::block_on(futures::future::join_all(loads));
    assert_eq!(statuses, vec![ProviderStatus::Failed; 3]);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn svg_surface_contains_formula_graphic() {
    let mut tex = tex_box(loaded_provider(FakeEngine::new("4ex", "3ex")), "x");
    tex.set_position(Position::new(50.0, 50.0));
    let mut surface = SvgSurface::new(200.0, 100.0);
    tex.paint(&mut surface);
    let svg = surface.finish();
    assert!(svg.contains("<path d=\"M0 0L10 10\"/>"));
    assert!(svg.contains("width=\"40.000\""));
    assert!(!svg.contains("<text"));
}

#[test]
fn svg_surface_degraded_output_has_text() {
    let provider = TypesettingProvider::new(Loader::failing());
    let mut mathml = MathMLBox::mathml("<math><mi>x</mi></math>", provider);
    mathml.set_position(Position::new(20.0, 20.0));
    let mut surface = SvgSurface::new(100.0, 40.0);
    mathml.paint(&mut surface);
    let svg = surface.finish();
    assert!(svg.contains("&lt;math&gt;&lt;mi&gt;x&lt;/mi&gt;&lt;/math&gt;</text>"));
}

#[test]
fn mathml_styling_through_box() {
    let provider = TypesettingProvider::new(Loader::failing());
    let mut mathml = MathMLBox::mathml("<math>X</math>", provider);
    mathml.set_visuals(&TextVisuals {
        color: "#ff0000".to_string(),
        ..TextVisuals::default()
    });
    let styled = mathml.styled_formula();
    assert_eq!(
        styled,
        "<math><mstyle displaystyle=\"true\" mathcolor=\"#ff0000\">X</mstyle></math>"
    );
    assert_eq!(mathml.dialect().kind(), mathtext_renderer::DialectKind::Mathml);
}

#[test]
fn rect_rotates_about_caret() {
    let mut tex = tex_box(loaded_provider(FakeEngine::new("4ex", "3ex")), "x");
    tex.set_position(Position::new(0.0, 0.0).with_anchors(Some(XAnchor::Left), Some(YAnchor::Top)));
    let unrotated = tex.bbox();
    assert_eq!((unrotated.width(), unrotated.height()), (40.0, 30.0));

    tex.set_angle(std::f32::consts::FRAC_PI_2);
    let rect = tex.rect();
    assert!((rect.p1.x - 0.0).abs() < 1e-3 && (rect.p1.y - 40.0).abs() < 1e-3);
    let bbox = tex.bbox();
    assert!((bbox.width() - 30.0).abs() < 1e-3);
    assert!((bbox.height() - 40.0).abs() < 1e-3);
}

#[test]
fn geometry_converts_formula_once() {
    let engine = FakeEngine::new("4ex", "3ex");
    let mut tex = tex_box(loaded_provider(engine.clone()), "x");
    tex.set_position(caret(XAnchor::Left, YAnchor::Top));
    tex.set_angle(0.25);
    let conversions = || engine.seen.lock().unwrap().len();

    let before = conversions();
    let bbox = tex.bbox();
    assert_eq!(conversions(), before + 1);

    let before = conversions();
    let dump = LayoutDump::from_box(&tex);
    assert_eq!(conversions(), before + 1);
    assert_eq!(dump.bbox, bbox);
    assert_eq!(
        dump.size,
        Size {
            width: 40.0,
            height: 30.0
        }
    );
    assert_eq!(dump.provider, ProviderStatus::Loaded);
}
