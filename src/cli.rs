use crate::config::{Config, load_config};
use crate::dialect::{AnyDialect, DialectKind, TeX};
use crate::engine::CommandEngineLoader;
use crate::graphics::{GraphicsBox, Position, TextAlign, TextBaseline, XAnchor, YAnchor};
use crate::layout_dump::write_layout_dump;
use crate::math_box::{MathBox, MetricsMode};
use crate::provider::{ProviderStatus, TypesettingProvider};
use crate::surface::SvgSurface;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "mtxr", version, about = "Render a math formula into an anchored SVG/PNG box")]
pub struct Args {
    /// Formula source. Read from --input when omitted.
    pub formula: Option<String>,

    /// Input file with the formula, or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Formula dialect: tex, mathml or ascii
    #[arg(short = 'd', long = "dialect", default_value = "tex")]
    pub dialect: DialectKind,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Surface width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Surface height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Caret x; defaults to the surface center
    #[arg(long = "x")]
    pub x: Option<f32>,

    /// Caret y; defaults to the surface center
    #[arg(long = "y")]
    pub y: Option<f32>,

    /// Horizontal text alignment (default x anchor)
    #[arg(long = "align", default_value = "center")]
    pub align: TextAlign,

    /// Text baseline (default y anchor)
    #[arg(long = "baseline", default_value = "middle")]
    pub baseline: TextBaseline,

    /// Explicit x anchor: left, center, right or a fraction of the width
    #[arg(long = "x-anchor")]
    pub x_anchor: Option<XAnchor>,

    /// Explicit y anchor: top, center, bottom, baseline or a fraction of the height
    #[arg(long = "y-anchor")]
    pub y_anchor: Option<YAnchor>,

    /// Rotation about the caret, in radians
    #[arg(long = "angle", default_value_t = 0.0, allow_hyphen_values = true)]
    pub angle: f32,

    /// Typeset TeX inline instead of display style
    #[arg(long = "inline")]
    pub inline: bool,

    /// Write the computed box geometry as JSON
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }

    let formula = match &args.formula {
        Some(formula) => formula.clone(),
        None => read_input(args.input.as_deref())?,
    };
    if formula.trim().is_empty() {
        return Err(anyhow::anyhow!("No formula given"));
    }

    let provider = TypesettingProvider::new(CommandEngineLoader::new(config.engine.clone()));
    let math_box = build_box(&args, &config, &formula, provider);
    let status = math_box.provider().load_blocking();
    if status != ProviderStatus::Loaded {
        log::warn!("typesetting engine unavailable ({status}), rendering plain text");
    }

    if let Some(path) = &args.dump_layout {
        write_layout_dump(path, &math_box)?;
    }

    match args.output_format {
        OutputFormat::Svg => {
            let mut surface = SvgSurface::new(config.render.width, config.render.height)
                .with_background(&config.render.background);
            math_box.paint(&mut surface);
            write_output_svg(&surface.finish(), args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_output_png(&math_box, &config, &output)?;
        }
    }
    Ok(())
}

fn build_box(
    args: &Args,
    config: &Config,
    formula: &str,
    provider: TypesettingProvider,
) -> MathBox<AnyDialect> {
    let dialect = match args.dialect {
        DialectKind::Tex => AnyDialect::Tex(TeX {
            inline: args.inline,
            ..TeX::default()
        }),
        kind => AnyDialect::from(kind),
    };
    let metrics_mode = if config.metrics.fast_text_metrics {
        MetricsMode::Approximate
    } else {
        MetricsMode::System
    };
    let mut math_box = MathBox::new(dialect, formula, provider).with_metrics_mode(metrics_mode);
    math_box.set_visuals(&config.theme.visuals(args.align, args.baseline));
    math_box.set_position(
        Position::new(
            args.x.unwrap_or(config.render.width / 2.0),
            args.y.unwrap_or(config.render.height / 2.0),
        )
        .with_anchors(args.x_anchor, args.y_anchor),
    );
    math_box.set_angle(args.angle);
    math_box
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
fn write_output_png(math_box: &MathBox<AnyDialect>, config: &Config, output: &Path) -> Result<()> {
    use crate::surface::PixmapSurface;

    let mut surface = PixmapSurface::new(
        config.render.width.round() as u32,
        config.render.height.round() as u32,
    )?;
    surface.fill_background(&config.render.background);
    math_box.paint(&mut surface);
    surface.save_png(output)
}

#[cfg(not(feature = "png"))]
fn write_output_png(_: &MathBox<AnyDialect>, _: &Config, _: &Path) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}
