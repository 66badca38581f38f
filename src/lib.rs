#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod graphics;
pub mod layout_dump;
pub mod math_box;
pub mod provider;
pub mod surface;
pub mod svg;
pub mod text_metrics;
pub mod theme;
pub mod units;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use dialect::{AnyDialect, AsciiMath, Dialect, DialectKind, MathML, TeX};
pub use error::{EngineError, RenderError};
pub use graphics::{GraphicsBox, Position, Size, TextVisuals, XAnchor, YAnchor};
pub use math_box::{
    AsciiMathBox, BoxGeometry, MathBox, MathMLBox, MetricsMode, PLACEHOLDER_SIZE, TeXBox,
};
pub use provider::{EngineLoader, ProviderStatus, TypesettingEngine, TypesettingProvider};
pub use surface::{Surface, SvgSurface};
pub use svg::VectorGraphic;
pub use theme::Theme;
