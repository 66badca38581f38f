use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, RenderError};
use crate::graphics::color_to_rgb;
use crate::provider::{ConversionOptions, TexMacro, TypesettingEngine, TypesettingProvider};
use crate::svg::VectorGraphic;

static MATH_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?math(?:\s[^>]*)?>").unwrap());
static MATH_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</\s*(?:[A-Za-z_][\w.-]*:)?math\s*>").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Tex,
    Mathml,
    Ascii,
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tex => "tex",
            Self::Mathml => "mathml",
            Self::Ascii => "ascii",
        })
    }
}

impl FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tex" | "latex" => Ok(Self::Tex),
            "mathml" | "mml" => Ok(Self::Mathml),
            "ascii" | "asciimath" => Ok(Self::Ascii),
            other => Err(format!("unknown formula dialect: {other}")),
        }
    }
}

/// Resolved visual state a dialect needs to style and convert a formula.
#[derive(Debug, Clone, Copy)]
pub struct StyleContext<'a> {
    pub color: &'a str,
    pub bold: bool,
    /// Pixels per `em`.
    pub em: f32,
    /// Pixels per `ex`.
    pub ex: f32,
}

/// Per-dialect capabilities: inject styling into the source and convert it
/// through the provider.
pub trait Dialect {
    fn kind(&self) -> DialectKind;

    fn styled_formula(&self, text: &str, color: &str, bold: bool) -> String;

    /// Fails with [`RenderError::ProviderNotLoaded`] unless the provider has
    /// already finished loading. Never waits.
    fn to_svg(
        &self,
        provider: &TypesettingProvider,
        text: &str,
        ctx: &StyleContext<'_>,
    ) -> Result<VectorGraphic, RenderError>;
}

fn convert(
    provider: &TypesettingProvider,
    run: impl FnOnce(&dyn TypesettingEngine) -> Result<String, EngineError>,
) -> Result<VectorGraphic, RenderError> {
    let engine = provider.engine().ok_or(RenderError::ProviderNotLoaded)?;
    let container = run(engine.as_ref())?;
    Ok(VectorGraphic::from_container(&container)?)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeX {
    pub inline: bool,
    pub macros: BTreeMap<String, TexMacro>,
}

impl TeX {
    pub fn inline() -> Self {
        Self {
            inline: true,
            ..Self::default()
        }
    }
}

impl Dialect for TeX {
    fn kind(&self) -> DialectKind {
        DialectKind::Tex
    }

    fn styled_formula(&self, text: &str, color: &str, bold: bool) -> String {
        let body = if bold {
            format!("\\pmb{{{text}}}")
        } else {
            text.to_string()
        };
        match color_to_rgb(color) {
            Some((r, g, b)) => format!("\\color[RGB]{{{r}, {g}, {b}}} {body}"),
            None => body,
        }
    }

    fn to_svg(
        &self,
        provider: &TypesettingProvider,
        text: &str,
        ctx: &StyleContext<'_>,
    ) -> Result<VectorGraphic, RenderError> {
        let styled = self.styled_formula(text, ctx.color, ctx.bold);
        let options = ConversionOptions {
            em: ctx.em,
            ex: ctx.ex,
            display: !self.inline,
            macros: self.macros.clone(),
        };
        convert(provider, |engine| engine.tex_to_svg(&styled, &options))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MathML;

impl Dialect for MathML {
    fn kind(&self) -> DialectKind {
        DialectKind::Mathml
    }

    fn styled_formula(&self, text: &str, color: &str, bold: bool) -> String {
        let trimmed = text.trim();
        let Some(open) = MATH_OPEN_RE.find(trimmed) else {
            return trimmed.to_string();
        };
        let variant = if bold { " mathvariant=\"bold\"" } else { "" };
        let mut styled = String::with_capacity(trimmed.len() + 64);
        styled.push_str(&trimmed[..open.end()]);
        styled.push_str(&format!(
            "<mstyle displaystyle=\"true\" mathcolor=\"{color}\"{variant}>"
        ));
        let rest = &trimmed[open.end()..];
        let Some(close) = MATH_CLOSE_RE.find_iter(rest).last() else {
            return trimmed.to_string();
        };
        styled.push_str(&rest[..close.start()]);
        styled.push_str("</mstyle>");
        styled.push_str(&rest[close.start()..]);
        styled
    }

    fn to_svg(
        &self,
        provider: &TypesettingProvider,
        text: &str,
        ctx: &StyleContext<'_>,
    ) -> Result<VectorGraphic, RenderError> {
        let styled = self.styled_formula(text, ctx.color, ctx.bold);
        let options = ConversionOptions {
            em: ctx.em,
            ex: ctx.ex,
            ..ConversionOptions::default()
        };
        convert(provider, |engine| engine.mathml_to_svg(&styled, &options))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsciiMath;

impl Dialect for AsciiMath {
    fn kind(&self) -> DialectKind {
        DialectKind::Ascii
    }

    fn styled_formula(&self, text: &str, color: &str, bold: bool) -> String {
        let body = text.trim();
        let body = if bold {
            format!("bb({body})")
        } else {
            body.to_string()
        };
        format!("color({color})({body})")
    }

    fn to_svg(
        &self,
        provider: &TypesettingProvider,
        text: &str,
        ctx: &StyleContext<'_>,
    ) -> Result<VectorGraphic, RenderError> {
        let styled = self.styled_formula(text, ctx.color, ctx.bold);
        let options = ConversionOptions {
            em: ctx.em,
            ex: ctx.ex,
            ..ConversionOptions::default()
        };
        convert(provider, |engine| engine.ascii_to_svg(&styled, &options))
    }
}

/// Runtime-selected dialect, for callers that pick one from user input.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyDialect {
    Tex(TeX),
    Mathml(MathML),
    Ascii(AsciiMath),
}

impl From<DialectKind> for AnyDialect {
    fn from(kind: DialectKind) -> Self {
        match kind {
            DialectKind::Tex => Self::Tex(TeX::default()),
            DialectKind::Mathml => Self::Mathml(MathML),
            DialectKind::Ascii => Self::Ascii(AsciiMath),
        }
    }
}

impl AnyDialect {
    fn inner(&self) -> &dyn Dialect {
        match self {
            Self::Tex(dialect) => dialect,
            Self::Mathml(dialect) => dialect,
            Self::Ascii(dialect) => dialect,
        }
    }
}

impl Dialect for AnyDialect {
    fn kind(&self) -> DialectKind {
        self.inner().kind()
    }

    fn styled_formula(&self, text: &str, color: &str, bold: bool) -> String {
        self.inner().styled_formula(text, color, bold)
    }

    fn to_svg(
        &self,
        provider: &TypesettingProvider,
        text: &str,
        ctx: &StyleContext<'_>,
    ) -> Result<VectorGraphic, RenderError> {
        self.inner().to_svg(provider, text, ctx)
    }
}
