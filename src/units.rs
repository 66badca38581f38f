use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static LENGTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)\s*([A-Za-z]+|%)\s*$").unwrap()
});

const PX_PER_PT: f32 = 4.0 / 3.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Px,
    Pt,
    Em,
    Ex,
    Rem,
    Percent,
    Other(String),
}

impl Unit {
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "px" => Self::Px,
            "pt" => Self::Pt,
            "em" => Self::Em,
            "ex" => Self::Ex,
            "rem" => Self::Rem,
            "%" => Self::Percent,
            _ => Self::Other(token.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Px => "px",
            Self::Pt => "pt",
            Self::Em => "em",
            Self::Ex => "ex",
            Self::Rem => "rem",
            Self::Percent => "%",
            Self::Other(token) => token.as_str(),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CSS-style length: a number followed by a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f32,
    pub unit: Unit,
}

impl Length {
    pub fn new(value: f32, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn px(value: f32) -> Self {
        Self::new(value, Unit::Px)
    }

    pub fn percent(value: f32) -> Self {
        Self::new(value, Unit::Percent)
    }

    /// Device pixels for absolute and font-relative units. `rem` is taken
    /// relative to `em_px` as there is no root element here.
    pub fn to_px(&self, em_px: f32, ex_px: f32) -> Option<f32> {
        match self.unit {
            Unit::Px => Some(self.value),
            Unit::Pt => Some(self.value * PX_PER_PT),
            Unit::Em | Unit::Rem => Some(self.value * em_px),
            Unit::Ex => Some(self.value * ex_px),
            Unit::Percent | Unit::Other(_) => None,
        }
    }

    /// Multiplier applied to a natively measured dimension. Only percentages
    /// scale (`50%` halves it); everything else passes through.
    pub fn scale_factor(&self) -> f32 {
        match self.unit {
            Unit::Percent => self.value / 100.0,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// Parses `"12px"`, `"-0.566ex"`, `"50%"`. Returns `None` for anything else;
/// callers treat that as "no constraint".
pub fn parse_length(input: &str) -> Option<Length> {
    let caps = LENGTH_RE.captures(input)?;
    let value: f32 = caps.get(1)?.as_str().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let unit = Unit::from_token(caps.get(2)?.as_str());
    Some(Length { value, unit })
}

pub fn parse_font_size(input: &str) -> Option<Length> {
    parse_length(input)
}

/// Applies a relative scale to a font size string and resolves `em` against
/// `base_font_size` (in px) when one is given. Unparseable sizes pass through.
pub fn scale_font_size(size: &str, scale: f32, base_font_size: Option<f32>) -> String {
    let Some(Length { mut value, mut unit }) = parse_font_size(size) else {
        return size.to_string();
    };
    value *= scale;
    if unit == Unit::Em
        && let Some(base) = base_font_size
    {
        value *= base;
        unit = Unit::Px;
    }
    format!("{value}{unit}")
}
