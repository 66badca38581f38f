use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use ttf_parser::Face;

use crate::units::{Unit, parse_font_size};

const DEFAULT_FONT_SIZE: f32 = 16.0;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Vertical metrics of a font, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FontMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub height: f32,
    pub x_height: f32,
}

/// A parsed CSS font shorthand: `[style] [weight] <size> <family>`.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub style: String,
    pub bold: bool,
    pub size_px: f32,
    pub family: String,
}

impl FontSpec {
    pub fn parse(font: &str) -> Self {
        let mut style = String::from("normal");
        let mut bold = false;
        let mut size_px = None;
        let mut family = Vec::new();

        for token in font.split_whitespace() {
            if size_px.is_some() {
                family.push(token);
                continue;
            }
            match token.to_ascii_lowercase().as_str() {
                "italic" | "oblique" => style = token.to_ascii_lowercase(),
                "bold" | "bolder" | "600" | "700" | "800" | "900" => bold = true,
                "normal" | "lighter" | "100" | "200" | "300" | "400" | "500" => {}
                _ => match parse_font_size(token) {
                    Some(length) => {
                        let px = match length.unit {
                            Unit::Percent => DEFAULT_FONT_SIZE * length.value / 100.0,
                            _ => length
                                .to_px(DEFAULT_FONT_SIZE, DEFAULT_FONT_SIZE / 2.0)
                                .unwrap_or(DEFAULT_FONT_SIZE),
                        };
                        size_px = Some(px);
                    }
                    None => {
                        size_px = Some(DEFAULT_FONT_SIZE);
                        family.push(token);
                    }
                },
            }
        }

        let family = if family.is_empty() {
            "sans-serif".to_string()
        } else {
            family.join(" ")
        };
        Self {
            style,
            bold,
            size_px: size_px.unwrap_or(DEFAULT_FONT_SIZE),
            family,
        }
    }

    pub fn is_italic(&self) -> bool {
        self.style != "normal"
    }
}

/// Metrics for a CSS font string. Results are cached per string so the
/// sizing and painting passes see identical numbers.
pub fn font_metrics(font: &str) -> FontMetrics {
    let mut guard = TEXT_MEASURER
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    guard.metrics(font)
}

/// Font-independent metrics derived from the size alone.
pub fn approximate_font_metrics(font: &str) -> FontMetrics {
    approximate_for_size(FontSpec::parse(font).size_px)
}

fn approximate_for_size(size: f32) -> FontMetrics {
    let ascent = size * 0.8;
    let descent = size * 0.2;
    FontMetrics {
        ascent,
        descent,
        height: ascent + descent,
        x_height: size * 0.5,
    }
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, FontMetrics>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn metrics(&mut self, font: &str) -> FontMetrics {
        let key = normalize_font_key(font);
        if let Some(metrics) = self.cache.get(&key) {
            return *metrics;
        }
        let spec = FontSpec::parse(font);
        let metrics = self
            .load_metrics(&spec)
            .unwrap_or_else(|| approximate_for_size(spec.size_px));
        log::debug!("font metrics for {key:?}: {metrics:?}");
        self.cache.insert(key, metrics);
        metrics
    }

    fn load_metrics(&mut self, spec: &FontSpec) -> Option<FontMetrics> {
        #[derive(Clone, Copy)]
        enum FamilyToken {
            Generic(fontdb::Family<'static>),
            Name(usize),
        }

        let mut names: Vec<String> = Vec::new();
        let mut order: Vec<FamilyToken> = Vec::new();
        for part in spec.family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            let lower = raw.to_ascii_lowercase();
            match lower.as_str() {
                "serif" => order.push(FamilyToken::Generic(Family::Serif)),
                "sans-serif" => order.push(FamilyToken::Generic(Family::SansSerif)),
                "monospace" => order.push(FamilyToken::Generic(Family::Monospace)),
                "cursive" => order.push(FamilyToken::Generic(Family::Cursive)),
                "fantasy" => order.push(FamilyToken::Generic(Family::Fantasy)),
                "system-ui" | "-apple-system" | "ui-sans-serif" => {
                    order.push(FamilyToken::Generic(Family::SansSerif))
                }
                "ui-monospace" => order.push(FamilyToken::Generic(Family::Monospace)),
                _ => {
                    let idx = names.len();
                    names.push(raw.to_string());
                    order.push(FamilyToken::Name(idx));
                }
            }
        }
        if order.is_empty() {
            order.push(FamilyToken::Generic(Family::SansSerif));
        }

        let mut families: Vec<Family<'_>> = Vec::with_capacity(order.len());
        for token in order {
            match token {
                FamilyToken::Generic(family) => families.push(family),
                FamilyToken::Name(idx) => families.push(Family::Name(names[idx].as_str())),
            }
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: if spec.bold { Weight::BOLD } else { Weight::NORMAL },
            stretch: Stretch::Normal,
            style: if spec.is_italic() {
                Style::Italic
            } else {
                Style::Normal
            },
        };
        let id = self.db.query(&query)?;
        let size = spec.size_px;
        self.db
            .with_face_data(id, |data, index| {
                let face = Face::parse(data, index).ok()?;
                face_metrics(&face, size)
            })
            .flatten()
    }
}

fn face_metrics(face: &Face<'_>, size: f32) -> Option<FontMetrics> {
    let units_per_em = face.units_per_em().max(1) as f32;
    let scale = size / units_per_em;
    let ascent = face.ascender() as f32 * scale;
    let descent = -(face.descender() as f32) * scale;
    if ascent <= 0.0 {
        return None;
    }
    let x_height = face
        .x_height()
        .filter(|value| *value > 0)
        .map(|value| value as f32 * scale)
        .unwrap_or(size * 0.5);
    Some(FontMetrics {
        ascent,
        descent: descent.max(0.0),
        height: ascent + descent.max(0.0),
        x_height,
    })
}

fn normalize_font_key(font: &str) -> String {
    let trimmed = font.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed
    }
}
