use serde::{Deserialize, Serialize};

use crate::graphics::{TextAlign, TextBaseline, TextVisuals};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: String,
    pub font_style: String,
    pub text_color: String,
    pub text_alpha: f32,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "helvetica".to_string(),
            font_size: "13px".to_string(),
            font_style: "normal".to_string(),
            text_color: "#444444".to_string(),
            text_alpha: 1.0,
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: "16px".to_string(),
            font_style: "normal".to_string(),
            text_color: "#1C2430".to_string(),
            text_alpha: 1.0,
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn visuals(&self, align: TextAlign, baseline: TextBaseline) -> TextVisuals {
        TextVisuals {
            color: self.text_color.clone(),
            alpha: self.text_alpha,
            font_style: self.font_style.clone(),
            font_size: self.font_size.clone(),
            font_family: self.font_family.clone(),
            align,
            baseline,
            ..TextVisuals::default()
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
