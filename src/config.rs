use crate::engine::{CommandSpec, EngineConfig};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 400.0,
            height: 200.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Use size-proportional font metrics instead of querying system fonts.
    pub fast_text_metrics: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub render: RenderConfig,
    pub engine: EngineConfig,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            render,
            engine: EngineConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextStyleFile {
    font_family: Option<String>,
    font_size: Option<String>,
    font_style: Option<String>,
    color: Option<String>,
    alpha: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderFile {
    width: Option<f32>,
    height: Option<f32>,
    background: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineFile {
    tex: Option<CommandSpec>,
    mathml: Option<CommandSpec>,
    ascii: Option<CommandSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    text_style: Option<TextStyleFile>,
    render: Option<RenderFile>,
    engine: Option<EngineFile>,
    fast_text_metrics: Option<bool>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "modern" => config.theme = Theme::modern(),
            "classic" | "default" => config.theme = Theme::classic(),
            other => log::warn!("unknown theme {other:?}, keeping default"),
        }
        config.render.background = config.theme.background.clone();
    }

    if let Some(style) = parsed.text_style {
        if let Some(v) = style.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = style.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = style.font_style {
            config.theme.font_style = v;
        }
        if let Some(v) = style.color {
            config.theme.text_color = v;
        }
        if let Some(v) = style.alpha {
            config.theme.text_alpha = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.background {
            config.render.background = v;
        }
    }

    if let Some(engine) = parsed.engine {
        if let Some(v) = engine.tex {
            config.engine.tex = v;
        }
        if let Some(v) = engine.mathml {
            config.engine.mathml = v;
        }
        if let Some(v) = engine.ascii {
            config.engine.ascii = v;
        }
    }

    if let Some(v) = parsed.fast_text_metrics {
        config.metrics.fast_text_metrics = v;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_keeps_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.theme, Theme::classic());
        assert_eq!(config.engine, EngineConfig::default());
        assert!(!config.metrics.fast_text_metrics);
    }

    #[test]
    fn overrides_apply() {
        let config = parse_config(
            r##"{
                "theme": "modern",
                "textStyle": { "fontSize": "20px", "color": "#ff0000" },
                "render": { "width": 640 },
                "engine": { "tex": { "program": "npx", "args": ["tex2svg"] } },
                "fastTextMetrics": true
            }"##,
        )
        .unwrap();
        assert_eq!(config.theme.font_size, "20px");
        assert_eq!(config.theme.text_color, "#ff0000");
        assert_eq!(config.theme.font_family, Theme::modern().font_family);
        assert_eq!(config.render.width, 640.0);
        assert_eq!(config.render.height, RenderConfig::default().height);
        assert_eq!(config.engine.tex.program, "npx");
        assert_eq!(config.engine.tex.args, vec!["tex2svg".to_string()]);
        assert_eq!(config.engine.mathml.program, "mml2svg");
        assert!(config.metrics.fast_text_metrics);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_config("{ theme: ").is_err());
    }
}
