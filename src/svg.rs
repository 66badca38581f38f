use crate::error::EngineError;
use crate::units::{Length, parse_length};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// An `<svg>` element produced by a typesetting engine.
///
/// Engines size their output in `ex`, so the declared width and height are
/// kept as lengths and converted by the caller with the active x-height.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorGraphic {
    pub width: Option<Length>,
    pub height: Option<Length>,
    pub vertical_align: Option<Length>,
    pub view_box: Option<String>,
    content: String,
}

impl VectorGraphic {
    /// Extracts the graphic from engine output. The output is either a bare
    /// `<svg>` or a container whose first child element is the `<svg>`.
    pub fn from_container(markup: &str) -> Result<Self, EngineError> {
        let doc = roxmltree::Document::parse(markup)
            .map_err(|err| EngineError::MalformedOutput(err.to_string()))?;
        let root = doc.root_element();
        let svg = if root.has_tag_name("svg") {
            root
        } else {
            root.children()
                .find(|node| node.is_element())
                .ok_or_else(|| EngineError::MalformedOutput("empty container".to_string()))?
        };
        if !svg.has_tag_name("svg") {
            return Err(EngineError::MalformedOutput(format!(
                "expected <svg>, found <{}>",
                svg.tag_name().name()
            )));
        }

        let content = match (svg.first_child(), svg.last_child()) {
            (Some(first), Some(last)) => markup[first.range().start..last.range().end].to_string(),
            _ => String::new(),
        };
        let vertical_align = svg.attribute("style").and_then(style_vertical_align);

        Ok(Self {
            width: svg.attribute("width").and_then(parse_length),
            height: svg.attribute("height").and_then(parse_length),
            vertical_align,
            view_box: svg.attribute("viewBox").map(str::to_string),
            content,
        })
    }

    /// Standalone document for the graphic, stretched to `width` x `height`.
    pub fn to_document(&self, width: f32, height: f32) -> String {
        let view_box = self
            .view_box
            .as_deref()
            .map(|vb| format!(" viewBox=\"{vb}\""))
            .unwrap_or_default();
        format!(
            "<svg xmlns=\"{SVG_NS}\" xmlns:xlink=\"{XLINK_NS}\" width=\"{width:.3}\" height=\"{height:.3}\"{view_box} preserveAspectRatio=\"none\">{}</svg>",
            self.content
        )
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

fn style_vertical_align(style: &str) -> Option<Length> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("vertical-align") {
            parse_length(value)
        } else {
            None
        }
    })
}
