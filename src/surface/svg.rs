use super::{StateStack, Surface, escape_xml, text_element};
use crate::error::RenderError;
use crate::graphics::{Size, TextAlign, TextBaseline};
use crate::svg::VectorGraphic;

/// Vector surface that accumulates SVG markup.
#[derive(Debug)]
pub struct SvgSurface {
    width: f32,
    height: f32,
    background: Option<String>,
    body: String,
    states: StateStack,
}

impl SvgSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            background: None,
            body: String::new(),
            states: StateStack::default(),
        }
    }

    pub fn with_background(mut self, background: &str) -> Self {
        self.background = Some(background.to_string());
        self
    }

    /// Markup drawn so far, without the document wrapper.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn finish(self) -> String {
        let width = self.width;
        let height = self.height;
        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
        ));
        if let Some(background) = &self.background {
            svg.push_str(&format!(
                "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
                escape_xml(background)
            ));
        }
        svg.push_str(&self.body);
        svg.push_str("</svg>");
        svg
    }
}

impl Surface for SvgSurface {
    fn save(&mut self) {
        self.states.save();
    }

    fn restore(&mut self) {
        self.states.restore();
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        let state = self.states.current_mut();
        state.transform = state.transform.translate(dx, dy);
    }

    fn rotate(&mut self, angle: f32) {
        let state = self.states.current_mut();
        state.transform = state.transform.rotate(angle);
    }

    fn set_fill_style(&mut self, color: &str) {
        self.states.current_mut().fill_style = color.to_string();
    }

    fn set_font(&mut self, font: &str) {
        self.states.current_mut().font = font.to_string();
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.states.current_mut().text_align = align;
    }

    fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.states.current_mut().text_baseline = baseline;
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32) {
        let element = text_element(self.states.current(), text, x, y);
        self.body.push_str(&element);
    }

    fn draw_svg(&mut self, graphic: &VectorGraphic, size: Size) -> Result<(), RenderError> {
        let Size { width, height } = size;
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(RenderError::InvalidGraphic(format!(
                "cannot composite at {width}x{height}"
            )));
        }
        let transform = self.states.current().transform;
        self.body.push_str(&format!(
            "<g transform=\"{}\">{}</g>",
            transform.to_svg_attr(),
            graphic.to_document(width, height)
        ));
        Ok(())
    }
}
