use anyhow::Result;
use resvg::tiny_skia;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::{StateStack, Surface, Transform, text_element};
use crate::error::RenderError;
use crate::graphics::{Size, TextAlign, TextBaseline};
use crate::svg::VectorGraphic;

/// Raster surface backed by a `tiny-skia` pixmap.
pub struct PixmapSurface {
    pixmap: tiny_skia::Pixmap,
    states: StateStack,
    fontdb: Option<Arc<usvg::fontdb::Database>>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = tiny_skia::Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;
        Ok(Self {
            pixmap,
            states: StateStack::default(),
            fontdb: None,
        })
    }

    pub fn fill_background(&mut self, color: &str) {
        match svgtypes::Color::from_str(color) {
            Ok(c) => self
                .pixmap
                .fill(tiny_skia::Color::from_rgba8(c.red, c.green, c.blue, c.alpha)),
            Err(err) => log::warn!("ignoring background {color:?}: {err}"),
        }
    }

    pub fn pixmap(&self) -> &tiny_skia::Pixmap {
        &self.pixmap
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        Ok(self.pixmap.encode_png()?)
    }

    pub fn save_png(&self, output: &Path) -> Result<()> {
        self.pixmap.save_png(output)?;
        Ok(())
    }

    fn options(&mut self) -> usvg::Options<'static> {
        let fontdb = self
            .fontdb
            .get_or_insert_with(|| {
                let mut db = usvg::fontdb::Database::new();
                db.load_system_fonts();
                Arc::new(db)
            })
            .clone();
        usvg::Options {
            fontdb,
            ..usvg::Options::default()
        }
    }

    fn render_document(&mut self, svg: &str, ts: Transform) -> Result<(), RenderError> {
        let opt = self.options();
        let tree = usvg::Tree::from_str(svg, &opt)
            .map_err(|err| RenderError::Compositor(err.to_string()))?;
        let transform = tiny_skia::Transform::from_row(ts.a, ts.b, ts.c, ts.d, ts.e, ts.f);
        let mut pixmap_mut = self.pixmap.as_mut();
        resvg::render(&tree, transform, &mut pixmap_mut);
        Ok(())
    }
}

impl Surface for PixmapSurface {
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
        let svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\">{element}</svg>",
            self.pixmap.width(),
            self.pixmap.height()
        );
        if let Err(err) = self.render_document(&svg, Transform::identity()) {
            log::warn!("failed to rasterize text {text:?}: {err}");
        }
    }

    fn draw_svg(&mut self, graphic: &VectorGraphic, size: Size) -> Result<(), RenderError> {
        let Size { width, height } = size;
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(RenderError::InvalidGraphic(format!(
                "cannot composite at {width}x{height}"
            )));
        }
        let ts = self.states.current().transform;
        self.render_document(&graphic.to_document(width, height), ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composites_graphic_into_pixmap() {
        let graphic = VectorGraphic::from_container(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="2ex" height="2ex" viewBox="0 0 10 10"><rect width="10" height="10" fill="#ff0000"/></svg>"##,
        )
        .unwrap();
        let mut surface = PixmapSurface::new(20, 20).unwrap();
        surface.translate(5.0, 5.0);
        surface
            .draw_svg(
                &graphic,
                Size {
                    width: 10.0,
                    height: 10.0,
                },
            )
            .unwrap();
        let pixel = surface.pixmap().pixel(10, 10).unwrap();
        assert_eq!(pixel.red(), 255);
        assert_eq!(pixel.alpha(), 255);
        let outside = surface.pixmap().pixel(1, 1).unwrap();
        assert_eq!(outside.alpha(), 0);
    }

    #[test]
    fn background_fill() {
        let mut surface = PixmapSurface::new(4, 4).unwrap();
        surface.fill_background("#0000ff");
        let pixel = surface.pixmap().pixel(0, 0).unwrap();
        assert_eq!(pixel.blue(), 255);
        assert!(!surface.encode_png().unwrap().is_empty());
    }
}
