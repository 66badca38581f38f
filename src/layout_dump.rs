use crate::dialect::{Dialect, DialectKind};
use crate::graphics::{BBox, GraphicsBox, Point, Position, Size};
use crate::math_box::MathBox;
use crate::provider::ProviderStatus;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub dialect: DialectKind,
    pub formula: String,
    pub styled_formula: String,
    pub font: String,
    pub color: String,
    pub provider: ProviderStatus,
    pub position: Position,
    pub angle: f32,
    pub size: Size,
    pub origin: Point,
    pub valign: f32,
    pub bbox: BBox,
}

impl LayoutDump {
    pub fn from_box<D: Dialect>(math_box: &MathBox<D>) -> Self {
        let geometry = math_box.geometry();
        LayoutDump {
            dialect: math_box.dialect().kind(),
            formula: math_box.text().to_string(),
            styled_formula: math_box.styled_formula(),
            font: math_box.font().to_string(),
            color: math_box.color().to_string(),
            provider: math_box.provider().status(),
            position: math_box.position(),
            angle: math_box.angle(),
            size: geometry.size,
            origin: geometry.origin,
            valign: geometry.valign,
            bbox: geometry.rect.bounds(),
        }
    }
}

pub fn write_layout_dump<D: Dialect>(path: &Path, math_box: &MathBox<D>) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_box(math_box);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
