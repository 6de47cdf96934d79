use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;

use super::draw::draw_diagram;
use super::font::ensure_font;
use super::layout::Diagram;
use crate::color::FactorColors;

/// Render `diagram` to a PNG file, replacing any existing file.
pub fn write_png(diagram: &Diagram, colors: &FactorColors, path: &Path) -> Result<()> {
    let img = render(diagram, colors)?;
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing PNG {}", path.display()))
}

/// Rasterise `diagram` into an RGB image. Labels need a registered font and
/// are left out otherwise.
pub fn render(diagram: &Diagram, colors: &FactorColors) -> Result<RgbImage> {
    let (width, height) = (diagram.width.max(1.0) as u32, diagram.height.max(1.0) as u32);
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_diagram(&root, diagram, colors, ensure_font())
            .map_err(|e| anyhow!("drawing PNG diagram: {e}"))?;
        root.present()
            .map_err(|e| anyhow!("finishing PNG diagram: {e}"))?;
    }
    RgbImage::from_raw(width, height, buffer).context("bitmap does not match the diagram size")
}
