/// Path diagrams of fitted models.
///
/// `layout` positions factors, indicators and labelled paths once; `draw`
/// paints that layout onto a plotters backend, which `raster` encodes as
/// PNG and `vector` as SVG. DOT output skips the layout and leaves
/// placement to Graphviz.
pub mod draw;
pub mod font;
pub mod layout;
pub mod raster;
pub mod vector;

use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::color::FactorColors;
use crate::sem::{FittedModel, SemError};

/// Render the path diagram of `fitted` to `path`; format follows the extension.
pub fn semplot(fitted: &FittedModel, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let colors = FactorColors::new(&fitted.model.latent);

    match ext.as_str() {
        "png" => raster::write_png(&layout::layout(fitted), &colors, path)?,
        "svg" => write_text(path, &vector::to_svg(&layout::layout(fitted), &colors)?)?,
        "dot" | "gv" => write_text(path, &vector::to_dot(fitted, &colors))?,
        other => return Err(SemError::UnsupportedDiagram(other.to_string()).into()),
    }

    info!("diagram written to {}", path.display());
    Ok(())
}

fn write_text(path: &Path, body: &str) -> Result<()> {
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}
