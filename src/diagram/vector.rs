use std::fmt::Write as _;

use anyhow::{Result, anyhow};
use plotters::prelude::*;

use super::draw::draw_diagram;
use super::layout::Diagram;
use crate::color::{FactorColors, hex};
use crate::sem::{FittedModel, ParamKind};

// ---------------------------------------------------------------------------
// SVG
// ---------------------------------------------------------------------------

/// Render `diagram` as a standalone SVG document. Labels are `<text>`
/// elements, so the viewer supplies the font.
pub fn to_svg(diagram: &Diagram, colors: &FactorColors) -> Result<String> {
    let size = (diagram.width.max(1.0) as u32, diagram.height.max(1.0) as u32);
    let mut out = String::new();
    {
        let root = SVGBackend::with_string(&mut out, size).into_drawing_area();
        draw_diagram(&root, diagram, colors, true)
            .map_err(|e| anyhow!("drawing SVG diagram: {e}"))?;
        root.present()
            .map_err(|e| anyhow!("finishing SVG diagram: {e}"))?;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Graphviz DOT
// ---------------------------------------------------------------------------

/// Graphviz source for the fitted model; layout is left to `dot`.
pub fn to_dot(fitted: &FittedModel, colors: &FactorColors) -> String {
    let model = &fitted.model;
    let mut out = String::from("digraph G {\n  overlap=scale;\n  splines=true;\n");

    for name in &model.latent {
        let _ = writeln!(
            out,
            "  {} [shape=circle, style=filled, fillcolor=\"{}\"];",
            quote(name),
            hex(colors.factor(name)),
        );
    }
    for name in &model.observed {
        let factor = model
            .params
            .iter()
            .find(|p| p.kind == ParamKind::Loading && p.lval == *name)
            .map(|p| p.rval.as_str());
        let _ = writeln!(
            out,
            "  {} [shape=box, style=filled, fillcolor=\"{}\"];",
            quote(name),
            hex(colors.indicator(factor)),
        );
    }

    for (p, est) in model.params.iter().zip(&fitted.estimates) {
        if matches!(p.kind, ParamKind::Loading | ParamKind::Regression) {
            let _ = writeln!(
                out,
                "  {} -> {} [label=\"{est:.3}\"];",
                quote(&p.rval),
                quote(&p.lval),
            );
        }
    }

    out.push_str("}\n");
    out
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}
