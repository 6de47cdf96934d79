use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::font::FAMILY;
use super::layout::{Diagram, Edge, FONT_SIZE, Node, text_width};
use crate::color::FactorColors;

pub const INK: RGBColor = RGBColor(40, 40, 40);
pub const EDGE: RGBColor = RGBColor(70, 70, 90);
const STROKE: u32 = 2;
const ARROW_LEN: f32 = 14.0;
const ARROW_HALF_WIDTH: f32 = 6.0;
const ELLIPSE_SEGMENTS: usize = 64;

type Point = (i32, i32);

/// Draw `diagram` onto `root`. Edge labels go last so they sit on top of
/// crossing lines.
///
/// With `labels` off no text is emitted; the white label plates are still
/// drawn so the picture keeps its shape.
pub fn draw_diagram<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    diagram: &Diagram,
    colors: &FactorColors,
    labels: bool,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;
    let text = TextStyle::from((FAMILY, f64::from(FONT_SIZE)).into_font())
        .color(&INK)
        .pos(Pos::new(HPos::Center, VPos::Center));

    for edge in &diagram.edges {
        let (start, end) = endpoints(diagram, edge);
        root.draw(&PathElement::new(
            vec![point(start), point(end)],
            EDGE.stroke_width(STROKE),
        ))?;
        if let Some(head) = arrow_head(start, end) {
            root.draw(&Polygon::new(head, EDGE.filled()))?;
        }
    }

    for node in &diagram.nodes {
        let fill = if node.latent {
            colors.factor(&node.name)
        } else {
            colors.indicator(node.factor.as_deref())
        };
        let mut shape = outline(node);
        root.draw(&Polygon::new(shape.clone(), fill.filled()))?;
        shape.push(shape[0]);
        root.draw(&PathElement::new(shape, INK.stroke_width(STROKE)))?;
        if labels {
            root.draw(&Text::new(
                node.name.as_str(),
                point((node.x, node.y)),
                text.clone(),
            ))?;
        }
    }

    for edge in &diagram.edges {
        let ((sx, sy), (ex, ey)) = endpoints(diagram, edge);
        let (mx, my) = ((sx + ex) / 2.0, (sy + ey) / 2.0);
        let (w, h) = (text_width(&edge.label) + 6.0, FONT_SIZE + 4.0);
        root.draw(&Rectangle::new(
            [
                point((mx - w / 2.0, my - h / 2.0)),
                point((mx + w / 2.0, my + h / 2.0)),
            ],
            WHITE.filled(),
        ))?;
        if labels {
            root.draw(&Text::new(edge.label.as_str(), point((mx, my)), text.clone()))?;
        }
    }
    Ok(())
}

fn endpoints(diagram: &Diagram, edge: &Edge) -> ((f32, f32), (f32, f32)) {
    let (from, to) = (&diagram.nodes[edge.from], &diagram.nodes[edge.to]);
    (
        from.boundary_toward(to.x, to.y),
        to.boundary_toward(from.x, from.y),
    )
}

fn point((x, y): (f32, f32)) -> Point {
    (x.round() as i32, y.round() as i32)
}

/// Ellipse for a latent factor, box for an observed variable.
fn outline(node: &Node) -> Vec<Point> {
    let (a, b) = (node.w / 2.0, node.h / 2.0);
    if node.latent {
        (0..ELLIPSE_SEGMENTS)
            .map(|i| {
                let t = i as f32 / ELLIPSE_SEGMENTS as f32 * std::f32::consts::TAU;
                point((node.x + a * t.cos(), node.y + b * t.sin()))
            })
            .collect()
    } else {
        vec![
            point((node.x - a, node.y - b)),
            point((node.x + a, node.y - b)),
            point((node.x + a, node.y + b)),
            point((node.x - a, node.y + b)),
        ]
    }
}

/// Triangle pointing at `tip` along `from -> tip`; `None` for a zero-length edge.
fn arrow_head(from: (f32, f32), tip: (f32, f32)) -> Option<Vec<Point>> {
    let (dx, dy) = (tip.0 - from.0, tip.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return None;
    }
    let (ux, uy) = (dx / len, dy / len);
    let base = (tip.0 - ux * ARROW_LEN, tip.1 - uy * ARROW_LEN);
    Some(vec![
        point(tip),
        point((base.0 - uy * ARROW_HALF_WIDTH, base.1 + ux * ARROW_HALF_WIDTH)),
        point((base.0 + uy * ARROW_HALF_WIDTH, base.1 - ux * ARROW_HALF_WIDTH)),
    ])
}
