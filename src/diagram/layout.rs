use std::collections::BTreeMap;

use crate::sem::{FittedModel, ParamKind};

/// Label font size in pixels.
pub const FONT_SIZE: f32 = 16.0;

const MARGIN: f32 = 40.0;
const NODE_GAP: f32 = 60.0;
const INDICATOR_GAP: f32 = 16.0;
const STAGGER: f32 = 90.0;
const ROW_GAP: f32 = 170.0;

/// A positioned variable. `x`/`y` are the centre.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub latent: bool,
    /// Factor this node indicates, for colouring.
    pub factor: Option<String>,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Node {
    /// Where the segment from the centre toward `(tx, ty)` leaves the shape.
    pub fn boundary_toward(&self, tx: f32, ty: f32) -> (f32, f32) {
        let (dx, dy) = (tx - self.x, ty - self.y);
        if dx == 0.0 && dy == 0.0 {
            return (self.x, self.y);
        }
        let (a, b) = (self.w / 2.0, self.h / 2.0);
        let t = if self.latent {
            1.0 / ((dx / a).powi(2) + (dy / b).powi(2)).sqrt()
        } else {
            let tx = if dx != 0.0 { a / dx.abs() } else { f32::INFINITY };
            let ty = if dy != 0.0 { b / dy.abs() } else { f32::INFINITY };
            tx.min(ty)
        };
        (self.x + dx * t, self.y + dy * t)
    }
}

/// A directed, labelled edge between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub label: String,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagram {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub width: f32,
    pub height: f32,
}

/// Approximate pixel width of `text` at [`FONT_SIZE`]: Latin glyphs take
/// about 0.6 em, CJK and other wide glyphs a full em.
pub fn text_width(text: &str) -> f32 {
    let ems: f32 = text
        .chars()
        .map(|c| if is_wide(c) { 1.0 } else { 0.6 })
        .sum();
    ems * FONT_SIZE
}

fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6)
}

/// Place the model's variables and paths.
///
/// Structural variables (latent factors and observed regressors) sit in one
/// row ordered by regression depth, alternate ones raised so that paths
/// skipping a neighbour do not cross it. Indicators sit in a row below
/// their factor.
pub fn layout(fitted: &FittedModel) -> Diagram {
    let model = &fitted.model;
    let text_h = FONT_SIZE;

    // indicator → factor, first factor wins
    let mut indicator_of: BTreeMap<&str, &str> = BTreeMap::new();
    let mut indicators: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut predictors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for p in &model.params {
        match p.kind {
            ParamKind::Loading => {
                if !indicator_of.contains_key(p.lval.as_str()) {
                    indicator_of.insert(&p.lval, &p.rval);
                    indicators.entry(&p.rval).or_default().push(&p.lval);
                }
            }
            ParamKind::Regression => {
                predictors.entry(&p.lval).or_default().push(&p.rval);
            }
            _ => {}
        }
    }

    let structural: Vec<&str> = model
        .variables()
        .map(String::as_str)
        .filter(|v| !indicator_of.contains_key(v) || model.is_latent(v))
        .collect();
    let depth = regression_depth(&structural, &predictors);
    let mut order: Vec<(usize, &str)> = structural.iter().map(|&v| (depth[v], v)).collect();
    order.sort_by_key(|&(d, _)| d);

    let mut nodes: Vec<Node> = Vec::new();
    let mut cursor = MARGIN;
    let base_y = MARGIN + STAGGER + text_h * 2.0;
    let indicator_y = base_y + ROW_GAP;

    for (slot, &(_, name)) in order.iter().enumerate() {
        let latent = model.is_latent(name);
        let (w, h) = node_size(name, latent);
        let children: Vec<(&str, f32, f32)> = indicators
            .get(name)
            .map(|list| {
                list.iter()
                    .filter(|c| !structural.contains(c))
                    .map(|&c| {
                        let (cw, ch) = node_size(c, false);
                        (c, cw, ch)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let row_w: f32 = children.iter().map(|c| c.1).sum::<f32>()
            + INDICATOR_GAP * children.len().saturating_sub(1) as f32;
        let slot_w = w.max(row_w);
        let centre = cursor + slot_w / 2.0;
        let y = if slot % 2 == 1 { base_y - STAGGER } else { base_y };

        nodes.push(Node {
            name: name.to_string(),
            latent,
            factor: if latent { Some(name.to_string()) } else { None },
            x: centre,
            y,
            w,
            h,
        });

        let mut cx = centre - row_w / 2.0;
        for (child, cw, ch) in children {
            nodes.push(Node {
                name: child.to_string(),
                latent: false,
                factor: Some(name.to_string()),
                x: cx + cw / 2.0,
                y: indicator_y,
                w: cw,
                h: ch,
            });
            cx += cw + INDICATOR_GAP;
        }
        cursor += slot_w + NODE_GAP;
    }

    let index: BTreeMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.name.as_str(), i))
        .collect();
    let edges: Vec<Edge> = model
        .params
        .iter()
        .zip(&fitted.estimates)
        .filter_map(|(p, est)| {
            let (from, to) = match p.kind {
                ParamKind::Loading | ParamKind::Regression => (&p.rval, &p.lval),
                _ => return None,
            };
            Some(Edge {
                from: *index.get(from.as_str())?,
                to: *index.get(to.as_str())?,
                label: format!("{est:.2}"),
                kind: p.kind,
            })
        })
        .collect();

    let width = nodes
        .iter()
        .map(|n| n.x + n.w / 2.0)
        .fold(0.0f32, f32::max)
        + MARGIN;
    let height = nodes
        .iter()
        .map(|n| n.y + n.h / 2.0)
        .fold(0.0f32, f32::max)
        + MARGIN;

    Diagram {
        nodes,
        edges,
        width: width.ceil(),
        height: height.ceil(),
    }
}

fn node_size(name: &str, latent: bool) -> (f32, f32) {
    let text_h = FONT_SIZE;
    if latent {
        (text_width(name) + 56.0, text_h + 44.0)
    } else {
        (text_width(name) + 24.0, text_h + 20.0)
    }
}

/// Longest chain of regressions leading into each structural variable.
fn regression_depth<'a>(
    structural: &[&'a str],
    predictors: &BTreeMap<&str, Vec<&str>>,
) -> BTreeMap<&'a str, usize> {
    let mut depth: BTreeMap<&str, usize> = structural.iter().map(|&v| (v, 0)).collect();
    // Bounded relaxation; a cyclic model simply stops deepening.
    for _ in 0..structural.len() {
        let mut changed = false;
        for &v in structural {
            let d = predictors
                .get(v)
                .map(|ps| {
                    ps.iter()
                        .filter_map(|p| depth.get(*p))
                        .map(|d| d + 1)
                        .max()
                        .unwrap_or(0)
                })
                .unwrap_or(0);
            if d > depth[v] {
                depth.insert(v, d);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(latent: bool) -> Node {
        Node {
            name: "n".into(),
            latent,
            factor: None,
            x: 100.0,
            y: 100.0,
            w: 80.0,
            h: 40.0,
        }
    }

    #[test]
    fn box_boundary_hits_the_nearest_side() {
        let n = node(false);
        assert_eq!(n.boundary_toward(300.0, 100.0), (140.0, 100.0));
        assert_eq!(n.boundary_toward(100.0, 0.0), (100.0, 80.0));
    }

    #[test]
    fn ellipse_boundary_lies_on_the_ellipse() {
        let n = node(true);
        let (x, y) = n.boundary_toward(180.0, 160.0);
        let v = ((x - 100.0) / 40.0).powi(2) + ((y - 100.0) / 20.0).powi(2);
        assert!((v - 1.0).abs() < 1e-4);
    }

    #[test]
    fn depth_follows_regression_chains() {
        let structural = ["A", "B", "C"];
        let mut preds: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        preds.insert("C", vec!["A", "B"]);
        preds.insert("B", vec!["A"]);
        let d = regression_depth(&structural, &preds);
        assert_eq!(d["A"], 0);
        assert_eq!(d["B"], 1);
        assert_eq!(d["C"], 2);
    }

    #[test]
    fn cjk_labels_are_wider_than_latin_ones() {
        assert_eq!(text_width("関心"), 2.0 * FONT_SIZE);
        assert!((text_width("ab") - 1.2 * FONT_SIZE).abs() < 1e-4);
        assert!(text_width("将来に対する関心") > text_width("Interest"));
    }
}
