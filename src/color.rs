use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct pastel colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.65, 0.82);
            let rgb: Srgb = hsl.into_color();
            RGBColor(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Hex form used by DOT output, e.g. `#a1b2c3`.
pub fn hex(color: RGBColor) -> String {
    let RGBColor(r, g, b) = color;
    format!("#{r:02x}{g:02x}{b:02x}")
}

// ---------------------------------------------------------------------------
// Factor colours: latent factor name → fill colour
// ---------------------------------------------------------------------------

/// Assigns each latent factor a distinct fill; its indicators share a
/// lighter tint of the same hue.
#[derive(Debug, Clone)]
pub struct FactorColors {
    mapping: BTreeMap<String, RGBColor>,
    default_color: RGBColor,
}

impl FactorColors {
    pub fn new(factors: &[String]) -> Self {
        let mapping = factors
            .iter()
            .cloned()
            .zip(generate_palette(factors.len()))
            .collect();
        FactorColors {
            mapping,
            default_color: RGBColor(235, 235, 235),
        }
    }

    /// Fill for a latent factor.
    pub fn factor(&self, name: &str) -> RGBColor {
        self.mapping
            .get(name)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Fill for an indicator of `factor` (or the default when unattached).
    pub fn indicator(&self, factor: Option<&str>) -> RGBColor {
        match factor.and_then(|f| self.mapping.get(f)) {
            Some(c) => tint(*c, 0.6),
            None => self.default_color,
        }
    }
}

fn tint(color: RGBColor, amount: f32) -> RGBColor {
    let mix = |c: u8| (c as f32 + (255.0 - c as f32) * amount) as u8;
    let RGBColor(r, g, b) = color;
    RGBColor(mix(r), mix(g), mix(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_distinct_colours() {
        let p = generate_palette(3);
        assert_eq!(p.len(), 3);
        assert_ne!(p[0], p[1]);
        assert_ne!(p[1], p[2]);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn indicators_are_lighter_than_their_factor() {
        let colors = FactorColors::new(&["F".to_string()]);
        let sum = |RGBColor(r, g, b): RGBColor| r as u32 + g as u32 + b as u32;
        assert!(sum(colors.indicator(Some("F"))) > sum(colors.factor("F")));
        assert_eq!(colors.indicator(None), colors.factor("unknown"));
    }

    #[test]
    fn hex_is_lowercase_six_digits() {
        assert_eq!(hex(RGBColor(255, 0, 16)), "#ff0010");
    }
}
