use std::io::IsTerminal;

use crate::sem::{FitStatistics, ParameterEstimate};

const GUTTER: usize = 3;

/// Parameter estimates as an aligned text table.
pub fn format_estimates(rows: &[ParameterEstimate]) -> String {
    let header = [
        "lval", "op", "rval", "Estimate", "Std. Err", "z-value", "p-value",
    ];
    let body: Vec<[String; 7]> = rows
        .iter()
        .map(|r| {
            [
                r.lval.clone(),
                r.op.to_string(),
                r.rval.clone(),
                format_num(r.estimate),
                format_opt(r.std_err),
                format_opt(r.z_value),
                format_opt(r.p_value),
            ]
        })
        .collect();
    // Names left-aligned, numbers right-aligned.
    let right_aligned = [false, false, false, true, true, true, true];
    render(&header, &body, &right_aligned)
}

/// Fit statistics as a two-column `name  value` table.
pub fn format_stats(stats: &FitStatistics) -> String {
    let header = ["Statistic", "Value"];
    let body: Vec<[String; 2]> = stats
        .rows()
        .into_iter()
        .map(|(name, value)| [name.to_string(), format_num(value)])
        .collect();
    render(&header, &body, &[false, true])
}

fn render<const N: usize>(header: &[&str; N], body: &[[String; N]], right: &[bool; N]) -> String {
    let colors = Colors::enabled();

    let mut widths = [0usize; N];
    for (i, h) in header.iter().enumerate() {
        widths[i] = display_width(h);
    }
    for row in body {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let sep = " ".repeat(GUTTER);
    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| pad(c, widths[i], right[i]))
            .collect::<Vec<_>>()
            .join(sep.as_str())
            .trim_end()
            .to_string()
    };

    let total: usize = widths.iter().sum::<usize>() + GUTTER * (N.saturating_sub(1));
    let mut lines = Vec::with_capacity(body.len() + 2);
    lines.push(colors.bold(&line(header.to_vec())));
    lines.push("-".repeat(total));
    for row in body {
        lines.push(line(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

fn pad(cell: &str, width: usize, right: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(display_width(cell)));
    if right {
        format!("{fill}{cell}")
    } else {
        format!("{cell}{fill}")
    }
}

/// Terminal columns taken by `s`; CJK characters count double.
fn display_width(s: &str) -> usize {
    s.chars()
        .map(|c| match c as u32 {
            0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF | 0xFF00..=0xFF60 => 2,
            _ => 1,
        })
        .sum()
}

fn format_num(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        (if v > 0.0 { "inf" } else { "-inf" }).to_string()
    } else {
        format!("{v:.6}")
    }
}

fn format_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), format_num)
}

struct Colors {
    enabled: bool,
}

impl Colors {
    fn enabled() -> Self {
        let force = std::env::var("CLICOLOR_FORCE")
            .ok()
            .filter(|v| v != "0")
            .is_some();
        let no_color = std::env::var_os("NO_COLOR").is_some();
        let clicolor_zero = std::env::var("CLICOLOR")
            .ok()
            .map(|v| v == "0")
            .unwrap_or(false);
        let term = std::io::stdout().is_terminal();
        let enabled = if force {
            true
        } else if no_color || clicolor_zero {
            false
        } else {
            term
        };
        Colors { enabled }
    }

    fn bold(&self, s: &str) -> String {
        if self.enabled {
            format!("\x1b[1m{}\x1b[0m", s)
        } else {
            s.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lval: &str, op: &'static str, rval: &str, est: f64, se: Option<f64>) -> ParameterEstimate {
        ParameterEstimate {
            lval: lval.to_string(),
            op,
            rval: rval.to_string(),
            estimate: est,
            std_err: se,
            z_value: se.map(|s| est / s),
            p_value: se.map(|_| 0.01),
        }
    }

    #[test]
    fn estimates_table_has_header_and_rows() {
        let out = format_estimates(&[
            row("V10", "~", "InterestInGrad", 1.0, None),
            row("V11", "~", "InterestInGrad", 0.8123, Some(0.05)),
        ]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Std. Err"));
        assert!(lines[1].chars().all(|c| c == '-'));
        assert!(lines[2].contains(" - "));
        assert!(lines[3].contains("0.812300"));
        assert!(lines[3].contains("16.246000"));
    }

    #[test]
    fn number_columns_are_right_aligned() {
        let out = format_estimates(&[
            row("a", "~", "F", 10.0, Some(1.0)),
            row("b", "~", "F", 1.0, Some(1.0)),
        ]);
        let lines: Vec<&str> = out.lines().collect();
        let end_a = lines[2].find("10.000000").unwrap() + "10.000000".len();
        let end_b = lines[3].find("1.000000").unwrap() + "1.000000".len();
        assert_eq!(end_a, end_b);
    }

    #[test]
    fn cjk_names_take_two_columns() {
        assert_eq!(display_width("関心"), 4);
        assert_eq!(display_width("V1"), 2);
        assert_eq!(pad("関心", 6, false), "関心  ");
    }

    #[test]
    fn special_values_are_spelled_out() {
        assert_eq!(format_num(f64::NAN), "nan");
        assert_eq!(format_num(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_opt(None), "-");
    }
}
