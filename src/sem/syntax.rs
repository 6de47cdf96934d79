use std::fmt;

use super::error::{Result, SemError};

// ---------------------------------------------------------------------------
// Relation – one `lhs op term` statement
// ---------------------------------------------------------------------------

/// The three relation operators of the description language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=~`: latent factor measured by an indicator.
    Measurement,
    /// `~`: regression of the left side on the right side.
    Regression,
    /// `~~`: variance or covariance.
    Covariance,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Measurement => "=~",
            Operator::Regression => "~",
            Operator::Covariance => "~~",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single parsed relation. `fixed` is set when the right-hand term
/// carried a numeric multiplier such as `0.5*V4`.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub lhs: String,
    pub op: Operator,
    pub rhs: String,
    pub fixed: Option<f64>,
    pub line: usize,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a model description into its relations, in source order.
///
/// ```text
/// F1 =~ a + b + c      # measurement
/// F2 ~ F1 + 0.5*x      # regression, second path fixed at 0.5
/// a ~~ b               # residual covariance
/// ```
pub fn parse(text: &str) -> Result<Vec<Relation>> {
    let mut relations: Vec<Relation> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let (lhs_text, op, rhs_text) = split_operator(line).ok_or_else(|| {
            syntax_error(line_no, "expected one of '=~', '~~' or '~'", line)
        })?;

        let lhs_names = lhs_text
            .split(',')
            .map(|s| parse_identifier(s.trim(), line_no))
            .collect::<Result<Vec<_>>>()?;

        let terms = rhs_text
            .split('+')
            .map(|s| parse_term(s.trim(), line_no))
            .collect::<Result<Vec<_>>>()?;

        for lhs in &lhs_names {
            for (rhs, fixed) in &terms {
                if op == Operator::Regression && lhs == rhs {
                    return Err(syntax_error(line_no, "variable regressed on itself", line));
                }
                let duplicate = relations.iter().any(|r| {
                    r.op == op
                        && ((r.lhs == *lhs && r.rhs == *rhs)
                            || (op == Operator::Covariance && r.lhs == *rhs && r.rhs == *lhs))
                });
                if duplicate {
                    return Err(syntax_error(line_no, "duplicate relation", line));
                }
                relations.push(Relation {
                    lhs: lhs.clone(),
                    op,
                    rhs: rhs.clone(),
                    fixed: *fixed,
                    line: line_no,
                });
            }
        }
    }

    if relations.is_empty() {
        return Err(syntax_error(0, "description declares no relations", text.trim()));
    }
    Ok(relations)
}

fn split_operator(line: &str) -> Option<(&str, Operator, &str)> {
    for (token, op) in [
        ("=~", Operator::Measurement),
        ("~~", Operator::Covariance),
        ("~", Operator::Regression),
    ] {
        if let Some((lhs, rhs)) = line.split_once(token) {
            return Some((lhs.trim(), op, rhs.trim()));
        }
    }
    None
}

fn parse_term(term: &str, line: usize) -> Result<(String, Option<f64>)> {
    match term.split_once('*') {
        Some((coef, name)) => {
            let value = coef
                .trim()
                .parse::<f64>()
                .map_err(|_| syntax_error(line, "expected a numeric multiplier", coef.trim()))?;
            Ok((parse_identifier(name.trim(), line)?, Some(value)))
        }
        None => Ok((parse_identifier(term, line)?, None)),
    }
}

fn parse_identifier(name: &str, line: usize) -> Result<String> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(name.to_string())
    } else {
        Err(syntax_error(line, "invalid variable name", name))
    }
}

fn syntax_error(line: usize, message: &str, text: &str) -> SemError {
    SemError::Syntax {
        line,
        message: message.to_string(),
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_operators() {
        let rels = parse("F =~ a + b\nF ~ x\na ~~ b\n").unwrap();
        let ops: Vec<Operator> = rels.iter().map(|r| r.op).collect();
        assert_eq!(
            ops,
            vec![
                Operator::Measurement,
                Operator::Measurement,
                Operator::Regression,
                Operator::Covariance
            ]
        );
        assert_eq!(rels[1].rhs, "b");
        assert_eq!(rels[2].line, 2);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let rels = parse("# header\n\n  F =~ a + b  # trailing\n").unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].line, 3);
    }

    #[test]
    fn numeric_multiplier_fixes_the_parameter() {
        let rels = parse("F =~ 1*a + 0.5 * b + c").unwrap();
        assert_eq!(rels[0].fixed, Some(1.0));
        assert_eq!(rels[1].fixed, Some(0.5));
        assert_eq!(rels[1].rhs, "b");
        assert_eq!(rels[2].fixed, None);
    }

    #[test]
    fn multiple_left_hand_names_expand() {
        let rels = parse("y1, y2 ~ x1 + x2").unwrap();
        assert_eq!(rels.len(), 4);
        assert_eq!(rels[3].lhs, "y2");
        assert_eq!(rels[3].rhs, "x2");
    }

    #[test]
    fn unicode_identifiers_are_accepted() {
        let rels = parse("将来に対する関心 =~ V4 + V5").unwrap();
        assert_eq!(rels[0].lhs, "将来に対する関心");
    }

    #[test]
    fn missing_operator_reports_line() {
        let err = parse("F =~ a\nthis is wrong\n").unwrap_err();
        match err {
            SemError::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_multiplier_and_names_are_rejected() {
        assert!(parse("F =~ x*a").is_err());
        assert!(parse("F =~ a + ").is_err());
        assert!(parse("F =~ a-b").is_err());
    }

    #[test]
    fn duplicates_and_self_regression_are_rejected() {
        assert!(parse("F =~ a + a").is_err());
        assert!(parse("a ~~ b\nb ~~ a").is_err());
        assert!(parse("y ~ y").is_err());
    }

    #[test]
    fn empty_description_is_rejected() {
        assert!(parse("# nothing here\n").is_err());
    }
}
