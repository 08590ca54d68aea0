//! Model description files: statement assembly and bulk parsing.
use super::{parse_statement, ParseError};
use crate::compute::Equation;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// One logical statement, possibly joined from several physical lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    /// 1-based line where the statement starts.
    pub line: usize,
    pub behavioral: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedStatement {
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// What happened to each statement of a model description.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseReport {
    pub statements: usize,
    pub parsed: usize,
    pub behavioral: usize,
    /// Directives and statements without an `=`.
    pub skipped: usize,
    pub dropped: Vec<DroppedStatement>,
}

#[derive(Debug, Clone)]
pub struct ParsedModel {
    pub equations: Vec<Equation>,
    pub report: ParseReport,
}

fn code_part(line: &str) -> &str {
    match line.find('\'') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn paren_balance(text: &str) -> i64 {
    text.chars().fold(0, |acc, c| match c {
        '(' => acc + 1,
        ')' => acc - 1,
        _ => acc,
    })
}

/// Splits a description into statements.
///
/// Lines starting with `'` are comments, except commented behavioral forms
/// (`'dlog(` or `'d(`) when `include_behavioral` is set; those are
/// un-commented, together with their commented continuation lines. A
/// statement continues onto following lines while it has unclosed parentheses.
/// Text after an inline `'` is dropped. A trailing unbalanced statement is
/// returned separately.
pub fn split_statements(content: &str, include_behavioral: bool) -> (Vec<Statement>, Option<Statement>) {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut start_line = 0;
    let mut behavioral = false;

    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let text = match line.strip_prefix('\'') {
            Some(rest) => {
                let rest = rest.trim_start();
                let opens_behavioral = rest.to_ascii_lowercase().starts_with("dlog(") || rest.starts_with("d(");
                if current.is_empty() && include_behavioral && opens_behavioral {
                    behavioral = true;
                    code_part(rest)
                } else if !current.is_empty() && behavioral {
                    code_part(rest)
                } else {
                    continue;
                }
            }
            None => code_part(line),
        };
        let text = text.trim();
        if current.is_empty() {
            if text.is_empty() {
                continue;
            }
            start_line = i + 1;
        } else {
            current.push(' ');
        }
        current.push_str(text);

        // A stray ')' closes the statement too, so it fails on its own
        if paren_balance(&current) <= 0 {
            out.push(Statement { text: std::mem::take(&mut current), line: start_line, behavioral });
            behavioral = false;
        }
    }

    let leftover = (!current.is_empty()).then(|| Statement { text: current, line: start_line, behavioral });
    (out, leftover)
}

/// Parses every statement of a model description. Statements that cannot be
/// transpiled are recorded in the report and left out.
pub fn parse_model_source(content: &str, include_behavioral: bool) -> ParsedModel {
    let (statements, leftover) = split_statements(content, include_behavioral);
    let mut report = ParseReport { statements: statements.len(), ..Default::default() };
    let mut equations = Vec::new();

    for stmt in statements {
        match parse_statement(&stmt.text, stmt.behavioral) {
            Ok(Some(eq)) => {
                report.parsed += 1;
                if eq.behavioral {
                    report.behavioral += 1;
                }
                equations.push(eq);
            }
            Ok(None) => report.skipped += 1,
            Err(e) => {
                debug!(line = stmt.line, error = %e, "dropping statement");
                report.dropped.push(DroppedStatement { line: stmt.line, text: stmt.text, reason: e.to_string() });
            }
        }
    }
    if let Some(stmt) = leftover {
        report.statements += 1;
        report.dropped.push(DroppedStatement {
            line: stmt.line,
            text: stmt.text,
            reason: ParseError::Unbalanced.to_string(),
        });
    }

    info!(
        parsed = report.parsed,
        behavioral = report.behavioral,
        skipped = report.skipped,
        dropped = report.dropped.len(),
        "parsed model description"
    );
    ParsedModel { equations, report }
}

pub fn parse_model_file(path: impl AsRef<Path>, include_behavioral: bool) -> Result<ParsedModel, ParseError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| ParseError::Io { path: path.display().to_string(), message: e.to_string() })?;
    Ok(parse_model_source(&content, include_behavioral))
}
