//! Transpiler from EViews-style equation text to typed expression trees.
//!
//! Supported right-hand side syntax: arithmetic with `+ - * / ^`, lags
//! `X(-k)` and leads `X(+k)`, `log exp abs sqr`, the difference operators
//! `dlog(e)` and `d(e)`, and the date builtins `@recode`, `@trend`, `@elem`.
pub mod lexer;
pub mod parser;
pub mod source;

pub use parser::{parse_date_label, parse_lhs, transpile_expr};
pub use source::{parse_model_file, parse_model_source, split_statements, DroppedStatement, ParseReport, ParsedModel, Statement};

use crate::compute::Equation;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected character '{text}' at offset {offset}")]
    Lex { offset: usize, text: String },
    #[error("Unexpected '{found}' at offset {offset}, expected {expected}")]
    Unexpected { found: String, offset: usize, expected: String },
    #[error("Unexpected end of input at offset {offset}, expected {expected}")]
    UnexpectedEnd { offset: usize, expected: String },
    #[error("Unsupported function '{0}'")]
    UnsupportedFunction(String),
    #[error("Unsupported left-hand side '{0}'")]
    UnsupportedLhs(String),
    #[error("Invalid lag offset {0}")]
    InvalidLag(String),
    #[error("Invalid date literal '{0}'")]
    InvalidDate(String),
    #[error("Statement '{0}' is not an equation")]
    NotAnEquation(String),
    #[error("Unbalanced parentheses")]
    Unbalanced,
    #[error("Cannot read model file {path}: {message}")]
    Io { path: String, message: String },
}

/// Parses one statement. `Ok(None)` marks directives (`@ADD ...`), blank
/// lines and anything without an `=`.
pub fn parse_statement(text: &str, behavioral: bool) -> Result<Option<Equation>, ParseError> {
    let stmt = match text.find('\'') {
        Some(pos) => &text[..pos],
        None => text,
    }
    .trim();
    if stmt.is_empty() || stmt.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("@add")) {
        return Ok(None);
    }
    let Some((lhs, rhs)) = stmt.split_once('=') else {
        return Ok(None);
    };
    let (target, kind) = parse_lhs(lhs)?;
    let rhs = transpile_expr(rhs)?;
    Ok(Some(Equation { target, kind, rhs, source: stmt.to_string(), behavioral }))
}

/// Parses a single `lhs = rhs` equation.
pub fn parse_equation(text: &str) -> Result<Equation, ParseError> {
    parse_statement(text, false)?.ok_or_else(|| ParseError::NotAnEquation(text.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::EquationKind;

    #[test]
    fn test_statement_classification() {
        assert_eq!(parse_statement("", false).unwrap(), None);
        assert_eq!(parse_statement("@ADD CONS CONS_A", false).unwrap(), None);
        assert_eq!(parse_statement("@add(v) X X_A", false).unwrap(), None);
        assert_eq!(parse_statement("smpl 2008q1 2020q4", false).unwrap(), None);
        let eq = parse_statement("Y = 2*X ' comment = ignored", true).unwrap().unwrap();
        assert_eq!(eq.target, "Y");
        assert_eq!(eq.kind, EquationKind::Identity);
        assert!(eq.behavioral);
        assert_eq!(eq.source, "Y = 2*X");
    }

    #[test]
    fn test_parse_equation_errors() {
        assert!(matches!(parse_equation("just words"), Err(ParseError::NotAnEquation(_))));
        assert!(matches!(parse_equation("Y = "), Err(ParseError::UnexpectedEnd { .. })));
        assert!(matches!(parse_equation("log(Y) = X"), Err(ParseError::UnsupportedLhs(_))));
    }

    #[test]
    fn test_dateval_rhs_keeps_first_equals_split() {
        let eq = parse_equation(r#"IBUS = IBUSX + 17394*@recode(@date=@dateval("2005:02"),1,0)"#).unwrap();
        assert_eq!(eq.target, "IBUS");
        assert_eq!(eq.names(), vec!["IBUS", "IBUSX"]);
    }
}
