//! Transpiled equations and their update rules.
use crate::compute::engine::EvalContext;
use crate::compute::error::EvalError;
use crate::compute::expr::Expr;
use crate::store::{Store, VarId};
use crate::transpile::{self, ParseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shape of the left-hand side, which fixes how the evaluated right-hand
/// side becomes the target's new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquationKind {
    /// `X = rhs`
    Identity,
    /// `X/X(-1) = rhs`
    Ratio,
    /// `dlog(X) = rhs`
    LogDiff,
    /// `d(X) = rhs`
    FirstDiff,
}

impl EquationKind {
    pub fn needs_lag(&self) -> bool {
        !matches!(self, EquationKind::Identity)
    }

    /// New target value from the right-hand side and the target's previous value.
    #[inline]
    pub fn apply(&self, rhs: f64, lag: f64) -> f64 {
        match self {
            EquationKind::Identity => rhs,
            EquationKind::Ratio => lag * rhs,
            EquationKind::LogDiff => lag * rhs.exp(),
            EquationKind::FirstDiff => lag + rhs,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            EquationKind::Identity => "identity (value = rhs)",
            EquationKind::Ratio => "ratio (value = lag * rhs)",
            EquationKind::LogDiff => "log-difference (value = lag * exp(rhs))",
            EquationKind::FirstDiff => "first-difference (value = lag + rhs)",
        }
    }

    pub fn lhs(&self, target: &str) -> String {
        match self {
            EquationKind::Identity => target.to_string(),
            EquationKind::Ratio => format!("{0}/{0}(-1)", target),
            EquationKind::LogDiff => format!("dlog({})", target),
            EquationKind::FirstDiff => format!("d({})", target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equation<R = String> {
    pub target: R,
    pub kind: EquationKind,
    pub rhs: Expr<R>,
    /// Statement text as written in the model description.
    pub source: String,
    /// Came from a commented-out behavioral alternative.
    #[serde(default)]
    pub behavioral: bool,
}

impl Equation<String> {
    /// Parses a single `lhs = rhs` statement.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        transpile::parse_equation(line)
    }

    pub fn bind(&self, store: &mut Store) -> Equation<VarId> {
        Equation {
            target: store.intern(&self.target),
            kind: self.kind,
            rhs: self.rhs.bind(store),
            source: self.source.clone(),
            behavioral: self.behavioral,
        }
    }

    /// Target plus every referenced variable, in order of appearance.
    pub fn names(&self) -> Vec<&str> {
        let mut out = vec![self.target.as_str()];
        self.rhs.for_each_ref(&mut |name, _| {
            if !out.contains(&name.as_str()) {
                out.push(name.as_str());
            }
        });
        out
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("{0}")]
    Eval(#[from] EvalError),
    #[error("previous value of the target is unavailable")]
    MissingLag,
    #[error("result is not finite")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EquationOutcome {
    Updated { old: f64, new: f64 },
    Skipped(SkipReason),
}

/// Intermediate values of one equation evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub rhs: f64,
    pub lag: Option<f64>,
    pub value: f64,
}

impl Equation<VarId> {
    /// Evaluates the equation at `t` without writing anything.
    pub fn predict(&self, store: &Store, t: usize) -> Result<Prediction, SkipReason> {
        let ctx = EvalContext::new(store, t)?;
        let rhs = self.rhs.eval(&ctx)?;
        let lag = if self.kind.needs_lag() {
            match store.at_offset(self.target, t as i64 - 1) {
                Some(v) if v.is_finite() => Some(v),
                _ => return Err(SkipReason::MissingLag),
            }
        } else {
            None
        };
        let value = self.kind.apply(rhs, lag.unwrap_or(f64::NAN));
        if !value.is_finite() {
            return Err(SkipReason::NonFinite);
        }
        Ok(Prediction { rhs, lag, value })
    }

    pub fn render(&self, store: &Store) -> String {
        format!(
            "{} = {}",
            self.kind.lhs(store.name(self.target)),
            self.rhs.render(&|id: &VarId| store.name(*id).to_string())
        )
    }
}
