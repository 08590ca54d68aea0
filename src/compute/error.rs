use crate::store::{Quarter, VarId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Reference to {var:?} at period {period} falls outside the horizon")]
    OutsideHorizon { var: VarId, period: i64 },
    #[error("Element lookup of {var:?} at {quarter} is outside the horizon")]
    ElementOutsideHorizon { var: VarId, quarter: Quarter },
    #[error("Period index {0} is outside the horizon")]
    PeriodOutOfRange(usize),
    #[error("Unbound variable '{0}'")]
    UnboundVariable(String),
}
