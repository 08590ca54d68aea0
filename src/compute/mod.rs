//! Expression trees, their evaluation, and the update rules of transpiled equations.
pub mod engine;
pub mod equation;
pub mod error;
pub mod expr;
pub mod kernel;

pub use engine::EvalContext;
pub use equation::{Equation, EquationKind, EquationOutcome, Prediction, SkipReason};
pub use error::EvalError;
pub use expr::{BinOp, Expr, Func, Reference};
