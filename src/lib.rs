//! Core of a quarterly macroeconometric model: a variable store, Gauss-Seidel
//! solvers, and a transpiler for EViews-style equation descriptions.
pub mod analysis;
pub mod compute;
pub mod display;
pub mod model;
pub mod solver;
pub mod store;
pub mod transpile;

#[cfg(feature = "python")]
pub mod bindings;

pub use compute::{Equation, EquationKind, Expr};
pub use model::{FullSystemSolver, ModelConfig, ModelError, ResidualMode, Scenario};
pub use solver::{EquationGroup, HorizonSolver, SolverOptions};
pub use store::{Quarter, Store, StoreError, VarId};
pub use transpile::{parse_equation, parse_model_file, parse_model_source, transpile_expr, ParseError};

// FFI facade: the compiled `_core` Python module.
#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::python::register(m)
}
