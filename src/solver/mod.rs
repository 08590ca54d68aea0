//! Gauss-Seidel solvers for hand-written equation groups.
pub mod group;
pub mod horizon;
pub mod options;
pub mod period;
pub mod report;

pub use group::{group, BoxedGroup, EquationGroup, FnGroup};
pub use horizon::HorizonSolver;
pub use options::SolverOptions;
pub use period::solve_period;
pub use report::{HorizonReport, PeriodReport, SkipCounts};
