use serde::{Deserialize, Serialize};

/// Iteration controls for the per-quarter Gauss-Seidel loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Upper bound on passes per quarter. Reaching it is not an error.
    pub max_iter: usize,
    /// Largest relative change across variables that counts as converged.
    pub tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self { max_iter: 500, tolerance: 1e-6 }
    }
}

impl SolverOptions {
    /// Defaults for the full transpiled system, where a pass is much more expensive.
    pub fn full_system() -> Self {
        Self { max_iter: 100, ..Self::default() }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}
