use super::group::BoxedGroup;
use super::options::SolverOptions;
use super::period::solve_period;
use super::report::HorizonReport;
use crate::store::{Store, StoreError};
use tracing::{debug, warn};

/// Solves a fixed list of equation groups quarter by quarter.
///
/// The group list is configuration: different model variants are different
/// lists handed to the same solver.
pub struct HorizonSolver {
    groups: Vec<BoxedGroup>,
    options: SolverOptions,
}

impl HorizonSolver {
    pub fn new(groups: Vec<BoxedGroup>) -> Self {
        Self { groups, options: SolverOptions::default() }
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn groups(&self) -> &[BoxedGroup] { &self.groups }
    pub fn options(&self) -> &SolverOptions { &self.options }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name()).collect()
    }

    /// Solves every quarter from `start` through `end` inclusive, in order, so
    /// each quarter sees the solved values of earlier ones through its lags.
    /// An empty report is returned when `start` is after `end`.
    pub fn solve(&self, store: &mut Store, start: &str, end: &str) -> Result<HorizonReport, StoreError> {
        let first = store.index_of(start)?;
        let last = store.index_of(end)?;
        let mut report = HorizonReport::default();
        if first > last {
            return Ok(report);
        }
        for t in first..=last {
            let period = solve_period(store, t, &self.groups, &self.options)?;
            if period.converged {
                debug!(quarter = %period.quarter, iterations = period.iterations, "period converged");
            } else {
                warn!(quarter = %period.quarter, max_change = period.max_change, "period hit the iteration cap");
            }
            report.push(period);
        }
        Ok(report)
    }
}
