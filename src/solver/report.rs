use crate::compute::{EvalError, SkipReason};
use crate::store::Quarter;
use indexmap::IndexMap;
use serde::Serialize;

/// Equations that could not be updated during the final pass of a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub outside_horizon: usize,
    pub unbound: usize,
    pub missing_lag: usize,
    pub non_finite: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::Eval(EvalError::UnboundVariable(_)) => self.unbound += 1,
            SkipReason::Eval(_) => self.outside_horizon += 1,
            SkipReason::MissingLag => self.missing_lag += 1,
            SkipReason::NonFinite => self.non_finite += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.outside_horizon + self.unbound + self.missing_lag + self.non_finite
    }

    pub fn merge(&mut self, other: &SkipCounts) {
        self.outside_horizon += other.outside_horizon;
        self.unbound += other.unbound;
        self.missing_lag += other.missing_lag;
        self.non_finite += other.non_finite;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub quarter: Quarter,
    pub t: usize,
    /// Passes performed. Equal to the cap when the period did not converge.
    pub iterations: usize,
    pub converged: bool,
    /// Largest relative change seen in the last pass.
    pub max_change: f64,
    pub skips: SkipCounts,
}

/// Per-quarter outcome of a horizon solve, in solve order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HorizonReport {
    pub periods: IndexMap<Quarter, PeriodReport>,
}

impl HorizonReport {
    pub fn push(&mut self, report: PeriodReport) {
        self.periods.insert(report.quarter, report);
    }

    pub fn len(&self) -> usize { self.periods.len() }
    pub fn is_empty(&self) -> bool { self.periods.is_empty() }

    pub fn get(&self, quarter: &Quarter) -> Option<&PeriodReport> {
        self.periods.get(quarter)
    }

    /// Iteration counts keyed by quarter label.
    pub fn iterations(&self) -> IndexMap<String, usize> {
        self.periods.iter().map(|(q, r)| (q.to_string(), r.iterations)).collect()
    }

    pub fn all_converged(&self) -> bool {
        self.periods.values().all(|r| r.converged)
    }

    pub fn non_converged(&self) -> Vec<Quarter> {
        self.periods.values().filter(|r| !r.converged).map(|r| r.quarter).collect()
    }

    pub fn total_iterations(&self) -> usize {
        self.periods.values().map(|r| r.iterations).sum()
    }

    pub fn total_skips(&self) -> SkipCounts {
        let mut total = SkipCounts::default();
        for r in self.periods.values() {
            total.merge(&r.skips);
        }
        total
    }
}
