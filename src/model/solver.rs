//! The full transpiled system: initialization, calibration, solving and
//! policy operations (closure swaps, exogenization, shocks).
use super::config::ModelConfig;
use super::equations::EquationSet;
use super::init::{initialize_history, InitReport};
use super::residuals::{calibration_start, ResidualMode, Residuals};
use super::ModelError;
use crate::analysis::diagnostics::{self, NanReport};
use crate::analysis::topology::{self, BlockStructure};
use crate::compute::{Equation, EquationOutcome, SkipReason};
use crate::display::trace;
use crate::solver::period::max_change_since;
use crate::solver::{HorizonReport, PeriodReport, SkipCounts};
use crate::store::{Quarter, Store, StoreError, VarId};
use crate::transpile::{self, ParseReport};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// A shock recorded by [`FullSystemSolver::apply_shock`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedShock {
    pub var: String,
    pub delta: f64,
    pub start: Quarter,
    /// Periods actually shifted, after clipping to the horizon.
    pub periods: usize,
}

/// Result of [`FullSystemSolver::swap_closure`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosureSwap {
    /// An equation for the removed variable existed and was dropped.
    pub removed: bool,
    /// Target of the added equation, if any.
    pub added: Option<String>,
    /// The added equation replaced an existing one for the same target.
    pub replaced: bool,
}

#[derive(Debug, Clone)]
pub struct FullSystemSolver {
    store: Store,
    baseline: Store,
    equations: EquationSet,
    residuals: Residuals,
    config: ModelConfig,
    init: InitReport,
    shocks: Vec<AppliedShock>,
}

impl FullSystemSolver {
    /// Binds `parsed` against `store`, fills missing history, calibrates
    /// residuals and takes a baseline snapshot.
    pub fn new(mut store: Store, parsed: &[Equation], config: ModelConfig) -> Result<Self, ModelError> {
        config.validate()?;
        let known = store.var_count();
        let mut equations = EquationSet::bind(parsed, &mut store);
        let created: Vec<String> = store.registry().iter().skip(known).map(|(_, n)| n.to_string()).collect();

        let mut init = initialize_history(&mut store, &equations, &config);
        init.created = created;

        if config.reorder_by_dependency {
            let order = topology::block_structure(&equations).order();
            equations.reorder(&order);
        }

        let residuals = Residuals::calibrate(&store, &equations, calibration_start(&store, &config));
        info!(
            equations = equations.len(),
            variables = store.var_count(),
            created = init.created.len(),
            residuals = residuals.len(),
            "built full-system solver"
        );

        Ok(Self { baseline: store.clone(), store, equations, residuals, config, init, shocks: Vec::new() })
    }

    pub fn from_model_source(store: Store, source: &str, config: ModelConfig) -> Result<(Self, ParseReport), ModelError> {
        let parsed = transpile::parse_model_source(source, config.include_behavioral);
        let solver = Self::new(store, &parsed.equations, config)?;
        Ok((solver, parsed.report))
    }

    pub fn from_model_file(store: Store, path: impl AsRef<Path>, config: ModelConfig) -> Result<(Self, ParseReport), ModelError> {
        let parsed = transpile::parse_model_file(path, config.include_behavioral)?;
        let solver = Self::new(store, &parsed.equations, config)?;
        Ok((solver, parsed.report))
    }

    // --- Accessors ---

    pub fn store(&self) -> &Store { &self.store }
    pub fn store_mut(&mut self) -> &mut Store { &mut self.store }
    /// Store as it was right after initialization.
    pub fn baseline(&self) -> &Store { &self.baseline }
    pub fn equations(&self) -> &EquationSet { &self.equations }
    pub fn residuals(&self) -> &Residuals { &self.residuals }
    pub fn config(&self) -> &ModelConfig { &self.config }
    pub fn init_report(&self) -> &InitReport { &self.init }
    pub fn shocks(&self) -> &[AppliedShock] { &self.shocks }

    pub fn period_index(&self, label: &str) -> Result<usize, ModelError> {
        Ok(self.store.index_of(label)?)
    }

    /// Restores every series to the baseline snapshot. Equations are not touched.
    pub fn restore_baseline(&mut self) {
        self.store = self.baseline.clone();
    }

    // --- Solving ---

    /// One Gauss-Seidel pass over every equation at `t`.
    fn pass(&mut self, t: usize, mode: ResidualMode) -> SkipCounts {
        let mut skips = SkipCounts::default();
        for eq in self.equations.iter() {
            match evaluate(&self.store, &self.residuals, eq, t, mode) {
                EquationOutcome::Updated { new, .. } => self.store.series_mut(eq.target)[t] = new,
                EquationOutcome::Skipped(reason) => skips.record(&reason),
            }
        }
        skips
    }

    /// Iterates all equations at `t` until convergence or the iteration cap.
    /// Only finite results are written.
    pub fn solve_period(&mut self, t: usize, mode: ResidualMode) -> Result<PeriodReport, ModelError> {
        let quarter = self
            .store
            .quarter_at(t)
            .ok_or(StoreError::IndexOutOfRange { t, len: self.store.len() })?;
        let options = self.config.solver;
        let mut report = PeriodReport {
            quarter,
            t,
            iterations: 0,
            converged: false,
            max_change: f64::INFINITY,
            skips: SkipCounts::default(),
        };
        for iteration in 1..=options.max_iter {
            let before = self.store.column_at(t);
            report.skips = self.pass(t, mode);
            report.iterations = iteration;
            report.max_change = max_change_since(&before, &self.store, t);
            if report.max_change < options.tolerance {
                report.converged = true;
                break;
            }
        }
        Ok(report)
    }

    /// Solves `start..=end` in order.
    pub fn solve(&mut self, start: &str, end: &str, mode: ResidualMode) -> Result<HorizonReport, ModelError> {
        let first = self.store.index_of(start)?;
        let last = self.store.index_of(end)?;
        let mut report = HorizonReport::default();
        if first > last {
            return Ok(report);
        }
        for t in first..=last {
            let period = self.solve_period(t, mode)?;
            if period.converged {
                debug!(quarter = %period.quarter, iterations = period.iterations, skipped = period.skips.total(), "period converged");
            } else {
                warn!(quarter = %period.quarter, max_change = period.max_change, "period hit the iteration cap");
            }
            report.push(period);
        }
        info!(
            start,
            end,
            iterations = report.total_iterations(),
            non_converged = report.non_converged().len(),
            "solved horizon"
        );
        Ok(report)
    }

    // --- Policy operations ---

    /// Makes `remove` exogenous and optionally adds a replacement equation.
    ///
    /// A replacement for a target that already has an equation replaces it, so
    /// every variable keeps at most one equation.
    pub fn swap_closure(&mut self, remove: &str, replacement: Option<&str>) -> Result<ClosureSwap, ModelError> {
        let replacement = replacement.map(Equation::parse).transpose()?;
        let removed = self.make_exogenous(remove);
        let mut swap = ClosureSwap { removed, added: None, replaced: false };
        if let Some(eq) = replacement {
            let target = eq.target.clone();
            swap.replaced = self.add_equation(&eq);
            if swap.replaced {
                warn!(target = %target, "closure equation replaces an existing equation");
            }
            swap.added = Some(target);
        }
        info!(remove, added = ?swap.added, "swapped closure");
        Ok(swap)
    }

    /// Adds an equation, replacing any existing one for its target. Returns
    /// whether a replacement happened.
    pub fn add_equation(&mut self, eq: &Equation) -> bool {
        let bound = eq.bind(&mut self.store);
        let target = bound.target;
        let replaced = self.equations.insert(bound).is_some();
        if replaced {
            self.residuals.clear_var(target);
        }
        replaced
    }

    /// Removes the equation for `var`, so its values stay as set. Returns
    /// whether an equation existed.
    pub fn make_exogenous(&mut self, var: &str) -> bool {
        let Some(id) = self.store.id(var) else { return false };
        let removed = self.equations.remove_target(id);
        if removed {
            self.residuals.clear_var(id);
            debug!(var, "made exogenous");
        }
        removed
    }

    /// Makes `var` exogenous and adds `delta` to it for `periods` quarters from
    /// `start`. Unknown values stay unknown. Combine with
    /// [`ResidualMode::Suppress`] to measure the pure model response.
    pub fn apply_shock(&mut self, var: &str, delta: f64, start: &str, periods: usize) -> Result<AppliedShock, ModelError> {
        let id = self.store.id(var).ok_or_else(|| StoreError::UnknownVariable(var.to_string()))?;
        let first = self.store.index_of(start)?;
        self.make_exogenous(var);
        let last = first.saturating_add(periods).min(self.store.len());
        for value in &mut self.store.series_mut(id)[first..last] {
            *value += delta;
        }
        let shock = AppliedShock {
            var: var.to_string(),
            delta,
            start: self.store.start().shift(first as i64),
            periods: last - first,
        };
        info!(var, delta, start, periods = shock.periods, "applied shock");
        self.shocks.push(shock.clone());
        Ok(shock)
    }

    // --- Diagnostics ---

    pub fn block_structure(&self) -> BlockStructure {
        topology::block_structure(&self.equations)
    }

    /// Unknown values of endogenous variables over `start..=end`.
    pub fn nan_report(&self, start: &str, end: &str) -> Result<NanReport, ModelError> {
        let first = self.store.index_of(start)?;
        let last = self.store.index_of(end)?;
        let targets: Vec<VarId> = self.equations.targets().collect();
        Ok(diagnostics::scan(&self.store, &targets, first, last))
    }

    /// Human-readable evaluation of the equation for `var` at `quarter`.
    pub fn trace(&self, var: &str, quarter: &str, mode: ResidualMode) -> Result<String, ModelError> {
        let t = self.store.index_of(quarter)?;
        let id = self.store.id(var).ok_or_else(|| StoreError::UnknownVariable(var.to_string()))?;
        Ok(trace::format_trace(&self.store, &self.equations, &self.residuals, id, t, mode))
    }
}

/// Evaluates one equation at `t`, residual included, without writing.
pub fn evaluate(store: &Store, residuals: &Residuals, eq: &Equation<VarId>, t: usize, mode: ResidualMode) -> EquationOutcome {
    let old = store.at(eq.target, t);
    match eq.predict(store, t) {
        Ok(p) => {
            let new = p.value + residuals.adjustment(eq.target, t, mode);
            if new.is_finite() {
                EquationOutcome::Updated { old, new }
            } else {
                EquationOutcome::Skipped(SkipReason::NonFinite)
            }
        }
        Err(reason) => EquationOutcome::Skipped(reason),
    }
}
