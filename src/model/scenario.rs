//! Shock scenarios: paired baseline and shocked runs on copies of a solver.
use super::residuals::ResidualMode;
use super::solver::FullSystemSolver;
use super::ModelError;
use crate::solver::HorizonReport;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const GDP_EXPENDITURE_EQ: &str = "GDPM = CGG + CONS + IF + DINV + VAL + X - M + SDE";
pub const BUSINESS_INVESTMENT_EQ: &str = r#"IBUS = IBUSX + 17394*@recode(@date=@dateval("2005:02"),1,0)"#;
pub const TOTAL_INVESTMENT_EQ: &str = "IF = IBUS + GGI + PCIH + PCLEB + IH + IPRL";

/// Make `remove` exogenous, then optionally add `equation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureSpec {
    pub remove: String,
    #[serde(default)]
    pub equation: Option<String>,
}

impl ClosureSpec {
    pub fn new(remove: &str, equation: Option<&str>) -> Self {
        Self { remove: remove.to_string(), equation: equation.map(str::to_string) }
    }

    /// Closes GDP on the expenditure side with inventories exogenous, and
    /// rebuilds total investment from its components.
    pub fn expenditure_closure() -> Vec<ClosureSpec> {
        vec![
            Self::new("DINV", Some(GDP_EXPENDITURE_EQ)),
            Self::new("IBUS", Some(BUSINESS_INVESTMENT_EQ)),
            Self::new("IF", Some(TOTAL_INVESTMENT_EQ)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub var: String,
    pub delta: f64,
    pub start: String,
    pub periods: usize,
    /// Last quarter solved; both runs cover `start..=end`.
    pub end: String,
    #[serde(default)]
    pub closures: Vec<ClosureSpec>,
    /// Variables reported in the result.
    pub tracked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioRow {
    pub quarter: String,
    pub baseline: IndexMap<String, f64>,
    /// Shocked minus baseline.
    pub delta: IndexMap<String, f64>,
    /// Delta as a percentage of baseline; NaN when the baseline is zero or unknown.
    pub pct: IndexMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub rows: Vec<ScenarioRow>,
    pub baseline_report: HorizonReport,
    pub shocked_report: HorizonReport,
}

impl ScenarioResult {
    /// Delta of `var` at the last solved quarter.
    pub fn final_delta(&self, var: &str) -> Option<f64> {
        self.rows.last().and_then(|r| r.delta.get(var).copied())
    }

    /// Largest absolute delta of `var` across the window.
    pub fn peak_delta(&self, var: &str) -> Option<f64> {
        self.rows
            .iter()
            .filter_map(|r| r.delta.get(var).copied())
            .filter(|v| v.is_finite())
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
    }
}

fn apply_closures(solver: &mut FullSystemSolver, closures: &[ClosureSpec]) -> Result<(), ModelError> {
    for c in closures {
        solver.swap_closure(&c.remove, c.equation.as_deref())?;
    }
    Ok(())
}

/// Runs one scenario on two copies of `template`: a baseline and a shocked
/// run, both with the same closures and with residuals suppressed.
pub fn run_scenario(template: &FullSystemSolver, scenario: &Scenario) -> Result<ScenarioResult, ModelError> {
    let mut baseline = template.clone();
    apply_closures(&mut baseline, &scenario.closures)?;
    let mut shocked = baseline.clone();

    let baseline_report = baseline.solve(&scenario.start, &scenario.end, ResidualMode::Suppress)?;
    shocked.apply_shock(&scenario.var, scenario.delta, &scenario.start, scenario.periods)?;
    let shocked_report = shocked.solve(&scenario.start, &scenario.end, ResidualMode::Suppress)?;

    let first = baseline.period_index(&scenario.start)?;
    let last = baseline.period_index(&scenario.end)?;
    let mut rows = Vec::new();
    for t in first..=last {
        let mut row = ScenarioRow {
            quarter: baseline.store().label(t).unwrap_or_default(),
            baseline: IndexMap::new(),
            delta: IndexMap::new(),
            pct: IndexMap::new(),
        };
        for var in &scenario.tracked {
            let base = baseline.store().get(var, t);
            let diff = shocked.store().get(var, t) - base;
            let pct = if base.is_finite() && base != 0.0 { 100.0 * diff / base } else { f64::NAN };
            row.baseline.insert(var.clone(), base);
            row.delta.insert(var.clone(), diff);
            row.pct.insert(var.clone(), pct);
        }
        rows.push(row);
    }
    info!(scenario = %scenario.name, periods = rows.len(), "scenario finished");
    Ok(ScenarioResult { name: scenario.name.clone(), rows, baseline_report, shocked_report })
}

/// Runs independent scenarios in parallel, one solver copy each.
pub fn run_scenarios(template: &FullSystemSolver, scenarios: &[Scenario]) -> Vec<Result<ScenarioResult, ModelError>> {
    scenarios.par_iter().map(|s| run_scenario(template, s)).collect()
}
