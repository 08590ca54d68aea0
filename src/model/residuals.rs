//! Residual calibration: the gap between history and what each equation predicts.
use super::config::ModelConfig;
use super::equations::EquationSet;
use crate::compute::EquationKind;
use crate::store::{Store, VarId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Whether stored residuals are added to equation results.
///
/// `Apply` reproduces calibrated history. `Suppress` gives the pure
/// model response used when comparing shocked and unshocked runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualMode {
    Apply,
    Suppress,
}

#[derive(Debug, Clone, Default)]
pub struct Residuals {
    values: HashMap<(VarId, usize), f64>,
    window_start: usize,
}

/// Start of the calibration window: the configured quarter, or the last
/// `calibration_fallback` periods when that quarter is not in the horizon.
pub fn calibration_start(store: &Store, config: &ModelConfig) -> usize {
    match store.index_of(&config.calibration_start) {
        Ok(t) => t,
        Err(e) => {
            let fallback = store.len().saturating_sub(config.calibration_fallback);
            warn!(error = %e, fallback, "calibration start unavailable, using the tail of the horizon");
            fallback
        }
    }
}

impl Residuals {
    /// For every non-identity equation and every period from `first` (never
    /// before 1), stores `actual - predicted` wherever both are finite.
    pub fn calibrate(store: &Store, equations: &EquationSet, first: usize) -> Self {
        let window_start = first.max(1);
        let mut values = HashMap::new();
        for eq in equations.iter().filter(|e| e.kind != EquationKind::Identity) {
            for t in window_start..store.len() {
                let actual = store.at(eq.target, t);
                if !actual.is_finite() {
                    continue;
                }
                if let Ok(p) = eq.predict(store, t) {
                    values.insert((eq.target, t), actual - p.value);
                }
            }
        }
        debug!(count = values.len(), window_start, "calibrated residuals");
        Self { values, window_start }
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn window_start(&self) -> usize { self.window_start }

    pub fn get(&self, var: VarId, t: usize) -> Option<f64> {
        self.values.get(&(var, t)).copied()
    }

    /// Amount added to an equation result under `mode`.
    #[inline]
    pub fn adjustment(&self, var: VarId, t: usize, mode: ResidualMode) -> f64 {
        match mode {
            ResidualMode::Apply => self.get(var, t).unwrap_or(0.0),
            ResidualMode::Suppress => 0.0,
        }
    }

    /// Drops every residual of `var`, e.g. once its equation is replaced.
    pub fn clear_var(&mut self, var: VarId) -> usize {
        let before = self.values.len();
        self.values.retain(|(v, _), _| *v != var);
        before - self.values.len()
    }
}
