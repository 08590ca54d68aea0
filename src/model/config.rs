//! Model construction settings and historical-initialization rules.
use super::ModelError;
use crate::solver::SolverOptions;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a default rule produces its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefaultValue {
    Constant { value: f64 },
    /// `factor * source` at the same period.
    Scaled { source: String, factor: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Fill individual unknown periods of an existing series.
    #[default]
    FillGaps,
    /// Build the whole series, only when it has no known value at all.
    MissingSeries,
}

/// A heuristic used to seed history that the data does not provide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultRule {
    pub target: String,
    pub value: DefaultValue,
    #[serde(default)]
    pub scope: RuleScope,
}

impl DefaultRule {
    pub fn constant(target: &str, value: f64) -> Self {
        Self { target: target.to_string(), value: DefaultValue::Constant { value }, scope: RuleScope::FillGaps }
    }

    pub fn scaled(target: &str, source: &str, factor: f64) -> Self {
        Self {
            target: target.to_string(),
            value: DefaultValue::Scaled { source: source.to_string(), factor },
            scope: RuleScope::FillGaps,
        }
    }

    pub fn for_missing_series(mut self) -> Self {
        self.scope = RuleScope::MissingSeries;
        self
    }

    /// Rule value at `t`, if its inputs are known there.
    pub fn value_at(&self, store: &Store, t: usize) -> Option<f64> {
        match &self.value {
            DefaultValue::Constant { value } => Some(*value),
            DefaultValue::Scaled { source, factor } => {
                let v = store.get(source, t) * factor;
                v.is_finite().then_some(v)
            }
        }
    }
}

/// Proxies and ratios used by the OBR model when history is incomplete.
pub fn obr_preset() -> Vec<DefaultRule> {
    vec![
        // Household wealth proxies
        DefaultRule::scaled("GPW", "HHPHYSA", 0.001).for_missing_series(),
        DefaultRule::scaled("NFWPE", "HHFINA", 1.0).for_missing_series(),
        // Shares of GDP
        DefaultRule::scaled("BPA", "GDPM", 0.15),
        DefaultRule::scaled("GGVA", "GDPM", 0.20),
        // Employment from the labour force survey (millions -> thousands)
        DefaultRule::scaled("EMS", "ETLFS", 800.0),
        DefaultRule::scaled("ET", "ETLFS", 1000.0),
        // Tax and distribution ratios
        DefaultRule::constant("TCPRO", 0.25),
        DefaultRule::constant("DB", 0.18),
        DefaultRule::constant("DP", 0.06),
        DefaultRule::constant("DV", 0.25),
        DefaultRule::constant("WB", 0.6),
        DefaultRule::constant("WP", 0.2),
        DefaultRule::constant("WV", 0.2),
        DefaultRule::constant("COCU", 0.12),
        DefaultRule::constant("CBIUD", 0.0),
        DefaultRule::constant("PCLEB", 0.0),
        DefaultRule::constant("IPRL", 0.0),
        DefaultRule::constant("RDELTA", 0.025),
        // Business investment split and capital stock
        DefaultRule::scaled("IBUS", "IF", 0.5),
        DefaultRule::scaled("IBUSX", "IF", 0.5),
        DefaultRule::scaled("KMSXH", "IBUSX", 1.0 / 1000.0 / 0.03),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub solver: SolverOptions,
    /// Un-comment behavioral alternatives when reading a model file.
    pub include_behavioral: bool,
    /// First quarter of the residual calibration window.
    pub calibration_start: String,
    /// Window length used when `calibration_start` is outside the horizon.
    pub calibration_fallback: usize,
    /// History is initialized from the first period with more known values than this.
    pub min_populated: usize,
    /// Upper bound on identity bootstrap passes per period.
    pub identity_passes: usize,
    /// Order equations by their contemporaneous dependency blocks.
    pub reorder_by_dependency: bool,
    pub defaults: Vec<DefaultRule>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            solver: SolverOptions::full_system(),
            include_behavioral: true,
            calibration_start: "2024Q1".to_string(),
            calibration_fallback: 20,
            min_populated: 50,
            identity_passes: 5,
            reorder_by_dependency: false,
            defaults: obr_preset(),
        }
    }
}

impl ModelConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ModelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.solver.tolerance.is_nan() || self.solver.tolerance <= 0.0 {
            return Err(ModelError::Config(format!("tolerance must be positive, got {}", self.solver.tolerance)));
        }
        if self.solver.max_iter == 0 {
            return Err(ModelError::Config("max_iter must be at least 1".into()));
        }
        Ok(())
    }
}
