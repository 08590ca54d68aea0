//! Historical initialization: fill what the data lacks before calibration.
use super::config::{ModelConfig, RuleScope};
use super::equations::EquationSet;
use crate::store::Store;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitReport {
    /// Series that equations mention but the data did not provide.
    pub created: Vec<String>,
    /// Series built wholesale from a proxy rule.
    pub proxied: Vec<String>,
    /// First period considered populated; earlier periods are left alone.
    pub first_populated: usize,
    pub defaults_filled: usize,
    pub identity_values: usize,
}

/// First period with more than `min_populated` known values, or 0 if none.
pub fn first_populated_period(store: &Store, min_populated: usize) -> usize {
    (0..store.len())
        .find(|&t| store.column_at(t).iter().filter(|v| v.is_finite()).count() > min_populated)
        .unwrap_or(0)
}

/// Builds series that have no known value at all from their proxy rules.
pub fn apply_series_proxies(store: &mut Store, config: &ModelConfig) -> Vec<String> {
    let mut proxied = Vec::new();
    for rule in config.defaults.iter().filter(|r| r.scope == RuleScope::MissingSeries) {
        let missing = store.series_by_name(&rule.target).map_or(true, |s| s.iter().all(|v| v.is_nan()));
        if !missing {
            continue;
        }
        let values: Vec<f64> = (0..store.len()).map(|t| rule.value_at(store, t).unwrap_or(f64::NAN)).collect();
        if values.iter().all(|v| v.is_nan()) {
            continue;
        }
        let id = store.intern(&rule.target);
        store.series_mut(id).copy_from_slice(&values);
        proxied.push(rule.target.clone());
    }
    proxied
}

/// Fills unknown periods from `first` onward for series that already exist.
pub fn apply_period_defaults(store: &mut Store, config: &ModelConfig, first: usize) -> usize {
    let mut filled = 0;
    for rule in config.defaults.iter().filter(|r| r.scope == RuleScope::FillGaps) {
        let Some(id) = store.id(&rule.target) else { continue };
        for t in first..store.len() {
            if !store.at(id, t).is_nan() {
                continue;
            }
            if let Some(v) = rule.value_at(store, t) {
                store.series_mut(id)[t] = v;
                filled += 1;
            }
        }
    }
    filled
}

/// Evaluates identities whose targets are unknown, a few passes per period so
/// chains of identities can resolve. Known values are never overwritten.
pub fn bootstrap_identities(store: &mut Store, equations: &EquationSet, first: usize, passes: usize) -> usize {
    let mut total = 0;
    for t in first..store.len() {
        for _ in 0..passes {
            let mut filled = 0;
            for eq in equations.identities() {
                if !store.at(eq.target, t).is_nan() {
                    continue;
                }
                if let Ok(p) = eq.predict(store, t) {
                    store.series_mut(eq.target)[t] = p.value;
                    filled += 1;
                }
            }
            total += filled;
            if filled == 0 {
                break;
            }
        }
    }
    total
}

/// Runs the initialization steps in order: proxies, populated-start scan,
/// per-period defaults, identity bootstrap.
pub fn initialize_history(store: &mut Store, equations: &EquationSet, config: &ModelConfig) -> InitReport {
    let proxied = apply_series_proxies(store, config);
    let first_populated = first_populated_period(store, config.min_populated);
    let defaults_filled = apply_period_defaults(store, config, first_populated);
    let identity_values = bootstrap_identities(store, equations, first_populated, config.identity_passes);
    debug!(first_populated, defaults_filled, identity_values, "initialized history");
    InitReport { created: Vec::new(), proxied, first_populated, defaults_filled, identity_values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Equation;
    use crate::model::config::DefaultRule;

    fn config(defaults: Vec<DefaultRule>) -> ModelConfig {
        ModelConfig { defaults, min_populated: 0, ..ModelConfig::default() }
    }

    #[test]
    fn test_first_populated_period() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        store.load_series("A", "2020Q2", &[1.0, 1.0, 1.0]).unwrap();
        store.load_series("B", "2020Q3", &[1.0, 1.0]).unwrap();
        assert_eq!(first_populated_period(&store, 1), 2);
        assert_eq!(first_populated_period(&store, 0), 1);
        assert_eq!(first_populated_period(&store, 5), 0);
    }

    #[test]
    fn test_proxy_only_for_entirely_missing_series() {
        let mut store = Store::new("2020Q1", "2020Q2").unwrap();
        store.broadcast("HHPHYSA", 5000.0);
        store.broadcast("HHFINA", 7.0);
        store.set("NFWPE", 1, 3.0).unwrap();
        let cfg = config(vec![
            DefaultRule::scaled("GPW", "HHPHYSA", 0.001).for_missing_series(),
            DefaultRule::scaled("NFWPE", "HHFINA", 1.0).for_missing_series(),
            DefaultRule::scaled("OTHER", "ABSENT", 1.0).for_missing_series(),
        ]);
        assert_eq!(apply_series_proxies(&mut store, &cfg), vec!["GPW".to_string()]);
        assert_eq!(store.get("GPW", 0), 5.0);
        assert!(store.get("NFWPE", 0).is_nan());
        assert!(!store.contains("OTHER"));
    }

    #[test]
    fn test_period_defaults_fill_gaps_only() {
        let mut store = Store::new("2020Q1", "2020Q3").unwrap();
        store.broadcast("GDPM", 100.0);
        store.set("BPA", 1, 1.0).unwrap();
        store.intern("DB");
        let cfg = config(vec![
            DefaultRule::scaled("BPA", "GDPM", 0.15),
            DefaultRule::constant("DB", 0.18),
            DefaultRule::constant("NOT_IN_MODEL", 1.0),
        ]);
        assert_eq!(apply_period_defaults(&mut store, &cfg, 1), 3);
        assert!(store.get("BPA", 0).is_nan());
        assert_eq!(store.get("BPA", 1), 1.0);
        assert_eq!(store.get("BPA", 2), 15.0);
        assert_eq!(store.get("DB", 2), 0.18);
        assert!(!store.contains("NOT_IN_MODEL"));
    }

    #[test]
    fn test_identity_chain_resolves_over_passes() {
        let mut store = Store::new("2020Q1", "2020Q1").unwrap();
        store.set("A", 0, 2.0).unwrap();
        store.set("C", 0, 99.0).unwrap();
        let parsed = vec![
            Equation::parse("C = B + 1").unwrap(),
            Equation::parse("B = A * 10").unwrap(),
            Equation::parse("D = C + B").unwrap(),
        ];
        let set = EquationSet::bind(&parsed, &mut store);
        let filled = bootstrap_identities(&mut store, &set, 0, 5);
        assert_eq!(filled, 2);
        assert_eq!(store.get("B", 0), 20.0);
        // Known values are kept
        assert_eq!(store.get("C", 0), 99.0);
        assert_eq!(store.get("D", 0), 119.0);
    }
}
