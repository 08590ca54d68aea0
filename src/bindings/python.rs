use crate::model::{FullSystemSolver, ModelConfig, ResidualMode};
use crate::store::{Store, StoreError};
use crate::transpile::{self, ParseReport};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn value_err(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn mode(suppress_residuals: bool) -> ResidualMode {
    if suppress_residuals { ResidualMode::Suppress } else { ResidualMode::Apply }
}

#[pyclass(name = "_Store")]
#[derive(Debug, Clone)]
pub struct PyStore {
    pub inner: Store,
}

#[pymethods]
impl PyStore {
    #[new]
    pub fn new(start: &str, end: &str) -> PyResult<Self> {
        Ok(Self { inner: Store::new(start, end).map_err(value_err)? })
    }

    pub fn __len__(&self) -> usize { self.inner.len() }
    pub fn label(&self, t: usize) -> Option<String> { self.inner.label(t) }

    pub fn index_of(&self, label: &str) -> PyResult<usize> {
        self.inner.index_of(label).map_err(value_err)
    }

    pub fn get(&self, name: &str, t: usize) -> f64 { self.inner.get(name, t) }

    pub fn set(&mut self, name: &str, t: usize, value: f64) -> PyResult<()> {
        self.inner.set(name, t, value).map_err(value_err)
    }

    pub fn broadcast(&mut self, name: &str, value: f64) { self.inner.broadcast(name, value) }

    pub fn load_series(&mut self, name: &str, first: &str, values: Vec<f64>) -> PyResult<usize> {
        self.inner.load_series(name, first, &values).map_err(value_err)
    }

    pub fn series(&self, name: &str) -> Option<Vec<f64>> {
        self.inner.series_by_name(name).map(|s| s.to_vec())
    }

    pub fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner).map_err(value_err)
    }
}

#[pyclass(name = "_Model")]
#[derive(Debug, Clone)]
pub struct PyModel {
    inner: FullSystemSolver,
    report: ParseReport,
}

#[pymethods]
impl PyModel {
    /// Builds a model from equation text. `config_json` overrides the defaults.
    #[new]
    #[pyo3(signature = (store, source, config_json=None))]
    pub fn new(store: &PyStore, source: &str, config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => ModelConfig::from_json_str(json).map_err(value_err)?,
            None => ModelConfig::default(),
        };
        let (inner, report) = FullSystemSolver::from_model_source(store.inner.clone(), source, config).map_err(value_err)?;
        Ok(Self { inner, report })
    }

    pub fn parse_report(&self) -> PyResult<String> {
        serde_json::to_string(&self.report).map_err(value_err)
    }

    /// Solves `start..=end` and returns iteration counts by quarter.
    #[pyo3(signature = (start, end, suppress_residuals=false))]
    pub fn solve(&mut self, start: &str, end: &str, suppress_residuals: bool) -> PyResult<Vec<(String, usize)>> {
        let report = self.inner.solve(start, end, mode(suppress_residuals)).map_err(value_err)?;
        Ok(report.iterations().into_iter().collect())
    }

    #[pyo3(signature = (remove, equation=None))]
    pub fn swap_closure(&mut self, remove: &str, equation: Option<&str>) -> PyResult<bool> {
        let swap = self.inner.swap_closure(remove, equation).map_err(value_err)?;
        Ok(swap.removed)
    }

    pub fn make_exogenous(&mut self, var: &str) -> bool { self.inner.make_exogenous(var) }

    pub fn apply_shock(&mut self, var: &str, delta: f64, start: &str, periods: usize) -> PyResult<usize> {
        let shock = self.inner.apply_shock(var, delta, start, periods).map_err(value_err)?;
        Ok(shock.periods)
    }

    pub fn get(&self, name: &str, quarter: &str) -> PyResult<f64> {
        let t = self.inner.period_index(quarter).map_err(value_err)?;
        Ok(self.inner.store().get(name, t))
    }

    pub fn series(&self, name: &str) -> PyResult<Vec<f64>> {
        self.inner
            .store()
            .series_by_name(name)
            .map(|s| s.to_vec())
            .ok_or_else(|| value_err(StoreError::UnknownVariable(name.to_string())))
    }

    #[pyo3(signature = (var, quarter, suppress_residuals=false))]
    pub fn trace(&self, var: &str, quarter: &str, suppress_residuals: bool) -> PyResult<String> {
        self.inner.trace(var, quarter, mode(suppress_residuals)).map_err(value_err)
    }
}

/// Round-trips an expression through the transpiler, returning the expanded form.
#[pyfunction]
pub fn transpile_expr(text: &str) -> PyResult<String> {
    Ok(transpile::transpile_expr(text).map_err(value_err)?.to_source())
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyStore>()?;
    m.add_class::<PyModel>()?;
    m.add_function(wrap_pyfunction!(transpile_expr, m)?)?;
    Ok(())
}
