//! The variable store: named quarterly series over one contiguous horizon.
//!
//! Every series has the same length and alignment, so period index `t` means
//! the same calendar quarter in all of them. Series are created lazily and
//! start out as NaN ("unknown").
pub mod registry;
pub mod types;

pub use registry::VariableRegistry;
pub use types::{DateOp, Quarter, VarId};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Malformed quarter label '{0}'")]
    MalformedQuarter(String),
    #[error("Quarter {quarter} is outside the horizon {start}..{end}")]
    OutsideHorizon { quarter: String, start: Quarter, end: Quarter },
    #[error("Period index {t} is outside a horizon of {len} periods")]
    IndexOutOfRange { t: usize, len: usize },
    #[error("Invalid horizon: {start} is after {end}")]
    InvalidHorizon { start: Quarter, end: Quarter },
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Store data holds {found} values, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },
}

/// Columnar storage of every series in the model.
///
/// Layout: series `id` occupies `data[id * len .. (id + 1) * len]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StoreRepr")]
pub struct Store {
    start: Quarter,
    len: usize,
    registry: VariableRegistry,
    #[serde(with = "nan_as_null")]
    data: Vec<f64>,
}

/// Unchecked wire form of a [`Store`].
#[derive(Deserialize)]
struct StoreRepr {
    start: Quarter,
    len: usize,
    registry: VariableRegistry,
    #[serde(with = "nan_as_null")]
    data: Vec<f64>,
}

impl TryFrom<StoreRepr> for Store {
    type Error = StoreError;

    fn try_from(raw: StoreRepr) -> Result<Self, Self::Error> {
        let expected = raw.registry.count().checked_mul(raw.len).unwrap_or(usize::MAX);
        if raw.len == 0 || raw.data.len() != expected {
            return Err(StoreError::LengthMismatch { expected, found: raw.data.len() });
        }
        Ok(Self { start: raw.start, len: raw.len, registry: raw.registry, data: raw.data })
    }
}

impl Store {
    pub fn new(start: &str, end: &str) -> Result<Self, StoreError> {
        Self::with_quarters(Quarter::parse(start)?, Quarter::parse(end)?)
    }

    pub fn with_quarters(start: Quarter, end: Quarter) -> Result<Self, StoreError> {
        if end < start {
            return Err(StoreError::InvalidHorizon { start, end });
        }
        Ok(Self {
            start,
            len: (start.offset_to(end) + 1) as usize,
            registry: VariableRegistry::new(),
            data: Vec::new(),
        })
    }

    // --- Horizon ---

    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
    pub fn start(&self) -> Quarter { self.start }
    pub fn end(&self) -> Quarter { self.start.shift(self.len as i64 - 1) }

    pub fn quarter_at(&self, t: usize) -> Option<Quarter> {
        (t < self.len).then(|| self.start.shift(t as i64))
    }

    pub fn label(&self, t: usize) -> Option<String> {
        self.quarter_at(t).map(|q| q.to_string())
    }

    /// Maps a quarter label to its period index. Never clamps.
    pub fn index_of(&self, label: &str) -> Result<usize, StoreError> {
        self.index_of_quarter(Quarter::parse(label)?)
    }

    pub fn index_of_quarter(&self, quarter: Quarter) -> Result<usize, StoreError> {
        let offset = self.start.offset_to(quarter);
        if offset < 0 || offset as usize >= self.len {
            return Err(StoreError::OutsideHorizon {
                quarter: quarter.to_string(),
                start: self.start,
                end: self.end(),
            });
        }
        Ok(offset as usize)
    }

    // --- Variables ---

    pub fn var_count(&self) -> usize { self.registry.count() }
    pub fn registry(&self) -> &VariableRegistry { &self.registry }
    pub fn id(&self, name: &str) -> Option<VarId> { self.registry.get(name) }
    pub fn name(&self, id: VarId) -> &str { self.registry.name(id) }
    pub fn contains(&self, name: &str) -> bool { self.registry.get(name).is_some() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registry.iter().map(|(_, n)| n)
    }

    /// Returns the handle for `name`, creating an all-NaN series if needed.
    pub fn intern(&mut self, name: &str) -> VarId {
        let (id, created) = self.registry.intern(name);
        if created {
            self.data.resize(self.data.len() + self.len, f64::NAN);
        }
        id
    }

    #[inline(always)]
    pub fn series(&self, id: VarId) -> &[f64] {
        let start = id.index() * self.len;
        &self.data[start..start + self.len]
    }

    #[inline(always)]
    pub fn series_mut(&mut self, id: VarId) -> &mut [f64] {
        let start = id.index() * self.len;
        &mut self.data[start..start + self.len]
    }

    pub fn series_by_name(&self, name: &str) -> Option<&[f64]> {
        self.id(name).map(|id| self.series(id))
    }

    /// Value of `id` at `t`, NaN when `t` is outside the horizon.
    #[inline(always)]
    pub fn at(&self, id: VarId, t: usize) -> f64 {
        if t < self.len { self.data[id.index() * self.len + t] } else { f64::NAN }
    }

    /// Value at a signed period index; `None` when it falls off the horizon.
    #[inline(always)]
    pub fn at_offset(&self, id: VarId, t: i64) -> Option<f64> {
        if t < 0 || t as usize >= self.len {
            return None;
        }
        Some(self.data[id.index() * self.len + t as usize])
    }

    pub fn set_at(&mut self, id: VarId, t: usize, value: f64) -> Result<(), StoreError> {
        if t >= self.len {
            return Err(StoreError::IndexOutOfRange { t, len: self.len });
        }
        self.data[id.index() * self.len + t] = value;
        Ok(())
    }

    /// Value of `name` at `t`; NaN for unknown names or out-of-horizon indices.
    pub fn get(&self, name: &str, t: usize) -> f64 {
        self.id(name).map_or(f64::NAN, |id| self.at(id, t))
    }

    pub fn set(&mut self, name: &str, t: usize, value: f64) -> Result<(), StoreError> {
        if t >= self.len {
            return Err(StoreError::IndexOutOfRange { t, len: self.len });
        }
        let id = self.intern(name);
        self.set_at(id, t, value)
    }

    /// Sets every period of `name` to `value` (an exogenous assumption).
    pub fn broadcast(&mut self, name: &str, value: f64) {
        let id = self.intern(name);
        self.series_mut(id).fill(value);
    }

    /// Places a partial series starting at `first` into the horizon.
    /// Values that fall outside the horizon are ignored; returns how many were stored.
    pub fn load_series(&mut self, name: &str, first: &str, values: &[f64]) -> Result<usize, StoreError> {
        let first = Quarter::parse(first)?;
        let id = self.intern(name);
        let offset = self.start.offset_to(first);
        let len = self.len as i64;
        let series = self.series_mut(id);
        let mut placed = 0;
        for (i, &v) in values.iter().enumerate() {
            let t = offset + i as i64;
            if (0..len).contains(&t) {
                series[t as usize] = v;
                placed += 1;
            }
        }
        Ok(placed)
    }

    /// Value of `name` at a fixed quarter, independent of the period being solved.
    pub fn element(&self, name: &str, label: &str) -> Result<f64, StoreError> {
        let t = self.index_of(label)?;
        Ok(self.get(name, t))
    }

    /// Snapshot of every series at period `t`, indexed by `VarId`.
    pub fn column_at(&self, t: usize) -> Vec<f64> {
        (0..self.var_count()).map(|i| self.at(VarId::new(i), t)).collect()
    }

    // --- Date helpers (numeric dummies) ---

    fn checked_quarter(&self, t: usize) -> Result<Quarter, StoreError> {
        self.quarter_at(t).ok_or(StoreError::IndexOutOfRange { t, len: self.len })
    }

    pub fn date_dummy(&self, t: usize, op: DateOp, label: &str) -> Result<f64, StoreError> {
        let current = self.checked_quarter(t)?;
        let target = Quarter::parse(label)?;
        Ok(if op.holds(current, target) { 1.0 } else { 0.0 })
    }

    pub fn equals(&self, t: usize, label: &str) -> Result<f64, StoreError> {
        self.date_dummy(t, DateOp::Eq, label)
    }

    pub fn at_or_after(&self, t: usize, label: &str) -> Result<f64, StoreError> {
        self.date_dummy(t, DateOp::Ge, label)
    }

    pub fn at_or_before(&self, t: usize, label: &str) -> Result<f64, StoreError> {
        self.date_dummy(t, DateOp::Le, label)
    }

    /// Signed quarter offset of period `t` from `base`.
    pub fn trend(&self, t: usize, base: &str) -> Result<f64, StoreError> {
        let current = self.checked_quarter(t)?;
        Ok(Quarter::parse(base)?.offset_to(current) as f64)
    }
}

/// JSON has no NaN or infinity, so every non-finite value travels as `null`
/// and loads back as unknown (NaN).
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let opt: Vec<Option<f64>> = data.iter().map(|v| v.is_finite().then_some(*v)).collect();
        opt.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let opt: Vec<Option<f64>> = Vec::deserialize(d)?;
        Ok(opt.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip_over_horizon() {
        let store = Store::new("2019Q3", "2022Q2").unwrap();
        assert_eq!(store.len(), 12);
        for t in 0..store.len() {
            let label = store.label(t).unwrap();
            assert_eq!(store.index_of(&label).unwrap(), t);
        }
        assert_eq!(store.end().to_string(), "2022Q2");
    }

    #[test]
    fn test_index_of_never_clamps() {
        let store = Store::new("2020Q1", "2020Q4").unwrap();
        assert!(matches!(store.index_of("2019Q4"), Err(StoreError::OutsideHorizon { .. })));
        assert!(matches!(store.index_of("2021Q1"), Err(StoreError::OutsideHorizon { .. })));
        assert!(matches!(store.index_of("2020-1"), Err(StoreError::MalformedQuarter(_))));
    }

    #[test]
    fn test_json_load_checks_shape() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        store.load_series("A", "2020Q1", &[1.0, 2.0]).unwrap();
        store.set("B", 0, f64::INFINITY).unwrap();
        let json = serde_json::to_string(&store).unwrap();
        let back: Store = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("A", 1), 2.0);
        assert!(back.get("A", 3).is_nan());
        // Infinity cannot be written as JSON and comes back unknown
        assert!(back.get("B", 0).is_nan());

        let short = r#"{"start":"2020Q1","len":4,"registry":["A","B"],"data":[1.0,2.0]}"#;
        let err = serde_json::from_str::<Store>(short).unwrap_err();
        assert!(err.to_string().contains("expected 8"), "{}", err);
        let empty = r#"{"start":"2020Q1","len":0,"registry":[],"data":[]}"#;
        assert!(serde_json::from_str::<Store>(empty).is_err());
    }

    #[test]
    fn test_invalid_horizon() {
        assert!(matches!(Store::new("2021Q1", "2020Q4"), Err(StoreError::InvalidHorizon { .. })));
    }

    #[test]
    fn test_lazy_series_start_unknown() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        assert!(store.get("CONS", 0).is_nan());
        let id = store.intern("CONS");
        assert!(store.series(id).iter().all(|v| v.is_nan()));
        store.set("CONS", 2, 10.0).unwrap();
        assert_eq!(store.at(id, 2), 10.0);
        assert!(store.set("CONS", 4, 1.0).is_err());
        assert!(store.get("CONS", 99).is_nan());
    }

    #[test]
    fn test_broadcast_fills_every_period() {
        let mut store = Store::new("2020Q1", "2022Q4").unwrap();
        store.broadcast("GDP", 500_000.0);
        for t in 0..store.len() {
            assert_eq!(store.get("GDP", t), 500_000.0);
        }
        assert_eq!(store.element("GDP", "2020Q1").unwrap(), 500_000.0);
    }

    #[test]
    fn test_load_series_clips_to_horizon() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        let placed = store.load_series("X", "2019Q3", &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(placed, 2);
        assert_eq!(store.get("X", 0), 3.0);
        assert_eq!(store.get("X", 1), 4.0);
        assert!(store.get("X", 2).is_nan());
    }

    #[test]
    fn test_date_helpers() {
        let store = Store::new("2009Q1", "2010Q4").unwrap();
        let t = store.index_of("2009Q3").unwrap();
        assert_eq!(store.equals(t, "2009Q3").unwrap(), 1.0);
        assert_eq!(store.equals(t, "2009Q4").unwrap(), 0.0);
        assert_eq!(store.at_or_after(t, "2009Q1").unwrap(), 1.0);
        assert_eq!(store.at_or_after(t, "2010Q1").unwrap(), 0.0);
        assert_eq!(store.at_or_before(t, "2009Q3").unwrap(), 1.0);
        assert_eq!(store.trend(t, "2009Q1").unwrap(), 2.0);
        assert_eq!(store.trend(t, "2010Q1").unwrap(), -2.0);
    }

    #[test]
    fn test_json_round_trip_keeps_unknowns() {
        let mut store = Store::new("2020Q1", "2020Q2").unwrap();
        store.set("A", 0, 1.5).unwrap();
        let json = serde_json::to_string(&store).unwrap();
        let back: Store = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("A", 0), 1.5);
        assert!(back.get("A", 1).is_nan());
        assert_eq!(back.id("A"), Some(VarId(0)));
    }
}
