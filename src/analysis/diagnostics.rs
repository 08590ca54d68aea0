use crate::store::{Quarter, Store, VarId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NanEntry {
    pub var: String,
    pub quarters: Vec<Quarter>,
}

/// Unknown values left in a set of series over a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NanReport {
    pub periods: usize,
    pub entries: Vec<NanEntry>,
}

impl NanReport {
    pub fn is_clean(&self) -> bool { self.entries.is_empty() }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.quarters.len()).sum()
    }

    /// Variables with no known value anywhere in the window.
    pub fn fully_unknown(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.quarters.len() == self.periods)
            .map(|e| e.var.as_str())
            .collect()
    }
}

/// Scans `vars` over `first..=last` for NaN values. Entries are sorted by how
/// many periods are missing, worst first.
pub fn scan(store: &Store, vars: &[VarId], first: usize, last: usize) -> NanReport {
    let last = last.min(store.len().saturating_sub(1));
    let periods = if first > last { 0 } else { last - first + 1 };
    let mut entries: Vec<NanEntry> = vars
        .iter()
        .filter_map(|&id| {
            let quarters: Vec<Quarter> = (first..first + periods)
                .filter(|&t| store.at(id, t).is_nan())
                .filter_map(|t| store.quarter_at(t))
                .collect();
            (!quarters.is_empty()).then(|| NanEntry { var: store.name(id).to_string(), quarters })
        })
        .collect();
    entries.sort_by(|a, b| b.quarters.len().cmp(&a.quarters.len()).then_with(|| a.var.cmp(&b.var)));
    NanReport { periods, entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_orders_worst_first() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        store.load_series("A", "2020Q1", &[1.0, f64::NAN, 3.0, 4.0]).unwrap();
        store.intern("B");
        store.broadcast("C", 1.0);
        let ids: Vec<VarId> = ["A", "B", "C"].iter().map(|n| store.id(n).unwrap()).collect();

        let report = scan(&store, &ids, 0, 3);
        assert_eq!(report.periods, 4);
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].var, "B");
        assert_eq!(report.entries[1].quarters, vec![Quarter::parse("2020Q2").unwrap()]);
        assert_eq!(report.total(), 5);
        assert_eq!(report.fully_unknown(), vec!["B"]);

        assert!(scan(&store, &ids[2..], 0, 3).is_clean());
        assert_eq!(scan(&store, &ids, 2, 1).periods, 0);
    }
}
