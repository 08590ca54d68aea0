//! Gauss-Seidel iteration for one quarter.
use super::group::BoxedGroup;
use super::options::SolverOptions;
use super::report::{PeriodReport, SkipCounts};
use crate::compute::kernel::relative_change;
use crate::store::{Store, StoreError, VarId};

/// Largest relative change between a snapshot and the current values at `t`.
///
/// A value that was unknown in the snapshot (or whose series did not exist
/// yet) and is now finite scores infinity, so a pass that resolves anything
/// never ends the iteration.
pub(crate) fn max_change_since(before: &[f64], store: &Store, t: usize) -> f64 {
    (0..store.var_count())
        .filter_map(|i| {
            let new = store.at(VarId::new(i), t);
            match before.get(i) {
                Some(&old) if old.is_finite() || !new.is_finite() => relative_change(old, new),
                _ if new.is_finite() => Some(f64::INFINITY),
                _ => None,
            }
        })
        .fold(0.0, f64::max)
}

/// Runs every group in order, repeatedly, until no variable at `t` moves by
/// more than the tolerance or the iteration cap is hit.
///
/// Non-convergence is reported through `converged = false` with
/// `iterations == max_iter`; the store keeps the last iterate.
pub fn solve_period(
    store: &mut Store,
    t: usize,
    groups: &[BoxedGroup],
    options: &SolverOptions,
) -> Result<PeriodReport, StoreError> {
    let quarter = store.quarter_at(t).ok_or(StoreError::IndexOutOfRange { t, len: store.len() })?;
    let mut report = PeriodReport {
        quarter,
        t,
        iterations: 0,
        converged: false,
        max_change: f64::INFINITY,
        skips: SkipCounts::default(),
    };

    for iteration in 1..=options.max_iter {
        let before = store.column_at(t);
        for g in groups {
            g.solve(store, t);
        }
        report.iterations = iteration;
        report.max_change = max_change_since(&before, store, t);
        if report.max_change < options.tolerance {
            report.converged = true;
            break;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::group::group;

    fn contraction() -> Vec<BoxedGroup> {
        // X = 0.5 * Y + 1, Y = 0.5 * X + 1  =>  X = Y = 2
        vec![
            group("x", |s: &mut Store, t| {
                let y = s.get("Y", t);
                let _ = s.set("X", t, 0.5 * if y.is_finite() { y } else { 0.0 } + 1.0);
            }),
            group("y", |s: &mut Store, t| {
                let x = s.get("X", t);
                let _ = s.set("Y", t, 0.5 * x + 1.0);
            }),
        ]
    }

    #[test]
    fn test_converges_to_fixed_point() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        store.intern("X");
        store.intern("Y");
        let report = solve_period(&mut store, 1, &contraction(), &SolverOptions::default()).unwrap();
        assert!(report.converged);
        assert!(report.iterations < 500);
        assert!((store.get("X", 1) - 2.0).abs() < 1e-5);
        assert!((store.get("Y", 1) - 2.0).abs() < 1e-5);
        // Other periods untouched
        assert!(store.get("X", 0).is_nan());
    }

    #[test]
    fn test_resolving_a_value_forces_another_pass() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        store.intern("A");
        store.set("B", 2, 4.0).unwrap();
        let before = store.column_at(2);
        store.set("A", 2, 1.0).unwrap();
        assert_eq!(max_change_since(&before, &store, 2), f64::INFINITY);

        // A series created during the pass counts too
        let before = store.column_at(2);
        store.set("C", 2, 3.0).unwrap();
        assert_eq!(max_change_since(&before, &store, 2), f64::INFINITY);

        let before = store.column_at(2);
        store.set("B", 2, 5.0).unwrap();
        assert!((max_change_since(&before, &store, 2) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_period_reaches_fixed_point_of_block() {
        // A = B + 1 depends on B = 0.5 * A + 2, both unknown at the start: A = 6, B = 5
        let block = vec![
            group("a", |s: &mut Store, t| {
                let b = s.get("B", t);
                let _ = s.set("A", t, b + 1.0);
            }),
            group("b", |s: &mut Store, t| {
                let a = s.get("A", t);
                let v = if a.is_finite() { 0.5 * a + 2.0 } else { 2.0 };
                let _ = s.set("B", t, v);
            }),
        ];
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        store.intern("A");
        store.intern("B");
        let options = SolverOptions::default();
        let report = solve_period(&mut store, 3, &block, &options).unwrap();
        assert!(report.converged);
        assert!(report.iterations > 2);
        assert!((store.get("A", 3) - 6.0).abs() < 1e-5);
        assert!((store.get("B", 3) - 5.0).abs() < 1e-5);

        // Re-running the groups once more moves nothing beyond the tolerance
        let before = store.column_at(3);
        for g in &block {
            g.solve(&mut store, 3);
        }
        assert!(max_change_since(&before, &store, 3) < options.tolerance);
    }

    #[test]
    fn test_cap_is_soft() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        store.set("Z", 0, 1.0).unwrap();
        let diverging = vec![group("double", |s: &mut Store, t| {
            let z = s.get("Z", t);
            let _ = s.set("Z", t, 2.0 * z);
        })];
        let options = SolverOptions::default().with_max_iter(7);
        let report = solve_period(&mut store, 0, &diverging, &options).unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 7);
        assert_eq!(store.get("Z", 0), 128.0);
    }

    #[test]
    fn test_out_of_range_period() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        assert!(matches!(
            solve_period(&mut store, 4, &contraction(), &SolverOptions::default()),
            Err(StoreError::IndexOutOfRange { t: 4, len: 4 })
        ));
    }
}
