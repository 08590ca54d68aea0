//! Scalar kernels shared by hand-written equation groups and transpiled equations.

/// Floor applied to denominators and logarithm arguments by the guarded helpers.
pub const EPSILON: f64 = 1e-10;

/// `num / den` with `den` floored away from zero, sign preserved.
#[inline(always)]
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den.abs() < EPSILON {
        num / EPSILON.copysign(den)
    } else {
        num / den
    }
}

/// Natural log with the argument floored at `EPSILON`.
#[inline(always)]
pub fn safe_ln(x: f64) -> f64 {
    x.max(EPSILON).ln()
}

/// Growth factor `x / x_prev`, or 1.0 when the previous value is unusable.
#[inline(always)]
pub fn growth(x: f64, x_prev: f64) -> f64 {
    if x_prev.is_finite() && x_prev.abs() >= EPSILON { x / x_prev } else { 1.0 }
}

/// Relative change between two iterates.
///
/// `|new - old| / |old|` when `old` is finite and nonzero, else the absolute
/// change when that is finite. `None` means the pair does not count toward
/// convergence.
#[inline]
pub fn relative_change(old: f64, new: f64) -> Option<f64> {
    let abs = (new - old).abs();
    if old.is_finite() && old != 0.0 {
        let rel = abs / old.abs();
        rel.is_finite().then_some(rel)
    } else if abs.is_finite() {
        Some(abs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100.0, 101.0, Some(0.01))]
    #[case(0.0, 0.5, Some(0.5))]
    #[case(f64::NAN, 3.0, None)]
    #[case(2.0, f64::NAN, None)]
    #[case(-4.0, -2.0, Some(0.5))]
    fn test_relative_change(#[case] old: f64, #[case] new: f64, #[case] expected: Option<f64>) {
        match (relative_change(old, new), expected) {
            (Some(a), Some(b)) => assert!((a - b).abs() < 1e-12),
            (a, b) => assert_eq!(a, b),
        }
    }

    #[test]
    fn test_guards() {
        assert_eq!(safe_div(1.0, 0.0), 1.0 / EPSILON);
        assert_eq!(safe_div(1.0, -0.0), -1.0 / EPSILON);
        assert_eq!(safe_div(6.0, 3.0), 2.0);
        assert_eq!(safe_ln(0.0), EPSILON.ln());
        assert_eq!(growth(5.0, 0.0), 1.0);
        assert_eq!(growth(6.0, 3.0), 2.0);
    }
}
