use obr_macro_core::compute::EvalContext;
use obr_macro_core::{parse_equation, parse_model_source, transpile_expr, EquationKind, ParseError, Store};
use rstest::rstest;

fn pce_store() -> Store {
    let mut s = Store::new("2024Q4", "2025Q2").unwrap();
    s.load_series("PCE", "2024Q4", &[100.0, 120.0]).unwrap();
    s
}

#[test]
fn dlog_is_the_log_growth_rate() {
    let mut s = pce_store();
    let e = transpile_expr("dlog(PCE)").unwrap().bind(&mut s);
    let v = e.eval(&EvalContext::new(&s, 1).unwrap()).unwrap();
    assert!((v - 0.1823).abs() < 1e-4);
    assert_eq!(transpile_expr("dlog(PCE)").unwrap().to_source(), "log(PCE) - log(PCE(-1))");
}

#[rstest]
#[case("PCE/PCE(-1) = 1.05", EquationKind::Ratio, 126.0)]
#[case("dlog(PCE) = 0", EquationKind::LogDiff, 120.0)]
#[case("d(PCE) = 2.5", EquationKind::FirstDiff, 122.5)]
#[case("PCE = PCE(-1) * 2", EquationKind::Identity, 240.0)]
fn update_rules_use_the_previous_value(#[case] line: &str, #[case] kind: EquationKind, #[case] expected: f64) {
    let mut s = pce_store();
    let eq = parse_equation(line).unwrap();
    assert_eq!(eq.kind, kind);
    let bound = eq.bind(&mut s);
    let p = bound.predict(&s, 2).unwrap();
    assert!((p.value - expected).abs() < 1e-9, "{}", line);
}

#[test]
fn unsupported_statements_are_reported_not_fatal() {
    let parsed = parse_model_source("A = 1\nlog(B) = 2\nC = @movav(A, 4)\nD = A +\n", false);
    assert_eq!(parsed.equations.len(), 1);
    let reasons: Vec<&str> = parsed.report.dropped.iter().map(|d| d.reason.as_str()).collect();
    assert_eq!(reasons.len(), 3);
    assert!(reasons[0].starts_with("Unsupported left-hand side"));
    assert!(reasons[1].contains("@movav"));
    assert!(matches!(parse_equation("D = A +"), Err(ParseError::UnexpectedEnd { .. })));
}
