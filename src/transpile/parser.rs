//! Recursive-descent parser from tokens to `Expr` trees.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?
//! primary := number | '(' expr ')' | ident | ident '(' lag ')' | func '(' expr ')' | '@' call
//! ```
//!
//! `dlog(e)` and `d(e)` are expanded while parsing, so the tree never holds them.
use super::lexer::{tokenize, Span, Token};
use super::ParseError;
use crate::compute::{BinOp, EquationKind, Expr, Func};
use crate::store::{DateOp, Quarter};

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    end: usize,
}

impl Parser {
    pub fn new(src: &str) -> Result<Self, ParseError> {
        Ok(Self { tokens: tokenize(src)?, pos: 0, end: src.len() })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn step_back(&mut self, consumed: bool) {
        if consumed {
            self.pos -= 1;
        }
    }

    fn eat(&mut self, want: &Token) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some((tok, span)) => ParseError::Unexpected {
                found: tok.to_string(),
                offset: span.start,
                expected: expected.to_string(),
            },
            None => ParseError::UnexpectedEnd { offset: self.end, expected: expected.to_string() },
        }
    }

    fn expect(&mut self, want: &Token) -> Result<(), ParseError> {
        if self.eat(want) { Ok(()) } else { Err(self.unexpected(&format!("'{}'", want))) }
    }

    /// Fails unless every token was consumed.
    pub fn finish(&self) -> Result<(), ParseError> {
        if self.pos < self.tokens.len() { Err(self.unexpected("end of expression")) } else { Ok(()) }
    }

    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::binary(op, lhs, self.term()?);
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::binary(op, lhs, self.unary()?);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.primary()?;
        if self.eat(&Token::Caret) {
            // Right associative: a^b^c = a^(b^c)
            let exponent = self.unary()?;
            return Ok(Expr::binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Some(Token::Integer(i)) => Ok(Expr::Const(i as f64)),
            Some(Token::Float(v)) => Ok(Expr::Const(v)),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => self.ident(name),
            Some(Token::At(name)) => self.at_call(&name),
            other => {
                self.step_back(other.is_some());
                Err(self.unexpected("a number, variable or function"))
            }
        }
    }

    fn ident(&mut self, name: String) -> Result<Expr, ParseError> {
        if self.peek() != Some(&Token::LParen) {
            return Ok(Expr::var(name.to_ascii_uppercase(), 0));
        }
        let func = match name.to_ascii_lowercase().as_str() {
            "log" => Some(Func::Log),
            "exp" => Some(Func::Exp),
            "abs" => Some(Func::Abs),
            "sqr" | "sqrt" => Some(Func::Sqrt),
            _ => None,
        };
        if let Some(func) = func {
            return Ok(Expr::call(func, self.parenthesized()?));
        }
        // `d` is only the difference operator in lower case; `D(-1)` is a lagged variable
        if name == "d" {
            return Ok(Expr::diff(self.parenthesized()?));
        }
        if name.eq_ignore_ascii_case("dlog") {
            return Ok(Expr::dlog(self.parenthesized()?));
        }
        match self.lag()? {
            Some(lag) => Ok(Expr::var(name.to_ascii_uppercase(), lag)),
            None => Err(ParseError::UnsupportedFunction(name)),
        }
    }

    fn parenthesized(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Token::LParen)?;
        let inner = self.expression()?;
        self.expect(&Token::RParen)?;
        Ok(inner)
    }

    /// `(-k)` or `(+k)` or `(k)` after a name. Returns the lag (positive = past),
    /// or `None` without consuming anything when the parentheses hold something else.
    fn lag(&mut self) -> Result<Option<i32>, ParseError> {
        let (sign, digits_at) = match self.peek_at(1) {
            Some(Token::Minus) => (-1i64, 2),
            Some(Token::Plus) => (1, 2),
            _ => (1, 1),
        };
        let offset = match (self.peek_at(digits_at), self.peek_at(digits_at + 1)) {
            (Some(Token::Integer(k)), Some(Token::RParen)) => sign * *k,
            _ => return Ok(None),
        };
        let lag = i32::try_from(-offset).map_err(|_| ParseError::InvalidLag(offset.to_string()))?;
        self.pos += digits_at + 2;
        Ok(Some(lag))
    }

    fn at_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        match name.to_ascii_lowercase().as_str() {
            "recode" => {
                self.expect(&Token::LParen)?;
                let (op, quarter) = self.date_condition()?;
                self.expect(&Token::Comma)?;
                let if_true = self.expression()?;
                self.expect(&Token::Comma)?;
                let if_false = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::DateDummy { op, quarter, if_true: Box::new(if_true), if_false: Box::new(if_false) })
            }
            "trend" => {
                self.expect(&Token::LParen)?;
                let base = self.date_literal()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::Trend { base })
            }
            "elem" => {
                self.expect(&Token::LParen)?;
                let var = match self.advance() {
                    Some(Token::Ident(v)) => v.to_ascii_uppercase(),
                    other => {
                        self.step_back(other.is_some());
                        return Err(self.unexpected("a variable name"));
                    }
                };
                self.expect(&Token::Comma)?;
                let quarter = self.date_literal()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::Element { var, quarter })
            }
            _ => Err(ParseError::UnsupportedFunction(format!("@{}", name))),
        }
    }

    /// `@date <relop> @dateval(<date>)`
    fn date_condition(&mut self) -> Result<(DateOp, Quarter), ParseError> {
        match self.peek() {
            Some(t) if t.is_at("date") => self.pos += 1,
            _ => return Err(self.unexpected("@date")),
        }
        let op = match self.advance() {
            Some(Token::Eq) => DateOp::Eq,
            Some(Token::Ne) => DateOp::Ne,
            Some(Token::Ge) => DateOp::Ge,
            Some(Token::Le) => DateOp::Le,
            Some(Token::Gt) => DateOp::Gt,
            Some(Token::Lt) => DateOp::Lt,
            other => {
                self.step_back(other.is_some());
                return Err(self.unexpected("a comparison operator"));
            }
        };
        match self.peek() {
            Some(t) if t.is_at("dateval") => self.pos += 1,
            _ => return Err(self.unexpected("@dateval")),
        }
        self.expect(&Token::LParen)?;
        let quarter = self.date_literal()?;
        self.expect(&Token::RParen)?;
        Ok((op, quarter))
    }

    fn date_literal(&mut self) -> Result<Quarter, ParseError> {
        match self.advance() {
            Some(Token::Quarter(s)) | Some(Token::Str(s)) => parse_date_label(&s),
            other => {
                self.step_back(other.is_some());
                Err(self.unexpected("a date such as \"2008Q1\" or \"2008:1\""))
            }
        }
    }
}

/// Parses `YYYYQn` or `YYYY:n`. A colon sub-period above 4 folds back into
/// 1..=4 as `(n - 1) % 4 + 1`.
pub fn parse_date_label(label: &str) -> Result<Quarter, ParseError> {
    let invalid = || ParseError::InvalidDate(label.to_string());
    let s = label.trim();
    if let Some((year, sub)) = s.split_once(':') {
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let n: u32 = sub.trim().parse().map_err(|_| invalid())?;
        if n == 0 {
            return Err(invalid());
        }
        return Quarter::new(year, ((n - 1) % 4 + 1) as u8).map_err(|_| invalid());
    }
    Quarter::parse(s).map_err(|_| invalid())
}

/// Parses a right-hand side expression.
pub fn transpile_expr(text: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(text)?;
    let expr = parser.expression()?;
    parser.finish()?;
    Ok(expr)
}

/// Recognizes the supported left-hand side forms and returns the target and rule.
pub fn parse_lhs(text: &str) -> Result<(String, EquationKind), ParseError> {
    let tokens: Vec<Token> = tokenize(text)?.into_iter().map(|(t, _)| t).collect();
    let unsupported = || ParseError::UnsupportedLhs(text.trim().to_string());
    let (target, kind) = match tokens.as_slice() {
        [Token::Ident(x)] => (x, EquationKind::Identity),
        [Token::At(tag), Token::Ident(x)] if tag.eq_ignore_ascii_case("identity") => (x, EquationKind::Identity),
        [Token::Ident(x), Token::Slash, Token::Ident(y), Token::LParen, Token::Minus, Token::Integer(1), Token::RParen]
            if x.eq_ignore_ascii_case(y) =>
        {
            (x, EquationKind::Ratio)
        }
        [Token::Ident(f), Token::LParen, Token::Ident(x), Token::RParen] => {
            if f.eq_ignore_ascii_case("dlog") {
                (x, EquationKind::LogDiff)
            } else if f == "d" {
                (x, EquationKind::FirstDiff)
            } else {
                return Err(unsupported());
            }
        }
        _ => return Err(unsupported()),
    };
    Ok((target.to_ascii_uppercase(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{EvalContext, Reference};
    use crate::store::Store;
    use rstest::rstest;

    fn refs(e: &Expr) -> Vec<(String, Reference)> {
        let mut out = Vec::new();
        e.for_each_ref(&mut |n, r| out.push((n.clone(), r)));
        out
    }

    fn eval_at(src: &str, store: &mut Store, t: usize) -> f64 {
        let e = transpile_expr(src).unwrap().bind(store);
        e.eval(&EvalContext::new(store, t).unwrap()).unwrap()
    }

    #[rstest]
    #[case("1 + 2 * 3", 7.0)]
    #[case("(1 + 2) * 3", 9.0)]
    #[case("2 ^ 3 ^ 2", 512.0)]
    #[case("-2 ^ 2", -4.0)]
    #[case("10 - 4 - 3", 3.0)]
    #[case("8 / 4 / 2", 1.0)]
    #[case("exp(0) + LOG(1) + abs(-2) + sqr(9)", 6.0)]
    fn test_arithmetic(#[case] src: &str, #[case] expected: f64) {
        let mut store = Store::new("2020Q1", "2020Q1").unwrap();
        assert!((eval_at(src, &mut store, 0) - expected).abs() < 1e-12, "{}", src);
    }

    #[test]
    fn test_lags_and_leads() {
        let e = transpile_expr("A(-1) + B(+2) + c(3) + D(-12)").unwrap();
        assert_eq!(
            refs(&e),
            vec![
                ("A".into(), Reference::Lagged(1)),
                ("B".into(), Reference::Lagged(-2)),
                ("C".into(), Reference::Lagged(-3)),
                ("D".into(), Reference::Lagged(12)),
            ]
        );
    }

    #[test]
    fn test_dlog_expands_with_composed_lags() {
        let e = transpile_expr("dlog(X(-1))").unwrap();
        let expected = Expr::binary(
            BinOp::Sub,
            Expr::call(Func::Log, Expr::var("X".to_string(), 1)),
            Expr::call(Func::Log, Expr::var("X".to_string(), 2)),
        );
        assert_eq!(e, expected);
    }

    #[test]
    fn test_dlog_of_product_shifts_every_reference() {
        let e = transpile_expr("DLOG(A*B(-1))").unwrap();
        assert_eq!(
            refs(&e),
            vec![
                ("A".into(), Reference::Lagged(0)),
                ("B".into(), Reference::Lagged(1)),
                ("A".into(), Reference::Lagged(1)),
                ("B".into(), Reference::Lagged(2)),
            ]
        );
    }

    #[test]
    fn test_nested_difference_operators() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        for (t, v) in [1.0, 2.0, 4.0, 8.0].iter().enumerate() {
            store.set("X", t, *v).unwrap();
        }
        // d(d(X)) at t=3 = (8 - 4) - (4 - 2)
        assert_eq!(eval_at("d(d(X))", &mut store, 3), 2.0);
        assert!((eval_at("d(log(X))", &mut store, 3) - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_dlog_matches_log_ratio() {
        let mut store = Store::new("2020Q1", "2020Q2").unwrap();
        store.set("PCE", 0, 100.0).unwrap();
        store.set("PCE", 1, 120.0).unwrap();
        let v = eval_at("dlog(PCE)", &mut store, 1);
        assert!((v - 1.2f64.ln()).abs() < 1e-12);
        assert!((v - 0.1823).abs() < 1e-4);
    }

    #[rstest]
    #[case(r#"@recode(@date >= @dateval("2008:01"), 1, 0)"#, "2008Q1", 1.0)]
    #[case(r#"@recode(@date >= @dateval("2008:01"), 1, 0)"#, "2007Q4", 0.0)]
    #[case(r#"@RECODE(@DATE = @DATEVAL("2005:02"), 5, 2)"#, "2005Q2", 5.0)]
    #[case(r#"@recode(@date < @dateval(2006Q1), X, 0)"#, "2005Q2", 7.0)]
    #[case(r#"@recode(@date <> @dateval("2005Q2"), 1, 0)"#, "2005Q2", 0.0)]
    fn test_recode(#[case] src: &str, #[case] at: &str, #[case] expected: f64) {
        let mut store = Store::new("2005Q1", "2008Q4").unwrap();
        store.broadcast("X", 7.0);
        let t = store.index_of(at).unwrap();
        assert_eq!(eval_at(src, &mut store, t), expected);
    }

    #[test]
    fn test_recode_branches_are_not_shifted_by_dlog() {
        let e = transpile_expr(r#"dlog(X) * @recode(@date >= @dateval("2008:01"), 1, 0)"#).unwrap();
        assert_eq!(refs(&e), vec![("X".into(), Reference::Lagged(0)), ("X".into(), Reference::Lagged(1))]);
        let mut store = Store::new("2007Q4", "2008Q1").unwrap();
        store.set("X", 0, 1.0).unwrap();
        store.set("X", 1, std::f64::consts::E).unwrap();
        assert!((eval_at(r#"dlog(X) * @recode(@date >= @dateval("2008:01"), 1, 0)"#, &mut store, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_trend_and_elem() {
        let mut store = Store::new("2008Q1", "2010Q4").unwrap();
        store.load_series("P", "2008Q1", &[10.0, 11.0, 12.0]).unwrap();
        let t = store.index_of("2009Q2").unwrap();
        assert_eq!(eval_at("@TREND(2008Q1)", &mut store, t), 5.0);
        assert_eq!(eval_at(r#"@trend("2009:3")"#, &mut store, t), -1.0);
        assert_eq!(eval_at(r#"@elem(P, "2008Q2")"#, &mut store, t), 11.0);
        // Fixed-quarter nodes ignore dlog shifting
        let e = transpile_expr(r#"d(@elem(P, "2008Q2") * @trend(2008Q1))"#).unwrap();
        assert_eq!(eval_at(&e.to_source(), &mut store, t), 0.0);
    }

    #[rstest]
    #[case("2005:02", "2005Q2")]
    #[case("2005:2", "2005Q2")]
    #[case("2005:5", "2005Q1")]
    #[case("2005:12", "2005Q4")]
    #[case("2005q3", "2005Q3")]
    fn test_date_labels(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse_date_label(input).unwrap().to_string(), expected);
    }

    #[rstest]
    #[case("2005:0")]
    #[case("05:1")]
    #[case("2005")]
    fn test_bad_date_labels(#[case] input: &str) {
        assert!(matches!(parse_date_label(input), Err(ParseError::InvalidDate(_))));
    }

    #[rstest]
    #[case("CONS", "CONS", EquationKind::Identity)]
    #[case("@IDENTITY gdpm", "GDPM", EquationKind::Identity)]
    #[case("Y/Y(-1)", "Y", EquationKind::Ratio)]
    #[case("dlog(CONS)", "CONS", EquationKind::LogDiff)]
    #[case("DLOG(cons)", "CONS", EquationKind::LogDiff)]
    #[case("d(LAB)", "LAB", EquationKind::FirstDiff)]
    fn test_lhs_forms(#[case] src: &str, #[case] target: &str, #[case] kind: EquationKind) {
        assert_eq!(parse_lhs(src).unwrap(), (target.to_string(), kind));
    }

    #[rstest]
    #[case("Y/X(-1)")]
    #[case("Y/Y(-2)")]
    #[case("log(Y)")]
    #[case("D(Y)")]
    #[case("A + B")]
    fn test_unsupported_lhs(#[case] src: &str) {
        assert!(matches!(parse_lhs(src), Err(ParseError::UnsupportedLhs(_))));
    }

    #[rstest]
    #[case("A +")]
    #[case("(A")]
    #[case("A B")]
    #[case("sin(A)")]
    #[case("@movav(A, 4)")]
    #[case("A(-1.5)")]
    fn test_malformed_expressions(#[case] src: &str) {
        assert!(transpile_expr(src).is_err(), "{}", src);
    }
}
