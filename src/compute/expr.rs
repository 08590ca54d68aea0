//! Typed expression tree produced by the transpiler.
//!
//! `R` is the variable reference: `String` straight out of the parser,
//! `VarId` once bound against a store.
use crate::store::{DateOp, Quarter, Store, VarId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
            BinOp::Pow => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Func {
    Log,
    Exp,
    Abs,
    Sqrt,
}

impl Func {
    pub fn name(&self) -> &'static str {
        match self {
            Func::Log => "log",
            Func::Exp => "exp",
            Func::Abs => "abs",
            Func::Sqrt => "sqr",
        }
    }

    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Func::Log => x.ln(),
            Func::Exp => x.exp(),
            Func::Abs => x.abs(),
            Func::Sqrt => x.sqrt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr<R = String> {
    Const(f64),
    /// `var` at period `t - lag`. Negative lags are leads.
    Var { var: R, lag: i32 },
    Binary { op: BinOp, lhs: Box<Expr<R>>, rhs: Box<Expr<R>> },
    Neg(Box<Expr<R>>),
    Call { func: Func, arg: Box<Expr<R>> },
    /// `@recode(@date <op> @dateval(quarter), if_true, if_false)`
    DateDummy { op: DateOp, quarter: Quarter, if_true: Box<Expr<R>>, if_false: Box<Expr<R>> },
    /// `@trend(base)`: signed quarters from `base` to the current period.
    Trend { base: Quarter },
    /// `@elem(var, quarter)`: value at a fixed quarter.
    Element { var: R, quarter: Quarter },
}

/// How an expression refers to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Lagged(i32),
    Element(Quarter),
}

impl<R> Expr<R> {
    pub fn var(var: R, lag: i32) -> Self { Expr::Var { var, lag } }

    pub fn binary(op: BinOp, lhs: Expr<R>, rhs: Expr<R>) -> Self {
        Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn call(func: Func, arg: Expr<R>) -> Self {
        Expr::Call { func, arg: Box::new(arg) }
    }

    /// Visits every variable reference, element lookups included.
    pub fn for_each_ref<'a>(&'a self, f: &mut impl FnMut(&'a R, Reference)) {
        match self {
            Expr::Const(_) | Expr::Trend { .. } => {}
            Expr::Var { var, lag } => f(var, Reference::Lagged(*lag)),
            Expr::Element { var, quarter } => f(var, Reference::Element(*quarter)),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.for_each_ref(f);
                rhs.for_each_ref(f);
            }
            Expr::Neg(inner) | Expr::Call { arg: inner, .. } => inner.for_each_ref(f),
            Expr::DateDummy { if_true, if_false, .. } => {
                if_true.for_each_ref(f);
                if_false.for_each_ref(f);
            }
        }
    }

    /// Variables read at the current period (lag 0).
    pub fn contemporaneous_refs(&self) -> SmallVec<[&R; 8]> {
        let mut out = SmallVec::new();
        self.collect_contemporaneous(&mut out);
        out
    }

    fn collect_contemporaneous<'a>(&'a self, out: &mut SmallVec<[&'a R; 8]>) {
        match self {
            Expr::Var { var, lag: 0 } => out.push(var),
            Expr::Const(_) | Expr::Trend { .. } | Expr::Element { .. } | Expr::Var { .. } => {}
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_contemporaneous(out);
                rhs.collect_contemporaneous(out);
            }
            Expr::Neg(inner) | Expr::Call { arg: inner, .. } => inner.collect_contemporaneous(out),
            Expr::DateDummy { if_true, if_false, .. } => {
                if_true.collect_contemporaneous(out);
                if_false.collect_contemporaneous(out);
            }
        }
    }

    /// Rewrites every variable reference through `f`, keeping lags.
    pub fn map_vars<S>(&self, f: &mut impl FnMut(&R) -> S) -> Expr<S> {
        match self {
            Expr::Const(c) => Expr::Const(*c),
            Expr::Var { var, lag } => Expr::Var { var: f(var), lag: *lag },
            Expr::Binary { op, lhs, rhs } => Expr::binary(*op, lhs.map_vars(f), rhs.map_vars(f)),
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.map_vars(f))),
            Expr::Call { func, arg } => Expr::call(*func, arg.map_vars(f)),
            Expr::DateDummy { op, quarter, if_true, if_false } => Expr::DateDummy {
                op: *op,
                quarter: *quarter,
                if_true: Box::new(if_true.map_vars(f)),
                if_false: Box::new(if_false.map_vars(f)),
            },
            Expr::Trend { base } => Expr::Trend { base: *base },
            Expr::Element { var, quarter } => Expr::Element { var: f(var), quarter: *quarter },
        }
    }

    /// Renders the tree back into equation-description syntax.
    pub fn render(&self, name: &impl Fn(&R) -> String) -> String {
        let mut out = String::new();
        self.render_into(&mut out, name, 0);
        out
    }

    fn render_into(&self, out: &mut String, name: &impl Fn(&R) -> String, parent_prec: u8) {
        match self {
            Expr::Const(c) => out.push_str(&format!("{}", c)),
            Expr::Var { var, lag } => {
                out.push_str(&name(var));
                if *lag != 0 {
                    out.push_str(&format!("({})", -lag));
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                let wrap = prec < parent_prec;
                if wrap { out.push('('); }
                lhs.render_into(out, name, prec);
                out.push_str(&format!(" {} ", op.symbol()));
                // Left associative: an equal-precedence right child needs parentheses
                rhs.render_into(out, name, prec + 1);
                if wrap { out.push(')'); }
            }
            Expr::Neg(inner) => {
                out.push('-');
                inner.render_into(out, name, 4);
            }
            Expr::Call { func, arg } => {
                out.push_str(func.name());
                out.push('(');
                arg.render_into(out, name, 0);
                out.push(')');
            }
            Expr::DateDummy { op, quarter, if_true, if_false } => {
                out.push_str(&format!("@recode(@date {} @dateval(\"{}\"), ", op.symbol(), quarter));
                if_true.render_into(out, name, 0);
                out.push_str(", ");
                if_false.render_into(out, name, 0);
                out.push(')');
            }
            Expr::Trend { base } => out.push_str(&format!("@trend({})", base)),
            Expr::Element { var, quarter } => {
                out.push_str(&format!("@elem({}, \"{}\")", name(var), quarter))
            }
        }
    }
}

impl<R: Clone> Expr<R> {
    /// Adds `extra` periods of lag to every variable reference.
    /// Element lookups, trends and date dummies are tied to fixed quarters and stay put.
    pub fn shifted(&self, extra: i32) -> Self {
        match self {
            Expr::Var { var, lag } => Expr::Var { var: var.clone(), lag: lag + extra },
            Expr::Const(_) | Expr::Trend { .. } | Expr::Element { .. } => self.clone(),
            Expr::Binary { op, lhs, rhs } => Expr::binary(*op, lhs.shifted(extra), rhs.shifted(extra)),
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.shifted(extra))),
            Expr::Call { func, arg } => Expr::call(*func, arg.shifted(extra)),
            Expr::DateDummy { op, quarter, if_true, if_false } => Expr::DateDummy {
                op: *op,
                quarter: *quarter,
                if_true: Box::new(if_true.shifted(extra)),
                if_false: Box::new(if_false.shifted(extra)),
            },
        }
    }

    /// `dlog(inner)` = `log(inner) - log(inner lagged one more period)`.
    pub fn dlog(inner: Expr<R>) -> Self {
        let lagged = inner.shifted(1);
        Expr::binary(BinOp::Sub, Expr::call(Func::Log, inner), Expr::call(Func::Log, lagged))
    }

    /// `d(inner)` = `inner - inner lagged one more period`.
    pub fn diff(inner: Expr<R>) -> Self {
        let lagged = inner.shifted(1);
        Expr::binary(BinOp::Sub, inner, lagged)
    }
}

impl Expr<String> {
    /// Binds names to store handles, creating any series the store lacks.
    pub fn bind(&self, store: &mut Store) -> Expr<VarId> {
        self.map_vars(&mut |name: &String| store.intern(name))
    }

    /// Binds names against an existing store without creating series.
    pub fn bind_existing(&self, store: &Store) -> Result<Expr<VarId>, EvalError> {
        let mut missing = None;
        let bound = self.map_vars(&mut |name: &String| match store.id(name) {
            Some(id) => id,
            None => {
                missing.get_or_insert_with(|| name.clone());
                VarId::default()
            }
        });
        match missing {
            Some(name) => Err(EvalError::UnboundVariable(name)),
            None => Ok(bound),
        }
    }

    pub fn to_source(&self) -> String {
        self.render(&|name: &String| name.clone())
    }
}
