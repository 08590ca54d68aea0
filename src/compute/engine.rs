use crate::compute::error::EvalError;
use crate::compute::expr::{BinOp, Expr};
use crate::store::{Quarter, Store, VarId};

/// Evaluation point: one store, one period.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    store: &'a Store,
    t: usize,
    quarter: Quarter,
}

impl<'a> EvalContext<'a> {
    pub fn new(store: &'a Store, t: usize) -> Result<Self, EvalError> {
        let quarter = store.quarter_at(t).ok_or(EvalError::PeriodOutOfRange(t))?;
        Ok(Self { store, t, quarter })
    }

    pub fn t(&self) -> usize { self.t }
    pub fn quarter(&self) -> Quarter { self.quarter }
    pub fn store(&self) -> &'a Store { self.store }

    /// Value of `var` at `t - lag`. Unknown (NaN) values pass through.
    #[inline]
    pub fn lookup(&self, var: VarId, lag: i32) -> Result<f64, EvalError> {
        let period = self.t as i64 - lag as i64;
        self.store
            .at_offset(var, period)
            .ok_or(EvalError::OutsideHorizon { var, period })
    }
}

impl Expr<VarId> {
    /// Tree-walk evaluation. Arithmetic follows IEEE rules: NaN and infinities
    /// propagate and the caller decides what a non-finite result means.
    pub fn eval(&self, ctx: &EvalContext<'_>) -> Result<f64, EvalError> {
        match self {
            Expr::Const(c) => Ok(*c),
            Expr::Var { var, lag } => ctx.lookup(*var, *lag),
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(ctx)?;
                let b = rhs.eval(ctx)?;
                Ok(match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Pow => a.powf(b),
                })
            }
            Expr::Neg(inner) => Ok(-inner.eval(ctx)?),
            Expr::Call { func, arg } => Ok(func.apply(arg.eval(ctx)?)),
            Expr::DateDummy { op, quarter, if_true, if_false } => {
                // Only the selected branch is evaluated
                if op.holds(ctx.quarter, *quarter) {
                    if_true.eval(ctx)
                } else {
                    if_false.eval(ctx)
                }
            }
            Expr::Trend { base } => Ok(base.offset_to(ctx.quarter) as f64),
            Expr::Element { var, quarter } => {
                let t = ctx
                    .store
                    .index_of_quarter(*quarter)
                    .map_err(|_| EvalError::ElementOutsideHorizon { var: *var, quarter: *quarter })?;
                Ok(ctx.store.at(*var, t))
            }
        }
    }
}
