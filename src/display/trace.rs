//! Audit trace of one equation evaluation, rendered as a tree.
use crate::compute::Reference;
use crate::model::{EquationSet, ResidualMode, Residuals};
use crate::store::{Store, VarId};
use std::collections::HashMap;
use std::fmt::Write;

/// Current-period inputs are expanded this many levels deep.
const MAX_DEPTH: usize = 3;

pub fn format_trace(
    store: &Store,
    equations: &EquationSet,
    residuals: &Residuals,
    target: VarId,
    t: usize,
    mode: ResidualMode,
) -> String {
    let mut tracer = Tracer { store, equations, residuals, t, mode, visited_at_level: HashMap::new(), output: String::new() };
    let quarter = store.label(t).unwrap_or_else(|| format!("t={}", t));
    let _ = writeln!(tracer.output, "AUDIT TRACE for '{}' at {}:", store.name(target), quarter);
    let _ = writeln!(tracer.output, "--------------------------------------------------");
    tracer.trace_var(target, 1, "", "");
    tracer.output
}

struct Tracer<'a> {
    store: &'a Store,
    equations: &'a EquationSet,
    residuals: &'a Residuals,
    t: usize,
    mode: ResidualMode,
    visited_at_level: HashMap<VarId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn format_value(v: Option<f64>) -> String {
        match v {
            Some(v) if v.is_nan() => "[NaN]".to_string(),
            Some(v) => format!("[{:.4}]", v),
            None => "[outside horizon]".to_string(),
        }
    }

    fn trace_var(&mut self, var: VarId, level: usize, prefix: &str, stem: &str) {
        let name = self.store.name(var);
        if let Some(&first_seen) = self.visited_at_level.get(&var) {
            let _ = writeln!(self.output, "{}{} -> (Ref to L{})", prefix, name, first_seen);
            return;
        }
        self.visited_at_level.insert(var, level);

        let value = Self::format_value(Some(self.store.at(var, self.t)));
        let Some(eq) = self.equations.equation_for(var) else {
            let _ = writeln!(self.output, "{}[L{}] {} {} -> Exogenous", prefix, level, name, value);
            return;
        };
        let _ = writeln!(self.output, "{}[L{}] {} {} := {}", prefix, level, name, value, eq.render(self.store));

        let mut lines = vec![format!("Rule: {}", eq.kind.describe())];
        match eq.predict(self.store, self.t) {
            Ok(p) => {
                lines.push(format!("RHS {}", Self::format_value(Some(p.rhs))));
                if let Some(lag) = p.lag {
                    lines.push(format!("Lag {}", Self::format_value(Some(lag))));
                }
                let adjustment = self.residuals.adjustment(var, self.t, self.mode);
                let stored = self.residuals.get(var, self.t).unwrap_or(0.0);
                let state = match self.mode {
                    ResidualMode::Apply => "applied",
                    ResidualMode::Suppress => "suppressed",
                };
                lines.push(format!("Residual {} ({})", Self::format_value(Some(stored)), state));
                lines.push(format!("Next {}", Self::format_value(Some(p.value + adjustment))));
            }
            Err(reason) => lines.push(format!("Skipped: {}", reason)),
        }

        let mut inputs: Vec<(VarId, Reference)> = Vec::new();
        eq.rhs.for_each_ref(&mut |v, r| {
            if !inputs.contains(&(*v, r)) {
                inputs.push((*v, r));
            }
        });

        let total = lines.len() + inputs.len();
        let mut i = 0;
        let connector = |i: usize| if i + 1 == total { ("`-- ", "    ") } else { ("|-- ", "|   ") };
        for line in lines {
            let (c, _) = connector(i);
            let _ = writeln!(self.output, "{}{}{}", stem, c, line);
            i += 1;
        }
        for (input, reference) in inputs {
            let (c, next) = connector(i);
            i += 1;
            let child_prefix = format!("{}{}", stem, c);
            match reference {
                Reference::Lagged(0) if level < MAX_DEPTH => {
                    self.trace_var(input, level + 1, &child_prefix, &format!("{}{}", stem, next));
                }
                Reference::Lagged(lag) => {
                    let v = self.store.at_offset(input, self.t as i64 - lag as i64);
                    let label = if lag == 0 { self.store.name(input).to_string() } else { format!("{}({})", self.store.name(input), -lag) };
                    let _ = writeln!(self.output, "{}{} {}", child_prefix, label, Self::format_value(v));
                }
                Reference::Element(q) => {
                    let v = self.store.index_of_quarter(q).ok().map(|t| self.store.at(input, t));
                    let _ = writeln!(self.output, "{}@elem({}, {}) {}", child_prefix, self.store.name(input), q, Self::format_value(v));
                }
            }
        }
    }
}
