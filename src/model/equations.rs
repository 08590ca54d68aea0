//! The bound equation list with its target index.
use crate::compute::{Equation, EquationKind};
use crate::store::{Store, VarId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Equations in evaluation order, at most one per target variable.
#[derive(Debug, Clone, Default)]
pub struct EquationSet {
    equations: Vec<Equation<VarId>>,
    index: HashMap<VarId, usize>,
}

impl EquationSet {
    /// Binds parsed equations against `store`, creating series for every name
    /// they mention.
    ///
    /// When a target has several equations, a behavioral form beats a plain
    /// one; otherwise the later equation wins. The survivor keeps the position
    /// of the first equation for that target.
    pub fn bind(parsed: &[Equation], store: &mut Store) -> Self {
        let mut set = Self::default();
        for eq in parsed {
            let bound = eq.bind(store);
            match set.index.get(&bound.target).copied() {
                None => set.push(bound),
                Some(pos) => {
                    let existing = &set.equations[pos];
                    if existing.behavioral && !bound.behavioral {
                        debug!(target = %eq.target, "keeping behavioral form over a later plain equation");
                        continue;
                    }
                    if bound.behavioral && !existing.behavioral {
                        debug!(target = %eq.target, "behavioral form replaces plain equation");
                    } else {
                        warn!(target = %eq.target, "duplicate equation, the later one wins");
                    }
                    set.equations[pos] = bound;
                }
            }
        }
        set
    }

    fn push(&mut self, eq: Equation<VarId>) {
        self.index.insert(eq.target, self.equations.len());
        self.equations.push(eq);
    }

    fn rebuild_index(&mut self) {
        self.index = self.equations.iter().enumerate().map(|(i, e)| (e.target, i)).collect();
    }

    pub fn len(&self) -> usize { self.equations.len() }
    pub fn is_empty(&self) -> bool { self.equations.is_empty() }
    pub fn iter(&self) -> std::slice::Iter<'_, Equation<VarId>> { self.equations.iter() }
    pub fn as_slice(&self) -> &[Equation<VarId>] { &self.equations }

    pub fn get(&self, pos: usize) -> Option<&Equation<VarId>> { self.equations.get(pos) }
    pub fn position_of(&self, target: VarId) -> Option<usize> { self.index.get(&target).copied() }

    pub fn equation_for(&self, target: VarId) -> Option<&Equation<VarId>> {
        self.position_of(target).map(|pos| &self.equations[pos])
    }

    pub fn is_endogenous(&self, var: VarId) -> bool { self.index.contains_key(&var) }

    pub fn identities(&self) -> impl Iterator<Item = &Equation<VarId>> {
        self.equations.iter().filter(|e| e.kind == EquationKind::Identity)
    }

    pub fn targets(&self) -> impl Iterator<Item = VarId> + '_ {
        self.equations.iter().map(|e| e.target)
    }

    /// Removes the equation for `target`. Returns whether one existed.
    pub fn remove_target(&mut self, target: VarId) -> bool {
        match self.index.get(&target).copied() {
            Some(pos) => {
                self.equations.remove(pos);
                self.rebuild_index();
                true
            }
            None => false,
        }
    }

    /// Adds `eq`, replacing in place any equation for the same target.
    pub fn insert(&mut self, eq: Equation<VarId>) -> Option<Equation<VarId>> {
        match self.index.get(&eq.target).copied() {
            Some(pos) => Some(std::mem::replace(&mut self.equations[pos], eq)),
            None => {
                self.push(eq);
                None
            }
        }
    }

    /// Reorders by a permutation of positions.
    pub fn reorder(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.equations.len());
        let mut slots: Vec<Option<Equation<VarId>>> = self.equations.drain(..).map(Some).collect();
        self.equations = order.iter().filter_map(|&i| slots.get_mut(i).and_then(Option::take)).collect();
        self.rebuild_index();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(lines: &[(&str, bool)]) -> Vec<Equation> {
        lines
            .iter()
            .map(|(l, b)| {
                let mut eq = Equation::parse(l).unwrap();
                eq.behavioral = *b;
                eq
            })
            .collect()
    }

    #[test]
    fn test_behavioral_form_is_preferred() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        let parsed = parse(&[
            ("CONS = 0.8*INC", false),
            ("INV = 10", false),
            ("dlog(CONS) = 0.01", true),
            ("CONS = 0.7*INC", false),
        ]);
        let set = EquationSet::bind(&parsed, &mut store);
        assert_eq!(set.len(), 2);
        let cons = set.equation_for(store.id("CONS").unwrap()).unwrap();
        assert_eq!(cons.kind, EquationKind::LogDiff);
        assert_eq!(set.position_of(store.id("CONS").unwrap()), Some(0));
    }

    #[test]
    fn test_later_plain_equation_wins() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        let set = EquationSet::bind(&parse(&[("A = 1", false), ("A = 2", false)]), &mut store);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().source, "A = 2");
    }

    #[test]
    fn test_remove_insert_and_reorder_keep_index() {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        let mut set = EquationSet::bind(&parse(&[("A = 1", false), ("B = A", false), ("C = B", false)]), &mut store);
        let (a, b, c) = (store.id("A").unwrap(), store.id("B").unwrap(), store.id("C").unwrap());

        assert!(set.remove_target(b));
        assert!(!set.remove_target(b));
        assert_eq!(set.position_of(c), Some(1));

        let replaced = set.insert(Equation::parse("A = 5").unwrap().bind(&mut store));
        assert_eq!(replaced.map(|e| e.source), Some("A = 1".to_string()));
        assert!(set.insert(Equation::parse("B = 2").unwrap().bind(&mut store)).is_none());
        assert_eq!(set.position_of(b), Some(2));

        set.reorder(&[2, 0, 1]);
        assert_eq!(set.targets().collect::<Vec<_>>(), vec![b, a, c]);
        assert_eq!(set.position_of(c), Some(2));
    }
}
