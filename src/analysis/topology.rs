//! Contemporaneous dependency structure of the equation set.
use crate::model::EquationSet;
use crate::store::VarId;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::Serialize;
use std::collections::BTreeSet;

/// Equations (by position) that must be solved together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub equations: Vec<usize>,
    /// Contains a within-period cycle, so Gauss-Seidel has to iterate over it.
    pub simultaneous: bool,
}

/// Blocks in causal order: every block only reads current-period values
/// produced by itself or by earlier blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockStructure {
    pub blocks: Vec<Block>,
}

impl BlockStructure {
    /// Equation positions, block by block.
    pub fn order(&self) -> Vec<usize> {
        self.blocks.iter().flat_map(|b| b.equations.iter().copied()).collect()
    }

    pub fn simultaneous(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.simultaneous)
    }

    pub fn largest_block(&self) -> usize {
        self.blocks.iter().map(|b| b.equations.len()).max().unwrap_or(0)
    }

    /// No within-period cycles: one ordered pass solves each period.
    pub fn is_recursive(&self) -> bool {
        self.simultaneous().next().is_none()
    }
}

/// Graph over equation positions with an edge producer -> consumer for every
/// lag-0 reference to another equation's target.
pub fn dependency_graph(equations: &EquationSet) -> DiGraph<usize, ()> {
    let mut graph = DiGraph::with_capacity(equations.len(), equations.len() * 2);
    let nodes: Vec<NodeIndex> = (0..equations.len()).map(|i| graph.add_node(i)).collect();
    for (consumer, eq) in equations.iter().enumerate() {
        for var in eq.rhs.contemporaneous_refs() {
            if let Some(producer) = equations.position_of(*var) {
                graph.update_edge(nodes[producer], nodes[consumer], ());
            }
        }
    }
    graph
}

pub fn block_structure(equations: &EquationSet) -> BlockStructure {
    let graph = dependency_graph(equations);
    // tarjan_scc yields components in reverse topological order
    let mut sccs = tarjan_scc(&graph);
    sccs.reverse();
    let blocks = sccs
        .into_iter()
        .map(|component| {
            let simultaneous = component.len() > 1 || graph.contains_edge(component[0], component[0]);
            let mut equations: Vec<usize> = component.iter().map(|n| graph[*n]).collect();
            equations.sort_unstable();
            Block { equations, simultaneous }
        })
        .collect();
    BlockStructure { blocks }
}

/// Positions of equations that respond within the same period to a change in `var`.
pub fn downstream_of(equations: &EquationSet, var: VarId) -> Vec<usize> {
    let graph = dependency_graph(equations);
    let mut reached = BTreeSet::new();
    for (pos, eq) in equations.iter().enumerate() {
        if !eq.rhs.contemporaneous_refs().contains(&&var) {
            continue;
        }
        let mut dfs = Dfs::new(&graph, NodeIndex::new(pos));
        while let Some(n) = dfs.next(&graph) {
            reached.insert(graph[n]);
        }
    }
    reached.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Equation;
    use crate::store::Store;

    fn set(lines: &[&str]) -> (Store, EquationSet) {
        let mut store = Store::new("2020Q1", "2020Q4").unwrap();
        let parsed: Vec<Equation> = lines.iter().map(|l| Equation::parse(l).unwrap()).collect();
        let set = EquationSet::bind(&parsed, &mut store);
        (store, set)
    }

    #[test]
    fn test_blocks_follow_causal_order() {
        let (_, eqs) = set(&[
            "GDP = CONS + INV",     // 0
            "CONS = 0.6 * GDP(-1) + 0.2 * INC", // 1
            "INC = 0.9 * GDP",      // 2
            "INV = 10",             // 3
            "TAX = 0.2 * INC(-1)",  // 4
        ]);
        let blocks = block_structure(&eqs);
        let order = blocks.order();
        let pos = |i: usize| order.iter().position(|&p| p == i).unwrap();
        assert!(pos(3) < pos(0));
        assert_eq!(blocks.largest_block(), 3);
        assert!(!blocks.is_recursive());
        let cycle: Vec<&Block> = blocks.simultaneous().collect();
        assert_eq!(cycle.len(), 1);
        assert_eq!(cycle[0].equations, vec![0, 1, 2]);
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn test_lagged_links_do_not_form_cycles() {
        let (_, eqs) = set(&["A = B(-1)", "B = A(-1)", "C = A + B"]);
        let blocks = block_structure(&eqs);
        assert!(blocks.is_recursive());
        assert_eq!(blocks.blocks.len(), 3);
        assert_eq!(*blocks.order().last().unwrap(), 2);
    }

    #[test]
    fn test_self_reference_is_simultaneous() {
        let (_, eqs) = set(&["A = 0.5 * A + 1"]);
        assert!(!block_structure(&eqs).is_recursive());
    }

    #[test]
    fn test_downstream_of_exogenous_input() {
        let (store, eqs) = set(&["GDP = CONS + G", "CONS = 0.5 * INC", "INC = GDP", "X = G(-1)"]);
        assert_eq!(downstream_of(&eqs, store.id("G").unwrap()), vec![0, 1, 2]);
        assert!(downstream_of(&eqs, store.id("X").unwrap()).is_empty());
    }
}
