//! Constraint graph of a CNF and min-fill elimination ordering.
//!
//! Vertices are the variables of the CNF (in ascending order), and two
//! variables are adjacent iff they occur together in some clause.

use std::collections::BTreeSet;

use log::debug;

use crate::formula::{Formula, FormulaFactory};
use crate::types::Var;

#[derive(Debug, Clone)]
pub struct ConstraintGraph {
    vertices: Vec<Var>,
    neighbours: Vec<BTreeSet<usize>>,
}

/// Result of min-fill elimination.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MinFillOrdering {
    /// Variables in elimination order.
    pub order: Vec<Var>,
    /// Largest number of uneliminated neighbours of an eliminated vertex.
    pub treewidth: usize,
}

impl ConstraintGraph {
    pub fn from_cnf(f: &FormulaFactory, cnf: Formula) -> Self {
        let vertices: Vec<Var> = f.variables(cnf).iter().copied().collect();
        let mut graph = Self {
            neighbours: vec![BTreeSet::new(); vertices.len()],
            vertices,
        };
        for clause in f.clauses(cnf) {
            let ids: Vec<usize> = clause
                .iter()
                .filter_map(|l| graph.vertex_index(l.var()))
                .collect();
            for (i, &x) in ids.iter().enumerate() {
                for &y in &ids[i + 1..] {
                    graph.add_edge(x, y);
                }
            }
        }
        graph
    }

    pub fn vertices(&self) -> &[Var] {
        &self.vertices
    }

    pub fn num_edges(&self) -> usize {
        self.neighbours.iter().map(|n| n.len()).sum::<usize>() / 2
    }

    pub fn vertex_index(&self, var: Var) -> Option<usize> {
        self.vertices.binary_search(&var).ok()
    }

    pub fn neighbours(&self, var: Var) -> Vec<Var> {
        match self.vertex_index(var) {
            Some(i) => self.neighbours[i].iter().map(|&j| self.vertices[j]).collect(),
            None => Vec::new(),
        }
    }

    fn add_edge(&mut self, x: usize, y: usize) {
        if x != y {
            self.neighbours[x].insert(y);
            self.neighbours[y].insert(x);
        }
    }

    /// Computes a min-fill elimination ordering.
    ///
    /// In each round the uneliminated vertex whose elimination adds the fewest
    /// fill-in edges is chosen; ties go to the smallest variable.
    pub fn min_fill_ordering(&self) -> MinFillOrdering {
        let n = self.vertices.len();
        let mut neighbours = self.neighbours.clone();
        let mut processed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut treewidth = 0;

        for _ in 0..n {
            let mut best: Option<(usize, usize)> = None;
            for v in (0..n).filter(|&v| !processed[v]) {
                let live: Vec<usize> = neighbours[v].iter().copied().filter(|&u| !processed[u]).collect();
                let mut fill = 0;
                for (i, &x) in live.iter().enumerate() {
                    for &y in &live[i + 1..] {
                        if !neighbours[x].contains(&y) {
                            fill += 1;
                        }
                    }
                }
                if best.map_or(true, |(_, min)| fill < min) {
                    best = Some((v, fill));
                }
            }

            let Some((v, _)) = best else {
                break;
            };
            let live: Vec<usize> = neighbours[v].iter().copied().filter(|&u| !processed[u]).collect();
            treewidth = treewidth.max(live.len());
            for (i, &x) in live.iter().enumerate() {
                for &y in &live[i + 1..] {
                    neighbours[x].insert(y);
                    neighbours[y].insert(x);
                }
            }
            processed[v] = true;
            order.push(self.vertices[v]);
        }

        debug!(
            "min_fill_ordering: {} vertices, {} edges, treewidth {}",
            n,
            self.num_edges(),
            treewidth
        );
        MinFillOrdering { order, treewidth }
    }
}
