//! Decomposition trees over the clauses of a CNF.
//!
//! A dtree is a full binary tree whose leaves are the clauses. It is built once
//! from an elimination ordering, then [initialized][Dtree::initialize] against
//! a [`DnnfSolver`], after which all static information (variable sets,
//! separators, clause contents) is expressed in solver indices. The dynamic
//! queries look at the solver's current partial assignment: a clause is
//! *subsumed* when one of its literals is true, and a variable is *undecided*
//! when it is unassigned.
//!
//! Clause contents are stored flat: the literal codes of each clause followed
//! by the sentinel `-id - 1`.

use std::collections::BTreeSet;

use log::debug;

use crate::bitset::BitSet;
use crate::formula::{Formula, FormulaFactory, FormulaKind};
use crate::graph::{ConstraintGraph, MinFillOrdering};
use crate::solver::dnnf::DnnfSolver;
use crate::types::{Lit, Tristate, Var};

#[derive(Debug, Clone)]
pub enum Dtree {
    Leaf(DtreeLeaf),
    Node(DtreeNode),
}

#[derive(Debug, Clone)]
pub struct DtreeLeaf {
    id: usize,
    clause: Formula,
    clause_literals: Vec<Lit>,
    static_variable_set: BTreeSet<Var>,

    literals: Vec<Lit>,
    static_var_set: BitSet,
    static_variables: Vec<usize>,
    static_clause_ids: Vec<usize>,
    clause_contents: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct DtreeNode {
    left: Box<Dtree>,
    right: Box<Dtree>,
    size: usize,
    depth: usize,
    static_variable_set: BTreeSet<Var>,

    static_var_set: BitSet,
    static_variables: Vec<usize>,
    static_separator: Vec<usize>,
    static_clause_ids: Vec<usize>,
    widest_separator: usize,
    clause_contents: Vec<i32>,
}

impl DtreeLeaf {
    pub fn new(f: &FormulaFactory, id: usize, clause: Formula) -> Self {
        let clause_literals = f.clause_literals(clause);
        let static_variable_set = clause_literals.iter().map(|l| l.var()).collect();
        Self {
            id,
            clause,
            clause_literals,
            static_variable_set,
            literals: Vec::new(),
            static_var_set: BitSet::empty(),
            static_variables: Vec::new(),
            static_clause_ids: vec![id],
            clause_contents: Vec::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn clause(&self) -> Formula {
        self.clause
    }

    /// Literals of the clause as solver indices, in clause order.
    pub fn literals(&self) -> &[Lit] {
        &self.literals
    }

    /// Literals of the clause as factory literals, in clause order.
    pub fn clause_literals(&self) -> &[Lit] {
        &self.clause_literals
    }

    fn initialize(&mut self, solver: &DnnfSolver) {
        self.literals = self
            .clause_literals
            .iter()
            .map(|&l| match solver.literal_index(l) {
                Some(lit) => lit,
                None => panic!("Variable {} of leaf {} is unknown to the solver", l.var(), self.id),
            })
            .collect();
        self.static_var_set = self.literals.iter().map(|l| l.var().index()).collect();
        self.static_variables = self.static_var_set.iter().collect();
        self.clause_contents = self.literals.iter().map(|l| l.code() as i32).collect();
        self.clause_contents.push(-(self.id as i32) - 1);
    }
}

impl DtreeNode {
    pub fn new(left: Dtree, right: Dtree) -> Self {
        let size = left.size() + right.size();
        let depth = 1 + left.depth().max(right.depth());
        let static_variable_set = left
            .static_variable_set()
            .union(right.static_variable_set())
            .copied()
            .collect();
        Self {
            left: Box::new(left),
            right: Box::new(right),
            size,
            depth,
            static_variable_set,
            static_var_set: BitSet::empty(),
            static_variables: Vec::new(),
            static_separator: Vec::new(),
            static_clause_ids: Vec::new(),
            widest_separator: 0,
            clause_contents: Vec::new(),
        }
    }

    pub fn left(&self) -> &Dtree {
        &self.left
    }

    pub fn right(&self) -> &Dtree {
        &self.right
    }

    /// Sorted solver variables shared by both subtrees.
    pub fn static_separator(&self) -> &[usize] {
        &self.static_separator
    }

    fn initialize(&mut self, solver: &DnnfSolver) {
        self.left.initialize(solver);
        self.right.initialize(solver);

        let mut var_set = self.left.static_var_set().clone();
        var_set.or(self.right.static_var_set());
        self.static_variables = var_set.iter().collect();
        self.static_var_set = var_set;

        let mut separator = self.left.static_var_set().clone();
        separator.and(self.right.static_var_set());
        self.static_separator = separator.iter().collect();

        self.static_clause_ids = self.left.static_clause_ids().to_vec();
        self.static_clause_ids.extend_from_slice(self.right.static_clause_ids());

        self.widest_separator = self
            .static_separator
            .len()
            .max(self.left.widest_separator())
            .max(self.right.widest_separator());

        self.clause_contents = self.left.clause_contents().to_vec();
        self.clause_contents.extend_from_slice(self.right.clause_contents());
    }
}

/// Iterator over `(leaf id, literal codes)` of flat clause contents.
pub struct ClauseSegments<'a> {
    contents: &'a [i32],
}

impl<'a> Iterator for ClauseSegments<'a> {
    type Item = (usize, &'a [i32]);

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.contents.iter().position(|&x| x < 0)?;
        let (lits, rest) = self.contents.split_at(end);
        let id = (-rest[0] - 1) as usize;
        self.contents = &rest[1..];
        Some((id, lits))
    }
}

#[inline]
fn lit_of(code: i32) -> Lit {
    Lit::from_code(code as u32)
}

/// A clause is subsumed when one of its literals is currently true.
fn subsumed(solver: &DnnfSolver, lits: &[i32]) -> bool {
    lits.iter()
        .any(|&l| solver.value_of(lit_of(l)) == Tristate::True)
}

impl Dtree {
    pub fn size(&self) -> usize {
        match self {
            Dtree::Leaf(_) => 1,
            Dtree::Node(node) => node.size,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Dtree::Leaf(_) => 1,
            Dtree::Node(node) => node.depth,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Dtree::Leaf(_))
    }

    /// Factory variables of all clauses below.
    pub fn static_variable_set(&self) -> &BTreeSet<Var> {
        match self {
            Dtree::Leaf(leaf) => &leaf.static_variable_set,
            Dtree::Node(node) => &node.static_variable_set,
        }
    }

    /// Solver variables of all clauses below.
    pub fn static_var_set(&self) -> &BitSet {
        match self {
            Dtree::Leaf(leaf) => &leaf.static_var_set,
            Dtree::Node(node) => &node.static_var_set,
        }
    }

    pub fn static_variables(&self) -> &[usize] {
        match self {
            Dtree::Leaf(leaf) => &leaf.static_variables,
            Dtree::Node(node) => &node.static_variables,
        }
    }

    pub fn static_clause_ids(&self) -> &[usize] {
        match self {
            Dtree::Leaf(leaf) => &leaf.static_clause_ids,
            Dtree::Node(node) => &node.static_clause_ids,
        }
    }

    pub fn widest_separator(&self) -> usize {
        match self {
            Dtree::Leaf(_) => 0,
            Dtree::Node(node) => node.widest_separator,
        }
    }

    pub fn clause_contents(&self) -> &[i32] {
        match self {
            Dtree::Leaf(leaf) => &leaf.clause_contents,
            Dtree::Node(node) => &node.clause_contents,
        }
    }

    pub fn clause_segments(&self) -> ClauseSegments<'_> {
        ClauseSegments {
            contents: self.clause_contents(),
        }
    }

    /// Precomputes the solver-dependent static information of the whole tree.
    pub fn initialize(&mut self, solver: &DnnfSolver) {
        match self {
            Dtree::Leaf(leaf) => leaf.initialize(solver),
            Dtree::Node(node) => node.initialize(solver),
        }
    }

    /// Undecided variables of the unsubsumed clauses below.
    pub fn dynamic_var_set(&self, solver: &DnnfSolver, out: &mut BitSet) {
        for (_, lits) in self.clause_segments() {
            if subsumed(solver, lits) {
                continue;
            }
            for &l in lits {
                let lit = lit_of(l);
                if solver.value_of(lit) == Tristate::Undef {
                    out.set(lit.var().index());
                }
            }
        }
    }

    /// Undecided variables shared by the unsubsumed clauses of both subtrees.
    ///
    /// Always empty for a leaf. `scratch` is clobbered.
    pub fn dynamic_separator(&self, solver: &DnnfSolver, out: &mut BitSet, scratch: &mut BitSet) {
        out.clear();
        if let Dtree::Node(node) = self {
            scratch.clear();
            node.left.dynamic_var_set(solver, out);
            node.right.dynamic_var_set(solver, scratch);
            out.and(scratch);
        }
    }

    /// Adds one to `occurrences[v]` for every unsubsumed clause containing `v`,
    /// skipping entries equal to `-1`.
    pub fn count_unsubsumed_occurrences(&self, solver: &DnnfSolver, occurrences: &mut [i32]) {
        for (_, lits) in self.clause_segments() {
            if subsumed(solver, lits) {
                continue;
            }
            for &l in lits {
                let v = lit_of(l).var().index();
                if occurrences[v] != -1 {
                    occurrences[v] += 1;
                }
            }
        }
    }

    /// Marks `num_vars + id + 1` for every unsubsumed clause, and the variables
    /// of its undecided literals.
    pub fn cache_key(&self, solver: &DnnfSolver, key: &mut BitSet, num_vars: usize) {
        for (id, lits) in self.clause_segments() {
            if subsumed(solver, lits) {
                continue;
            }
            key.set(num_vars + id + 1);
            for &l in lits {
                let lit = lit_of(l);
                if solver.value_of(lit) == Tristate::Undef {
                    key.set(lit.var().index());
                }
            }
        }
    }
}

/// Folds the clauses of a CNF into a dtree along an elimination ordering.
///
/// For every variable in order, the trees mentioning it are removed and
/// replaced by their balanced composition; the remaining trees are composed at
/// the end.
///
/// Panics if `cnf` is not a CNF or is atomic.
pub fn generate_with_eliminating_order(f: &FormulaFactory, cnf: Formula, ordering: &[Var]) -> Dtree {
    assert!(
        f.is_cnf(cnf) && !f.is_atomic(cnf),
        "Cannot generate a dtree from a non-CNF or atomic formula"
    );
    let clauses = match f.kind(cnf) {
        FormulaKind::And(ops) => ops.to_vec(),
        _ => return Dtree::Leaf(DtreeLeaf::new(f, 0, cnf)),
    };

    let mut sigma: Vec<Dtree> = clauses
        .into_iter()
        .enumerate()
        .map(|(id, clause)| Dtree::Leaf(DtreeLeaf::new(f, id, clause)))
        .collect();
    for var in ordering {
        let (gamma, rest): (Vec<Dtree>, Vec<Dtree>) = sigma
            .into_iter()
            .partition(|tree| tree.static_variable_set().contains(var));
        sigma = rest;
        if !gamma.is_empty() {
            sigma.push(compose(gamma));
        }
    }
    compose(sigma)
}

/// Balanced composition: halves the list recursively.
fn compose(mut trees: Vec<Dtree>) -> Dtree {
    match trees.len() {
        0 => panic!("Cannot compose an empty list of dtrees"),
        1 => trees.swap_remove(0),
        n => {
            let right = trees.split_off(n / 2);
            Dtree::Node(DtreeNode::new(compose(trees), compose(right)))
        }
    }
}

/// Builds a dtree along a min-fill elimination ordering of the constraint graph.
pub fn generate_min_fill(f: &FormulaFactory, cnf: Formula) -> (Dtree, MinFillOrdering) {
    let ordering = ConstraintGraph::from_cnf(f, cnf).min_fill_ordering();
    let tree = generate_with_eliminating_order(f, cnf, &ordering.order);
    debug!(
        "generate_min_fill: {} clauses, depth {}",
        tree.size(),
        tree.depth()
    );
    (tree, ordering)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::solver::config::SolverConfig;

    #[test]
    fn test_single_clause_is_leaf() {
        let f = FormulaFactory::new();
        let cnf = f.or([f.var("a"), f.var("b")]);
        let (tree, _) = generate_min_fill(&f, cnf);
        assert!(tree.is_leaf());
        assert_eq!(tree.size(), 1);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.widest_separator(), 0);
    }

    #[test]
    #[should_panic(expected = "non-CNF or atomic")]
    fn test_atomic_rejected() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        generate_with_eliminating_order(&f, a, &[f.variable("a")]);
    }

    #[test]
    #[should_panic(expected = "non-CNF or atomic")]
    fn test_non_cnf_rejected() {
        let f = FormulaFactory::new();
        let x = f.or([f.and([f.var("a"), f.var("b")]), f.var("c")]);
        generate_with_eliminating_order(&f, x, &[]);
    }

    #[test]
    fn test_compose_is_balanced() {
        let f = FormulaFactory::new();
        let clauses: Vec<Formula> = (0..5)
            .map(|i| f.or([f.var(&format!("x{}", i)), f.var(&format!("y{}", i))]))
            .collect();
        let cnf = f.and(clauses);
        // No shared variables: everything is composed at the end.
        let tree = generate_with_eliminating_order(&f, cnf, &[]);
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.depth(), 4);
        let Dtree::Node(node) = &tree else {
            panic!("expected a node")
        };
        assert_eq!(node.left().size(), 2);
        assert_eq!(node.right().size(), 3);
    }

    #[test]
    fn test_initialize_statics() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let d = f.var("d");
        // c0: a | b, c1: ~b | c, c2: ~c | d
        let cnf = f.and([f.or([a, b]), f.or([f.not(b), c]), f.or([f.not(c), d])]);
        let order = vec![f.variable("a"), f.variable("b"), f.variable("c"), f.variable("d")];
        let mut tree = generate_with_eliminating_order(&f, cnf, &order);

        let mut solver = DnnfSolver::new(&f, SolverConfig::default());
        solver.add(cnf);
        tree.initialize(&solver);

        // a: [c1, c2, c0]; b: [c2, N(c1, c0)]; c: N(c2, N(c1, c0))
        assert_eq!(tree.size(), 3);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.static_clause_ids(), &[2, 1, 0]);
        assert_eq!(tree.static_variables(), &[0, 1, 2, 3]);

        let Dtree::Node(root) = &tree else {
            panic!("expected a node")
        };
        // Solver indices follow first occurrence: a=0, b=1, c=2, d=3.
        assert_eq!(root.static_separator(), &[2]);
        let Dtree::Node(inner) = root.right() else {
            panic!("expected a node")
        };
        assert_eq!(inner.static_separator(), &[1]);
        assert_eq!(tree.widest_separator(), 1);

        let idx = |name: &str| solver.variable_index(f.variable(name)).unwrap();
        let expected: Vec<i32> = vec![
            idx("c").neg().code() as i32,
            idx("d").pos().code() as i32,
            -3,
            idx("b").neg().code() as i32,
            idx("c").pos().code() as i32,
            -2,
            idx("a").pos().code() as i32,
            idx("b").pos().code() as i32,
            -1,
        ];
        assert_eq!(tree.clause_contents(), expected.as_slice());

        let segments: Vec<usize> = tree.clause_segments().map(|(id, _)| id).collect();
        assert_eq!(segments, vec![2, 1, 0]);
    }

    #[test]
    fn test_dynamic_semantics() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let d = f.var("d");
        let cnf = f.and([f.or([a, b]), f.or([f.not(b), c]), f.or([f.not(c), d])]);
        let order = vec![f.variable("a"), f.variable("b"), f.variable("c"), f.variable("d")];
        let mut tree = generate_with_eliminating_order(&f, cnf, &order);

        let mut solver = DnnfSolver::new(&f, SolverConfig::default());
        solver.add(cnf);
        assert!(solver.start());
        tree.initialize(&solver);
        let idx = |name: &str| solver.variable_index(f.variable(name)).unwrap();
        let (ia, ib, ic) = (idx("a"), idx("b"), idx("c"));

        let mut sep = BitSet::empty();
        let mut scratch = BitSet::empty();
        tree.dynamic_separator(&solver, &mut sep, &mut scratch);
        assert_eq!(sep.iter().collect::<Vec<_>>(), vec![ic.index()]);

        let mut occurrences = vec![-1; 4];
        occurrences[ib.index()] = 0;
        occurrences[ic.index()] = 0;
        tree.count_unsubsumed_occurrences(&solver, &mut occurrences);
        assert_eq!(occurrences, vec![-1, 2, 2, -1]);

        let mut key = BitSet::empty();
        tree.cache_key(&solver, &mut key, 4);
        assert_eq!(key.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 5, 6, 7]);

        // c = true subsumes c1 and decides c.
        assert!(solver.decide(ic, true));
        tree.dynamic_separator(&solver, &mut sep, &mut scratch);
        assert!(sep.is_empty());

        let mut key = BitSet::empty();
        tree.cache_key(&solver, &mut key, 4);
        // c2 becomes unit d and is propagated, so it is subsumed too.
        assert_eq!(key.iter().collect::<Vec<_>>(), vec![ia.index(), ib.index(), 5]);
        solver.undo_decide(ic);
    }
}
