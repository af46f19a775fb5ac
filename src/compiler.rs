//! CNF to d-DNNF compilation.
//!
//! The CNF is first simplified (backbone, then subsumption) and split into its
//! unit clauses and the rest. The non-unit clauses are arranged in a dtree and
//! compiled top-down:
//!
//! - when the dynamic separator of a node is empty, its two subtrees share no
//!   undecided variable and are compiled independently (and cached);
//! - otherwise the separator variable occurring in the most unsubsumed clauses
//!   is expanded: both phases are decided in the solver and compiled
//!   recursively.
//!
//! A branch that turns out unsatisfiable at the assertion level of the
//! solver's last conflict asserts the learnt literal and recompiles the node.
//! The final result is the conjunction of the unit clauses with the compiled
//! non-unit part.

use log::{debug, trace};

use crate::bitset::BitSet;
use crate::cache::SubproblemCache;
use crate::dtree::{generate_min_fill, Dtree, DtreeLeaf, DtreeNode};
use crate::formula::{Formula, FormulaFactory, FormulaKind};
use crate::handler::{Cancelled, DnnfHandler};
use crate::solver::config::SolverConfig;
use crate::solver::dnnf::DnnfSolver;
use crate::types::{Tristate, Var};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerConfig {
    pub solver: SolverConfig,
}

impl CompilerConfig {
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }
}

/// Counters of one compilation.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct CompilationStats {
    pub shannon_expansions: u64,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_entries: usize,
    pub dtree_depth: usize,
    pub dtree_widest_separator: usize,
    pub treewidth: usize,
}

pub struct DnnfCompiler<'a> {
    f: &'a FormulaFactory,
    cnf: Formula,
    unit_clauses: Formula,
    non_unit_clauses: Formula,
    solver: DnnfSolver<'a>,
    num_vars: usize,

    cache: SubproblemCache,
    local_cache_keys: Vec<Vec<BitSet>>,
    local_occurrences: Vec<Vec<Vec<i32>>>,
    separator: BitSet,
    separator_scratch: BitSet,

    stats: CompilationStats,
    used: bool,
}

impl<'a> DnnfCompiler<'a> {
    /// Prepares the compilation of a CNF.
    ///
    /// Panics if `cnf` is not in CNF.
    pub fn new(f: &'a FormulaFactory, cnf: Formula, config: &CompilerConfig) -> Self {
        assert!(f.is_cnf(cnf), "Cannot compile a DNNF from a non-CNF formula");

        let simplified = f.subsumption(f.backbone_simplification(cnf));
        let (units, non_units): (Vec<Formula>, Vec<Formula>) = match f.kind(simplified) {
            FormulaKind::And(ops) => ops.iter().partition(|&&op| f.is_atomic(op)),
            FormulaKind::Or(_) => (Vec::new(), vec![simplified]),
            _ => (vec![simplified], Vec::new()),
        };

        let mut solver = DnnfSolver::new(f, config.solver.clone());
        solver.add(simplified);
        let num_vars = solver.n_vars();

        debug!(
            "DnnfCompiler: {} unit and {} non-unit clauses over {} variables",
            units.len(),
            non_units.len(),
            num_vars
        );

        Self {
            f,
            cnf: simplified,
            unit_clauses: f.and(units),
            non_unit_clauses: f.and(non_units),
            solver,
            num_vars,
            cache: SubproblemCache::new(),
            local_cache_keys: Vec::new(),
            local_occurrences: Vec::new(),
            separator: BitSet::empty(),
            separator_scratch: BitSet::empty(),
            stats: CompilationStats::default(),
            used: false,
        }
    }

    /// The simplified CNF.
    pub fn cnf(&self) -> Formula {
        self.cnf
    }

    pub fn unit_clauses(&self) -> Formula {
        self.unit_clauses
    }

    pub fn non_unit_clauses(&self) -> Formula {
        self.non_unit_clauses
    }

    pub fn stats(&self) -> CompilationStats {
        self.stats
    }

    /// Compiles the CNF into a d-DNNF equivalent to it.
    ///
    /// Returns `Err(Cancelled)` as soon as the handler refuses a Shannon expansion.
    pub fn compile(&mut self, handler: &mut dyn DnnfHandler) -> Result<Formula, Cancelled> {
        assert!(!self.used, "A DnnfCompiler can only compile once");
        self.used = true;
        handler.started();

        if self.f.is_atomic(self.non_unit_clauses) {
            return Ok(self.cnf);
        }
        if !self.solver.start() {
            return Ok(Formula::FALSE);
        }

        let (mut tree, ordering) = generate_min_fill(self.f, self.non_unit_clauses);
        tree.initialize(&self.solver);
        self.init_caches(&tree);
        self.stats.dtree_depth = tree.depth();
        self.stats.dtree_widest_separator = tree.widest_separator();
        self.stats.treewidth = ordering.treewidth;

        let result = self.cnf2ddnnf(&tree, 0, handler);

        self.stats.cache_hits = self.cache.hits();
        self.stats.cache_misses = self.cache.misses();
        self.stats.cache_entries = self.cache.len();
        debug!("compile: {:?}", self.stats);

        let result = result?;
        Ok(self.f.and([self.unit_clauses, result]))
    }

    fn init_caches(&mut self, tree: &Dtree) {
        let depth = tree.depth() + 1;
        let width = tree.widest_separator() + 1;
        let key_size = tree.size() + self.num_vars + 1;
        self.local_cache_keys = (0..depth)
            .map(|_| (0..width).map(|_| BitSet::new(key_size)).collect())
            .collect();
        self.local_occurrences = vec![vec![vec![-1; self.num_vars]; width]; depth];
    }

    fn cnf2ddnnf(
        &mut self,
        tree: &Dtree,
        shannons: usize,
        handler: &mut dyn DnnfHandler,
    ) -> Result<Formula, Cancelled> {
        tree.dynamic_separator(&self.solver, &mut self.separator, &mut self.separator_scratch);
        let implied = self.solver.newly_implied(tree.static_var_set());

        if self.separator.is_empty() {
            return match tree {
                Dtree::Leaf(leaf) => {
                    let clause = self.leaf2ddnnf(leaf);
                    Ok(self.f.and([implied, clause]))
                }
                Dtree::Node(node) => self.conjoin(implied, node, shannons, handler),
            };
        }

        let var = self.choose_shannon_variable(tree, shannons);
        self.stats.shannon_expansions += 1;
        if !handler.shannon_expansion() {
            debug!("cnf2ddnnf: cancelled after {} expansions", self.stats.shannon_expansions);
            return Err(Cancelled);
        }
        trace!("cnf2ddnnf: expanding {} at depth {}", var, shannons);

        let positive = self.branch(tree, var, true, shannons, handler)?;
        if positive.is_false() {
            return self.after_false_branch(tree, handler);
        }
        let negative = self.branch(tree, var, false, shannons, handler)?;
        if negative.is_false() {
            return self.after_false_branch(tree, handler);
        }

        let v = self.solver.var_for_index(var);
        let pos = self.f.and([self.f.literal(v, true), positive]);
        let neg = self.f.and([self.f.literal(v, false), negative]);
        let expansion = self.f.or([pos, neg]);
        Ok(self.f.and([implied, expansion]))
    }

    fn branch(
        &mut self,
        tree: &Dtree,
        var: Var,
        phase: bool,
        shannons: usize,
        handler: &mut dyn DnnfHandler,
    ) -> Result<Formula, Cancelled> {
        let result = if self.solver.decide(var, phase) {
            self.cnf2ddnnf(tree, shannons + 1, handler)
        } else {
            Ok(Formula::FALSE)
        };
        self.solver.undo_decide(var);
        result
    }

    /// Restarts `tree` if the solver can assert a conflict-driven literal here.
    fn after_false_branch(
        &mut self,
        tree: &Dtree,
        handler: &mut dyn DnnfHandler,
    ) -> Result<Formula, Cancelled> {
        if self.solver.at_assertion_level() && self.solver.assert_cd_literal() {
            trace!("cnf2ddnnf: restart after asserting a learnt literal");
            self.cnf2ddnnf(tree, 0, handler)
        } else {
            Ok(Formula::FALSE)
        }
    }

    /// Separator variable with the most unsubsumed occurrences; ties go to the smallest.
    fn choose_shannon_variable(&mut self, tree: &Dtree, shannons: usize) -> Var {
        let occurrences = &mut self.local_occurrences[tree.depth()][shannons];
        for (i, occ) in occurrences.iter_mut().enumerate() {
            *occ = if self.separator.get(i) { 0 } else { -1 };
        }
        tree.count_unsubsumed_occurrences(&self.solver, occurrences);

        let mut best = (-1, 0);
        for i in self.separator.iter() {
            if occurrences[i] > best.0 {
                best = (occurrences[i], i);
            }
        }
        Var::new(best.1 as u32)
    }

    fn conjoin(
        &mut self,
        implied: Formula,
        node: &DtreeNode,
        shannons: usize,
        handler: &mut dyn DnnfHandler,
    ) -> Result<Formula, Cancelled> {
        if implied.is_false() {
            return Ok(Formula::FALSE);
        }
        let left = self.cnf_aux(node.left(), shannons, handler)?;
        if left.is_false() {
            return Ok(Formula::FALSE);
        }
        let right = self.cnf_aux(node.right(), shannons, handler)?;
        if right.is_false() {
            return Ok(Formula::FALSE);
        }
        Ok(self.f.and([implied, left, right]))
    }

    fn cnf_aux(
        &mut self,
        tree: &Dtree,
        shannons: usize,
        handler: &mut dyn DnnfHandler,
    ) -> Result<Formula, Cancelled> {
        let Dtree::Leaf(leaf) = tree else {
            return self.cached_cnf2ddnnf(tree, shannons, handler);
        };
        Ok(self.leaf2ddnnf(leaf))
    }

    fn cached_cnf2ddnnf(
        &mut self,
        tree: &Dtree,
        shannons: usize,
        handler: &mut dyn DnnfHandler,
    ) -> Result<Formula, Cancelled> {
        let depth = tree.depth();
        let mut key = std::mem::take(&mut self.local_cache_keys[depth][shannons]);
        key.clear();
        tree.cache_key(&self.solver, &mut key, self.num_vars);

        let result = match self.cache.get(&key) {
            Some(cached) => Ok(cached),
            None => {
                let result = self.cnf2ddnnf(tree, 0, handler);
                if let Ok(dnnf) = result {
                    if !dnnf.is_false() {
                        self.cache.insert(key.clone(), dnnf);
                    }
                }
                result
            }
        };

        self.local_cache_keys[depth][shannons] = key;
        result
    }

    /// Deterministic disjunction of the undecided literals of a clause:
    /// the i-th term is the i-th literal with all previous literals negated.
    fn leaf2ddnnf(&self, leaf: &DtreeLeaf) -> Formula {
        let mut terms = Vec::with_capacity(leaf.literals().len());
        let mut prefix: Vec<Formula> = Vec::new();
        for &lit in leaf.literals() {
            match self.solver.value_of(lit) {
                Tristate::True => return Formula::TRUE,
                Tristate::False => {}
                Tristate::Undef => {
                    let l = self.f.lit(self.solver.lit_for_index(lit));
                    let term = self.f.and(prefix.iter().copied().chain([l]));
                    terms.push(term);
                    prefix.push(self.f.not(l));
                }
            }
        }
        self.f.or(terms)
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use test_log::test;

    use super::*;
    use crate::handler::{ExpansionLimit, NopHandler};

    #[test]
    fn test_unit_split() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let cnf = f.and([a, f.or([b, c]), f.or([f.not(a), b, c])]);
        let compiler = DnnfCompiler::new(&f, cnf, &CompilerConfig::default());
        assert_eq!(compiler.unit_clauses(), a);
        assert_eq!(compiler.non_unit_clauses(), f.or([b, c]));
    }

    #[test]
    #[should_panic(expected = "non-CNF")]
    fn test_non_cnf_rejected() {
        let f = FormulaFactory::new();
        let x = f.equiv(f.var("a"), f.var("b"));
        DnnfCompiler::new(&f, x, &CompilerConfig::default());
    }

    #[test]
    fn test_atomic_non_units() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let cnf = f.and([a, f.not(b)]);
        let mut compiler = DnnfCompiler::new(&f, cnf, &CompilerConfig::default());
        assert_eq!(compiler.compile(&mut NopHandler), Ok(cnf));
        assert_eq!(compiler.stats().shannon_expansions, 0);
    }

    #[test]
    fn test_single_clause() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let cnf = f.or([a, b, c]);
        let mut compiler = DnnfCompiler::new(&f, cnf, &CompilerConfig::default());
        let dnnf = compiler.compile(&mut NopHandler).unwrap();
        let expected = f.or([
            a,
            f.and([f.not(a), b]),
            f.and([f.not(a), f.not(b), c]),
        ]);
        assert_eq!(dnnf, expected);
    }

    #[test]
    fn test_equiv_chain() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let x = f.and([f.equiv(a, b), f.equiv(b, c)]);
        let cnf = f.cnf(x);
        let mut compiler = DnnfCompiler::new(&f, cnf, &CompilerConfig::default());
        let dnnf = compiler.compile(&mut NopHandler).unwrap();
        assert!(f.is_equivalent(dnnf, x));
        assert!(compiler.stats().shannon_expansions > 0);

        let count = f.dnnf_model_count(&crate::dnnf::Dnnf::new(dnnf, (*f.variables(x)).clone()));
        assert_eq!(count, BigUint::from(2u32));
    }

    #[test]
    fn test_cancel() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let cnf = f.cnf(f.equiv(a, b));
        let mut compiler = DnnfCompiler::new(&f, cnf, &CompilerConfig::default());
        assert_eq!(compiler.compile(&mut ExpansionLimit::new(0)), Err(Cancelled));
    }

    #[test]
    #[should_panic(expected = "only compile once")]
    fn test_single_use() {
        let f = FormulaFactory::new();
        let cnf = f.or([f.var("a"), f.var("b")]);
        let mut compiler = DnnfCompiler::new(&f, cnf, &CompilerConfig::default());
        let _ = compiler.compile(&mut NopHandler);
        let _ = compiler.compile(&mut NopHandler);
    }
}
