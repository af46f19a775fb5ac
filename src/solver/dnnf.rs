//! CDCL solver interface used by the d-DNNF compiler.
//!
//! The compiler drives the search itself: it decides a variable, recurses on
//! the sub-problem, and undoes the decision. When a decision leads to a
//! conflict, the learnt clause is kept aside together with its assertion
//! level; once the compiler has backtracked to that level it can install the
//! conflict-driven literal and restart the current sub-problem.
//!
//! Factory variables are mapped to dense solver indices in order of first
//! occurrence in the added clauses.

use std::collections::HashMap;

use log::trace;

use crate::bitset::BitSet;
use crate::formula::{Formula, FormulaFactory};
use crate::solver::config::SolverConfig;
use crate::solver::core::Solver;
use crate::types::{Lit, Tristate, Var};

pub struct DnnfSolver<'a> {
    f: &'a FormulaFactory,
    core: Solver,
    name2idx: HashMap<Var, Var>,
    idx2name: Vec<Var>,
    newly_implied_dirty: bool,
    assertion_level: Option<usize>,
    last_learnt: Option<Vec<Lit>>,
}

impl<'a> DnnfSolver<'a> {
    pub fn new(f: &'a FormulaFactory, config: SolverConfig) -> Self {
        Self {
            f,
            core: Solver::new(config),
            name2idx: HashMap::new(),
            idx2name: Vec::new(),
            newly_implied_dirty: false,
            assertion_level: None,
            last_learnt: None,
        }
    }

    /// Number of solver variables.
    pub fn n_vars(&self) -> usize {
        self.idx2name.len()
    }

    fn index_or_create(&mut self, var: Var) -> Var {
        if let Some(&idx) = self.name2idx.get(&var) {
            return idx;
        }
        let idx = self.core.new_var();
        self.name2idx.insert(var, idx);
        self.idx2name.push(var);
        idx
    }

    /// Adds the clauses of a CNF.
    ///
    /// Panics if `cnf` is not in CNF.
    pub fn add(&mut self, cnf: Formula) {
        for clause in self.f.clauses(cnf) {
            let lits: Vec<Lit> = clause
                .into_iter()
                .map(|l| self.index_or_create(l.var()).lit(l.phase()))
                .collect();
            self.core.add_clause(lits);
        }
    }

    /// Initial unit propagation. Returns `false` iff the clauses are unsatisfiable at level 0.
    pub fn start(&mut self) -> bool {
        self.newly_implied_dirty = true;
        self.core.is_ok() && self.core.propagate().is_none()
    }

    /// Opens a new decision level with `var = phase` and propagates.
    ///
    /// Returns `false` if the literal is already false, or on conflict; in the
    /// latter case the learnt clause is kept for
    /// [`assert_cd_literal`][Self::assert_cd_literal]. Either way the level
    /// is open and must be closed with [`undo_decide`][Self::undo_decide].
    pub fn decide(&mut self, var: Var, phase: bool) -> bool {
        self.newly_implied_dirty = true;
        let lit = var.lit(phase);
        self.core.new_decision_level();
        match self.core.value(lit) {
            Tristate::False => {
                trace!("decide: {:?} is already false", lit);
                false
            }
            Tristate::True => panic!("Cannot decide on {:?} which is already true", lit),
            Tristate::Undef => {
                self.core.unchecked_enqueue(lit, None);
                self.propagate_after_decide()
            }
        }
    }

    /// Pops the most recent decision level, the one opened by deciding `var`.
    pub fn undo_decide(&mut self, var: Var) {
        self.newly_implied_dirty = false;
        let level = self.core.decision_level();
        assert!(level > 0, "Cannot undo decision on {} which is not decided", var);
        self.core.cancel_until(level - 1);
    }

    pub fn at_assertion_level(&self) -> bool {
        self.assertion_level == Some(self.core.decision_level())
    }

    /// Installs the literal of the last learnt clause and propagates.
    ///
    /// Returns `false` on a new conflict.
    pub fn assert_cd_literal(&mut self) -> bool {
        self.newly_implied_dirty = true;
        assert!(
            self.at_assertion_level(),
            "Conflict-driven literal asserted outside of the assertion level"
        );
        let learnt = match self.last_learnt.take() {
            Some(learnt) => learnt,
            None => panic!("No learnt clause to assert"),
        };
        trace!("assert_cd_literal: {:?} at level {:?}", learnt, self.assertion_level);
        self.assertion_level = None;
        self.core.learn(learnt);
        self.core.decay_activities();
        self.propagate_after_decide()
    }

    fn propagate_after_decide(&mut self) -> bool {
        match self.core.propagate() {
            None => true,
            Some(conflict) => {
                if self.core.decision_level() > 0 {
                    let (learnt, bt_level) = self.core.analyze(conflict);
                    self.assertion_level = Some(bt_level);
                    self.last_learnt = Some(learnt);
                } else {
                    self.core.cancel_until(0);
                    self.assertion_level = None;
                    self.last_learnt = None;
                }
                false
            }
        }
    }

    /// Value of a literal given as solver index.
    pub fn value_of(&self, lit: Lit) -> Tristate {
        self.core.value(lit)
    }

    /// Solver index of a factory variable.
    pub fn variable_index(&self, var: Var) -> Option<Var> {
        self.name2idx.get(&var).copied()
    }

    /// Solver literal of a factory literal.
    pub fn literal_index(&self, lit: Lit) -> Option<Lit> {
        self.variable_index(lit.var()).map(|v| v.lit(lit.phase()))
    }

    /// Factory variable of a solver index.
    pub fn var_for_index(&self, idx: Var) -> Var {
        self.idx2name[idx.index()]
    }

    /// Factory literal of a solver literal.
    pub fn lit_for_index(&self, lit: Lit) -> Lit {
        self.var_for_index(lit.var()).lit(lit.phase())
    }

    /// Conjunction of the literals implied since the last decision whose
    /// variables are in `known`, as factory literals.
    ///
    /// Only reports anything after `start`, `decide` or `assert_cd_literal`;
    /// subsequent calls return `True` until the next of those.
    pub fn newly_implied(&mut self, known: &BitSet) -> Formula {
        let mut implied = Vec::new();
        if self.newly_implied_dirty {
            let trail = self.core.trail();
            let start = self.core.trail_lim().last().map_or(0, |&lim| lim + 1);
            for &lit in &trail[start.min(trail.len())..] {
                if known.get(lit.var().index()) {
                    implied.push(self.f.lit(self.lit_for_index(lit)));
                }
            }
        }
        self.newly_implied_dirty = false;
        self.f.and(implied)
    }
}
