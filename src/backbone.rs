//! Backbone computation.
//!
//! The backbone of a satisfiable formula is the set of literals that hold in
//! every model. It is computed iteratively: starting from one model, every
//! candidate literal is tested by solving under its negation; each model found
//! along the way rules out the candidates it falsifies.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::formula::{Formula, FormulaFactory};
use crate::solver::core::Solver;
use crate::types::{Lit, Var};

/// Literals that are true in every model.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Backbone {
    pub literals: BTreeSet<Lit>,
}

impl Backbone {
    pub fn contains(&self, lit: Lit) -> bool {
        self.literals.contains(&lit)
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }
}

impl FormulaFactory {
    /// Backbone of a CNF, or `None` if it is unsatisfiable.
    ///
    /// Panics if `cnf` is not in CNF.
    pub fn backbone(&self, cnf: Formula) -> Option<Backbone> {
        let vars = self.variables(cnf);
        let index: HashMap<Var, Var> = vars
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, Var::new(i as u32)))
            .collect();
        let to_solver = |lit: Lit| index[&lit.var()].lit(lit.phase());

        let mut solver = Solver::default();
        for _ in 0..vars.len() {
            solver.new_var();
        }
        for clause in self.clauses(cnf) {
            solver.add_clause(clause.into_iter().map(to_solver));
        }

        if !solver.solve() {
            return None;
        }

        // Candidates: the literals of the first model.
        let mut candidates: Vec<Option<Lit>> = Vec::with_capacity(vars.len());
        if let Some(model) = solver.model() {
            candidates.extend(vars.iter().map(|&v| Some(v.lit(model[index[&v].index()]))));
        }

        let mut literals = BTreeSet::new();
        for i in 0..candidates.len() {
            let Some(lit) = candidates[i] else {
                continue;
            };
            if solver.solve_with_assumptions(&[to_solver(-lit)]) {
                // Refine the remaining candidates with the new model.
                if let Some(model) = solver.model() {
                    for candidate in candidates[i..].iter_mut() {
                        if let Some(c) = *candidate {
                            if model[index[&c.var()].index()] != c.phase() {
                                *candidate = None;
                            }
                        }
                    }
                }
            } else {
                literals.insert(lit);
                solver.add_clause([to_solver(lit)]);
            }
        }

        debug!(
            "backbone: {} of {} variables fixed",
            literals.len(),
            vars.len()
        );
        Some(Backbone { literals })
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_backbone_unsat() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let cnf = f.and([f.or([a, b]), f.not(a), f.not(b)]);
        assert_eq!(f.backbone(cnf), None);
    }

    #[test]
    fn test_backbone_empty() {
        let f = FormulaFactory::new();
        let cnf = f.or([f.var("a"), f.var("b")]);
        let backbone = f.backbone(cnf).unwrap();
        assert!(backbone.is_empty());
    }

    #[test]
    fn test_backbone_implied() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let d = f.var("d");
        // a, a => b, (c | d), (~b | ~c | d)
        let cnf = f.and([
            a,
            f.or([f.not(a), b]),
            f.or([c, d]),
            f.or([f.not(b), f.not(c), d]),
        ]);
        let backbone = f.backbone(cnf).unwrap();
        let expected: BTreeSet<Lit> = [
            f.variable("a").pos(),
            f.variable("b").pos(),
            f.variable("d").pos(),
        ]
        .into_iter()
        .collect();
        assert_eq!(backbone.literals, expected);
    }

    #[test]
    fn test_backbone_constants() {
        let f = FormulaFactory::new();
        assert_eq!(f.backbone(Formula::TRUE), Some(Backbone::default()));
        assert_eq!(f.backbone(Formula::FALSE), None);
    }
}
