use std::collections::HashMap;

use crate::formula::{Assignment, Formula, FormulaFactory, FormulaKind};
use crate::solver::core::Solver;
use crate::types::{Lit, Var};

/// Plaisted-Greenbaum encoding of NNF formulas into a [`Solver`].
///
/// Every conjunction and disjunction gets a fresh gate variable that implies
/// its definition; this is enough since NNF formulas occur only positively.
struct Encoder<'a> {
    f: &'a FormulaFactory,
    solver: Solver,
    vars: HashMap<Var, Var>,
    gates: HashMap<Formula, Lit>,
}

impl<'a> Encoder<'a> {
    fn new(f: &'a FormulaFactory) -> Self {
        Self {
            f,
            solver: Solver::default(),
            vars: HashMap::new(),
            gates: HashMap::new(),
        }
    }

    fn var(&mut self, var: Var) -> Var {
        if let Some(&v) = self.vars.get(&var) {
            return v;
        }
        let v = self.solver.new_var();
        self.vars.insert(var, v);
        v
    }

    fn encode(&mut self, node: Formula) -> Lit {
        if let Some(&gate) = self.gates.get(&node) {
            return gate;
        }
        let gate = match self.f.kind(node) {
            FormulaKind::Lit(l) => self.var(l.var()).lit(l.phase()),
            FormulaKind::And(ops) => {
                let lits: Vec<Lit> = ops.iter().map(|&op| self.encode(op)).collect();
                let gate = self.solver.new_var().pos();
                for l in lits {
                    self.solver.add_clause([-gate, l]);
                }
                gate
            }
            FormulaKind::Or(ops) => {
                let mut lits: Vec<Lit> = ops.iter().map(|&op| self.encode(op)).collect();
                let gate = self.solver.new_var().pos();
                lits.push(-gate);
                self.solver.add_clause(lits);
                gate
            }
            kind => panic!("Unexpected {:?} in NNF", kind),
        };
        self.gates.insert(node, gate);
        gate
    }
}

impl FormulaFactory {
    /// Returns one model of `f` over its variables, if any exists.
    pub fn one_sat(&self, f: Formula) -> Option<Assignment> {
        let nnf = self.nnf(f);
        if nnf.is_false() {
            return None;
        }

        let mut encoder = Encoder::new(self);
        if !nnf.is_true() {
            let root = encoder.encode(nnf);
            encoder.solver.add_clause([root]);
        }
        if !encoder.solver.solve() {
            return None;
        }

        let model = encoder.solver.model()?;
        let assignment = self
            .variables(f)
            .iter()
            .map(|&v| match encoder.vars.get(&v) {
                Some(sv) => v.lit(model[sv.index()]),
                None => v.neg(),
            })
            .collect();
        Some(assignment)
    }

    pub fn is_satisfiable(&self, f: Formula) -> bool {
        self.one_sat(f).is_some()
    }

    pub fn is_tautology(&self, f: Formula) -> bool {
        !self.is_satisfiable(self.not(f))
    }

    pub fn is_equivalent(&self, f: Formula, g: Formula) -> bool {
        self.is_tautology(self.equiv(f, g))
    }

    pub fn implies_formula(&self, f: Formula, g: Formula) -> bool {
        self.is_tautology(self.implies(f, g))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_one_sat() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let x = f.and([f.or([a, b]), f.not(a), f.implies(b, c)]);
        let model = f.one_sat(x).unwrap();
        assert!(f.evaluate(x, &model));
        assert!(model.satisfies(f.variable("c").pos()));

        let y = f.and([x, f.not(c)]);
        assert_eq!(f.one_sat(y), None);
    }

    #[test]
    fn test_one_sat_constants() {
        let f = FormulaFactory::new();
        assert_eq!(f.one_sat(Formula::TRUE), Some(Assignment::new()));
        assert_eq!(f.one_sat(Formula::FALSE), None);
    }

    #[test]
    fn test_equivalence() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let de_morgan_l = f.not(f.and([a, b]));
        let de_morgan_r = f.or([f.not(a), f.not(b)]);
        assert!(f.is_equivalent(de_morgan_l, de_morgan_r));
        assert!(!f.is_equivalent(a, b));
        assert!(f.is_tautology(f.or([a, f.not(a)])));
        assert!(f.implies_formula(f.and([a, b]), a));
        assert!(!f.implies_formula(a, f.and([a, b])));
    }
}
