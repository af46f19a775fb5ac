//! Formula transformations: NNF, CNF, restriction and CNF simplification.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::formula::{Formula, FormulaFactory, FormulaKind};
use crate::types::Lit;

impl FormulaFactory {
    /// Negation normal form: negations only on literals, no implications or equivalences.
    pub fn nnf(&self, f: Formula) -> Formula {
        let mut cache = HashMap::new();
        self.nnf_(f, true, &mut cache)
    }

    fn nnf_(&self, f: Formula, polarity: bool, cache: &mut HashMap<(Formula, bool), Formula>) -> Formula {
        if let Some(&res) = cache.get(&(f, polarity)) {
            return res;
        }

        let res = match self.kind(f) {
            FormulaKind::False | FormulaKind::True | FormulaKind::Lit(_) => {
                if polarity {
                    f
                } else {
                    self.not(f)
                }
            }
            FormulaKind::Not(g) => self.nnf_(g, !polarity, cache),
            FormulaKind::And(ops) => {
                let ops: Vec<Formula> = ops.iter().map(|&op| self.nnf_(op, polarity, cache)).collect();
                if polarity {
                    self.and(ops)
                } else {
                    self.or(ops)
                }
            }
            FormulaKind::Or(ops) => {
                let ops: Vec<Formula> = ops.iter().map(|&op| self.nnf_(op, polarity, cache)).collect();
                if polarity {
                    self.or(ops)
                } else {
                    self.and(ops)
                }
            }
            FormulaKind::Implies(a, b) => {
                if polarity {
                    let x = self.nnf_(a, false, cache);
                    let y = self.nnf_(b, true, cache);
                    self.or([x, y])
                } else {
                    let x = self.nnf_(a, true, cache);
                    let y = self.nnf_(b, false, cache);
                    self.and([x, y])
                }
            }
            FormulaKind::Equiv(a, b) => {
                let pos_a = self.nnf_(a, true, cache);
                let neg_a = self.nnf_(a, false, cache);
                let pos_b = self.nnf_(b, true, cache);
                let neg_b = self.nnf_(b, false, cache);
                if polarity {
                    let x = self.or([neg_a, pos_b]);
                    let y = self.or([pos_a, neg_b]);
                    self.and([x, y])
                } else {
                    let x = self.or([pos_a, pos_b]);
                    let y = self.or([neg_a, neg_b]);
                    self.and([x, y])
                }
            }
        };

        cache.insert((f, polarity), res);
        res
    }

    /// Conjunctive normal form by distribution.
    ///
    /// No auxiliary variables are introduced, so the result is equivalent to
    /// `f` (and may be exponentially larger).
    pub fn cnf(&self, f: Formula) -> Formula {
        if self.is_cnf(f) {
            return f;
        }
        let nnf = self.nnf(f);
        let mut cache = HashMap::new();
        let res = self.cnf_(nnf, &mut cache);
        debug!(
            "cnf: {} nodes -> {} nodes",
            self.node_count(f),
            self.node_count(res)
        );
        res
    }

    fn cnf_(&self, f: Formula, cache: &mut HashMap<Formula, Formula>) -> Formula {
        if let Some(&res) = cache.get(&f) {
            return res;
        }
        let res = match self.kind(f) {
            FormulaKind::And(ops) => {
                let ops: Vec<Formula> = ops.iter().map(|&op| self.cnf_(op, cache)).collect();
                self.and(ops)
            }
            FormulaKind::Or(ops) => {
                let mut acc = Formula::FALSE;
                for &op in ops.iter() {
                    let op = self.cnf_(op, cache);
                    acc = self.distribute(acc, op);
                }
                acc
            }
            _ => f,
        };
        cache.insert(f, res);
        res
    }

    /// Disjunction of two CNFs, as a CNF.
    fn distribute(&self, f: Formula, g: Formula) -> Formula {
        let fs = self.conjuncts(f);
        let gs = self.conjuncts(g);
        let mut clauses = Vec::with_capacity(fs.len() * gs.len());
        for &c in &fs {
            for &d in &gs {
                clauses.push(self.or([c, d]));
            }
        }
        self.and(clauses)
    }

    fn conjuncts(&self, f: Formula) -> Vec<Formula> {
        match self.kind(f) {
            FormulaKind::And(ops) => ops.to_vec(),
            _ => vec![f],
        }
    }

    /// Substitutes the given literals by `True` (and their complements by `False`).
    pub fn restrict(&self, f: Formula, lits: &BTreeSet<Lit>) -> Formula {
        let mut cache = HashMap::new();
        self.restrict_(f, lits, &mut cache)
    }

    fn restrict_(&self, f: Formula, lits: &BTreeSet<Lit>, cache: &mut HashMap<Formula, Formula>) -> Formula {
        if let Some(&res) = cache.get(&f) {
            return res;
        }
        let res = match self.kind(f) {
            FormulaKind::False | FormulaKind::True => f,
            FormulaKind::Lit(l) => {
                if lits.contains(&l) {
                    Formula::TRUE
                } else if lits.contains(&-l) {
                    Formula::FALSE
                } else {
                    f
                }
            }
            FormulaKind::Not(g) => {
                let g = self.restrict_(g, lits, cache);
                self.not(g)
            }
            FormulaKind::And(ops) => {
                let ops: Vec<Formula> = ops.iter().map(|&op| self.restrict_(op, lits, cache)).collect();
                self.and(ops)
            }
            FormulaKind::Or(ops) => {
                let ops: Vec<Formula> = ops.iter().map(|&op| self.restrict_(op, lits, cache)).collect();
                self.or(ops)
            }
            FormulaKind::Implies(a, b) => {
                let a = self.restrict_(a, lits, cache);
                let b = self.restrict_(b, lits, cache);
                self.implies(a, b)
            }
            FormulaKind::Equiv(a, b) => {
                let a = self.restrict_(a, lits, cache);
                let b = self.restrict_(b, lits, cache);
                self.equiv(a, b)
            }
        };
        cache.insert(f, res);
        res
    }

    /// Removes every clause of a CNF that is a superset of another clause.
    ///
    /// Of several clauses with the same literals only the first is kept.
    /// The surviving clauses keep their original order.
    pub fn subsumption(&self, cnf: Formula) -> Formula {
        assert!(
            self.is_cnf(cnf),
            "Subsumption is only defined for CNF formulas"
        );
        let ops = match self.kind(cnf) {
            FormulaKind::And(ops) => ops,
            _ => return cnf,
        };

        let sets: Vec<BTreeSet<Lit>> = ops
            .iter()
            .map(|&op| self.clause_literals(op).into_iter().collect())
            .collect();
        let mut by_size: Vec<usize> = (0..sets.len()).collect();
        by_size.sort_by_key(|&i| sets[i].len());

        let mut kept: Vec<usize> = Vec::new();
        let mut keep = vec![false; sets.len()];
        for i in by_size {
            if kept.iter().any(|&k| sets[k].is_subset(&sets[i])) {
                continue;
            }
            kept.push(i);
            keep[i] = true;
        }

        debug!("subsumption: {} of {} clauses kept", kept.len(), sets.len());
        self.and(
            ops.iter()
                .zip(keep)
                .filter_map(|(&op, k)| k.then_some(op)),
        )
    }

    /// Fixes the backbone of a CNF.
    ///
    /// Returns `False` if the CNF is unsatisfiable, otherwise the conjunction of
    /// the backbone literals and the CNF restricted by them.
    pub fn backbone_simplification(&self, cnf: Formula) -> Formula {
        match self.backbone(cnf) {
            None => Formula::FALSE,
            Some(backbone) => {
                let restricted = self.restrict(cnf, &backbone.literals);
                let mut ops: Vec<Formula> = backbone.literals.iter().map(|&l| self.lit(l)).collect();
                ops.push(restricted);
                self.and(ops)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::formula::Assignment;
    use crate::types::Var;

    /// Checks that `f` and `g` agree on all assignments of the given variables.
    fn assert_equivalent(f: &FormulaFactory, x: Formula, y: Formula, vars: &[Var]) {
        for bits in 0..(1u32 << vars.len()) {
            let assignment: Assignment = vars
                .iter()
                .enumerate()
                .map(|(i, v)| v.lit(bits & (1 << i) != 0))
                .collect();
            assert_eq!(
                f.evaluate(x, &assignment),
                f.evaluate(y, &assignment),
                "{} and {} differ",
                f.display(x),
                f.display(y)
            );
        }
    }

    #[test]
    fn test_nnf() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let x = f.not(f.and([a, f.implies(b, c)]));
        let nnf = f.nnf(x);
        assert!(f.is_nnf(nnf));
        assert_eq!(f.display(nnf).to_string(), "~a | b & ~c");
        let vars: Vec<Var> = f.variables(x).iter().copied().collect();
        assert_equivalent(&f, x, nnf, &vars);
    }

    #[test]
    fn test_nnf_equiv() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let x = f.equiv(a, b);
        assert_eq!(f.display(f.nnf(x)).to_string(), "(~a | b) & (a | ~b)");
        let y = f.not(x);
        assert_eq!(f.display(f.nnf(y)).to_string(), "(a | b) & (~a | ~b)");
    }

    #[test]
    fn test_cnf() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let d = f.var("d");
        let x = f.or([f.and([a, b]), f.and([c, d])]);
        let cnf = f.cnf(x);
        assert!(f.is_cnf(cnf));
        assert_eq!(f.operands(cnf).len(), 4);
        let vars: Vec<Var> = f.variables(x).iter().copied().collect();
        assert_equivalent(&f, x, cnf, &vars);

        let y = f.equiv(a, f.equiv(b, c));
        let cnf = f.cnf(y);
        assert!(f.is_cnf(cnf));
        assert_eq!(*f.variables(cnf), *f.variables(y));
        let vars: Vec<Var> = f.variables(y).iter().copied().collect();
        assert_equivalent(&f, y, cnf, &vars);
    }

    #[test]
    fn test_cnf_tautology() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let x = f.or([f.and([a, b]), f.not(a), f.not(b)]);
        assert_eq!(f.cnf(x), Formula::TRUE);
    }

    #[test]
    fn test_restrict() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let x = f.and([f.or([a, b]), f.or([f.not(a), c])]);
        let lits = BTreeSet::from([f.variable("a").pos()]);
        assert_eq!(f.restrict(x, &lits), c);
        let lits = BTreeSet::from([f.variable("a").neg()]);
        assert_eq!(f.restrict(x, &lits), b);
    }

    #[test]
    fn test_subsumption() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let ab = f.or([a, b]);
        let abc = f.or([a, b, c]);
        let ba = f.or([b, a]);
        let nc = f.not(c);
        let cnf = f.and([abc, ab, nc, ba]);
        assert_eq!(f.subsumption(cnf), f.and([ab, nc]));
    }

    #[test]
    fn test_backbone_simplification() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let cnf = f.and([f.or([a, b]), f.not(b), f.or([f.not(a), b, c])]);
        // Backbone: a, ~b, c.
        let simplified = f.backbone_simplification(cnf);
        assert_eq!(simplified, f.and([a, f.not(b), c]));

        let unsat = f.and([a, f.not(a)]);
        assert_eq!(unsat, Formula::FALSE);
        let unsat = f.and([f.or([a, b]), f.not(a), f.not(b)]);
        assert_eq!(f.backbone_simplification(unsat), Formula::FALSE);
    }
}
