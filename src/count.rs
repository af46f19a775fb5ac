//! Model counting on d-DNNF.
//!
//! On a decomposable and deterministic formula the number of models is a
//! single bottom-up pass: conjunctions multiply (their operands share no
//! variables) and disjunctions add (their operands share no models). Every
//! disjunct is first lifted to the variables of the whole disjunction by
//! multiplying with `2^k` for the `k` variables it does not mention.

use std::collections::HashMap;

use log::debug;
use num_bigint::BigUint;

use crate::dnnf::Dnnf;
use crate::formula::{Formula, FormulaFactory, FormulaKind};

pub struct DnnfCounter<'a> {
    f: &'a FormulaFactory,
    cache: HashMap<Formula, BigUint>,
}

impl<'a> DnnfCounter<'a> {
    pub fn new(f: &'a FormulaFactory) -> Self {
        Self {
            f,
            cache: HashMap::new(),
        }
    }

    /// Number of models of `dnnf` over its own variables.
    ///
    /// Panics on nodes that cannot occur in a d-DNNF (negations of non-literals,
    /// implications, equivalences).
    pub fn count(&mut self, dnnf: Formula) -> BigUint {
        if let Some(count) = self.cache.get(&dnnf) {
            return count.clone();
        }
        let count = match self.f.kind(dnnf) {
            FormulaKind::False => BigUint::from(0u32),
            FormulaKind::True | FormulaKind::Lit(_) => BigUint::from(1u32),
            FormulaKind::And(ops) => {
                let mut product = BigUint::from(1u32);
                for &op in ops.iter() {
                    product *= self.count(op);
                }
                product
            }
            FormulaKind::Or(ops) => {
                let all = self.f.variables(dnnf).len();
                let mut sum = BigUint::from(0u32);
                for &op in ops.iter() {
                    let missing = all - self.f.variables(op).len();
                    sum += self.count(op) << missing;
                }
                sum
            }
            kind => panic!("Unexpected {:?} in a d-DNNF", kind),
        };
        self.cache.insert(dnnf, count.clone());
        count
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

impl FormulaFactory {
    /// Number of models of a compiled d-DNNF over its original variables.
    pub fn dnnf_model_count(&self, dnnf: &Dnnf) -> BigUint {
        let mut counter = DnnfCounter::new(self);
        let count = counter.count(dnnf.formula);
        let own = self.variables(dnnf.formula).len();
        let dont_care = dnnf.original_variables.len().saturating_sub(own);
        debug!(
            "dnnf_model_count: {} nodes counted, {} unconstrained variables",
            counter.cache_size(),
            dont_care
        );
        count << dont_care
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_constants() {
        let f = FormulaFactory::new();
        let mut counter = DnnfCounter::new(&f);
        assert_eq!(counter.count(f.verum()), BigUint::from(1u32));
        assert_eq!(counter.count(f.falsum()), BigUint::from(0u32));
        assert_eq!(counter.count(f.not(f.var("a"))), BigUint::from(1u32));
    }

    #[test]
    fn test_or_lifts_missing_variables() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        // a | (~a & b): 2 + 1
        let x = f.or([a, f.and([f.not(a), b])]);
        let mut counter = DnnfCounter::new(&f);
        assert_eq!(counter.count(x), BigUint::from(3u32));
    }

    #[test]
    fn test_and_multiplies() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let b = f.var("b");
        let c = f.var("c");
        let d = f.var("d");
        let x = f.and([f.or([a, f.and([f.not(a), b])]), f.or([c, f.and([f.not(c), d])])]);
        let mut counter = DnnfCounter::new(&f);
        assert_eq!(counter.count(x), BigUint::from(9u32));
    }

    #[test]
    fn test_unconstrained_variables() {
        let f = FormulaFactory::new();
        let a = f.var("a");
        let vars = ["a", "b", "c"].iter().map(|n| f.variable(n)).collect();
        let dnnf = Dnnf::new(a, vars);
        assert_eq!(f.dnnf_model_count(&dnnf), BigUint::from(4u32));
    }

    #[test]
    #[should_panic(expected = "Unexpected")]
    fn test_rejects_equivalence() {
        let f = FormulaFactory::new();
        let x = f.equiv(f.var("a"), f.var("b"));
        DnnfCounter::new(&f).count(x);
    }
}
