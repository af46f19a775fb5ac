//! Compiled d-DNNF and the compilation entry points of the factory.

use std::collections::BTreeSet;

use log::debug;
use num_bigint::BigUint;

use crate::compiler::{CompilerConfig, DnnfCompiler};
use crate::formula::{Formula, FormulaFactory, FormulaKind};
use crate::handler::{Cancelled, DnnfHandler, NopHandler};
use crate::types::Var;

/// A formula in decomposable deterministic negation normal form, together
/// with the variables of the formula it was compiled from.
///
/// The original variables matter for counting: a variable that was simplified
/// away is unconstrained and doubles the number of models.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Dnnf {
    pub formula: Formula,
    pub original_variables: BTreeSet<Var>,
}

impl Dnnf {
    pub fn new(formula: Formula, original_variables: BTreeSet<Var>) -> Self {
        Self {
            formula,
            original_variables,
        }
    }

    pub fn model_count(&self, f: &FormulaFactory) -> BigUint {
        f.dnnf_model_count(self)
    }

    /// Operands of every conjunction are pairwise variable-disjoint, and the
    /// formula is in NNF.
    pub fn is_decomposable(&self, f: &FormulaFactory) -> bool {
        f.is_nnf(self.formula) && all_nodes(f, self.formula, |x| match f.kind(x) {
            FormulaKind::And(ops) => pairwise(&ops, |a, b| f.variables(a).is_disjoint(&f.variables(b))),
            _ => true,
        })
    }

    /// Operands of every disjunction are pairwise contradictory.
    pub fn is_deterministic(&self, f: &FormulaFactory) -> bool {
        all_nodes(f, self.formula, |x| match f.kind(x) {
            FormulaKind::Or(ops) => pairwise(&ops, |a, b| !f.is_satisfiable(f.and([a, b]))),
            _ => true,
        })
    }
}

fn pairwise(ops: &[Formula], mut check: impl FnMut(Formula, Formula) -> bool) -> bool {
    for (i, &a) in ops.iter().enumerate() {
        for &b in &ops[i + 1..] {
            if !check(a, b) {
                return false;
            }
        }
    }
    true
}

/// Checks `pred` on every distinct node of the DAG below `root`.
fn all_nodes(f: &FormulaFactory, root: Formula, mut pred: impl FnMut(Formula) -> bool) -> bool {
    let mut visited = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(x) = stack.pop() {
        if !visited.insert(x) {
            continue;
        }
        if !pred(x) {
            return false;
        }
        stack.extend(f.operands(x));
    }
    true
}

impl FormulaFactory {
    /// Compiles `formula` into an equivalent d-DNNF.
    pub fn compile_dnnf(&self, formula: Formula) -> Dnnf {
        match self.compile_dnnf_with_handler(formula, &mut NopHandler) {
            Ok(dnnf) => dnnf,
            Err(Cancelled) => unreachable!("NopHandler never cancels"),
        }
    }

    pub fn compile_dnnf_with_handler(
        &self,
        formula: Formula,
        handler: &mut dyn DnnfHandler,
    ) -> Result<Dnnf, Cancelled> {
        self.compile_dnnf_with(formula, &CompilerConfig::default(), handler)
    }

    /// Converts `formula` to CNF if needed and compiles it.
    ///
    /// The original variables are those of `formula` and of its CNF.
    pub fn compile_dnnf_with(
        &self,
        formula: Formula,
        config: &CompilerConfig,
        handler: &mut dyn DnnfHandler,
    ) -> Result<Dnnf, Cancelled> {
        let cnf = self.cnf(formula);
        let mut original_variables = (*self.variables(formula)).clone();
        original_variables.extend(self.variables(cnf).iter().copied());

        let mut compiler = DnnfCompiler::new(self, cnf, config);
        let result = compiler.compile(handler)?;
        debug!(
            "compile_dnnf: {} nodes over {} variables",
            self.node_count(result),
            original_variables.len()
        );
        Ok(Dnnf::new(result, original_variables))
    }
}
