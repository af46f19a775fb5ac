//! Hash-consed propositional formulas.
//!
//! All formulas live in a [`FormulaFactory`] and are referred to by lightweight
//! [`Formula`] handles. Structurally equal formulas always get the same handle,
//! so comparing handles is comparing formulas.
//!
//! The constructors apply a small set of local simplifications:
//!
//! - `and`/`or` flatten nested operators of the same kind, drop the neutral
//!   constant, collapse to the absorbing constant (also when a literal and its
//!   complement meet), remove duplicates keeping the first occurrence, and
//!   return the single operand itself;
//! - `not` folds constants, literals and double negations;
//! - `implies`/`equiv` fold constant and identical operands.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use log::trace;

use crate::types::{Lit, Var};

/// Handle of a formula inside a [`FormulaFactory`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Formula(u32);

impl Formula {
    pub const FALSE: Formula = Formula(0);
    pub const TRUE: Formula = Formula(1);

    pub const fn id(self) -> u32 {
        self.0
    }

    pub const fn is_false(self) -> bool {
        self.0 == Self::FALSE.0
    }

    pub const fn is_true(self) -> bool {
        self.0 == Self::TRUE.0
    }

    pub const fn is_constant(self) -> bool {
        self.is_false() || self.is_true()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// The node kinds of the formula store.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum FormulaKind {
    False,
    True,
    Lit(Lit),
    Not(Formula),
    And(Rc<[Formula]>),
    Or(Rc<[Formula]>),
    Implies(Formula, Formula),
    Equiv(Formula, Formula),
}

impl FormulaKind {
    /// Binding strength used for rendering.
    fn precedence(&self) -> u8 {
        match self {
            FormulaKind::Equiv(..) => 0,
            FormulaKind::Implies(..) => 1,
            FormulaKind::Or(_) => 2,
            FormulaKind::And(_) => 3,
            _ => 4,
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    nodes: Vec<FormulaKind>,
    unique: HashMap<FormulaKind, Formula>,
}

impl Store {
    fn intern(&mut self, kind: FormulaKind) -> Formula {
        if let Some(&f) = self.unique.get(&kind) {
            return f;
        }
        let f = Formula(self.nodes.len() as u32);
        self.nodes.push(kind.clone());
        self.unique.insert(kind, f);
        f
    }

    fn kind(&self, f: Formula) -> &FormulaKind {
        &self.nodes[f.0 as usize]
    }
}

/// A set of literals. Variables not mentioned are `false`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Assignment {
    literals: BTreeSet<Lit>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, lit: Lit) {
        self.literals.remove(&lit.negate());
        self.literals.insert(lit);
    }

    /// Value of a variable: `true` iff its positive literal is in the set.
    pub fn value(&self, var: Var) -> bool {
        self.literals.contains(&var.pos())
    }

    /// Value of a literal under this assignment.
    pub fn satisfies(&self, lit: Lit) -> bool {
        self.value(lit.var()) == lit.phase()
    }

    pub fn literals(&self) -> impl Iterator<Item = Lit> + '_ {
        self.literals.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }
}

impl FromIterator<Lit> for Assignment {
    fn from_iter<I: IntoIterator<Item = Lit>>(iter: I) -> Self {
        let mut assignment = Assignment::new();
        for lit in iter {
            assignment.add(lit);
        }
        assignment
    }
}

/// Formula manager: owns every node, the variable names and a few memo tables.
pub struct FormulaFactory {
    store: RefCell<Store>,
    names: RefCell<Vec<String>>,
    name_index: RefCell<HashMap<String, Var>>,
    variables_cache: RefCell<HashMap<Formula, Rc<BTreeSet<Var>>>>,
}

impl FormulaFactory {
    pub fn new() -> Self {
        let mut store = Store::default();

        // Constants occupy the first two slots.
        let zero = store.intern(FormulaKind::False);
        assert_eq!(zero, Formula::FALSE);
        let one = store.intern(FormulaKind::True);
        assert_eq!(one, Formula::TRUE);

        Self {
            store: RefCell::new(store),
            names: RefCell::new(Vec::new()),
            name_index: RefCell::new(HashMap::new()),
            variables_cache: RefCell::new(HashMap::new()),
        }
    }
}

impl Default for FormulaFactory {
    fn default() -> Self {
        FormulaFactory::new()
    }
}

impl fmt::Debug for FormulaFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaFactory")
            .field("nodes", &self.store.borrow().nodes.len())
            .field("variables", &self.names.borrow().len())
            .finish()
    }
}

// Variables and names.
impl FormulaFactory {
    /// Returns the variable with the given name, creating it on first use.
    pub fn variable(&self, name: &str) -> Var {
        if let Some(&var) = self.name_index.borrow().get(name) {
            return var;
        }
        let mut names = self.names.borrow_mut();
        let var = Var::new(names.len() as u32);
        names.push(name.to_string());
        self.name_index.borrow_mut().insert(name.to_string(), var);
        var
    }

    /// Looks up an existing variable by name.
    pub fn lookup(&self, name: &str) -> Option<Var> {
        self.name_index.borrow().get(name).copied()
    }

    pub fn name(&self, var: Var) -> String {
        self.names.borrow()[var.index()].clone()
    }

    /// Number of variables created so far.
    pub fn num_vars(&self) -> usize {
        self.names.borrow().len()
    }

    /// Number of nodes in the store, constants included.
    pub fn num_nodes(&self) -> usize {
        self.store.borrow().nodes.len()
    }
}

// Constructors.
impl FormulaFactory {
    pub fn verum(&self) -> Formula {
        Formula::TRUE
    }

    pub fn falsum(&self) -> Formula {
        Formula::FALSE
    }

    pub fn constant(&self, value: bool) -> Formula {
        if value {
            Formula::TRUE
        } else {
            Formula::FALSE
        }
    }

    pub fn lit(&self, lit: Lit) -> Formula {
        self.store.borrow_mut().intern(FormulaKind::Lit(lit))
    }

    pub fn literal(&self, var: Var, phase: bool) -> Formula {
        self.lit(var.lit(phase))
    }

    /// Positive literal of the named variable.
    pub fn var(&self, name: &str) -> Formula {
        let v = self.variable(name);
        self.lit(v.pos())
    }

    pub fn not(&self, f: Formula) -> Formula {
        match self.kind(f) {
            FormulaKind::False => Formula::TRUE,
            FormulaKind::True => Formula::FALSE,
            FormulaKind::Lit(l) => self.lit(-l),
            FormulaKind::Not(g) => g,
            _ => self.store.borrow_mut().intern(FormulaKind::Not(f)),
        }
    }

    pub fn and(&self, operands: impl IntoIterator<Item = Formula>) -> Formula {
        self.junction(operands, true)
    }

    pub fn or(&self, operands: impl IntoIterator<Item = Formula>) -> Formula {
        self.junction(operands, false)
    }

    /// Shared construction of conjunctions (`conj == true`) and disjunctions.
    fn junction(&self, operands: impl IntoIterator<Item = Formula>, conj: bool) -> Formula {
        let neutral = self.constant(conj);
        let absorbing = self.constant(!conj);

        let mut ops: Vec<Formula> = Vec::new();
        let mut seen: HashSet<Formula> = HashSet::new();
        let mut lits: HashSet<Lit> = HashSet::new();

        for op in operands {
            if op == neutral {
                continue;
            }
            if op == absorbing {
                return absorbing;
            }
            let inner: Vec<Formula> = match self.kind(op) {
                FormulaKind::And(xs) if conj => xs.to_vec(),
                FormulaKind::Or(xs) if !conj => xs.to_vec(),
                _ => vec![op],
            };
            for x in inner {
                if !seen.insert(x) {
                    continue;
                }
                if let FormulaKind::Lit(l) = self.kind(x) {
                    if lits.contains(&-l) {
                        return absorbing;
                    }
                    lits.insert(l);
                }
                ops.push(x);
            }
        }

        match ops.len() {
            0 => neutral,
            1 => ops[0],
            _ => {
                let ops: Rc<[Formula]> = ops.into();
                let kind = if conj {
                    FormulaKind::And(ops)
                } else {
                    FormulaKind::Or(ops)
                };
                self.store.borrow_mut().intern(kind)
            }
        }
    }

    pub fn implies(&self, f: Formula, g: Formula) -> Formula {
        if f.is_false() || g.is_true() || f == g {
            return Formula::TRUE;
        }
        if f.is_true() {
            return g;
        }
        if g.is_false() {
            return self.not(f);
        }
        self.store.borrow_mut().intern(FormulaKind::Implies(f, g))
    }

    pub fn equiv(&self, f: Formula, g: Formula) -> Formula {
        if f == g {
            return Formula::TRUE;
        }
        if f.is_true() {
            return g;
        }
        if g.is_true() {
            return f;
        }
        if f.is_false() {
            return self.not(g);
        }
        if g.is_false() {
            return self.not(f);
        }
        if let (FormulaKind::Lit(a), FormulaKind::Lit(b)) = (self.kind(f), self.kind(g)) {
            if a == -b {
                return Formula::FALSE;
            }
        }
        self.store.borrow_mut().intern(FormulaKind::Equiv(f, g))
    }

    /// Disjunction of literals.
    pub fn clause(&self, lits: impl IntoIterator<Item = Lit>) -> Formula {
        let ops: Vec<Formula> = lits.into_iter().map(|l| self.lit(l)).collect();
        self.or(ops)
    }

    /// Conjunction of literals.
    pub fn cube(&self, lits: impl IntoIterator<Item = Lit>) -> Formula {
        let ops: Vec<Formula> = lits.into_iter().map(|l| self.lit(l)).collect();
        self.and(ops)
    }
}

// Queries.
impl FormulaFactory {
    pub fn kind(&self, f: Formula) -> FormulaKind {
        self.store.borrow().kind(f).clone()
    }

    /// Direct sub-formulas of `f`, in order.
    pub fn operands(&self, f: Formula) -> Vec<Formula> {
        match self.kind(f) {
            FormulaKind::False | FormulaKind::True | FormulaKind::Lit(_) => Vec::new(),
            FormulaKind::Not(g) => vec![g],
            FormulaKind::And(ops) | FormulaKind::Or(ops) => ops.to_vec(),
            FormulaKind::Implies(a, b) | FormulaKind::Equiv(a, b) => vec![a, b],
        }
    }

    /// The literal of an atomic literal node.
    pub fn as_lit(&self, f: Formula) -> Option<Lit> {
        match self.kind(f) {
            FormulaKind::Lit(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_atomic(&self, f: Formula) -> bool {
        matches!(
            self.kind(f),
            FormulaKind::False | FormulaKind::True | FormulaKind::Lit(_)
        )
    }

    /// A literal, `False`, or a disjunction of literals.
    pub fn is_clause(&self, f: Formula) -> bool {
        match self.kind(f) {
            FormulaKind::False | FormulaKind::Lit(_) => true,
            FormulaKind::Or(ops) => ops.iter().all(|&op| self.as_lit(op).is_some()),
            _ => false,
        }
    }

    pub fn is_cnf(&self, f: Formula) -> bool {
        match self.kind(f) {
            FormulaKind::True => true,
            FormulaKind::And(ops) => ops.iter().all(|&op| self.is_clause(op)),
            _ => self.is_clause(f),
        }
    }

    pub fn is_nnf(&self, f: Formula) -> bool {
        match self.kind(f) {
            FormulaKind::False | FormulaKind::True | FormulaKind::Lit(_) => true,
            FormulaKind::And(ops) | FormulaKind::Or(ops) => ops.iter().all(|&op| self.is_nnf(op)),
            FormulaKind::Not(_) | FormulaKind::Implies(..) | FormulaKind::Equiv(..) => false,
        }
    }

    /// Sorted set of variables occurring in `f`. Memoized per node.
    pub fn variables(&self, f: Formula) -> Rc<BTreeSet<Var>> {
        if let Some(vars) = self.variables_cache.borrow().get(&f) {
            return Rc::clone(vars);
        }
        let vars = match self.kind(f) {
            FormulaKind::False | FormulaKind::True => BTreeSet::new(),
            FormulaKind::Lit(l) => BTreeSet::from([l.var()]),
            _ => {
                let mut vars = BTreeSet::new();
                for op in self.operands(f) {
                    vars.extend(self.variables(op).iter().copied());
                }
                vars
            }
        };
        let vars = Rc::new(vars);
        self.variables_cache
            .borrow_mut()
            .insert(f, Rc::clone(&vars));
        vars
    }

    /// Distinct literals of `f` in order of first occurrence.
    pub fn literals(&self, f: Formula) -> Vec<Lit> {
        fn collect(ff: &FormulaFactory, f: Formula, seen: &mut HashSet<Lit>, out: &mut Vec<Lit>) {
            match ff.kind(f) {
                FormulaKind::Lit(l) => {
                    if seen.insert(l) {
                        out.push(l);
                    }
                }
                _ => {
                    for op in ff.operands(f) {
                        collect(ff, op, seen, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        collect(self, f, &mut HashSet::new(), &mut out);
        out
    }

    /// Literals of a clause in operand order.
    ///
    /// Panics if `f` is not a clause.
    pub fn clause_literals(&self, f: Formula) -> Vec<Lit> {
        match self.kind(f) {
            FormulaKind::False => Vec::new(),
            FormulaKind::Lit(l) => vec![l],
            FormulaKind::Or(ops) => ops
                .iter()
                .map(|&op| match self.as_lit(op) {
                    Some(l) => l,
                    None => panic!("{} is not a clause", self.display(f)),
                })
                .collect(),
            _ => panic!("{} is not a clause", self.display(f)),
        }
    }

    /// Clauses of a CNF as literal lists. `True` has no clauses, `False` has one empty clause.
    ///
    /// Panics if `f` is not in CNF.
    pub fn clauses(&self, f: Formula) -> Vec<Vec<Lit>> {
        match self.kind(f) {
            FormulaKind::True => Vec::new(),
            FormulaKind::And(ops) => ops.iter().map(|&op| self.clause_literals(op)).collect(),
            _ => vec![self.clause_literals(f)],
        }
    }

    pub fn evaluate(&self, f: Formula, assignment: &Assignment) -> bool {
        match self.kind(f) {
            FormulaKind::False => false,
            FormulaKind::True => true,
            FormulaKind::Lit(l) => assignment.satisfies(l),
            FormulaKind::Not(g) => !self.evaluate(g, assignment),
            FormulaKind::And(ops) => ops.iter().all(|&op| self.evaluate(op, assignment)),
            FormulaKind::Or(ops) => ops.iter().any(|&op| self.evaluate(op, assignment)),
            FormulaKind::Implies(a, b) => {
                !self.evaluate(a, assignment) || self.evaluate(b, assignment)
            }
            FormulaKind::Equiv(a, b) => self.evaluate(a, assignment) == self.evaluate(b, assignment),
        }
    }

    /// Number of distinct nodes reachable from `f`.
    pub fn node_count(&self, f: Formula) -> usize {
        let mut visited = HashSet::new();
        let mut stack = vec![f];
        while let Some(g) = stack.pop() {
            if visited.insert(g) {
                stack.extend(self.operands(g));
            }
        }
        trace!("node_count({}) = {}", f, visited.len());
        visited.len()
    }

    /// Renders `f` with `~`, `&`, `|`, `=>` and `<=>`.
    pub fn display(&self, f: Formula) -> FormulaDisplay<'_> {
        FormulaDisplay { factory: self, formula: f }
    }

    fn render(&self, f: Formula, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind(f);
        let prec = kind.precedence();
        let child = |g: Formula, strict: bool, out: &mut fmt::Formatter<'_>| -> fmt::Result {
            let p = self.kind(g).precedence();
            if p < prec || (strict && p == prec) {
                write!(out, "(")?;
                self.render(g, out)?;
                write!(out, ")")
            } else {
                self.render(g, out)
            }
        };
        match kind {
            FormulaKind::False => write!(out, "$false"),
            FormulaKind::True => write!(out, "$true"),
            FormulaKind::Lit(l) => {
                if l.is_negated() {
                    write!(out, "~")?;
                }
                write!(out, "{}", self.name(l.var()))
            }
            FormulaKind::Not(g) => {
                write!(out, "~")?;
                child(g, false, out)
            }
            FormulaKind::And(ops) | FormulaKind::Or(ops) => {
                let sep = if matches!(self.kind(f), FormulaKind::And(_)) {
                    " & "
                } else {
                    " | "
                };
                for (i, &op) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(out, "{}", sep)?;
                    }
                    child(op, false, out)?;
                }
                Ok(())
            }
            FormulaKind::Implies(a, b) => {
                child(a, true, out)?;
                write!(out, " => ")?;
                child(b, true, out)
            }
            FormulaKind::Equiv(a, b) => {
                child(a, true, out)?;
                write!(out, " <=> ")?;
                child(b, true, out)
            }
        }
    }
}

pub struct FormulaDisplay<'a> {
    factory: &'a FormulaFactory,
    formula: Formula,
}

impl fmt::Display for FormulaDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.factory.render(self.formula, f)
    }
}
