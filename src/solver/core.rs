//! MiniSat-style CDCL solver.
//!
//! Two-watched-literal propagation with blocking literals, first-UIP conflict
//! analysis, VSIDS branching with phase saving, Luby restarts and periodic
//! reduction of the learnt clause database.
//!
//! The decision-level primitives (`new_decision_level`, `unchecked_enqueue`,
//! `propagate`, `analyze`, `cancel_until`, `learn`) are exposed to the crate so
//! that [`DnnfSolver`][crate::solver::dnnf::DnnfSolver] can drive the search
//! by hand.

use std::cmp::Ordering;
use std::fmt;

use log::{debug, trace};

use crate::solver::clause::{ClauseDb, ClauseRef};
use crate::solver::config::SolverConfig;
use crate::solver::heap::VarHeap;
use crate::types::{Lit, Tristate, Var};

#[derive(Debug, Copy, Clone)]
struct Watcher {
    clause: ClauseRef,
    blocker: Lit,
}

/// Search counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SolverStats {
    pub conflicts: u64,
    pub decisions: u64,
    pub propagations: u64,
    pub restarts: u64,
}

#[inline]
fn lit_value(assigns: &[Tristate], lit: Lit) -> Tristate {
    let value = assigns[lit.var().index()];
    if lit.is_negated() {
        value.negate()
    } else {
        value
    }
}

/// Finite subsequences of the Luby sequence, scaled by `y`.
fn luby(y: f64, mut x: u64) -> f64 {
    let mut size = 1;
    let mut seq = 0;
    while size < x + 1 {
        seq += 1;
        size = 2 * size + 1;
    }
    while size - 1 != x {
        size = (size - 1) >> 1;
        seq -= 1;
        x %= size;
    }
    y.powi(seq)
}

pub struct Solver {
    config: SolverConfig,
    db: ClauseDb,
    clauses: Vec<ClauseRef>,
    learnts: Vec<ClauseRef>,

    assigns: Vec<Tristate>,
    levels: Vec<usize>,
    reasons: Vec<Option<ClauseRef>>,
    polarity: Vec<bool>,
    activity: Vec<f64>,
    seen: Vec<bool>,
    watches: Vec<Vec<Watcher>>,
    order: VarHeap,

    var_inc: f64,
    cla_inc: f64,
    max_learnts: f64,

    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    qhead: usize,

    ok: bool,
    model: Option<Vec<bool>>,
    stats: SolverStats,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            db: ClauseDb::new(),
            clauses: Vec::new(),
            learnts: Vec::new(),
            assigns: Vec::new(),
            levels: Vec::new(),
            reasons: Vec::new(),
            polarity: Vec::new(),
            activity: Vec::new(),
            seen: Vec::new(),
            watches: Vec::new(),
            order: VarHeap::new(),
            var_inc: 1.0,
            cla_inc: 1.0,
            max_learnts: 0.0,
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            ok: true,
            model: None,
            stats: SolverStats::default(),
        }
    }
}

impl Default for Solver {
    fn default() -> Self {
        Solver::new(SolverConfig::default())
    }
}

impl fmt::Debug for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solver")
            .field("vars", &self.n_vars())
            .field("clauses", &self.n_clauses())
            .field("learnts", &self.n_learnts())
            .field("ok", &self.ok)
            .finish()
    }
}

// Public API.
impl Solver {
    pub fn new_var(&mut self) -> Var {
        let var = Var::new(self.assigns.len() as u32);
        self.assigns.push(Tristate::Undef);
        self.levels.push(0);
        self.reasons.push(None);
        self.polarity.push(false);
        self.activity.push(0.0);
        self.seen.push(false);
        self.watches.push(Vec::new());
        self.watches.push(Vec::new());
        self.order.insert(var, &self.activity);
        var
    }

    pub fn n_vars(&self) -> usize {
        self.assigns.len()
    }

    pub fn n_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn n_learnts(&self) -> usize {
        self.learnts.len()
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// `false` once the clause set is known to be unsatisfiable.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn value(&self, lit: Lit) -> Tristate {
        lit_value(&self.assigns, lit)
    }

    pub fn value_var(&self, var: Var) -> Tristate {
        self.assigns[var.index()]
    }

    /// Model of the last successful `solve`, indexed by variable.
    pub fn model(&self) -> Option<&[bool]> {
        self.model.as_deref()
    }

    /// Adds a clause at decision level 0, creating missing variables.
    ///
    /// Returns `false` if the solver became unsatisfiable.
    pub fn add_clause(&mut self, lits: impl IntoIterator<Item = Lit>) -> bool {
        assert_eq!(
            self.decision_level(),
            0,
            "Clauses can only be added at decision level 0"
        );
        if !self.ok {
            return false;
        }

        let mut lits: Vec<Lit> = lits.into_iter().collect();
        for lit in &lits {
            while lit.var().index() >= self.n_vars() {
                self.new_var();
            }
        }
        lits.sort();
        lits.dedup();

        let mut simplified = Vec::with_capacity(lits.len());
        let mut prev: Option<Lit> = None;
        for lit in lits {
            if self.value(lit) == Tristate::True || prev == Some(-lit) {
                // Satisfied or tautological.
                return true;
            }
            if self.value(lit) == Tristate::False {
                continue;
            }
            simplified.push(lit);
            prev = Some(lit);
        }

        match simplified.len() {
            0 => self.ok = false,
            1 => {
                self.unchecked_enqueue(simplified[0], None);
                self.ok = self.propagate().is_none();
            }
            _ => {
                let cref = self.db.alloc(simplified, false);
                self.attach(cref);
                self.clauses.push(cref);
            }
        }
        self.ok
    }

    pub fn solve(&mut self) -> bool {
        self.solve_with_assumptions(&[])
    }

    /// Solves under the given assumptions. The solver returns to level 0 afterwards.
    pub fn solve_with_assumptions(&mut self, assumptions: &[Lit]) -> bool {
        self.model = None;
        if !self.ok {
            return false;
        }
        for lit in assumptions {
            while lit.var().index() >= self.n_vars() {
                self.new_var();
            }
        }

        self.max_learnts = (self.clauses.len() as f64 * self.config.learntsize_factor).max(10.0);
        let mut status = Tristate::Undef;
        let mut restarts = 0;
        while status == Tristate::Undef {
            let base = luby(self.config.restart_inc, restarts);
            let limit = (base * self.config.restart_first as f64) as u64;
            status = self.search(limit, assumptions);
            restarts += 1;
            self.max_learnts *= self.config.learntsize_inc;
        }

        if status == Tristate::True {
            let model = self.assigns.iter().map(|&v| v == Tristate::True).collect();
            self.model = Some(model);
        }
        self.cancel_until(0);

        debug!(
            "solve: {} after {} conflicts, {} decisions, {} restarts",
            status, self.stats.conflicts, self.stats.decisions, self.stats.restarts
        );
        status == Tristate::True
    }
}

// Search primitives.
impl Solver {
    pub(crate) fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    pub(crate) fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len());
    }

    pub(crate) fn level(&self, var: Var) -> usize {
        self.levels[var.index()]
    }

    pub(crate) fn trail(&self) -> &[Lit] {
        &self.trail
    }

    pub(crate) fn trail_lim(&self) -> &[usize] {
        &self.trail_lim
    }

    pub(crate) fn unchecked_enqueue(&mut self, lit: Lit, reason: Option<ClauseRef>) {
        let v = lit.var().index();
        debug_assert_eq!(self.assigns[v], Tristate::Undef);
        self.assigns[v] = Tristate::from_bool(lit.phase());
        self.levels[v] = self.decision_level();
        self.reasons[v] = reason;
        self.trail.push(lit);
    }

    fn attach(&mut self, cref: ClauseRef) {
        let lits = self.db[cref].lits();
        assert!(lits.len() > 1, "Only clauses of size > 1 are watched");
        let (l0, l1) = (lits[0], lits[1]);
        self.watches[(-l0).index()].push(Watcher {
            clause: cref,
            blocker: l1,
        });
        self.watches[(-l1).index()].push(Watcher {
            clause: cref,
            blocker: l0,
        });
    }

    fn detach(&mut self, cref: ClauseRef) {
        let lits = self.db[cref].lits();
        let (l0, l1) = (lits[0], lits[1]);
        self.watches[(-l0).index()].retain(|w| w.clause != cref);
        self.watches[(-l1).index()].retain(|w| w.clause != cref);
    }

    fn locked(&self, cref: ClauseRef) -> bool {
        let l0 = self.db[cref].lits()[0];
        self.value(l0) == Tristate::True && self.reasons[l0.var().index()] == Some(cref)
    }

    fn remove_clause(&mut self, cref: ClauseRef) {
        self.detach(cref);
        if self.locked(cref) {
            let v = self.db[cref].lits()[0].var().index();
            self.reasons[v] = None;
        }
        self.db.free(cref);
    }

    /// Propagates all enqueued facts. Returns the conflicting clause, if any.
    pub(crate) fn propagate(&mut self) -> Option<ClauseRef> {
        let mut conflict = None;

        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            self.stats.propagations += 1;

            let false_lit = -p;
            let mut ws = std::mem::take(&mut self.watches[p.index()]);
            let mut i = 0;
            let mut j = 0;

            'watchers: while i < ws.len() {
                let w = ws[i];
                i += 1;

                if lit_value(&self.assigns, w.blocker) == Tristate::True {
                    ws[j] = w;
                    j += 1;
                    continue;
                }

                let cref = w.clause;
                let clause = &mut self.db[cref];
                if clause.lits[0] == false_lit {
                    clause.lits.swap(0, 1);
                }
                debug_assert_eq!(clause.lits[1], false_lit);

                let first = clause.lits[0];
                let watcher = Watcher {
                    clause: cref,
                    blocker: first,
                };
                if first != w.blocker && lit_value(&self.assigns, first) == Tristate::True {
                    ws[j] = watcher;
                    j += 1;
                    continue;
                }

                // Look for a new literal to watch.
                for k in 2..clause.lits.len() {
                    if lit_value(&self.assigns, clause.lits[k]) != Tristate::False {
                        clause.lits.swap(1, k);
                        self.watches[(-clause.lits[1]).index()].push(watcher);
                        continue 'watchers;
                    }
                }

                // Unit or conflicting.
                ws[j] = watcher;
                j += 1;
                if lit_value(&self.assigns, first) == Tristate::False {
                    conflict = Some(cref);
                    self.qhead = self.trail.len();
                    while i < ws.len() {
                        ws[j] = ws[i];
                        j += 1;
                        i += 1;
                    }
                } else {
                    self.unchecked_enqueue(first, Some(cref));
                }
            }

            ws.truncate(j);
            self.watches[p.index()] = ws;

            if conflict.is_some() {
                break;
            }
        }

        conflict
    }

    /// First-UIP conflict analysis.
    ///
    /// Returns the learnt clause and the backtrack level. The asserting
    /// literal is at index 0 and a literal of the backtrack level at index 1.
    pub(crate) fn analyze(&mut self, conflict: ClauseRef) -> (Vec<Lit>, usize) {
        let mut learnt = vec![Lit::from_code(0)];
        let mut path_count = 0;
        let mut p: Option<Lit> = None;
        let mut index = self.trail.len();
        let mut confl = conflict;

        loop {
            if self.db[confl].is_learnt() {
                self.bump_clause(confl);
            }
            let start = if p.is_none() { 0 } else { 1 };
            for k in start..self.db[confl].len() {
                let q = self.db[confl].lits[k];
                let v = q.var().index();
                if !self.seen[v] && self.levels[v] > 0 {
                    self.bump_var(q.var());
                    self.seen[v] = true;
                    if self.levels[v] >= self.decision_level() {
                        path_count += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }

            // Next literal on the trail to look at.
            loop {
                index -= 1;
                if self.seen[self.trail[index].var().index()] {
                    break;
                }
            }
            let pl = self.trail[index];
            p = Some(pl);
            self.seen[pl.var().index()] = false;
            path_count -= 1;
            if path_count == 0 {
                break;
            }
            confl = match self.reasons[pl.var().index()] {
                Some(reason) => reason,
                None => unreachable!("implied literal {} has no reason", pl),
            };
        }
        if let Some(pl) = p {
            learnt[0] = -pl;
        }

        let to_clear = learnt.clone();
        if self.config.clause_minimization {
            let mut j = 1;
            for i in 1..learnt.len() {
                let keep = match self.reasons[learnt[i].var().index()] {
                    None => true,
                    Some(reason) => self.db[reason].lits()[1..].iter().any(|&q| {
                        let v = q.var().index();
                        !self.seen[v] && self.levels[v] > 0
                    }),
                };
                if keep {
                    learnt[j] = learnt[i];
                    j += 1;
                }
            }
            learnt.truncate(j);
        }

        let bt_level = if learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            for i in 2..learnt.len() {
                if self.level(learnt[i].var()) > self.level(learnt[max_i].var()) {
                    max_i = i;
                }
            }
            learnt.swap(1, max_i);
            self.level(learnt[1].var())
        };

        for lit in to_clear {
            self.seen[lit.var().index()] = false;
        }

        trace!("analyze: learnt {:?}, backtrack to {}", learnt, bt_level);
        (learnt, bt_level)
    }

    /// Backtracks to the given level, saving the phases of unassigned variables.
    pub(crate) fn cancel_until(&mut self, level: usize) {
        if self.decision_level() > level {
            let lim = self.trail_lim[level];
            for c in (lim..self.trail.len()).rev() {
                let lit = self.trail[c];
                let v = lit.var().index();
                self.assigns[v] = Tristate::Undef;
                self.reasons[v] = None;
                self.polarity[v] = lit.phase();
                self.order.insert(lit.var(), &self.activity);
            }
            self.qhead = lim;
            self.trail.truncate(lim);
            self.trail_lim.truncate(level);
        }
    }

    /// Stores a learnt clause and asserts its first literal.
    pub(crate) fn learn(&mut self, learnt: Vec<Lit>) {
        let first = learnt[0];
        if learnt.len() == 1 {
            self.unchecked_enqueue(first, None);
        } else {
            let cref = self.db.alloc(learnt, true);
            self.attach(cref);
            self.bump_clause(cref);
            self.learnts.push(cref);
            self.unchecked_enqueue(first, Some(cref));
        }
    }

    fn bump_var(&mut self, var: Var) {
        let v = var.index();
        self.activity[v] += self.var_inc;
        if self.activity[v] > 1e100 {
            for a in &mut self.activity {
                *a *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }
        self.order.bump(var, &self.activity);
    }

    fn bump_clause(&mut self, cref: ClauseRef) {
        self.db[cref].activity += self.cla_inc;
        if self.db[cref].activity > 1e20 {
            for &learnt in &self.learnts {
                self.db[learnt].activity *= 1e-20;
            }
            self.db[cref].activity *= 1e-20;
            self.cla_inc *= 1e-20;
        }
    }

    pub(crate) fn decay_activities(&mut self) {
        self.var_inc *= 1.0 / self.config.var_decay;
        self.cla_inc *= 1.0 / self.config.clause_decay;
    }

    fn pick_branch_lit(&mut self) -> Option<Lit> {
        while let Some(var) = self.order.pop_max(&self.activity) {
            if self.assigns[var.index()] == Tristate::Undef {
                return Some(var.lit(self.polarity[var.index()]));
            }
        }
        None
    }

    /// Removes about half of the learnt clauses, keeping binary and locked ones.
    fn reduce_db(&mut self) {
        let extra_lim = self.cla_inc / self.learnts.len() as f64;
        let mut learnts = std::mem::take(&mut self.learnts);
        learnts.sort_by(|&a, &b| {
            let (ca, cb) = (&self.db[a], &self.db[b]);
            (ca.len() == 2)
                .cmp(&(cb.len() == 2))
                .then(ca.activity.partial_cmp(&cb.activity).unwrap_or(Ordering::Equal))
        });

        let half = learnts.len() / 2;
        let mut kept = Vec::with_capacity(learnts.len());
        for (i, cref) in learnts.into_iter().enumerate() {
            let clause = &self.db[cref];
            if clause.len() > 2 && !self.locked(cref) && (i < half || clause.activity < extra_lim) {
                self.remove_clause(cref);
            } else {
                kept.push(cref);
            }
        }
        debug!("reduce_db: kept {} learnt clauses", kept.len());
        self.learnts = kept;
    }

    /// Searches for a model until `conflict_limit` conflicts occur.
    ///
    /// Returns `Undef` on restart.
    fn search(&mut self, conflict_limit: u64, assumptions: &[Lit]) -> Tristate {
        let mut conflicts = 0;
        loop {
            if let Some(conflict) = self.propagate() {
                self.stats.conflicts += 1;
                conflicts += 1;
                if self.decision_level() == 0 {
                    self.ok = false;
                    return Tristate::False;
                }
                let (learnt, bt_level) = self.analyze(conflict);
                self.cancel_until(bt_level);
                self.learn(learnt);
                self.decay_activities();
            } else {
                if conflicts >= conflict_limit {
                    self.cancel_until(0);
                    self.stats.restarts += 1;
                    debug!("search: restart after {} conflicts", conflicts);
                    return Tristate::Undef;
                }
                if self.learnts.len() as f64 - self.trail.len() as f64 >= self.max_learnts {
                    self.reduce_db();
                }

                let mut next = None;
                while self.decision_level() < assumptions.len() {
                    let p = assumptions[self.decision_level()];
                    match self.value(p) {
                        Tristate::True => self.new_decision_level(),
                        Tristate::False => return Tristate::False,
                        Tristate::Undef => {
                            next = Some(p);
                            break;
                        }
                    }
                }

                let next = match next {
                    Some(p) => p,
                    None => {
                        self.stats.decisions += 1;
                        match self.pick_branch_lit() {
                            Some(lit) => lit,
                            None => return Tristate::True,
                        }
                    }
                };
                self.new_decision_level();
                self.unchecked_enqueue(next, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn lits(dimacs: &[i32]) -> Vec<Lit> {
        dimacs.iter().map(|&x| Lit::from_dimacs(x)).collect()
    }

    fn check_model(solver: &Solver, clauses: &[Vec<i32>]) {
        let model = solver.model().unwrap();
        for clause in clauses {
            assert!(clause.iter().any(|&x| {
                let lit = Lit::from_dimacs(x);
                model[lit.var().index()] == lit.phase()
            }));
        }
    }

    #[test]
    fn test_luby() {
        let seq: Vec<f64> = (0..7).map(|i| luby(2.0, i)).collect();
        assert_eq!(seq, vec![1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_empty() {
        let mut solver = Solver::default();
        assert!(solver.solve());
        assert_eq!(solver.model(), Some(&[][..]));
    }

    #[test]
    fn test_simple_sat() {
        let clauses = vec![vec![1, 2], vec![-1, 3], vec![-2, 3], vec![-3, 4]];
        let mut solver = Solver::default();
        for c in &clauses {
            solver.add_clause(lits(c));
        }
        assert_eq!(solver.n_vars(), 4);
        assert!(solver.solve());
        check_model(&solver, &clauses);
    }

    #[test]
    fn test_unit_conflict() {
        let mut solver = Solver::default();
        assert!(solver.add_clause(lits(&[1])));
        assert!(!solver.add_clause(lits(&[-1])));
        assert!(!solver.is_ok());
        assert!(!solver.solve());
    }

    #[test]
    fn test_tautology_is_ignored() {
        let mut solver = Solver::default();
        solver.add_clause(lits(&[1, -1]));
        assert_eq!(solver.n_clauses(), 0);
        assert!(solver.solve());
    }

    #[test]
    fn test_pigeonhole_3_2() {
        // Pigeon i in hole j: variable 2 * i + j + 1.
        let p = |i: i32, j: i32| 2 * i + j + 1;
        let mut clauses = Vec::new();
        for i in 0..3 {
            clauses.push(vec![p(i, 0), p(i, 1)]);
        }
        for j in 0..2 {
            for a in 0..3 {
                for b in (a + 1)..3 {
                    clauses.push(vec![-p(a, j), -p(b, j)]);
                }
            }
        }
        let mut solver = Solver::default();
        for c in &clauses {
            solver.add_clause(lits(c));
        }
        assert!(!solver.solve());
        assert!(solver.stats().conflicts > 0);
        assert!(solver.model().is_none());
    }

    #[test]
    fn test_assumptions() {
        let clauses = vec![vec![1, 2], vec![-1, 2]];
        let mut solver = Solver::default();
        for c in &clauses {
            solver.add_clause(lits(c));
        }
        assert!(solver.solve_with_assumptions(&lits(&[1])));
        check_model(&solver, &clauses);
        assert!(!solver.solve_with_assumptions(&lits(&[-2])));
        // Failing under assumptions keeps the solver usable.
        assert!(solver.is_ok());
        assert!(solver.solve_with_assumptions(&lits(&[-1])));
        assert_eq!(solver.value(Lit::from_dimacs(2)), Tristate::True);
    }

    #[test]
    fn test_many_models() {
        // x1 xor x2 xor x3, as CNF.
        let clauses = vec![
            vec![1, 2, 3],
            vec![1, -2, -3],
            vec![-1, 2, -3],
            vec![-1, -2, 3],
        ];
        let mut solver = Solver::default();
        for c in &clauses {
            solver.add_clause(lits(c));
        }
        let mut count = 0;
        while solver.solve() {
            check_model(&solver, &clauses);
            let model = solver.model().unwrap().to_vec();
            let blocking: Vec<Lit> = model
                .iter()
                .enumerate()
                .map(|(v, &b)| Var::new(v as u32).lit(!b))
                .collect();
            count += 1;
            solver.add_clause(blocking);
        }
        assert_eq!(count, 4);
    }
}
