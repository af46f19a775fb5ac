use std::ops::{Index, IndexMut};

use crate::types::Lit;

/// Index of a clause in a [`ClauseDb`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ClauseRef(u32);

impl ClauseRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub(crate) lits: Vec<Lit>,
    learnt: bool,
    pub(crate) activity: f64,
}

impl Clause {
    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    pub fn len(&self) -> usize {
        self.lits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    pub fn is_learnt(&self) -> bool {
        self.learnt
    }

    pub fn activity(&self) -> f64 {
        self.activity
    }
}

/// Clause arena. Freed slots are recycled.
#[derive(Debug, Default)]
pub struct ClauseDb {
    clauses: Vec<Clause>,
    free: Vec<ClauseRef>,
}

impl ClauseDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, lits: Vec<Lit>, learnt: bool) -> ClauseRef {
        let clause = Clause {
            lits,
            learnt,
            activity: 0.0,
        };
        if let Some(cref) = self.free.pop() {
            self.clauses[cref.index()] = clause;
            cref
        } else {
            let cref = ClauseRef(self.clauses.len() as u32);
            self.clauses.push(clause);
            cref
        }
    }

    pub fn free(&mut self, cref: ClauseRef) {
        let clause = &mut self.clauses[cref.index()];
        clause.lits = Vec::new();
        clause.activity = 0.0;
        self.free.push(cref);
    }

    /// Number of live clauses.
    pub fn len(&self) -> usize {
        self.clauses.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Index<ClauseRef> for ClauseDb {
    type Output = Clause;

    fn index(&self, cref: ClauseRef) -> &Self::Output {
        &self.clauses[cref.index()]
    }
}

impl IndexMut<ClauseRef> for ClauseDb {
    fn index_mut(&mut self, cref: ClauseRef) -> &mut Self::Output {
        &mut self.clauses[cref.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Var;

    #[test]
    fn test_alloc_and_reuse() {
        let mut db = ClauseDb::new();
        let a = Var::new(0);
        let b = Var::new(1);

        let c1 = db.alloc(vec![a.pos(), b.neg()], false);
        let c2 = db.alloc(vec![a.neg(), b.pos()], true);
        assert_eq!(db.len(), 2);
        assert_eq!(db[c1].lits(), &[a.pos(), b.neg()]);
        assert!(db[c2].is_learnt());

        db.free(c1);
        assert_eq!(db.len(), 1);
        let c3 = db.alloc(vec![b.pos()], false);
        assert_eq!(c3, c1);
        assert_eq!(db[c3].len(), 1);
        assert!(!db[c3].is_learnt());
    }
}
