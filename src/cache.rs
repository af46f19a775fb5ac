use std::cell::Cell;
use std::collections::BTreeMap;

use crate::bitset::BitSet;
use crate::formula::Formula;

/// Compiled sub-problems, keyed by the cache key of a dtree node under the
/// partial assignment at the time of compilation.
#[derive(Debug, Default)]
pub struct SubproblemCache {
    entries: BTreeMap<BitSet, Formula>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl SubproblemCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of cache hits.
    pub fn hits(&self) -> usize {
        self.hits.get()
    }
    /// Get the number of cache misses.
    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reset the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get the cached result.
    pub fn get(&self, key: &BitSet) -> Option<Formula> {
        match self.entries.get(key) {
            Some(&value) => {
                self.hits.set(self.hits.get() + 1);
                Some(value)
            }
            None => {
                self.misses.set(self.misses.get() + 1);
                None
            }
        }
    }

    /// Insert a result into the cache.
    pub fn insert(&mut self, key: BitSet, value: Formula) {
        self.entries.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_cache() {
        let mut cache = SubproblemCache::new();

        let k1: BitSet = [1, 2].into_iter().collect();
        let k2: BitSet = [2, 3].into_iter().collect();
        cache.insert(k1.clone(), Formula::TRUE);
        cache.insert(k2.clone(), Formula::FALSE);

        assert_eq!(cache.get(&k1), Some(Formula::TRUE));
        assert_eq!(cache.get(&k2), Some(Formula::FALSE));
        assert_eq!(cache.get(&[1].into_iter().collect()), None);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&k1), None);
    }

    #[test]
    fn test_key_capacity_does_not_matter() {
        let mut cache = SubproblemCache::new();
        let mut wide = BitSet::new(1024);
        wide.set(5);
        cache.insert(wide, Formula::TRUE);

        let narrow: BitSet = [5].into_iter().collect();
        assert_eq!(cache.get(&narrow), Some(Formula::TRUE));
    }
}
