//! Dense bit set used for variable sets, separators and cache keys.
//!
//! Bit sets compare by their *significant* words (trailing zero words are
//! ignored), so two sets holding the same bits are equal and hash alike no
//! matter how much capacity they have. This makes them usable as keys of the
//! ordered sub-problem cache.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A growable bit set backed by a vector of u64 words.
///
/// Bits beyond the current capacity read as unset. Setting such a bit grows
/// the storage (at least doubling it).
#[derive(Debug, Clone, Default)]
pub struct BitSet {
    /// Storage: each u64 holds 64 bits
    words: Vec<u64>,
}

impl BitSet {
    /// Number of bits per word.
    const BITS_PER_WORD: usize = 64;

    /// Creates a new empty bit set with the given capacity (in bits).
    pub fn new(capacity: usize) -> Self {
        let num_words = capacity.div_ceil(Self::BITS_PER_WORD);
        Self {
            words: vec![0; num_words],
        }
    }

    /// Creates an empty bit set with no pre-allocated capacity.
    pub fn empty() -> Self {
        Self { words: Vec::new() }
    }

    /// Returns the capacity in bits.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.words.len() * Self::BITS_PER_WORD
    }

    /// Gets the word index and bit position for a given bit index.
    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        let word = index / Self::BITS_PER_WORD;
        let bit = index % Self::BITS_PER_WORD;
        (word, bit)
    }

    fn grow(&mut self, word_idx: usize) {
        if word_idx >= self.words.len() {
            let new_len = (word_idx + 1).max(2 * self.words.len());
            self.words.resize(new_len, 0);
        }
    }

    /// Returns true if the bit at the given index is set.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        match self.words.get(word_idx) {
            Some(word) => word & (1u64 << bit_idx) != 0,
            None => false,
        }
    }

    /// Sets the bit at the given index.
    #[inline]
    pub fn set(&mut self, index: usize) {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        self.grow(word_idx);
        self.words[word_idx] |= 1u64 << bit_idx;
    }

    /// Clears the bit at the given index.
    #[inline]
    pub fn unset(&mut self, index: usize) {
        let (word_idx, bit_idx) = Self::word_and_bit(index);
        if let Some(word) = self.words.get_mut(word_idx) {
            *word &= !(1u64 << bit_idx);
        }
    }

    /// In-place union.
    pub fn or(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, &o) in self.words.iter_mut().zip(&other.words) {
            *word |= o;
        }
    }

    /// In-place intersection.
    pub fn and(&mut self, other: &BitSet) {
        for (i, word) in self.words.iter_mut().enumerate() {
            *word &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    /// Returns the number of set bits.
    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns true if no bits are set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns the index of the first set bit at or after `from`, if any.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        let (mut word_idx, bit_idx) = Self::word_and_bit(from);
        if word_idx >= self.words.len() {
            return None;
        }
        let mut word = self.words[word_idx] & (u64::MAX << bit_idx);
        loop {
            if word != 0 {
                return Some(word_idx * Self::BITS_PER_WORD + word.trailing_zeros() as usize);
            }
            word_idx += 1;
            if word_idx >= self.words.len() {
                return None;
            }
            word = self.words[word_idx];
        }
    }

    /// Clears all bits, keeping the allocated capacity.
    pub fn clear(&mut self) {
        for word in &mut self.words {
            *word = 0;
        }
    }

    /// Returns an iterator over all set bit indices, in ascending order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            bitset: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Words up to and including the last non-zero one.
    fn significant_words(&self) -> &[u64] {
        let len = self
            .words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |i| i + 1);
        &self.words[..len]
    }
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        self.significant_words() == other.significant_words()
    }
}

impl Eq for BitSet {}

impl Hash for BitSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state);
    }
}

impl Ord for BitSet {
    /// Orders by the number of significant words first, then by the earliest
    /// differing bit: the set containing that bit is the greater one.
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.significant_words();
        let b = other.significant_words();
        a.len().cmp(&b.len()).then_with(|| {
            for (&x, &y) in a.iter().zip(b) {
                let diff = x ^ y;
                if diff != 0 {
                    let bit = diff.trailing_zeros();
                    return if x & (1u64 << bit) != 0 {
                        Ordering::Greater
                    } else {
                        Ordering::Less
                    };
                }
            }
            Ordering::Equal
        })
    }
}

impl PartialOrd for BitSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Extend<usize> for BitSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for index in iter {
            self.set(index);
        }
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bs = BitSet::empty();
        bs.extend(iter);
        bs
    }
}

/// Iterator over set bits in a BitSet.
pub struct BitSetIter<'a> {
    bitset: &'a BitSet,
    word_idx: usize,
    current_word: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit_idx = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // Clear lowest set bit
                return Some(self.word_idx * BitSet::BITS_PER_WORD + bit_idx);
            }

            self.word_idx += 1;
            if self.word_idx >= self.bitset.words.len() {
                return None;
            }
            self.current_word = self.bitset.words[self.word_idx];
        }
    }
}
