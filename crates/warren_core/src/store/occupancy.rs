// occupancy.rs - bitmap tracking of occupied page slots
//
// Pure bit-vector algorithms over one word array per page. The range
// extraction here is the hot path for teardown and broadcast dispatch,
// so it walks runs of bits per word instead of testing bits one by one.

use super::page::PAGE_CAPACITY;
use std::ops::Range;

const WORD_BITS: usize = u64::BITS as usize;
const WORDS: usize = PAGE_CAPACITY.div_ceil(WORD_BITS);

/// One bit per page slot; a set bit means a live object occupies the slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Occupancy {
    words: [u64; WORDS],
}

impl Occupancy {
    pub fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Index of the lowest zero bit, or `None` when the page is exhausted.
    ///
    /// The last word may extend past the logical capacity; a candidate
    /// falling in that tail counts as exhausted rather than free.
    pub fn find_free(&self) -> Option<usize> {
        for (word_index, &word) in self.words.iter().enumerate() {
            if word != u64::MAX {
                let index = word_index * WORD_BITS + word.trailing_ones() as usize;
                if index >= PAGE_CAPACITY {
                    return None;
                }
                return Some(index);
            }
        }
        None
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < PAGE_CAPACITY);
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < PAGE_CAPACITY);
        self.words[index / WORD_BITS] &= !(1u64 << (index % WORD_BITS));
    }

    #[inline]
    pub fn test(&self, index: usize) -> bool {
        debug_assert!(index < PAGE_CAPACITY);
        self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// Population count across all words.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn is_full(&self) -> bool {
        self.words.iter().all(|&w| w == u64::MAX)
    }

    /// Maximal disjoint `[begin, end)` runs of set bits, ascending.
    ///
    /// Alternates between counting a run of trailing zeros and a run of
    /// trailing ones per word, merging a run that ends exactly where the
    /// next one begins (including across word boundaries).
    pub fn active_ranges(&self) -> Vec<Range<usize>> {
        let mut result = Vec::with_capacity(8);
        let mut current: Option<Range<usize>> = None;

        for (word_index, &word) in self.words.iter().enumerate() {
            let mut remaining = word;
            let mut position = 0;
            while remaining != 0 {
                let zeros = remaining.trailing_zeros() as usize;
                remaining = if zeros >= WORD_BITS { 0 } else { remaining >> zeros };
                let ones = remaining.trailing_ones() as usize;
                remaining = if ones >= WORD_BITS { 0 } else { remaining >> ones };

                let begin = word_index * WORD_BITS + position + zeros;
                let end = begin + ones;
                position += zeros + ones;

                match current {
                    Some(ref mut run) if run.end == begin => run.end = end,
                    Some(run) => {
                        result.push(run);
                        current = Some(begin..end);
                    }
                    None => current = Some(begin..end),
                }
            }
        }

        if let Some(run) = current {
            result.push(run);
        }
        result
    }
}
