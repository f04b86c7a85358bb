//! Length-tracked BitSet backed by a Vec<u64>.
//! Used as the pool's "in use" bitmap, so it grows and shrinks at the tail
//! in lock-step with the handle list.

#[derive(Debug, Clone, Default)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    /// Create a BitSet of `len` cleared bits.
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Number of bits tracked (set or not).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a bit.
    pub fn push(&mut self, value: bool) {
        let index = self.len;
        if index / 64 >= self.words.len() {
            self.words.push(0);
        }
        self.len += 1;
        self.assign(index, value);
    }

    /// Drop bits past `len`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        self.len = len;
        self.words.truncate(len.div_ceil(64));
        let tail = len % 64;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }

    /// Set the bit at `index` to `value`. Out-of-range indices are ignored.
    pub fn assign(&mut self, index: usize, value: bool) {
        if index >= self.len {
            return;
        }
        let (word_idx, bit_idx) = (index / 64, index % 64);
        if value {
            self.words[word_idx] |= 1 << bit_idx;
        } else {
            self.words[word_idx] &= !(1 << bit_idx);
        }
    }

    /// Check if the bit at `index` is set.
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (word_idx, bit_idx) = (index / 64, index % 64);
        (self.words[word_idx] & (1 << bit_idx)) != 0
    }

    /// Index of the first cleared bit, if any.
    pub fn first_zero(&self) -> Option<usize> {
        for (word_idx, &word) in self.words.iter().enumerate() {
            if word != u64::MAX {
                let index = word_idx * 64 + (!word).trailing_zeros() as usize;
                return (index < self.len).then_some(index);
            }
        }
        None
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns iterator over indices of set bits
    pub fn ones(&self) -> OnesIter<'_> {
        OnesIter {
            bitset: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

pub struct OnesIter<'a> {
    bitset: &'a BitSet,
    word_idx: usize,
    current_word: u64,
}

impl Iterator for OnesIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let trailing = self.current_word.trailing_zeros();
                self.current_word &= !(1 << trailing);
                return Some(self.word_idx * 64 + trailing as usize);
            }

            self.word_idx += 1;
            if self.word_idx >= self.bitset.words.len() {
                return None;
            }
            self.current_word = self.bitset.words[self.word_idx];
        }
    }
}
