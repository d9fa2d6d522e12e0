//! Hex digit accumulator shared by frame synchronization and assembly
//!
//! Digits are held as lowercase ASCII bytes. The queue only ever grows at the
//! back and shrinks at the front, so the distance from any match to the end of
//! the queue is exactly the number of digits that arrived after it.
//!
//! The queue also counts every digit removed from the front, so a queued digit
//! can be mapped back to its position in the whole payload stream. Payload
//! tokens are whole bytes, which puts byte boundaries at even positions.

use std::collections::VecDeque;

/// Queue of hex digits with push, pop and search operations.
#[derive(Debug, Clone, Default)]
pub struct HexQueue {
    digits: VecDeque<u8>,
    /// Stream position of the front digit
    front_position: usize,
}

impl HexQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue with room for `capacity` digits
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            digits: VecDeque::with_capacity(capacity),
            front_position: 0,
        }
    }

    /// Append digits at the back. Returns how many were appended.
    pub fn push_digits<I>(&mut self, digits: I) -> usize
    where
        I: IntoIterator<Item = u8>,
    {
        let before = self.digits.len();
        self.digits
            .extend(digits.into_iter().map(|d| d.to_ascii_lowercase()));
        self.digits.len() - before
    }

    /// Number of queued digits
    pub fn len(&self) -> usize {
        self.digits.len()
    }

    /// Whether the queue holds no digits
    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Drop every queued digit
    pub fn clear(&mut self) {
        self.front_position += self.digits.len();
        self.digits.clear();
    }

    /// Position in the payload stream of the digit at `index`
    pub fn stream_position(&self, index: usize) -> usize {
        self.front_position + index
    }

    /// Length of the run of `digit` starting at `index`
    pub fn run_len(&self, index: usize, digit: u8) -> usize {
        self.digits
            .iter()
            .skip(index)
            .take_while(|&&d| d == digit)
            .count()
    }

    /// Index of the first occurrence of `pattern`, counted from the front.
    pub fn find(&self, pattern: &[u8]) -> Option<usize> {
        if pattern.is_empty() || pattern.len() > self.digits.len() {
            return None;
        }
        (0..=self.digits.len() - pattern.len()).find(|&start| {
            pattern
                .iter()
                .enumerate()
                .all(|(i, &p)| self.digits[start + i] == p)
        })
    }

    /// Remove up to `count` digits from the front. Returns how many were removed.
    pub fn discard_front(&mut self, count: usize) -> usize {
        let count = count.min(self.digits.len());
        self.digits.drain(..count);
        self.front_position += count;
        count
    }

    /// Keep only the trailing `count` digits.
    pub fn retain_last(&mut self, count: usize) {
        let excess = self.digits.len().saturating_sub(count);
        self.digits.drain(..excess);
        self.front_position += excess;
    }

    /// Pop exactly `count` digits from the front as a string.
    ///
    /// Returns `None` and leaves the queue untouched if fewer are queued.
    pub fn pop_front(&mut self, count: usize) -> Option<String> {
        if self.digits.len() < count {
            return None;
        }
        self.front_position += count;
        Some(self.digits.drain(..count).map(char::from).collect())
    }

    /// Copy of the queued digits, front to back.
    pub fn to_hex_string(&self) -> String {
        self.digits.iter().copied().map(char::from).collect()
    }
}
