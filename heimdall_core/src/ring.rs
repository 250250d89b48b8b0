//! Fixed-capacity sample history with oldest-first eviction.

use std::collections::VecDeque;

/// Ring of recent distance samples (cm). Push is O(1) amortized; once the
/// ring is full the oldest sample is evicted first.
#[derive(Debug, Clone)]
pub struct SampleRing {
    buf: VecDeque<i32>,
    cap: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, distance_cm: i32) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(distance_cm);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Indexed access over currently-held samples; 0 is the oldest.
    pub fn get(&self, idx: usize) -> Option<i32> {
        self.buf.get(idx).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.buf.iter().copied()
    }

    /// Count of held samples strictly inside `(min_cm, max_cm)`.
    pub fn count_inside(&self, min_cm: i32, max_cm: i32) -> usize {
        self.buf
            .iter()
            .filter(|&&d| d > min_cm && d < max_cm)
            .count()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
