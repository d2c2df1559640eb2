//! List value implementation.
//!
//! Lists are a `VecDeque` for O(1) push/pop at both ends and O(1) indexed
//! access.

use bytes::Bytes;
use std::collections::VecDeque;

/// An ordered list of binary-safe elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueList {
    inner: VecDeque<Bytes>,
}

impl ValueList {
    /// Create a new empty list.
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: VecDeque::new(),
        }
    }

    /// Returns the number of elements in the list.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Push an element to the head of the list.
    #[inline]
    pub fn push_front(&mut self, value: Bytes) {
        self.inner.push_front(value);
    }

    /// Push an element to the tail of the list.
    #[inline]
    pub fn push_back(&mut self, value: Bytes) {
        self.inner.push_back(value);
    }

    /// Pop the head element.
    #[inline]
    pub fn pop_front(&mut self) -> Option<Bytes> {
        self.inner.pop_front()
    }

    /// Pop the tail element.
    #[inline]
    pub fn pop_back(&mut self) -> Option<Bytes> {
        self.inner.pop_back()
    }

    /// Get element at index.
    ///
    /// Negative indices count from the tail: -1 is the last element.
    pub fn get(&self, index: i64) -> Option<&Bytes> {
        let idx = self.normalize_index(index)?;
        self.inner.get(idx)
    }

    /// Replace the element at index.
    ///
    /// Returns false, leaving the list untouched, if index is out of range.
    pub fn set(&mut self, index: i64, value: Bytes) -> bool {
        match self.normalize_index(index).and_then(|i| self.inner.get_mut(i)) {
            Some(elem) => {
                *elem = value;
                true
            }
            None => false,
        }
    }

    /// Elements between `start` and `stop`, both inclusive.
    ///
    /// Negative indices count from the tail. Indices are clamped into the
    /// list, and a vacuous range yields an empty vector.
    pub fn range(&self, start: i64, stop: i64) -> Vec<Bytes> {
        let size = self.inner.len() as i64;

        let start = if start < -size {
            0
        } else if start < 0 {
            size + start
        } else if start >= size {
            return Vec::new();
        } else {
            start
        };

        // exclusive upper bound
        let end = if stop < -size {
            0
        } else if stop < 0 {
            size + stop + 1
        } else if stop < size {
            stop + 1
        } else {
            size
        };

        if end <= start {
            return Vec::new();
        }
        self.inner
            .range(start as usize..end as usize)
            .cloned()
            .collect()
    }

    /// Remove occurrences of `value`.
    ///
    /// - count > 0: remove up to `count` matches scanning head to tail
    /// - count < 0: remove up to `|count|` matches scanning tail to head
    /// - count = 0: remove all matches
    ///
    /// Returns the number of removed elements.
    pub fn remove(&mut self, count: i64, value: &[u8]) -> usize {
        let limit = match count {
            0 => usize::MAX,
            n => usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX),
        };

        let mut removed = 0;
        if count >= 0 {
            let mut i = 0;
            while i < self.inner.len() && removed < limit {
                if self.inner[i] == value {
                    self.inner.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = self.inner.len();
            while i > 0 && removed < limit {
                i -= 1;
                if self.inner[i] == value {
                    self.inner.remove(i);
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Iterate from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.inner.iter()
    }

    /// Normalize a possibly-negative index to a position in the list.
    fn normalize_index(&self, index: i64) -> Option<usize> {
        let len = self.inner.len() as i64;
        let idx = if index < 0 { len + index } else { index };
        (0..len).contains(&idx).then_some(idx as usize)
    }
}

impl FromIterator<Bytes> for ValueList {
    fn from_iter<T: IntoIterator<Item = Bytes>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}
