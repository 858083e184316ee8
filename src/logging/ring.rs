//! Bounded log history
//!
//! Keeps at most `capacity` values, evicting the oldest one when a push goes
//! over the bound.

use super::list::LogList;

/// Ring buffer of log values in insertion order
#[derive(Debug)]
pub struct RingLog<T> {
    /// Newest value at the head
    entries: LogList<T>,
    capacity: usize,
}

impl<T> RingLog<T> {
    /// Create an empty ring; a capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LogList::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a value, returning the evicted value if the ring was full
    pub fn push(&mut self, value: T) -> Option<T> {
        self.entries.push_front(value);
        if self.entries.len() > self.capacity {
            self.entries.pop_back()
        } else {
            None
        }
    }

    /// Change the bound, evicting the oldest values if it shrank
    ///
    /// Returns the number of evicted values.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity.max(1);
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + Clone + '_ {
        self.entries.iter().rev()
    }

    /// Newest value, if any
    pub fn latest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone> RingLog<T> {
    /// Collect the values oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
