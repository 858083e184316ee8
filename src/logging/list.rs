//! Insert-optimised linked list used for log history
//!
//! New values are pushed at the head, so walking from head to tail visits the
//! newest value first. Nodes live in an index arena and are linked in both
//! directions, which keeps `pop_back` O(1) without any unsafe pointer work.
//! Freed slots are recycled by later pushes.

use std::fmt;
use std::iter::FusedIterator;

const NIL: usize = usize::MAX;

struct Node<T> {
    value: T,
    prev: usize,
    next: usize,
}

/// Doubly linked list with O(1) insertion and removal at both ends
pub struct LogList<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> LogList<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a value as the new head
    pub fn push_front(&mut self, value: T) {
        let idx = self.alloc(Node {
            value,
            prev: NIL,
            next: self.head,
        });

        if let Some(old_head) = self.node_mut(self.head) {
            old_head.prev = idx;
        } else {
            self.tail = idx;
        }

        self.head = idx;
        self.len += 1;
    }

    /// Remove and return the head value
    pub fn pop_front(&mut self) -> Option<T> {
        let node = self.release(self.head)?;

        self.head = node.next;
        if let Some(new_head) = self.node_mut(self.head) {
            new_head.prev = NIL;
        } else {
            self.tail = NIL;
        }

        self.len -= 1;
        Some(node.value)
    }

    /// Remove and return the tail value
    pub fn pop_back(&mut self) -> Option<T> {
        let node = self.release(self.tail)?;

        self.tail = node.prev;
        if let Some(new_tail) = self.node_mut(self.tail) {
            new_tail.next = NIL;
        } else {
            self.head = NIL;
        }

        self.len -= 1;
        Some(node.value)
    }

    pub fn front(&self) -> Option<&T> {
        self.node(self.head).map(|n| &n.value)
    }

    pub fn back(&self) -> Option<&T> {
        self.node(self.tail).map(|n| &n.value)
    }

    /// Iterate from head to tail
    ///
    /// The iterator is double-ended, so `iter().rev()` walks tail to head.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Option<Node<T>> {
        let node = self.nodes.get_mut(idx)?.take()?;
        self.free.push(idx);
        Some(node)
    }

    fn node(&self, idx: usize) -> Option<&Node<T>> {
        self.nodes.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<T>> {
        self.nodes.get_mut(idx).and_then(Option::as_mut)
    }
}

impl<T: Clone> LogList<T> {
    /// Reversed copy of this list; `self` is left untouched
    pub fn reversed(&self) -> LogList<T> {
        let mut out = LogList::new();
        for value in self.iter() {
            out.push_front(value.clone());
        }
        out
    }

    /// Collect the values from head to tail
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T> Default for LogList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for LogList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a LogList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a [`LogList`]
pub struct Iter<'a, T> {
    list: &'a LogList<T>,
    front: usize,
    back: usize,
    remaining: usize,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            list: self.list,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.front)?;
        self.front = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.back)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some(&node.value)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_two_three() -> LogList<i32> {
        let mut list = LogList::new();
        list.push_front(1);
        list.push_front(2);
        list.push_front(3);
        list
    }

    #[test]
    fn test_values_stored_newest_first() {
        let list = one_two_three();
        assert_eq!(list.to_vec(), vec![3, 2, 1]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.front(), Some(&3));
        assert_eq!(list.back(), Some(&1));
    }

    #[test]
    fn test_reversed_does_not_mutate() {
        let list = one_two_three();
        let reversed = list.reversed();

        assert_eq!(reversed.to_vec(), vec![1, 2, 3]);
        assert_ne!(reversed.to_vec(), list.to_vec());
        assert_eq!(list.to_vec(), vec![3, 2, 1]);
    }

    #[test]
    fn test_pop_back() {
        let mut list = one_two_three();
        assert_eq!(list.pop_back(), Some(1));
        assert_eq!(list.to_vec(), vec![3, 2]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_pop_front() {
        let mut list = one_two_three();
        assert_eq!(list.pop_front(), Some(3));
        assert_eq!(list.to_vec(), vec![2, 1]);
    }

    #[test]
    fn test_pop_until_empty() {
        let mut list = one_two_three();
        assert_eq!(list.pop_back(), Some(1));
        assert_eq!(list.pop_front(), Some(3));
        assert_eq!(list.pop_back(), Some(2));
        assert!(list.is_empty());
        assert_eq!(list.pop_back(), None);
        assert_eq!(list.pop_front(), None);
        assert_eq!(list.front(), None);
        assert_eq!(list.back(), None);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut list = LogList::new();
        for i in 0..4 {
            list.push_front(i);
        }
        for i in 4..100 {
            list.push_front(i);
            list.pop_back();
        }
        assert_eq!(list.to_vec(), vec![99, 98, 97, 96]);
        assert_eq!(list.nodes.len(), 5);
    }

    #[test]
    fn test_iter_is_restartable_and_double_ended() {
        let list = one_two_three();
        let iter = list.iter();
        let first: Vec<_> = iter.clone().copied().collect();
        let second: Vec<_> = iter.copied().collect();
        assert_eq!(first, second);

        let backwards: Vec<_> = list.iter().rev().copied().collect();
        assert_eq!(backwards, vec![1, 2, 3]);

        let mut mixed = list.iter();
        assert_eq!(mixed.next(), Some(&3));
        assert_eq!(mixed.next_back(), Some(&1));
        assert_eq!(mixed.next(), Some(&2));
        assert_eq!(mixed.next_back(), None);
    }

    #[test]
    fn test_clear() {
        let mut list = one_two_three();
        list.clear();
        assert!(list.is_empty());
        list.push_front(7);
        assert_eq!(list.to_vec(), vec![7]);
    }
}
