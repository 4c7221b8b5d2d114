//! A bounded vector implementation.

use std::collections::VecDeque;

/// A bounded vec implementation using [`VecDeque`]. Once `capacity` elements are held, every push
/// evicts the oldest element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedVec<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedVec<T> {
    /// Returns a new instance of the ring buffer with the provided capacity.
    pub fn new(capacity: usize) -> Self {
        Self { data: VecDeque::with_capacity(capacity), capacity }
    }

    /// Pushes a value as the newest element, returning the evicted oldest element if the buffer
    /// was full.
    pub fn push(&mut self, elem: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(elem)
        }
        let evicted = if self.is_full() { self.data.pop_front() } else { None };
        self.data.push_back(elem);
        evicted
    }

    /// Returns the newest element, if any.
    pub fn newest(&self) -> Option<&T> {
        self.data.back()
    }

    /// Returns an iterator over the elements, newest first.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &T> {
        self.data.iter().rev()
    }

    /// Returns the newest element matching the predicate.
    pub fn find<F>(&self, mut predicate: F) -> Option<&T>
    where
        F: FnMut(&T) -> bool,
    {
        self.iter_newest_first().find(|elem| predicate(elem))
    }

    /// Returns the number of elements held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no element is held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the maximum number of elements held.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clears the structure by removing all the elements.
    pub fn clear(&mut self) {
        self.data.clear()
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }
}

impl<T> Extend<T> for BoundedVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for elem in iter {
            self.push(elem);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_evict_oldest_when_full() {
        let mut vec = BoundedVec::new(3);
        vec.extend([1, 2, 3]);

        let evicted = vec.push(4);

        assert_eq!(evicted, Some(1));
        assert_eq!(vec.iter_newest_first().copied().collect::<Vec<_>>(), vec![4, 3, 2]);
        assert_eq!(vec.newest(), Some(&4));
    }

    #[test]
    fn test_should_find_newest_match() {
        let mut vec = BoundedVec::new(4);
        vec.extend([(1, 'a'), (2, 'b'), (1, 'c')]);

        assert_eq!(vec.find(|(id, _)| *id == 1), Some(&(1, 'c')));
        assert_eq!(vec.find(|(id, _)| *id == 3), None);
    }

    #[test]
    fn test_zero_capacity_holds_nothing() {
        let mut vec = BoundedVec::new(0);

        assert_eq!(vec.push(1), Some(1));
        assert!(vec.is_empty());
    }
}
