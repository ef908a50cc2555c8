//! Bounded event feed.
//!
//! Newest-first list of discrete events with a fixed capacity; the oldest
//! entry is evicted on overflow. Built from live traffic only.

use std::collections::VecDeque;

/// Default number of retained events.
pub const DEFAULT_FEED_CAPACITY: usize = 50;

/// Newest-first bounded list.
#[derive(Debug, Clone)]
pub struct EventFeed<T> {
    entries: VecDeque<T>,
    capacity: usize,
    /// Total events evicted since creation.
    evicted: u64,
}

impl<T> EventFeed<T> {
    /// Create a feed. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Prepend an event, returning the evicted one on overflow.
    pub fn push(&mut self, event: T) -> Option<T> {
        self.entries.push_front(event);
        if self.entries.len() > self.capacity {
            self.evicted += 1;
            return self.entries.pop_back();
        }
        None
    }

    /// Events, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Most recent event.
    pub fn latest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl<T: Clone> EventFeed<T> {
    /// Copy of the events, newest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

impl<T> Default for EventFeed<T> {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let mut feed = EventFeed::new(3);
        feed.push(1);
        feed.push(2);
        feed.push(3);
        assert_eq!(feed.to_vec(), vec![3, 2, 1]);
        assert_eq!(feed.latest(), Some(&3));
    }

    #[test]
    fn test_oldest_evicted_on_overflow() {
        let mut feed = EventFeed::new(3);
        for i in 1..=3 {
            assert_eq!(feed.push(i), None);
        }
        assert_eq!(feed.push(4), Some(1));
        assert_eq!(feed.to_vec(), vec![4, 3, 2]);
        assert_eq!(feed.evicted(), 1);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut feed = EventFeed::default();
        assert_eq!(feed.capacity(), DEFAULT_FEED_CAPACITY);

        for i in 0..1_000 {
            feed.push(i);
            assert!(feed.len() <= DEFAULT_FEED_CAPACITY);
        }

        assert_eq!(feed.len(), DEFAULT_FEED_CAPACITY);
        assert_eq!(feed.latest(), Some(&999));
        assert_eq!(feed.iter().last(), Some(&950));
        assert_eq!(feed.evicted(), 950);
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut feed = EventFeed::new(0);
        feed.push("a");
        feed.push("b");
        assert_eq!(feed.capacity(), 1);
        assert_eq!(feed.to_vec(), vec!["b"]);
    }
}
