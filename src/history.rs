//! Fixed-capacity ring buffer backing every bounded history in the pipeline.

/// FIFO buffer that overwrites its oldest element once full.
///
/// Storage is allocated once; eviction only moves the write index.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: Vec<T>,
    capacity: usize,
    /// Slot holding the oldest element once the buffer is full
    head: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` elements
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Append an element, returning the evicted one if the buffer was full
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }

        if self.items.len() < self.capacity {
            self.items.push(item);
            return None;
        }

        let evicted = std::mem::replace(&mut self.items[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Number of stored elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots left before the buffer is full
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.items.len()
    }

    /// Element at chronological position `index` (0 is the oldest)
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.items.len() {
            return None;
        }
        self.items.get((self.head + index) % self.items.len())
    }

    /// Oldest element
    #[must_use]
    pub fn oldest(&self) -> Option<&T> {
        self.get(0)
    }

    /// Most recent element
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Element `n` steps before the most recent one (`back(0)` is the latest)
    #[must_use]
    pub fn back(&self, n: usize) -> Option<&T> {
        self.len().checked_sub(n + 1).and_then(|i| self.get(i))
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (newer, older) = self.items.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// Iterate over the `n` most recent elements, oldest first
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        self.iter().skip(self.len().saturating_sub(n))
    }

    /// Drop every element
    pub fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
    }
}
