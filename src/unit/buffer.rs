use heapless::Deque;

/// Bounded FIFO of measurements that evicts the oldest entry when full.
///
/// Storage is reserved for `N` entries, the usable capacity is chosen at
/// runtime in `1..=N`.
pub struct SampleBuffer<T, const N: usize> {
    items: Deque<T, N>,
    capacity: usize,
}

impl<T, const N: usize> SampleBuffer<T, N> {
    /// Returns `None` unless `1 <= capacity <= N`.
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        if capacity == 0 || capacity > N {
            return None;
        }
        Some(SampleBuffer {
            items: Deque::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Appends `item`, returning the evicted oldest entry if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.items.pop_front() } else { None };
        // capacity <= N, so there is room now
        let _ = self.items.push_back(item);
        evicted
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T, const N: usize> Default for SampleBuffer<T, N> {
    fn default() -> Self {
        SampleBuffer {
            items: Deque::new(),
            capacity: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_bounds() {
        assert!(SampleBuffer::<u8, 4>::with_capacity(0).is_none());
        assert!(SampleBuffer::<u8, 4>::with_capacity(5).is_none());
        assert_eq!(SampleBuffer::<u8, 4>::with_capacity(4).unwrap().capacity(), 4);
        assert_eq!(SampleBuffer::<u8, 4>::default().capacity(), 1);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut buf = SampleBuffer::<u32, 8>::with_capacity(3).unwrap();
        for i in 0..3 {
            assert_eq!(buf.push(i), None);
        }
        assert!(buf.is_full());
        assert_eq!(buf.push(3), Some(0));
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.oldest(), Some(&1));
        assert_eq!(buf.latest(), Some(&3));
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn default_keeps_only_newest() {
        let mut buf = SampleBuffer::<u32, 8>::default();
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.oldest(), Some(&2));
    }

    #[test]
    fn pop_and_clear() {
        let mut buf = SampleBuffer::<u32, 4>::with_capacity(4).unwrap();
        buf.push(10);
        buf.push(20);
        assert_eq!(buf.pop(), Some(10));
        assert!(!buf.is_full());
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.pop(), None);
        assert_eq!(buf.oldest(), None);
    }
}
