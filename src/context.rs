use std::collections::VecDeque;

/// Bounded FIFO of previous translations of a single unit.
///
/// Pushing into a full window evicts the oldest entry, so the window never holds more than `capacity` entries, and
/// always holds the most recent ones in order.
#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    entries: VecDeque<String>,
    capacity: usize,
}

impl ContextWindow {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `entry`, evicting the oldest entries over capacity.
    ///
    /// Zero-capacity window silently discards everything.
    pub fn push(&mut self, entry: String) {
        if self.capacity == 0 {
            return;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(entry);
        self.entries.make_contiguous();
    }

    /// Returns the most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&String> {
        self.entries.back()
    }

    /// Returns entries oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        self.entries.as_slices().0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
