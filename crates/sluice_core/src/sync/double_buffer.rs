//! # Double Buffer
//!
//! Two owned slots and a role flag.
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!                    │       DoubleBuffered<T>     │
//!                    │                             │
//!                    │  ┌─────────┐  ┌─────────┐   │
//!                    │  │ Slot 0  │  │ Slot 1  │   │
//!                    │  └────┬────┘  └────┬────┘   │
//!                    │       │            │        │
//!                    │  ┌────┴────────────┴────┐   │
//!                    │  │  current index (0/1) │   │
//!                    │  └──────────────────────┘   │
//!                    └─────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!      ┌──────────────┐                ┌──────────────┐
//!      │   current    │                │    other     │
//!      │ (producers)  │                │ (flush read) │
//!      └──────────────┘                └──────────────┘
//! ```
//!
//! `swap` only flips the index, so it is O(1) and never reallocates. Writers
//! always target `current`; whoever drains `other` can hand it back when
//! done so its allocation is reused on the next swap.

/// Two interchangeable slots, one "current" and one "other".
#[derive(Debug, Default)]
pub struct DoubleBuffered<T> {
    /// The two slots.
    slots: [T; 2],
    /// Index of the current slot (0 or 1). Other is always `current ^ 1`.
    current: usize,
    /// Number of swaps performed.
    swap_count: u64,
}

impl<T> DoubleBuffered<T> {
    /// Creates a double buffer from its two initial slots.
    ///
    /// `current` starts as the current slot.
    #[must_use]
    pub fn from_slots(current: T, other: T) -> Self {
        Self {
            slots: [current, other],
            current: 0,
            swap_count: 0,
        }
    }

    /// The slot writers target.
    #[inline]
    #[must_use]
    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    /// The slot writers target, mutably.
    #[inline]
    pub fn current_mut(&mut self) -> &mut T {
        &mut self.slots[self.current]
    }

    /// The inactive slot.
    #[inline]
    #[must_use]
    pub fn other(&self) -> &T {
        &self.slots[self.current ^ 1]
    }

    /// The inactive slot, mutably.
    #[inline]
    pub fn other_mut(&mut self) -> &mut T {
        &mut self.slots[self.current ^ 1]
    }

    /// Exchanges the roles of the two slots.
    #[inline]
    pub fn swap(&mut self) {
        self.current ^= 1;
        self.swap_count += 1;
    }

    /// Index of the current slot (for debugging).
    #[inline]
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Number of swaps performed so far.
    #[inline]
    #[must_use]
    pub fn swap_count(&self) -> u64 {
        self.swap_count
    }

    /// Puts a slot back in the "other" position, returning what was there.
    pub fn replace_other(&mut self, slot: T) -> T {
        std::mem::replace(self.other_mut(), slot)
    }
}

impl<T: Default> DoubleBuffered<T> {
    /// Creates a double buffer with two default slots.
    #[must_use]
    pub fn new() -> Self {
        Self::from_slots(T::default(), T::default())
    }

    /// Moves the "other" slot out, leaving a default value in its place.
    ///
    /// Pair with [`DoubleBuffered::replace_other`] to keep its allocation.
    pub fn take_other(&mut self) -> T {
        std::mem::take(self.other_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_buffer_creation() {
        let buffer: DoubleBuffered<Vec<u32>> = DoubleBuffered::new();
        assert_eq!(buffer.current_index(), 0);
        assert_eq!(buffer.swap_count(), 0);
        assert!(buffer.current().is_empty());
        assert!(buffer.other().is_empty());
    }

    #[test]
    fn test_buffer_swap() {
        let mut buffer: DoubleBuffered<Vec<u32>> = DoubleBuffered::new();
        buffer.current_mut().push(1);

        buffer.swap();
        assert_eq!(buffer.swap_count(), 1);
        assert_eq!(buffer.other(), &vec![1]);
        assert!(buffer.current().is_empty());

        // Writes after the swap never reach the slot being read.
        buffer.current_mut().push(2);
        assert_eq!(buffer.other(), &vec![1]);
        assert_eq!(buffer.current(), &vec![2]);
    }

    #[test]
    fn test_take_and_replace_other_keeps_allocation() {
        let mut buffer: DoubleBuffered<Vec<u32>> = DoubleBuffered::new();
        buffer.current_mut().extend(0..64);
        buffer.swap();

        let mut drained = buffer.take_other();
        let capacity = drained.capacity();
        assert_eq!(drained.len(), 64);
        drained.clear();

        let placeholder = buffer.replace_other(drained);
        assert!(placeholder.is_empty());
        assert!(buffer.other().is_empty());
        assert_eq!(buffer.other().capacity(), capacity);
    }

    #[test]
    fn test_from_slots() {
        let mut buffer = DoubleBuffered::from_slots("a", "b");
        assert_eq!(*buffer.current(), "a");
        buffer.swap();
        assert_eq!(*buffer.current(), "b");
        assert_eq!(*buffer.other(), "a");
    }
}
