//! Bounded frame history for delta comparison.
//!
//! Holds the most recent `delta + 1` frames, oldest first, so the front and
//! back of the buffer are exactly `delta` frames apart once it is full.

use crate::capture::Frame;
use std::collections::VecDeque;

/// Slots reserved up front; larger windows grow as frames arrive.
const PREALLOCATED_FRAMES: usize = 16;

/// Insertion-ordered ring of recent frames.
#[derive(Debug)]
pub struct FrameHistory {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl FrameHistory {
    /// Creates a history holding at most `capacity` frames (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity.min(PREALLOCATED_FRAMES)),
            capacity,
        }
    }

    /// Creates a history sized for comparing frames `delta` apart.
    pub fn for_delta(delta: u32) -> Self {
        Self::new(window_for(delta))
    }

    /// Appends a frame, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
        self.trim();
    }

    /// Changes the capacity (minimum 1).
    ///
    /// Shrinking evicts the oldest excess frames immediately, so the next
    /// comparison already uses the new window.
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity != self.capacity {
            tracing::trace!(from = self.capacity, to = capacity, "Resizing frame history");
            self.capacity = capacity;
            self.trim();
        }
    }

    /// Resizes for comparing frames `delta` apart.
    pub fn set_delta(&mut self, delta: u32) {
        self.set_capacity(window_for(delta));
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns true once the window spans the full delta.
    pub fn is_full(&self) -> bool {
        self.frames.len() == self.capacity
    }

    /// Oldest retained frame.
    pub fn oldest(&self) -> Option<&Frame> {
        self.frames.front()
    }

    /// Most recently pushed frame.
    pub fn newest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Drops every retained frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    fn trim(&mut self) {
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }
}

fn window_for(delta: u32) -> usize {
    (delta as usize).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(sequence: u64) -> Frame {
        Frame::from_luma(2, 2, vec![sequence as u8; 4], sequence).unwrap()
    }

    #[test]
    fn test_fills_then_slides() {
        let mut history = FrameHistory::for_delta(2);
        assert_eq!(history.capacity(), 3);

        history.push(frame(1));
        history.push(frame(2));
        assert!(!history.is_full());

        history.push(frame(3));
        assert!(history.is_full());
        assert_eq!(history.oldest().unwrap().sequence(), 1);

        history.push(frame(4));
        assert_eq!(history.len(), 3);
        assert_eq!(history.oldest().unwrap().sequence(), 2);
        assert_eq!(history.newest().unwrap().sequence(), 4);
    }

    #[test]
    fn test_shrink_evicts_immediately() {
        let mut history = FrameHistory::new(5);
        for i in 1..=5 {
            history.push(frame(i));
        }

        history.set_capacity(2);

        assert_eq!(history.len(), 2);
        assert_eq!(history.oldest().unwrap().sequence(), 4);
        assert_eq!(history.newest().unwrap().sequence(), 5);

        history.push(frame(6));
        assert_eq!(history.len(), 2);
        assert_eq!(history.oldest().unwrap().sequence(), 5);
    }

    #[test]
    fn test_grow_requires_refill() {
        let mut history = FrameHistory::for_delta(1);
        history.push(frame(1));
        history.push(frame(2));
        assert!(history.is_full());

        history.set_delta(3);

        assert!(!history.is_full());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut history = FrameHistory::new(0);
        assert_eq!(history.capacity(), 1);

        history.push(frame(1));
        history.push(frame(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.oldest().unwrap().sequence(), 2);
    }

    #[test]
    fn test_huge_delta_allocates_lazily() {
        let mut history = FrameHistory::for_delta(u32::MAX);
        assert_eq!(history.capacity(), u32::MAX as usize + 1);

        history.push(frame(1));
        history.push(frame(2));

        assert_eq!(history.len(), 2);
        assert!(!history.is_full());
    }

    #[test]
    fn test_clear() {
        let mut history = FrameHistory::new(3);
        history.push(frame(1));
        history.clear();

        assert!(history.is_empty());
        assert!(history.oldest().is_none());
        assert!(history.newest().is_none());
    }

    proptest! {
        #[test]
        fn prop_len_is_min_of_pushes_and_capacity(pushes in 0u64..40, capacity in 1usize..10) {
            let mut history = FrameHistory::new(capacity);
            for i in 1..=pushes {
                history.push(frame(i));
            }

            prop_assert_eq!(history.len(), (pushes as usize).min(capacity));
            if pushes > 0 {
                let expected_oldest = pushes.saturating_sub(capacity as u64) + 1;
                prop_assert_eq!(history.oldest().unwrap().sequence(), expected_oldest);
                prop_assert_eq!(history.newest().unwrap().sequence(), pushes);
            }
        }

        #[test]
        fn prop_shrink_never_leaves_oversized_window(
            pushes in 1u64..30,
            initial in 1usize..10,
            shrunk in 1usize..10,
        ) {
            let mut history = FrameHistory::new(initial);
            for i in 1..=pushes {
                history.push(frame(i));
            }
            history.set_capacity(shrunk);
            let retained = history.len();
            prop_assert!(retained <= shrunk);

            history.push(frame(pushes + 1));
            prop_assert_eq!(history.len(), (retained + 1).min(shrunk));
            prop_assert_eq!(history.newest().unwrap().sequence(), pushes + 1);
        }
    }
}
