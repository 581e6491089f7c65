//! Fixed-capacity move queue.

use heapless::Deque;

use crate::error::{QueueError, Result};

use super::block::Move;
use super::{MAX_QUEUE_CAPACITY, MIN_QUEUE_CAPACITY};

/// Bounded FIFO of moves.
///
/// Storage is sized for [`MAX_QUEUE_CAPACITY`]; the usable capacity is set at
/// construction from configuration. New moves enter at the tail only.
#[derive(Debug, Clone)]
pub struct MoveQueue {
    moves: Deque<Move, MAX_QUEUE_CAPACITY>,
    capacity: usize,
}

impl MoveQueue {
    /// Create an empty queue. Capacity is clamped to the supported range.
    pub fn new(capacity: usize) -> Self {
        Self {
            moves: Deque::new(),
            capacity: capacity.clamp(MIN_QUEUE_CAPACITY, MAX_QUEUE_CAPACITY),
        }
    }

    /// Usable capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued moves, including an executing head.
    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Check if no moves are queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Free slots.
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity.saturating_sub(self.moves.len())
    }

    /// Fail with `QueueError::Full` unless `needed` slots are free.
    pub fn reserve(&self, needed: usize) -> Result<()> {
        let free = self.free();
        if needed > free {
            return Err(QueueError::Full { needed, free }.into());
        }
        Ok(())
    }

    /// Move at `index` positions behind the head.
    pub fn get(&self, index: usize) -> Option<&Move> {
        self.moves.iter().nth(index)
    }

    /// Mutable move at `index` positions behind the head.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Move> {
        self.moves.iter_mut().nth(index)
    }

    /// Oldest move.
    #[inline]
    pub fn head(&self) -> Option<&Move> {
        self.moves.front()
    }

    /// Oldest move, mutable.
    #[inline]
    pub fn head_mut(&mut self) -> Option<&mut Move> {
        self.moves.front_mut()
    }

    /// Newest move.
    #[inline]
    pub fn tail(&self) -> Option<&Move> {
        self.moves.back()
    }

    /// Append a move at the tail.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Full` if no slot is free; the queue is unchanged.
    pub fn push(&mut self, mv: Move) -> Result<()> {
        self.reserve(1)?;
        self.moves
            .push_back(mv)
            .map_err(|_| QueueError::Full { needed: 1, free: 0 }.into())
    }

    /// Remove and return the head.
    #[inline]
    pub fn pop(&mut self) -> Option<Move> {
        self.moves.pop_front()
    }

    /// Discard every move.
    #[inline]
    pub fn clear(&mut self) {
        self.moves.clear();
    }

    /// Iterate from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.moves.iter()
    }
}
