//! # Event Queue
//!
//! Fixed-capacity FIFO of [`Event`]s owned by exactly one task.
//!
//! Storage is a caller-provided slice whose length is a power of two, so
//! index wraparound is a bitmask. The queue itself is not synchronized: the
//! kernel only touches it inside a critical section, together with the
//! task's ready-set bit.
//!
//! ## Invariants
//! - `head, tail < capacity` and `len <= capacity`.
//! - The oldest event lives at `tail`; the next free slot is `head`.

use crate::error::ConfigError;
use crate::task::Event;

pub struct EventQueue<'a> {
    buf: &'a mut [Event],
    mask: usize,
    head: usize,
    tail: usize,
    len: usize,
}

impl<'a> EventQueue<'a> {
    /// Wrap `storage` as an empty queue.
    ///
    /// # Errors
    /// [`ConfigError::QueueCapacity`] if the slice length is zero or not a
    /// power of two.
    pub fn new(storage: &'a mut [Event]) -> Result<Self, ConfigError> {
        let capacity = storage.len();
        if !capacity.is_power_of_two() {
            return Err(ConfigError::QueueCapacity(capacity));
        }
        Ok(Self {
            buf: storage,
            mask: capacity - 1,
            head: 0,
            tail: 0,
            len: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append `event` at the head, handing it back if the queue is full.
    #[inline]
    pub fn push(&mut self, event: Event) -> Result<(), Event> {
        if self.is_full() {
            return Err(event);
        }
        self.buf[self.head] = event;
        self.head = (self.head + 1) & self.mask;
        self.len += 1;
        Ok(())
    }

    /// Remove the oldest event.
    #[inline]
    pub fn pop(&mut self) -> Option<Event> {
        if self.is_empty() {
            return None;
        }
        let event = self.buf[self.tail];
        self.tail = (self.tail + 1) & self.mask;
        self.len -= 1;
        Some(event)
    }
}
