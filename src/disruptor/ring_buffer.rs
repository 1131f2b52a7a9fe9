//! Ring Buffer Implementation
//!
//! The ring buffer is a pre-allocated circular array of event slots. It does no
//! synchronization of its own: a producer may only write a slot whose sequence
//! it has claimed from the [`Sequencer`](crate::disruptor::Sequencer), and a
//! consumer may only read a slot after its barrier reported the sequence as
//! published.

use crate::disruptor::{ceil_to_power_of_two, EventFactory, Result};
use std::cell::UnsafeCell;

/// Fixed-capacity storage for in-flight events
///
/// # Type Parameters
/// * `T` - The event type stored in the buffer
#[derive(Debug)]
pub struct RingBuffer<T> {
    /// Using `Box<[UnsafeCell<T>]>` so the slot array is never reallocated
    slots: Box<[UnsafeCell<T>]>,
    /// capacity - 1, as i64 to match the sequence type
    index_mask: i64,
}

impl<T> RingBuffer<T> {
    /// Create a ring buffer holding at least `requested_size` slots
    ///
    /// The capacity is rounded up to the next power of two so that the slot
    /// index is `sequence & (capacity - 1)`. Every slot is filled from
    /// `event_factory`.
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if `requested_size` is zero
    /// or too large to round up.
    pub fn new<F>(requested_size: usize, event_factory: F) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        let capacity = ceil_to_power_of_two(requested_size)?;

        let slots: Box<[UnsafeCell<T>]> = (0..capacity)
            .map(|_| UnsafeCell::new(event_factory.new_instance()))
            .collect();

        Ok(Self {
            slots,
            index_mask: (capacity - 1) as i64,
        })
    }

    #[inline]
    fn index(&self, sequence: i64) -> usize {
        (sequence & self.index_mask) as usize
    }

    /// Get a reference to the event at the specified sequence
    ///
    /// Callers must only read a sequence their barrier reported as available.
    #[inline]
    pub fn get(&self, sequence: i64) -> &T {
        // SAFETY: the mask keeps the index in bounds; exclusive writers only
        // touch slots consumers have released through gating.
        unsafe { &*self.slots.get_unchecked(self.index(sequence)).get() }
    }

    /// Get a mutable reference to the event at the specified sequence
    ///
    /// Safe because `&mut self` rules out any concurrent reader or writer.
    pub fn get_mut(&mut self, sequence: i64) -> &mut T {
        let index = self.index(sequence);
        self.slots[index].get_mut()
    }

    /// Raw pointer to the slot of a claimed sequence
    ///
    /// # Safety
    /// The caller must own `sequence` through a claim on the sequencer and must
    /// not let the pointer outlive the publication of that sequence.
    #[inline]
    pub unsafe fn get_mut_unchecked(&self, sequence: i64) -> *mut T {
        self.slots.get_unchecked(self.index(sequence)).get()
    }

    /// Iterate mutably over the claimed range `start..=end`
    ///
    /// # Safety
    /// The caller must own every sequence in the range through a claim.
    pub unsafe fn batch_iter_mut(&self, start: i64, end: i64) -> BatchIterMut<'_, T> {
        BatchIterMut {
            ring_buffer: self,
            current: start,
            last: end,
        }
    }

    /// Number of slots (always a power of two)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

// SAFETY: concurrent access to slots is coordinated by sequence claims and
// barriers: a slot is written by exactly one claiming producer and read only
// after the release store that publishes it.
unsafe impl<T: Send + Sync> Sync for RingBuffer<T> {}

/// Iterator over a claimed range of slots, yielding `(sequence, &mut T)`
pub struct BatchIterMut<'a, T> {
    ring_buffer: &'a RingBuffer<T>,
    current: i64,
    last: i64,
}

impl<'a, T> BatchIterMut<'a, T> {
    fn remaining(&self) -> usize {
        if self.current > self.last {
            0
        } else {
            (self.last - self.current + 1) as usize
        }
    }
}

impl<'a, T> Iterator for BatchIterMut<'a, T> {
    type Item = (i64, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current > self.last {
            return None;
        }
        let sequence = self.current;
        self.current += 1;
        // SAFETY: the iterator was created over a range its caller claimed, and
        // each sequence is yielded once.
        let event = unsafe { &mut *self.ring_buffer.get_mut_unchecked(sequence) };
        Some((sequence, event))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl<'a, T> ExactSizeIterator for BatchIterMut<'a, T> {}
