//! Publishing API
//!
//! [`Publisher`] wraps the claim, write and publish steps so producers never
//! touch the ring buffer's unsafe write path themselves.

use crate::disruptor::{BatchIterMut, DisruptorError, Result, RingBuffer, Sequencer};
use std::sync::Arc;

/// Producer handle over a ring buffer and its sequencer
///
/// Each producer thread owns its own `Publisher`. Several publishers may share
/// one sequencer only when it was built with
/// [`ClaimStrategyOption::MultiThreaded`](crate::disruptor::ClaimStrategyOption);
/// a single-threaded sequencer accepts one publisher at a time.
///
/// # Examples
/// ```
/// use ringseq::disruptor::{
///     ClaimStrategyOption, DefaultEventFactory, Publisher, RingBuffer, Sequencer, TimeConfig,
///     WaitStrategyOption,
/// };
/// use std::sync::Arc;
///
/// let sequencer = Arc::new(
///     Sequencer::new(
///         8,
///         ClaimStrategyOption::SingleThreaded,
///         WaitStrategyOption::Yielding,
///         TimeConfig::default(),
///     )
///     .unwrap(),
/// );
/// let ring_buffer = Arc::new(RingBuffer::new(8, DefaultEventFactory::<u64>::new()).unwrap());
/// let mut publisher = Publisher::new(Arc::clone(&ring_buffer), Arc::clone(&sequencer)).unwrap();
///
/// let sequence = publisher.publish(|event, _sequence| *event = 42);
/// assert_eq!(*ring_buffer.get(sequence), 42);
/// assert_eq!(sequencer.cursor(), sequence);
/// ```
#[derive(Debug)]
pub struct Publisher<T> {
    ring_buffer: Arc<RingBuffer<T>>,
    sequencer: Arc<Sequencer>,
    /// Holds the sequencer's single-publisher slot
    exclusive: bool,
}

impl<T> Publisher<T>
where
    T: Send + Sync,
{
    /// Create a publisher
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidConfig` if the ring buffer and the
    /// sequencer disagree on capacity, or if the sequencer is single-threaded
    /// and another publisher is still attached to it.
    pub fn new(ring_buffer: Arc<RingBuffer<T>>, sequencer: Arc<Sequencer>) -> Result<Self> {
        if ring_buffer.capacity() != sequencer.capacity() {
            return Err(DisruptorError::InvalidConfig(format!(
                "ring buffer capacity {} does not match sequencer capacity {}",
                ring_buffer.capacity(),
                sequencer.capacity()
            )));
        }
        let exclusive = sequencer.attach_publisher()?;
        Ok(Self {
            ring_buffer,
            sequencer,
            exclusive,
        })
    }

    /// Claim a slot, fill it with `update` and publish it
    ///
    /// Waits while the buffer is full.
    ///
    /// # Returns
    /// The published sequence
    pub fn publish<F>(&mut self, update: F) -> i64
    where
        F: FnOnce(&mut T, i64),
    {
        let sequence = self.sequencer.next();
        self.write_and_publish(sequence, update)
    }

    /// Publish only if a slot is free right now
    ///
    /// # Errors
    /// Returns `DisruptorError::InsufficientCapacity` when the buffer is full.
    /// With several producers the check is advisory and the claim may still
    /// wait briefly.
    pub fn try_publish<F>(&mut self, update: F) -> Result<i64>
    where
        F: FnOnce(&mut T, i64),
    {
        if !self.sequencer.has_available_capacity() {
            return Err(DisruptorError::InsufficientCapacity);
        }
        Ok(self.publish(update))
    }

    /// Claim `n` slots, fill them through one iterator and publish them together
    ///
    /// # Returns
    /// The highest published sequence
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidConfig` if `n` is zero or larger than
    /// the buffer.
    pub fn publish_batch<F>(&mut self, n: usize, update: F) -> Result<i64>
    where
        F: FnOnce(BatchIterMut<'_, T>),
    {
        if n == 0 || n > self.sequencer.capacity() {
            return Err(DisruptorError::InvalidConfig(format!(
                "batch size {n} must be between 1 and {}",
                self.sequencer.capacity()
            )));
        }

        let high = self.sequencer.next_batch(n);
        let low = high - n as i64 + 1;
        // SAFETY: low..=high was just claimed by this publisher and is not yet
        // visible to consumers.
        update(unsafe { self.ring_buffer.batch_iter_mut(low, high) });
        self.sequencer.publish_batch(high, n);
        Ok(high)
    }

    pub fn sequencer(&self) -> &Arc<Sequencer> {
        &self.sequencer
    }

    fn write_and_publish<F>(&mut self, sequence: i64, update: F) -> i64
    where
        F: FnOnce(&mut T, i64),
    {
        // SAFETY: the sequence was claimed above, and the sequencer hands it to
        // exactly one publisher (atomically under the multi-threaded strategy,
        // through the single attached publisher otherwise). No consumer reads
        // it until it is published.
        let event = unsafe { &mut *self.ring_buffer.get_mut_unchecked(sequence) };
        update(event, sequence);
        self.sequencer.publish(sequence);
        sequence
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        if self.exclusive {
            self.sequencer.detach_publisher();
        }
    }
}
