//! Sequence Barrier Implementation
//!
//! A sequence barrier is the consumer-side view of a sequencer. It pairs the
//! published cursor with the sequences of any upstream processors the consumer
//! must stay behind, and it carries the alert flag used to cancel waits.

use crate::disruptor::{Sequence, WaitOutcome, WaitStrategy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Coordination barrier for a set of event processors
///
/// Created by [`Sequencer::new_barrier`](crate::disruptor::Sequencer::new_barrier)
/// and shared through `Arc` by every processor built on it. Alerting the
/// barrier therefore cancels all of them.
#[derive(Debug)]
pub struct SequenceBarrier {
    /// The main cursor sequence to track
    cursor: Arc<Sequence>,
    wait_strategy: Arc<dyn WaitStrategy>,
    /// Sequences that this barrier depends on
    dependent_sequences: Vec<Arc<Sequence>>,
    alerted: AtomicBool,
}

impl SequenceBarrier {
    /// Create a new barrier
    ///
    /// # Arguments
    /// * `cursor` - The sequencer's cursor
    /// * `wait_strategy` - The sequencer's wait strategy
    /// * `dependent_sequences` - Upstream processor sequences to stay behind
    pub fn new(
        cursor: Arc<Sequence>,
        wait_strategy: Arc<dyn WaitStrategy>,
        dependent_sequences: Vec<Arc<Sequence>>,
    ) -> Self {
        Self {
            cursor,
            wait_strategy,
            dependent_sequences,
            alerted: AtomicBool::new(false),
        }
    }

    /// Wait until `sequence` is published and every dependent has passed it
    ///
    /// Returns `Cancelled` straight away once the barrier is alerted, even if
    /// data is available.
    pub fn wait_for(&self, sequence: i64) -> WaitOutcome {
        self.wait(sequence, None)
    }

    /// Like [`wait_for`](Self::wait_for), giving up after `timeout`
    pub fn wait_for_with_timeout(&self, sequence: i64, timeout: Duration) -> WaitOutcome {
        self.wait(sequence, Some(timeout))
    }

    fn wait(&self, sequence: i64, timeout: Option<Duration>) -> WaitOutcome {
        if self.is_alerted() {
            return WaitOutcome::Cancelled;
        }
        self.wait_strategy.wait_for(
            sequence,
            &self.cursor,
            &self.dependent_sequences,
            self,
            timeout,
        )
    }

    /// Current published cursor value
    pub fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    /// Cancel current and future waits and wake any blocked waiter
    pub fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Reset the alert flag
    ///
    /// Event processors never call this; a halted pipeline stays halted.
    pub fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }
}
