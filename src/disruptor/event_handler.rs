//! Event Handler Implementation
//!
//! This module provides the EventHandler trait that consumers implement to
//! receive events from a [`BatchEventProcessor`](crate::disruptor::BatchEventProcessor).

use crate::disruptor::Result;

/// Handler for processing events from the ring buffer
///
/// A handler is owned by exactly one processor and only ever called from that
/// processor's thread, so it may keep mutable state without locking.
///
/// # Type Parameters
/// * `T` - The event type that will be processed
pub trait EventHandler<T>: Send {
    /// Called once on the processor thread before the first event
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Process an event
    ///
    /// # Arguments
    /// * `event` - The published event, or `None` for an idle tick delivered
    ///   when the processor has an idle timeout configured
    /// * `sequence` - The sequence of the event; for an idle tick, the next
    ///   sequence the processor is waiting for
    /// * `end_of_batch` - True for the last event of the batch currently
    ///   available, which is a natural point to flush buffered work
    ///
    /// # Examples
    /// ```
    /// use ringseq::disruptor::{EventHandler, Result};
    ///
    /// struct Order {
    ///     quantity: u64,
    /// }
    ///
    /// #[derive(Default)]
    /// struct Totals {
    ///     pending: u64,
    ///     flushed: u64,
    /// }
    ///
    /// impl EventHandler<Order> for Totals {
    ///     fn on_event(&mut self, event: Option<&Order>, _sequence: i64, end_of_batch: bool) -> Result<()> {
    ///         if let Some(order) = event {
    ///             self.pending += order.quantity;
    ///         }
    ///         if end_of_batch {
    ///             self.flushed += std::mem::take(&mut self.pending);
    ///         }
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let mut totals = Totals::default();
    /// totals.on_event(Some(&Order { quantity: 3 }), 0, false).unwrap();
    /// totals.on_event(Some(&Order { quantity: 4 }), 1, true).unwrap();
    /// assert_eq!(totals.flushed, 7);
    /// ```
    fn on_event(&mut self, event: Option<&T>, sequence: i64, end_of_batch: bool) -> Result<()>;

    /// Called once on the processor thread after the loop exits
    fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Event handler backed by a closure
///
/// Start and shutdown hooks are no-ops.
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> ClosureEventHandler<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<T, F> EventHandler<T> for ClosureEventHandler<F>
where
    F: FnMut(Option<&T>, i64, bool) -> Result<()> + Send,
{
    fn on_event(&mut self, event: Option<&T>, sequence: i64, end_of_batch: bool) -> Result<()> {
        (self.handler)(event, sequence, end_of_batch)
    }
}
