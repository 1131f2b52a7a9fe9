//! Exception Handler Implementation
//!
//! Exception handlers receive the failures an event handler returns. The
//! processor forwards each failure and carries on with the next event, so the
//! exception handler decides whether a failure is logged, counted or ignored.

use crate::disruptor::DisruptorError;
use std::marker::PhantomData;
use tracing::error;

/// Handler for failures raised during event processing
///
/// # Type Parameters
/// * `T` - The event type being processed
pub trait ExceptionHandler<T>: Send + Sync {
    /// Handle a failure returned by `on_event`
    ///
    /// # Arguments
    /// * `error` - The error the handler returned
    /// * `sequence` - The sequence being processed
    /// * `event` - The event, or `None` if the failure came from an idle tick
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, event: Option<&T>);

    /// Handle a failure returned by `on_start`
    fn handle_on_start_exception(&self, error: DisruptorError) {
        error!(%error, "event handler failed to start");
    }

    /// Handle a failure returned by `on_shutdown`
    fn handle_on_shutdown_exception(&self, error: DisruptorError) {
        error!(%error, "event handler failed to shut down");
    }
}

/// Exception handler that logs every failure at error level
#[derive(Debug)]
pub struct DefaultExceptionHandler<T> {
    _phantom: PhantomData<fn(&T)>,
}

impl<T> DefaultExceptionHandler<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for DefaultExceptionHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ExceptionHandler<T> for DefaultExceptionHandler<T> {
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, event: Option<&T>) {
        error!(
            sequence,
            idle_tick = event.is_none(),
            %error,
            "exception processing event"
        );
    }
}

/// Exception handler that drops every failure
///
/// Useful in benchmarks; in production it hides handler bugs.
#[derive(Debug)]
pub struct IgnoreExceptionHandler<T> {
    _phantom: PhantomData<fn(&T)>,
}

impl<T> IgnoreExceptionHandler<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for IgnoreExceptionHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ExceptionHandler<T> for IgnoreExceptionHandler<T> {
    fn handle_event_exception(&self, _error: DisruptorError, _sequence: i64, _event: Option<&T>) {}

    fn handle_on_start_exception(&self, _error: DisruptorError) {}

    fn handle_on_shutdown_exception(&self, _error: DisruptorError) {}
}

/// Exception handler that forwards event failures to a closure
///
/// Start and shutdown failures are logged.
pub struct ClosureExceptionHandler<F> {
    handler: F,
}

impl<F> ClosureExceptionHandler<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<T, F> ExceptionHandler<T> for ClosureExceptionHandler<F>
where
    F: Fn(DisruptorError, i64, Option<&T>) + Send + Sync,
{
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, event: Option<&T>) {
        (self.handler)(error, sequence, event)
    }
}
