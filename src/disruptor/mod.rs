//! Sequence-coordinated ring buffer
//!
//! Producers claim slots through a [`Sequencer`], fill them in the
//! [`RingBuffer`] and publish; consumers run an [`EventProcessor`] that waits on
//! a [`SequenceBarrier`] and hands contiguous batches to an [`EventHandler`].
//! Every hand-off is expressed through [`Sequence`] counters.

pub mod claim_strategy;
pub mod config;
pub mod event_factory;
pub mod event_handler;
pub mod event_processor;
pub mod exception_handler;
pub mod producer;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_barrier;
pub mod sequencer;
pub mod thread_management;
pub mod wait_strategy;


pub use claim_strategy::{
    ClaimStrategy, ClaimStrategyOption, MultiThreadedClaimStrategy, SingleThreadedClaimStrategy,
};
pub use config::{DisruptorConfig, TimeConfig};
pub use event_factory::{ClosureEventFactory, DefaultEventFactory, EventFactory};
pub use event_handler::{ClosureEventHandler, EventHandler};
pub use event_processor::{BatchEventProcessor, EventProcessor, NoOpEventProcessor};
pub use exception_handler::{
    ClosureExceptionHandler, DefaultExceptionHandler, ExceptionHandler, IgnoreExceptionHandler,
};
pub use producer::Publisher;
pub use ring_buffer::{BatchIterMut, RingBuffer};
pub use sequence::{minimum_sequence, Sequence};
pub use sequence_barrier::SequenceBarrier;
pub use sequencer::Sequencer;
pub use thread_management::{ProcessorThread, ThreadContext};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, TimeoutBlockingWaitStrategy,
    WaitOutcome, WaitStrategy, WaitStrategyOption, YieldingWaitStrategy,
};

/// The initial cursor value for sequences: nothing produced or consumed yet
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Errors that can occur in the Disruptor
#[derive(Debug, thiserror::Error)]
pub enum DisruptorError {
    /// `run()` was called on a processor another thread is already running
    #[error("Event processor is already running")]
    AlreadyRunning,

    #[error("Invalid buffer size: {0}")]
    InvalidBufferSize(usize),

    #[error("Insufficient capacity in ring buffer")]
    InsufficientCapacity,

    /// Failure raised by an event handler while processing one event
    #[error("Event handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CPU core {0} is not available on this machine")]
    InvalidCoreId(usize),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DisruptorError {
    /// Wrap any error (or message) raised by an event handler
    pub fn handler<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Handler(error.into())
    }
}

pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Round a requested buffer size up to the next power of two
///
/// # Errors
/// Returns `DisruptorError::InvalidBufferSize` for zero, or when the rounded
/// size cannot be addressed with `i64` sequences.
pub fn ceil_to_power_of_two(requested: usize) -> Result<usize> {
    if requested == 0 {
        return Err(DisruptorError::InvalidBufferSize(requested));
    }
    match requested.checked_next_power_of_two() {
        Some(size) if i64::try_from(size).is_ok() => Ok(size),
        _ => Err(DisruptorError::InvalidBufferSize(requested)),
    }
}
