//! `ringseq` - Sequence-coordinated ring buffer
//!
//! Inter-thread messaging over a pre-allocated ring buffer in the style of the
//! LMAX Disruptor. Producers and consumers never exchange locks or queues;
//! every hand-off is a monotonically increasing [`Sequence`] that one thread
//! publishes with a release store and others read with an acquire load.
//!
//! ## Features
//!
//! - **Pre-allocated**: every event slot is created once, up front
//! - **Cache-padded sequences**: the cursor and each consumer's progress live
//!   on separate cache lines
//! - **Batching**: consumers receive every event available at once, with an
//!   end-of-batch flag
//! - **Pluggable policies**: single- or multi-producer claiming, and five wait
//!   strategies from busy-spin to blocking
//! - **Pipelines**: a barrier can depend on upstream consumers, so stages run
//!   in order over the same slots
//!
//! ## Quick Start
//!
//! ```rust
//! use ringseq::disruptor::{
//!     BatchEventProcessor, ClaimStrategyOption, DefaultEventFactory, EventHandler,
//!     EventProcessor, ProcessorThread, Publisher, Result, RingBuffer, Sequencer, ThreadContext,
//!     TimeConfig, WaitStrategyOption,
//! };
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default)]
//! struct PriceEvent {
//!     price: i64,
//! }
//!
//! struct Summer {
//!     total: Arc<AtomicI64>,
//! }
//!
//! impl EventHandler<PriceEvent> for Summer {
//!     fn on_event(&mut self, event: Option<&PriceEvent>, _sequence: i64, _end_of_batch: bool) -> Result<()> {
//!         if let Some(event) = event {
//!             self.total.fetch_add(event.price, Ordering::Relaxed);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let sequencer = Arc::new(Sequencer::new(
//!     1024,
//!     ClaimStrategyOption::SingleThreaded,
//!     WaitStrategyOption::Blocking,
//!     TimeConfig::default(),
//! )?);
//! let ring_buffer = Arc::new(RingBuffer::new(1024, DefaultEventFactory::<PriceEvent>::new())?);
//!
//! let total = Arc::new(AtomicI64::new(0));
//! let processor = Arc::new(BatchEventProcessor::new(
//!     Arc::clone(&ring_buffer),
//!     sequencer.new_barrier(vec![]),
//!     Summer { total: Arc::clone(&total) },
//! ));
//! sequencer.set_gating_sequences(vec![processor.sequence()]);
//! let consumer = ProcessorThread::spawn(Arc::clone(&processor), ThreadContext::new())?;
//!
//! let mut publisher = Publisher::new(ring_buffer, Arc::clone(&sequencer))?;
//! for price in 1..=10 {
//!     publisher.publish(|event, _sequence| event.price = price);
//! }
//!
//! while processor.sequence().get() < sequencer.cursor() {
//!     std::thread::yield_now();
//! }
//! consumer.halt_and_join()?;
//! assert_eq!(total.load(Ordering::Relaxed), 55);
//! # Ok::<(), ringseq::DisruptorError>(())
//! ```
//!
//! ## Architecture
//!
//! - **`Sequence`**: cache-padded atomic counter
//! - **`RingBuffer`**: pre-allocated slots indexed by `sequence & (capacity - 1)`
//! - **`ClaimStrategy`**: hands out sequences to producers, gated on consumers
//! - **`WaitStrategy`**: how a consumer waits for a sequence to be published
//! - **`Sequencer`**: owns the cursor, the gating sequences and both strategies
//! - **`SequenceBarrier`**: a consumer's view of the cursor and its upstream
//!   dependencies, with an alert flag for shutdown
//! - **`EventProcessor`**: the consumer loop, handing batches to an
//!   `EventHandler`

pub mod disruptor;

pub use disruptor::{
    BatchEventProcessor, ClaimStrategyOption, DefaultEventFactory, DisruptorConfig,
    DisruptorError, EventFactory, EventHandler, EventProcessor, ExceptionHandler,
    NoOpEventProcessor, ProcessorThread, Publisher, Result, RingBuffer, Sequence, SequenceBarrier,
    Sequencer, ThreadContext, TimeConfig, WaitOutcome, WaitStrategy, WaitStrategyOption,
    INITIAL_CURSOR_VALUE,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `ringseq` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
