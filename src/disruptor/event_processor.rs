//! Event Processor implementation
//!
//! Event processors own a consumer's position in the ring buffer. The batch
//! processor waits on a [`SequenceBarrier`], hands every available event to its
//! [`EventHandler`] and then commits its [`Sequence`], which is what gates the
//! producers and any downstream processors.

use crate::disruptor::{
    DefaultExceptionHandler, DisruptorError, EventHandler, ExceptionHandler, Result, RingBuffer,
    Sequence, SequenceBarrier, Sequencer, TimeConfig, WaitOutcome,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// A consumer that can be run on its own thread and halted from another
pub trait EventProcessor: Send + Sync {
    /// The sequence this processor has committed up to
    ///
    /// Register it as a gating sequence, or pass it to a downstream barrier.
    fn sequence(&self) -> Arc<Sequence>;

    /// Ask the processor to stop
    ///
    /// Idempotent and never blocks. A processor halted before `run` exits as
    /// soon as it starts.
    fn halt(&self);

    /// Run the processing loop on the calling thread until halted
    ///
    /// # Errors
    /// Returns `DisruptorError::AlreadyRunning` if another thread is running
    /// this processor.
    fn run(&self) -> Result<()>;

    fn is_running(&self) -> bool;
}

/// Processor that consumes nothing and tracks the published cursor
///
/// Used as a gating sequence when a ring buffer has no real consumer, so
/// producers are never held back.
#[derive(Debug)]
pub struct NoOpEventProcessor {
    sequence: Arc<Sequence>,
}

impl NoOpEventProcessor {
    pub fn new(sequencer: &Sequencer) -> Self {
        Self {
            sequence: sequencer.cursor_sequence(),
        }
    }
}

impl EventProcessor for NoOpEventProcessor {
    fn sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }

    fn halt(&self) {}

    fn run(&self) -> Result<()> {
        Ok(())
    }

    fn is_running(&self) -> bool {
        false
    }
}

/// Processor that delivers events to a handler in batches
///
/// # Type Parameters
/// * `T` - The event type
/// * `H` - The event handler
pub struct BatchEventProcessor<T, H> {
    sequence: Arc<Sequence>,
    ring_buffer: Arc<RingBuffer<T>>,
    sequence_barrier: Arc<SequenceBarrier>,
    /// Only ever locked by the thread inside `run`
    event_handler: Mutex<H>,
    exception_handler: Box<dyn ExceptionHandler<T>>,
    idle_timeout: Option<Duration>,
    running: AtomicBool,
}

impl<T, H> BatchEventProcessor<T, H>
where
    T: Send + Sync + 'static,
    H: EventHandler<T>,
{
    /// Create a processor reading `ring_buffer` through `sequence_barrier`
    ///
    /// Failures are logged by a [`DefaultExceptionHandler`] until another one
    /// is set.
    pub fn new(
        ring_buffer: Arc<RingBuffer<T>>,
        sequence_barrier: Arc<SequenceBarrier>,
        event_handler: H,
    ) -> Self {
        Self {
            sequence: Arc::new(Sequence::default()),
            ring_buffer,
            sequence_barrier,
            event_handler: Mutex::new(event_handler),
            exception_handler: Box::new(DefaultExceptionHandler::new()),
            idle_timeout: None,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_exception_handler<E>(mut self, exception_handler: E) -> Self
    where
        E: ExceptionHandler<T> + 'static,
    {
        self.exception_handler = Box::new(exception_handler);
        self
    }

    /// Bound each wait by `idle_timeout` and deliver an idle tick
    /// (`on_event(None, next_sequence, false)`) after every wait
    ///
    /// A zero duration disables idle ticks and waits are unbounded again.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = (!idle_timeout.is_zero()).then_some(idle_timeout);
        self
    }

    /// Take the idle timeout from `time_config`
    ///
    /// See [`TimeConfig::idle_timeout`].
    pub fn with_time_config(mut self, time_config: &TimeConfig) -> Self {
        self.idle_timeout = time_config.idle_timeout();
        self
    }

    /// Consume the processor and return its handler
    pub fn into_handler(self) -> H {
        self.event_handler.into_inner()
    }

    fn process_events(&self, handler: &mut H) {
        let mut next_sequence = self.sequence.get() + 1;

        loop {
            let outcome = match self.idle_timeout {
                Some(timeout) => self
                    .sequence_barrier
                    .wait_for_with_timeout(next_sequence, timeout),
                None => self.sequence_barrier.wait_for(next_sequence),
            };

            match outcome {
                WaitOutcome::Cancelled => break,
                WaitOutcome::TimedOut => {}
                WaitOutcome::Available(available_sequence) => {
                    trace!(
                        from = next_sequence,
                        to = available_sequence,
                        "processing batch"
                    );
                    while next_sequence <= available_sequence {
                        let event = self.ring_buffer.get(next_sequence);
                        let end_of_batch = next_sequence == available_sequence;
                        if let Err(error) =
                            handler.on_event(Some(event), next_sequence, end_of_batch)
                        {
                            self.exception_handler.handle_event_exception(
                                error,
                                next_sequence,
                                Some(event),
                            );
                        }
                        next_sequence += 1;
                    }
                }
            }

            if self.idle_timeout.is_some() {
                if let Err(error) = handler.on_event(None, next_sequence, false) {
                    self.exception_handler
                        .handle_event_exception(error, next_sequence, None);
                }
            }

            self.sequence.set(next_sequence - 1);
        }
    }
}

impl<T, H> EventProcessor for BatchEventProcessor<T, H>
where
    T: Send + Sync + 'static,
    H: EventHandler<T>,
{
    fn sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }

    fn halt(&self) {
        debug!(sequence = self.sequence.get(), "halting event processor");
        self.sequence_barrier.alert();
    }

    fn run(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("event processor is already running");
            return Err(DisruptorError::AlreadyRunning);
        }

        {
            let mut handler = self.event_handler.lock();
            debug!(sequence = self.sequence.get(), "event processor started");

            if let Err(error) = handler.on_start() {
                self.exception_handler.handle_on_start_exception(error);
            }

            self.process_events(&mut handler);

            if let Err(error) = handler.on_shutdown() {
                self.exception_handler.handle_on_shutdown_exception(error);
            }
            debug!(sequence = self.sequence.get(), "event processor stopped");
        }

        self.running.store(false, Ordering::Release);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{
        ClaimStrategyOption, ClosureExceptionHandler, DefaultEventFactory, TimeConfig,
        WaitStrategyOption, INITIAL_CURSOR_VALUE,
    };
    use std::thread;

    #[derive(Debug, Default)]
    struct TestEvent {
        value: i64,
    }

    #[derive(Default)]
    struct Recorder {
        started: usize,
        shut_down: usize,
        events: Vec<(i64, i64, bool)>,
        idle_ticks: Vec<i64>,
        fail_on: Option<i64>,
    }

    impl EventHandler<TestEvent> for Recorder {
        fn on_start(&mut self) -> Result<()> {
            self.started += 1;
            Ok(())
        }

        fn on_event(
            &mut self,
            event: Option<&TestEvent>,
            sequence: i64,
            end_of_batch: bool,
        ) -> Result<()> {
            match event {
                Some(event) => {
                    self.events.push((event.value, sequence, end_of_batch));
                    if self.fail_on == Some(sequence) {
                        return Err(DisruptorError::handler("rejected"));
                    }
                }
                None => self.idle_ticks.push(sequence),
            }
            Ok(())
        }

        fn on_shutdown(&mut self) -> Result<()> {
            self.shut_down += 1;
            Ok(())
        }
    }

    struct Fixture {
        sequencer: Arc<Sequencer>,
        ring_buffer: Arc<RingBuffer<TestEvent>>,
    }

    impl Fixture {
        fn new(wait_strategy: WaitStrategyOption) -> Self {
            let sequencer = Arc::new(
                Sequencer::new(
                    16,
                    ClaimStrategyOption::SingleThreaded,
                    wait_strategy,
                    TimeConfig::default(),
                )
                .unwrap(),
            );
            let ring_buffer =
                Arc::new(RingBuffer::new(16, DefaultEventFactory::<TestEvent>::new()).unwrap());
            Self {
                sequencer,
                ring_buffer,
            }
        }

        fn publish(&self, value: i64) {
            let sequence = self.sequencer.next();
            unsafe {
                (*self.ring_buffer.get_mut_unchecked(sequence)).value = value;
            }
            self.sequencer.publish(sequence);
        }

        fn processor(&self, handler: Recorder) -> Arc<BatchEventProcessor<TestEvent, Recorder>> {
            let processor = BatchEventProcessor::new(
                Arc::clone(&self.ring_buffer),
                self.sequencer.new_barrier(vec![]),
                handler,
            );
            self.sequencer.set_gating_sequences(vec![processor.sequence()]);
            Arc::new(processor)
        }
    }

    fn wait_until_consumed(processor: &BatchEventProcessor<TestEvent, Recorder>, sequence: i64) {
        while processor.sequence().get() < sequence {
            thread::yield_now();
        }
    }

    fn into_recorder(processor: Arc<BatchEventProcessor<TestEvent, Recorder>>) -> Recorder {
        match Arc::try_unwrap(processor) {
            Ok(processor) => processor.into_handler(),
            Err(_) => panic!("processor still shared"),
        }
    }

    #[test]
    fn test_no_op_processor_follows_cursor() {
        let fixture = Fixture::new(WaitStrategyOption::BusySpin);
        let processor = NoOpEventProcessor::new(&fixture.sequencer);

        assert_eq!(processor.sequence().get(), INITIAL_CURSOR_VALUE);
        fixture.publish(1);
        fixture.publish(2);
        assert_eq!(processor.sequence().get(), 1);

        processor.run().unwrap();
        processor.halt();
        assert!(!processor.is_running());
    }

    #[test]
    fn test_processes_published_events_in_order() {
        let fixture = Fixture::new(WaitStrategyOption::Blocking);
        let processor = fixture.processor(Recorder::default());

        let runner = {
            let processor = Arc::clone(&processor);
            thread::spawn(move || processor.run())
        };

        for value in 0..5 {
            fixture.publish(value * 10);
        }
        wait_until_consumed(&processor, 4);

        processor.halt();
        runner.join().unwrap().unwrap();
        assert!(!processor.is_running());

        let recorder = into_recorder(processor);
        assert_eq!(recorder.started, 1);
        assert_eq!(recorder.shut_down, 1);
        let values: Vec<i64> = recorder.events.iter().map(|(value, _, _)| *value).collect();
        let sequences: Vec<i64> = recorder.events.iter().map(|(_, seq, _)| *seq).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40]);
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert!(recorder.events.last().is_some_and(|(_, _, end)| *end));
    }

    #[test]
    fn test_end_of_batch_marks_last_available_event() {
        let fixture = Fixture::new(WaitStrategyOption::BusySpin);
        for value in 0..3 {
            fixture.publish(value);
        }
        let processor = fixture.processor(Recorder::default());

        let runner = {
            let processor = Arc::clone(&processor);
            thread::spawn(move || processor.run())
        };
        wait_until_consumed(&processor, 2);
        processor.halt();
        runner.join().unwrap().unwrap();

        let recorder = into_recorder(processor);
        assert_eq!(
            recorder.events,
            vec![(0, 0, false), (1, 1, false), (2, 2, true)]
        );
    }

    #[test]
    fn test_handler_failure_is_forwarded_and_processing_continues() {
        let fixture = Fixture::new(WaitStrategyOption::Yielding);
        let failures = Arc::new(Mutex::new(Vec::new()));
        let processor = {
            let failures = Arc::clone(&failures);
            let processor = BatchEventProcessor::new(
                Arc::clone(&fixture.ring_buffer),
                fixture.sequencer.new_barrier(vec![]),
                Recorder {
                    fail_on: Some(1),
                    ..Recorder::default()
                },
            )
            .with_exception_handler(ClosureExceptionHandler::new(
                move |_error: DisruptorError, sequence: i64, event: Option<&TestEvent>| {
                    failures.lock().push((sequence, event.map(|event| event.value)));
                },
            ));
            Arc::new(processor)
        };

        for value in [5, 6, 7] {
            fixture.publish(value);
        }

        let runner = {
            let processor = Arc::clone(&processor);
            thread::spawn(move || processor.run())
        };
        wait_until_consumed(&processor, 2);
        processor.halt();
        runner.join().unwrap().unwrap();

        assert_eq!(*failures.lock(), vec![(1, Some(6))]);
        assert_eq!(into_recorder(processor).events.len(), 3);
    }

    #[test]
    fn test_idle_ticks_are_delivered_without_events() {
        let fixture = Fixture::new(WaitStrategyOption::Blocking);
        let processor = Arc::new(
            BatchEventProcessor::new(
                Arc::clone(&fixture.ring_buffer),
                fixture.sequencer.new_barrier(vec![]),
                Recorder::default(),
            )
            .with_idle_timeout(Duration::from_millis(1)),
        );

        let runner = {
            let processor = Arc::clone(&processor);
            thread::spawn(move || processor.run())
        };
        thread::sleep(Duration::from_millis(30));
        processor.halt();
        runner.join().unwrap().unwrap();

        let recorder = into_recorder(processor);
        assert!(recorder.events.is_empty());
        assert!(!recorder.idle_ticks.is_empty());
        assert!(recorder.idle_ticks.iter().all(|sequence| *sequence == 0));
    }

    #[test]
    fn test_zero_idle_timeout_disables_idle_ticks() {
        let fixture = Fixture::new(WaitStrategyOption::Blocking);
        let processor = Arc::new(
            BatchEventProcessor::new(
                Arc::clone(&fixture.ring_buffer),
                fixture.sequencer.new_barrier(vec![]),
                Recorder::default(),
            )
            .with_idle_timeout(Duration::ZERO),
        );

        let runner = {
            let processor = Arc::clone(&processor);
            thread::spawn(move || processor.run())
        };
        thread::sleep(Duration::from_millis(30));
        processor.halt();
        runner.join().unwrap().unwrap();

        assert!(into_recorder(processor).idle_ticks.is_empty());
    }

    #[test]
    fn test_idle_timeout_from_time_config() {
        let fixture = Fixture::new(WaitStrategyOption::Blocking);
        let ticking = TimeConfig {
            timeout_micros: 500,
            ..TimeConfig::default()
        };
        let silent = TimeConfig {
            timeout_micros: 0,
            ..TimeConfig::default()
        };

        let processors: Vec<_> = [ticking, silent]
            .iter()
            .map(|time_config| {
                Arc::new(
                    BatchEventProcessor::new(
                        Arc::clone(&fixture.ring_buffer),
                        fixture.sequencer.new_barrier(vec![]),
                        Recorder::default(),
                    )
                    .with_time_config(time_config),
                )
            })
            .collect();
        let runners: Vec<_> = processors
            .iter()
            .map(|processor| {
                let processor = Arc::clone(processor);
                thread::spawn(move || processor.run())
            })
            .collect();

        thread::sleep(Duration::from_millis(30));
        for processor in &processors {
            processor.halt();
        }
        for runner in runners {
            runner.join().unwrap().unwrap();
        }

        let mut recorders = processors.into_iter().map(into_recorder);
        assert!(!recorders.next().unwrap().idle_ticks.is_empty());
        assert!(recorders.next().unwrap().idle_ticks.is_empty());
    }

    #[test]
    fn test_halt_before_run_exits_immediately() {
        let fixture = Fixture::new(WaitStrategyOption::Blocking);
        fixture.publish(1);
        let processor = fixture.processor(Recorder::default());

        processor.halt();
        processor.halt();
        processor.run().unwrap();

        let recorder = into_recorder(processor);
        assert_eq!(recorder.started, 1);
        assert_eq!(recorder.shut_down, 1);
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn test_second_run_is_rejected() {
        let fixture = Fixture::new(WaitStrategyOption::Blocking);
        let processor = fixture.processor(Recorder::default());

        let runner = {
            let processor = Arc::clone(&processor);
            thread::spawn(move || processor.run())
        };
        while !processor.is_running() {
            thread::yield_now();
        }

        assert!(matches!(
            processor.run(),
            Err(DisruptorError::AlreadyRunning)
        ));

        processor.halt();
        runner.join().unwrap().unwrap();
        assert_eq!(into_recorder(processor).started, 1);
    }
}
