//! Sequencer Implementation
//!
//! The sequencer coordinates access to a ring buffer. Producers claim sequences
//! from it through the configured [`ClaimStrategy`] and publish them by moving
//! the cursor; consumers are handed [`SequenceBarrier`]s that wait on that
//! cursor through the configured [`WaitStrategy`]. The gating sequences it
//! holds are what stop producers from lapping the slowest consumer.

use crate::disruptor::{
    ceil_to_power_of_two, minimum_sequence, ClaimStrategy, ClaimStrategyOption, DisruptorConfig,
    DisruptorError, Result, Sequence, SequenceBarrier, TimeConfig, WaitStrategy,
    WaitStrategyOption,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Coordinator for claiming and publishing sequences
#[derive(Debug)]
pub struct Sequencer {
    buffer_size: usize,
    cursor: Arc<Sequence>,
    claim_strategy_option: ClaimStrategyOption,
    claim_strategy: Box<dyn ClaimStrategy>,
    wait_strategy: Arc<dyn WaitStrategy>,
    /// Replaced wholesale on change so claims can spin on a snapshot without
    /// holding the lock
    gating_sequences: RwLock<Arc<Vec<Arc<Sequence>>>>,
    /// Set while a publisher owns a single-threaded sequencer
    publisher_attached: AtomicBool,
}

impl Sequencer {
    /// Create a new sequencer
    ///
    /// # Arguments
    /// * `requested_size` - Buffer size, rounded up to a power of two
    /// * `claim_strategy` - Single- or multi-producer claiming
    /// * `wait_strategy` - How consumers wait for publication
    /// * `time_config` - Timeouts and sleep periods for the wait strategy
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` for a zero or oversized
    /// buffer.
    pub fn new(
        requested_size: usize,
        claim_strategy: ClaimStrategyOption,
        wait_strategy: WaitStrategyOption,
        time_config: TimeConfig,
    ) -> Result<Self> {
        let buffer_size = ceil_to_power_of_two(requested_size)?;
        debug!(
            buffer_size,
            ?claim_strategy,
            ?wait_strategy,
            "creating sequencer"
        );

        Ok(Self {
            buffer_size,
            cursor: Arc::new(Sequence::default()),
            claim_strategy_option: claim_strategy,
            claim_strategy: claim_strategy.create(buffer_size),
            wait_strategy: wait_strategy.create(&time_config),
            gating_sequences: RwLock::new(Arc::new(Vec::new())),
            publisher_attached: AtomicBool::new(false),
        })
    }

    /// Create a sequencer from a validated configuration
    pub fn from_config(config: &DisruptorConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.buffer_size,
            config.claim_strategy,
            config.wait_strategy,
            config.time,
        )
    }

    /// Replace the sequences that gate producers
    ///
    /// Intended for pipeline setup, before any producer has claimed.
    pub fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>) {
        debug!(count = sequences.len(), "setting gating sequences");
        *self.gating_sequences.write() = Arc::new(sequences);
    }

    /// Add gating sequences to a running sequencer
    ///
    /// Each added sequence is first moved to the current cursor so it does not
    /// hold producers back for events it will never see.
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        let mut gating = self.gating_sequences.write();
        let mut updated = Vec::clone(&gating);
        let cursor = self.cursor.get();
        for sequence in sequences {
            sequence.set(cursor);
            updated.push(Arc::clone(sequence));
        }
        debug!(added = sequences.len(), total = updated.len(), "added gating sequences");
        *gating = Arc::new(updated);
    }

    /// Stop a sequence from gating producers
    ///
    /// # Returns
    /// True if the sequence was registered and has been removed
    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        let mut gating = self.gating_sequences.write();
        let mut updated = Vec::clone(&gating);
        updated.retain(|existing| !Arc::ptr_eq(existing, sequence));
        if updated.len() == gating.len() {
            return false;
        }
        *gating = Arc::new(updated);
        true
    }

    fn gating_snapshot(&self) -> Arc<Vec<Arc<Sequence>>> {
        Arc::clone(&self.gating_sequences.read())
    }

    /// Register a publisher, rejecting a second one on a single-threaded
    /// sequencer
    ///
    /// # Returns
    /// True if the caller now holds the exclusive slot and must call
    /// [`detach_publisher`](Self::detach_publisher) when done
    pub(crate) fn attach_publisher(&self) -> Result<bool> {
        if self.claim_strategy_option == ClaimStrategyOption::MultiThreaded {
            return Ok(false);
        }
        self.publisher_attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| true)
            .map_err(|_| {
                DisruptorError::InvalidConfig(
                    "single-threaded sequencer already has a publisher".to_string(),
                )
            })
    }

    pub(crate) fn detach_publisher(&self) {
        self.publisher_attached.store(false, Ordering::Release);
    }

    /// Create a barrier over the cursor and `sequences_to_track`
    pub fn new_barrier(&self, sequences_to_track: Vec<Arc<Sequence>>) -> Arc<SequenceBarrier> {
        Arc::new(SequenceBarrier::new(
            Arc::clone(&self.cursor),
            Arc::clone(&self.wait_strategy),
            sequences_to_track,
        ))
    }

    /// The buffer size (a power of two)
    pub fn capacity(&self) -> usize {
        self.buffer_size
    }

    /// Non-blocking check for at least one free slot
    ///
    /// Advisory only under multiple producers: another thread may take the
    /// slot before this caller claims it.
    pub fn has_available_capacity(&self) -> bool {
        self.claim_strategy
            .has_available_capacity(&self.gating_snapshot())
    }

    /// Published events not yet consumed by every gating sequence
    pub fn occupied_capacity(&self) -> usize {
        let produced = self.cursor.get();
        let consumed = minimum_sequence(&self.gating_snapshot(), produced);
        (produced - consumed).clamp(0, self.buffer_size as i64) as usize
    }

    /// Slots producers can publish into before wrapping onto unconsumed events
    pub fn remaining_capacity(&self) -> usize {
        self.buffer_size - self.occupied_capacity()
    }

    /// Claim the next sequence, waiting for capacity if needed
    pub fn next(&self) -> i64 {
        self.claim_strategy
            .increment_and_get(&self.gating_snapshot())
    }

    /// Claim `n` sequences at once
    ///
    /// # Returns
    /// The highest claimed sequence; the batch is `result - n + 1..=result`
    pub fn next_batch(&self, n: usize) -> i64 {
        self.claim_strategy
            .increment_and_get_by(n as i64, &self.gating_snapshot())
    }

    /// Claim a specific sequence
    ///
    /// Only meaningful with a single producer.
    pub fn claim(&self, sequence: i64) -> i64 {
        self.claim_strategy
            .set_sequence(sequence, &self.gating_snapshot());
        sequence
    }

    /// Publish a claimed sequence
    pub fn publish(&self, sequence: i64) {
        self.publish_batch(sequence, 1);
    }

    /// Publish a claimed batch ending at `sequence`
    ///
    /// Under multiple producers this waits until every earlier batch has been
    /// published, so the cursor never exposes a gap.
    pub fn publish_batch(&self, sequence: i64, batch_size: usize) {
        self.claim_strategy
            .serialise_publishing(sequence, &self.cursor, batch_size as i64);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Move the cursor to `sequence` without any claim bookkeeping
    ///
    /// Only for a single producer driving the sequencer out of band.
    pub fn force_publish(&self, sequence: i64) {
        self.cursor.set(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    /// Last published sequence
    pub fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    /// The cursor itself, for consumers that must follow publication directly
    pub fn cursor_sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    /// Last claimed sequence, which may run ahead of the cursor
    pub fn claimed_sequence(&self) -> i64 {
        self.claim_strategy.sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{WaitOutcome, INITIAL_CURSOR_VALUE};
    use std::thread;
    use std::time::Duration;

    fn sequencer(size: usize, claim: ClaimStrategyOption) -> Sequencer {
        Sequencer::new(size, claim, WaitStrategyOption::Blocking, TimeConfig::default()).unwrap()
    }

    #[test]
    fn test_new_sequencer_starts_empty() {
        let sequencer = sequencer(6, ClaimStrategyOption::SingleThreaded);

        assert_eq!(sequencer.capacity(), 8);
        assert_eq!(sequencer.cursor(), INITIAL_CURSOR_VALUE);
        assert_eq!(sequencer.remaining_capacity(), 8);
        assert_eq!(sequencer.occupied_capacity(), 0);
        assert!(sequencer.has_available_capacity());
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(Sequencer::new(
            0,
            ClaimStrategyOption::SingleThreaded,
            WaitStrategyOption::BusySpin,
            TimeConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_claim_and_publish_moves_cursor() {
        let sequencer = sequencer(8, ClaimStrategyOption::SingleThreaded);

        let sequence = sequencer.next();
        assert_eq!(sequence, 0);
        assert_eq!(sequencer.cursor(), INITIAL_CURSOR_VALUE);
        assert_eq!(sequencer.claimed_sequence(), 0);

        sequencer.publish(sequence);
        assert_eq!(sequencer.cursor(), 0);
    }

    #[test]
    fn test_capacity_tracks_slowest_consumer() {
        let sequencer = sequencer(4, ClaimStrategyOption::SingleThreaded);
        let consumer = Arc::new(Sequence::default());
        sequencer.set_gating_sequences(vec![Arc::clone(&consumer)]);

        for _ in 0..4 {
            let sequence = sequencer.next();
            sequencer.publish(sequence);
        }

        assert_eq!(sequencer.occupied_capacity(), 4);
        assert_eq!(sequencer.remaining_capacity(), 0);
        assert!(!sequencer.has_available_capacity());

        consumer.set(1);
        assert_eq!(sequencer.occupied_capacity(), 2);
        assert_eq!(sequencer.remaining_capacity(), 2);
        assert!(sequencer.has_available_capacity());
    }

    #[test]
    fn test_next_batch_claims_contiguous_range() {
        let sequencer = sequencer(16, ClaimStrategyOption::MultiThreaded);

        assert_eq!(sequencer.next_batch(5), 4);
        assert_eq!(sequencer.next_batch(3), 7);

        sequencer.publish_batch(4, 5);
        sequencer.publish_batch(7, 3);
        assert_eq!(sequencer.cursor(), 7);
    }

    #[test]
    fn test_claim_specific_sequence_and_force_publish() {
        let sequencer = sequencer(8, ClaimStrategyOption::SingleThreaded);

        assert_eq!(sequencer.claim(5), 5);
        sequencer.force_publish(5);
        assert_eq!(sequencer.cursor(), 5);
        assert_eq!(sequencer.next(), 6);
    }

    #[test]
    fn test_gating_changes_do_not_wait_for_blocked_claim() {
        let sequencer = Arc::new(sequencer(2, ClaimStrategyOption::MultiThreaded));
        let consumer = Arc::new(Sequence::default());
        sequencer.set_gating_sequences(vec![Arc::clone(&consumer)]);
        sequencer.next();
        sequencer.next();

        let blocked = {
            let sequencer = Arc::clone(&sequencer);
            thread::spawn(move || sequencer.next())
        };
        thread::sleep(Duration::from_millis(20));

        let late = Arc::new(Sequence::new(100));
        sequencer.add_gating_sequences(&[Arc::clone(&late)]);
        assert_eq!(late.get(), INITIAL_CURSOR_VALUE);
        assert!(sequencer.remove_gating_sequence(&late));
        assert!(!sequencer.remove_gating_sequence(&late));
        assert!(!blocked.is_finished());

        consumer.set(0);
        assert_eq!(blocked.join().unwrap(), 2);
    }

    #[test]
    fn test_single_threaded_sequencer_admits_one_publisher() {
        let single = sequencer(8, ClaimStrategyOption::SingleThreaded);
        assert!(single.attach_publisher().unwrap());
        assert!(matches!(
            single.attach_publisher(),
            Err(DisruptorError::InvalidConfig(_))
        ));
        single.detach_publisher();
        assert!(single.attach_publisher().unwrap());

        let multi = sequencer(8, ClaimStrategyOption::MultiThreaded);
        assert!(!multi.attach_publisher().unwrap());
        assert!(!multi.attach_publisher().unwrap());
    }

    #[test]
    fn test_added_gating_sequence_starts_at_cursor() {
        let sequencer = sequencer(8, ClaimStrategyOption::SingleThreaded);
        for _ in 0..3 {
            let sequence = sequencer.next();
            sequencer.publish(sequence);
        }

        let late = Arc::new(Sequence::default());
        sequencer.add_gating_sequences(&[Arc::clone(&late)]);
        assert_eq!(late.get(), 2);
        assert_eq!(sequencer.occupied_capacity(), 0);

        assert!(sequencer.remove_gating_sequence(&late));
        assert!(!sequencer.remove_gating_sequence(&late));
    }

    #[test]
    fn test_barrier_sees_published_sequence() {
        let sequencer = Arc::new(sequencer(8, ClaimStrategyOption::MultiThreaded));
        let barrier = sequencer.new_barrier(vec![]);

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait_for_with_timeout(0, Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(10));
        let sequence = sequencer.next();
        sequencer.publish(sequence);

        assert_eq!(waiter.join().unwrap(), WaitOutcome::Available(0));
        assert_eq!(barrier.cursor(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = DisruptorConfig {
            buffer_size: 100,
            ..DisruptorConfig::default()
        };
        let sequencer = Sequencer::from_config(&config).unwrap();
        assert_eq!(sequencer.capacity(), 128);
    }
}
