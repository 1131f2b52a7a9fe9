//! Claim strategies
//!
//! A claim strategy turns counter increments into exclusive ownership of ring
//! slots and decides how a finished claim becomes visible on the cursor. The
//! single-threaded variant needs no read-modify-write because only one thread
//! ever claims; the multi-threaded variant hands out disjoint sequences with
//! an atomic add and then publishes them strictly in order.
//!
//! Both variants block a claim while it would lap the slowest gating sequence:
//! a sequence `s` is only handed out once `min(gating) >= s - buffer_size`.

use crate::disruptor::{minimum_sequence, DisruptorError, Sequence, INITIAL_CURSOR_VALUE};
use crossbeam_utils::{Backoff, CachePadded};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Producer-side slot claim policy
pub trait ClaimStrategy: Send + Sync + std::fmt::Debug {
    /// Size of the ring buffer this strategy claims over
    fn buffer_size(&self) -> usize;

    /// The most recently claimed sequence
    fn sequence(&self) -> i64;

    /// Non-blocking check that one more sequence can be claimed
    ///
    /// Advisory only: another producer may claim the slot in between.
    fn has_available_capacity(&self, gating_sequences: &[Arc<Sequence>]) -> bool;

    /// Claim the next sequence, waiting for the slot to be free
    fn increment_and_get(&self, gating_sequences: &[Arc<Sequence>]) -> i64 {
        self.increment_and_get_by(1, gating_sequences)
    }

    /// Claim `delta` sequences at once, returning the highest
    fn increment_and_get_by(&self, delta: i64, gating_sequences: &[Arc<Sequence>]) -> i64;

    /// Force the claim counter to `sequence` once its slot is free
    fn set_sequence(&self, sequence: i64, gating_sequences: &[Arc<Sequence>]);

    /// Make `sequence` (the last of `batch_size` claimed sequences) visible on
    /// the cursor
    fn serialise_publishing(&self, sequence: i64, cursor: &Sequence, batch_size: i64);
}

/// Selects a claim strategy at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimStrategyOption {
    /// Exactly one thread publishes
    #[serde(alias = "single")]
    SingleThreaded,
    /// Any number of threads publish concurrently
    #[default]
    #[serde(alias = "multi")]
    MultiThreaded,
}

impl ClaimStrategyOption {
    pub fn create(self, buffer_size: usize) -> Box<dyn ClaimStrategy> {
        match self {
            Self::SingleThreaded => Box::new(SingleThreadedClaimStrategy::new(buffer_size)),
            Self::MultiThreaded => Box::new(MultiThreadedClaimStrategy::new(buffer_size)),
        }
    }
}

impl FromStr for ClaimStrategyOption {
    type Err = DisruptorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" | "single-threaded" => Ok(Self::SingleThreaded),
            "multi" | "multi-threaded" => Ok(Self::MultiThreaded),
            other => Err(DisruptorError::InvalidConfig(format!(
                "unknown claim strategy: {other}"
            ))),
        }
    }
}

/// Lower bound of the gating minimum, shared by both strategies
///
/// Gating sequences only move forward, so a stale cached value is always safe:
/// it can only make a claim re-read the real minimum.
#[derive(Debug)]
struct GatingCache {
    buffer_size: i64,
    min_gating_sequence: CachePadded<AtomicI64>,
}

impl GatingCache {
    fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size as i64,
            min_gating_sequence: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
        }
    }

    fn has_capacity_for(&self, sequence: i64, gating_sequences: &[Arc<Sequence>]) -> bool {
        let wrap_point = sequence - self.buffer_size;
        if wrap_point <= self.min_gating_sequence.load(Ordering::Acquire) {
            return true;
        }
        if gating_sequences.is_empty() {
            return true;
        }

        let min_sequence = minimum_sequence(gating_sequences, i64::MAX);
        // Release so a producer passing on the cached value also observes the
        // consumer progress that produced it
        self.min_gating_sequence
            .store(min_sequence, Ordering::Release);
        wrap_point <= min_sequence
    }

    fn wait_for_free_slot_at(&self, sequence: i64, gating_sequences: &[Arc<Sequence>]) {
        let backoff = Backoff::new();
        while !self.has_capacity_for(sequence, gating_sequences) {
            backoff.snooze();
        }
    }
}

/// Claim strategy for a single publishing thread
#[derive(Debug)]
pub struct SingleThreadedClaimStrategy {
    claim_sequence: Sequence,
    gating: GatingCache,
}

impl SingleThreadedClaimStrategy {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            claim_sequence: Sequence::default(),
            gating: GatingCache::new(buffer_size),
        }
    }
}

impl ClaimStrategy for SingleThreadedClaimStrategy {
    fn buffer_size(&self) -> usize {
        self.gating.buffer_size as usize
    }

    fn sequence(&self) -> i64 {
        self.claim_sequence.get()
    }

    fn has_available_capacity(&self, gating_sequences: &[Arc<Sequence>]) -> bool {
        self.gating
            .has_capacity_for(self.claim_sequence.get() + 1, gating_sequences)
    }

    fn increment_and_get_by(&self, delta: i64, gating_sequences: &[Arc<Sequence>]) -> i64 {
        // Only one thread claims, so a plain load/store is enough
        let next_sequence = self.claim_sequence.get() + delta;
        self.claim_sequence.set(next_sequence);
        self.gating
            .wait_for_free_slot_at(next_sequence, gating_sequences);
        next_sequence
    }

    fn set_sequence(&self, sequence: i64, gating_sequences: &[Arc<Sequence>]) {
        self.claim_sequence.set(sequence);
        self.gating.wait_for_free_slot_at(sequence, gating_sequences);
    }

    fn serialise_publishing(&self, sequence: i64, cursor: &Sequence, _batch_size: i64) {
        cursor.set(sequence);
    }
}

/// Claim strategy for concurrent publishing threads
#[derive(Debug)]
pub struct MultiThreadedClaimStrategy {
    claim_sequence: Sequence,
    gating: GatingCache,
}

impl MultiThreadedClaimStrategy {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            claim_sequence: Sequence::default(),
            gating: GatingCache::new(buffer_size),
        }
    }
}

impl ClaimStrategy for MultiThreadedClaimStrategy {
    fn buffer_size(&self) -> usize {
        self.gating.buffer_size as usize
    }

    fn sequence(&self) -> i64 {
        self.claim_sequence.get()
    }

    fn has_available_capacity(&self, gating_sequences: &[Arc<Sequence>]) -> bool {
        self.gating
            .has_capacity_for(self.claim_sequence.get() + 1, gating_sequences)
    }

    fn increment_and_get_by(&self, delta: i64, gating_sequences: &[Arc<Sequence>]) -> i64 {
        let next_sequence = self.claim_sequence.add_and_get(delta);
        self.gating
            .wait_for_free_slot_at(next_sequence, gating_sequences);
        next_sequence
    }

    fn set_sequence(&self, sequence: i64, gating_sequences: &[Arc<Sequence>]) {
        self.claim_sequence.set(sequence);
        self.gating.wait_for_free_slot_at(sequence, gating_sequences);
    }

    fn serialise_publishing(&self, sequence: i64, cursor: &Sequence, batch_size: i64) {
        // Claims finish out of order across threads; the cursor must not move
        // past a sequence whose predecessor batch is still unpublished.
        let expected_sequence = sequence - batch_size;
        let backoff = Backoff::new();
        while cursor.get() < expected_sequence {
            backoff.snooze();
        }
        cursor.set(sequence);
    }
}
