//! Wait Strategy Implementation
//!
//! Wait strategies decide what a consumer thread does while the sequence it
//! needs is not yet available. The choice is a latency/CPU trade-off made once
//! at construction:
//!
//! | strategy           | idle action                        | wake latency | cpu               |
//! |--------------------|------------------------------------|--------------|-------------------|
//! | `BusySpin`         | `spin_loop` hint                   | lowest       | a full core       |
//! | `Yielding`         | spin, then `yield_now`             | low          | high              |
//! | `Sleeping`         | spin, yield, then sleep            | medium       | low               |
//! | `Blocking`         | park on a condition variable       | higher       | lowest            |
//! | `TimeoutBlocking`  | park, waking at a fixed interval   | higher       | low, periodic     |
//!
//! Every strategy re-checks the barrier's alert flag each time it wakes, so a
//! halt is never missed, and every strategy honours a per-call timeout.

use crate::disruptor::{DisruptorError, Sequence, SequenceBarrier, TimeConfig};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::hint;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of waiting on a sequence
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Everything up to and including this sequence is available; it may be
    /// higher than the sequence asked for
    Available(i64),
    /// The timeout elapsed before the requested sequence became available
    TimedOut,
    /// The barrier was alerted
    Cancelled,
}

/// Strategy for waiting for events to become available
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Wait until `min(cursor, dependents...) >= sequence`
    ///
    /// # Arguments
    /// * `sequence` - The sequence to wait for
    /// * `cursor` - The published cursor
    /// * `dependents` - Upstream consumer sequences the caller must not pass
    /// * `barrier` - Checked for alerts on every wake
    /// * `timeout` - Optional upper bound on the wait
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &SequenceBarrier,
        timeout: Option<Duration>,
    ) -> WaitOutcome;

    /// Wake every thread parked by this strategy
    ///
    /// Called after every publish and on alert.
    fn signal_all_when_blocking(&self);
}

/// Selects a wait strategy at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitStrategyOption {
    BusySpin,
    Yielding,
    Sleeping,
    #[default]
    Blocking,
    TimeoutBlocking,
}

impl WaitStrategyOption {
    pub fn create(self, time_config: &TimeConfig) -> Arc<dyn WaitStrategy> {
        match self {
            Self::BusySpin => Arc::new(BusySpinWaitStrategy::new()),
            Self::Yielding => Arc::new(YieldingWaitStrategy::new()),
            Self::Sleeping => Arc::new(SleepingWaitStrategy::new_with_duration(
                time_config.sleep(),
            )),
            Self::Blocking => Arc::new(BlockingWaitStrategy::new()),
            Self::TimeoutBlocking => {
                Arc::new(TimeoutBlockingWaitStrategy::new(time_config.timeout()))
            }
        }
    }
}

impl FromStr for WaitStrategyOption {
    type Err = DisruptorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "busy-spin" | "busyspin" | "spin" => Ok(Self::BusySpin),
            "yielding" | "yield" => Ok(Self::Yielding),
            "sleeping" | "sleep" => Ok(Self::Sleeping),
            "blocking" => Ok(Self::Blocking),
            "timeout-blocking" | "timeout" => Ok(Self::TimeoutBlocking),
            other => Err(DisruptorError::InvalidConfig(format!(
                "unknown wait strategy: {other}"
            ))),
        }
    }
}

#[inline]
fn available_sequence(cursor: &Sequence, dependents: &[Arc<Sequence>]) -> i64 {
    dependents
        .iter()
        .fold(cursor.get(), |minimum, sequence| minimum.min(sequence.get()))
}

/// Poll until available, alerted or past the deadline, running `idle` between
/// polls with the number of polls so far
fn poll_until<F>(
    sequence: i64,
    cursor: &Sequence,
    dependents: &[Arc<Sequence>],
    barrier: &SequenceBarrier,
    deadline: Option<Instant>,
    mut idle: F,
) -> WaitOutcome
where
    F: FnMut(u32),
{
    let mut counter: u32 = 0;
    loop {
        if barrier.is_alerted() {
            return WaitOutcome::Cancelled;
        }

        let available = available_sequence(cursor, dependents);
        if available >= sequence {
            return WaitOutcome::Available(available);
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return WaitOutcome::TimedOut;
        }

        idle(counter);
        counter = counter.saturating_add(1);
    }
}

/// Busy-spin wait strategy
///
/// Polls continuously. Lowest latency, but occupies a core while waiting; use
/// it only when cores can be dedicated to consumers.
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &SequenceBarrier,
        timeout: Option<Duration>,
    ) -> WaitOutcome {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        poll_until(sequence, cursor, dependents, barrier, deadline, |_| {
            hint::spin_loop();
        })
    }

    fn signal_all_when_blocking(&self) {}
}

/// Yielding wait strategy
///
/// Spins for a bounded number of polls, then yields the thread on each
/// further poll.
#[derive(Debug)]
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    const DEFAULT_SPIN_TRIES: u32 = 100;

    pub fn new() -> Self {
        Self {
            spin_tries: Self::DEFAULT_SPIN_TRIES,
        }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &SequenceBarrier,
        timeout: Option<Duration>,
    ) -> WaitOutcome {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        poll_until(sequence, cursor, dependents, barrier, deadline, |counter| {
            if counter < self.spin_tries {
                hint::spin_loop();
            } else {
                thread::yield_now();
            }
        })
    }

    fn signal_all_when_blocking(&self) {}
}

/// Sleeping wait strategy
///
/// Spins, then yields, then sleeps for a fixed period between polls. Low CPU
/// use with wake latency bounded by the sleep period.
#[derive(Debug)]
pub struct SleepingWaitStrategy {
    sleep_duration: Duration,
}

impl SleepingWaitStrategy {
    const SPIN_TRIES: u32 = 100;
    const YIELD_TRIES: u32 = 200;

    pub fn new() -> Self {
        Self::new_with_duration(TimeConfig::default().sleep())
    }

    pub fn new_with_duration(sleep_duration: Duration) -> Self {
        Self { sleep_duration }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &SequenceBarrier,
        timeout: Option<Duration>,
    ) -> WaitOutcome {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        poll_until(sequence, cursor, dependents, barrier, deadline, |counter| {
            if counter < Self::SPIN_TRIES {
                hint::spin_loop();
            } else if counter < Self::YIELD_TRIES {
                thread::yield_now();
            } else {
                thread::sleep(self.sleep_duration);
            }
        })
    }

    fn signal_all_when_blocking(&self) {}
}

/// Blocking wait strategy
///
/// Parks waiting threads on a condition variable until a publish or an alert
/// signals them. Once the cursor is past the requested sequence, the slower
/// upstream dependents are polled with yields since they are not signalled.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    fn wait_until(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &SequenceBarrier,
        deadline: Option<Instant>,
    ) -> WaitOutcome {
        if cursor.get() < sequence {
            let mut guard = self.mutex.lock();
            // The cursor and alert are re-read under the lock that signallers
            // take, so a wake-up cannot slip in between check and park.
            while cursor.get() < sequence {
                if barrier.is_alerted() {
                    return WaitOutcome::Cancelled;
                }
                match deadline {
                    Some(deadline) => {
                        if self.condvar.wait_until(&mut guard, deadline).timed_out()
                            && cursor.get() < sequence
                        {
                            return WaitOutcome::TimedOut;
                        }
                    }
                    None => self.condvar.wait(&mut guard),
                }
            }
        }

        poll_until(sequence, cursor, dependents, barrier, deadline, |_| {
            thread::yield_now();
        })
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &SequenceBarrier,
        timeout: Option<Duration>,
    ) -> WaitOutcome {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        self.wait_until(sequence, cursor, dependents, barrier, deadline)
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// Blocking wait strategy with a default timeout
///
/// Behaves like [`BlockingWaitStrategy`] but never parks longer than its
/// configured timeout, so idle consumers wake periodically for housekeeping.
#[derive(Debug)]
pub struct TimeoutBlockingWaitStrategy {
    blocking: BlockingWaitStrategy,
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            blocking: BlockingWaitStrategy::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &SequenceBarrier,
        timeout: Option<Duration>,
    ) -> WaitOutcome {
        let timeout = timeout.unwrap_or(self.timeout);
        self.blocking
            .wait_until(sequence, cursor, dependents, barrier, Some(Instant::now() + timeout))
    }

    fn signal_all_when_blocking(&self) {
        self.blocking.signal_all_when_blocking();
    }
}
