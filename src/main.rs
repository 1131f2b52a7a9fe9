//! ringseq - pipeline demo and throughput check
//!
//! Runs a two-stage pipeline over one ring buffer: a summing stage reads every
//! event as soon as it is published, and an auditing stage runs behind it and
//! checks that events arrive in sequence order. Producers, buffer size and
//! strategies come from the command line or a JSON config file.

use anyhow::{bail, Context};
use clap::Parser;
use ringseq::disruptor::{
    BatchEventProcessor, ClaimStrategyOption, DefaultEventFactory, DisruptorConfig,
    DisruptorError, EventHandler, EventProcessor, ProcessorThread, Publisher, RingBuffer,
    Sequencer, ThreadContext, WaitStrategyOption,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "ringseq")]
#[command(about = "Run a two-stage ring buffer pipeline and report its throughput")]
#[command(version)]
pub struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ring buffer size (rounded up to a power of 2)
    #[arg(short, long)]
    pub buffer_size: Option<usize>,

    /// Claim strategy: single-threaded or multi-threaded
    #[arg(long)]
    pub claim_strategy: Option<ClaimStrategyOption>,

    /// Wait strategy: busy-spin, yielding, sleeping, blocking or timeout-blocking
    #[arg(short, long)]
    pub wait_strategy: Option<WaitStrategyOption>,

    /// Number of producer threads
    #[arg(short, long, default_value_t = 1)]
    pub producers: usize,

    /// Events published by each producer
    #[arg(short, long, default_value_t = 1_000_000)]
    pub events: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Default)]
struct ValueEvent {
    producer: usize,
    value: i64,
}

/// First stage: sums every value it sees
struct SummingHandler {
    total: Arc<AtomicI64>,
    batches: u64,
    idle_ticks: u64,
}

impl EventHandler<ValueEvent> for SummingHandler {
    fn on_event(
        &mut self,
        event: Option<&ValueEvent>,
        _sequence: i64,
        end_of_batch: bool,
    ) -> ringseq::Result<()> {
        match event {
            Some(event) => {
                self.total.fetch_add(event.value, Ordering::Relaxed);
            }
            None => self.idle_ticks += 1,
        }
        if end_of_batch {
            self.batches += 1;
        }
        Ok(())
    }

    fn on_shutdown(&mut self) -> ringseq::Result<()> {
        debug!(
            batches = self.batches,
            idle_ticks = self.idle_ticks,
            "summing stage stopped"
        );
        Ok(())
    }
}

/// Second stage: checks each producer's values arrive in the order it sent them
struct AuditingHandler {
    last_value: Vec<i64>,
    violations: Arc<AtomicI64>,
}

impl EventHandler<ValueEvent> for AuditingHandler {
    fn on_event(
        &mut self,
        event: Option<&ValueEvent>,
        sequence: i64,
        _end_of_batch: bool,
    ) -> ringseq::Result<()> {
        let Some(event) = event else {
            return Ok(());
        };
        let last = &mut self.last_value[event.producer];
        if event.value != *last + 1 {
            self.violations.fetch_add(1, Ordering::Relaxed);
            return Err(DisruptorError::handler(format!(
                "producer {} sent {} after {} at sequence {sequence}",
                event.producer, event.value, *last
            )));
        }
        *last = event.value;
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = load_config(&args)?;
    if args.producers == 0 {
        bail!("at least one producer is required");
    }
    if args.producers > 1 && config.claim_strategy == ClaimStrategyOption::SingleThreaded {
        bail!("{} producers need the multi-threaded claim strategy", args.producers);
    }

    info!(
        buffer_size = config.buffer_size,
        claim_strategy = ?config.claim_strategy,
        wait_strategy = ?config.wait_strategy,
        producers = args.producers,
        events = args.events,
        "starting pipeline"
    );

    run_pipeline(&config, args.producers, args.events)
}

/// Initialize logging, letting `RUST_LOG` override the command line level
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level: {level}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .init();

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<DisruptorConfig> {
    let mut config = match &args.config {
        Some(path) => DisruptorConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => DisruptorConfig::default(),
    };

    if let Some(buffer_size) = args.buffer_size {
        config.buffer_size = buffer_size;
    }
    if let Some(claim_strategy) = args.claim_strategy {
        config.claim_strategy = claim_strategy;
    }
    if let Some(wait_strategy) = args.wait_strategy {
        config.wait_strategy = wait_strategy;
    }
    config.validate()?;
    Ok(config)
}

fn run_pipeline(config: &DisruptorConfig, producers: usize, events: u64) -> anyhow::Result<()> {
    let sequencer = Arc::new(Sequencer::from_config(config)?);
    let ring_buffer = Arc::new(RingBuffer::new(
        config.buffer_size,
        DefaultEventFactory::<ValueEvent>::new(),
    )?);

    let total = Arc::new(AtomicI64::new(0));
    let violations = Arc::new(AtomicI64::new(0));

    let summing = Arc::new(
        BatchEventProcessor::new(
            Arc::clone(&ring_buffer),
            sequencer.new_barrier(vec![]),
            SummingHandler {
                total: Arc::clone(&total),
                batches: 0,
                idle_ticks: 0,
            },
        )
        .with_time_config(&config.time),
    );
    let auditing = Arc::new(BatchEventProcessor::new(
        Arc::clone(&ring_buffer),
        sequencer.new_barrier(vec![summing.sequence()]),
        AuditingHandler {
            last_value: vec![0; producers],
            violations: Arc::clone(&violations),
        },
    ));
    sequencer.set_gating_sequences(vec![auditing.sequence()]);

    let summing_thread = ProcessorThread::spawn(
        Arc::clone(&summing),
        ThreadContext::new().thread_name("summing"),
    )?;
    let auditing_thread = ProcessorThread::spawn(
        Arc::clone(&auditing),
        ThreadContext::new().thread_name("auditing"),
    )?;

    let started = Instant::now();
    let producer_threads = (0..producers)
        .map(|producer| {
            let mut publisher = Publisher::new(Arc::clone(&ring_buffer), Arc::clone(&sequencer))?;
            thread::Builder::new()
                .name(format!("producer-{producer}"))
                .spawn(move || {
                    for value in 1..=events as i64 {
                        publisher.publish(|event, _sequence| {
                            event.producer = producer;
                            event.value = value;
                        });
                    }
                })
                .context("failed to spawn producer thread")
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    for handle in producer_threads {
        if handle.join().is_err() {
            bail!("producer thread panicked");
        }
    }

    let last_sequence = (events * producers as u64) as i64 - 1;
    while auditing.sequence().get() < last_sequence {
        thread::yield_now();
    }
    let elapsed = started.elapsed();

    summing_thread.halt_and_join()?;
    auditing_thread.halt_and_join()?;

    let published = last_sequence + 1;
    let expected_total = producers as i64 * (events as i64 * (events as i64 + 1) / 2);
    let throughput = published as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        published,
        elapsed_ms = elapsed.as_millis() as u64,
        ops_per_sec = throughput as u64,
        "pipeline drained"
    );

    if total.load(Ordering::Relaxed) != expected_total {
        bail!(
            "summing stage saw {} instead of {expected_total}",
            total.load(Ordering::Relaxed)
        );
    }
    let violations = violations.load(Ordering::Relaxed);
    if violations != 0 {
        bail!("auditing stage found {violations} out-of-order events");
    }

    println!("{published} events in {elapsed:?} ({throughput:.0} ops/sec)");
    Ok(())
}
