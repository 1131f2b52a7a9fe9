//! Single Producer Single Consumer (SPSC) Benchmarks
//!
//! One producer publishes bursts into a ring buffer drained by one batch
//! processor, for each wait strategy. A baseline of plain atomic stores shows
//! the cost of the hand-off itself.

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ringseq::disruptor::{
    BatchEventProcessor, ClaimStrategyOption, DefaultEventFactory, EventHandler, EventProcessor,
    ProcessorThread, Publisher, Result as DisruptorResult, RingBuffer, Sequencer, ThreadContext,
    TimeConfig, WaitStrategyOption,
};

const BUFFER_SIZE: usize = 1024;
const BURST_SIZES: [u64; 3] = [1, 100, 1000];
const WAIT_STRATEGIES: [(&str, WaitStrategyOption); 4] = [
    ("BusySpin", WaitStrategyOption::BusySpin),
    ("Yielding", WaitStrategyOption::Yielding),
    ("Sleeping", WaitStrategyOption::Sleeping),
    ("Blocking", WaitStrategyOption::Blocking),
];

#[derive(Debug, Default, Clone, Copy)]
struct BenchmarkEvent {
    value: i64,
}

/// Event handler that counts processed events
struct CountingSink {
    counter: Arc<AtomicI64>,
}

impl EventHandler<BenchmarkEvent> for CountingSink {
    fn on_event(
        &mut self,
        event: Option<&BenchmarkEvent>,
        _sequence: i64,
        _end_of_batch: bool,
    ) -> DisruptorResult<()> {
        if let Some(event) = event {
            black_box(event.value);
            self.counter.fetch_add(1, Ordering::Release);
        }
        Ok(())
    }
}

/// Baseline measurement to determine overhead
fn baseline_measurement(group: &mut BenchmarkGroup<WallTime>, burst_size: u64) {
    let sink = Arc::new(AtomicI64::new(0));

    group.throughput(Throughput::Elements(burst_size));
    group.bench_function(BenchmarkId::new("baseline", burst_size), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for i in 1..=burst_size {
                    sink.store(black_box(i as i64), Ordering::Release);
                }
                while sink.load(Ordering::Acquire) != burst_size as i64 {}
            }
            start.elapsed()
        })
    });
}

fn benchmark_wait_strategy(
    group: &mut BenchmarkGroup<WallTime>,
    name: &str,
    wait_strategy: WaitStrategyOption,
    burst_size: u64,
) {
    let sequencer = Arc::new(
        Sequencer::new(
            BUFFER_SIZE,
            ClaimStrategyOption::SingleThreaded,
            wait_strategy,
            TimeConfig::default(),
        )
        .unwrap(),
    );
    let ring_buffer = Arc::new(
        RingBuffer::new(BUFFER_SIZE, DefaultEventFactory::<BenchmarkEvent>::new()).unwrap(),
    );
    let counter = Arc::new(AtomicI64::new(0));
    let processor = Arc::new(BatchEventProcessor::new(
        Arc::clone(&ring_buffer),
        sequencer.new_barrier(vec![]),
        CountingSink {
            counter: Arc::clone(&counter),
        },
    ));
    sequencer.set_gating_sequences(vec![processor.sequence()]);
    let consumer = ProcessorThread::spawn(processor, ThreadContext::new()).unwrap();
    let mut publisher = Publisher::new(ring_buffer, sequencer).unwrap();

    group.throughput(Throughput::Elements(burst_size));
    group.bench_function(BenchmarkId::new(name, burst_size), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                counter.store(0, Ordering::Release);
                for i in 1..=burst_size {
                    publisher.publish(|event, _| event.value = black_box(i as i64));
                }
                while counter.load(Ordering::Acquire) < burst_size as i64 {
                    std::hint::spin_loop();
                }
            }
            start.elapsed()
        })
    });

    consumer.halt_and_join().unwrap();
}

fn spsc_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("SPSC");
    group.measurement_time(Duration::from_secs(5));

    for burst_size in BURST_SIZES {
        baseline_measurement(&mut group, burst_size);
        for (name, wait_strategy) in WAIT_STRATEGIES {
            benchmark_wait_strategy(&mut group, name, wait_strategy, burst_size);
        }
    }

    group.finish();
}

criterion_group!(benches, spsc_benchmark);
criterion_main!(benches);
