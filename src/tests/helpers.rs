//! Shared harness for the concurrent queue scenarios.

use std::sync::Arc;
use std::thread;

use portable_atomic::{AtomicUsize, Ordering};

use crate::mem::register;
use crate::queue::MpmcQueue;
use crate::value::{Value, EMPTY};

/// Tag layout: producer id (plus one, so no tag ever equals `EMPTY`) in the
/// high word, per-producer sequence number in the low word.
const SEQ_BITS: u32 = 32;
const SEQ_MASK: u64 = (1 << SEQ_BITS) - 1;

pub(crate) fn tag(producer: usize, seq: u64) -> Value {
    debug_assert!(seq <= SEQ_MASK);
    ((producer as u64 + 1) << SEQ_BITS) | seq
}

pub(crate) fn producer_of(value: Value) -> usize {
    (value >> SEQ_BITS) as usize - 1
}

pub(crate) fn seq_of(value: Value) -> u64 {
    value & SEQ_MASK
}

/// Runs `producers` pushing threads against `consumers` popping threads and
/// returns each consumer's pop log, in pop order.
///
/// Worker `i` registers as thread id `i` (consumers after producers);
/// consumers poll until the combined logs account for every produced value.
pub(crate) fn run_producers_consumers<Q>(
    queue: Q,
    producers: usize,
    consumers: usize,
    per_producer: u64,
) -> Vec<Vec<Value>>
where
    Q: MpmcQueue + Send + Sync + 'static,
{
    let queue = Arc::new(queue);
    let num_threads = producers + consumers;
    let total = producers as u64 * per_producer;
    let consumed = Arc::new(AtomicUsize::new(0));

    let producer_handles: Vec<_> = (0..producers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                register(id, num_threads).expect("producer registration");
                for seq in 0..per_producer {
                    queue.push(tag(id, seq));
                }
            })
        })
        .collect();

    let consumer_handles: Vec<_> = (0..consumers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let consumed = Arc::clone(&consumed);
            thread::spawn(move || {
                register(producers + id, num_threads).expect("consumer registration");
                let mut log = Vec::new();
                while (consumed.load(Ordering::SeqCst) as u64) < total {
                    let value = queue.pop();
                    if value == EMPTY {
                        thread::yield_now();
                        continue;
                    }
                    consumed.fetch_add(1, Ordering::SeqCst);
                    log.push(value);
                }
                log
            })
        })
        .collect();

    for handle in producer_handles {
        handle.join().expect("producer panicked");
    }
    consumer_handles
        .into_iter()
        .map(|handle| handle.join().expect("consumer panicked"))
        .collect()
}

/// Within each consumer's log, every producer's sequence numbers must be
/// strictly increasing.
pub(crate) fn assert_fifo_per_producer(logs: &[Vec<Value>], producers: usize) {
    for log in logs {
        let mut last_seq = vec![None; producers];
        for &value in log {
            let producer = producer_of(value);
            let seq = seq_of(value);
            if let Some(previous) = last_seq[producer] {
                assert!(
                    previous < seq,
                    "producer {producer} reordered: saw {seq} after {previous}"
                );
            }
            last_seq[producer] = Some(seq);
        }
    }
}

/// The union of the logs must be every produced tag, exactly once.
pub(crate) fn assert_exact_multiset(logs: &[Vec<Value>], producers: usize, per_producer: u64) {
    let mut observed: Vec<Value> = logs.iter().flatten().copied().collect();
    observed.sort_unstable();
    let mut expected: Vec<Value> = (0..producers)
        .flat_map(|producer| (0..per_producer).map(move |seq| tag(producer, seq)))
        .collect();
    expected.sort_unstable();
    assert_eq!(observed, expected);
}
