//! Lock-free MPMC FIFO over nodes of `CAP` slots each.
//!
//! Per-element allocation is what hurts the linked queue under load;
//! grouping slots into fixed-size nodes amortizes it. The price is a
//! slot-level protocol: producers and consumers claim indices with
//! fetch-add on separate counters, and a consumer that overtakes its
//! producer poisons the slot with `TAKEN` so the producer moves on.

use std::ptr;

use crossbeam_utils::CachePadded;
use portable_atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};

use super::MpmcQueue;
use crate::mem::HazardRegistry;
use crate::value::{Value, EMPTY, TAKEN};

/// Default number of slots per node.
pub const BUFFER_SIZE: usize = 1024;

struct Node<const CAP: usize> {
    buffer: [AtomicU64; CAP],
    /// Next index a producer may claim; at `CAP` and beyond the node is
    /// sealed and pushes go to a successor.
    push_idx: AtomicUsize,
    /// Next index a consumer may claim.
    pop_idx: AtomicUsize,
    next: AtomicPtr<Node<CAP>>,
}

impl<const CAP: usize> Node<CAP> {
    fn boxed() -> *mut Self {
        Box::into_raw(Box::new(Self {
            buffer: std::array::from_fn(|_| AtomicU64::new(EMPTY)),
            push_idx: AtomicUsize::new(0),
            pop_idx: AtomicUsize::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Lock-free MPMC FIFO whose nodes carry `CAP` slots.
///
/// Each slot goes `EMPTY -> value -> TAKEN`, or straight to `TAKEN` when a
/// consumer wins the race for it; either way the slot is terminal once
/// taken. A poisoned slot costs its producer a retry in a later slot but
/// never reorders the values that do land.
pub struct BatchedQueue<const CAP: usize = BUFFER_SIZE> {
    head: CachePadded<AtomicPtr<Node<CAP>>>,
    tail: CachePadded<AtomicPtr<Node<CAP>>>,
    hazards: HazardRegistry<Node<CAP>>,
}

impl<const CAP: usize> BatchedQueue<CAP> {
    /// Creates an empty queue holding one all-`EMPTY` sentinel node.
    pub fn new() -> Self {
        let sentinel = Node::boxed();
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            hazards: HazardRegistry::new(),
        }
    }

    /// Appends `item` at the tail.
    ///
    /// Linearizes at the successful `EMPTY -> item` CAS on the claimed
    /// slot.
    pub fn push(&self, item: Value) {
        debug_assert!(item != EMPTY && item != TAKEN);
        loop {
            let tail = self.hazards.protect(&self.tail);
            let node = unsafe { &*tail };

            let idx = node.push_idx.fetch_add(1, Ordering::AcqRel);
            if idx < CAP {
                if node.buffer[idx]
                    .compare_exchange(EMPTY, item, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.hazards.clear();
                    return;
                }
                // An overtaking consumer poisoned the slot; the index is
                // spent, reserve a fresh one.
                self.hazards.clear();
                continue;
            }

            // Node sealed: link a successor, or help whoever beat us to it.
            let fresh = Node::boxed();
            match node.next.compare_exchange(
                ptr::null_mut(),
                fresh,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let _ = self.tail.compare_exchange(
                        tail,
                        fresh,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                }
                Err(existing) => {
                    // Never shared, free locally.
                    unsafe { drop(Box::from_raw(fresh)) };
                    let _ = self.tail.compare_exchange(
                        tail,
                        existing,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                }
            }
            self.hazards.clear();
        }
    }

    /// Removes and returns the head item, or [`EMPTY`].
    ///
    /// Linearizes at the successful slot claim (the exchange that returns a
    /// non-`EMPTY` value), in increasing slot order within a node.
    pub fn pop(&self) -> Value {
        loop {
            let head = self.hazards.protect(&self.head);
            let node = unsafe { &*head };

            let idx = node.pop_idx.fetch_add(1, Ordering::AcqRel);
            if idx < CAP {
                let value = node.buffer[idx].swap(TAKEN, Ordering::AcqRel);
                if value != EMPTY {
                    self.hazards.clear();
                    return value;
                }
                // The producer reserved this slot but has not written it, or
                // never will; the swap above poisoned it either way. Keep
                // the node protected and claim the next index.
                continue;
            }

            // Every slot in this node is spent; follow the chain.
            let next = node.next.load(Ordering::Acquire);
            if next.is_null() {
                self.hazards.clear();
                return EMPTY;
            }
            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.hazards.clear();
                // Ours alone now: the CAS unlinked it.
                unsafe { self.hazards.retire(head) };
            }
            // Retry on the new head whether or not we advanced it.
        }
    }

    /// Whether the queue was observed empty.
    ///
    /// A single snapshot of the head node: empty iff it has no successor
    /// and consumers have claimed every index producers ever will in it.
    /// Conservative under concurrent pushes, which may not be observable
    /// yet.
    pub fn is_empty(&self) -> bool {
        let head = self.hazards.protect(&self.head);
        let node = unsafe { &*head };
        let pop_idx = node.pop_idx.load(Ordering::Acquire);
        let push_idx = node.push_idx.load(Ordering::Acquire);
        let next = node.next.load(Ordering::Acquire);
        self.hazards.clear();
        next.is_null() && pop_idx >= push_idx.min(CAP)
    }
}

impl<const CAP: usize> MpmcQueue for BatchedQueue<CAP> {
    fn push(&self, item: Value) {
        BatchedQueue::push(self, item)
    }

    fn pop(&self) -> Value {
        BatchedQueue::pop(self)
    }

    fn is_empty(&self) -> bool {
        BatchedQueue::is_empty(self)
    }
}

impl<const CAP: usize> Default for BatchedQueue<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> Drop for BatchedQueue<CAP> {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let node = unsafe { Box::from_raw(current) };
            current = node.next.load(Ordering::Relaxed);
        }
    }
}
