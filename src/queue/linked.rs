//! Michael–Scott lock-free linked queue, one element per node.

use std::ptr;

use crossbeam_utils::CachePadded;
use portable_atomic::{AtomicPtr, Ordering};

use super::MpmcQueue;
use crate::mem::HazardRegistry;
use crate::value::{Value, EMPTY, TAKEN};

pub(crate) struct Node {
    next: AtomicPtr<Node>,
    item: Value,
}

impl Node {
    fn boxed(item: Value) -> *mut Node {
        Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            item,
        }))
    }
}

/// Lock-free MPMC FIFO backed by a singly linked list.
///
/// A sentinel node is always reachable as head; its item is already
/// consumed. The tail pointer may lag one node behind the true last node
/// and is fixed opportunistically by whichever thread notices.
///
/// ```
/// use nonblocking_queues::{mem, LinkedQueue, EMPTY};
///
/// mem::register(0, 1)?;
/// let queue = LinkedQueue::new();
/// queue.push(7);
/// assert_eq!(queue.pop(), 7);
/// assert_eq!(queue.pop(), EMPTY);
/// # Ok::<(), nonblocking_queues::RegistryError>(())
/// ```
pub struct LinkedQueue {
    head: CachePadded<AtomicPtr<Node>>,
    tail: CachePadded<AtomicPtr<Node>>,
    pub(crate) hazards: HazardRegistry<Node>,
}

impl LinkedQueue {
    /// Creates an empty queue holding only the sentinel.
    pub fn new() -> Self {
        let sentinel = Node::boxed(EMPTY);
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            hazards: HazardRegistry::new(),
        }
    }

    /// Appends `item` at the tail.
    ///
    /// Linearizes at the successful CAS installing the new node as the
    /// tail's successor.
    pub fn push(&self, item: Value) {
        debug_assert!(item != EMPTY && item != TAKEN);
        let node = Node::boxed(item);
        loop {
            let tail = self.hazards.protect(&self.tail);
            // Protection makes the next-field read safe.
            let next = unsafe { &(*tail).next };
            let observed = next.load(Ordering::Acquire);
            if !observed.is_null() {
                // Lagging tail: help it forward and retry.
                let _ = self.tail.compare_exchange(
                    tail,
                    observed,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                self.hazards.clear();
                continue;
            }
            if next
                .compare_exchange(ptr::null_mut(), node, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let _ =
                    self.tail
                        .compare_exchange(tail, node, Ordering::AcqRel, Ordering::Acquire);
                self.hazards.clear();
                return;
            }
            self.hazards.clear();
        }
    }

    /// Removes and returns the head item, or [`EMPTY`].
    ///
    /// Linearizes at the successful CAS advancing the head pointer.
    pub fn pop(&self) -> Value {
        loop {
            let head = self.hazards.protect(&self.head);
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            if next.is_null() {
                self.hazards.clear();
                return EMPTY;
            }

            // Hand the slot over to `next` before committing: the popped
            // item lives in the new sentinel, which must stay protected
            // past our CAS. `head` itself is only compared against from
            // here on, never dereferenced, so it can go unprotected. The
            // re-validation proves `next` was still reachable after the
            // publication, which makes the hand-over sound.
            self.hazards.publish(next);
            if self.head.load(Ordering::SeqCst) != head {
                continue;
            }

            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let item = unsafe { (*next).item };
                self.hazards.clear();
                // Ours alone now: the CAS unlinked it.
                unsafe { self.hazards.retire(head) };
                return item;
            }
        }
    }

    /// Whether the queue was observed empty, linearized at the read of the
    /// sentinel's successor.
    pub fn is_empty(&self) -> bool {
        let head = self.hazards.protect(&self.head);
        let next = unsafe { (*head).next.load(Ordering::Acquire) };
        self.hazards.clear();
        next.is_null()
    }
}

impl MpmcQueue for LinkedQueue {
    fn push(&self, item: Value) {
        LinkedQueue::push(self, item)
    }

    fn pop(&self) -> Value {
        LinkedQueue::pop(self)
    }

    fn is_empty(&self) -> bool {
        LinkedQueue::is_empty(self)
    }
}

impl Default for LinkedQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LinkedQueue {
    /// Single-threaded teardown: walks the remaining chain, then the
    /// registry's drop frees whatever is still retired.
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let node = unsafe { Box::from_raw(current) };
            current = node.next.load(Ordering::Relaxed);
        }
    }
}
