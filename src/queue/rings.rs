//! Two-lock MPMC FIFO over fixed-size ring nodes; the simple baseline.
//!
//! One mutex per end: producers serialize on the push lock, consumers on
//! the pop lock, and the two only meet on the shared node indices. No
//! hazard pointers are needed here; the pop lock serializes every reader
//! of the head pointer, so an exhausted node can be freed inline.

use std::cell::UnsafeCell;
use std::ptr;

use crossbeam_utils::CachePadded;
use portable_atomic::{AtomicPtr, AtomicUsize, Ordering};
use spin::Mutex;

use super::MpmcQueue;
use crate::value::{Value, EMPTY, TAKEN};

/// Default number of slots per ring node.
pub const RING_SIZE: usize = 1024;

struct Node<const CAP: usize> {
    next: AtomicPtr<Node<CAP>>,
    /// Count of slots filled. Written under the push lock, read by pop
    /// across locks, hence atomic.
    push_idx: AtomicUsize,
    /// Count of slots consumed. Only touched under the pop lock.
    pop_idx: AtomicUsize,
    buffer: [UnsafeCell<Value>; CAP],
}

impl<const CAP: usize> Node<CAP> {
    fn boxed() -> *mut Self {
        Box::into_raw(Box::new(Self {
            next: AtomicPtr::new(ptr::null_mut()),
            push_idx: AtomicUsize::new(0),
            pop_idx: AtomicUsize::new(0),
            buffer: std::array::from_fn(|_| UnsafeCell::new(EMPTY)),
        }))
    }

    /// A node born carrying its first item, for publishing in one step.
    fn boxed_with_first(item: Value) -> *mut Self {
        let node = Self::boxed();
        unsafe {
            *(*node).buffer[0].get() = item;
            (*node).push_idx.store(1, Ordering::Relaxed);
        }
        node
    }
}

/// MPMC FIFO guarded by one mutex per end.
///
/// Threads using this variant need no registration; there is no shared
/// reclamation to coordinate.
///
/// ```
/// use nonblocking_queues::{RingsQueue, EMPTY};
///
/// let queue: RingsQueue = RingsQueue::new();
/// queue.push(3);
/// assert_eq!(queue.pop(), 3);
/// assert_eq!(queue.pop(), EMPTY);
/// ```
pub struct RingsQueue<const CAP: usize = RING_SIZE> {
    /// Advanced only under `pop_lock`.
    head: AtomicPtr<Node<CAP>>,
    /// Advanced only under `push_lock`.
    tail: AtomicPtr<Node<CAP>>,
    push_lock: CachePadded<Mutex<()>>,
    pop_lock: CachePadded<Mutex<()>>,
}

// Nodes are owned by the queue and their cells are only accessed under the
// index protocol: a slot is written once under the push lock before
// `push_idx` publishes it, and read under the pop lock only below the
// published index.
unsafe impl<const CAP: usize> Send for RingsQueue<CAP> {}
unsafe impl<const CAP: usize> Sync for RingsQueue<CAP> {}

impl<const CAP: usize> RingsQueue<CAP> {
    /// Creates an empty queue holding one sentinel ring.
    pub fn new() -> Self {
        let sentinel = Node::boxed();
        Self {
            head: AtomicPtr::new(sentinel),
            tail: AtomicPtr::new(sentinel),
            push_lock: CachePadded::new(Mutex::new(())),
            pop_lock: CachePadded::new(Mutex::new(())),
        }
    }

    /// Appends `item` at the tail, growing a fresh ring when the current
    /// one is full.
    pub fn push(&self, item: Value) {
        debug_assert!(item != EMPTY && item != TAKEN);
        let _guard = self.push_lock.lock();
        let tail = self.tail.load(Ordering::Relaxed);
        let node = unsafe { &*tail };
        let push_idx = node.push_idx.load(Ordering::Relaxed);
        if push_idx < CAP {
            unsafe { *node.buffer[push_idx].get() = item };
            // Publishes the slot write to the consumer side.
            node.push_idx.store(push_idx + 1, Ordering::Release);
        } else {
            let fresh = Node::boxed_with_first(item);
            node.next.store(fresh, Ordering::Release);
            self.tail.store(fresh, Ordering::Release);
        }
    }

    /// Removes and returns the head item, or [`EMPTY`]. Exhausted rings are
    /// freed inline; only this lock holder can still see them.
    pub fn pop(&self) -> Value {
        let _guard = self.pop_lock.lock();
        loop {
            let head = self.head.load(Ordering::Relaxed);
            let node = unsafe { &*head };
            let pop_idx = node.pop_idx.load(Ordering::Relaxed);
            if pop_idx < node.push_idx.load(Ordering::Acquire) {
                let item = unsafe { *node.buffer[pop_idx].get() };
                node.pop_idx.store(pop_idx + 1, Ordering::Relaxed);
                return item;
            }
            let next = node.next.load(Ordering::Acquire);
            if next.is_null() {
                return EMPTY;
            }
            self.head.store(next, Ordering::Relaxed);
            unsafe { drop(Box::from_raw(head)) };
        }
    }

    /// Whether the queue was observed empty: a single ring with every
    /// filled slot consumed.
    pub fn is_empty(&self) -> bool {
        let _guard = self.pop_lock.lock();
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let node = unsafe { &*head };
        ptr::eq(head, tail)
            && node.pop_idx.load(Ordering::Relaxed) == node.push_idx.load(Ordering::Acquire)
    }
}

impl<const CAP: usize> MpmcQueue for RingsQueue<CAP> {
    fn push(&self, item: Value) {
        RingsQueue::push(self, item)
    }

    fn pop(&self) -> Value {
        RingsQueue::pop(self)
    }

    fn is_empty(&self) -> bool {
        RingsQueue::is_empty(self)
    }
}

impl<const CAP: usize> Default for RingsQueue<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> Drop for RingsQueue<CAP> {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let node = unsafe { Box::from_raw(current) };
            current = node.next.load(Ordering::Relaxed);
        }
    }
}
