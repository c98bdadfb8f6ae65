//! Per-thread lists of retired nodes awaiting reclamation.
//!
//! A node is retired when it has been unlinked from a queue but may still be
//! referenced by a thread that protected it. Each thread appends only to its
//! own list, so the mutex below is effectively uncontended; it exists so the
//! single-threaded finalizer can drain lists left behind by exited workers.

use spin::Mutex;

/// Bounded-growth list of unlinked nodes owned by one thread.
pub(crate) struct RetiredList<N> {
    nodes: Mutex<Vec<*mut N>>,
}

// The raw pointers are owned: every entry came from `Box::into_raw` and is
// reachable from exactly one retired list until it is freed here.
unsafe impl<N: Send> Send for RetiredList<N> {}
unsafe impl<N: Send> Sync for RetiredList<N> {}

impl<N> RetiredList<N> {
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
        }
    }

    /// Appends `ptr` and returns the new length.
    pub(crate) fn push(&self, ptr: *mut N) -> usize {
        let mut nodes = self.nodes.lock();
        nodes.push(ptr);
        nodes.len()
    }

    /// Frees every entry for which `protected` reports false, compacting the
    /// list in place. Returns the number of nodes freed.
    ///
    /// Must only be called by the owning thread (or the finalizer after
    /// quiescence): entries removed here are dropped immediately.
    pub(crate) fn sweep(&self, protected: impl Fn(*mut N) -> bool) -> usize {
        let mut nodes = self.nodes.lock();
        let before = nodes.len();
        nodes.retain(|&ptr| {
            if protected(ptr) {
                return true;
            }
            // No hazard slot holds this node, so we are the last referent.
            unsafe { drop(Box::from_raw(ptr)) };
            false
        });
        before - nodes.len()
    }

    /// Frees every remaining entry unconditionally. Exclusive access via
    /// `&mut self` guarantees no thread can still be protecting them.
    pub(crate) fn drain_all(&mut self) -> usize {
        let nodes = self.nodes.get_mut();
        let count = nodes.len();
        for ptr in nodes.drain(..) {
            unsafe { drop(Box::from_raw(ptr)) };
        }
        count
    }
}
