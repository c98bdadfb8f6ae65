//! Hazard-pointer registry: one publication slot per registered thread.
//!
//! Before dereferencing a shared node, a thread publishes the pointer into
//! its slot and re-reads the source location until both agree; from then on
//! no other thread will free that node. Unlinked nodes go through
//! [`HazardRegistry::retire`] and are freed by a scan once the retiring
//! thread's list reaches the threshold and no slot still holds them.

use std::ptr;
use std::sync::atomic::fence;

use crossbeam_utils::CachePadded;
use portable_atomic::{AtomicPtr, AtomicUsize, Ordering};

use super::retired::RetiredList;
use super::{current_thread_id, known_threads, MAX_THREADS, RETIRED_THRESHOLD};

/// Hazard slots and retired lists for one queue instance.
///
/// `N` is the node type being protected; `THRESHOLD` is the retired-list
/// length that triggers a reclamation scan. The worst-case number of
/// unreclaimed nodes is `THRESHOLD * num_threads`.
pub struct HazardRegistry<N, const THRESHOLD: usize = RETIRED_THRESHOLD> {
    /// One publication slot per thread id. Padded: neighbouring threads
    /// write their slots on every protect/clear.
    slots: [CachePadded<AtomicPtr<N>>; MAX_THREADS],
    /// Per-thread lists of unlinked nodes awaiting a scan.
    retired: [RetiredList<N>; MAX_THREADS],
    /// Total nodes freed by scans so far.
    reclaimed: AtomicUsize,
}

impl<N, const THRESHOLD: usize> HazardRegistry<N, THRESHOLD> {
    /// Creates a registry with every slot null and every retired list empty.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| CachePadded::new(AtomicPtr::new(ptr::null_mut()))),
            retired: std::array::from_fn(|_| RetiredList::new()),
            reclaimed: AtomicUsize::new(0),
        }
    }

    /// Publishes `ptr` in the calling thread's slot without validation.
    ///
    /// The caller must separately establish that `ptr` cannot have been
    /// retired before the publication became visible; `protect` is the
    /// self-contained way to do that.
    pub(crate) fn publish(&self, ptr: *mut N) {
        self.slots[current_thread_id()].store(ptr, Ordering::SeqCst);
    }

    /// Reads `src`, publishes the observed pointer, and re-reads until the
    /// two agree. The returned pointer is safe to dereference until the
    /// calling thread clears or overwrites its slot.
    ///
    /// The loop is what makes this sound: between the first load and the
    /// publication the node may already have been retired, and a scan that
    /// ran in that window did not see our slot. A re-read that still returns
    /// the same pointer proves the node was reachable after publication, so
    /// every later scan must observe the slot.
    pub fn protect(&self, src: &AtomicPtr<N>) -> *mut N {
        let slot = &self.slots[current_thread_id()];
        let mut observed = src.load(Ordering::Acquire);
        loop {
            slot.store(observed, Ordering::SeqCst);
            let current = src.load(Ordering::SeqCst);
            if current == observed {
                return observed;
            }
            observed = current;
        }
    }

    /// Nulls the calling thread's slot.
    pub fn clear(&self) {
        self.slots[current_thread_id()].store(ptr::null_mut(), Ordering::Release);
    }

    /// Hands an unlinked node over for deferred reclamation.
    ///
    /// The node is freed by a later scan, once no slot holds it.
    ///
    /// # Safety
    ///
    /// `ptr` must originate from `Box::into_raw`, must be unreachable from
    /// the queue structure from this point on, and must not be retired
    /// twice.
    pub unsafe fn retire(&self, ptr: *mut N) {
        let list = &self.retired[current_thread_id()];
        if list.push(ptr) >= THRESHOLD {
            self.scan(list);
        }
    }

    /// Frees every node in `list` that no slot currently protects.
    fn scan(&self, list: &RetiredList<N>) {
        // Order the scan after all prior slot publications.
        fence(Ordering::SeqCst);
        let in_use = known_threads();
        let freed = list.sweep(|ptr| {
            self.slots[..in_use]
                .iter()
                .any(|slot| slot.load(Ordering::SeqCst) == ptr)
        });
        self.reclaimed.fetch_add(freed, Ordering::Relaxed);
    }

    /// Total number of retired nodes freed so far.
    pub fn reclaimed(&self) -> usize {
        self.reclaimed.load(Ordering::Relaxed)
    }
}

impl<N, const THRESHOLD: usize> Default for HazardRegistry<N, THRESHOLD> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, const THRESHOLD: usize> Drop for HazardRegistry<N, THRESHOLD> {
    /// Finalizes the registry: frees every node still sitting in a retired
    /// list. Exclusive access guarantees quiescence, so no slot can matter.
    fn drop(&mut self) {
        let mut freed = 0;
        for list in &mut self.retired {
            freed += list.drain_all();
        }
        self.reclaimed.fetch_add(freed, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mem::register;

    /// Payload whose drop increments a shared counter, so tests can observe
    /// exactly when the registry frees a node.
    struct Counted {
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counted(drops: &Arc<AtomicUsize>) -> *mut Counted {
        Box::into_raw(Box::new(Counted {
            drops: drops.clone(),
        }))
    }

    #[test]
    fn protect_returns_the_stable_pointer() {
        register(0, 1).unwrap();
        let registry: HazardRegistry<u64> = HazardRegistry::new();
        let node = Box::into_raw(Box::new(17u64));
        let src = AtomicPtr::new(node);

        let protected = registry.protect(&src);
        assert_eq!(protected, node);
        assert_eq!(unsafe { *protected }, 17);

        registry.clear();
        unsafe { drop(Box::from_raw(node)) };
    }

    #[test]
    fn retire_defers_until_threshold() {
        register(0, 1).unwrap();
        let drops = Arc::new(AtomicUsize::new(0));
        let registry: HazardRegistry<Counted, 4> = HazardRegistry::new();

        for _ in 0..3 {
            unsafe { registry.retire(counted(&drops)) };
        }
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(registry.reclaimed(), 0);

        // Fourth retire crosses the threshold and nothing is protected.
        unsafe { registry.retire(counted(&drops)) };
        assert_eq!(drops.load(Ordering::SeqCst), 4);
        assert_eq!(registry.reclaimed(), 4);
    }

    #[test]
    fn scan_spares_protected_nodes() {
        register(0, 1).unwrap();
        let drops = Arc::new(AtomicUsize::new(0));
        let registry: HazardRegistry<Counted, 4> = HazardRegistry::new();

        let pinned = counted(&drops);
        let src = AtomicPtr::new(pinned);
        assert_eq!(registry.protect(&src), pinned);

        unsafe { registry.retire(pinned) };
        for _ in 0..3 {
            unsafe { registry.retire(counted(&drops)) };
        }
        // The scan ran, freed the three unprotected nodes, and kept `pinned`.
        assert_eq!(drops.load(Ordering::SeqCst), 3);
        assert_eq!(registry.reclaimed(), 3);

        registry.clear();
        for _ in 0..3 {
            unsafe { registry.retire(counted(&drops)) };
        }
        // The third retire refills the list to the threshold; `pinned` is no
        // longer protected and rides along.
        assert_eq!(drops.load(Ordering::SeqCst), 7);
        assert_eq!(registry.reclaimed(), 7);
    }

    #[test]
    fn finalize_frees_the_remainder() {
        register(0, 1).unwrap();
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let registry: HazardRegistry<Counted, 64> = HazardRegistry::new();
            for _ in 0..7 {
                unsafe { registry.retire(counted(&drops)) };
            }
            assert_eq!(drops.load(Ordering::SeqCst), 0);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn reclamation_delay_is_bounded() {
        register(0, 1).unwrap();
        let drops = Arc::new(AtomicUsize::new(0));
        let registry: HazardRegistry<Counted, 4> = HazardRegistry::new();

        for _ in 0..100 {
            unsafe { registry.retire(counted(&drops)) };
        }
        let threads = crate::mem::known_threads();
        assert!(registry.reclaimed() >= 100usize.saturating_sub(4 * threads));
    }
}
