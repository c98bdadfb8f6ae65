//! Safe memory reclamation for the lock-free queues.
//!
//! Provides thread identity registration and the hazard-pointer registry
//! that lets a bounded set of worker threads dereference shared nodes
//! without racing reclamation.

pub mod hazard;
pub(crate) mod retired;

pub use hazard::HazardRegistry;

use std::cell::Cell;

use portable_atomic::{AtomicUsize, Ordering};

use crate::errors::{RegistryError, RegistryResult};

/// Maximum number of threads that may ever register.
pub const MAX_THREADS: usize = 128;

/// Default retired-list length that triggers a reclamation scan.
pub const RETIRED_THRESHOLD: usize = 64;

const UNREGISTERED: usize = usize::MAX;

thread_local! {
    /// Small dense index assigned by `register`; indexes every registry's
    /// slot and retired arrays.
    static THREAD_ID: Cell<usize> = const { Cell::new(UNREGISTERED) };
}

/// Upper bound on registered thread ids, across every worker set in the
/// process. Only ever grows, so a scan may examine a few idle slots but can
/// never skip a live one.
static NUM_THREADS: AtomicUsize = AtomicUsize::new(0);

/// Assigns the calling thread its identity for all subsequent queue use.
///
/// `thread_id` must be unique among the concurrently active workers and
/// satisfy `thread_id < num_threads <= MAX_THREADS`. Call once per thread
/// before the first queue operation; re-registering from the same thread
/// simply overwrites the identity.
pub fn register(thread_id: usize, num_threads: usize) -> RegistryResult<()> {
    if num_threads > MAX_THREADS {
        return Err(RegistryError::ThreadLimitExceeded {
            requested: num_threads,
            max: MAX_THREADS,
        });
    }
    if thread_id >= num_threads {
        return Err(RegistryError::ThreadIdOutOfRange {
            thread_id,
            num_threads,
        });
    }
    THREAD_ID.with(|id| id.set(thread_id));
    NUM_THREADS.fetch_max(num_threads, Ordering::SeqCst);
    Ok(())
}

/// Identity of the calling thread.
///
/// # Panics
///
/// Panics if the thread never called [`register`]; touching a lock-free
/// queue from an unregistered thread would otherwise be unsound.
pub(crate) fn current_thread_id() -> usize {
    let id = THREAD_ID.with(Cell::get);
    assert!(
        id != UNREGISTERED,
        "thread is not registered; call mem::register(thread_id, num_threads) first"
    );
    id
}

/// Number of hazard slots a scan has to examine.
pub(crate) fn known_threads() -> usize {
    NUM_THREADS.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_validates_the_bounds() {
        assert_eq!(
            register(0, MAX_THREADS + 1),
            Err(RegistryError::ThreadLimitExceeded {
                requested: MAX_THREADS + 1,
                max: MAX_THREADS,
            })
        );
        assert_eq!(
            register(4, 4),
            Err(RegistryError::ThreadIdOutOfRange {
                thread_id: 4,
                num_threads: 4,
            })
        );
        assert!(register(3, 4).is_ok());
        // Re-registering the same thread is allowed.
        assert!(register(0, 4).is_ok());
    }
}
