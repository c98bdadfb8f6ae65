//! Error handling for thread registration.
//!
//! The queue operations themselves are total: `pop` signals emptiness with
//! the `EMPTY` sentinel and internal retries are invisible to callers. The
//! only fallible entry point is [`crate::mem::register`], which validates
//! the caller-assigned thread identity against the compiled-in capacity.

use std::fmt;

/// Result type for registration.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors reported when a thread identity cannot be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The declared worker-set size exceeds the compiled-in slot capacity.
    ThreadLimitExceeded { requested: usize, max: usize },
    /// The thread id does not fall below the declared worker-set size.
    ThreadIdOutOfRange { thread_id: usize, num_threads: usize },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::ThreadLimitExceeded { requested, max } => {
                write!(f, "{requested} threads requested, at most {max} supported")
            }
            RegistryError::ThreadIdOutOfRange {
                thread_id,
                num_threads,
            } => {
                write!(
                    f,
                    "thread id {thread_id} is outside the declared range 0..{num_threads}"
                )
            }
        }
    }
}

impl std::error::Error for RegistryError {}
