#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Multi-producer multi-consumer FIFO queues for a bounded set of worker
//! threads.
//!
//! Three variants share one abstract contract (push, pop, is_empty) and
//! differ in their concurrency strategy:
//!
//! - [`LinkedQueue`]: classical Michael–Scott lock-free linked queue, one
//!   element per node, CAS-based at both ends.
//! - [`BatchedQueue`]: lock-free queue whose nodes are fixed-size slot
//!   arrays; slot reservation by fetch-add amortizes allocation.
//! - [`RingsQueue`]: two-lock queue over ring-style nodes, the simple
//!   baseline.
//!
//! The lock-free variants reclaim unlinked nodes through a hazard-pointer
//! registry ([`mem`]): every worker thread declares a small dense identity
//! once via [`mem::register`] and from then on publishes the node it is
//! about to dereference, so no other thread frees it underneath.
//!
//! # Quick Start
//!
//! ```
//! use nonblocking_queues::{mem, LinkedQueue, MpmcQueue, EMPTY};
//!
//! // One-time identity per worker thread: (thread_id, num_threads).
//! mem::register(0, 1)?;
//!
//! let queue = LinkedQueue::new();
//! queue.push(10);
//! queue.push(20);
//! assert_eq!(queue.pop(), 10);
//! assert_eq!(queue.pop(), 20);
//! assert_eq!(queue.pop(), EMPTY);
//! # Ok::<(), nonblocking_queues::RegistryError>(())
//! ```
//!
//! # Payloads
//!
//! Queues move opaque [`Value`] words. Two bit patterns are reserved:
//! [`EMPTY`] signals "queue observed empty" from `pop`, and [`TAKEN`] is
//! the batched queue's slot poison. Pushing either is a contract violation.

// Core modules
pub mod errors;
pub mod mem;
pub mod queue;
pub mod value;

#[cfg(test)]
mod tests;

// ============================================================================
// Public API
// ============================================================================

// Queue variants and their shared contract
pub use queue::{BatchedQueue, LinkedQueue, MpmcQueue, RingsQueue, BUFFER_SIZE, RING_SIZE};

// Payload protocol
pub use value::{Value, EMPTY, TAKEN};

// Reclamation surface
pub use mem::{register, HazardRegistry, MAX_THREADS, RETIRED_THRESHOLD};

// Errors
pub use errors::{RegistryError, RegistryResult};
