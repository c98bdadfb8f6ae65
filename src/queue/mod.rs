//! The three MPMC FIFO queue variants and their shared contract.

pub mod batched;
pub mod linked;
pub mod rings;

pub use batched::{BatchedQueue, BUFFER_SIZE};
pub use linked::LinkedQueue;
pub use rings::{RingsQueue, RING_SIZE};

use crate::value::Value;

/// The abstract contract every variant implements.
///
/// All three operations are safe to call from any number of registered
/// threads concurrently. `pop` signals emptiness with [`crate::EMPTY`]
/// rather than blocking; `is_empty` is a conservative snapshot, linearized
/// at its internal read of the head node.
pub trait MpmcQueue {
    /// Appends `item` at the tail. `item` must not be one of the sentinels.
    fn push(&self, item: Value);

    /// Removes and returns the item at the head, or [`crate::EMPTY`] if the
    /// queue was observed empty.
    fn pop(&self) -> Value;

    /// Whether the queue was observed empty.
    fn is_empty(&self) -> bool;
}
