//! The payload word shared by all queue variants.
//!
//! Queues move opaque machine words; the caller is responsible for encoding
//! whatever it needs into them. Two bit patterns are reserved as protocol
//! sentinels and must never be pushed.

/// Opaque word-sized payload.
pub type Value = u64;

/// Returned by `pop` when the queue was observed empty. Also the initial
/// content of every slot in a batched node.
pub const EMPTY: Value = 0;

/// Poison written by a batched-queue consumer that reached a slot before its
/// producer. A slot holding `TAKEN` is terminal and is never read again.
pub const TAKEN: Value = u64::MAX;
