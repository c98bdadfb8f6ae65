//! Cross-variant concurrent test suites.
//!
//! Unit tests for each component sit in its own module; everything here
//! exercises whole queues from many registered threads at once.

mod helpers;
