//! Test utilities
//!
//! Fixtures shared by unit tests, integration tests and benches. Panics on setup failure.

pub mod fixtures;

pub use fixtures::*;
