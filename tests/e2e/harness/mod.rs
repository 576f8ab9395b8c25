//! E2E test harness for the depot.
//!
//! This module contains test infrastructure with builders, variants, and
//! methods shared across scenarios; not every scenario uses all of them.

#![allow(dead_code)]

pub mod runner;
pub mod scenario;
pub mod steps;

// Re-export commonly used types
pub use assertions::Assertion;
pub use scenario::Scenario;
