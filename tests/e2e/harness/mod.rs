//! E2E test harness for the event matching engine.
//!
//! This module contains test infrastructure with builders, variants, and
//! methods not every scenario uses.

#![allow(dead_code)]

pub mod clock;
pub mod runner;
pub mod steps;

// Re-export commonly used types
pub use assertions::Assertion;
pub use scenario::Scenario;
