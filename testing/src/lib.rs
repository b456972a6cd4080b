//! # Statefold Testing
//!
//! Testing utilities for the statefold state-container engine.
//!
//! - [`ReducerTest`]: a fluent Given-When-Then harness for reducers
//! - [`StateRecorder`] / [`ActionRecorder`]: subscriber sinks collecting
//!   emission sequences for order and deduplication assertions

#![allow(clippy::module_name_repetitions)]

pub mod recorder;
pub mod reducer_test;

pub use recorder::{ActionRecorder, StateRecorder};
pub use reducer_test::ReducerTest;
