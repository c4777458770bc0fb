//! This crate implements evaluation infrastructures for the project, including:
//! - the full-scan baseline every sketch scan is checked and timed against
//! - a micro benchmark harness that appends its measurements to a CSV file
//! - synthetic data generators

pub mod harness;
pub mod util;

use column_sketch_core::{BitVector, Numeric, QuerySpec};

/// Algorithm: full linear scan over the raw column
/// * `original_input`: original input values
/// * `query`: predicate evaluated on every row
pub fn naive_scan<T: Numeric>(original_input: &[T], query: &QuerySpec) -> BitVector {
  original_input
    .iter()
    .map(|value| query.matches(value.widen()))
    .collect()
}
