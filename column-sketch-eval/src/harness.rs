//! Times a sketch scan against the full scan and records the outcome as one CSV row.

use std::{
  fs::{self, OpenOptions},
  path::Path,
  time::Instant,
};

use anyhow::Result;
use column_sketch_core::{scan, CompressionMap, Numeric, QuerySpec, Sketch};
use serde::Serialize;
use tracing::{debug, warn};

use crate::naive_scan;

/// One benchmark measurement. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchRecord {
  pub op: String,
  pub dtype: String,
  pub rows: u64,
  /// Match count of the full scan.
  pub matches: u64,
  pub v1: u64,
  /// Upper bound of a `between`, 0 otherwise.
  pub v2: u64,
  pub code_bits: u32,
  pub time_full_ms: f64,
  pub time_sketch_ms: f64,
  pub speedup: f64,
}

/// Run `query` once with the sketch as a warm-up, then time the full scan and the sketch scan.
///
/// A match count mismatch between the two is logged, not returned as an error.
pub fn run_benchmark<T: Numeric>(
  base: &[T],
  map: &CompressionMap,
  sketch: &Sketch,
  query: &QuerySpec,
) -> Result<BenchRecord> {
  scan(map, sketch, base, query)?;

  let start = Instant::now();
  let full = naive_scan(base, query);
  let time_full_ms = start.elapsed().as_secs_f64() * 1e3;

  let start = Instant::now();
  let sketched = scan(map, sketch, base, query)?;
  let time_sketch_ms = start.elapsed().as_secs_f64() * 1e3;

  let matches_full = full.count();
  let matches_sketch = sketched.count();
  if matches_full != matches_sketch {
    warn!(
      full = matches_full,
      sketch = matches_sketch,
      %query,
      "count mismatch"
    );
  }

  let (v1, v2) = match *query {
    QuerySpec::Lt(v) | QuerySpec::Eq(v) => (v, 0),
    QuerySpec::Between(low, high) => (low, high),
  };
  let speedup = if time_sketch_ms > 0.0 {
    time_full_ms / time_sketch_ms
  } else {
    0.0
  };
  debug!(time_full_ms, time_sketch_ms, "benchmark finished");

  Ok(BenchRecord {
    op: query.op_name().to_string(),
    dtype: T::DTYPE.to_string(),
    rows: base.len() as u64,
    matches: matches_full,
    v1,
    v2,
    code_bits: sketch.width().bits(),
    time_full_ms,
    time_sketch_ms,
    speedup,
  })
}

/// Append `record` to the CSV file at `path`, writing the header first if the file is new or empty.
pub fn append_csv(path: impl AsRef<Path>, record: &BenchRecord) -> Result<()> {
  let path = path.as_ref();
  let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
  let file = OpenOptions::new().create(true).append(true).open(path)?;

  let mut writer = csv::WriterBuilder::new()
    .has_headers(needs_header)
    .from_writer(file);
  writer.serialize(record)?;
  writer.flush()?;
  Ok(())
}
