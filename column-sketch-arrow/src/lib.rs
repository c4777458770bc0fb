//! This crate holds the command-line tools around column sketch and its integration point with
//! apache parquet:
//! 1. `build_sketch`, `run_query` and `benchmark` operate on raw column files
//! 2. `generate_data` writes synthetic columns
//! 3. `prepare_column` extracts one column of a parquet or CSV table into a raw `u32` column, see [`table`]

pub mod table;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::ValueEnum;
use column_sketch_core::{
  column::read_column, DType, LoadedMap, MapSidecar, Numeric, QuerySpec, Sketch,
};
use column_sketch_eval::util::DataDistribution;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub const SKETCH_SUFFIX: &str = ".sketch";
pub const MAP_SUFFIX: &str = ".map.json";

/// Log to stderr, filtered by `RUST_LOG` and defaulting to `info`.
pub fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DTypeArg {
  U32,
  U64,
}

impl From<DTypeArg> for DType {
  fn from(arg: DTypeArg) -> Self {
    match arg {
      DTypeArg::U32 => DType::U32,
      DTypeArg::U64 => DType::U64,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OpArg {
  Lt,
  Eq,
  Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DistArg {
  Uniform,
  Normal,
  Beta,
}

impl From<DistArg> for DataDistribution {
  fn from(arg: DistArg) -> Self {
    match arg {
      DistArg::Uniform => DataDistribution::Uniform,
      DistArg::Normal => DataDistribution::Normal,
      DistArg::Beta => DataDistribution::Beta,
    }
  }
}

/// Turn command-line operator and bounds into a query. `between` needs `v2` and accepts the
/// bounds in either order.
pub fn build_query(op: OpArg, v1: u64, v2: Option<u64>) -> Result<QuerySpec> {
  Ok(match op {
    OpArg::Lt => QuerySpec::Lt(v1),
    OpArg::Eq => QuerySpec::Eq(v1),
    OpArg::Between => match v2 {
      Some(v2) => QuerySpec::between(v1, v2),
      None => bail!("--v2 is required for between"),
    },
  })
}

/// Append `suffix` to `base` unless it already ends with it.
pub fn with_suffix(base: &str, suffix: &str) -> PathBuf {
  if base.ends_with(suffix) {
    PathBuf::from(base)
  } else {
    PathBuf::from(format!("{base}{suffix}"))
  }
}

/// A raw column with its sketch and compression map, ready to be scanned.
pub struct ScanInputs<T> {
  pub base: Vec<T>,
  pub loaded: LoadedMap,
  pub sketch: Sketch,
}

/// Load everything a scan needs. The sketch is read with the code width recorded in the sidecar.
pub fn load_scan_inputs<T: Numeric>(
  base: &Path,
  sketch: &Path,
  map: &Path,
) -> Result<ScanInputs<T>> {
  let loaded = MapSidecar::load(map)?;
  if loaded.dtype != T::DTYPE {
    warn!(cli = %T::DTYPE, map = %loaded.dtype, "dtype mismatch");
  }

  let base: Vec<T> = read_column(base)?;
  let sketch = Sketch::load(sketch, loaded.code_width, base.len())?;
  Ok(ScanInputs {
    base,
    loaded,
    sketch,
  })
}
