use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use column_sketch_arrow::{build_query, init_tracing, load_scan_inputs, DTypeArg, OpArg};
use column_sketch_core::Numeric;
use column_sketch_eval::harness::{append_csv, run_benchmark};

/// Times a full scan against a sketch scan and appends the measurement to a CSV file.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  #[clap(long, help = "Raw column file")]
  base: PathBuf,
  #[clap(long, help = "Sketch file")]
  sketch: PathBuf,
  #[clap(long, help = "Map sidecar file")]
  map: PathBuf,
  #[clap(long, value_enum)]
  dtype: DTypeArg,
  #[clap(long, value_enum)]
  op: OpArg,
  #[clap(long)]
  v1: u64,
  #[clap(long, help = "Second bound, required for between")]
  v2: Option<u64>,
  #[clap(long, help = "CSV file the result row is appended to")]
  csv: PathBuf,
}

fn main() -> Result<()> {
  init_tracing();
  let args = Args::parse();
  match args.dtype {
    DTypeArg::U32 => run::<u32>(&args),
    DTypeArg::U64 => run::<u64>(&args),
  }
}

fn run<T: Numeric>(args: &Args) -> Result<()> {
  let query = build_query(args.op, args.v1, args.v2)?;
  let inputs = load_scan_inputs::<T>(&args.base, &args.sketch, &args.map)?;

  let record = run_benchmark(&inputs.base, &inputs.loaded.map, &inputs.sketch, &query)?;
  append_csv(&args.csv, &record)?;

  println!(
    "rows={} matches={} full_ms={:.3} sketch_ms={:.3} speedup={:.2}x",
    record.rows, record.matches, record.time_full_ms, record.time_sketch_ms, record.speedup
  );
  println!("appended to {}", args.csv.display());
  Ok(())
}
