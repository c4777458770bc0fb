use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use column_sketch_arrow::{build_query, init_tracing, load_scan_inputs, DTypeArg, OpArg};
use column_sketch_core::{scan, Numeric};

/// Evaluates one predicate with a column sketch and writes the result mask.
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
  #[clap(long, help = "Output mask file")]
  out: PathBuf,
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

  let mask = scan(&inputs.loaded.map, &inputs.sketch, &inputs.base, &query)?;
  mask.save(&args.out)?;

  println!("rows={}, matches={}", inputs.base.len(), mask.count());
  println!("wrote mask: {}", args.out.display());
  Ok(())
}
