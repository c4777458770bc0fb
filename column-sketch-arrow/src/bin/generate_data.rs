use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use column_sketch_arrow::{init_tracing, DTypeArg, DistArg};
use column_sketch_core::{column::write_column, Numeric};
use column_sketch_eval::util::gen_dataset;

/// Writes a synthetic raw column scaled to the full range of its type.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  #[clap(long, help = "Number of values")]
  n: usize,
  #[clap(long, value_enum)]
  dtype: DTypeArg,
  #[clap(long, value_enum, default_value = "uniform")]
  dist: DistArg,
  #[clap(long, default_value_t = 42)]
  seed: u64,
  #[clap(long, short, help = "Output column file")]
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
  let column: Vec<T> = gen_dataset(args.n, args.dist.into(), args.seed)?;
  write_column(&args.out, &column)?;
  println!("wrote {} elements to {}", args.n, args.out.display());
  Ok(())
}
