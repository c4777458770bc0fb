use std::{
  num::{NonZeroU32, NonZeroUsize},
  path::PathBuf,
};

use anyhow::Result;
use clap::Parser;
use column_sketch_arrow::{init_tracing, with_suffix, DTypeArg, MAP_SUFFIX, SKETCH_SUFFIX};
use column_sketch_core::{
  column::read_column, BuildOptions, CompressionMap, EncodedColumn, MapSidecar, Numeric,
};
use tracing::info;

/// Builds a compression map over a raw column and writes its sketch and map sidecar.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  #[clap(long = "in", help = "Raw column file")]
  input: PathBuf,
  #[clap(
    long,
    help = "Output path base, `.sketch` and `.map.json` are appended when missing"
  )]
  out: String,
  #[clap(long, value_enum)]
  dtype: DTypeArg,
  #[clap(long, default_value = "1024", help = "Code budget")]
  codes: NonZeroU32,
  #[clap(long, default_value = "10000", help = "Sample size for choosing range endpoints")]
  sample: NonZeroUsize,
  #[clap(
    long,
    default_value = "1",
    help = "Minimum frequency for a value to get its own code"
  )]
  unique_cutoff: NonZeroUsize,
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
  let column: Vec<T> = read_column(&args.input)?;
  info!(rows = column.len(), input = %args.input.display(), "read column");

  let options = BuildOptions {
    max_codes: args.codes.get(),
    sample_size: args.sample.get(),
    unique_cutoff: args.unique_cutoff.get(),
  };
  let map = CompressionMap::build(&column, &options)?;
  let EncodedColumn {
    sketch,
    boundary_hits,
  } = map.encode(&column)?;

  let sketch_path = with_suffix(&args.out, SKETCH_SUFFIX);
  let map_path = with_suffix(&args.out, MAP_SUFFIX);
  sketch.save(&sketch_path)?;
  MapSidecar::new(&map, T::DTYPE, sketch.width()).save(&map_path)?;

  println!("encoded {} values", column.len());
  println!(
    "total_codes={}, code_bits={}, uniques={}, ranges={}, boundary_hits={}",
    map.total_codes(),
    sketch.width().bits(),
    map.uniques().len(),
    map.endpoints().len(),
    boundary_hits
  );
  println!(
    "wrote:\n  {}\n  {}",
    sketch_path.display(),
    map_path.display()
  );
  Ok(())
}
