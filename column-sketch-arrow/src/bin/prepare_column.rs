use std::{fs, path::PathBuf};

use anyhow::{bail, Result};
use clap::{ArgGroup, Parser};
use column_sketch_arrow::{
  init_tracing,
  table::{read_csv_column, read_parquet_column, write_dictionary},
};
use column_sketch_core::column::write_column;
use tracing::{info, warn};

/// Extracts one column of a parquet or CSV file into a raw u32 column.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(group(ArgGroup::new("source").required(true).args(["input", "csv"])))]
struct Args {
  #[clap(long, help = "Input parquet file")]
  input: Option<PathBuf>,
  #[clap(long, help = "Input CSV file with a header row")]
  csv: Option<PathBuf>,
  #[clap(long, help = "Integer or string column to extract")]
  column: String,
  #[clap(long, help = "Output raw u32 column file")]
  out_bin: PathBuf,
  #[clap(long, help = "Output JSON dictionary for string columns")]
  out_dict: Option<PathBuf>,
}

fn main() -> Result<()> {
  init_tracing();
  let args = Args::parse();

  let prepared = match (&args.input, &args.csv) {
    (Some(path), _) => read_parquet_column(path, &args.column)?,
    (None, Some(path)) => read_csv_column(path, &args.column)?,
    (None, None) => bail!("one of --input or --csv is required"),
  };
  if prepared.nulls_dropped > 0 {
    info!(nulls = prepared.nulls_dropped, "dropped null rows");
  }

  if let Some(parent) = args.out_bin.parent() {
    fs::create_dir_all(parent)?;
  }
  write_column(&args.out_bin, &prepared.values)?;
  println!(
    "wrote {} rows to {}",
    prepared.values.len(),
    args.out_bin.display()
  );

  if let Some(dictionary) = &prepared.dictionary {
    match &args.out_dict {
      Some(path) => {
        write_dictionary(path, dictionary)?;
        println!(
          "distinct categories: {} (mapping -> {})",
          dictionary.len(),
          path.display()
        );
      }
      None => warn!(
        categories = dictionary.len(),
        "string column factorized but no --out-dict given, dictionary not written"
      ),
    }
  }
  Ok(())
}
