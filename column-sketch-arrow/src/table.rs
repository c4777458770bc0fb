//! Extract one column of a parquet or CSV table as `u32` values.
//!
//! Integer columns are cast, failing on values that do not fit. String columns are factorized:
//! the distinct strings are sorted and each row gets the position of its string as its id. Null
//! rows are dropped in both cases. In a CSV file an empty cell is a null, and a column is read as
//! integers when every other cell parses as one.

use std::{
  collections::{BTreeMap, BTreeSet},
  fs::{self, File},
  path::Path,
  sync::Arc,
};

use ::parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ProjectionMask};
use anyhow::{bail, Context, Result};
use arrow::{
  array::{Array, ArrayRef, AsArray, Int64Array, StringArray},
  compute::{cast, cast_with_options, CastOptions},
  datatypes::{DataType, UInt32Type},
};
use tracing::debug;

const BATCH_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedColumn {
  pub values: Vec<u32>,
  /// Id to category, present when the source column held strings.
  pub dictionary: Option<BTreeMap<u32, String>>,
  pub nulls_dropped: usize,
}

pub fn read_parquet_column(path: &Path, column: &str) -> Result<PreparedColumn> {
  let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
  let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
  let index = builder
    .schema()
    .index_of(column)
    .with_context(|| format!("no column named '{column}'"))?;
  let data_type = builder.schema().field(index).data_type().clone();
  let projection = ProjectionMask::roots(builder.parquet_schema(), [index]);
  let reader = builder
    .with_projection(projection)
    .with_batch_size(BATCH_SIZE)
    .build()?;

  let mut arrays = Vec::new();
  for batch in reader {
    arrays.push(batch?.column(0).clone());
  }
  debug!(column, %data_type, batches = arrays.len(), "read parquet column");

  prepare_arrays(&data_type, &arrays)
}

pub fn read_csv_column(path: &Path, column: &str) -> Result<PreparedColumn> {
  let mut reader =
    csv::Reader::from_path(path).with_context(|| format!("cannot open {}", path.display()))?;
  let index = reader
    .headers()?
    .iter()
    .position(|header| header == column)
    .with_context(|| format!("no column named '{column}'"))?;

  let mut cells: Vec<Option<String>> = Vec::new();
  for record in reader.records() {
    let record = record?;
    let cell = record.get(index).unwrap_or_default().trim();
    cells.push((!cell.is_empty()).then(|| cell.to_string()));
  }
  debug!(column, rows = cells.len(), "read csv column");

  let integers: Option<Vec<Option<i64>>> = cells
    .iter()
    .map(|cell| match cell {
      Some(cell) => cell.parse().ok().map(Some),
      None => Some(None),
    })
    .collect();
  match integers {
    Some(integers) => {
      let array: ArrayRef = Arc::new(Int64Array::from(integers));
      prepare_arrays(&DataType::Int64, &[array])
    }
    None => {
      let array: ArrayRef = Arc::new(StringArray::from(cells));
      prepare_arrays(&DataType::Utf8, &[array])
    }
  }
}

/// Convert the chunks of one column, all of type `data_type`.
pub fn prepare_arrays(data_type: &DataType, arrays: &[ArrayRef]) -> Result<PreparedColumn> {
  let nulls_dropped = arrays.iter().map(|array| array.null_count()).sum();
  if is_integer(data_type) {
    Ok(PreparedColumn {
      values: cast_integers(arrays)?,
      dictionary: None,
      nulls_dropped,
    })
  } else if is_string(data_type) {
    let (values, dictionary) = factorize(arrays)?;
    Ok(PreparedColumn {
      values,
      dictionary: Some(dictionary),
      nulls_dropped,
    })
  } else {
    bail!("unsupported column type {data_type}, expected an integer or string column")
  }
}

pub fn write_dictionary(path: &Path, dictionary: &BTreeMap<u32, String>) -> Result<()> {
  fs::write(path, serde_json::to_string_pretty(dictionary)?)?;
  Ok(())
}

fn is_integer(data_type: &DataType) -> bool {
  matches!(
    data_type,
    DataType::Int8
      | DataType::Int16
      | DataType::Int32
      | DataType::Int64
      | DataType::UInt8
      | DataType::UInt16
      | DataType::UInt32
      | DataType::UInt64
  )
}

fn is_string(data_type: &DataType) -> bool {
  match data_type {
    DataType::Utf8 | DataType::LargeUtf8 => true,
    DataType::Dictionary(_, value) => is_string(value),
    _ => false,
  }
}

fn cast_integers(arrays: &[ArrayRef]) -> Result<Vec<u32>> {
  // Unsafe casts fail on overflow instead of producing nulls.
  let options = CastOptions {
    safe: false,
    ..Default::default()
  };
  let mut values = Vec::new();
  for array in arrays {
    let array = cast_with_options(array.as_ref(), &DataType::UInt32, &options)
      .context("integer column has values outside the u32 range")?;
    values.extend(array.as_primitive::<UInt32Type>().iter().flatten());
  }
  Ok(values)
}

fn factorize(arrays: &[ArrayRef]) -> Result<(Vec<u32>, BTreeMap<u32, String>)> {
  let mut rows = Vec::new();
  for array in arrays {
    let array = cast(array.as_ref(), &DataType::Utf8)?;
    rows.extend(array.as_string::<i32>().iter().flatten().map(str::to_string));
  }

  let categories: BTreeSet<&str> = rows.iter().map(String::as_str).collect();
  if categories.len() > u32::MAX as usize {
    bail!("{} categories do not fit in u32 ids", categories.len());
  }
  let ids: BTreeMap<&str, u32> = categories
    .iter()
    .enumerate()
    .map(|(id, &category)| (category, id as u32))
    .collect();

  let values = rows.iter().map(|row| ids[row.as_str()]).collect();
  let dictionary = ids
    .into_iter()
    .map(|(category, id)| (id, category.to_string()))
    .collect();
  Ok((values, dictionary))
}

#[cfg(test)]
mod tests {
  use ::parquet::arrow::ArrowWriter;
  use arrow::{
    array::{Float64Array, Int64Array, StringArray},
    datatypes::{Field, Schema},
    record_batch::RecordBatch,
  };

  use super::*;

  fn write_table(path: &Path) {
    let schema = Arc::new(Schema::new(vec![
      Field::new("id", DataType::Int64, true),
      Field::new("city", DataType::Utf8, true),
      Field::new("delta", DataType::Int64, false),
      Field::new("price", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
      schema.clone(),
      vec![
        Arc::new(Int64Array::from(vec![Some(7), None, Some(3), Some(7), Some(0)])),
        Arc::new(StringArray::from(vec![
          Some("paris"),
          Some("berlin"),
          None,
          Some("paris"),
          Some("amsterdam"),
        ])),
        Arc::new(Int64Array::from(vec![1, -2, 3, 4, 5])),
        Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0, 5.0])),
      ],
    )
    .unwrap();

    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
  }

  #[test]
  fn test_integer_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.parquet");
    write_table(&path);

    let prepared = read_parquet_column(&path, "id").unwrap();
    assert_eq!(vec![7, 3, 7, 0], prepared.values);
    assert_eq!(None, prepared.dictionary);
    assert_eq!(1, prepared.nulls_dropped);
  }

  #[test]
  fn test_string_column_is_factorized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.parquet");
    write_table(&path);

    let prepared = read_parquet_column(&path, "city").unwrap();
    assert_eq!(vec![2, 1, 2, 0], prepared.values);
    assert_eq!(1, prepared.nulls_dropped);

    let dictionary = prepared.dictionary.unwrap();
    let categories: Vec<&str> = dictionary.values().map(String::as_str).collect();
    assert_eq!(vec!["amsterdam", "berlin", "paris"], categories);

    let dict_path = dir.path().join("city.json");
    write_dictionary(&dict_path, &dictionary).unwrap();
    let json: serde_json::Value =
      serde_json::from_str(&fs::read_to_string(&dict_path).unwrap()).unwrap();
    assert_eq!("berlin", json["1"]);
  }

  #[test]
  fn test_rejected_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.parquet");
    write_table(&path);

    // negative value
    assert!(read_parquet_column(&path, "delta").is_err());
    // float
    assert!(read_parquet_column(&path, "price").is_err());
    assert!(read_parquet_column(&path, "missing").is_err());
  }

  const CSV_TABLE: &str = "\
id,city,delta
7,paris,1
,berlin,-2
3,,3
7,paris,4
0,amsterdam,5
";

  #[test]
  fn test_csv_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.csv");
    fs::write(&path, CSV_TABLE).unwrap();

    let ids = read_csv_column(&path, "id").unwrap();
    assert_eq!(vec![7, 3, 7, 0], ids.values);
    assert_eq!(None, ids.dictionary);
    assert_eq!(1, ids.nulls_dropped);

    let cities = read_csv_column(&path, "city").unwrap();
    assert_eq!(vec![2, 1, 2, 0], cities.values);
    assert_eq!(1, cities.nulls_dropped);
    let categories: Vec<String> = cities.dictionary.unwrap().into_values().collect();
    assert_eq!(vec!["amsterdam", "berlin", "paris"], categories);

    // negative value
    assert!(read_csv_column(&path, "delta").is_err());
    assert!(read_csv_column(&path, "missing").is_err());
  }

  #[test]
  fn test_prepare_arrays_across_chunks() {
    let arrays: Vec<ArrayRef> = vec![
      Arc::new(StringArray::from(vec!["b", "a"])),
      Arc::new(StringArray::from(vec![Some("c"), None, Some("a")])),
    ];
    let prepared = prepare_arrays(&DataType::Utf8, &arrays).unwrap();
    assert_eq!(vec![1, 0, 2, 0], prepared.values);
    assert_eq!(1, prepared.nulls_dropped);
  }
}
