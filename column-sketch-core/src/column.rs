//! Raw column files: a flat array of little-endian fixed-width integers with no header.

use std::{fs, path::Path};

use crate::{
  error::{Error, Result},
  traits::Numeric,
};

pub fn decode_column<T: Numeric>(bytes: &[u8]) -> Result<Vec<T>> {
  let width = T::DTYPE.width();
  if bytes.len() % width != 0 {
    return Err(Error::Format(format!(
      "column of {} bytes is not a multiple of the {} width ({width} bytes)",
      bytes.len(),
      T::DTYPE
    )));
  }
  Ok(bytes.chunks_exact(width).map(T::from_le_slice).collect())
}

pub fn encode_column<T: Numeric>(values: &[T]) -> Vec<u8> {
  let mut bytes = Vec::with_capacity(values.len() * T::DTYPE.width());
  for value in values {
    value.extend_le_bytes(&mut bytes);
  }
  bytes
}

pub fn read_column<T: Numeric>(path: impl AsRef<Path>) -> Result<Vec<T>> {
  decode_column(&fs::read(path)?)
}

pub fn write_column<T: Numeric>(path: impl AsRef<Path>, values: &[T]) -> Result<()> {
  fs::write(path, encode_column(values))?;
  Ok(())
}
