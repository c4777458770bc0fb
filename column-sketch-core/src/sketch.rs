//! Per-row code storage.
//!
//! A sketch is a flat array holding one code per row of the raw column. Codes are 8 bits wide
//! when the compression map has at most 256 codes and 16 bits wide (little-endian on disk) when
//! it has at most 65536. The file has no header; its length must be `rows * width` bytes.

use std::{fs, path::Path};

use crate::error::{Error, Result};

pub const MAX_U8_CODES: usize = 1 << 8;
pub const MAX_U16_CODES: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeWidth {
  U8,
  U16,
}

impl CodeWidth {
  /// The narrowest width that can hold `total_codes` distinct codes.
  pub fn for_total_codes(total_codes: usize) -> Result<Self> {
    match total_codes {
      0 => Err(Error::Validation("compression map has zero codes".to_string())),
      n if n <= MAX_U8_CODES => Ok(CodeWidth::U8),
      n if n <= MAX_U16_CODES => Ok(CodeWidth::U16),
      n => Err(Error::Validation(format!(
        "{n} codes exceed the 16-bit code width limit of {MAX_U16_CODES}"
      ))),
    }
  }

  pub fn from_bits(bits: u32) -> Result<Self> {
    match bits {
      8 => Ok(CodeWidth::U8),
      16 => Ok(CodeWidth::U16),
      other => Err(Error::Format(format!(
        "code_bits must be 8 or 16, found {other}"
      ))),
    }
  }

  pub fn bits(self) -> u32 {
    match self {
      CodeWidth::U8 => 8,
      CodeWidth::U16 => 16,
    }
  }

  pub fn bytes(self) -> usize {
    self.bits() as usize / 8
  }

  pub fn capacity(self) -> usize {
    match self {
      CodeWidth::U8 => MAX_U8_CODES,
      CodeWidth::U16 => MAX_U16_CODES,
    }
  }
}

/// A single stored code. Implemented for the two sketch widths.
pub trait CodeWord: Copy + Send + Sync + 'static {
  const WIDTH: CodeWidth;

  fn code(self) -> u32;
}

impl CodeWord for u8 {
  const WIDTH: CodeWidth = CodeWidth::U8;

  #[inline(always)]
  fn code(self) -> u32 {
    self as u32
  }
}

impl CodeWord for u16 {
  const WIDTH: CodeWidth = CodeWidth::U16;

  #[inline(always)]
  fn code(self) -> u32 {
    self as u32
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sketch {
  U8(Vec<u8>),
  U16(Vec<u16>),
}

impl Sketch {
  pub fn width(&self) -> CodeWidth {
    match self {
      Sketch::U8(_) => CodeWidth::U8,
      Sketch::U16(_) => CodeWidth::U16,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Sketch::U8(codes) => codes.len(),
      Sketch::U16(codes) => codes.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Code of row `index`, widened.
  pub fn code_at(&self, index: usize) -> Option<u32> {
    match self {
      Sketch::U8(codes) => codes.get(index).map(|c| c.code()),
      Sketch::U16(codes) => codes.get(index).map(|c| c.code()),
    }
  }

  pub fn to_le_bytes(&self) -> Vec<u8> {
    match self {
      Sketch::U8(codes) => codes.clone(),
      Sketch::U16(codes) => codes.iter().flat_map(|c| c.to_le_bytes()).collect(),
    }
  }

  /// Interpret a raw sketch buffer for a column of `rows` rows.
  pub fn from_le_bytes(bytes: Vec<u8>, width: CodeWidth, rows: usize) -> Result<Self> {
    let expected = rows.checked_mul(width.bytes()).ok_or_else(|| {
      Error::Format(format!("sketch of {rows} rows is not addressable"))
    })?;
    if bytes.len() != expected {
      return Err(Error::Format(format!(
        "sketch length {} does not match {rows} rows of {}-bit codes ({expected} bytes)",
        bytes.len(),
        width.bits()
      )));
    }

    Ok(match width {
      CodeWidth::U8 => Sketch::U8(bytes),
      CodeWidth::U16 => Sketch::U16(
        bytes
          .chunks_exact(2)
          .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
          .collect(),
      ),
    })
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, self.to_le_bytes())?;
    Ok(())
  }

  pub fn load(path: impl AsRef<Path>, width: CodeWidth, rows: usize) -> Result<Self> {
    let bytes = fs::read(path)?;
    Self::from_le_bytes(bytes, width, rows)
  }
}

#[cfg(test)]
mod tests {
  use rstest::rstest;

  use super::*;

  #[rstest]
  #[case(1, CodeWidth::U8)]
  #[case(256, CodeWidth::U8)]
  #[case(257, CodeWidth::U16)]
  #[case(65536, CodeWidth::U16)]
  fn test_width_for_total_codes(#[case] total: usize, #[case] expected: CodeWidth) {
    assert_eq!(expected, CodeWidth::for_total_codes(total).unwrap());
  }

  #[test]
  fn test_width_limits() {
    assert!(matches!(
      CodeWidth::for_total_codes(65537),
      Err(Error::Validation(_))
    ));
    assert!(CodeWidth::for_total_codes(0).is_err());
    assert!(matches!(CodeWidth::from_bits(32), Err(Error::Format(_))));
  }

  #[test]
  fn test_u16_little_endian() {
    let sketch = Sketch::U16(vec![0x0102, 0xfffe]);
    let bytes = sketch.to_le_bytes();
    assert_eq!(vec![0x02, 0x01, 0xfe, 0xff], bytes);
    assert_eq!(sketch, Sketch::from_le_bytes(bytes, CodeWidth::U16, 2).unwrap());
  }

  #[rstest]
  #[case(CodeWidth::U8, 9)]
  #[case(CodeWidth::U8, 11)]
  #[case(CodeWidth::U16, 10)]
  #[case(CodeWidth::U16, 21)]
  fn test_length_mismatch(#[case] width: CodeWidth, #[case] len: usize) {
    let err = Sketch::from_le_bytes(vec![0; len], width, 10).unwrap_err();
    assert!(matches!(err, Error::Format(_)));
  }

  #[test]
  fn test_save_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("col.sketch");
    let sketch = Sketch::U16((0..1000).collect());
    sketch.save(&path).unwrap();

    assert_eq!(2000, std::fs::metadata(&path).unwrap().len());
    assert_eq!(sketch, Sketch::load(&path, CodeWidth::U16, 1000).unwrap());
    assert!(Sketch::load(&path, CodeWidth::U8, 1000).is_err());
  }
}
