use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The on-disk element type of a raw column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
  U32,
  U64,
}

impl DType {
  pub fn as_str(self) -> &'static str {
    match self {
      DType::U32 => "u32",
      DType::U64 => "u64",
    }
  }

  /// Width of one element in bytes.
  pub fn width(self) -> usize {
    match self {
      DType::U32 => 4,
      DType::U64 => 8,
    }
  }
}

impl fmt::Display for DType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "u32" => Ok(DType::U32),
      "u64" => Ok(DType::U64),
      other => Err(format!("unknown dtype '{other}', expected u32 or u64")),
    }
  }
}

/// The [`Numeric`] trait is a minimal trait describing a fixed-width unsigned integer column
/// that we could construct a [`crate::CompressionMap`] on and scan with a sketch.
///
/// Codebooks always store widened `u64` values, so a column keeps its native width and is only
/// widened one value at a time when a boundary row is probed.
pub trait Numeric: sealed::Sealed + Copy + Ord + Send + Sync + fmt::Debug + 'static {
  const DTYPE: DType;

  /// The largest value of the type.
  fn max_value() -> Self;

  fn widen(self) -> u64;

  /// Convert a float, saturating at `0` and [`Numeric::max_value`].
  fn from_f64_saturating(value: f64) -> Self;

  /// Decode one value from exactly `Self::DTYPE.width()` little-endian bytes.
  fn from_le_slice(bytes: &[u8]) -> Self;

  fn extend_le_bytes(self, out: &mut Vec<u8>);
}

impl Numeric for u32 {
  const DTYPE: DType = DType::U32;

  fn max_value() -> Self {
    u32::MAX
  }

  fn from_f64_saturating(value: f64) -> Self {
    value as u32
  }

  #[inline]
  fn widen(self) -> u64 {
    self as u64
  }

  fn from_le_slice(bytes: &[u8]) -> Self {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
  }

  fn extend_le_bytes(self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.to_le_bytes());
  }
}

impl Numeric for u64 {
  const DTYPE: DType = DType::U64;

  fn max_value() -> Self {
    u64::MAX
  }

  fn from_f64_saturating(value: f64) -> Self {
    value as u64
  }

  #[inline]
  fn widen(self) -> u64 {
    self
  }

  fn from_le_slice(bytes: &[u8]) -> Self {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
  }

  fn extend_le_bytes(self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.to_le_bytes());
  }
}

mod sealed {
  pub trait Sealed {}

  impl Sealed for u32 {}
  impl Sealed for u64 {}
}
