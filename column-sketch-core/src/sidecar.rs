//! The `*.map.json` file stored next to a sketch.
//!
//! It is a flat JSON object with exactly five keys, written in this order:
//!
//! ```json
//! {
//!   "dtype": "u32",
//!   "code_bits": 8,
//!   "total_codes": 3,
//!   "uniques": [],
//!   "endpoints": [2, 5, 7]
//! }
//! ```
//!
//! Unknown keys, missing keys and nested values are rejected.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
  compression_map::CompressionMap,
  error::{Error, Result},
  sketch::CodeWidth,
  traits::DType,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapSidecar {
  pub dtype: DType,
  pub code_bits: u32,
  pub total_codes: u32,
  pub uniques: Vec<u64>,
  pub endpoints: Vec<u64>,
}

/// A compression map loaded from its sidecar, together with how its column was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedMap {
  pub map: CompressionMap,
  pub dtype: DType,
  pub code_width: CodeWidth,
}

impl MapSidecar {
  pub fn new(map: &CompressionMap, dtype: DType, code_width: CodeWidth) -> Self {
    MapSidecar {
      dtype,
      code_bits: code_width.bits(),
      total_codes: map.total_codes() as u32,
      uniques: map.uniques().to_vec(),
      endpoints: map.endpoints().to_vec(),
    }
  }

  pub fn from_json(json: &str) -> Result<Self> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Check the recorded fields against each other and rebuild the compression map.
  pub fn into_loaded(self) -> Result<LoadedMap> {
    let code_width = CodeWidth::from_bits(self.code_bits)?;
    let recorded = self.total_codes as usize;
    let actual = self.uniques.len() + self.endpoints.len();
    if recorded != actual {
      return Err(Error::Format(format!(
        "total_codes is {recorded} but the map holds {actual} codes"
      )));
    }
    if actual > code_width.capacity() {
      return Err(Error::Format(format!(
        "{actual} codes do not fit in {} bits",
        code_width.bits()
      )));
    }
    let map = CompressionMap::from_parts(self.uniques, self.endpoints)?;
    Ok(LoadedMap {
      map,
      dtype: self.dtype,
      code_width,
    })
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, self.to_json()?)?;
    Ok(())
  }

  pub fn load(path: impl AsRef<Path>) -> Result<LoadedMap> {
    let json = fs::read_to_string(path)?;
    Self::from_json(&json)?.into_loaded()
  }
}
