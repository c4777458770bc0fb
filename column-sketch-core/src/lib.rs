//! This crate provides the core data structure and algorithm of [column-sketch](https://stratos.seas.harvard.edu/files/stratos/files/sketches.pdf)
//! for fixed-width unsigned integer columns.
//!
//! - [`CompressionMap`] assigns each value an order-preserving code within a fixed budget.
//! - [`Sketch`] holds the 8 or 16-bit code of every row.
//! - [`scan`] evaluates `<`, `=` and `BETWEEN` using the sketch and reads the raw column only for
//!   rows in a boundary bucket. The result is bit-for-bit the result of a full scan.
//! - [`BitVector`] is the result mask.

pub mod bitvector;
pub mod column;
pub mod compression_map;
pub mod error;
pub mod scan;
pub mod sidecar;
pub mod sketch;
pub mod traits;

pub use bitvector::BitVector;
pub use compression_map::{BuildOptions, CodeAssignment, CompressionMap, EncodedColumn};
pub use error::{Error, Result};
pub use scan::{scan, scan_with, BatchKernel, QuerySpec, RowKernel, ScanKernel, ScanPlan};
pub use sidecar::{LoadedMap, MapSidecar};
pub use sketch::{CodeWidth, CodeWord, Sketch};
pub use traits::{DType, Numeric};
