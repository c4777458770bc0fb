use tracing::debug;

use crate::{
  error::{Error, Result},
  sketch::{CodeWidth, Sketch},
  traits::Numeric,
};

pub const DEFAULT_MAX_CODES: u32 = 1024;
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;
pub const DEFAULT_UNIQUE_CUTOFF: usize = 1;

/// Parameters of [`CompressionMap::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
  /// Upper bound on `total_codes`.
  pub max_codes: u32,
  /// Number of rank-spaced values drawn from the non-unique pool to place endpoints on.
  pub sample_size: usize,
  /// A value occurring at least this many times is eligible for its own code.
  pub unique_cutoff: usize,
}

impl Default for BuildOptions {
  fn default() -> Self {
    BuildOptions {
      max_codes: DEFAULT_MAX_CODES,
      sample_size: DEFAULT_SAMPLE_SIZE,
      unique_cutoff: DEFAULT_UNIQUE_CUTOFF,
    }
  }
}

/// A sketch together with encoding statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedColumn {
  pub sketch: Sketch,
  pub boundary_hits: usize,
}

/// The code of a value, and whether the value sits exactly on a bucket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeAssignment {
  pub code: u32,
  pub is_boundary: bool,
}

/// A [`CompressionMap`] (the codebook) maps values of a numeric column to small codes so that
/// the mapping is order-preserving: for `v1 < v2`, `code(v1) <= code(v2)`.
///
/// It consists of two sorted, duplicate-free arrays:
/// - `uniques`: values that own a code of their own.
/// - `endpoints`: bucket maxima. Bucket `j` holds the values in `(endpoints[j-1], endpoints[j]]`,
///   and everything above the last endpoint falls into the last bucket.
///
/// `total_codes = uniques.len() + endpoints.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompressionMap {
  uniques: Vec<u64>,
  endpoints: Vec<u64>,
}

/// A run of equal values in the sorted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
  value: u64,
  freq: usize,
}

impl CompressionMap {
  /// Reassemble a compression map from persisted arrays.
  ///
  /// Both arrays must be strictly ascending and describe at least one code.
  pub fn from_parts(uniques: Vec<u64>, endpoints: Vec<u64>) -> Result<Self> {
    if !is_strictly_ascending(&uniques) {
      return Err(Error::Format(
        "uniques must be ascending and duplicate-free".to_string(),
      ));
    }
    if !is_strictly_ascending(&endpoints) {
      return Err(Error::Format(
        "endpoints must be ascending and duplicate-free".to_string(),
      ));
    }
    let total = uniques.len() + endpoints.len();
    if total == 0 || total > u32::MAX as usize {
      return Err(Error::Format(format!("invalid code count {total}")));
    }
    Ok(CompressionMap { uniques, endpoints })
  }

  /// Construct the compression map of a column.
  ///
  /// Step 1: Sort a copy of the column and run-length encode it into `(value, frequency)` runs.
  ///
  /// Step 2: Every run with `frequency >= unique_cutoff` becomes a unique value with an exclusive
  ///   code. The other runs form the non-unique pool.
  ///   - If the uniques cannot coexist with the range codes the pool needs (more uniques than
  ///     `max_codes`, or exactly `max_codes` while the pool is non-empty), the dictionary is
  ///     dropped and every run is demoted into the pool.
  ///   - If the pool is empty the map is a pure dictionary and we are done. This includes a
  ///     single-valued column at `max_codes = 1`: it gets one exact code instead of one bucket, so
  ///     equality on it needs no probe, but bounds other than that value cannot be encoded.
  ///
  /// Step 3: Sample up to `sample_size` values of the pool at evenly spaced ranks of its
  ///   frequency-weighted size, so frequent values are represented proportionally.
  ///
  /// Step 4: Pick `max_codes - |uniques|` endpoints at evenly spaced sample positions, then sort
  ///   and dedup them. The last endpoint is always the sample maximum.
  pub fn build<T: Numeric>(values: &[T], options: &BuildOptions) -> Result<CompressionMap> {
    if values.is_empty() {
      return Err(Error::Validation(
        "cannot build a compression map from an empty column".to_string(),
      ));
    }
    if options.max_codes < 1 {
      return Err(Error::Validation("max_codes must be >= 1".to_string()));
    }
    let max_codes = options.max_codes as usize;
    let sample_size = options.sample_size.max(1);
    let unique_cutoff = options.unique_cutoff.max(1);

    let mut sorted: Vec<u64> = values.iter().map(|v| v.widen()).collect();
    sorted.sort_unstable();
    let runs = run_length_encode(&sorted);

    let (unique_runs, mut pool): (Vec<Run>, Vec<Run>) =
      runs.iter().partition(|run| run.freq >= unique_cutoff);
    let mut uniques: Vec<u64> = unique_runs.iter().map(|run| run.value).collect();

    let needs_ranges = !pool.is_empty();
    if uniques.len() > max_codes || (uniques.len() == max_codes && needs_ranges) {
      debug!(
        uniques = uniques.len(),
        max_codes, "unique values exceed the code budget, demoting all values to ranges"
      );
      uniques.clear();
      pool = runs;
    }

    if pool.is_empty() {
      debug!(uniques = uniques.len(), "built dictionary compression map");
      return Ok(CompressionMap {
        uniques,
        endpoints: Vec::new(),
      });
    }

    let range_codes = max_codes.saturating_sub(uniques.len());
    if range_codes == 0 {
      return Err(Error::Validation(format!(
        "max_codes {max_codes} leaves no range codes next to {} unique values",
        uniques.len()
      )));
    }

    let sample = sample_by_rank(&pool, sample_size);
    let endpoints = choose_endpoints(&sample, range_codes);

    debug!(
      rows = values.len(),
      uniques = uniques.len(),
      pool_runs = pool.len(),
      sample = sample.len(),
      endpoints = endpoints.len(),
      "built compression map"
    );

    Ok(CompressionMap { uniques, endpoints })
  }

  pub fn uniques(&self) -> &[u64] {
    &self.uniques
  }

  pub fn endpoints(&self) -> &[u64] {
    &self.endpoints
  }

  pub fn total_codes(&self) -> usize {
    self.uniques.len() + self.endpoints.len()
  }

  /// The storage width of a sketch encoded with this map.
  pub fn code_width(&self) -> Result<CodeWidth> {
    CodeWidth::for_total_codes(self.total_codes())
  }

  pub fn is_unique(&self, value: u64) -> bool {
    self.uniques.binary_search(&value).is_ok()
  }

  /// Compute the code of `value`.
  ///
  /// A code counts the uniques below the value plus the buckets up to the value's bucket, which
  /// is what keeps codes in value order even when uniques fall between endpoints:
  /// - unique `u`: `|uniques < u| + |endpoints < u|`
  /// - other values: `|uniques < v| + index of the first endpoint >= v`, or of the last endpoint
  ///   when `v` is above all of them.
  ///
  /// Fails when `value` is not a unique and the map has no buckets to put it in.
  pub fn code_of(&self, value: u64) -> Result<CodeAssignment> {
    let u_count = self.uniques.partition_point(|&u| u < value);
    let e_index = self.endpoints.partition_point(|&e| e < value);

    if self.uniques.get(u_count) == Some(&value) {
      return Ok(CodeAssignment {
        code: (u_count + e_index) as u32,
        is_boundary: false,
      });
    }

    if self.endpoints.is_empty() {
      return Err(Error::Validation(format!(
        "value {value} is not encodable: not a unique value and the map has no ranges"
      )));
    }

    if e_index == self.endpoints.len() {
      return Ok(CodeAssignment {
        code: (u_count + self.endpoints.len() - 1) as u32,
        is_boundary: false,
      });
    }

    Ok(CodeAssignment {
      code: (u_count + e_index) as u32,
      is_boundary: self.endpoints[e_index] == value,
    })
  }

  /// Returns true if `value` is the only value that can be assigned its code, so a row carrying
  /// that code is known to hold `value` without reading it.
  ///
  /// Since codes are monotonic, the values sharing a code form a contiguous range. It is enough
  /// to check that neither neighbour of `value` lands on the same code.
  pub fn is_exact(&self, value: u64) -> bool {
    if !self.is_unique(value) {
      return false;
    }
    let Ok(own) = self.code_of(value) else {
      return false;
    };
    let shares_code = |neighbour: Option<u64>| {
      neighbour
        .and_then(|n| self.code_of(n).ok())
        .is_some_and(|assignment| assignment.code == own.code)
    };
    !shares_code(value.checked_sub(1)) && !shares_code(value.checked_add(1))
  }

  /// Encode a whole column into a sketch of the map's code width.
  pub fn compress_array<T: Numeric>(&self, input: &[T]) -> Result<Sketch> {
    Ok(self.encode(input)?.sketch)
  }

  /// Like [`CompressionMap::compress_array`], also counting the rows that landed exactly on a
  /// range endpoint.
  pub fn encode<T: Numeric>(&self, input: &[T]) -> Result<EncodedColumn> {
    let width = self.code_width()?;
    let mut boundary_hits = 0usize;
    let mut encode = |value: &T| -> Result<u32> {
      let assignment = self.code_of(value.widen())?;
      boundary_hits += assignment.is_boundary as usize;
      Ok(assignment.code)
    };

    let sketch = match width {
      CodeWidth::U8 => Sketch::U8(
        input
          .iter()
          .map(|v| encode(v).map(|code| code as u8))
          .collect::<Result<_>>()?,
      ),
      CodeWidth::U16 => Sketch::U16(
        input
          .iter()
          .map(|v| encode(v).map(|code| code as u16))
          .collect::<Result<_>>()?,
      ),
    };

    debug!(
      rows = input.len(),
      code_bits = width.bits(),
      boundary_hits,
      "encoded column"
    );
    Ok(EncodedColumn {
      sketch,
      boundary_hits,
    })
  }
}

fn is_strictly_ascending(values: &[u64]) -> bool {
  values.windows(2).all(|pair| pair[0] < pair[1])
}

fn run_length_encode(sorted: &[u64]) -> Vec<Run> {
  let mut runs = Vec::new();
  let mut start = 0;
  for end in 1..=sorted.len() {
    if end == sorted.len() || sorted[end] != sorted[start] {
      runs.push(Run {
        value: sorted[start],
        freq: end - start,
      });
      start = end;
    }
  }
  runs
}

/// Draw `min(sample_size, pool size)` values from the pool at ranks
/// `floor(i * total / (points + 1))` for `i` in `1..=points`, where `total` is the
/// frequency-weighted size of the pool. The result is sorted.
///
/// Ranks only grow, so one pass over the runs answers every rank lookup.
fn sample_by_rank(pool: &[Run], sample_size: usize) -> Vec<u64> {
  let total: usize = pool.iter().map(|run| run.freq).sum();
  let points = sample_size.min(total);
  let mut sample = Vec::with_capacity(points);

  let mut run_idx = 0;
  let mut run_end = pool[0].freq;
  for i in 1..=points {
    let rank = ((i as u128 * total as u128) / (points as u128 + 1)) as usize;
    let rank = rank.min(total - 1);
    while rank >= run_end {
      run_idx += 1;
      run_end += pool[run_idx].freq;
    }
    sample.push(pool[run_idx].value);
  }
  sample
}

/// Pick `range_codes` bucket maxima from a sorted sample: bucket `i` in `1..=range_codes` ends at
/// sample position `clamp(floor(i * M / range_codes), 1, M)` (1-based).
fn choose_endpoints(sample: &[u64], range_codes: usize) -> Vec<u64> {
  let m = sample.len();
  let mut endpoints: Vec<u64> = if range_codes >= m {
    // Every sample position gets picked.
    sample.to_vec()
  } else {
    (1..=range_codes)
      .map(|i| {
        let idx = ((i as u128 * m as u128) / range_codes as u128) as usize;
        sample[idx.clamp(1, m) - 1]
      })
      .collect()
  };

  endpoints.sort_unstable();
  endpoints.dedup();

  if let Some(&sample_max) = sample.last() {
    if endpoints.last().map_or(true, |&last| last < sample_max) {
      endpoints.push(sample_max);
    }
  }
  endpoints
}
