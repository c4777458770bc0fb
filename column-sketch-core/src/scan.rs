//! Predicate evaluation over a sketch.
//!
//! A query bound is translated to its code once. Rows whose code is strictly on the matching
//! side of the bound's code are decided from the sketch alone, and only rows sharing a bound's
//! code (the boundary bucket) read their raw value. The result is always identical to a full
//! scan of the raw column.

use std::fmt;

use crate::{
  bitvector::BitVector,
  compression_map::CompressionMap,
  error::{Error, Result},
  sketch::{CodeWord, Sketch},
  traits::Numeric,
};

const WORD_BITS: usize = 64;

/// A predicate over a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySpec {
  /// `value < v`
  Lt(u64),
  /// `value == v`
  Eq(u64),
  /// `low <= value <= high`, with `low <= high`.
  Between(u64, u64),
}

impl QuerySpec {
  /// An inclusive range query, swapping the bounds if they come in descending order.
  pub fn between(v1: u64, v2: u64) -> Self {
    if v2 < v1 {
      QuerySpec::Between(v2, v1)
    } else {
      QuerySpec::Between(v1, v2)
    }
  }

  /// Evaluate the predicate on a raw value.
  #[inline]
  pub fn matches(&self, value: u64) -> bool {
    match *self {
      QuerySpec::Lt(v) => value < v,
      QuerySpec::Eq(v) => value == v,
      QuerySpec::Between(low, high) => low <= value && value <= high,
    }
  }

  pub fn op_name(&self) -> &'static str {
    match self {
      QuerySpec::Lt(_) => "lt",
      QuerySpec::Eq(_) => "eq",
      QuerySpec::Between(..) => "between",
    }
  }
}

impl fmt::Display for QuerySpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QuerySpec::Lt(v) => write!(f, "value < {v}"),
      QuerySpec::Eq(v) => write!(f, "value = {v}"),
      QuerySpec::Between(low, high) => write!(f, "{low} <= value <= {high}"),
    }
  }
}

/// A query with its bounds translated to codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPlan {
  /// Codes below `code` match, `code` itself is probed.
  Lt { code: u32, value: u64 },
  /// `code` belongs to `value` alone, no probe needed.
  EqExact { code: u32 },
  /// `code` is shared with other values, probe for equality.
  EqProbe { code: u32, value: u64 },
  /// Codes strictly between `low_code` and `high_code` match, both bound codes are probed.
  Between {
    low_code: u32,
    high_code: u32,
    low: u64,
    high: u64,
  },
}

impl ScanPlan {
  pub fn new(map: &CompressionMap, query: &QuerySpec) -> Result<Self> {
    Ok(match *query {
      QuerySpec::Lt(value) => ScanPlan::Lt {
        code: map.code_of(value)?.code,
        value,
      },
      QuerySpec::Eq(value) => {
        let code = map.code_of(value)?.code;
        if map.is_exact(value) {
          ScanPlan::EqExact { code }
        } else {
          ScanPlan::EqProbe { code, value }
        }
      }
      QuerySpec::Between(low, high) => {
        if low > high {
          return Err(Error::Validation(format!(
            "between bounds out of order: {low} > {high}"
          )));
        }
        let c1 = map.code_of(low)?.code;
        let c2 = map.code_of(high)?.code;
        ScanPlan::Between {
          low_code: c1.min(c2),
          high_code: c1.max(c2),
          low,
          high,
        }
      }
    })
  }

  /// Decide a single row. `probe` reads the raw value and is only called for boundary codes.
  #[inline(always)]
  pub fn matches(&self, code: u32, probe: impl FnOnce() -> u64) -> bool {
    match *self {
      ScanPlan::Lt { code: c1, value } => code < c1 || (code == c1 && probe() < value),
      ScanPlan::EqExact { code: c1 } => code == c1,
      ScanPlan::EqProbe { code: c1, value } => code == c1 && probe() == value,
      ScanPlan::Between {
        low_code,
        high_code,
        low,
        high,
      } => {
        if code > low_code && code < high_code {
          true
        } else if code == low_code || code == high_code {
          // Covers low_code == high_code as well
          let v = probe();
          low <= v && v <= high
        } else {
          false
        }
      }
    }
  }
}

/// A strategy for running a [`ScanPlan`] over a sketch and its raw column.
///
/// Implementations must produce the same bits: they only differ in how rows are batched.
pub trait ScanKernel {
  /// Fill `out`, which has exactly one bit per row and starts cleared.
  fn run<C: CodeWord, T: Numeric>(
    &self,
    plan: &ScanPlan,
    codes: &[C],
    base: &[T],
    out: &mut BitVector,
  );
}

/// Straight per-row loop. This is the reference every other kernel is checked against.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowKernel;

impl ScanKernel for RowKernel {
  fn run<C: CodeWord, T: Numeric>(
    &self,
    plan: &ScanPlan,
    codes: &[C],
    base: &[T],
    out: &mut BitVector,
  ) {
    let chunks = codes.chunks(WORD_BITS).zip(base.chunks(WORD_BITS));
    for (word, (codes, base)) in out.words_mut().iter_mut().zip(chunks) {
      let mut acc = 0u64;
      for (bit, (&code, &value)) in codes.iter().zip(base).enumerate() {
        acc |= (plan.matches(code.code(), || value.widen()) as u64) << bit;
      }
      *word = acc;
    }
  }
}

/// Processes rows four at a time so the compiler can keep the code comparisons in vector
/// registers, with a scalar loop for the tail of the column.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchKernel;

impl ScanKernel for BatchKernel {
  fn run<C: CodeWord, T: Numeric>(
    &self,
    plan: &ScanPlan,
    codes: &[C],
    base: &[T],
    out: &mut BitVector,
  ) {
    let chunks = codes.chunks(WORD_BITS).zip(base.chunks(WORD_BITS));
    for (word, (codes, base)) in out.words_mut().iter_mut().zip(chunks) {
      let mut acc = 0u64;
      let mut bit = 0;

      let mut code_quads = codes.chunks_exact(4);
      let mut base_quads = base.chunks_exact(4);
      for (c, b) in code_quads.by_ref().zip(base_quads.by_ref()) {
        let m0 = plan.matches(c[0].code(), || b[0].widen()) as u64;
        let m1 = plan.matches(c[1].code(), || b[1].widen()) as u64;
        let m2 = plan.matches(c[2].code(), || b[2].widen()) as u64;
        let m3 = plan.matches(c[3].code(), || b[3].widen()) as u64;
        acc |= (m0 | (m1 << 1) | (m2 << 2) | (m3 << 3)) << bit;
        bit += 4;
      }

      // Only the last word of a column whose length is not a multiple of four has a tail
      for (&code, &value) in code_quads.remainder().iter().zip(base_quads.remainder()) {
        acc |= (plan.matches(code.code(), || value.widen()) as u64) << bit;
        bit += 1;
      }
      *word = acc;
    }
  }
}

/// Evaluate `query` over a column using its sketch.
///
/// 8-bit sketches run through [`BatchKernel`], 16-bit sketches through [`RowKernel`].
///
/// Fails when the sketch does not have one code per row, when `query` is a `Between` with
/// `low > high`, or when a bound cannot be encoded by `map`.
pub fn scan<T: Numeric>(
  map: &CompressionMap,
  sketch: &Sketch,
  base: &[T],
  query: &QuerySpec,
) -> Result<BitVector> {
  match sketch {
    Sketch::U8(codes) => scan_with(&BatchKernel, map, codes, base, query),
    Sketch::U16(codes) => scan_with(&RowKernel, map, codes, base, query),
  }
}

/// Evaluate `query` with an explicit kernel.
pub fn scan_with<K: ScanKernel, C: CodeWord, T: Numeric>(
  kernel: &K,
  map: &CompressionMap,
  codes: &[C],
  base: &[T],
  query: &QuerySpec,
) -> Result<BitVector> {
  if codes.len() != base.len() {
    return Err(Error::Format(format!(
      "sketch has {} codes for {} rows",
      codes.len(),
      base.len()
    )));
  }
  if map.total_codes() > C::WIDTH.capacity() {
    return Err(Error::Validation(format!(
      "{} codes do not fit in a {}-bit sketch",
      map.total_codes(),
      C::WIDTH.bits()
    )));
  }

  let plan = ScanPlan::new(map, query)?;
  let mut out = BitVector::new(base.len() as u64);
  kernel.run(&plan, codes, base, &mut out);
  Ok(out)
}

#[cfg(test)]
mod tests {
  use rand::{rngs::SmallRng, Rng, SeedableRng};
  use rstest::rstest;

  use super::*;
  use crate::compression_map::BuildOptions;

  fn full_scan<T: Numeric>(base: &[T], query: &QuerySpec) -> Vec<u64> {
    base
      .iter()
      .enumerate()
      .filter(|(_, v)| query.matches(v.widen()))
      .map(|(i, _)| i as u64)
      .collect()
  }

  fn build(column: &[u64], max_codes: u32, unique_cutoff: usize) -> (CompressionMap, Sketch) {
    let options = BuildOptions {
      max_codes,
      sample_size: 10_000,
      unique_cutoff,
    };
    let map = CompressionMap::build(column, &options).unwrap();
    let sketch = map.compress_array(column).unwrap();
    (map, sketch)
  }

  #[test]
  fn test_lt_with_demoted_uniques() {
    let column: Vec<u64> = vec![5, 5, 5, 1, 2, 3, 4, 5, 6, 7];
    let options = BuildOptions {
      max_codes: 4,
      sample_size: 10,
      unique_cutoff: 1,
    };
    let map = CompressionMap::build(&column, &options).unwrap();
    let sketch = map.compress_array(&column).unwrap();

    let result = scan(&map, &sketch, &column, &QuerySpec::Lt(5)).unwrap();
    assert_eq!(vec![3u64, 4, 5, 6], result.iter_ones().collect::<Vec<_>>());
  }

  #[test]
  fn test_eq_unique_needs_no_probe() {
    let column: Vec<u64> = vec![10, 20, 30, 40, 50];
    let (map, sketch) = build(&column, 5, 1);

    let result = scan(&map, &sketch, &column, &QuerySpec::Eq(30)).unwrap();
    assert_eq!(vec![2u64], result.iter_ones().collect::<Vec<_>>());

    // With an exact code the raw values are never read, garbage base gives the same answer
    let garbage = vec![0u64; column.len()];
    let result = scan(&map, &sketch, &garbage, &QuerySpec::Eq(30)).unwrap();
    assert_eq!(vec![2u64], result.iter_ones().collect::<Vec<_>>());
  }

  #[test]
  fn test_plan_eq_variants() {
    let dictionary = CompressionMap::from_parts(vec![10, 20], vec![]).unwrap();
    assert_eq!(
      ScanPlan::EqExact { code: 1 },
      ScanPlan::new(&dictionary, &QuerySpec::Eq(20)).unwrap()
    );

    let ranges = CompressionMap::from_parts(vec![], vec![10, 20]).unwrap();
    assert_eq!(
      ScanPlan::EqProbe { code: 1, value: 15 },
      ScanPlan::new(&ranges, &QuerySpec::Eq(15)).unwrap()
    );
  }

  #[test]
  fn test_unencodable_bound() {
    let column: Vec<u64> = vec![10, 20, 30];
    let (map, sketch) = build(&column, 8, 1);
    assert!(map.endpoints().is_empty());
    assert!(matches!(
      scan(&map, &sketch, &column, &QuerySpec::Lt(25)),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn test_between_out_of_order_rejected() {
    let column: Vec<u64> = (0..100).collect();
    let (map, sketch) = build(&column, 8, 1);
    assert!(matches!(
      scan(&map, &sketch, &column, &QuerySpec::Between(50, 10)),
      Err(Error::Validation(_))
    ));
    assert_eq!(QuerySpec::Between(10, 50), QuerySpec::between(50, 10));
  }

  #[test]
  fn test_length_mismatch() {
    let column: Vec<u64> = (0..100).collect();
    let (map, sketch) = build(&column, 8, 1);
    assert!(matches!(
      scan(&map, &sketch, &column[..99], &QuerySpec::Lt(10)),
      Err(Error::Format(_))
    ));
  }

  #[rstest]
  #[case(QuerySpec::Lt(0))]
  #[case(QuerySpec::Lt(u64::MAX))]
  #[case(QuerySpec::Eq(3))]
  #[case(QuerySpec::Between(0, u64::MAX))]
  #[case(QuerySpec::Between(2, 2))]
  fn test_single_code_budget(#[case] query: QuerySpec) {
    let column: Vec<u64> = vec![3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5];
    let (map, sketch) = build(&column, 1, 1);
    assert_eq!(1, map.total_codes());

    let result = scan(&map, &sketch, &column, &query).unwrap();
    assert_eq!(full_scan(&column, &query), result.iter_ones().collect::<Vec<_>>());
  }

  #[test]
  fn test_between_same_bucket() {
    let column: Vec<u64> = (0..1_000).collect();
    let (map, sketch) = build(&column, 4, 1);
    let query = QuerySpec::Between(100, 120);
    let plan = ScanPlan::new(&map, &query).unwrap();
    assert!(matches!(plan, ScanPlan::Between { low_code, high_code, .. } if low_code == high_code));

    let result = scan(&map, &sketch, &column, &query).unwrap();
    assert_eq!((100..=120u64).collect::<Vec<_>>(), result.iter_ones().collect::<Vec<_>>());
  }

  #[rstest]
  #[case(1)]
  #[case(3)]
  #[case(63)]
  #[case(64)]
  #[case(65)]
  #[case(1_001)]
  fn test_kernels_agree(#[case] rows: usize) {
    let mut rng = SmallRng::seed_from_u64(rows as u64);
    let column: Vec<u32> = (0..rows).map(|_| rng.gen_range(0..500)).collect();
    // Values seen once stay in the range pool, so bounds absent from the column still encode.
    let map = CompressionMap::build(
      &column,
      &BuildOptions {
        max_codes: 16,
        sample_size: 100,
        unique_cutoff: 2,
      },
    )
    .unwrap();
    assert!(!map.endpoints().is_empty());
    let codes: Vec<u16> = column
      .iter()
      .map(|&v| map.code_of(v as u64).unwrap().code as u16)
      .collect();

    for query in [
      QuerySpec::Lt(250),
      QuerySpec::Eq(column[0] as u64),
      QuerySpec::between(100, 300),
    ] {
      let reference = scan_with(&RowKernel, &map, &codes, &column, &query).unwrap();
      let batched = scan_with(&BatchKernel, &map, &codes, &column, &query).unwrap();
      assert_eq!(reference, batched);
      assert_eq!(
        full_scan(&column, &query),
        reference.iter_ones().collect::<Vec<_>>()
      );
    }
  }

  #[test]
  fn test_interleaved_uniques_match_full_scan() {
    // Heavy hitters become uniques that sit inside buckets
    let mut rng = SmallRng::seed_from_u64(3);
    let column: Vec<u64> = (0..20_000)
      .map(|_| {
        if rng.gen_ratio(1, 4) {
          [123, 4_567, 8_000][rng.gen_range(0..3)]
        } else {
          rng.gen_range(0..10_000)
        }
      })
      .collect();
    let (map, sketch) = build(&column, 32, 100);
    assert_eq!(&[123u64, 4_567, 8_000], map.uniques());
    assert!(!map.endpoints().is_empty());

    let mut queries = vec![];
    for v in [0, 122, 123, 124, 4_566, 4_567, 4_568, 7_999, 8_000, 8_001, 20_000] {
      queries.push(QuerySpec::Lt(v));
      queries.push(QuerySpec::Eq(v));
      queries.push(QuerySpec::between(v, v + 1_000));
    }
    for &e in map.endpoints() {
      queries.push(QuerySpec::Lt(e));
      queries.push(QuerySpec::Eq(e));
      queries.push(QuerySpec::between(e, e));
    }

    for query in queries {
      let result = scan(&map, &sketch, &column, &query).unwrap();
      assert_eq!(
        full_scan(&column, &query),
        result.iter_ones().collect::<Vec<_>>(),
        "{query}"
      );
    }
  }

  #[test]
  fn test_wide_codes() {
    let column: Vec<u64> = (0..20_000).map(|i| (i * 7919) % 20_011).collect();
    let (map, sketch) = build(&column, 4_096, 1);
    assert!(matches!(sketch, Sketch::U16(_)));

    for query in [
      QuerySpec::Lt(10_000),
      QuerySpec::Eq(7_919),
      QuerySpec::between(5_000, 5_100),
    ] {
      let result = scan(&map, &sketch, &column, &query).unwrap();
      assert_eq!(full_scan(&column, &query), result.iter_ones().collect::<Vec<_>>());
    }
  }
}
