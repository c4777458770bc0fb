use anyhow::Result;
use column_sketch_core::Numeric;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Beta, Distribution, StandardNormal};

/// Shape of a synthetic column. Every shape is scaled to the full range of the column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDistribution {
  Uniform,
  /// Standard normal centred on the middle of the range, clamped at both ends.
  Normal,
  /// Beta(1, 5): moderately skewed towards small values.
  Beta,
}

pub fn gen_dataset<T: Numeric>(
  size: usize,
  distribution: DataDistribution,
  seed: u64,
) -> Result<Vec<T>> {
  let mut rng = SmallRng::seed_from_u64(seed);
  let scale = T::max_value().widen() as f64;
  let beta = Beta::new(1.0, 5.0)?;

  let data = (0..size)
    .map(|_| {
      let unit = match distribution {
        DataDistribution::Uniform => rng.gen::<f64>(),
        DataDistribution::Normal => {
          let x: f64 = StandardNormal.sample(&mut rng);
          (0.5 + x / 8.0).clamp(0.0, 1.0)
        }
        DataDistribution::Beta => beta.sample(&mut rng),
      };
      T::from_f64_saturating(unit * scale)
    })
    .collect();
  Ok(data)
}

/// A duplicate-heavy column: `heavy_share` of the rows are drawn from `heavy_hitters` values,
/// the rest uniformly from `[0, domain)`. Meant for domains well below 2^53.
pub fn gen_dataset_skewed<T: Numeric>(
  size: usize,
  heavy_hitters: usize,
  heavy_share: f64,
  domain: u64,
  seed: u64,
) -> Vec<T> {
  let mut rng = SmallRng::seed_from_u64(seed);
  let domain = domain.clamp(1, T::max_value().widen());
  let heavy: Vec<u64> = (0..heavy_hitters.max(1))
    .map(|_| rng.gen_range(0..domain))
    .collect();
  let heavy_share = heavy_share.clamp(0.0, 1.0);

  (0..size)
    .map(|_| {
      let value = if rng.gen_bool(heavy_share) {
        heavy[rng.gen_range(0..heavy.len())]
      } else {
        rng.gen_range(0..domain)
      };
      T::from_f64_saturating(value as f64)
    })
    .collect()
}
