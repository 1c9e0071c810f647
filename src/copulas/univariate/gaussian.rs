use std::f64::consts::SQRT_2;

use statrs::function::erf::erfc;
use statrs::function::erf::erfc_inv;

const FRAC_1_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal marginal used to map between copula and normal scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardNormal;

impl StandardNormal {
  pub fn cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
  }

  pub fn pdf(x: f64) -> f64 {
    FRAC_1_SQRT_2PI * (-0.5 * x * x).exp()
  }

  /// Inverse CDF; `p = 0` and `p = 1` map to `-inf` and `+inf`.
  pub fn ppf(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * p)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quantile_inverts_cdf() {
    for x in [-3.0, -1.2, 0.0, 0.4, 2.5] {
      assert!((StandardNormal::ppf(StandardNormal::cdf(x)) - x).abs() < 1e-9);
    }
    assert!((StandardNormal::ppf(0.975) - 1.959_963_984_540_054).abs() < 1e-9);
  }

  #[test]
  fn boundary_quantiles_are_infinite() {
    assert!(StandardNormal::ppf(0.0).is_infinite());
    assert!(StandardNormal::ppf(1.0).is_infinite());
  }
}
