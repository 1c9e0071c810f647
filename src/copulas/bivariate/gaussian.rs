use std::f64::consts::FRAC_PI_2;

use crate::copulas::bivariate::PairFamily;
use crate::copulas::univariate::gaussian::StandardNormal;
use crate::traits::clip_unit;
use crate::traits::BivariateExt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
  pub rho: f64,
}

impl Gaussian {
  pub const MAX_RHO: f64 = 0.9999;

  /// `rho = sin(pi tau / 2)`.
  pub fn from_tau(tau: f64) -> Option<Self> {
    if !tau.is_finite() || tau.abs() >= 1.0 {
      return None;
    }
    let rho = (FRAC_PI_2 * tau).sin().clamp(-Self::MAX_RHO, Self::MAX_RHO);
    Some(Self { rho })
  }
}

impl BivariateExt for Gaussian {
  fn family(&self) -> PairFamily {
    PairFamily::Gaussian
  }

  fn n_params(&self) -> usize {
    1
  }

  fn tau(&self) -> f64 {
    self.rho.asin() / FRAC_PI_2
  }

  fn pdf(&self, u1: f64, u2: f64) -> f64 {
    self.log_pdf(u1, u2).exp()
  }

  fn log_pdf(&self, u1: f64, u2: f64) -> f64 {
    let r = self.rho;
    let x = StandardNormal::ppf(clip_unit(u1));
    let y = StandardNormal::ppf(clip_unit(u2));
    let one_m = 1.0 - r * r;
    -0.5 * one_m.ln() - (r * r * (x * x + y * y) - 2.0 * r * x * y) / (2.0 * one_m)
  }

  fn h(&self, u1: f64, u2: f64) -> f64 {
    let r = self.rho;
    let x = StandardNormal::ppf(clip_unit(u1));
    let y = StandardNormal::ppf(clip_unit(u2));
    clip_unit(StandardNormal::cdf((y - r * x) / (1.0 - r * r).sqrt()))
  }

  fn hinv(&self, p: f64, u1: f64) -> f64 {
    let r = self.rho;
    let x = StandardNormal::ppf(clip_unit(u1));
    let q = StandardNormal::ppf(clip_unit(p));
    clip_unit(StandardNormal::cdf(q * (1.0 - r * r).sqrt() + r * x))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tau_maps_to_sine_correlation() {
    let g = Gaussian::from_tau(0.5).unwrap();
    assert!((g.rho - (std::f64::consts::PI / 4.0).sin()).abs() < 1e-12);
    assert!((g.tau() - 0.5).abs() < 1e-12);
  }

  #[test]
  fn inverse_matches_h() {
    let g = Gaussian { rho: -0.6 };
    for (p, u1) in [(0.05, 0.5), (0.5, 0.9), (0.8, 0.3)] {
      assert!((g.h(u1, g.hinv(p, u1)) - p).abs() < 1e-9);
    }
  }

  #[test]
  fn zero_correlation_is_independence() {
    let g = Gaussian { rho: 0.0 };
    assert!((g.pdf(0.2, 0.9) - 1.0).abs() < 1e-12);
    assert!((g.h(0.2, 0.9) - 0.9).abs() < 1e-9);
  }
}
