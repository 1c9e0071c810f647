//! # Traits
//!
//! $$
//! h(u_2\mid u_1)=\frac{\partial C(u_1,u_2)}{\partial u_1},\qquad
//! c(u_1,\dots,u_d)=\prod_{e}c_e\left(u_{a_e\mid D_e},u_{b_e\mid D_e}\right)
//! $$
//!
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use rand::RngCore;
use roots::find_root_brent;
use roots::SimpleConvergency;

use crate::copulas::bivariate::PairFamily;
use crate::error::Result;

/// Values are clipped to `[UNIT_EPS, 1 - UNIT_EPS]` before evaluating copula
/// densities and h-functions.
pub const UNIT_EPS: f64 = 1e-10;

pub fn clip_unit(u: f64) -> f64 {
  u.clamp(UNIT_EPS, 1.0 - UNIT_EPS)
}

/// Unrotated bivariate copula family.
pub trait BivariateExt {
  fn family(&self) -> PairFamily;

  /// Number of estimated parameters.
  fn n_params(&self) -> usize;

  /// Kendall's tau implied by the parameters.
  fn tau(&self) -> f64;

  /// Copula density.
  fn pdf(&self, u1: f64, u2: f64) -> f64;

  fn log_pdf(&self, u1: f64, u2: f64) -> f64 {
    self.pdf(u1, u2).ln()
  }

  /// Conditional distribution `h(u2 | u1)`.
  fn h(&self, u1: f64, u2: f64) -> f64;

  /// Inverse of `h` in its second argument. Falls back to Brent's method.
  fn hinv(&self, p: f64, u1: f64) -> f64 {
    let p = clip_unit(p);
    let f = |u2: f64| self.h(u1, u2) - p;
    let mut convergency = SimpleConvergency {
      eps: 1e-12,
      max_iter: 200,
    };
    find_root_brent(UNIT_EPS, 1.0 - UNIT_EPS, f, &mut convergency)
      .map(clip_unit)
      .unwrap_or(if f(0.5) > 0.0 { UNIT_EPS } else { 1.0 - UNIT_EPS })
  }

  fn log_likelihood(&self, u1: &[f64], u2: &[f64]) -> f64 {
    u1.iter()
      .zip(u2.iter())
      .map(|(&a, &b)| self.log_pdf(clip_unit(a), clip_unit(b)))
      .sum()
  }
}

/// Fitted multivariate copula.
pub trait MultivariateExt {
  fn dim(&self) -> usize;

  /// Draws `n` rows in `(0,1)^d`.
  fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Array2<f64>;

  fn log_pdf(&self, u: ArrayView2<f64>) -> Result<Array1<f64>>;

  fn pdf(&self, u: ArrayView2<f64>) -> Result<Array1<f64>> {
    Ok(self.log_pdf(u)?.mapv(f64::exp))
  }
}
