use std::f64::consts::FRAC_PI_2;

use statrs::distribution::ContinuousCDF;
use statrs::distribution::StudentsT;
use statrs::function::gamma::ln_gamma;

use crate::copulas::bivariate::PairFamily;
use crate::traits::clip_unit;
use crate::traits::BivariateExt;

/// Degrees of freedom searched by the profile likelihood.
pub const NU_GRID: [f64; 10] = [2.5, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 15.0, 20.0, 30.0];

/// Student-t copula with correlation `rho` and `nu` degrees of freedom.
#[derive(Debug, Clone)]
pub struct Student {
  pub rho: f64,
  pub nu: f64,
  t_nu: StudentsT,
  t_nu1: StudentsT,
  log_norm: f64,
}

impl Student {
  pub const MAX_RHO: f64 = 0.9999;

  pub fn new(rho: f64, nu: f64) -> Option<Self> {
    if !(rho.abs() < 1.0) || !(nu > 0.0) {
      return None;
    }
    let t_nu = StudentsT::new(0.0, 1.0, nu).ok()?;
    let t_nu1 = StudentsT::new(0.0, 1.0, nu + 1.0).ok()?;
    let log_norm = ln_gamma((nu + 2.0) / 2.0) + ln_gamma(nu / 2.0)
      - 2.0 * ln_gamma((nu + 1.0) / 2.0)
      - 0.5 * (1.0 - rho * rho).ln();
    Some(Self {
      rho,
      nu,
      t_nu,
      t_nu1,
      log_norm,
    })
  }

  /// `rho` by inversion of Kendall's tau, `nu` by maximizing the likelihood
  /// over [`NU_GRID`].
  pub fn fit(tau: f64, u1: &[f64], u2: &[f64]) -> Option<Self> {
    if !tau.is_finite() || tau.abs() >= 1.0 {
      return None;
    }
    let rho = (FRAC_PI_2 * tau).sin().clamp(-Self::MAX_RHO, Self::MAX_RHO);
    NU_GRID
      .iter()
      .filter_map(|&nu| Self::new(rho, nu))
      .map(|c| {
        let ll = c.log_likelihood(u1, u2);
        (c, ll)
      })
      .filter(|(_, ll)| ll.is_finite())
      .max_by(|a, b| a.1.total_cmp(&b.1))
      .map(|(c, _)| c)
  }

  fn conditional_scale(&self, x: f64) -> f64 {
    ((self.nu + x * x) * (1.0 - self.rho * self.rho) / (self.nu + 1.0)).sqrt()
  }
}

impl BivariateExt for Student {
  fn family(&self) -> PairFamily {
    PairFamily::Student
  }

  fn n_params(&self) -> usize {
    2
  }

  fn tau(&self) -> f64 {
    self.rho.asin() / FRAC_PI_2
  }

  fn pdf(&self, u1: f64, u2: f64) -> f64 {
    self.log_pdf(u1, u2).exp()
  }

  fn log_pdf(&self, u1: f64, u2: f64) -> f64 {
    let (r, nu) = (self.rho, self.nu);
    let x = self.t_nu.inverse_cdf(clip_unit(u1));
    let y = self.t_nu.inverse_cdf(clip_unit(u2));
    let q = (x * x + y * y - 2.0 * r * x * y) / (nu * (1.0 - r * r));
    self.log_norm - (nu + 2.0) / 2.0 * q.ln_1p()
      + (nu + 1.0) / 2.0 * ((x * x / nu).ln_1p() + (y * y / nu).ln_1p())
  }

  fn h(&self, u1: f64, u2: f64) -> f64 {
    let x = self.t_nu.inverse_cdf(clip_unit(u1));
    let y = self.t_nu.inverse_cdf(clip_unit(u2));
    clip_unit(self.t_nu1.cdf((y - self.rho * x) / self.conditional_scale(x)))
  }

  fn hinv(&self, p: f64, u1: f64) -> f64 {
    let x = self.t_nu.inverse_cdf(clip_unit(u1));
    let q = self.t_nu1.inverse_cdf(clip_unit(p));
    clip_unit(self.t_nu.cdf(q * self.conditional_scale(x) + self.rho * x))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inverse_matches_h() {
    let c = Student::new(0.5, 4.0).unwrap();
    for (p, u1) in [(0.1, 0.2), (0.5, 0.5), (0.9, 0.97)] {
      assert!((c.h(u1, c.hinv(p, u1)) - p).abs() < 1e-6);
    }
  }

  #[test]
  fn density_is_derivative_of_h() {
    let c = Student::new(-0.3, 6.0).unwrap();
    let d = 1e-5;
    for (u1, u2) in [(0.3, 0.4), (0.7, 0.2)] {
      let fd = (c.h(u1, u2 + d) - c.h(u1, u2 - d)) / (2.0 * d);
      assert!((fd - c.pdf(u1, u2)).abs() < 1e-3);
    }
  }

  #[test]
  fn invalid_parameters_are_rejected() {
    assert!(Student::new(1.0, 4.0).is_none());
    assert!(Student::new(0.2, -1.0).is_none());
  }
}
