use gauss_quad::GaussLegendre;
use roots::find_root_brent;
use roots::SimpleConvergency;

use crate::copulas::bivariate::PairFamily;
use crate::traits::clip_unit;
use crate::traits::BivariateExt;

/// Frank copula, radially symmetric, `theta != 0` (negative values give
/// negative dependence).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frank {
  pub theta: f64,
}

impl Frank {
  pub const MAX_THETA: f64 = 60.0;
  const MIN_THETA: f64 = 1e-4;

  /// Inversion of `tau(theta) = 1 - 4/theta (1 - D_1(theta))` by Brent's
  /// method on `|tau|`; the sign of `theta` follows `tau`.
  pub fn from_tau(tau: f64) -> Option<Self> {
    let target = tau.abs();
    if !(target < 1.0) || target < Self::tau_of(Self::MIN_THETA) {
      return None;
    }
    let theta = if target >= Self::tau_of(Self::MAX_THETA) {
      Self::MAX_THETA
    } else {
      let f = |theta: f64| Self::tau_of(theta) - target;
      let mut convergency = SimpleConvergency {
        eps: 1e-12,
        max_iter: 200,
      };
      find_root_brent(Self::MIN_THETA, Self::MAX_THETA, f, &mut convergency).ok()?
    };
    Some(Self {
      theta: theta.copysign(tau),
    })
  }

  /// First Debye function `D_1(x) = 1/x ∫_0^x t/(e^t - 1) dt` for `x > 0`.
  fn debye1(x: f64) -> f64 {
    let Ok(quad) = GaussLegendre::new(32) else {
      return f64::NAN;
    };
    let integral = quad.integrate(0.0, x, |t: f64| t / t.exp_m1());
    integral / x
  }

  fn tau_of(theta: f64) -> f64 {
    1.0 - 4.0 / theta * (1.0 - Self::debye1(theta))
  }
}

impl BivariateExt for Frank {
  fn family(&self) -> PairFamily {
    PairFamily::Frank
  }

  fn n_params(&self) -> usize {
    1
  }

  fn tau(&self) -> f64 {
    Self::tau_of(self.theta.abs()).copysign(self.theta)
  }

  fn pdf(&self, u1: f64, u2: f64) -> f64 {
    let th = self.theta;
    let (u1, u2) = (clip_unit(u1), clip_unit(u2));
    let g = (-th).exp_m1();
    let den = g + (-th * u1).exp_m1() * (-th * u2).exp_m1();
    -th * g * (-th * (u1 + u2)).exp() / (den * den)
  }

  fn h(&self, u1: f64, u2: f64) -> f64 {
    let th = self.theta;
    let (u1, u2) = (clip_unit(u1), clip_unit(u2));
    let g = (-th).exp_m1();
    let am1 = (-th * u1).exp_m1();
    let bm1 = (-th * u2).exp_m1();
    clip_unit((am1 + 1.0) * bm1 / (g + am1 * bm1))
  }

  fn hinv(&self, p: f64, u1: f64) -> f64 {
    let th = self.theta;
    let (p, u1) = (clip_unit(p), clip_unit(u1));
    let g = (-th).exp_m1();
    let a = (-th * u1).exp();
    clip_unit(-(p * g / (p + a * (1.0 - p))).ln_1p() / th)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tau_inversion_round_trips() {
    for tau in [0.05, 0.3, 0.7] {
      let f = Frank::from_tau(tau).unwrap();
      assert!((f.tau() - tau).abs() < 1e-8, "{tau} -> {}", f.tau());
    }
    let neg = Frank::from_tau(-0.3).unwrap();
    assert!(neg.theta < 0.0);
    assert!((neg.tau() + 0.3).abs() < 1e-8);
  }

  #[test]
  fn closed_form_inverse_matches_h() {
    for theta in [-4.0, 0.5, 9.0] {
      let f = Frank { theta };
      for (p, u1) in [(0.1, 0.8), (0.6, 0.2), (0.99, 0.5)] {
        let u2 = f.hinv(p, u1);
        assert!((f.h(u1, u2) - p).abs() < 1e-9);
      }
    }
  }

  #[test]
  fn density_is_derivative_of_h() {
    let f = Frank { theta: 3.0 };
    let d = 1e-6;
    for (u1, u2) in [(0.3, 0.4), (0.8, 0.9), (0.1, 0.7)] {
      let fd = (f.h(u1, u2 + d) - f.h(u1, u2 - d)) / (2.0 * d);
      assert!((fd - f.pdf(u1, u2)).abs() < 1e-5);
    }
  }
}
