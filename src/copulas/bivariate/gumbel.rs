use crate::copulas::bivariate::PairFamily;
use crate::traits::clip_unit;
use crate::traits::BivariateExt;

/// Gumbel copula, upper-tail dependence, `theta >= 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gumbel {
  pub theta: f64,
}

impl Gumbel {
  pub const MAX_THETA: f64 = 20.0;

  /// Inversion of `tau = 1 - 1/theta`; `None` for `tau <= 0`.
  pub fn from_tau(tau: f64) -> Option<Self> {
    if !(tau > 0.0 && tau < 1.0) {
      return None;
    }
    let theta = (1.0 / (1.0 - tau)).min(Self::MAX_THETA);
    (theta > 1.0 + 1e-6).then_some(Self { theta })
  }
}

impl BivariateExt for Gumbel {
  fn family(&self) -> PairFamily {
    PairFamily::Gumbel
  }

  fn n_params(&self) -> usize {
    1
  }

  fn tau(&self) -> f64 {
    1.0 - 1.0 / self.theta
  }

  fn pdf(&self, u1: f64, u2: f64) -> f64 {
    self.log_pdf(u1, u2).exp()
  }

  fn log_pdf(&self, u1: f64, u2: f64) -> f64 {
    let th = self.theta;
    let (u1, u2) = (clip_unit(u1), clip_unit(u2));
    let (x, y) = (-u1.ln(), -u2.ln());
    let s = x.powf(th) + y.powf(th);
    let a = s.powf(1.0 / th);
    -a + x + y + (th - 1.0) * (x.ln() + y.ln()) + (-2.0 + 2.0 / th) * s.ln()
      + (1.0 + (th - 1.0) / a).ln()
  }

  fn h(&self, u1: f64, u2: f64) -> f64 {
    let th = self.theta;
    let (u1, u2) = (clip_unit(u1), clip_unit(u2));
    let (x, y) = (-u1.ln(), -u2.ln());
    let a = (x.powf(th) + y.powf(th)).powf(1.0 / th);
    clip_unit((-a + (1.0 - th) * a.ln() + (th - 1.0) * x.ln() + x).exp())
  }
}
