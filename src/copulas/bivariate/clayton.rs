use crate::copulas::bivariate::PairFamily;
use crate::traits::clip_unit;
use crate::traits::BivariateExt;

/// Clayton copula, lower-tail dependence, `theta > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clayton {
  pub theta: f64,
}

impl Clayton {
  pub const MAX_THETA: f64 = 28.0;

  /// Inversion of `tau = theta / (theta + 2)`; `None` for `tau <= 0`.
  pub fn from_tau(tau: f64) -> Option<Self> {
    if !(tau > 0.0 && tau < 1.0) {
      return None;
    }
    let theta = (2.0 * tau / (1.0 - tau)).min(Self::MAX_THETA);
    (theta > 1e-6).then_some(Self { theta })
  }
}

impl BivariateExt for Clayton {
  fn family(&self) -> PairFamily {
    PairFamily::Clayton
  }

  fn n_params(&self) -> usize {
    1
  }

  fn tau(&self) -> f64 {
    self.theta / (self.theta + 2.0)
  }

  fn pdf(&self, u1: f64, u2: f64) -> f64 {
    self.log_pdf(u1, u2).exp()
  }

  fn log_pdf(&self, u1: f64, u2: f64) -> f64 {
    let th = self.theta;
    let (u1, u2) = (clip_unit(u1), clip_unit(u2));
    let s = u1.powf(-th) + u2.powf(-th) - 1.0;
    (1.0 + th).ln() - (1.0 + th) * (u1.ln() + u2.ln()) - (2.0 + 1.0 / th) * s.ln()
  }

  fn h(&self, u1: f64, u2: f64) -> f64 {
    let th = self.theta;
    let (u1, u2) = (clip_unit(u1), clip_unit(u2));
    let s = u1.powf(-th) + u2.powf(-th) - 1.0;
    clip_unit(u1.powf(-th - 1.0) * s.powf(-1.0 / th - 1.0))
  }

  fn hinv(&self, p: f64, u1: f64) -> f64 {
    let th = self.theta;
    let (p, u1) = (clip_unit(p), clip_unit(u1));
    let a = (p * u1.powf(th + 1.0)).powf(-th / (th + 1.0));
    clip_unit((a + 1.0 - u1.powf(-th)).powf(-1.0 / th))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tau_inversion_round_trips() {
    let c = Clayton::from_tau(0.4).unwrap();
    assert!((c.theta - 4.0 / 3.0).abs() < 1e-12);
    assert!((c.tau() - 0.4).abs() < 1e-12);
    assert!(Clayton::from_tau(-0.2).is_none());
  }

  #[test]
  fn closed_form_inverse_matches_h() {
    let c = Clayton { theta: 2.5 };
    for (p, u1) in [(0.1, 0.3), (0.5, 0.5), (0.93, 0.07)] {
      let u2 = c.hinv(p, u1);
      assert!((c.h(u1, u2) - p).abs() < 1e-9);
    }
  }
}
