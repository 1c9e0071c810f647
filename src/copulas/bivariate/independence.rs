use crate::copulas::bivariate::PairFamily;
use crate::traits::clip_unit;
use crate::traits::BivariateExt;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Independence;

impl BivariateExt for Independence {
  fn family(&self) -> PairFamily {
    PairFamily::Independence
  }

  fn n_params(&self) -> usize {
    0
  }

  fn tau(&self) -> f64 {
    0.0
  }

  fn pdf(&self, _u1: f64, _u2: f64) -> f64 {
    1.0
  }

  fn log_pdf(&self, _u1: f64, _u2: f64) -> f64 {
    0.0
  }

  fn h(&self, _u1: f64, u2: f64) -> f64 {
    clip_unit(u2)
  }

  fn hinv(&self, p: f64, _u1: f64) -> f64 {
    clip_unit(p)
  }
}
