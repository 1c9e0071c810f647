//! # Bivariate
//!
//! $$
//! C_{90}(u_1,u_2)=u_2-C(1-u_1,u_2),\quad
//! C_{180}(u_1,u_2)=u_1+u_2-1+C(1-u_1,1-u_2),\quad
//! C_{270}(u_1,u_2)=u_1-C(u_1,1-u_2)
//! $$
//!
//! Pair-copula families, rotations and per-pair family selection.
use std::fmt::Display;

use tracing::trace;

pub use crate::traits::BivariateExt;
use crate::copulas::correlation::pair_tau;
use crate::error::AllocationError;
use crate::error::Result;

pub mod clayton;
pub mod frank;
pub mod gaussian;
pub mod gumbel;
pub mod independence;
pub mod student;

use clayton::Clayton;
use frank::Frank;
use gaussian::Gaussian;
use gumbel::Gumbel;
use independence::Independence;
use student::Student;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairFamily {
  Independence,
  Gaussian,
  Student,
  Clayton,
  Gumbel,
  Frank,
}

impl PairFamily {
  pub const ALL: [PairFamily; 6] = [
    PairFamily::Independence,
    PairFamily::Gaussian,
    PairFamily::Student,
    PairFamily::Clayton,
    PairFamily::Gumbel,
    PairFamily::Frank,
  ];
}

impl Display for PairFamily {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PairFamily::Independence => write!(f, "Independence"),
      PairFamily::Gaussian => write!(f, "Gaussian"),
      PairFamily::Student => write!(f, "Student"),
      PairFamily::Clayton => write!(f, "Clayton"),
      PairFamily::Gumbel => write!(f, "Gumbel"),
      PairFamily::Frank => write!(f, "Frank"),
    }
  }
}

/// Counter-clockwise rotation of an asymmetric family.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
  #[default]
  R0,
  R90,
  R180,
  R270,
}

impl Rotation {
  pub fn degrees(self) -> u16 {
    match self {
      Rotation::R0 => 0,
      Rotation::R90 => 90,
      Rotation::R180 => 180,
      Rotation::R270 => 270,
    }
  }

  /// 90 and 270 degree rotations turn positive into negative dependence.
  fn flips_sign(self) -> bool {
    matches!(self, Rotation::R90 | Rotation::R270)
  }
}

/// Information criterion used to pick a family for each pair.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCriterion {
  Aic,
  Bic,
  /// BIC with a sparsity prior favouring independence in higher trees.
  #[default]
  Mbicv,
}

impl SelectionCriterion {
  /// Score (lower is better) of a pair copula fitted on tree `tree`
  /// (0-based) with `nobs` observations.
  pub fn score(self, loglik: f64, n_params: usize, nobs: usize, tree: usize, psi0: f64) -> f64 {
    let k = n_params as f64;
    let n = nobs as f64;
    match self {
      SelectionCriterion::Aic => -2.0 * loglik + 2.0 * k,
      SelectionCriterion::Bic => -2.0 * loglik + k * n.ln(),
      SelectionCriterion::Mbicv => {
        let prior = psi0.powi(tree as i32 + 1);
        let log_prior = if n_params > 0 {
          prior.ln()
        } else {
          (1.0 - prior).ln()
        };
        -2.0 * loglik + k * n.ln() - 2.0 * log_prior
      }
    }
  }
}

/// Fitted pair copula, possibly rotated.
#[derive(Debug, Clone)]
pub enum PairCopula {
  Independence(Independence),
  Gaussian(Gaussian),
  Student(Student),
  Clayton(Clayton, Rotation),
  Gumbel(Gumbel, Rotation),
  Frank(Frank),
}

impl PairCopula {
  fn base(&self) -> &dyn BivariateExt {
    match self {
      PairCopula::Independence(c) => c,
      PairCopula::Gaussian(c) => c,
      PairCopula::Student(c) => c,
      PairCopula::Clayton(c, _) => c,
      PairCopula::Gumbel(c, _) => c,
      PairCopula::Frank(c) => c,
    }
  }

  pub fn rotation(&self) -> Rotation {
    match self {
      PairCopula::Clayton(_, r) | PairCopula::Gumbel(_, r) => *r,
      _ => Rotation::R0,
    }
  }

  /// Family parameters in a flat vector (`[rho, nu]` for Student).
  pub fn parameters(&self) -> Vec<f64> {
    match self {
      PairCopula::Independence(_) => vec![],
      PairCopula::Gaussian(c) => vec![c.rho],
      PairCopula::Student(c) => vec![c.rho, c.nu],
      PairCopula::Clayton(c, _) => vec![c.theta],
      PairCopula::Gumbel(c, _) => vec![c.theta],
      PairCopula::Frank(c) => vec![c.theta],
    }
  }

  /// Candidate copulas for one pair with empirical Kendall's `tau`; families
  /// whose parameter cannot represent `tau` are skipped.
  pub fn candidates(tau: f64, u1: &[f64], u2: &[f64], families: &[PairFamily]) -> Vec<PairCopula> {
    let (same, opposite) = if tau >= 0.0 {
      (Rotation::R0, Rotation::R180)
    } else {
      (Rotation::R90, Rotation::R270)
    };

    let mut out = Vec::new();
    for family in families {
      match family {
        PairFamily::Independence => out.push(PairCopula::Independence(Independence)),
        PairFamily::Gaussian => {
          if let Some(c) = Gaussian::from_tau(tau) {
            out.push(PairCopula::Gaussian(c));
          }
        }
        PairFamily::Student => {
          if let Some(c) = Student::fit(tau, u1, u2) {
            out.push(PairCopula::Student(c));
          }
        }
        PairFamily::Clayton => {
          if let Some(c) = Clayton::from_tau(tau.abs()) {
            out.push(PairCopula::Clayton(c, same));
            out.push(PairCopula::Clayton(c, opposite));
          }
        }
        PairFamily::Gumbel => {
          if let Some(c) = Gumbel::from_tau(tau.abs()) {
            out.push(PairCopula::Gumbel(c, same));
            out.push(PairCopula::Gumbel(c, opposite));
          }
        }
        PairFamily::Frank => {
          if let Some(c) = Frank::from_tau(tau) {
            out.push(PairCopula::Frank(c));
          }
        }
      }
    }
    out
  }
}

impl BivariateExt for PairCopula {
  fn family(&self) -> PairFamily {
    self.base().family()
  }

  fn n_params(&self) -> usize {
    self.base().n_params()
  }

  fn tau(&self) -> f64 {
    let tau = self.base().tau();
    if self.rotation().flips_sign() {
      -tau
    } else {
      tau
    }
  }

  fn pdf(&self, u1: f64, u2: f64) -> f64 {
    self.log_pdf(u1, u2).exp()
  }

  fn log_pdf(&self, u1: f64, u2: f64) -> f64 {
    let c = self.base();
    match self.rotation() {
      Rotation::R0 => c.log_pdf(u1, u2),
      Rotation::R90 => c.log_pdf(1.0 - u1, u2),
      Rotation::R180 => c.log_pdf(1.0 - u1, 1.0 - u2),
      Rotation::R270 => c.log_pdf(u1, 1.0 - u2),
    }
  }

  fn h(&self, u1: f64, u2: f64) -> f64 {
    let c = self.base();
    match self.rotation() {
      Rotation::R0 => c.h(u1, u2),
      Rotation::R90 => c.h(1.0 - u1, u2),
      Rotation::R180 => 1.0 - c.h(1.0 - u1, 1.0 - u2),
      Rotation::R270 => 1.0 - c.h(u1, 1.0 - u2),
    }
  }

  fn hinv(&self, p: f64, u1: f64) -> f64 {
    let c = self.base();
    match self.rotation() {
      Rotation::R0 => c.hinv(p, u1),
      Rotation::R90 => c.hinv(p, 1.0 - u1),
      Rotation::R180 => 1.0 - c.hinv(1.0 - p, 1.0 - u1),
      Rotation::R270 => 1.0 - c.hinv(1.0 - p, u1),
    }
  }
}

impl Display for PairCopula {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let params: Vec<String> = self.parameters().iter().map(|p| format!("{p:.4}")).collect();
    match self.rotation() {
      Rotation::R0 => write!(f, "{}({})", self.family(), params.join(", ")),
      r => write!(f, "{}{}({})", self.family(), r.degrees(), params.join(", ")),
    }
  }
}

/// Pair copula retained for an edge, with its in-sample fit statistics.
#[derive(Debug, Clone)]
pub struct PairFit {
  pub copula: PairCopula,
  pub empirical_tau: f64,
  pub log_likelihood: f64,
  pub score: f64,
}

/// Controls of [`select_pair_copula`].
#[derive(Debug, Clone, Copy)]
pub struct PairSelection<'a> {
  pub families: &'a [PairFamily],
  pub criterion: SelectionCriterion,
  pub psi0: f64,
  /// 0-based tree level of the edge.
  pub tree: usize,
}

/// Fits every candidate family by tau inversion and keeps the one with the
/// lowest criterion score.
pub fn select_pair_copula(u1: &[f64], u2: &[f64], sel: &PairSelection) -> Result<PairFit> {
  let n = u1.len();
  if n < 2 || u2.len() != n {
    return Err(AllocationError::DependenceFit(format!(
      "pair needs two equally long samples with at least 2 observations ({} vs {})",
      n,
      u2.len()
    )));
  }
  let tau = pair_tau(u1, u2)?;

  let mut best: Option<PairFit> = None;
  for copula in PairCopula::candidates(tau, u1, u2, sel.families) {
    let ll = copula.log_likelihood(u1, u2);
    if !ll.is_finite() {
      continue;
    }
    let score = sel
      .criterion
      .score(ll, copula.n_params(), n, sel.tree, sel.psi0);
    trace!(family = %copula, loglik = ll, score, "pair candidate");
    if best.as_ref().map_or(true, |b| score < b.score) {
      best = Some(PairFit {
        copula,
        empirical_tau: tau,
        log_likelihood: ll,
        score,
      });
    }
  }

  best.ok_or_else(|| {
    AllocationError::DependenceFit(format!(
      "no candidate family reached a finite likelihood (tau = {tau:.4})"
    ))
  })
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::Rng;
  use rand::SeedableRng;

  use super::*;

  fn sample_pair(c: &PairCopula, n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut u1 = Vec::with_capacity(n);
    let mut u2 = Vec::with_capacity(n);
    for _ in 0..n {
      let a: f64 = rng.gen();
      let p: f64 = rng.gen();
      u1.push(a);
      u2.push(c.hinv(p, a));
    }
    (u1, u2)
  }

  #[test]
  fn rotations_change_sign_of_tau() {
    let c = Clayton { theta: 2.0 };
    assert!(PairCopula::Clayton(c, Rotation::R0).tau() > 0.0);
    assert!(PairCopula::Clayton(c, Rotation::R90).tau() < 0.0);
    assert!(PairCopula::Clayton(c, Rotation::R180).tau() > 0.0);
    assert!(PairCopula::Clayton(c, Rotation::R270).tau() < 0.0);
  }

  #[test]
  fn rotated_inverse_matches_rotated_h() {
    let g = Gumbel { theta: 2.0 };
    for rot in [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270] {
      let c = PairCopula::Gumbel(g, rot);
      for (p, u1) in [(0.2, 0.3), (0.7, 0.85)] {
        assert!((c.h(u1, c.hinv(p, u1)) - p).abs() < 1e-7, "{rot:?}");
      }
    }
  }

  #[test]
  fn selects_lower_tail_family_for_clayton_data() {
    let truth = PairCopula::Clayton(Clayton { theta: 4.0 }, Rotation::R0);
    let (u1, u2) = sample_pair(&truth, 1500, 21);
    let sel = PairSelection {
      families: &PairFamily::ALL,
      criterion: SelectionCriterion::Bic,
      psi0: 0.9,
      tree: 0,
    };
    let fit = select_pair_copula(&u1, &u2, &sel).unwrap();
    assert_eq!(fit.copula.family(), PairFamily::Clayton);
    assert_eq!(fit.copula.rotation(), Rotation::R0);
    assert!((fit.empirical_tau - 2.0 / 3.0).abs() < 0.05);
  }

  #[test]
  fn independent_data_prefers_independence_under_mbicv() {
    let mut rng = StdRng::seed_from_u64(4);
    let u1: Vec<f64> = (0..400).map(|_| rng.gen()).collect();
    let u2: Vec<f64> = (0..400).map(|_| rng.gen()).collect();
    let sel = PairSelection {
      families: &PairFamily::ALL,
      criterion: SelectionCriterion::Mbicv,
      psi0: 0.9,
      tree: 2,
    };
    let fit = select_pair_copula(&u1, &u2, &sel).unwrap();
    assert!(fit.copula.tau().abs() < 0.1);
  }

  #[test]
  fn too_few_observations_fail() {
    let sel = PairSelection {
      families: &PairFamily::ALL,
      criterion: SelectionCriterion::Aic,
      psi0: 0.9,
      tree: 0,
    };
    assert!(matches!(
      select_pair_copula(&[0.5], &[0.5], &sel),
      Err(AllocationError::DependenceFit(_))
    ));
  }

  #[test]
  fn mbicv_penalizes_dependence_more_in_higher_trees() {
    let c = SelectionCriterion::Mbicv;
    let low = c.score(5.0, 1, 500, 0, 0.9) - c.score(0.0, 0, 500, 0, 0.9);
    let high = c.score(5.0, 1, 500, 4, 0.9) - c.score(0.0, 0, 500, 4, 0.9);
    assert!(high > low);
  }
}
