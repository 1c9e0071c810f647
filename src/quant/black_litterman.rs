//! # Black–Litterman
//!
//! $$
//! \pi=\delta\Sigma w_{mkt},\qquad
//! \mu_{BL}=\pi+\tau\Sigma P^\top\left(P\tau\Sigma P^\top+\Omega\right)^{-1}(q-P\pi)
//! $$
//!
//! $$
//! \Sigma_{BL}=\Sigma+\tau\Sigma-\tau\Sigma P^\top\left(P\tau\Sigma P^\top+\Omega\right)^{-1}P\tau\Sigma
//! $$
//!
use nalgebra::DMatrix;
use ndarray::Array1;
use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::error::ensure_dim;
use crate::error::AllocationError;
use crate::error::Result;
use crate::quant::scenarios::ScenarioMatrix;
use crate::quant::universe::AssetUniverse;
use crate::quant::views::Views;
use crate::stats::linalg::ensure_full_rank;
use crate::stats::linalg::is_symmetric_psd;
use crate::stats::linalg::psd_factor;
use crate::stats::linalg::spd_inverse;
use crate::stats::linalg::symmetrize;
use crate::stats::linalg::to_array1;
use crate::stats::linalg::to_array2;
use crate::stats::linalg::to_dmatrix;
use crate::stats::linalg::to_dvector;

#[derive(Debug, Clone)]
pub struct BlackLittermanConfig {
  /// Risk aversion `δ`.
  pub delta: f64,
  /// Prior uncertainty scale `τ`.
  pub tau: f64,
  /// View uncertainty `Ω` (`k×k`). Defaults to `diag(P τΣ Pᵀ)`.
  pub omega: Option<Array2<f64>>,
  /// Market capitalization weights. Defaults to equal weights.
  pub market_weights: Option<Array1<f64>>,
  /// Relative tolerance of the posterior PSD check.
  pub psd_tolerance: f64,
}

/// Allowed deviation of `Σ w_market` from one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-8;

impl Default for BlackLittermanConfig {
  fn default() -> Self {
    Self {
      delta: 2.5,
      tau: 0.05,
      omega: None,
      market_weights: None,
      psd_tolerance: 1e-10,
    }
  }
}

/// Implied equilibrium excess returns `π = δ Σ w`. The market weights must be
/// finite and sum to one.
pub fn equilibrium_returns(
  covariance: &Array2<f64>,
  market_weights: &Array1<f64>,
  delta: f64,
) -> Result<Array1<f64>> {
  ensure_dim("covariance rows", covariance.ncols(), covariance.nrows())?;
  ensure_dim("market weights", covariance.ncols(), market_weights.len())?;
  if market_weights.iter().any(|w| !w.is_finite()) {
    return Err(AllocationError::InvalidInput(
      "market weights contain non-finite values".into(),
    ));
  }
  let total = market_weights.sum();
  if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
    return Err(AllocationError::InvalidInput(format!(
      "market weights sum to {total}, expected 1"
    )));
  }
  Ok(covariance.dot(market_weights) * delta)
}

/// Posterior return distribution.
#[derive(Debug, Clone)]
pub struct Posterior {
  pub mean: Array1<f64>,
  pub covariance: Array2<f64>,
  pub universe: AssetUniverse,
  /// Equilibrium prior the views were blended with.
  pub prior: Array1<f64>,
}

impl Posterior {
  /// Draws `m` i.i.d. returns from `N(μ_BL, Σ_BL)`.
  pub fn sample(&self, m: usize, seed: Option<u64>) -> Result<ScenarioMatrix> {
    let sigma = to_dmatrix(self.covariance.view());
    let factor = match sigma.clone().cholesky() {
      Some(c) => c.l(),
      None => {
        debug!("posterior covariance is only semi-definite, using eigen factor");
        psd_factor(&sigma)
      }
    };

    let mut rng = match seed {
      Some(s) => StdRng::seed_from_u64(s),
      None => StdRng::from_entropy(),
    };
    let n = self.mean.len();
    let z = Array2::<f64>::random_using((m, n), StandardNormal, &mut rng);
    let draws = z.dot(&to_array2(&factor).t()) + &self.mean;
    ScenarioMatrix::new(self.universe.clone(), draws)
  }
}

/// Blends the views with the equilibrium prior implied by `covariance`.
pub fn posterior(
  covariance: &Array2<f64>,
  views: &Views,
  cfg: &BlackLittermanConfig,
) -> Result<Posterior> {
  let universe = &views.universe;
  let n = universe.len();
  universe.check("covariance rows", covariance.nrows())?;
  universe.check("covariance columns", covariance.ncols())?;
  universe.check("pick columns", views.pick.ncols())?;
  ensure_dim("view returns", views.pick.nrows(), views.q.len())?;
  if !(cfg.tau > 0.0) || !cfg.delta.is_finite() {
    return Err(AllocationError::InvalidInput(
      "tau must be positive and delta finite".into(),
    ));
  }

  let sigma = to_dmatrix(covariance.view());
  ensure_full_rank(&sigma, "covariance matrix")?;

  let w = match &cfg.market_weights {
    Some(w) => w.clone(),
    None => Array1::from_elem(n, 1.0 / n as f64),
  };
  let pi = equilibrium_returns(covariance, &w, cfg.delta)?;

  let p = to_dmatrix(views.pick.view());
  let tau_sigma = &sigma * cfg.tau;
  let p_ts_pt = &p * &tau_sigma * p.transpose();
  let omega = match &cfg.omega {
    Some(o) => {
      ensure_dim("omega rows", views.len(), o.nrows())?;
      ensure_dim("omega columns", views.len(), o.ncols())?;
      to_dmatrix(o.view())
    }
    None => DMatrix::from_diagonal(&p_ts_pt.diagonal()),
  };
  let middle = spd_inverse(&(&p_ts_pt + omega), "view precision matrix")?;

  let pi_v = to_dvector(&pi);
  let q = to_dvector(&views.q);
  let gain = &tau_sigma * p.transpose() * &middle;
  let mean = &pi_v + &gain * (q - &p * &pi_v);
  let cov = symmetrize(&(&sigma + &tau_sigma - &gain * &p * &tau_sigma));

  if mean.iter().any(|v| !v.is_finite()) {
    return Err(AllocationError::NumericOverflow(
      "posterior mean is not finite".into(),
    ));
  }
  if !is_symmetric_psd(&cov, cfg.psd_tolerance) {
    return Err(AllocationError::SingularMatrix(
      "posterior covariance is not positive semi-definite".into(),
    ));
  }

  debug!(n, views = views.len(), "black-litterman posterior");
  Ok(Posterior {
    mean: to_array1(&mean),
    covariance: to_array2(&cov),
    universe: universe.clone(),
    prior: pi,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::Axis;

  use super::*;
  use crate::stats::linalg::sample_covariance;

  fn sigma() -> Array2<f64> {
    array![
      [0.040, 0.006, 0.002],
      [0.006, 0.090, 0.010],
      [0.002, 0.010, 0.025]
    ]
  }

  fn views(q: Array1<f64>) -> Views {
    let u = AssetUniverse::new(["A", "B", "C"]).unwrap();
    Views {
      pick: Array2::eye(3),
      q,
      universe: u,
    }
  }

  #[test]
  fn equilibrium_is_linear_in_delta() {
    let w = array![0.5, 0.3, 0.2];
    let a = equilibrium_returns(&sigma(), &w, 1.0).unwrap();
    let b = equilibrium_returns(&sigma(), &w, 3.0).unwrap();
    for i in 0..3 {
      assert_abs_diff_eq!(b[i], 3.0 * a[i], epsilon = 1e-14);
    }
  }

  #[test]
  fn vague_views_leave_prior_unchanged() {
    let v = views(array![0.3, -0.2, 0.1]);
    let cfg = BlackLittermanConfig {
      omega: Some(Array2::eye(3) * 1e12),
      ..BlackLittermanConfig::default()
    };
    let post = posterior(&sigma(), &v, &cfg).unwrap();
    let s = sigma();
    for i in 0..3 {
      assert_abs_diff_eq!(post.mean[i], post.prior[i], epsilon = 1e-9);
      for j in 0..3 {
        assert_abs_diff_eq!(post.covariance[[i, j]], 1.05 * s[[i, j]], epsilon = 1e-12);
      }
    }
  }

  #[test]
  fn certain_views_dominate() {
    let q = array![0.3, -0.2, 0.1];
    let v = views(q.clone());
    let cfg = BlackLittermanConfig {
      omega: Some(Array2::eye(3) * 1e-12),
      ..BlackLittermanConfig::default()
    };
    let post = posterior(&sigma(), &v, &cfg).unwrap();
    for i in 0..3 {
      assert_abs_diff_eq!(post.mean[i], q[i], epsilon = 1e-6);
    }
  }

  #[test]
  fn default_omega_blends_halfway_for_identity_views() {
    // With P = I and Ω = diag(τΣ), a diagonal Σ gives μ = (π + q) / 2.
    let s = array![[0.04, 0.0], [0.0, 0.09]];
    let u = AssetUniverse::new(["A", "B"]).unwrap();
    let v = Views {
      pick: Array2::eye(2),
      q: array![0.2, 0.1],
      universe: u,
    };
    let post = posterior(&s, &v, &BlackLittermanConfig::default()).unwrap();
    for i in 0..2 {
      assert_abs_diff_eq!(post.mean[i], 0.5 * (post.prior[i] + v.q[i]), epsilon = 1e-12);
    }
  }

  #[test]
  fn identical_assets_make_covariance_singular() {
    let s = array![
      [0.04, 0.04, 0.01],
      [0.04, 0.04, 0.01],
      [0.01, 0.01, 0.03]
    ];
    for q in [array![0.0, 0.0, 0.0], array![0.01, -0.02, 0.0]] {
      let res = posterior(&s, &views(q), &BlackLittermanConfig::default());
      assert!(matches!(res, Err(AllocationError::SingularMatrix(_))));
    }
  }

  #[test]
  fn market_weights_must_sum_to_one() {
    let s = array![[0.04, 0.01], [0.01, 0.09]];
    assert!(matches!(
      equilibrium_returns(&s, &array![5.0, -3.0], 2.5),
      Err(AllocationError::InvalidInput(_))
    ));
    assert!(matches!(
      equilibrium_returns(&s, &array![f64::NAN, 1.0], 2.5),
      Err(AllocationError::InvalidInput(_))
    ));

    let u = AssetUniverse::new(["A", "B"]).unwrap();
    let v = Views {
      pick: Array2::eye(2),
      q: array![0.0, 0.0],
      universe: u,
    };
    let cfg = BlackLittermanConfig {
      market_weights: Some(array![0.6, 0.6]),
      ..BlackLittermanConfig::default()
    };
    assert!(matches!(
      posterior(&s, &v, &cfg),
      Err(AllocationError::InvalidInput(_))
    ));
  }

  #[test]
  fn samples_match_posterior_moments() {
    let m = 1000;
    let v = views(array![0.05, -0.02, 0.03]);
    let post = posterior(&sigma(), &v, &BlackLittermanConfig::default()).unwrap();
    let draws = post.sample(m, Some(7)).unwrap();
    let r = draws.returns();
    let mean = r.mean_axis(Axis(0)).unwrap();
    let cov = sample_covariance(r).unwrap();
    for i in 0..3 {
      let se = (post.covariance[[i, i]] / m as f64).sqrt();
      assert!(
        (mean[i] - post.mean[i]).abs() < 3.0 * se,
        "asset {i}: {} vs {} (se {se})",
        mean[i],
        post.mean[i]
      );
      // sd of a sample variance is about σ²·sqrt(2/m)
      let var_se = post.covariance[[i, i]] * (2.0 / m as f64).sqrt();
      assert!((cov[[i, i]] - post.covariance[[i, i]]).abs() < 4.0 * var_se);
    }
  }

  #[test]
  fn seeded_sampling_is_reproducible() {
    let post = posterior(&sigma(), &views(array![0.0, 0.0, 0.0]), &BlackLittermanConfig::default())
      .unwrap();
    let a = post.sample(10, Some(3)).unwrap();
    let b = post.sample(10, Some(3)).unwrap();
    assert_eq!(a.returns(), b.returns());
  }
}
