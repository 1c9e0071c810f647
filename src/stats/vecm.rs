//! # VECM
//!
//! $$
//! \Delta y_t=\alpha\beta^\top y_{t-1}+\sum_{i=1}^{k}\Gamma_i\Delta y_{t-i}+u_t
//! $$
//!
//! Vector error-correction model without deterministic terms, estimated by
//! reduced-rank regression.
use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;
use tracing::warn;

use crate::error::AllocationError;
use crate::error::Result;
use crate::stats::johansen::difference;
use crate::stats::johansen::johansen;
use crate::stats::johansen::lagged_differences;
use crate::stats::johansen::reduced_rank_eigen;
use crate::stats::johansen::DeterministicTerm;
use crate::stats::johansen::JohansenConfig;
use crate::stats::linalg::least_squares;
use crate::stats::linalg::residualize;
use crate::stats::linalg::to_array2;
use crate::stats::linalg::to_dmatrix;

/// What to do when the selected cointegration rank is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankZeroPolicy {
  /// Fail with [`AllocationError::Cointegration`].
  #[default]
  Error,
  /// Fit a VAR in first differences (`Π = 0`).
  DifferencedVar,
}

#[derive(Debug, Clone, Copy)]
pub struct VecmConfig {
  /// Number of lagged differences.
  pub k_ar_diff: usize,
  /// Cointegration rank; `None` selects it with the Johansen trace test.
  pub rank: Option<usize>,
  /// Significance level of the rank test.
  pub significance: f64,
  /// Deterministic specification of the rank test.
  pub test_deterministic: DeterministicTerm,
  pub rank_zero: RankZeroPolicy,
  pub min_obs: usize,
}

impl Default for VecmConfig {
  fn default() -> Self {
    Self {
      k_ar_diff: 1,
      rank: None,
      significance: 0.05,
      test_deterministic: DeterministicTerm::Constant,
      rank_zero: RankZeroPolicy::Error,
      min_obs: 30,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Vecm {
  /// Loadings, `n×r`.
  pub alpha: Array2<f64>,
  /// Cointegrating vectors, `n×r`.
  pub beta: Array2<f64>,
  /// Short-run matrices `Γ_1..Γ_k`, each `n×n`.
  pub gamma: Vec<Array2<f64>>,
  pub rank: usize,
  /// Residual covariance `Σ_u`.
  pub sigma_u: Array2<f64>,
  /// Last `k+1` observed levels, oldest first.
  history: DMatrix<f64>,
}

impl Vecm {
  pub fn k_ar_diff(&self) -> usize {
    self.gamma.len()
  }

  /// Long-run impact matrix `Π = αβ'`.
  pub fn pi(&self) -> Array2<f64> {
    self.alpha.dot(&self.beta.t())
  }

  /// Level forecasts for `steps` periods ahead, one row per step.
  pub fn forecast(&self, steps: usize) -> Array2<f64> {
    let n = self.history.ncols();
    let k = self.k_ar_diff();
    let pi = to_dmatrix(self.pi().view());
    let gamma: Vec<DMatrix<f64>> = self.gamma.iter().map(|g| to_dmatrix(g.view())).collect();

    let mut levels: Vec<DVector<f64>> = self
      .history
      .row_iter()
      .map(|r| r.transpose().into_owned())
      .collect();
    let mut out = Array2::<f64>::zeros((steps, n));

    for s in 0..steps {
      let last = levels.len() - 1;
      let mut delta = &pi * &levels[last];
      for (i, g) in gamma.iter().enumerate().take(k) {
        let lagged = &levels[last - i] - &levels[last - i - 1];
        delta += g * lagged;
      }
      let next = &levels[last] + delta;
      for j in 0..n {
        out[[s, j]] = next[j];
      }
      levels.push(next);
    }
    out
  }

  /// One-step-ahead level forecast `y_{T+1}`.
  pub fn forecast_next(&self) -> Array1<f64> {
    self.forecast(1).row(0).to_owned()
  }
}

/// Fit a VECM to a `T×n` matrix of price levels.
pub fn fit_vecm(levels: &Array2<f64>, cfg: &VecmConfig) -> Result<Vecm> {
  let (t, n) = levels.dim();
  let k = cfg.k_ar_diff;

  let rank = match cfg.rank {
    Some(r) => r,
    None => {
      let test = johansen(
        levels,
        &JohansenConfig {
          deterministic: cfg.test_deterministic,
          k_ar_diff: k,
          min_obs: cfg.min_obs,
        },
      )?;
      test.rank(cfg.significance)
    }
  };
  if rank > n {
    return Err(AllocationError::InvalidInput(format!(
      "cointegration rank {rank} exceeds {n} variables"
    )));
  }
  if rank == 0 {
    match cfg.rank_zero {
      RankZeroPolicy::Error => {
        return Err(AllocationError::Cointegration(
          "no cointegration relation at the selected significance".into(),
        ));
      }
      RankZeroPolicy::DifferencedVar => {
        warn!("cointegration rank is zero, fitting a VAR in differences");
      }
    }
  }

  let min_obs = cfg.min_obs.max(k + n + 3);
  if t < min_obs {
    return Err(AllocationError::InvalidInput(format!(
      "vecm needs at least {min_obs} observations, got {t}"
    )));
  }
  if levels.iter().any(|v| !v.is_finite()) {
    return Err(AllocationError::InvalidInput(
      "price levels contain non-finite values".into(),
    ));
  }

  let x = to_dmatrix(levels.view());
  let dx = difference(&x);
  let m = dx.nrows() - k;
  let z = lagged_differences(&dx, k);
  let dy = dx.rows(k, m).into_owned();
  let ylag = x.rows(k, m).into_owned();

  let (alpha, beta) = if rank > 0 {
    let r0 = residualize(&dy, &z)?;
    let r1 = residualize(&ylag, &z)?;
    let (_, vectors) = reduced_rank_eigen(&r0, &r1)?;
    let beta = vectors.columns(0, rank).into_owned();
    let s01 = r0.transpose() * &r1 / m as f64;
    (s01 * &beta, beta)
  } else {
    (DMatrix::zeros(n, 0), DMatrix::zeros(n, 0))
  };
  let pi = &alpha * beta.transpose();

  let long_run = &dy - &ylag * pi.transpose();
  let (gamma, resid) = if k > 0 {
    let coef = least_squares(&long_run, &z)?;
    let resid = &long_run - &z * &coef;
    let gamma = (0..k)
      .map(|l| to_array2(&coef.rows(l * n, n).transpose()))
      .collect();
    (gamma, resid)
  } else {
    (Vec::new(), long_run)
  };
  let sigma_u = resid.transpose() * &resid / m as f64;

  debug!(n, rank, k_ar_diff = k, nobs = m, "vecm fitted");

  Ok(Vecm {
    alpha: to_array2(&alpha),
    beta: to_array2(&beta),
    gamma,
    rank,
    sigma_u: to_array2(&sigma_u),
    history: x.rows(t - k - 1, k + 1).into_owned(),
  })
}

/// Convenience wrapper returning `y_{T+1}` as an `n`-vector.
pub fn forecast_next_levels(levels: &Array2<f64>, cfg: &VecmConfig) -> Result<Array1<f64>> {
  let model = fit_vecm(levels, cfg)?;
  let next = model.forecast_next();
  if next.iter().any(|v| !v.is_finite()) {
    return Err(AllocationError::Estimation(
      "vecm forecast is not finite".into(),
    ));
  }
  Ok(next)
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::StandardNormal;

  use super::*;

  fn cointegrated_pair(t: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut levels = Array2::<f64>::zeros((t, 2));
    let mut trend = 100.0;
    let mut spread = 0.0;
    for i in 0..t {
      let a: f64 = StandardNormal.sample(&mut rng);
      let b: f64 = StandardNormal.sample(&mut rng);
      trend += a;
      spread = 0.3 * spread + b;
      levels[[i, 0]] = trend;
      levels[[i, 1]] = trend + spread;
    }
    levels
  }

  #[test]
  fn common_trend_lies_in_null_space_of_pi() {
    let cfg = VecmConfig {
      rank: Some(1),
      ..Default::default()
    };
    let model = fit_vecm(&cointegrated_pair(1000, 2), &cfg).unwrap();
    assert_eq!(model.rank, 1);
    let pi = model.pi();
    let drift = pi.dot(&ndarray::array![1.0, 1.0]);
    let scale = pi.iter().map(|v| v.abs()).fold(0.0, f64::max);
    assert!(drift.iter().all(|d| d.abs() < 0.2 * scale), "{pi:?}");
  }

  #[test]
  fn one_step_forecast_follows_the_recursion() {
    let levels = cointegrated_pair(400, 4);
    let model = fit_vecm(&levels, &VecmConfig::default()).unwrap();
    let t = levels.nrows();
    let y = levels.row(t - 1).to_owned();
    let dy = &y - &levels.row(t - 2);
    let expected = &y + &model.pi().dot(&y) + &model.gamma[0].dot(&dy);
    let got = model.forecast_next();
    for j in 0..2 {
      assert!((got[j] - expected[j]).abs() < 1e-9);
    }
  }

  #[test]
  fn multi_step_forecast_has_one_row_per_step() {
    let model = fit_vecm(&cointegrated_pair(300, 8), &VecmConfig::default()).unwrap();
    let f = model.forecast(5);
    assert_eq!(f.dim(), (5, 2));
    assert!(f.iter().all(|v| v.is_finite()));
    assert_eq!(f.row(0), model.forecast_next());
  }

  #[test]
  fn rank_zero_is_an_error_by_default() {
    let cfg = VecmConfig {
      rank: Some(0),
      ..Default::default()
    };
    let res = fit_vecm(&cointegrated_pair(200, 3), &cfg);
    assert!(matches!(res, Err(AllocationError::Cointegration(_))));
  }

  #[test]
  fn rank_zero_can_fall_back_to_differenced_var() {
    let cfg = VecmConfig {
      rank: Some(0),
      rank_zero: RankZeroPolicy::DifferencedVar,
      ..Default::default()
    };
    let model = fit_vecm(&cointegrated_pair(200, 3), &cfg).unwrap();
    assert!(model.pi().iter().all(|v| *v == 0.0));
    assert_eq!(model.gamma.len(), 1);
    assert!(forecast_next_levels(&cointegrated_pair(200, 3), &cfg).is_ok());
  }
}
