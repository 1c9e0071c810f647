//! # Portfolio Statistics
//!
//! $$
//! \mathrm{CVaR}_\alpha(L)=\min_v\ v+\frac{1}{\alpha m}\sum_{i=1}^m (L_i-v)^+
//! $$
//!
//! Scenario moments and the risk statistics reported next to every weight vector.

use std::cmp::Ordering;

use ndarray::Array1;
use ndarray::Array2;

use super::types::Diagnostics;
use crate::error::AllocationError;
use crate::error::Result;
use crate::quant::scenarios::ScenarioMatrix;
use crate::stats::linalg::column_means;
use crate::stats::linalg::sample_covariance;

/// Sample mean vector and covariance (ddof = 1) of the scenario rows.
pub fn scenario_moments(scenarios: &ScenarioMatrix) -> Result<(Array1<f64>, Array2<f64>)> {
  let r = scenarios.returns();
  Ok((column_means(r)?, sample_covariance(r)?))
}

/// Portfolio return in every scenario.
pub fn portfolio_returns(scenarios: &ScenarioMatrix, weights: &Array1<f64>) -> Result<Array1<f64>> {
  scenarios.universe().check("weights", weights.len())?;
  Ok(scenarios.returns().dot(weights))
}

/// Empirical CVaR of the loss `-r` at tail probability `alpha`.
///
/// Evaluates the Rockafellar–Uryasev function at its minimizer, the
/// `⌈αm⌉`-th largest loss, so it agrees with the LP objective.
pub fn empirical_cvar(returns: &[f64], alpha: f64) -> f64 {
  if returns.is_empty() {
    return 0.0;
  }

  let alpha = alpha.clamp(f64::EPSILON, 1.0);
  let mut losses: Vec<f64> = returns.iter().map(|r| -r).collect();
  losses.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
  let m = losses.len();
  let k = ((m as f64) * alpha).ceil() as usize;
  let var = losses[k.clamp(1, m) - 1];
  let excess: f64 = losses.iter().map(|l| (l - var).max(0.0)).sum();

  var + excess / (alpha * m as f64)
}

/// Return, volatility, CVaR and the two reward-to-risk ratios of `weights`.
pub fn diagnostics(scenarios: &ScenarioMatrix, weights: &Array1<f64>, alpha: f64) -> Result<Diagnostics> {
  if !(alpha > 0.0 && alpha <= 1.0) {
    return Err(AllocationError::InvalidInput(format!(
      "cvar tail probability {alpha} outside (0, 1]"
    )));
  }
  let pr = portfolio_returns(scenarios, weights)?;
  let (_, cov) = scenario_moments(scenarios)?;

  let expected_return = pr.mean().unwrap_or(0.0);
  let volatility = weights.dot(&cov.dot(weights)).max(0.0).sqrt();
  let cvar = empirical_cvar(&pr.to_vec(), alpha);

  let ratio = |num: f64, den: f64| if den.abs() < 1e-15 { 0.0 } else { num / den };
  Ok(Diagnostics::new(
    expected_return,
    volatility,
    cvar,
    ratio(expected_return, volatility),
    ratio(expected_return, cvar),
  ))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::quant::universe::AssetUniverse;

  #[test]
  fn cvar_is_mean_of_worst_tail_when_alpha_m_is_integer() {
    let r: Vec<f64> = (1..=10).map(|i| i as f64 / 100.0 - 0.05).collect();
    // Worst two returns are -0.04 and -0.03.
    assert_abs_diff_eq!(empirical_cvar(&r, 0.2), 0.035, epsilon = 1e-12);
  }

  #[test]
  fn cvar_decreases_with_tail_probability() {
    let r = [0.02, -0.05, 0.01, -0.01, 0.03, -0.02, 0.0, 0.04];
    assert!(empirical_cvar(&r, 0.01) >= empirical_cvar(&r, 0.5));
    assert_abs_diff_eq!(empirical_cvar(&r, 0.01), 0.05, epsilon = 1e-12);
  }

  #[test]
  fn diagnostics_of_single_asset() {
    let u = AssetUniverse::new(["A", "B"]).unwrap();
    let s = ScenarioMatrix::new(u, array![[0.01, 0.0], [0.03, 0.0], [-0.01, 0.0]]).unwrap();
    let d = diagnostics(&s, &array![1.0, 0.0], 0.34).unwrap();
    assert_abs_diff_eq!(d.expected_return, 0.01, epsilon = 1e-12);
    assert_abs_diff_eq!(d.volatility, 0.02, epsilon = 1e-12);
    assert_abs_diff_eq!(d.sharpe, 0.5, epsilon = 1e-9);
  }
}
