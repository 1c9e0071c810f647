//! # GARCH(1,1)
//!
//! $$
//! r_t=\mu+\varepsilon_t,\quad \varepsilon_t=\sigma_t z_t,\quad
//! \sigma_t^2=\omega+\alpha\varepsilon_{t-1}^2+\beta\sigma_{t-1}^2,\quad z_t\sim\mathcal N(0,1)
//! $$
//!
//! Maximum-likelihood fit of the constant-mean GARCH(1,1) marginal model.
use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::State;
use argmin::core::TerminationReason;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use tracing::debug;

use crate::error::AllocationError;
use crate::error::Result;

const LN_2PI: f64 = 1.837_877_066_409_345_3;
const MAX_PERSISTENCE: f64 = 0.9999;

/// Estimation controls. Passed to every fit instead of any global setting.
#[derive(Debug, Clone, Copy)]
pub struct GarchConfig {
  /// Minimum number of returns accepted.
  pub min_obs: usize,
  /// Nelder-Mead standard-deviation tolerance on the simplex costs.
  pub tolerance: f64,
  /// Iteration cap; hitting it is reported as non-convergence.
  pub max_iters: u64,
  /// Sample variance below this is treated as a constant series.
  pub min_variance: f64,
}

impl Default for GarchConfig {
  fn default() -> Self {
    Self {
      min_obs: 50,
      tolerance: 1e-8,
      max_iters: 20_000,
      min_variance: 1e-14,
    }
  }
}

/// Fitted GARCH(1,1) model together with its in-sample filter output.
#[derive(Debug, Clone)]
pub struct GarchFit {
  pub mu: f64,
  pub omega: f64,
  pub alpha: f64,
  pub beta: f64,
  pub log_likelihood: f64,
  /// Model residuals `r_t - mu`.
  pub residuals: Array1<f64>,
  /// Conditional volatility `sigma_t`, aligned with `residuals`.
  pub conditional_volatility: Array1<f64>,
}

impl GarchFit {
  pub fn persistence(&self) -> f64 {
    self.alpha + self.beta
  }

  pub fn unconditional_variance(&self) -> f64 {
    self.omega / (1.0 - self.persistence())
  }

  /// Last in-sample conditional volatility `sigma_T`.
  pub fn latest_volatility(&self) -> f64 {
    self
      .conditional_volatility
      .last()
      .copied()
      .unwrap_or(f64::NAN)
  }

  /// One-step-ahead volatility `sigma_{T+1}`.
  pub fn forecast_volatility(&self) -> f64 {
    match (self.residuals.last(), self.conditional_volatility.last()) {
      (Some(e), Some(s)) => (self.omega + self.alpha * e * e + self.beta * s * s).sqrt(),
      _ => f64::NAN,
    }
  }

  /// Model residuals divided by the same-period conditional volatility.
  pub fn standardized_residuals(&self) -> Array1<f64> {
    &self.residuals / &self.conditional_volatility
  }

  /// `(r_t - mean(r)) / sigma_t`: demeaned raw returns divided by the fitted
  /// volatility, an alternative to [`GarchFit::standardized_residuals`] that
  /// ignores the estimated `mu`.
  pub fn standardized_demeaned_returns(&self, returns: &Array1<f64>) -> Result<Array1<f64>> {
    if returns.len() != self.conditional_volatility.len() {
      return Err(AllocationError::dim(
        "returns vs conditional volatility",
        self.conditional_volatility.len(),
        returns.len(),
      ));
    }
    let mean = returns.mean().unwrap_or(0.0);
    Ok((returns - mean) / &self.conditional_volatility)
  }
}

/// Runs the variance recursion; returns `(sigma2, negative log-likelihood)`.
fn filter(eps: &[f64], omega: f64, alpha: f64, beta: f64, backcast: f64) -> (Vec<f64>, f64) {
  let mut sigma2 = Vec::with_capacity(eps.len());
  let mut nll = 0.0;
  let mut prev_e2 = backcast;
  let mut prev_s2 = backcast;

  for &e in eps {
    let s2 = (omega + alpha * prev_e2 + beta * prev_s2).max(1e-300);
    nll += 0.5 * (LN_2PI + s2.ln() + e * e / s2);
    sigma2.push(s2);
    prev_e2 = e * e;
    prev_s2 = s2;
  }

  (sigma2, nll)
}

fn logistic(x: f64) -> f64 {
  1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
  (p / (1.0 - p)).ln()
}

/// Unconstrained search coordinates `x = [m, a, b, c]` mapped to
/// `(mu, omega, alpha, beta)`; keeps `omega > 0`, `alpha, beta >= 0` and
/// `alpha + beta < 1` for every `x`.
#[derive(Debug, Clone, Copy)]
struct Transform {
  mean: f64,
  scale: f64,
  variance: f64,
}

impl Transform {
  fn params(&self, x: &[f64]) -> (f64, f64, f64, f64) {
    let mu = self.mean + x[0] * self.scale;
    let persistence = MAX_PERSISTENCE * logistic(x[1]);
    let share = logistic(x[2]);
    let alpha = persistence * share;
    let beta = persistence * (1.0 - share);
    let omega = self.variance * (1.0 - persistence) * x[3].exp();
    (mu, omega, alpha, beta)
  }
}

struct GarchCost {
  returns: Vec<f64>,
  transform: Transform,
  backcast: f64,
}

impl CostFunction for GarchCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let (mu, omega, alpha, beta) = self.transform.params(x);
    let eps: Vec<f64> = self.returns.iter().map(|r| r - mu).collect();
    let (_, nll) = filter(&eps, omega, alpha, beta, self.backcast);
    Ok(if nll.is_finite() { nll } else { 1e300 })
  }
}

/// Fit a GARCH(1,1) with constant mean and Gaussian innovations by maximum
/// likelihood.
pub fn fit_garch(returns: &Array1<f64>, cfg: &GarchConfig) -> Result<GarchFit> {
  let n = returns.len();
  if n < cfg.min_obs {
    return Err(AllocationError::Estimation(format!(
      "need at least {} observations, got {n}",
      cfg.min_obs
    )));
  }
  if returns.iter().any(|r| !r.is_finite()) {
    return Err(AllocationError::Estimation(
      "returns contain non-finite values".into(),
    ));
  }

  let mean = returns.mean().unwrap_or(0.0);
  let variance = returns.var(1.0);
  if variance < cfg.min_variance {
    return Err(AllocationError::Estimation(format!(
      "near-zero variance ({variance:e})"
    )));
  }

  let transform = Transform {
    mean,
    scale: variance.sqrt(),
    variance,
  };
  let cost = GarchCost {
    returns: returns.to_vec(),
    transform,
    backcast: variance,
  };

  // alpha = 0.05, beta = 0.90, omega on the unconditional-variance target
  let x0 = vec![0.0, logit(0.95 / MAX_PERSISTENCE), logit(0.05 / 0.95), 0.0];
  let mut simplex = Vec::with_capacity(x0.len() + 1);
  simplex.push(x0.clone());
  for i in 0..x0.len() {
    let mut point = x0.clone();
    point[i] += if i == 0 { 0.1 } else { 0.5 };
    simplex.push(point);
  }

  let solver = NelderMead::new(simplex)
    .with_sd_tolerance(cfg.tolerance)
    .map_err(|e| AllocationError::Estimation(e.to_string()))?;
  let res = Executor::new(cost, solver)
    .configure(|state| state.max_iters(cfg.max_iters))
    .run()
    .map_err(|e| AllocationError::Estimation(e.to_string()))?;

  if matches!(
    res.state.get_termination_reason(),
    Some(TerminationReason::MaxItersReached)
  ) {
    return Err(AllocationError::Estimation(format!(
      "likelihood maximization did not converge in {} iterations",
      cfg.max_iters
    )));
  }

  let best = res
    .state
    .best_param
    .clone()
    .ok_or_else(|| AllocationError::Estimation("optimizer returned no parameters".into()))?;
  let (mu, omega, alpha, beta) = transform.params(&best);

  let residuals = returns.mapv(|r| r - mu);
  let (sigma2, nll) = filter(&residuals.to_vec(), omega, alpha, beta, variance);
  if !nll.is_finite() {
    return Err(AllocationError::Estimation(
      "log-likelihood is not finite at the optimum".into(),
    ));
  }
  let conditional_volatility = Array1::from_iter(sigma2.into_iter().map(f64::sqrt));

  debug!(
    mu,
    omega,
    alpha,
    beta,
    loglik = -nll,
    iters = res.state.get_iter(),
    "garch(1,1) fitted"
  );

  Ok(GarchFit {
    mu,
    omega,
    alpha,
    beta,
    log_likelihood: -nll,
    residuals,
    conditional_volatility,
  })
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::StandardNormal;

  use super::*;

  fn simulate_garch(n: usize, omega: f64, alpha: f64, beta: f64, seed: u64) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Array1::<f64>::zeros(n);
    let mut s2 = omega / (1.0 - alpha - beta);
    let mut prev = 0.0;
    for t in 0..n {
      if t > 0 {
        s2 = omega + alpha * prev * prev + beta * s2;
      }
      let z: f64 = StandardNormal.sample(&mut rng);
      x[t] = s2.sqrt() * z;
      prev = x[t];
    }
    x
  }

  #[test]
  fn recovers_persistence_of_simulated_series() {
    let r = simulate_garch(3000, 1e-6, 0.08, 0.9, 7);
    let fit = fit_garch(&r, &GarchConfig::default()).unwrap();

    assert!(fit.omega > 0.0);
    assert!(fit.alpha >= 0.0 && fit.beta >= 0.0);
    assert!(fit.persistence() < 1.0);
    assert!(fit.persistence() > 0.8, "persistence {}", fit.persistence());
    assert!(fit.conditional_volatility.iter().all(|s| *s > 0.0));
    assert_eq!(fit.conditional_volatility.len(), r.len());
  }

  #[test]
  fn iteration_cap_reports_non_convergence() {
    let r = simulate_garch(500, 1e-6, 0.08, 0.9, 5);
    let cfg = GarchConfig {
      max_iters: 5,
      ..GarchConfig::default()
    };
    match fit_garch(&r, &cfg) {
      Err(AllocationError::Estimation(msg)) => assert!(msg.contains("did not converge"), "{msg}"),
      other => panic!("expected non-convergence, got {other:?}"),
    }
  }

  #[test]
  fn standardization_uses_same_period_volatility() {
    let r = simulate_garch(500, 2e-6, 0.1, 0.85, 11);
    let fit = fit_garch(&r, &GarchConfig::default()).unwrap();
    let z = fit.standardized_residuals();
    for t in [0, 1, 250, 499] {
      let expected = fit.residuals[t] / fit.conditional_volatility[t];
      assert!((z[t] - expected).abs() < 1e-15);
    }

    let zd = fit.standardized_demeaned_returns(&r).unwrap();
    let mean = r.mean().unwrap();
    assert!((zd[3] - (r[3] - mean) / fit.conditional_volatility[3]).abs() < 1e-15);
  }

  #[test]
  fn forecast_follows_recursion() {
    let r = simulate_garch(400, 1e-6, 0.05, 0.9, 3);
    let fit = fit_garch(&r, &GarchConfig::default()).unwrap();
    let e = *fit.residuals.last().unwrap();
    let s = fit.latest_volatility();
    let expected = (fit.omega + fit.alpha * e * e + fit.beta * s * s).sqrt();
    assert!((fit.forecast_volatility() - expected).abs() < 1e-15);
  }

  #[test]
  fn short_series_is_rejected() {
    let r = Array1::from_elem(10, 0.01);
    assert!(matches!(
      fit_garch(&r, &GarchConfig::default()),
      Err(AllocationError::Estimation(_))
    ));
  }

  #[test]
  fn constant_series_is_rejected() {
    let r = Array1::from_elem(200, 0.001);
    assert!(matches!(
      fit_garch(&r, &GarchConfig::default()),
      Err(AllocationError::Estimation(_))
    ));
  }
}
