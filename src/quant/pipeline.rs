//! # Pipeline
//!
//! $$
//! P \xrightarrow{\ \text{GARCH}\ } \hat z \xrightarrow{\ \text{rank}\ } U
//! \xrightarrow{\ \text{vine}\ } \tilde U \xrightarrow{\ \Phi^{-1}\sigma_T\ } R_{cop},
//! \qquad
//! P \xrightarrow{\ \text{VECM}\ } (P,q) \xrightarrow{\ \text{BL}\ } R_{post}
//! \xrightarrow{\ \text{opt}\ } \mathbf w
//! $$
//!
//! Wires the marginal, dependence, view, blending and optimization stages
//! over one aligned price table.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use rayon::prelude::*;
use tracing::info;

use crate::copulas::multivariate::vine::VineConfig;
use crate::copulas::multivariate::vine::VineCopula;
use crate::error::AllocationError;
use crate::error::Result;
use crate::quant::black_litterman::posterior;
use crate::quant::black_litterman::BlackLittermanConfig;
use crate::quant::black_litterman::Posterior;
use crate::quant::portfolio::PortfolioEngine;
use crate::quant::portfolio::PortfolioEngineConfig;
use crate::quant::portfolio::WeightTable;
use crate::quant::scenarios::reconstruct_scenarios;
use crate::quant::scenarios::ScenarioMatrix;
use crate::quant::universe::PriceTable;
use crate::quant::views::forecast_views;
use crate::quant::views::Views;
use crate::stats::garch::fit_garch;
use crate::stats::garch::GarchConfig;
use crate::stats::garch::GarchFit;
use crate::stats::linalg::sample_covariance;
use crate::stats::pseudo_obs::pseudo_observations_matrix;
use crate::stats::vecm::VecmConfig;

/// Series fed to the rank transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResidualDefinition {
  /// `ε_t / σ_t` with `ε_t` the GARCH mean-equation residual.
  ModelResiduals,
  /// `(r_t − mean(r)) / σ_t`.
  DemeanedReturns,
}

/// Scenario matrix handed to the optimizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScenarioSource {
  /// Draws from the Black–Litterman posterior.
  #[default]
  Posterior,
  /// Vine copula draws rescaled by the latest GARCH volatility.
  Copula,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
  pub residual_definition: ResidualDefinition,
  pub scenario_source: ScenarioSource,
  pub garch: GarchConfig,
  pub vine: VineConfig,
  pub vecm: VecmConfig,
  pub black_litterman: BlackLittermanConfig,
  pub portfolio: PortfolioEngineConfig,
  /// Rows of both scenario matrices.
  pub n_scenarios: usize,
  /// Seeds the copula and posterior samplers when set.
  pub seed: Option<u64>,
}

impl PipelineConfig {
  /// Stage defaults with an explicit choice of standardized series.
  pub fn new(residual_definition: ResidualDefinition) -> Self {
    Self {
      residual_definition,
      scenario_source: ScenarioSource::default(),
      garch: GarchConfig::default(),
      vine: VineConfig::default(),
      vecm: VecmConfig::default(),
      black_litterman: BlackLittermanConfig::default(),
      portfolio: PortfolioEngineConfig::default(),
      n_scenarios: 1000,
      seed: None,
    }
  }
}

/// Everything a run produced, stage by stage.
#[derive(Debug)]
pub struct PipelineOutput {
  pub marginals: Vec<GarchFit>,
  pub pseudo_observations: Array2<f64>,
  pub vine: VineCopula,
  pub copula_scenarios: ScenarioMatrix,
  pub views: Views,
  pub posterior: Posterior,
  pub posterior_scenarios: ScenarioMatrix,
  pub weights: WeightTable,
}

impl PipelineOutput {
  /// Latest conditional volatility per asset.
  pub fn latest_volatility(&self) -> Array1<f64> {
    self.marginals.iter().map(GarchFit::latest_volatility).collect()
  }
}

/// Fits one GARCH(1,1) per return column in parallel.
pub fn fit_marginals(returns: &Array2<f64>, cfg: &GarchConfig) -> Result<Vec<GarchFit>> {
  (0..returns.ncols())
    .into_par_iter()
    .map(|j| fit_garch(&returns.column(j).to_owned(), cfg))
    .collect()
}

/// Standardized series of every asset, one column each.
pub fn standardized_matrix(
  returns: &Array2<f64>,
  fits: &[GarchFit],
  definition: ResidualDefinition,
) -> Result<Array2<f64>> {
  if fits.len() != returns.ncols() {
    return Err(AllocationError::dim("garch fits", returns.ncols(), fits.len()));
  }
  let mut out = Array2::<f64>::zeros(returns.dim());
  for (j, (fit, mut col)) in fits.iter().zip(out.axis_iter_mut(Axis(1))).enumerate() {
    let z = match definition {
      ResidualDefinition::ModelResiduals => fit.standardized_residuals(),
      ResidualDefinition::DemeanedReturns => {
        fit.standardized_demeaned_returns(&returns.column(j).to_owned())?
      }
    };
    col.assign(&z);
  }
  Ok(out)
}

/// Runs every stage over `table` and optimizes the configured scenario source.
pub fn run_pipeline(table: &PriceTable, cfg: &PipelineConfig) -> Result<PipelineOutput> {
  let universe = table.universe();
  let returns = table.log_returns();
  info!(
    assets = universe.len(),
    observations = returns.nrows(),
    "pipeline started"
  );

  let marginals = fit_marginals(&returns, &cfg.garch)?;
  info!("garch marginals fitted");

  let standardized = standardized_matrix(&returns, &marginals, cfg.residual_definition)?;
  let pseudo_observations = pseudo_observations_matrix(&standardized);

  let vine_cfg = VineConfig {
    seed: cfg.seed.or(cfg.vine.seed),
    ..cfg.vine.clone()
  };
  let vine = VineCopula::fit(&pseudo_observations, &vine_cfg)?;
  info!(
    log_likelihood = vine.log_likelihood(),
    params = vine.n_params(),
    "vine copula fitted"
  );

  let volatility: Array1<f64> = marginals.iter().map(GarchFit::latest_volatility).collect();
  let copula_scenarios =
    reconstruct_scenarios(&vine.simulate(cfg.n_scenarios), &volatility, universe)?;

  let views = forecast_views(table, &cfg.vecm)?;
  info!(views = views.len(), "cointegration views generated");

  let covariance = sample_covariance(&returns)?;
  let posterior = posterior(&covariance, &views, &cfg.black_litterman)?;
  let posterior_scenarios = posterior.sample(cfg.n_scenarios, cfg.seed.map(|s| s.wrapping_add(1)))?;
  info!(scenarios = cfg.n_scenarios, "posterior scenarios sampled");

  let scenarios = match cfg.scenario_source {
    ScenarioSource::Posterior => &posterior_scenarios,
    ScenarioSource::Copula => &copula_scenarios,
  };
  let weights = PortfolioEngine::new(cfg.portfolio.clone()).run(scenarios);
  info!(source = ?cfg.scenario_source, "pipeline finished");

  Ok(PipelineOutput {
    marginals,
    pseudo_observations,
    vine,
    copula_scenarios,
    views,
    posterior,
    posterior_scenarios,
    weights,
  })
}

#[cfg(test)]
mod tests {
  use ndarray::array;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::StandardNormal;

  use super::*;

  fn returns(n: usize, t: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((t, n), |_| {
      let z: f64 = StandardNormal.sample(&mut rng);
      0.0003 + 0.01 * z
    })
  }

  #[test]
  fn marginals_are_fitted_per_column() {
    let r = returns(3, 400, 1);
    let fits = fit_marginals(&r, &GarchConfig::default()).unwrap();
    assert_eq!(fits.len(), 3);
    assert!(fits.iter().all(|f| f.conditional_volatility.len() == 400));
  }

  #[test]
  fn short_column_fails_estimation() {
    let r = returns(2, 20, 2);
    assert!(matches!(
      fit_marginals(&r, &GarchConfig::default()),
      Err(AllocationError::Estimation(_))
    ));
  }

  #[test]
  fn residual_definitions_differ_only_by_mean_offset() {
    let r = returns(2, 300, 3);
    let fits = fit_marginals(&r, &GarchConfig::default()).unwrap();
    let a = standardized_matrix(&r, &fits, ResidualDefinition::ModelResiduals).unwrap();
    let b = standardized_matrix(&r, &fits, ResidualDefinition::DemeanedReturns).unwrap();
    assert_eq!(a.dim(), b.dim());
    for j in 0..2 {
      let mean = r.column(j).mean().unwrap();
      let shift = fits[j].mu - mean;
      for i in 0..300 {
        let sigma = fits[j].conditional_volatility[i];
        assert!((b[[i, j]] - a[[i, j]] - shift / sigma).abs() < 1e-9);
      }
    }
  }

  #[test]
  fn fits_must_match_columns() {
    let r = returns(2, 300, 4);
    let fits = fit_marginals(&r, &GarchConfig::default()).unwrap();
    let res = standardized_matrix(&array![[0.1], [0.2]], &fits, ResidualDefinition::ModelResiduals);
    assert!(matches!(res, Err(AllocationError::DimensionMismatch { .. })));
  }
}
