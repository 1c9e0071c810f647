use allocation_rs::quant::pipeline::run_pipeline;
use allocation_rs::quant::pipeline::PipelineConfig;
use allocation_rs::quant::pipeline::ResidualDefinition;
use allocation_rs::quant::pipeline::ScenarioSource;
use allocation_rs::quant::portfolio::OptimizerMethod;
use allocation_rs::quant::AssetUniverse;
use allocation_rs::quant::PriceTable;
use allocation_rs::stats::vecm::RankZeroPolicy;
use allocation_rs::traits::MultivariateExt;
use chrono::Duration;
use chrono::NaiveDate;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::StandardNormal;

const TICKERS: [&str; 6] = ["BNP", "Airbus", "Deutsche", "Enel", "LVMH", "Sanofi"];

fn cointegrated_prices(t: usize, seed: u64) -> PriceTable {
  let mut rng = StdRng::seed_from_u64(seed);
  let n = TICKERS.len();
  let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
  let dates = (0..t).map(|i| start + Duration::days(i as i64)).collect();

  let mut trend = 0.0;
  let mut spread = vec![0.0; n];
  let mut sigma2: f64 = 1e-4;
  let mut shock = 0.0;
  let mut prices = Array2::<f64>::zeros((t, n));
  for i in 0..t {
    sigma2 = 2e-6 + 0.08 * shock * shock + 0.9 * sigma2;
    let z: f64 = StandardNormal.sample(&mut rng);
    shock = sigma2.sqrt() * z;
    trend += 0.0002 + shock;
    for (j, s) in spread.iter_mut().enumerate() {
      let e: f64 = StandardNormal.sample(&mut rng);
      *s = 0.85 * *s + 0.005 * e;
      prices[[i, j]] = (40.0 + 15.0 * j as f64) * ((0.7 + 0.1 * j as f64) * trend + *s).exp();
    }
  }

  PriceTable::new(dates, AssetUniverse::new(TICKERS).unwrap(), prices).unwrap()
}

fn config(source: ScenarioSource) -> PipelineConfig {
  let mut cfg = PipelineConfig::new(ResidualDefinition::DemeanedReturns);
  cfg.scenario_source = source;
  cfg.vecm.rank_zero = RankZeroPolicy::DifferencedVar;
  cfg.seed = Some(2024);
  cfg
}

fn assert_weights(w: &ndarray::Array1<f64>) {
  assert_eq!(w.len(), TICKERS.len());
  assert!(w.iter().all(|x| (0.0..=1.0).contains(x)), "weights {w:?}");
  assert!((w.sum() - 1.0).abs() < 1e-4, "weights sum {}", w.sum());
}

#[test]
fn six_assets_five_hundred_observations() {
  let table = cointegrated_prices(500, 7);
  let out = run_pipeline(&table, &config(ScenarioSource::Posterior)).unwrap();

  assert_eq!(out.marginals.len(), 6);
  assert_eq!(out.pseudo_observations.dim(), (499, 6));
  assert!(out
    .pseudo_observations
    .iter()
    .all(|u| *u > 0.0 && *u < 1.0));
  assert_eq!(out.vine.dim(), 6);
  assert_eq!(out.copula_scenarios.returns().dim(), (1000, 6));
  assert_eq!(out.posterior_scenarios.returns().dim(), (1000, 6));
  assert_eq!(out.views.q.len(), 6);
  assert!(out.latest_volatility().iter().all(|s| *s > 0.0));

  for method in OptimizerMethod::ALL {
    let w = out
      .weights
      .weights(method)
      .unwrap_or_else(|| panic!("{method} failed: {:?}", out.weights.error(method)));
    assert_weights(w);
  }
}

#[test]
fn copula_scenarios_can_drive_the_optimizer() {
  let table = cointegrated_prices(500, 8);
  let out = run_pipeline(&table, &config(ScenarioSource::Copula)).unwrap();
  for method in OptimizerMethod::ALL {
    assert_weights(out.weights.weights(method).unwrap());
  }
}

#[test]
fn seeded_runs_are_reproducible() {
  let table = cointegrated_prices(300, 9);
  let a = run_pipeline(&table, &config(ScenarioSource::Posterior)).unwrap();
  let b = run_pipeline(&table, &config(ScenarioSource::Posterior)).unwrap();
  assert_eq!(a.posterior_scenarios.returns(), b.posterior_scenarios.returns());
  assert_eq!(a.copula_scenarios.returns(), b.copula_scenarios.returns());
  let wa = a.weights.weights(OptimizerMethod::MinCvar).unwrap();
  let wb = b.weights.weights(OptimizerMethod::MinCvar).unwrap();
  for (x, y) in wa.iter().zip(wb.iter()) {
    assert!((x - y).abs() < 1e-9);
  }
}
