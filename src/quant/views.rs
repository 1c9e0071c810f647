//! # Views
//!
//! $$
//! P = I_n,\qquad q_i = \frac{\hat p_{T+1,i}}{p_{T,i}} - 1
//! $$
//!
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use crate::error::AllocationError;
use crate::error::Result;
use crate::quant::universe::AssetUniverse;
use crate::quant::universe::PriceTable;
use crate::stats::vecm::forecast_next_levels;
use crate::stats::vecm::VecmConfig;

/// Absolute views `(P, q)`, one per asset.
#[derive(Debug, Clone)]
pub struct Views {
  /// Pick matrix `k×n`.
  pub pick: Array2<f64>,
  /// Expected returns of the picked portfolios.
  pub q: Array1<f64>,
  pub universe: AssetUniverse,
}

impl Views {
  /// Identity views from the current prices `p0` and forecast prices `p1`.
  pub fn from_prices(
    universe: &AssetUniverse,
    p0: &Array1<f64>,
    forecast_universe: &AssetUniverse,
    p1: &Array1<f64>,
  ) -> Result<Self> {
    universe.check_same(forecast_universe)?;
    universe.check("current prices", p0.len())?;
    universe.check("forecast prices", p1.len())?;
    if p0.iter().any(|p| !p.is_finite() || *p <= 0.0) {
      return Err(AllocationError::InvalidInput(
        "current prices must be finite and positive".into(),
      ));
    }

    let q = p1 / p0 - 1.0;
    if let Some(i) = q.iter().position(|v| !v.is_finite()) {
      return Err(AllocationError::InvalidInput(format!(
        "view for {} is not finite",
        universe.tickers()[i]
      )));
    }

    Ok(Self {
      pick: Array2::eye(universe.len()),
      q,
      universe: universe.clone(),
    })
  }

  pub fn len(&self) -> usize {
    self.q.len()
  }

  pub fn is_empty(&self) -> bool {
    self.q.is_empty()
  }
}

/// Fits a VECM on the price levels and turns its one-step forecast into views.
pub fn forecast_views(table: &PriceTable, cfg: &VecmConfig) -> Result<Views> {
  let p1 = forecast_next_levels(table.prices(), cfg)?;
  let p0 = table.last_prices()?;
  let views = Views::from_prices(table.universe(), &p0, table.universe(), &p1)?;
  debug!(q = ?views.q.to_vec(), "cointegration views");
  Ok(views)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::Duration;
  use chrono::NaiveDate;
  use ndarray::array;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;
  use crate::stats::vecm::RankZeroPolicy;

  #[test]
  fn views_are_simple_returns() {
    let u = AssetUniverse::new(["A", "B"]).unwrap();
    let v = Views::from_prices(&u, &array![100.0, 50.0], &u, &array![110.0, 45.0]).unwrap();
    assert_abs_diff_eq!(v.q[0], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(v.q[1], -0.1, epsilon = 1e-12);
    assert_eq!(v.pick, Array2::<f64>::eye(2));
  }

  #[test]
  fn reordered_forecast_is_rejected() {
    let u = AssetUniverse::new(["A", "B"]).unwrap();
    let w = AssetUniverse::new(["B", "A"]).unwrap();
    let res = Views::from_prices(&u, &array![1.0, 1.0], &w, &array![1.0, 1.0]);
    assert!(res.is_err());
  }

  #[test]
  fn non_finite_forecast_is_rejected() {
    let u = AssetUniverse::new(["A"]).unwrap();
    let res = Views::from_prices(&u, &array![1.0], &u, &array![f64::NAN]);
    assert!(matches!(res, Err(AllocationError::InvalidInput(_))));
  }

  #[test]
  fn views_from_cointegrated_prices() {
    let mut rng = StdRng::seed_from_u64(17);
    let noise = Normal::new(0.0, 0.01).unwrap();
    let t = 200;
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut common: f64 = 0.0;
    let mut prices = Array2::<f64>::zeros((t, 2));
    for i in 0..t {
      common += noise.sample(&mut rng);
      prices[[i, 0]] = 100.0 * (common + noise.sample(&mut rng)).exp();
      prices[[i, 1]] = 80.0 * (common + noise.sample(&mut rng)).exp();
    }
    let dates = (0..t).map(|i| start + Duration::days(i as i64)).collect();
    let u = AssetUniverse::new(["X", "Y"]).unwrap();
    let table = PriceTable::new(dates, u, prices).unwrap();
    let cfg = VecmConfig {
      rank: Some(1),
      rank_zero: RankZeroPolicy::DifferencedVar,
      ..VecmConfig::default()
    };
    let views = forecast_views(&table, &cfg).unwrap();
    assert_eq!(views.len(), 2);
    assert!(views.q.iter().all(|q| q.abs() < 0.2));
  }
}
