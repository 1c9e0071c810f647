//! # Universe
//!
//! $$
//! \mathcal A = (a_1,\dots,a_n),\qquad P \in \mathbb R^{T\times n}
//! $$
//!
//! Canonical asset ordering and the aligned price table every stage consumes.

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::Axis;

use crate::error::ensure_dim;
use crate::error::AllocationError;
use crate::error::Result;

/// Ordered set of asset identifiers.
///
/// Column `j` of every matrix and entry `j` of every vector in a run refers to
/// `tickers[j]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUniverse {
  tickers: Vec<String>,
}

impl AssetUniverse {
  pub fn new<S: Into<String>>(tickers: impl IntoIterator<Item = S>) -> Result<Self> {
    let tickers: Vec<String> = tickers.into_iter().map(Into::into).collect();
    for (i, t) in tickers.iter().enumerate() {
      if tickers[..i].contains(t) {
        return Err(AllocationError::InvalidInput(format!(
          "duplicate ticker {t}"
        )));
      }
    }
    Ok(Self { tickers })
  }

  pub fn len(&self) -> usize {
    self.tickers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tickers.is_empty()
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn index_of(&self, ticker: &str) -> Option<usize> {
    self.tickers.iter().position(|t| t == ticker)
  }

  /// Checks that an object named `what` has one entry per asset.
  pub fn check(&self, what: &str, got: usize) -> Result<()> {
    ensure_dim(what, self.len(), got)
  }

  /// Checks that another universe lists the same assets in the same order.
  pub fn check_same(&self, other: &AssetUniverse) -> Result<()> {
    self.check("asset universe", other.len())?;
    if let Some((a, b)) = self
      .tickers
      .iter()
      .zip(other.tickers.iter())
      .find(|(a, b)| a != b)
    {
      return Err(AllocationError::InvalidInput(format!(
        "asset order mismatch: {a} vs {b}"
      )));
    }
    Ok(())
  }
}

/// Gap-free `T×n` price table with a strictly increasing date index.
#[derive(Debug, Clone)]
pub struct PriceTable {
  dates: Vec<NaiveDate>,
  universe: AssetUniverse,
  prices: Array2<f64>,
}

impl PriceTable {
  pub fn new(dates: Vec<NaiveDate>, universe: AssetUniverse, prices: Array2<f64>) -> Result<Self> {
    ensure_dim("price rows vs dates", dates.len(), prices.nrows())?;
    universe.check("price columns", prices.ncols())?;

    if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
      return Err(AllocationError::InvalidInput(format!(
        "dates must be strictly increasing ({} then {})",
        w[0], w[1]
      )));
    }
    if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
      return Err(AllocationError::InvalidInput(
        "prices must be finite and positive".into(),
      ));
    }

    Ok(Self {
      dates,
      universe,
      prices,
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn universe(&self) -> &AssetUniverse {
    &self.universe
  }

  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  pub fn nobs(&self) -> usize {
    self.prices.nrows()
  }

  /// Last row of the table, i.e. the current price vector `p0`.
  pub fn last_prices(&self) -> Result<ndarray::Array1<f64>> {
    let t = self.nobs();
    if t == 0 {
      return Err(AllocationError::InvalidInput("empty price table".into()));
    }
    Ok(self.prices.index_axis(Axis(0), t - 1).to_owned())
  }

  /// Log returns `ln(p_t / p_{t-1})`, one row shorter than the table.
  pub fn log_returns(&self) -> Array2<f64> {
    let t = self.nobs();
    if t < 2 {
      return Array2::zeros((0, self.universe.len()));
    }
    let prev = self.prices.slice(ndarray::s![..t - 1, ..]);
    let next = self.prices.slice(ndarray::s![1.., ..]);
    ndarray::Zip::from(&next)
      .and(&prev)
      .map_collect(|n, p| (n / p).ln())
  }
}
