//! # Scenarios
//!
//! $$
//! r_{ij}=\Phi^{-1}(u_{ij})\,\sigma_{T,j}
//! $$
//!
//! Maps copula draws back to return space through normal marginals scaled by
//! the latest conditional volatility of each asset.
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use crate::copulas::univariate::gaussian::StandardNormal;
use crate::error::AllocationError;
use crate::error::Result;
use crate::quant::universe::AssetUniverse;

/// `m×n` scenario matrix whose columns follow the universe order.
#[derive(Debug, Clone)]
pub struct ScenarioMatrix {
  universe: AssetUniverse,
  returns: Array2<f64>,
}

impl ScenarioMatrix {
  pub fn new(universe: AssetUniverse, returns: Array2<f64>) -> Result<Self> {
    universe.check("scenario columns", returns.ncols())?;
    if returns.iter().any(|v| !v.is_finite()) {
      return Err(AllocationError::InvalidInput(
        "scenario matrix contains non-finite values".into(),
      ));
    }
    Ok(Self { universe, returns })
  }

  pub fn universe(&self) -> &AssetUniverse {
    &self.universe
  }

  pub fn returns(&self) -> &Array2<f64> {
    &self.returns
  }

  pub fn nscenarios(&self) -> usize {
    self.returns.nrows()
  }
}

/// Applies `Φ⁻¹` to every uniform and scales column `j` by `volatility[j]`.
pub fn reconstruct_scenarios(
  uniforms: &Array2<f64>,
  volatility: &Array1<f64>,
  universe: &AssetUniverse,
) -> Result<ScenarioMatrix> {
  universe.check("volatility vector", volatility.len())?;
  universe.check("uniform columns", uniforms.ncols())?;
  if volatility.iter().any(|s| !s.is_finite() || *s <= 0.0) {
    return Err(AllocationError::InvalidInput(
      "volatilities must be finite and positive".into(),
    ));
  }
  if let Some(u) = uniforms.iter().find(|u| !(**u > 0.0 && **u < 1.0)) {
    return Err(AllocationError::NumericOverflow(format!(
      "uniform {u} has no finite normal quantile"
    )));
  }

  let mut z = uniforms.mapv(StandardNormal::ppf);
  z *= volatility;
  debug!(
    scenarios = z.nrows(),
    assets = z.ncols(),
    "copula scenarios reconstructed"
  );
  ScenarioMatrix::new(universe.clone(), z)
}
