//! # Portfolio Types
//!
//! $$
//! \mathcal W=\{\mathbf w\in\mathbb R^n:\ \mathbf 1^\top\mathbf w=1,\ \mathbf w\ge 0\}
//! $$
//!
//! Shared enums and result containers for portfolio optimization.

use std::fmt::Display;
use std::str::FromStr;

use impl_new_derive::ImplNew;
use ndarray::Array1;

use crate::error::AllocationError;

/// Supported optimization criteria.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OptimizerMethod {
  /// Mean-variance utility `μᵀw − λ wᵀΣw` as a Sharpe proxy (QP).
  MaxSharpe,
  /// Rockafellar–Uryasev CVaR minimization (LP).
  MinCvar,
  /// Mean minus scaled CVaR as a STARR proxy (LP).
  MaxStarr,
}

impl OptimizerMethod {
  pub const ALL: [OptimizerMethod; 3] = [Self::MaxSharpe, Self::MinCvar, Self::MaxStarr];
}

impl Display for OptimizerMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      OptimizerMethod::MaxSharpe => write!(f, "Sharpe"),
      OptimizerMethod::MinCvar => write!(f, "CVaR"),
      OptimizerMethod::MaxStarr => write!(f, "STARR"),
    }
  }
}

impl FromStr for OptimizerMethod {
  type Err = AllocationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "sharpe" | "max-sharpe" | "maxsharpe" => Ok(Self::MaxSharpe),
      "cvar" | "min-cvar" | "mincvar" => Ok(Self::MinCvar),
      "starr" | "max-starr" | "maxstarr" => Ok(Self::MaxStarr),
      other => Err(AllocationError::InvalidInput(format!(
        "unknown optimization criterion {other}"
      ))),
    }
  }
}

/// Scenario statistics of a weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, ImplNew)]
pub struct Diagnostics {
  /// Mean scenario portfolio return.
  pub expected_return: f64,
  /// `sqrt(wᵀΣw)` with the scenario covariance.
  pub volatility: f64,
  /// Scenario CVaR of the portfolio loss at the configured tail probability.
  pub cvar: f64,
  /// `expected_return / volatility`.
  pub sharpe: f64,
  /// `expected_return / cvar`.
  pub starr: f64,
}

/// Output of one optimization criterion.
#[derive(Clone, Debug)]
pub struct PortfolioResult {
  pub method: OptimizerMethod,
  /// Long-only weights summing to one, in universe order.
  pub weights: Array1<f64>,
  /// Optimal criterion value: the utility `μᵀw − λwᵀΣw` for Sharpe, the
  /// minimized CVaR for CVaR and `mean − λ_cvar·CVaR` for STARR.
  pub objective: f64,
  pub diagnostics: Diagnostics,
}
