//! # Errors
//!
//! $$
//! \text{stage}_k : \text{input}_k \to \text{Result}\langle \text{output}_k, \text{AllocationError} \rangle
//! $$
//!
//! One variant per failure class of the pipeline. Every stage fails fast with
//! the first variant that applies; nothing is retried or silently defaulted.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
  /// Volatility model failed to converge, sample too short or degenerate.
  #[error("estimation failed: {0}")]
  Estimation(String),

  /// Vine copula could not be fitted.
  #[error("dependence model fit failed: {0}")]
  DependenceFit(String),

  /// Quantile inversion hit the boundary of the unit interval.
  #[error("numeric overflow: {0}")]
  NumericOverflow(String),

  /// A matrix that has to be inverted (or factorized) is singular.
  #[error("singular matrix: {0}")]
  SingularMatrix(String),

  /// The constraint set of an optimization program is empty.
  #[error("infeasible program: {0}")]
  Infeasible(String),

  /// The convex solver did not reach a solution.
  #[error("solver failed: {0}")]
  Solver(String),

  /// Shape or asset-order mismatch between two pipeline objects.
  #[error("dimension mismatch: {what} (expected {expected}, got {got})")]
  DimensionMismatch {
    what: String,
    expected: usize,
    got: usize,
  },

  /// No cointegration relation was found (rank 0).
  #[error("cointegration failed: {0}")]
  Cointegration(String),

  /// Malformed input data or configuration.
  #[error("invalid input: {0}")]
  InvalidInput(String),
}

impl AllocationError {
  pub(crate) fn dim(what: impl Into<String>, expected: usize, got: usize) -> Self {
    Self::DimensionMismatch {
      what: what.into(),
      expected,
      got,
    }
  }
}

pub type Result<T> = std::result::Result<T, AllocationError>;

/// Fails with [`AllocationError::DimensionMismatch`] unless `got == expected`.
pub(crate) fn ensure_dim(what: &str, expected: usize, got: usize) -> Result<()> {
  if expected != got {
    return Err(AllocationError::dim(what, expected, got));
  }
  Ok(())
}
