//! # Johansen
//!
//! $$
//! \lambda_{\text{trace}}(r)=-T\sum_{i=r+1}^{n}\ln(1-\hat\lambda_i),\qquad
//! \lambda_{\max}(r)=-T\ln(1-\hat\lambda_{r+1})
//! $$
//!
//! Cointegration rank test on price levels.
use nalgebra::DMatrix;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use crate::error::AllocationError;
use crate::error::Result;
use crate::stats::linalg::cholesky_lower;
use crate::stats::linalg::residualize;
use crate::stats::linalg::spd_inverse;
use crate::stats::linalg::symmetrize;
use crate::stats::linalg::to_array2;
use crate::stats::linalg::to_dmatrix;

/// Largest system dimension covered by the critical value tables.
pub const MAX_VARIABLES: usize = 12;

/// Deterministic terms removed from the data before the test regressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeterministicTerm {
  None,
  #[default]
  Constant,
  ConstantTrend,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalValues {
  pub one_percent: f64,
  pub five_percent: f64,
  pub ten_percent: f64,
}

impl CriticalValues {
  pub fn value_at(self, alpha: f64) -> f64 {
    if alpha <= 0.01 {
      self.one_percent
    } else if alpha <= 0.05 {
      self.five_percent
    } else {
      self.ten_percent
    }
  }
}

// Osterwald-Lenum trace critical values, columns 90% / 95% / 99%, row k-1 for
// k = n - r non-cointegrated directions.
const TRACE_NONE: [[f64; 3]; MAX_VARIABLES] = [
  [2.9762, 4.1296, 6.9406],
  [10.4741, 12.3212, 16.3640],
  [21.7781, 24.2761, 29.5147],
  [37.0339, 40.1749, 46.5716],
  [56.2839, 60.0627, 67.6367],
  [79.5329, 83.9383, 92.7136],
  [106.7351, 111.7797, 121.7375],
  [137.9954, 143.6691, 154.7977],
  [173.2292, 179.5199, 191.8122],
  [212.4721, 219.4051, 232.8291],
  [255.6732, 263.2603, 277.9962],
  [302.9054, 311.1288, 326.9716],
];

const TRACE_CONSTANT: [[f64; 3]; MAX_VARIABLES] = [
  [2.7055, 3.8415, 6.6349],
  [13.4294, 15.4943, 19.9349],
  [27.0669, 29.7961, 35.4628],
  [44.4929, 47.8545, 54.6815],
  [65.8202, 69.8189, 77.8202],
  [91.1090, 95.7542, 104.9637],
  [120.3673, 125.6185, 135.9825],
  [153.6341, 159.5290, 171.0905],
  [190.8714, 197.3772, 210.0366],
  [232.1030, 239.2468, 253.2526],
  [277.3740, 285.1402, 300.2821],
  [326.5354, 334.9795, 351.2150],
];

const TRACE_TREND: [[f64; 3]; MAX_VARIABLES] = [
  [2.7055, 3.8415, 6.6349],
  [16.1619, 18.3985, 23.1485],
  [32.0645, 35.0116, 41.0815],
  [51.6492, 55.2459, 62.5202],
  [75.1027, 79.3422, 87.7748],
  [102.4674, 107.3429, 116.9829],
  [133.7852, 139.2780, 150.0778],
  [169.0618, 175.1584, 187.1891],
  [208.3582, 215.1268, 228.2226],
  [251.6293, 259.0267, 273.3838],
  [298.8836, 306.8988, 322.4264],
  [350.1125, 358.7190, 375.3203],
];

/// Trace critical values for `k` remaining common trends.
pub fn trace_critical_values(k: usize, det: DeterministicTerm) -> Option<CriticalValues> {
  if k == 0 || k > MAX_VARIABLES {
    return None;
  }
  let row = match det {
    DeterministicTerm::None => TRACE_NONE[k - 1],
    DeterministicTerm::Constant => TRACE_CONSTANT[k - 1],
    DeterministicTerm::ConstantTrend => TRACE_TREND[k - 1],
  };
  Some(CriticalValues {
    ten_percent: row[0],
    five_percent: row[1],
    one_percent: row[2],
  })
}

#[derive(Debug, Clone, Copy)]
pub struct JohansenConfig {
  pub deterministic: DeterministicTerm,
  /// Number of lagged differences in the auxiliary regressions.
  pub k_ar_diff: usize,
  /// Minimum number of price rows.
  pub min_obs: usize,
}

impl Default for JohansenConfig {
  fn default() -> Self {
    Self {
      deterministic: DeterministicTerm::Constant,
      k_ar_diff: 1,
      min_obs: 30,
    }
  }
}

#[derive(Debug, Clone)]
pub struct JohansenResult {
  /// Squared canonical correlations, descending.
  pub eigenvalues: Array1<f64>,
  /// Matching eigenvectors in columns, normalized to `v' S11 v = 1`.
  pub eigenvectors: Array2<f64>,
  pub trace_statistics: Array1<f64>,
  pub max_eigen_statistics: Array1<f64>,
  /// `trace_critical_values[r]` tests `H0: rank <= r`.
  pub trace_critical_values: Vec<CriticalValues>,
  /// Effective sample size of the auxiliary regressions.
  pub nobs: usize,
}

impl JohansenResult {
  /// Number of trace statistics exceeding their critical value at `alpha`.
  pub fn rank(&self, alpha: f64) -> usize {
    self
      .trace_statistics
      .iter()
      .zip(self.trace_critical_values.iter())
      .filter(|(stat, cv)| **stat > cv.value_at(alpha))
      .count()
  }
}

/// First differences of the rows of `x`.
pub(crate) fn difference(x: &DMatrix<f64>) -> DMatrix<f64> {
  let t = x.nrows();
  if t < 2 {
    return DMatrix::zeros(0, x.ncols());
  }
  x.rows(1, t - 1) - x.rows(0, t - 1)
}

/// Lagged differences aligned with `dx[k..]`: row `j` holds
/// `[dx[k+j-1], ..., dx[j]]`.
pub(crate) fn lagged_differences(dx: &DMatrix<f64>, k: usize) -> DMatrix<f64> {
  let n = dx.ncols();
  let m = dx.nrows().saturating_sub(k);
  DMatrix::from_fn(m, n * k, |j, c| {
    let lag = c / n + 1;
    dx[(k + j - lag, c % n)]
  })
}

pub(crate) fn demean(x: &DMatrix<f64>) -> DMatrix<f64> {
  let mut out = x.clone();
  if x.nrows() == 0 {
    return out;
  }
  for (j, mut col) in out.column_iter_mut().enumerate() {
    let mean = x.column(j).mean();
    col.add_scalar_mut(-mean);
  }
  out
}

fn detrend_linear(x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
  let t = x.nrows();
  let design = DMatrix::from_fn(t, 2, |i, c| if c == 0 { 1.0 } else { i as f64 });
  residualize(x, &design)
}

/// Eigen solution of `|λ S11 - S10 S00⁻¹ S01| = 0` for residual matrices `r0`
/// (differences) and `r1` (levels). Eigenvalues are returned in descending
/// order with eigenvectors normalized to `v' S11 v = 1`.
pub(crate) fn reduced_rank_eigen(
  r0: &DMatrix<f64>,
  r1: &DMatrix<f64>,
) -> Result<(Vec<f64>, DMatrix<f64>)> {
  let m = r0.nrows() as f64;
  let s00 = r0.transpose() * r0 / m;
  let s11 = r1.transpose() * r1 / m;
  let s10 = r1.transpose() * r0 / m;

  let s00_inv = spd_inverse(&s00, "residual covariance of differences")?;
  let l = cholesky_lower(&s11, "residual covariance of levels")?;
  let l_inv = l
    .try_inverse()
    .ok_or_else(|| AllocationError::SingularMatrix("Cholesky factor of S11".into()))?;

  let a = &s10 * s00_inv * s10.transpose();
  let sym = symmetrize(&(&l_inv * a * l_inv.transpose()));
  let eig = sym.symmetric_eigen();

  let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
  order.sort_by(|&i, &j| eig.eigenvalues[j].total_cmp(&eig.eigenvalues[i]));

  let lt_inv = l_inv.transpose();
  let n = r1.ncols();
  let mut values = Vec::with_capacity(n);
  let mut vectors = DMatrix::zeros(n, n);
  for (c, &i) in order.iter().enumerate() {
    values.push(eig.eigenvalues[i].clamp(0.0, 1.0));
    vectors.set_column(c, &(&lt_inv * eig.eigenvectors.column(i)));
  }
  Ok((values, vectors))
}

/// Johansen cointegration test on a `T×n` matrix of price levels.
pub fn johansen(levels: &Array2<f64>, cfg: &JohansenConfig) -> Result<JohansenResult> {
  let (t, n) = levels.dim();
  if n == 0 || n > MAX_VARIABLES {
    return Err(AllocationError::InvalidInput(format!(
      "johansen test supports 1..={MAX_VARIABLES} variables, got {n}"
    )));
  }
  let k = cfg.k_ar_diff;
  let min_obs = cfg.min_obs.max(k + n + 3);
  if t < min_obs {
    return Err(AllocationError::InvalidInput(format!(
      "johansen test needs at least {min_obs} observations, got {t}"
    )));
  }
  if levels.iter().any(|v| !v.is_finite()) {
    return Err(AllocationError::InvalidInput(
      "price levels contain non-finite values".into(),
    ));
  }

  let x = to_dmatrix(levels.view());
  let x = match cfg.deterministic {
    DeterministicTerm::None => x,
    DeterministicTerm::Constant => demean(&x),
    DeterministicTerm::ConstantTrend => detrend_linear(&x)?,
  };

  let dx = difference(&x);
  let m = dx.nrows() - k;
  let mut z = lagged_differences(&dx, k);
  let mut dy = dx.rows(k, m).into_owned();
  let mut ylag = x.rows(k, m).into_owned();
  if cfg.deterministic != DeterministicTerm::None {
    z = demean(&z);
    dy = demean(&dy);
    ylag = demean(&ylag);
  }

  let r0 = residualize(&dy, &z)?;
  let r1 = residualize(&ylag, &z)?;
  let (eigenvalues, eigenvectors) = reduced_rank_eigen(&r0, &r1)?;
  if eigenvalues.iter().any(|&l| l >= 1.0) {
    return Err(AllocationError::SingularMatrix(
      "unit canonical correlation between levels and differences".into(),
    ));
  }

  let nobs = m as f64;
  let log_terms: Vec<f64> = eigenvalues.iter().map(|l| (1.0 - l).ln()).collect();
  let trace_statistics =
    Array1::from_iter((0..n).map(|i| -nobs * log_terms[i..].iter().sum::<f64>()));
  let max_eigen_statistics = Array1::from_iter(log_terms.iter().map(|l| -nobs * l));
  let trace_critical_values = (0..n)
    .map(|i| trace_critical_values(n - i, cfg.deterministic))
    .collect::<Option<Vec<_>>>()
    .ok_or_else(|| AllocationError::InvalidInput("no critical values for system size".into()))?;

  debug!(
    n,
    nobs = m,
    trace = ?trace_statistics.to_vec(),
    "johansen test"
  );

  Ok(JohansenResult {
    eigenvalues: Array1::from_vec(eigenvalues),
    eigenvectors: to_array2(&eigenvectors),
    trace_statistics,
    max_eigen_statistics,
    trace_critical_values,
    nobs: m,
  })
}
