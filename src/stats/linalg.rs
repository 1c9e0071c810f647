//! # Linear algebra helpers
//!
//! $$
//! A = LL^\top,\qquad A = V\Lambda V^\top
//! $$
//!
//! Conversions between `ndarray` (API boundary) and `nalgebra` (factorizations),
//! plus the few decompositions the estimators share.

use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use crate::error::AllocationError;
use crate::error::Result;

pub fn to_dmatrix(a: ArrayView2<f64>) -> DMatrix<f64> {
  DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
  Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

pub fn to_dvector(v: &Array1<f64>) -> DVector<f64> {
  DVector::from_iterator(v.len(), v.iter().copied())
}

pub fn to_array1(v: &DVector<f64>) -> Array1<f64> {
  Array1::from_iter(v.iter().copied())
}

/// Lower Cholesky factor, or [`AllocationError::SingularMatrix`] when `a` is not
/// positive definite.
pub fn cholesky_lower(a: &DMatrix<f64>, what: &str) -> Result<DMatrix<f64>> {
  a.clone()
    .cholesky()
    .map(|c| c.l())
    .ok_or_else(|| AllocationError::SingularMatrix(format!("{what} is not positive definite")))
}

/// Smallest eigenvalue accepted, relative to the largest, before a symmetric
/// matrix counts as rank deficient.
pub const RANK_TOLERANCE: f64 = 1e-12;

/// [`AllocationError::SingularMatrix`] unless the symmetric matrix `a` is
/// positive definite with `λ_min > RANK_TOLERANCE · λ_max`.
///
/// Cholesky alone is not enough: an exactly singular matrix often factorizes
/// with a tiny positive pivot left by rounding.
pub fn ensure_full_rank(a: &DMatrix<f64>, what: &str) -> Result<()> {
  if a.nrows() != a.ncols() {
    return Err(AllocationError::SingularMatrix(format!("{what} is not square")));
  }
  if a.nrows() == 0 {
    return Ok(());
  }
  let eig = symmetrize(a).symmetric_eigenvalues();
  let max = eig.max();
  let min = eig.min();
  if !(max.is_finite() && max > 0.0) || !(min > RANK_TOLERANCE * max) {
    return Err(AllocationError::SingularMatrix(format!(
      "{what} is rank deficient (eigenvalues {min:e} .. {max:e})"
    )));
  }
  Ok(())
}

/// Inverse of a symmetric positive definite matrix through its Cholesky factor.
pub fn spd_inverse(a: &DMatrix<f64>, what: &str) -> Result<DMatrix<f64>> {
  ensure_full_rank(a, what)?;
  let chol = a
    .clone()
    .cholesky()
    .ok_or_else(|| AllocationError::SingularMatrix(format!("{what} is not invertible")))?;
  let inv = chol.inverse();
  if inv.iter().any(|v| !v.is_finite()) {
    return Err(AllocationError::SingularMatrix(format!(
      "{what} inverse is not finite"
    )));
  }
  Ok(inv)
}

pub fn symmetrize(a: &DMatrix<f64>) -> DMatrix<f64> {
  (a + a.transpose()) * 0.5
}

/// Symmetric and positive semi-definite within `tol` relative to the largest
/// absolute entry.
pub fn is_symmetric_psd(a: &DMatrix<f64>, tol: f64) -> bool {
  if a.nrows() != a.ncols() {
    return false;
  }
  if a.nrows() == 0 {
    return true;
  }
  let scale = a.amax().max(1.0e-300);
  let asym = (a - a.transpose()).amax();
  if asym > tol * scale {
    return false;
  }
  let eig = symmetrize(a).symmetric_eigenvalues();
  eig.iter().all(|&l| l >= -tol * scale)
}

/// Symmetric square root `V diag(sqrt(max(λ,0)))` usable as a sampling factor
/// for PSD matrices that are not numerically positive definite.
pub fn psd_factor(a: &DMatrix<f64>) -> DMatrix<f64> {
  let eig = symmetrize(a).symmetric_eigen();
  let sqrt_l = eig.eigenvalues.map(|l| l.max(0.0).sqrt());
  &eig.eigenvectors * DMatrix::from_diagonal(&sqrt_l)
}

/// Residuals of the multivariate regression of `y` on `z` (both observations
/// in rows), computed with the pseudo-inverse of `z`.
pub fn residualize(y: &DMatrix<f64>, z: &DMatrix<f64>) -> Result<DMatrix<f64>> {
  if z.ncols() == 0 {
    return Ok(y.clone());
  }
  let pinv = z
    .clone()
    .pseudo_inverse(1e-12)
    .map_err(|e| AllocationError::SingularMatrix(e.to_string()))?;
  Ok(y - z * (pinv * y))
}

/// Least-squares coefficients `B` of `y ≈ z B`.
pub fn least_squares(y: &DMatrix<f64>, z: &DMatrix<f64>) -> Result<DMatrix<f64>> {
  let pinv = z
    .clone()
    .pseudo_inverse(1e-12)
    .map_err(|e| AllocationError::SingularMatrix(e.to_string()))?;
  Ok(pinv * y)
}

/// Column means of an observations-in-rows matrix.
pub fn column_means(data: &Array2<f64>) -> Result<Array1<f64>> {
  data
    .mean_axis(Axis(0))
    .ok_or_else(|| AllocationError::InvalidInput("mean of an empty sample".into()))
}

/// Sample covariance (ddof = 1) of an observations-in-rows matrix.
pub fn sample_covariance(data: &Array2<f64>) -> Result<Array2<f64>> {
  if data.nrows() < 2 {
    return Err(AllocationError::InvalidInput(
      "covariance needs at least two observations".into(),
    ));
  }
  data
    .t()
    .cov(1.0)
    .map_err(|e| AllocationError::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  #[test]
  fn conversions_preserve_layout() {
    let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
    let m = to_dmatrix(a.view());
    assert_eq!(m[(0, 2)], 3.0);
    assert_eq!(m[(1, 0)], 4.0);
    assert_eq!(to_array2(&m), a);
  }

  #[test]
  fn singular_matrix_has_no_cholesky() {
    let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
    assert!(matches!(
      cholesky_lower(&a, "sigma"),
      Err(AllocationError::SingularMatrix(_))
    ));
    assert!(is_symmetric_psd(&a, 1e-10));
  }

  #[test]
  fn duplicated_column_is_rank_deficient() {
    let a = DMatrix::from_row_slice(
      3,
      3,
      &[0.04, 0.04, 0.01, 0.04, 0.04, 0.01, 0.01, 0.01, 0.03],
    );
    assert!(matches!(
      ensure_full_rank(&a, "sigma"),
      Err(AllocationError::SingularMatrix(_))
    ));
    assert!(matches!(
      spd_inverse(&a, "sigma"),
      Err(AllocationError::SingularMatrix(_))
    ));

    let b = DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09]);
    assert!(ensure_full_rank(&b, "sigma").is_ok());
    let inv = spd_inverse(&b, "sigma").unwrap();
    assert!((&b * inv - DMatrix::<f64>::identity(2, 2)).amax() < 1e-12);
  }

  #[test]
  fn psd_factor_reproduces_matrix() {
    let a = DMatrix::from_row_slice(2, 2, &[2.0, 2.0, 2.0, 2.0]);
    let f = psd_factor(&a);
    let back = &f * f.transpose();
    assert!((back - a).amax() < 1e-12);
  }

  #[test]
  fn covariance_uses_unbiased_estimator() {
    let data = array![[1.0, 2.0], [3.0, 6.0], [5.0, 10.0]];
    let cov = sample_covariance(&data).unwrap();
    assert!((cov[[0, 0]] - 4.0).abs() < 1e-12);
    assert!((cov[[0, 1]] - 8.0).abs() < 1e-12);
    assert!((cov[[1, 1]] - 16.0).abs() < 1e-12);
  }
}
