//! # Pseudo-observations
//!
//! $$
//! u_i=\frac{R_i}{n+1},\qquad R_i=\text{average rank of }x_i
//! $$
//!
use std::cmp::Ordering;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;

use crate::error::AllocationError;
use crate::error::Result;

/// Average ranks (1-based); tied values share the mean of their positions.
pub fn average_ranks(x: ArrayView1<f64>) -> Array1<f64> {
  let n = x.len();
  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(Ordering::Equal));

  let mut ranks = Array1::<f64>::zeros(n);
  let mut start = 0;
  while start < n {
    let mut end = start + 1;
    while end < n && x[order[end]] == x[order[start]] {
      end += 1;
    }
    // positions start..end hold ranks start+1..=end
    let rank = (start + end + 1) as f64 / 2.0;
    for &i in &order[start..end] {
      ranks[i] = rank;
    }
    start = end;
  }
  ranks
}

/// Rank transform of one series into the open unit interval.
pub fn pseudo_observations(x: ArrayView1<f64>) -> Result<Array1<f64>> {
  if x.iter().any(|v| !v.is_finite()) {
    return Err(AllocationError::InvalidInput(
      "pseudo-observations need finite values".into(),
    ));
  }
  let denom = (x.len() + 1) as f64;
  Ok(average_ranks(x) / denom)
}

/// Column-wise rank transform of an observations-in-rows matrix. Rows holding
/// any non-finite value are dropped before ranking.
pub fn pseudo_observations_matrix(data: &Array2<f64>) -> Array2<f64> {
  let keep: Vec<usize> = data
    .axis_iter(Axis(0))
    .enumerate()
    .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
    .map(|(i, _)| i)
    .collect();
  let clean = data.select(Axis(0), &keep);

  let denom = (clean.nrows() + 1) as f64;
  let mut out = Array2::<f64>::zeros(clean.dim());
  for (j, col) in clean.axis_iter(Axis(1)).enumerate() {
    out.column_mut(j).assign(&(average_ranks(col) / denom));
  }
  out
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;

  #[test]
  fn values_stay_strictly_inside_unit_interval() {
    let x = array![3.2, -1.0, 7.5, 0.0, 100.0, -50.0];
    let u = pseudo_observations(x.view()).unwrap();
    assert!(u.iter().all(|&v| v > 0.0 && v < 1.0));
    assert!((u[5] - 1.0 / 7.0).abs() < 1e-15);
    assert!((u[4] - 6.0 / 7.0).abs() < 1e-15);
  }

  #[test]
  fn transform_preserves_order() {
    let x = array![0.4, -2.0, 1.5, 0.9, -0.3];
    let u = pseudo_observations(x.view()).unwrap();
    for i in 0..x.len() {
      for j in 0..x.len() {
        if x[i] < x[j] {
          assert!(u[i] < u[j]);
        }
      }
    }
  }

  #[test]
  fn ties_share_the_average_rank() {
    let r = average_ranks(array![1.0, 2.0, 2.0, 3.0].view());
    assert_eq!(r, array![1.0, 2.5, 2.5, 4.0]);
  }

  #[test]
  fn matrix_variant_drops_incomplete_rows() {
    let data = array![[1.0, 5.0], [f64::NAN, 2.0], [3.0, 1.0], [2.0, 4.0]];
    let u = pseudo_observations_matrix(&data);
    assert_eq!(u.dim(), (3, 2));
    assert_eq!(u.column(0), array![0.25, 0.75, 0.5]);
    assert_eq!(u.column(1), array![0.75, 0.25, 0.5]);
  }

  #[test]
  fn non_finite_series_is_rejected() {
    assert!(pseudo_observations(array![1.0, f64::INFINITY].view()).is_err());
  }
}
