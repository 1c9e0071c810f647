//! # Correlation
//!
//! $$
//! \tau_b=\frac{n_c-n_d}{\sqrt{(n_0-n_1)(n_0-n_2)}}
//! $$
//!
use std::cmp::Ordering;

use ndarray::Array2;
use ndarray::Axis;

use crate::error::AllocationError;
use crate::error::Result;

/// Kendall's tau-b of two equally long samples.
pub fn pair_tau(x: &[f64], y: &[f64]) -> Result<f64> {
  let (tau, _) = kendalls::tau_b_with_comparator(x, y, |a: &f64, b: &f64| {
    a.partial_cmp(b).unwrap_or(Ordering::Greater)
  })
  .map_err(|e| AllocationError::DependenceFit(format!("kendall tau: {e:?}")))?;
  if !tau.is_finite() {
    return Err(AllocationError::DependenceFit(
      "kendall tau is undefined for a constant sample".into(),
    ));
  }
  Ok(tau)
}

/// Kendall's tau matrix of the columns of `data`.
pub fn kendall_tau(data: &Array2<f64>) -> Result<Array2<f64>> {
  let cols: Vec<Vec<f64>> = data.axis_iter(Axis(1)).map(|c| c.to_vec()).collect();
  let d = cols.len();
  let mut tau = Array2::<f64>::eye(d);
  for i in 0..d {
    for j in (i + 1)..d {
      let t = pair_tau(&cols[i], &cols[j])?;
      tau[[i, j]] = t;
      tau[[j, i]] = t;
    }
  }
  Ok(tau)
}
