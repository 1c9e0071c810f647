//! # Vine
//!
//! $$
//! c(u_1,\dots,u_d)=\prod_{t=0}^{d-2}\prod_{k=t+1}^{d-1}
//! c_{o_t,o_k\mid o_0..o_{t-1}}\!\left(F(u_{o_t}\mid\cdot),F(u_{o_k}\mid\cdot)\right)
//! $$
//!
//! Canonical vine (C-vine): tree `t` connects the root `o_t` to every variable
//! not yet used as a root, conditioned on the previous roots.
use std::fmt::Display;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::Rng;
use rand::RngCore;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;
use tracing::info;

use crate::copulas::bivariate::independence::Independence;
use crate::copulas::bivariate::select_pair_copula;
use crate::copulas::bivariate::BivariateExt;
use crate::copulas::bivariate::PairCopula;
use crate::copulas::bivariate::PairFamily;
use crate::copulas::bivariate::PairFit;
use crate::copulas::bivariate::PairSelection;
use crate::copulas::bivariate::SelectionCriterion;
use crate::copulas::correlation::pair_tau;
use crate::error::AllocationError;
use crate::error::Result;
use crate::traits::MultivariateExt;

#[derive(Debug, Clone)]
pub struct VineConfig {
  /// Candidate pair-copula families.
  pub families: Vec<PairFamily>,
  pub criterion: SelectionCriterion,
  /// Prior edge probability of the modified BIC.
  pub psi0: f64,
  /// Number of fitted trees; deeper trees are independence. `0` fits all.
  pub truncation: usize,
  /// Seed of [`VineCopula::simulate`]; `None` draws from entropy.
  pub seed: Option<u64>,
}

impl Default for VineConfig {
  fn default() -> Self {
    Self {
      families: PairFamily::ALL.to_vec(),
      criterion: SelectionCriterion::Mbicv,
      psi0: 0.9,
      truncation: 0,
      seed: None,
    }
  }
}

/// Edge `(o_t, o_k) | o_0..o_{t-1}` of a C-vine.
#[derive(Debug, Clone)]
pub struct VineEdge {
  pub tree: usize,
  /// Root variable of the tree (column index of the input).
  pub root: usize,
  /// Leaf variable (column index of the input).
  pub leaf: usize,
  pub fit: PairFit,
}

/// Fitted C-vine copula. Read-only once built.
#[derive(Debug, Clone)]
pub struct VineCopula {
  order: Vec<usize>,
  /// `trees[t][k - t - 1]` is the edge between `order[t]` and `order[k]`.
  trees: Vec<Vec<VineEdge>>,
  nobs: usize,
  truncation: usize,
  seed: Option<u64>,
}

fn check_unit_matrix(u: ArrayView2<f64>) -> Result<()> {
  if u.iter().any(|v| !v.is_finite() || *v <= 0.0 || *v >= 1.0) {
    return Err(AllocationError::InvalidInput(
      "pseudo-observations must lie strictly inside (0, 1)".into(),
    ));
  }
  Ok(())
}

/// Variable in `remaining` with the largest summed |tau| against the others.
fn pick_root(cond: &[Vec<f64>], remaining: &[usize]) -> Result<usize> {
  if remaining.len() == 1 {
    return Ok(remaining[0]);
  }
  let mut sums = vec![0.0; remaining.len()];
  for a in 0..remaining.len() {
    for b in (a + 1)..remaining.len() {
      let t = pair_tau(&cond[remaining[a]], &cond[remaining[b]])?.abs();
      sums[a] += t;
      sums[b] += t;
    }
  }
  let best = (0..remaining.len())
    .max_by(|&a, &b| sums[a].total_cmp(&sums[b]))
    .unwrap_or(0);
  Ok(remaining[best])
}

impl VineCopula {
  /// Structure selection, family selection and tau-inversion estimation on an
  /// `n_obs×d` matrix of pseudo-observations.
  pub fn fit(u: &Array2<f64>, cfg: &VineConfig) -> Result<Self> {
    let (nobs, d) = u.dim();
    if d < 2 {
      return Err(AllocationError::DependenceFit(format!(
        "vine copula needs at least 2 variables, got {d}"
      )));
    }
    if nobs < 2 {
      return Err(AllocationError::DependenceFit(format!(
        "vine copula needs at least 2 observations, got {nobs}"
      )));
    }
    if cfg.families.is_empty() {
      return Err(AllocationError::DependenceFit(
        "empty family set".into(),
      ));
    }
    check_unit_matrix(u.view())?;

    let mut cond: Vec<Vec<f64>> = u.axis_iter(Axis(1)).map(|c| c.to_vec()).collect();
    let mut remaining: Vec<usize> = (0..d).collect();
    let mut order = Vec::with_capacity(d);
    let mut trees = Vec::with_capacity(d - 1);

    for tree in 0..d - 1 {
      let root = pick_root(&cond, &remaining)?;
      remaining.retain(|&v| v != root);
      order.push(root);

      let truncated = cfg.truncation > 0 && tree >= cfg.truncation;
      let sel = PairSelection {
        families: &cfg.families,
        criterion: cfg.criterion,
        psi0: cfg.psi0,
        tree,
      };

      let edges: Vec<VineEdge> = remaining
        .par_iter()
        .map(|&leaf| -> Result<VineEdge> {
          let fit = if truncated {
            PairFit {
              copula: PairCopula::Independence(Independence),
              empirical_tau: pair_tau(&cond[root], &cond[leaf])?,
              log_likelihood: 0.0,
              score: 0.0,
            }
          } else {
            select_pair_copula(&cond[root], &cond[leaf], &sel).map_err(|e| {
              AllocationError::DependenceFit(format!("edge ({root}, {leaf}) on tree {tree}: {e}"))
            })?
          };
          Ok(VineEdge {
            tree,
            root,
            leaf,
            fit,
          })
        })
        .collect::<Result<_>>()?;

      for edge in &edges {
        let c = &edge.fit.copula;
        let next: Vec<f64> = cond[root]
          .iter()
          .zip(cond[edge.leaf].iter())
          .map(|(&a, &b)| c.h(a, b))
          .collect();
        cond[edge.leaf] = next;
        debug!(tree, root, leaf = edge.leaf, copula = %c, "vine edge");
      }
      trees.push(edges);
    }
    order.extend(remaining);

    let mut position = vec![0; d];
    for (k, &var) in order.iter().enumerate() {
      position[var] = k;
    }
    for edges in trees.iter_mut() {
      edges.sort_by_key(|e: &VineEdge| position[e.leaf]);
    }

    let model = Self {
      order,
      trees,
      nobs,
      truncation: cfg.truncation,
      seed: cfg.seed,
    };
    info!(
      dim = d,
      nobs,
      loglik = model.log_likelihood(),
      n_params = model.n_params(),
      "vine copula fitted"
    );
    Ok(model)
  }

  /// Root order `o_0, ..., o_{d-1}` as column indices.
  pub fn order(&self) -> &[usize] {
    &self.order
  }

  pub fn trees(&self) -> &[Vec<VineEdge>] {
    &self.trees
  }

  pub fn nobs(&self) -> usize {
    self.nobs
  }

  pub fn truncation(&self) -> usize {
    self.truncation
  }

  pub fn log_likelihood(&self) -> f64 {
    self
      .trees
      .iter()
      .flatten()
      .map(|e| e.fit.log_likelihood)
      .sum()
  }

  pub fn n_params(&self) -> usize {
    self
      .trees
      .iter()
      .flatten()
      .map(|e| e.fit.copula.n_params())
      .sum()
  }

  /// Draws `m` rows from the fitted copula with the configured seed.
  pub fn simulate(&self, m: usize) -> Array2<f64> {
    let mut rng = match self.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    self.sample(m, &mut rng)
  }

  fn edge(&self, tree: usize, pos: usize) -> &PairCopula {
    &self.trees[tree][pos - tree - 1].fit.copula
  }
}

impl MultivariateExt for VineCopula {
  fn dim(&self) -> usize {
    self.order.len()
  }

  fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Array2<f64> {
    let d = self.dim();
    let mut out = Array2::<f64>::zeros((n, d));
    let mut w = vec![0.0; d];
    for mut row in out.axis_iter_mut(Axis(0)) {
      for wk in w.iter_mut() {
        *wk = rng.gen_range(f64::EPSILON..1.0);
      }
      row[self.order[0]] = w[0];
      for k in 1..d {
        let mut x = w[k];
        for t in (0..k).rev() {
          x = self.edge(t, k).hinv(x, w[t]);
        }
        row[self.order[k]] = x;
      }
    }
    out
  }

  fn log_pdf(&self, u: ArrayView2<f64>) -> Result<Array1<f64>> {
    let d = self.dim();
    if u.ncols() != d {
      return Err(AllocationError::dim("copula dimension", d, u.ncols()));
    }
    check_unit_matrix(u)?;

    let mut out = Array1::<f64>::zeros(u.nrows());
    let mut cond = vec![0.0; d];
    for (i, row) in u.axis_iter(Axis(0)).enumerate() {
      for (k, &var) in self.order.iter().enumerate() {
        cond[k] = row[var];
      }
      let mut total = 0.0;
      for t in 0..d - 1 {
        let root = cond[t];
        for k in (t + 1)..d {
          let c = self.edge(t, k);
          total += c.log_pdf(root, cond[k]);
          cond[k] = c.h(root, cond[k]);
        }
      }
      out[i] = total;
    }
    Ok(out)
  }
}

impl Display for VineCopula {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    for (t, edges) in self.trees.iter().enumerate() {
      let given: Vec<String> = self.order[..t].iter().map(|v| v.to_string()).collect();
      for e in edges {
        if given.is_empty() {
          writeln!(f, "tree {t}: {},{} {}", e.root, e.leaf, e.fit.copula)?;
        } else {
          writeln!(
            f,
            "tree {t}: {},{}|{} {}",
            e.root,
            e.leaf,
            given.join(","),
            e.fit.copula
          )?;
        }
      }
    }
    Ok(())
  }
}
