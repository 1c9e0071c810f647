//! # Portfolio Optimizers
//!
//! $$
//! \max_{\mathbf w\in\mathcal W}\ \bar{\mathbf r}^\top\mathbf w-\lambda\,\mathrm{CVaR}_\alpha(-R\mathbf w)
//! $$
//!
//! Scenario-based programs solved with the Clarabel interior-point solver.
//! All programs are long-only and fully invested; the LPs use the
//! Rockafellar–Uryasev auxiliary variables `v` and `z_i ≥ (L_i − v)^+`.

use clarabel::algebra::*;
use clarabel::solver::*;
use ndarray::Array1;
use tracing::debug;
use tracing::warn;

use super::data::diagnostics;
use super::data::scenario_moments;
use super::engine::PortfolioEngineConfig;
use super::types::OptimizerMethod;
use super::types::PortfolioResult;
use crate::error::AllocationError;
use crate::error::Result;
use crate::quant::scenarios::ScenarioMatrix;

/// Column-major builder for CSC matrices. Rows must be pushed in increasing
/// order within a column.
struct CscBuilder {
  nrows: usize,
  colptr: Vec<usize>,
  rowval: Vec<usize>,
  nzval: Vec<f64>,
}

impl CscBuilder {
  fn new(nrows: usize) -> Self {
    Self {
      nrows,
      colptr: vec![0],
      rowval: Vec::new(),
      nzval: Vec::new(),
    }
  }

  fn push(&mut self, row: usize, value: f64) {
    if value != 0.0 {
      self.rowval.push(row);
      self.nzval.push(value);
    }
  }

  fn end_column(&mut self) {
    self.colptr.push(self.rowval.len());
  }

  fn empty_columns(mut self, ncols: usize) -> Self {
    for _ in 0..ncols {
      self.end_column();
    }
    self
  }

  fn build(self) -> CscMatrix<f64> {
    let ncols = self.colptr.len() - 1;
    CscMatrix::new(self.nrows, ncols, self.colptr, self.rowval, self.nzval)
  }
}

/// `min ½xᵀPx + qᵀx  s.t.  Ax + s = b, s ∈ K`.
struct ConicProgram {
  p: CscMatrix<f64>,
  q: Vec<f64>,
  a: CscMatrix<f64>,
  b: Vec<f64>,
  cones: Vec<SupportedConeT<f64>>,
}

struct Optimum {
  x: Vec<f64>,
  objective: f64,
}

fn solve(program: ConicProgram, cfg: &PortfolioEngineConfig) -> Result<Optimum> {
  let settings = DefaultSettingsBuilder::default()
    .max_iter(cfg.max_iter)
    .verbose(false)
    .build()
    .map_err(|e| AllocationError::Solver(format!("failed to build settings: {e}")))?;

  let mut solver = DefaultSolver::new(
    &program.p,
    &program.q,
    &program.a,
    &program.b,
    &program.cones,
    settings,
  );

  solver.solve();

  match solver.solution.status {
    SolverStatus::Solved => {}
    SolverStatus::AlmostSolved => warn!("solver reached reduced accuracy only"),
    SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
      return Err(AllocationError::Infeasible(format!(
        "solver reported {:?}",
        solver.solution.status
      )));
    }
    _ => {
      return Err(AllocationError::Solver(format!(
        "optimization failed with status {:?}",
        solver.solution.status
      )));
    }
  }

  Ok(Optimum {
    x: solver.solution.x.clone(),
    objective: solver.solution.obj_val,
  })
}

/// Clips numerical noise below zero and rescales onto the simplex.
fn project_weights(x: &[f64], n: usize) -> Result<Array1<f64>> {
  let w = Array1::from_iter(x[..n].iter().map(|w| w.max(0.0)));
  let total = w.sum();
  if !total.is_finite() || total <= 0.0 {
    return Err(AllocationError::Solver(
      "solver returned no investable weights".into(),
    ));
  }
  Ok(w / total)
}

fn check_universe(scenarios: &ScenarioMatrix, min_rows: usize) -> Result<(usize, usize)> {
  let (m, n) = scenarios.returns().dim();
  if n == 0 {
    return Err(AllocationError::Infeasible(
      "empty asset universe has no fully invested portfolio".into(),
    ));
  }
  if m < min_rows {
    return Err(AllocationError::InvalidInput(format!(
      "optimization needs at least {min_rows} scenarios, got {m}"
    )));
  }
  Ok((m, n))
}

fn check_alpha(alpha: f64) -> Result<()> {
  if !(alpha > 0.0 && alpha <= 1.0) {
    return Err(AllocationError::InvalidInput(format!(
      "cvar tail probability {alpha} outside (0, 1]"
    )));
  }
  Ok(())
}

fn finish(
  method: OptimizerMethod,
  scenarios: &ScenarioMatrix,
  optimum: Optimum,
  cfg: &PortfolioEngineConfig,
) -> Result<PortfolioResult> {
  let n = scenarios.universe().len();
  let weights = project_weights(&optimum.x, n)?;
  let diagnostics = diagnostics(scenarios, &weights, cfg.cvar_alpha)?;
  // the solver minimizes, so the two maximized utilities come back negated
  let objective = match method {
    OptimizerMethod::MinCvar => optimum.objective,
    OptimizerMethod::MaxSharpe | OptimizerMethod::MaxStarr => -optimum.objective,
  };
  debug!(%method, objective, weights = ?weights.to_vec(), "portfolio optimized");
  Ok(PortfolioResult {
    method,
    weights,
    objective,
    diagnostics,
  })
}

/// Mean-variance utility `max μᵀw − λ wᵀΣw` over the simplex, with `μ` and `Σ`
/// the scenario sample moments.
pub fn optimize_max_sharpe(scenarios: &ScenarioMatrix, cfg: &PortfolioEngineConfig) -> Result<PortfolioResult> {
  let (_, n) = check_universe(scenarios, 2)?;
  let (mu, cov) = scenario_moments(scenarios)?;

  // ½ wᵀ(2λΣ)w, upper triangle only.
  let mut p = CscBuilder::new(n);
  for j in 0..n {
    for i in 0..=j {
      p.push(i, 2.0 * cfg.risk_aversion * cov[[i, j]]);
    }
    p.end_column();
  }
  let q: Vec<f64> = mu.iter().map(|m| -m).collect();

  let mut a = CscBuilder::new(1 + n);
  for j in 0..n {
    a.push(0, 1.0);
    a.push(1 + j, -1.0);
    a.end_column();
  }
  let mut b = vec![1.0];
  b.extend(std::iter::repeat(0.0).take(n));

  let program = ConicProgram {
    p: p.build(),
    q,
    a: a.build(),
    b,
    cones: vec![ZeroConeT(1), NonnegativeConeT(n)],
  };
  let optimum = solve(program, cfg)?;
  finish(OptimizerMethod::MaxSharpe, scenarios, optimum, cfg)
}

/// Shared constraint block of the CVaR programs over `x = [w, v, z]`:
///
/// * `1ᵀw = 1`
/// * `−w ≤ 0`, `−z ≤ 0`
/// * `−r_iᵀw − v − z_i ≤ 0` for every scenario `i`
fn cvar_program(scenarios: &ScenarioMatrix, q: Vec<f64>) -> ConicProgram {
  let r = scenarios.returns();
  let (m, n) = r.dim();
  let nvars = n + 1 + m;
  let nrows = 1 + n + 2 * m;
  let tail_row = 1 + n + m;

  let mut a = CscBuilder::new(nrows);
  for j in 0..n {
    a.push(0, 1.0);
    a.push(1 + j, -1.0);
    for i in 0..m {
      a.push(tail_row + i, -r[[i, j]]);
    }
    a.end_column();
  }
  for i in 0..m {
    a.push(tail_row + i, -1.0);
  }
  a.end_column();
  for i in 0..m {
    a.push(1 + n + i, -1.0);
    a.push(tail_row + i, -1.0);
    a.end_column();
  }

  let mut b = vec![0.0; nrows];
  b[0] = 1.0;

  ConicProgram {
    p: CscBuilder::new(nvars).empty_columns(nvars).build(),
    q,
    a: a.build(),
    b,
    cones: vec![ZeroConeT(1), NonnegativeConeT(n + 2 * m)],
  }
}

/// Rockafellar–Uryasev LP `min v + 1/(αm) Σ z_i`.
pub fn optimize_min_cvar(scenarios: &ScenarioMatrix, cfg: &PortfolioEngineConfig) -> Result<PortfolioResult> {
  let (m, n) = check_universe(scenarios, 1)?;
  check_alpha(cfg.cvar_alpha)?;
  let c = 1.0 / (cfg.cvar_alpha * m as f64);

  let mut q = vec![0.0; n];
  q.push(1.0);
  q.extend(std::iter::repeat(c).take(m));

  let optimum = solve(cvar_program(scenarios, q), cfg)?;
  finish(OptimizerMethod::MinCvar, scenarios, optimum, cfg)
}

/// `max mean(Rw) − λ_cvar CVaR_α(−Rw)`, the linear STARR proxy.
pub fn optimize_max_starr(scenarios: &ScenarioMatrix, cfg: &PortfolioEngineConfig) -> Result<PortfolioResult> {
  let (m, _) = check_universe(scenarios, 1)?;
  check_alpha(cfg.cvar_alpha)?;
  let lambda = cfg.cvar_aversion;
  let c = 1.0 / (cfg.cvar_alpha * m as f64);
  let mean = scenarios
    .returns()
    .mean_axis(ndarray::Axis(0))
    .ok_or_else(|| AllocationError::InvalidInput("empty scenario matrix".into()))?;

  let mut q: Vec<f64> = mean.iter().map(|r| -r).collect();
  q.push(lambda);
  q.extend(std::iter::repeat(lambda * c).take(m));

  let optimum = solve(cvar_program(scenarios, q), cfg)?;
  finish(OptimizerMethod::MaxStarr, scenarios, optimum, cfg)
}

/// Dispatches to the program of `method`.
pub fn optimize_with_method(
  method: OptimizerMethod,
  scenarios: &ScenarioMatrix,
  cfg: &PortfolioEngineConfig,
) -> Result<PortfolioResult> {
  match method {
    OptimizerMethod::MaxSharpe => optimize_max_sharpe(scenarios, cfg),
    OptimizerMethod::MinCvar => optimize_min_cvar(scenarios, cfg),
    OptimizerMethod::MaxStarr => optimize_max_starr(scenarios, cfg),
  }
}
