//! # Portfolio Engine
//!
//! $$
//! \mathbf{w}^\*_c = \operatorname{Optimize}_c(R),\qquad c\in\{\text{Sharpe},\text{CVaR},\text{STARR}\}
//! $$
//!
//! Runs every configured criterion over one scenario matrix and collects the
//! weight columns.

use std::fmt::Display;

use ndarray::Array1;
use prettytable::format;
use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;
use tracing::info;
use tracing::warn;

use super::optimizers::optimize_with_method;
use super::types::OptimizerMethod;
use super::types::PortfolioResult;
use crate::error::AllocationError;
use crate::error::Result;
use crate::quant::scenarios::ScenarioMatrix;
use crate::quant::universe::AssetUniverse;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  /// Criteria evaluated by [`PortfolioEngine::run`].
  pub methods: Vec<OptimizerMethod>,
  /// Variance penalty `λ` of the Sharpe proxy.
  pub risk_aversion: f64,
  /// Tail probability `α` of the CVaR programs and diagnostics.
  pub cvar_alpha: f64,
  /// CVaR penalty `λ_cvar` of the STARR proxy.
  pub cvar_aversion: f64,
  /// Interior-point iteration cap.
  pub max_iter: u32,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      methods: OptimizerMethod::ALL.to_vec(),
      risk_aversion: 10.0,
      cvar_alpha: 0.01,
      cvar_aversion: 10.0,
      max_iter: 200,
    }
  }
}

/// One criterion of a [`WeightTable`]. Failed criteria keep their error.
#[derive(Clone, Debug)]
pub struct WeightColumn {
  pub method: OptimizerMethod,
  pub outcome: Result<PortfolioResult>,
}

/// Weight vectors per criterion, indexed by asset.
#[derive(Clone, Debug)]
pub struct WeightTable {
  universe: AssetUniverse,
  columns: Vec<WeightColumn>,
}

impl WeightTable {
  pub fn universe(&self) -> &AssetUniverse {
    &self.universe
  }

  pub fn columns(&self) -> &[WeightColumn] {
    &self.columns
  }

  pub fn get(&self, method: OptimizerMethod) -> Option<&PortfolioResult> {
    self
      .columns
      .iter()
      .find(|c| c.method == method)
      .and_then(|c| c.outcome.as_ref().ok())
  }

  pub fn weights(&self, method: OptimizerMethod) -> Option<&Array1<f64>> {
    self.get(method).map(|r| &r.weights)
  }

  pub fn error(&self, method: OptimizerMethod) -> Option<&AllocationError> {
    self
      .columns
      .iter()
      .find(|c| c.method == method)
      .and_then(|c| c.outcome.as_ref().err())
  }

  /// Weight of `ticker` under `method`.
  pub fn weight(&self, ticker: &str, method: OptimizerMethod) -> Option<f64> {
    let i = self.universe.index_of(ticker)?;
    self.weights(method).map(|w| w[i])
  }

  /// Pretty table with one row per asset and a diagnostics footer.
  pub fn to_table(&self) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);

    let mut header = vec![Cell::new("asset")];
    header.extend(self.columns.iter().map(|c| Cell::new(&c.method.to_string())));
    table.set_titles(Row::new(header));

    let fmt = |v: Option<f64>, digits: usize| match v {
      Some(v) => format!("{v:.digits$}"),
      None => "n/a".to_string(),
    };

    for (i, ticker) in self.universe.tickers().iter().enumerate() {
      let mut row = vec![Cell::new(ticker)];
      for c in &self.columns {
        let w = c.outcome.as_ref().ok().map(|r| r.weights[i]);
        row.push(Cell::new(&fmt(w, 4)));
      }
      table.add_row(Row::new(row));
    }

    type Stat = fn(&PortfolioResult) -> f64;
    let stats: [(&str, Stat); 5] = [
      ("E[r]", |r| r.diagnostics.expected_return),
      ("vol", |r| r.diagnostics.volatility),
      ("CVaR", |r| r.diagnostics.cvar),
      ("ret/vol", |r| r.diagnostics.sharpe),
      ("ret/CVaR", |r| r.diagnostics.starr),
    ];
    for (label, stat) in stats {
      let mut row = vec![Cell::new(label)];
      for c in &self.columns {
        row.push(Cell::new(&fmt(c.outcome.as_ref().ok().map(stat), 6)));
      }
      table.add_row(Row::new(row));
    }
    table
  }
}

impl Display for WeightTable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.to_table())
  }
}

/// Single entry point for scenario-based portfolio optimization.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Optimizes a single criterion.
  pub fn optimize(&self, method: OptimizerMethod, scenarios: &ScenarioMatrix) -> Result<PortfolioResult> {
    optimize_with_method(method, scenarios, &self.config)
  }

  /// Runs every configured criterion. A failing criterion is recorded in its
  /// column and does not stop the others.
  pub fn run(&self, scenarios: &ScenarioMatrix) -> WeightTable {
    let columns = self
      .config
      .methods
      .iter()
      .map(|&method| {
        let outcome = self.optimize(method, scenarios);
        match &outcome {
          Ok(r) => info!(%method, sharpe = r.diagnostics.sharpe, cvar = r.diagnostics.cvar, "criterion solved"),
          Err(e) => warn!(%method, error = %e, "criterion failed"),
        }
        WeightColumn { method, outcome }
      })
      .collect();

    WeightTable {
      universe: scenarios.universe().clone(),
      columns,
    }
  }
}
