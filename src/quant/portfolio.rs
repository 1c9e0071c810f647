//! # Portfolio
//!
//! $$
//! \mathbf w^\*=\arg\min_{\mathbf w\in\mathcal W}\ \rho(R\mathbf w)
//! $$
//!
//! Long-only, fully invested optimization over a scenario matrix.

pub mod data;
pub mod engine;
pub mod optimizers;
pub mod types;

pub use data::diagnostics;
pub use data::empirical_cvar;
pub use data::portfolio_returns;
pub use data::scenario_moments;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use engine::WeightColumn;
pub use engine::WeightTable;
pub use optimizers::optimize_max_sharpe;
pub use optimizers::optimize_max_starr;
pub use optimizers::optimize_min_cvar;
pub use optimizers::optimize_with_method;
pub use types::Diagnostics;
pub use types::OptimizerMethod;
pub use types::PortfolioResult;
