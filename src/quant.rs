//! # Quant
//!
//! $$
//! \mathbf w^\*=\arg\min_{\mathbf w\in\mathcal W}\ \rho\left(R_{BL}\mathbf w\right)
//! $$
//!
pub mod black_litterman;
pub mod pipeline;
pub mod portfolio;
pub mod scenarios;
pub mod universe;
pub mod views;

pub use pipeline::run_pipeline;
pub use pipeline::PipelineConfig;
pub use pipeline::PipelineOutput;
pub use pipeline::ResidualDefinition;
pub use pipeline::ScenarioSource;
pub use universe::AssetUniverse;
pub use universe::PriceTable;
