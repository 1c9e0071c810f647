//! # allocation-rs
//!
//! $$
//! \text{prices}\to\text{GARCH}\to\text{vine copula}\to\text{scenarios},\qquad
//! \text{prices}\to\text{VECM}\to\text{Black–Litterman}\to\mathbf w
//! $$
//!
//! Dependence-aware return synthesis and scenario-based portfolio construction.
//!
//! - [`stats`]: GARCH(1,1), rank transform, Johansen test and VECM.
//! - [`copulas`]: bivariate families and the C-vine.
//! - [`quant`]: scenarios, views, Black–Litterman, optimizers and the pipeline.

pub mod copulas;
pub mod error;
pub mod quant;
pub mod stats;
pub mod traits;

pub use error::AllocationError;
pub use error::Result;
