//! # Univariate
//!
//! $$
//! \Phi(x)=\tfrac12\operatorname{erfc}\!\left(-x/\sqrt2\right)
//! $$
//!
pub mod gaussian;
