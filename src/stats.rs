//! # Stats
//!
//! $$
//! \hat\theta=\arg\max_\theta \ell(\theta\mid x_{1:T})
//! $$
//!
pub mod garch;
pub mod johansen;
pub mod linalg;
pub mod pseudo_obs;
pub mod vecm;
