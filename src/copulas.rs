//! # Copulas
//!
//! $$
//! F(x_1,\dots,x_d)=C\left(F_1(x_1),\dots,F_d(x_d)\right)
//! $$
//!
pub mod bivariate;
pub mod correlation;
pub mod multivariate;
pub mod univariate;
