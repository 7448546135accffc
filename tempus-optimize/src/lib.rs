//! Nonlinear solvers and numerical differentiation used by `tempus`.
use nalgebra::RealField;

pub use nalgebra;

/// The scalar type used for states, time steps and quadrature data.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Vector function traits and finite difference approximations
pub mod calculus;
/// Newton's method for systems of nonlinear equations
pub mod newton;
