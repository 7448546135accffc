//! Spectral deferred correction and time-stepping control for semi-discrete PDE systems.
//!
//! Systems are written as `dy/dt = F(y)`, where `F` is a sum of labelled terms (see
//! [`equation`]). A [`TimeDiscretisation`](time_discretisation::TimeDiscretisation) advances a
//! state over one step; [`sdc::Sdc`] is a high-order discretisation built from a low-order one.
//! The [`timeloop`] module drives discretisations over many steps with output control.
pub mod config;
pub mod equation;
pub mod error;
pub mod fields;
pub mod integration;
pub mod io;
pub mod linear_solvers;
pub mod quadrature;
pub mod residual;
pub mod sdc;
pub mod time_discretisation;
pub mod timeloop;

pub mod optimize {
    pub use tempus_optimize::*;
}

pub mod sparse {
    pub use tempus_sparse::*;
}

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use error::SdcError;
pub use tempus_optimize::Real;
