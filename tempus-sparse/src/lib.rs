//! Linear operators and the preconditioned conjugate gradient method.
//!
//! Operators act on `nalgebra` vector views, so CSR matrices and matrix-free operators can both
//! be handed to the same solver.

pub mod cg;
pub mod operator;

pub use operator::{JacobiPreconditioner, LinearOperator, OperatorError};

pub use nalgebra_sparse::CsrMatrix;
