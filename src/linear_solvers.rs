//! Linear solves for the semi-implicit time stepper.
use crate::config::SolverParameters;
use crate::error::{SdcError, SolveStage};
use crate::Real;
use log::debug;
use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVectorView, DVectorViewMut, Dyn};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use tempus_sparse::cg::ConjugateGradient;
use tempus_sparse::JacobiPreconditioner;

/// How the system `(I - alpha dt L) dy = rhs` is solved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinearSolverKind {
    /// Jacobi-preconditioned conjugate gradients. Requires a symmetric positive definite system.
    #[default]
    ConjugateGradient,
    /// Dense LU decomposition, computed once.
    DirectLu,
}

enum Backend<T: Real> {
    Cg(ConjugateGradient<T, CsrMatrix<T>, JacobiPreconditioner<T>>),
    Lu(LU<T, Dyn, Dyn>),
}

/// Solves `(I - alpha dt L) dy = rhs` for a fixed linearisation `L`, time step and off-centring.
pub struct LinearTimesteppingSolver<T: Real> {
    kind: LinearSolverKind,
    system: CsrMatrix<T>,
    backend: Backend<T>,
}

impl<T: Real> LinearTimesteppingSolver<T> {
    pub fn new(
        kind: LinearSolverKind,
        linearisation: &CsrMatrix<T>,
        dt: T,
        alpha: T,
        parameters: SolverParameters,
    ) -> Result<Self, SdcError> {
        let n = linearisation.nrows();
        if linearisation.ncols() != n {
            return Err(SdcError::invalid_configuration(format!(
                "linearisation must be square, got {} x {}",
                n,
                linearisation.ncols()
            )));
        }
        parameters.validate()?;

        let scaled = linearisation * (alpha * dt);
        let system = &CsrMatrix::identity(n) - &scaled;

        let backend = match kind {
            LinearSolverKind::ConjugateGradient => {
                let preconditioner = JacobiPreconditioner::from_csr(&system)
                    .map_err(|err| SdcError::invalid_configuration(format!("Jacobi preconditioner: {}", err)))?;
                let cg = ConjugateGradient::new(system.clone(), preconditioner)
                    .with_tolerance(nalgebra::convert(parameters.tolerance))
                    .with_max_iterations(parameters.max_iterations);
                Backend::Cg(cg)
            }
            LinearSolverKind::DirectLu => {
                let lu = DMatrix::from(&system).lu();
                if !lu.is_invertible() {
                    return Err(SdcError::invalid_configuration("linear time stepping system is singular"));
                }
                Backend::Lu(lu)
            }
        };

        Ok(Self { kind, system, backend })
    }

    pub fn kind(&self) -> LinearSolverKind {
        self.kind
    }

    /// The assembled matrix `I - alpha dt L`.
    pub fn system(&self) -> &CsrMatrix<T> {
        &self.system
    }

    /// Solves for `dy`. The content of `dy` on entry is ignored.
    pub fn solve(&mut self, rhs: DVectorView<T>, mut dy: DVectorViewMut<T>) -> Result<(), SdcError> {
        match &mut self.backend {
            Backend::Cg(cg) => {
                dy.fill(T::zero());
                let output = cg
                    .solve(rhs, dy)
                    .map_err(|err| SdcError::solver_failure(SolveStage::LinearSolve, err))?;
                debug!(
                    "CG converged in {} iterations, residual norm {}",
                    output.num_iterations, output.residual_norm
                );
            }
            Backend::Lu(lu) => {
                let solution = lu
                    .solve(&rhs)
                    .ok_or_else(|| SdcError::solver_failure(SolveStage::LinearSolve, "LU solve failed"))?;
                let residual = (&self.system * &solution - rhs).norm();
                dy.copy_from(&solution);
                debug!("Direct linear solve, residual norm {}", residual);
            }
        }
        Ok(())
    }
}
