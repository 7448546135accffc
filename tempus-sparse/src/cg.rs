//! Preconditioned conjugate gradients for symmetric positive definite systems.
use crate::operator::{LinearOperator, OperatorError};
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use std::error::Error;
use std::fmt;

/// Progress of a CG solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgOutput<T> {
    /// Number of updates made to the solution vector.
    pub num_iterations: usize,
    /// Norm of the recursively updated residual when the solver stopped.
    pub residual_norm: T,
}

#[derive(Debug)]
pub enum CgFailure {
    Operator(OperatorError),
    Preconditioner(OperatorError),
    IndefiniteOperator,
    IndefinitePreconditioner,
    IterationLimit(usize),
}

impl fmt::Display for CgFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operator(err) => write!(f, "applying the operator failed: {}", err),
            Self::Preconditioner(err) => write!(f, "applying the preconditioner failed: {}", err),
            Self::IndefiniteOperator => write!(f, "operator is not positive definite"),
            Self::IndefinitePreconditioner => write!(f, "preconditioner is not positive definite"),
            Self::IterationLimit(limit) => write!(f, "no convergence within {} iterations", limit),
        }
    }
}

#[derive(Debug)]
pub struct CgError<T> {
    pub failure: CgFailure,
    pub output: CgOutput<T>,
}

impl<T: fmt::Debug> fmt::Display for CgError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CG stopped after {} iterations: {}",
            self.output.num_iterations, self.failure
        )
    }
}

impl<T: fmt::Debug> Error for CgError<T> {}

fn resize<T: RealField + Copy>(v: &mut DVector<T>, n: usize) {
    if v.len() != n {
        *v = DVector::zeros(n);
    }
}

/// Conjugate gradients with a fixed operator `A` and preconditioner `P ~ A^{-1}`.
///
/// A solve stops once `||r|| <= tolerance * ||b||`, with `r` the residual maintained by the
/// recurrence.
///
/// ```
/// # use tempus_sparse::cg::ConjugateGradient;
/// # use tempus_sparse::JacobiPreconditioner;
/// # use nalgebra::DVector;
/// # use nalgebra_sparse::{CooMatrix, CsrMatrix};
/// let mut coo = CooMatrix::new(2, 2);
/// coo.push(0, 0, 4.0);
/// coo.push(0, 1, 1.0);
/// coo.push(1, 0, 1.0);
/// coo.push(1, 1, 3.0);
/// let a = CsrMatrix::from(&coo);
/// let jacobi = JacobiPreconditioner::from_csr(&a).unwrap();
///
/// let b = DVector::from_column_slice(&[1.0, 2.0]);
/// let mut x = DVector::zeros(2);
/// let output = ConjugateGradient::new(&a, jacobi)
///     .with_tolerance(1e-12)
///     .solve((&b).into(), (&mut x).into())
///     .unwrap();
/// assert!(output.num_iterations <= 2);
/// ```
#[derive(Debug)]
pub struct ConjugateGradient<T: Scalar, A, P> {
    operator: A,
    preconditioner: P,
    tolerance: T,
    max_iterations: Option<usize>,
    residual: DVector<T>,
    preconditioned: DVector<T>,
    direction: DVector<T>,
    product: DVector<T>,
}

impl<T, A, P> ConjugateGradient<T, A, P>
where
    T: RealField + Copy,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
{
    /// Defaults to a tolerance of `sqrt(eps)` and no iteration limit.
    pub fn new(operator: A, preconditioner: P) -> Self {
        Self {
            operator,
            preconditioner,
            tolerance: T::default_epsilon().sqrt(),
            max_iterations: None,
            residual: DVector::zeros(0),
            preconditioned: DVector::zeros(0),
            direction: DVector::zeros(0),
            product: DVector::zeros(0),
        }
    }

    pub fn with_tolerance(mut self, tolerance: T) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Solves `A x = b`, starting from the current content of `x`.
    pub fn solve(&mut self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<CgOutput<T>, CgError<T>> {
        let n = b.len();
        assert_eq!(x.len(), n, "solution has length {} for a right-hand side of length {}", x.len(), n);

        let mut output = CgOutput {
            num_iterations: 0,
            residual_norm: T::zero(),
        };
        let fail = |failure, output| CgError { failure, output };

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(output);
        }
        let threshold = self.tolerance * b_norm;

        resize(&mut self.residual, n);
        resize(&mut self.preconditioned, n);
        resize(&mut self.direction, n);
        resize(&mut self.product, n);

        // r = b - A x, z = P r, d = z
        self.operator
            .apply((&mut self.residual).into(), (&x).into())
            .map_err(|err| fail(CgFailure::Operator(err), output))?;
        self.residual.axpy(T::one(), &b, -T::one());
        self.preconditioner
            .apply((&mut self.preconditioned).into(), (&self.residual).into())
            .map_err(|err| fail(CgFailure::Preconditioner(err), output))?;
        self.direction.copy_from(&self.preconditioned);
        let mut rz = self.residual.dot(&self.preconditioned);

        loop {
            output.residual_norm = self.residual.norm();
            if output.residual_norm <= threshold {
                return Ok(output);
            }
            if let Some(limit) = self.max_iterations {
                if output.num_iterations >= limit {
                    return Err(fail(CgFailure::IterationLimit(limit), output));
                }
            }
            if rz <= T::zero() {
                return Err(fail(CgFailure::IndefinitePreconditioner, output));
            }

            self.operator
                .apply((&mut self.product).into(), (&self.direction).into())
                .map_err(|err| fail(CgFailure::Operator(err), output))?;
            let curvature = self.direction.dot(&self.product);
            if curvature <= T::zero() {
                return Err(fail(CgFailure::IndefiniteOperator, output));
            }

            let step = rz / curvature;
            x.axpy(step, &self.direction, T::one());
            self.residual.axpy(-step, &self.product, T::one());
            output.num_iterations += 1;

            self.preconditioner
                .apply((&mut self.preconditioned).into(), (&self.residual).into())
                .map_err(|err| fail(CgFailure::Preconditioner(err), output))?;
            let rz_next = self.residual.dot(&self.preconditioned);
            self.direction
                .axpy(T::one(), &self.preconditioned, rz_next / rz);
            rz = rz_next;
        }
    }
}
