use nalgebra::{ClosedAdd, ClosedMul, DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use num::{One, Zero};
use std::error::Error;

/// Error produced when an operator fails to apply.
pub type OperatorError = Box<dyn Error + Send + Sync>;

/// A linear map `y = A x`. Implementations overwrite `y`.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), OperatorError>;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), OperatorError> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T> LinearOperator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), OperatorError> {
        if self.nrows() != y.len() || self.ncols() != x.len() {
            return Err(Box::from(format!(
                "cannot apply a {} x {} matrix to a vector of length {} with output length {}",
                self.nrows(),
                self.ncols(),
                x.len(),
                y.len()
            )));
        }
        // spmm_csr_dense scales the old contents by beta, and 0 * NaN is NaN
        y.fill(T::zero());
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
        Ok(())
    }
}

/// Diagonal (Jacobi) preconditioner `P = diag(A)^{-1}`.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner<T: Scalar> {
    inverse_diagonal: DVector<T>,
}

impl<T: RealField + Copy> JacobiPreconditioner<T> {
    /// Builds the preconditioner from the diagonal of a square CSR matrix.
    ///
    /// Fails if a diagonal entry is missing or zero.
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Result<Self, OperatorError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(Box::from(format!(
                "Jacobi preconditioner requires a square matrix, got {} x {}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }

        let mut inverse_diagonal = DVector::zeros(matrix.nrows());
        for (i, row) in matrix.row_iter().enumerate() {
            let diagonal = row
                .col_indices()
                .iter()
                .zip(row.values())
                .filter(|(&j, _)| j == i)
                .map(|(_, &v)| v)
                .fold(T::zero(), |acc, v| acc + v);
            if diagonal == T::zero() {
                return Err(Box::from(format!("Zero diagonal entry in row {}", i)));
            }
            inverse_diagonal[i] = T::one() / diagonal;
        }

        Ok(Self { inverse_diagonal })
    }

    pub fn inverse_diagonal(&self) -> &DVector<T> {
        &self.inverse_diagonal
    }
}

impl<T: RealField + Copy> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), OperatorError> {
        y.copy_from(&x);
        y.component_mul_assign(&self.inverse_diagonal);
        Ok(())
    }
}
