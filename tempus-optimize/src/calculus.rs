use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;

/// Error produced by a Jacobian solve.
pub type JacobianSolveError = Box<dyn Error + Send + Sync>;

/// A function `R^n -> R^n` evaluated into a caller-provided buffer.
pub trait VectorFunction<T>
where
    T: Scalar,
{
    fn dimension(&self) -> usize;
    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>);
}

impl<T, X> VectorFunction<T> for &mut X
where
    T: Scalar,
    X: VectorFunction<T>,
{
    fn dimension(&self) -> usize {
        X::dimension(self)
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) {
        X::eval_into(self, f, x)
    }
}

/// A vector function that can solve linear systems with its Jacobian.
pub trait DifferentiableVectorFunction<T>: VectorFunction<T>
where
    T: Scalar,
{
    /// Solves `J(x) sol = rhs`.
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), JacobianSolveError>;
}

impl<T, X> DifferentiableVectorFunction<T> for &mut X
where
    T: Scalar,
    X: DifferentiableVectorFunction<T>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), JacobianSolveError> {
        X::solve_jacobian_system(self, sol, x, rhs)
    }
}

/// Central difference approximation of Jacobians,
/// `J[:, j] ~ (f(x + h e_j) - f(x - h e_j)) / (2 h)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentralDifference<T> {
    step: T,
}

impl<T: Real> Default for CentralDifference<T> {
    /// Uses the cube root of machine epsilon as step.
    fn default() -> Self {
        Self {
            step: T::default_epsilon().cbrt(),
        }
    }
}

impl<T: Real> CentralDifference<T> {
    pub fn with_step(step: T) -> Self {
        Self { step }
    }

    pub fn step(&self) -> T {
        self.step
    }

    /// The `m x n` Jacobian of `f: R^n -> R^m` at `x`.
    ///
    /// `f(x, out)` must overwrite `out`.
    pub fn jacobian(&self, m: usize, f: impl FnMut(DVectorView<T>, DVectorViewMut<T>), x: DVectorView<T>) -> DMatrix<T> {
        let mut jacobian = DMatrix::zeros(m, x.len());
        self.accumulate_jacobian(DMatrixViewMut::from(&mut jacobian), T::one(), f, x);
        jacobian
    }

    /// Adds `scale * J(x)` to `jacobian`.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn accumulate_jacobian(
        &self,
        mut jacobian: DMatrixViewMut<T>,
        scale: T,
        mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
        x: DVectorView<T>,
    ) {
        let (m, n) = jacobian.shape();
        assert_eq!(n, x.len(), "Jacobian has {} columns for a point of dimension {}", n, x.len());

        let weight = scale / (2.0 * self.step);
        let mut perturbed = x.clone_owned();
        let mut f_plus = DVector::zeros(m);
        let mut f_minus = DVector::zeros(m);
        for (j, mut column) in jacobian.column_iter_mut().enumerate() {
            perturbed[j] = x[j] + self.step;
            f((&perturbed).into(), (&mut f_plus).into());
            perturbed[j] = x[j] - self.step;
            f((&perturbed).into(), (&mut f_minus).into());
            perturbed[j] = x[j];

            f_plus -= &f_minus;
            column.axpy(weight, &f_plus, T::one());
        }
    }
}
