use crate::calculus::{DifferentiableVectorFunction, JacobianSolveError};
use crate::Real;
use log::debug;
use nalgebra::{DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NewtonSettings<T> {
    pub max_iterations: Option<usize>,
    pub tolerance: T,
}

#[derive(Debug)]
pub enum NewtonError {
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached(usize),
    /// The procedure failed because solving the Jacobian system failed.
    JacobianError(JacobianSolveError),
    /// The residual became NaN or infinite at the given iteration.
    NonFiniteResidual(usize),
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &NewtonError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
            &NewtonError::JacobianError(ref err) => {
                write!(f, "Failed to solve Jacobian system. Error: {}", err)
            }
            &NewtonError::NonFiniteResidual(iter) => {
                write!(f, "Residual is not finite at iteration {}.", iter)
            }
        }
    }
}

impl Error for NewtonError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NewtonError::JacobianError(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Attempts to solve the non-linear equation F(u) = 0.
///
/// `x` holds the initial guess on entry and the solution on successful return. `f` and `dx` are
/// work buffers, and on return `f` holds the final residual. No heap allocation is performed.
/// The solution is said to have converged if
/// ```|F(u)|_2 <= tolerance```.
///
/// If the initial guess already satisfies the tolerance, no iterations are performed.
/// If successful, returns the number of iterations performed.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn newton<'a, T, F>(
    mut function: F,
    x: impl Into<DVectorViewMut<'a, T>>,
    f: impl Into<DVectorViewMut<'a, T>>,
    dx: impl Into<DVectorViewMut<'a, T>>,
    settings: NewtonSettings<T>,
) -> Result<usize, NewtonError>
where
    T: Real,
    F: DifferentiableVectorFunction<T>,
{
    let mut x = x.into();
    let mut f = f.into();
    let mut minus_dx = dx.into();

    assert_eq!(x.nrows(), f.nrows());
    assert_eq!(minus_dx.nrows(), f.nrows());

    function.eval_into(&mut f, &DVectorView::from(&x));

    let mut iter = 0;

    loop {
        let residual_norm = f.norm();
        if !residual_norm.is_finite() {
            return Err(NewtonError::NonFiniteResidual(iter));
        }
        if residual_norm <= settings.tolerance {
            break;
        }
        if settings
            .max_iterations
            .map(|max_iter| iter == max_iter)
            .unwrap_or(false)
        {
            return Err(NewtonError::MaximumIterationsReached(iter));
        }

        // Solve the system J dx = -f   <=>   J (-dx) = f
        function
            .solve_jacobian_system(&mut minus_dx, &DVectorView::from(&x), &DVectorView::from(&f))
            .map_err(NewtonError::JacobianError)?;

        // x <- x + dx = x - (-dx)
        x.axpy(-1.0, &minus_dx, 1.0);
        function.eval_into(&mut f, &DVectorView::from(&x));

        debug!(
            "Newton iteration {}: step norm {}, residual norm {}",
            iter,
            minus_dx.norm(),
            residual_norm
        );
        iter += 1;
    }

    Ok(iter)
}
