//! Residual assembly for the correction sweeps.
//!
//! Every solve performed during an SDC step has the form
//!
//! ```text
//! y - a F_sel(y) = rhs
//! ```
//!
//! for some shift `a >= 0` and term selection. [`ImplicitSolver`] solves this with Newton's
//! method, and [`ResidualAdapter`] builds the right-hand sides of the correction equations and
//! the final update.
use crate::config::{SdcConfig, SdcVariant, SolverParameters};
use crate::equation::{Equation, TermSelection};
use crate::error::{SdcError, SolveStage};
use crate::Real;
use log::trace;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use rayon::prelude::*;
use tempus_optimize::calculus::{DifferentiableVectorFunction, JacobianSolveError, VectorFunction};
use tempus_optimize::newton::{newton, NewtonSettings};

/// The residual `r(y) = y - a F_sel(y) - rhs`.
struct ShiftedResidual<'a, T: Real> {
    equation: &'a dyn Equation<T>,
    selection: TermSelection,
    a: T,
    rhs: DVectorView<'a, T>,
}

impl<'a, T: Real> VectorFunction<T> for ShiftedResidual<'a, T> {
    fn dimension(&self) -> usize {
        self.rhs.len()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) {
        if self.a == T::zero() {
            f.copy_from(x);
        } else {
            self.equation
                .eval_rhs_into(self.selection, DVectorViewMut::from(&mut *f), *x);
            f.axpy(T::one(), x, -self.a);
        }
        *f -= &self.rhs;
    }
}

impl<'a, T: Real> DifferentiableVectorFunction<T> for ShiftedResidual<'a, T> {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), JacobianSolveError> {
        if self.a == T::zero() {
            // The Jacobian of y - rhs is the identity
            sol.copy_from(rhs);
            Ok(())
        } else {
            self.equation
                .solve_shifted_jacobian(self.selection, self.a, *x, *rhs, DVectorViewMut::from(&mut *sol))
        }
    }
}

/// A Newton solver for `y - a F_sel(y) = rhs` with its own work buffers.
///
/// The convergence tolerance is relative: the iteration stops once
/// `||r(y)|| <= tolerance * max(1, ||rhs||)`.
#[derive(Debug, Clone)]
pub struct ImplicitSolver<T: Real> {
    parameters: SolverParameters,
    f: DVector<T>,
    dx: DVector<T>,
}

impl<T: Real> ImplicitSolver<T> {
    pub fn new(parameters: SolverParameters) -> Self {
        Self {
            parameters,
            f: DVector::zeros(0),
            dx: DVector::zeros(0),
        }
    }

    pub fn parameters(&self) -> &SolverParameters {
        &self.parameters
    }

    /// Solves `y - a F_sel(y) = rhs`, with `y` holding the initial guess on entry.
    ///
    /// Returns the number of Newton iterations.
    pub fn solve(
        &mut self,
        equation: &dyn Equation<T>,
        selection: TermSelection,
        a: T,
        rhs: DVectorView<T>,
        y: DVectorViewMut<T>,
        stage: SolveStage,
    ) -> Result<usize, SdcError> {
        let n = equation.dimension();
        assert_eq!(rhs.len(), n);
        assert_eq!(y.len(), n);
        if self.f.len() != n {
            self.f = DVector::zeros(n);
            self.dx = DVector::zeros(n);
        }

        let scale = T::one().max(rhs.norm());
        let settings = NewtonSettings {
            max_iterations: self.parameters.max_iterations,
            tolerance: nalgebra::convert::<f64, T>(self.parameters.tolerance) * scale,
        };
        let residual = ShiftedResidual {
            equation,
            selection,
            a,
            rhs,
        };

        let iterations = newton(residual, y, &mut self.f, &mut self.dx, settings)
            .map_err(|err| SdcError::solver_failure(stage, err))?;
        trace!("{}: converged in {} Newton iterations", stage, iterations);
        Ok(iterations)
    }
}

/// The solvers owned by an SDC scheme, one per kind of solve.
#[derive(Debug, Clone)]
pub struct SolverHandles<T: Real> {
    /// Used for the per-node correction equations.
    pub correction: ImplicitSolver<T>,
    /// Used for the final quadrature update.
    pub final_update: ImplicitSolver<T>,
    rhs: DVector<T>,
    f_new: DVector<T>,
    f_old: DVector<T>,
}

impl<T: Real> SolverHandles<T> {
    pub fn new(config: &SdcConfig) -> Self {
        Self {
            correction: ImplicitSolver::new(config.nonlinear_solver),
            final_update: ImplicitSolver::new(config.linear_solver),
            rhs: DVector::zeros(0),
            f_new: DVector::zeros(0),
            f_old: DVector::zeros(0),
        }
    }

    fn resize_buffers(&mut self, n: usize) {
        if self.rhs.len() != n {
            self.rhs = DVector::zeros(n);
            self.f_new = DVector::zeros(n);
            self.f_old = DVector::zeros(n);
        }
    }
}

/// Node values entering the correction equation at node `m`.
#[derive(Debug, Copy, Clone)]
pub struct CorrectionInputs<'a, T: Real> {
    /// The already corrected value at the previous node, `next[m - 1]`.
    pub previous_new: DVectorView<'a, T>,
    /// The value at the previous node from the last sweep, `current[m - 1]`.
    pub previous_old: DVectorView<'a, T>,
    /// The value at this node from the last sweep, `current[m]`. Also the initial guess.
    pub current_old: DVectorView<'a, T>,
    /// The node-to-node quadrature increment `quad[m - 1]`.
    pub quad: DVectorView<'a, T>,
    /// Width of the sub-interval ending at this node.
    pub dtau: T,
}

/// Connects an equation with the solvers of an SDC scheme.
pub struct ResidualAdapter<'a, T: Real> {
    equation: &'a dyn Equation<T>,
    handles: &'a mut SolverHandles<T>,
}

impl<'a, T: Real> ResidualAdapter<'a, T> {
    pub fn new(equation: &'a dyn Equation<T>, handles: &'a mut SolverHandles<T>) -> Self {
        handles.resize_buffers(equation.dimension());
        Self { equation, handles }
    }

    pub fn equation(&self) -> &dyn Equation<T> {
        self.equation
    }

    /// Evaluates `f = F(y)`.
    pub fn evaluate_rhs(&self, y: DVectorView<T>, f: DVectorViewMut<T>) {
        self.equation.eval_rhs_into(TermSelection::All, f, y);
    }

    /// Evaluates `f[m] = F(y[m])` for every `m`, optionally on the rayon thread pool.
    pub fn evaluate_rhs_at_nodes(&self, y: &[DVector<T>], f: &mut [DVector<T>], parallel: bool) {
        assert_eq!(y.len(), f.len());
        let equation = self.equation;
        let evaluate = |(f_m, y_m): (&mut DVector<T>, &DVector<T>)| {
            equation.eval_rhs_into(TermSelection::All, DVectorViewMut::from(f_m), DVectorView::from(y_m))
        };
        if parallel {
            f.par_iter_mut().zip(y.par_iter()).for_each(evaluate);
        } else {
            f.iter_mut().zip(y.iter()).for_each(evaluate);
        }
    }

    /// Solves the correction equation of the given variant for the value at one node.
    pub fn solve_correction_step(
        &mut self,
        variant: SdcVariant,
        stage: SolveStage,
        inputs: CorrectionInputs<T>,
        mut out: DVectorViewMut<T>,
    ) -> Result<usize, SdcError> {
        let equation = self.equation;
        let handles = &mut *self.handles;
        let dtau = inputs.dtau;

        handles.rhs.copy_from(&inputs.previous_new);
        handles.rhs += &inputs.quad;

        let (selection, a) = match variant {
            SdcVariant::ForwardEuler => {
                // y = next[m-1] + dtau (F(next[m-1]) - F(current[m-1])) + quad[m-1]
                equation.eval_rhs_into(TermSelection::All, (&mut handles.f_new).into(), inputs.previous_new);
                equation.eval_rhs_into(TermSelection::All, (&mut handles.f_old).into(), inputs.previous_old);
                handles.rhs.axpy(dtau, &handles.f_new, T::one());
                handles.rhs.axpy(-dtau, &handles.f_old, T::one());
                (TermSelection::All, T::zero())
            }
            SdcVariant::BackwardEuler => {
                // y - dtau F(y) = next[m-1] - dtau F(current[m]) + quad[m-1]
                equation.eval_rhs_into(TermSelection::All, (&mut handles.f_old).into(), inputs.current_old);
                handles.rhs.axpy(-dtau, &handles.f_old, T::one());
                (TermSelection::All, dtau)
            }
            SdcVariant::Imex => {
                // y - dtau F_I(y) = next[m-1] + dtau (F_E(next[m-1]) - F_E(current[m-1]))
                //                   - dtau F_I(current[m]) + quad[m-1]
                equation.eval_rhs_into(TermSelection::Explicit, (&mut handles.f_new).into(), inputs.previous_new);
                equation.eval_rhs_into(TermSelection::Explicit, (&mut handles.f_old).into(), inputs.previous_old);
                handles.rhs.axpy(dtau, &handles.f_new, T::one());
                handles.rhs.axpy(-dtau, &handles.f_old, T::one());
                equation.eval_rhs_into(TermSelection::Implicit, (&mut handles.f_old).into(), inputs.current_old);
                handles.rhs.axpy(-dtau, &handles.f_old, T::one());
                (TermSelection::Implicit, dtau)
            }
        };

        out.copy_from(&inputs.current_old);
        handles
            .correction
            .solve(equation, selection, a, DVectorView::from(&handles.rhs), out, stage)
    }

    /// Solves `y = start + quad_final` for the value at the end of the step.
    pub fn solve_final_update(
        &mut self,
        start: DVectorView<T>,
        quad_final: DVectorView<T>,
        mut out: DVectorViewMut<T>,
    ) -> Result<usize, SdcError> {
        let handles = &mut *self.handles;
        handles.rhs.copy_from(&start);
        handles.rhs += &quad_final;
        out.copy_from(&start);
        handles.final_update.solve(
            self.equation,
            TermSelection::All,
            T::zero(),
            DVectorView::from(&handles.rhs),
            out,
            SolveStage::FinalUpdate,
        )
    }
}
