//! Low-order one-step schemes for `dy/dt = F(y)`.
//!
//! These are used directly by the time loops and as predictors inside
//! [`Sdc`](crate::sdc::Sdc). Explicit schemes may split each step into a number of equal
//! sub-steps. Implicit schemes own an [`ImplicitSolver`].
use crate::config::SolverParameters;
use crate::equation::{Equation, TermSelection};
use crate::error::{SdcError, SolveStage};
use crate::residual::ImplicitSolver;
use crate::Real;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;

/// A scheme that advances a state over one time step.
pub trait TimeDiscretisation<T: Real>: Send {
    fn name(&self) -> &'static str;

    /// Whether the scheme only evaluates the right-hand side and never solves.
    fn is_explicit(&self) -> bool;

    /// Advances `x_in` by `dt` and stores the result in `x_out`.
    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError>;
}

impl<T, D> TimeDiscretisation<T> for Box<D>
where
    T: Real,
    D: TimeDiscretisation<T> + ?Sized,
{
    fn name(&self) -> &'static str {
        D::name(self)
    }

    fn is_explicit(&self) -> bool {
        D::is_explicit(self)
    }

    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        D::apply(self, equation, dt, x_in, x_out)
    }
}

fn eval_rhs<T: Real>(equation: &dyn Equation<T>, y: &DVector<T>, f: &mut DVector<T>) {
    equation.eval_rhs_into(TermSelection::All, f.into(), y.into());
}

/// Shared state of the explicit schemes: the number of sub-steps and `S` stage buffers.
#[derive(Debug, Clone)]
struct Subcycling<T: Real, const S: usize> {
    subcycles: usize,
    y: DVector<T>,
    stages: [DVector<T>; S],
}

impl<T: Real, const S: usize> Subcycling<T, S> {
    fn new(subcycles: usize) -> Result<Self, SdcError> {
        if subcycles == 0 {
            return Err(SdcError::invalid_configuration("number of subcycles must be positive"));
        }
        Ok(Self {
            subcycles,
            y: DVector::zeros(0),
            stages: std::array::from_fn(|_| DVector::zeros(0)),
        })
    }

    fn run(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        mut x_out: DVectorViewMut<T>,
        mut cycle: impl FnMut(&dyn Equation<T>, T, &mut DVector<T>, &mut [DVector<T>; S]),
    ) {
        let n = equation.dimension();
        if self.y.len() != n {
            self.y = DVector::zeros(n);
            for stage in &mut self.stages {
                *stage = DVector::zeros(n);
            }
        }

        let h = dt / nalgebra::convert::<f64, T>(self.subcycles as f64);
        self.y.copy_from(&x_in);
        for _ in 0..self.subcycles {
            cycle(equation, h, &mut self.y, &mut self.stages);
        }
        x_out.copy_from(&self.y);
    }
}

macro_rules! impl_explicit_constructors {
    ($scheme:ident) => {
        impl<T: Real> $scheme<T> {
            pub fn new() -> Self {
                Self {
                    core: Subcycling {
                        subcycles: 1,
                        y: DVector::zeros(0),
                        stages: std::array::from_fn(|_| DVector::zeros(0)),
                    },
                }
            }

            /// Splits every step into `subcycles` equal sub-steps.
            pub fn with_subcycles(subcycles: usize) -> Result<Self, SdcError> {
                Ok(Self {
                    core: Subcycling::new(subcycles)?,
                })
            }

            pub fn subcycles(&self) -> usize {
                self.core.subcycles
            }
        }

        impl<T: Real> Default for $scheme<T> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// `y_{n+1} = y_n + dt F(y_n)`.
#[derive(Debug, Clone)]
pub struct ForwardEuler<T: Real> {
    core: Subcycling<T, 1>,
}

impl_explicit_constructors!(ForwardEuler);

impl<T: Real> TimeDiscretisation<T> for ForwardEuler<T> {
    fn name(&self) -> &'static str {
        "forward Euler"
    }

    fn is_explicit(&self) -> bool {
        true
    }

    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        self.core
            .run(equation, dt, x_in, x_out, |equation, h, y, [k]| {
                eval_rhs(equation, y, k);
                y.axpy(h, &*k, T::one());
            });
        Ok(())
    }
}

/// The two-stage strong stability preserving Runge-Kutta method.
#[derive(Debug, Clone)]
pub struct Heun<T: Real> {
    core: Subcycling<T, 2>,
}

impl_explicit_constructors!(Heun);

impl<T: Real> TimeDiscretisation<T> for Heun<T> {
    fn name(&self) -> &'static str {
        "Heun"
    }

    fn is_explicit(&self) -> bool {
        true
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        self.core
            .run(equation, dt, x_in, x_out, |equation, h, y, [k, y1]| {
                eval_rhs(equation, y, k);
                y1.copy_from(&*y);
                y1.axpy(h, &*k, 1.0);

                eval_rhs(equation, y1, k);
                y1.axpy(h, &*k, 1.0);
                y.axpy(0.5, &*y1, 0.5);
            });
        Ok(())
    }
}

/// The three-stage strong stability preserving Runge-Kutta method of Shu and Osher.
#[derive(Debug, Clone)]
pub struct Ssprk3<T: Real> {
    core: Subcycling<T, 3>,
}

impl_explicit_constructors!(Ssprk3);

impl<T: Real> TimeDiscretisation<T> for Ssprk3<T> {
    fn name(&self) -> &'static str {
        "SSPRK3"
    }

    fn is_explicit(&self) -> bool {
        true
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        self.core
            .run(equation, dt, x_in, x_out, |equation, h, y, [k, y1, y2]| {
                eval_rhs(equation, y, k);
                y1.copy_from(&*y);
                y1.axpy(h, &*k, 1.0);

                // y2 = 3/4 y + 1/4 (y1 + h F(y1))
                eval_rhs(equation, y1, k);
                y1.axpy(h, &*k, 1.0);
                y2.copy_from(&*y);
                y2.axpy(0.25, &*y1, 0.75);

                // y = 1/3 y + 2/3 (y2 + h F(y2))
                eval_rhs(equation, y2, k);
                y2.axpy(h, &*k, 1.0);
                y.axpy(2.0 / 3.0, &*y2, 1.0 / 3.0);
            });
        Ok(())
    }
}

/// The classical fourth-order Runge-Kutta method.
#[derive(Debug, Clone)]
pub struct Rk4<T: Real> {
    core: Subcycling<T, 5>,
}

impl_explicit_constructors!(Rk4);

impl<T: Real> TimeDiscretisation<T> for Rk4<T> {
    fn name(&self) -> &'static str {
        "RK4"
    }

    fn is_explicit(&self) -> bool {
        true
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        self.core
            .run(equation, dt, x_in, x_out, |equation, h, y, [k1, k2, k3, k4, tmp]| {
                eval_rhs(equation, y, k1);

                tmp.copy_from(&*y);
                tmp.axpy(0.5 * h, &*k1, 1.0);
                eval_rhs(equation, tmp, k2);

                tmp.copy_from(&*y);
                tmp.axpy(0.5 * h, &*k2, 1.0);
                eval_rhs(equation, tmp, k3);

                tmp.copy_from(&*y);
                tmp.axpy(h, &*k3, 1.0);
                eval_rhs(equation, tmp, k4);

                let sixth = h / 6.0;
                y.axpy(sixth, &*k1, 1.0);
                y.axpy(2.0 * sixth, &*k2, 1.0);
                y.axpy(2.0 * sixth, &*k3, 1.0);
                y.axpy(sixth, &*k4, 1.0);
            });
        Ok(())
    }
}

/// `y_{n+1} - dt F(y_{n+1}) = y_n`.
#[derive(Debug, Clone)]
pub struct BackwardEuler<T: Real> {
    solver: ImplicitSolver<T>,
}

impl<T: Real> BackwardEuler<T> {
    pub fn new(parameters: SolverParameters) -> Self {
        Self {
            solver: ImplicitSolver::new(parameters),
        }
    }
}

impl<T: Real> Default for BackwardEuler<T> {
    fn default() -> Self {
        Self::new(SolverParameters::nonlinear_default())
    }
}

impl<T: Real> TimeDiscretisation<T> for BackwardEuler<T> {
    fn name(&self) -> &'static str {
        "backward Euler"
    }

    fn is_explicit(&self) -> bool {
        false
    }

    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        mut x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        x_out.copy_from(&x_in);
        let stage = SolveStage::Scheme(self.name());
        self.solver
            .solve(equation, TermSelection::All, dt, x_in, x_out, stage)?;
        Ok(())
    }
}

/// `y_{n+1} - theta dt F(y_{n+1}) = y_n + (1 - theta) dt F(y_n)`.
#[derive(Debug, Clone)]
pub struct ThetaMethod<T: Real> {
    theta: T,
    solver: ImplicitSolver<T>,
    f: DVector<T>,
    rhs: DVector<T>,
}

impl<T: Real> ThetaMethod<T> {
    /// Fails unless `0 <= theta <= 1`.
    pub fn new(theta: T, parameters: SolverParameters) -> Result<Self, SdcError> {
        if !(theta >= T::zero() && theta <= T::one()) {
            return Err(SdcError::invalid_configuration(format!(
                "theta must lie in [0, 1], got {}",
                theta
            )));
        }
        Ok(Self {
            theta,
            solver: ImplicitSolver::new(parameters),
            f: DVector::zeros(0),
            rhs: DVector::zeros(0),
        })
    }

    pub fn theta(&self) -> T {
        self.theta
    }

    fn step(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        mut x_out: DVectorViewMut<T>,
        stage: SolveStage,
    ) -> Result<(), SdcError> {
        let n = equation.dimension();
        if self.f.len() != n {
            self.f = DVector::zeros(n);
            self.rhs = DVector::zeros(n);
        }
        equation.eval_rhs_into(TermSelection::All, (&mut self.f).into(), x_in);
        self.rhs.copy_from(&x_in);
        self.rhs
            .axpy((T::one() - self.theta) * dt, &self.f, T::one());

        x_out.copy_from(&x_in);
        self.solver.solve(
            equation,
            TermSelection::All,
            self.theta * dt,
            DVectorView::from(&self.rhs),
            x_out,
            stage,
        )?;
        Ok(())
    }
}

impl<T: Real> TimeDiscretisation<T> for ThetaMethod<T> {
    fn name(&self) -> &'static str {
        "theta method"
    }

    fn is_explicit(&self) -> bool {
        self.theta == T::zero()
    }

    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        let stage = SolveStage::Scheme(self.name());
        self.step(equation, dt, x_in, x_out, stage)
    }
}

/// The theta method with `theta = 1/2`.
#[derive(Debug, Clone)]
pub struct ImplicitMidpoint<T: Real> {
    inner: ThetaMethod<T>,
}

impl<T: Real> ImplicitMidpoint<T> {
    pub fn new(parameters: SolverParameters) -> Self {
        Self {
            inner: ThetaMethod {
                theta: nalgebra::convert(0.5),
                solver: ImplicitSolver::new(parameters),
                f: DVector::zeros(0),
                rhs: DVector::zeros(0),
            },
        }
    }
}

impl<T: Real> Default for ImplicitMidpoint<T> {
    fn default() -> Self {
        Self::new(SolverParameters::nonlinear_default())
    }
}

impl<T: Real> TimeDiscretisation<T> for ImplicitMidpoint<T> {
    fn name(&self) -> &'static str {
        "implicit midpoint"
    }

    fn is_explicit(&self) -> bool {
        false
    }

    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        let stage = SolveStage::Scheme(self.name());
        self.inner.step(equation, dt, x_in, x_out, stage)
    }
}

/// `y_{n+1} - dt F_I(y_{n+1}) = y_n + dt F_E(y_n)`.
#[derive(Debug, Clone)]
pub struct ImexEuler<T: Real> {
    solver: ImplicitSolver<T>,
    f: DVector<T>,
    rhs: DVector<T>,
}

impl<T: Real> ImexEuler<T> {
    pub fn new(parameters: SolverParameters) -> Self {
        Self {
            solver: ImplicitSolver::new(parameters),
            f: DVector::zeros(0),
            rhs: DVector::zeros(0),
        }
    }
}

impl<T: Real> Default for ImexEuler<T> {
    fn default() -> Self {
        Self::new(SolverParameters::nonlinear_default())
    }
}

impl<T: Real> TimeDiscretisation<T> for ImexEuler<T> {
    fn name(&self) -> &'static str {
        "IMEX Euler"
    }

    fn is_explicit(&self) -> bool {
        false
    }

    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        mut x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        let n = equation.dimension();
        if self.f.len() != n {
            self.f = DVector::zeros(n);
            self.rhs = DVector::zeros(n);
        }
        equation.eval_rhs_into(TermSelection::Explicit, (&mut self.f).into(), x_in);
        self.rhs.copy_from(&x_in);
        self.rhs.axpy(dt, &self.f, T::one());

        x_out.copy_from(&x_in);
        let stage = SolveStage::Scheme(self.name());
        self.solver.solve(
            equation,
            TermSelection::Implicit,
            dt,
            DVectorView::from(&self.rhs),
            x_out,
            stage,
        )?;
        Ok(())
    }
}
