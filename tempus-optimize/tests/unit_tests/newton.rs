use nalgebra::{DVector, DVectorView, DVectorViewMut, Matrix3, Vector3};
use numeric_literals::replace_numeric_literals;
use tempus_optimize::calculus::{DifferentiableVectorFunction, JacobianSolveError, VectorFunction};
use tempus_optimize::newton::*;

struct MockLinearVectorFunction;

impl VectorFunction<f64> for MockLinearVectorFunction {
    fn dimension(&self) -> usize {
        3
    }

    #[replace_numeric_literals(f64::from(literal))]
    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
        let a = Matrix3::new(5, 1, 2, 1, 4, 2, 2, 2, 4);
        let b = Vector3::new(1, 2, 3);
        let r = a * x - b;
        f.copy_from(&r);
    }
}

impl DifferentiableVectorFunction<f64> for MockLinearVectorFunction {
    #[replace_numeric_literals(f64::from(literal))]
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        _x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), JacobianSolveError> {
        let a = Matrix3::new(5, 1, 2, 1, 4, 2, 2, 2, 4);
        let a_inv = a.try_inverse().ok_or("singular matrix")?;
        sol.copy_from(&(a_inv * rhs));
        Ok(())
    }
}

#[test]
fn newton_converges_in_single_iteration_for_linear_system() {
    let expected_solution = Vector3::new(-0.125, 0.16666667, 0.72916667);

    let settings = NewtonSettings {
        max_iterations: Some(2),
        tolerance: Vector3::new(1.0, 2.0, 3.0).norm() * 1e-6,
    };

    let mut f = DVector::zeros(3);
    let mut x = DVector::zeros(3);
    let mut dx = DVector::zeros(3);

    let iterations =
        newton(MockLinearVectorFunction, &mut x, &mut f, &mut dx, settings).expect("Newton iterations must succeed");
    let diff = x - expected_solution;
    assert!(diff.norm() < 1e-6);
    assert_eq!(iterations, 1);
}

#[test]
fn newton_performs_no_iterations_for_converged_initial_guess() {
    let settings = NewtonSettings {
        max_iterations: Some(0),
        tolerance: 1e-10,
    };
    let mut x = DVector::from_column_slice(&[-0.125, 1.0 / 6.0, 0.729166666666666666]);
    let mut f = DVector::zeros(3);
    let mut dx = DVector::zeros(3);
    let iterations = newton(MockLinearVectorFunction, &mut x, &mut f, &mut dx, settings).unwrap();
    assert_eq!(iterations, 0);
}

/// A scalar function `f(x) = g(x)` with the Jacobian solve `sol = rhs / dg(x)`.
struct ScalarFunction<G, D> {
    g: G,
    derivative: D,
}

impl<G, D> VectorFunction<f64> for ScalarFunction<G, D>
where
    G: FnMut(f64) -> f64,
    D: FnMut(f64) -> Result<f64, JacobianSolveError>,
{
    fn dimension(&self) -> usize {
        1
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
        f[0] = (self.g)(x[0]);
    }
}

impl<G, D> DifferentiableVectorFunction<f64> for ScalarFunction<G, D>
where
    G: FnMut(f64) -> f64,
    D: FnMut(f64) -> Result<f64, JacobianSolveError>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), JacobianSolveError> {
        sol[0] = rhs[0] / (self.derivative)(x[0])?;
        Ok(())
    }
}

fn scalar_cubic() -> impl DifferentiableVectorFunction<f64> {
    // f(x) = x^3 - 2, root at cbrt(2)
    ScalarFunction {
        g: |x: f64| x.powi(3) - 2.0,
        derivative: |x: f64| -> Result<f64, JacobianSolveError> { Ok(3.0 * x * x) },
    }
}

#[test]
fn newton_converges_for_scalar_cubic() {
    let settings = NewtonSettings {
        max_iterations: Some(20),
        tolerance: 1e-13,
    };
    let mut x = DVector::from_element(1, 1.0);
    let mut f = DVector::zeros(1);
    let mut dx = DVector::zeros(1);
    let iterations = newton(scalar_cubic(), &mut x, &mut f, &mut dx, settings).unwrap();
    assert!(iterations > 1);
    assert!((x[0] - 2.0f64.cbrt()).abs() < 1e-12);
}

#[test]
fn newton_reports_maximum_iterations() {
    let settings = NewtonSettings {
        max_iterations: Some(1),
        tolerance: 1e-13,
    };
    let mut x = DVector::from_element(1, 1.0);
    let mut f = DVector::zeros(1);
    let mut dx = DVector::zeros(1);
    let result = newton(scalar_cubic(), &mut x, &mut f, &mut dx, settings);
    assert!(matches!(result, Err(NewtonError::MaximumIterationsReached(1))));
}

#[test]
fn newton_reports_jacobian_failure() {
    let function = ScalarFunction {
        g: |x: f64| x - 1.0,
        derivative: |_: f64| -> Result<f64, JacobianSolveError> { Err(JacobianSolveError::from("singular")) },
    };
    let settings = NewtonSettings {
        max_iterations: None,
        tolerance: 1e-12,
    };
    let mut x = DVector::zeros(1);
    let mut f = DVector::zeros(1);
    let mut dx = DVector::zeros(1);
    let result = newton(function, &mut x, &mut f, &mut dx, settings);
    assert!(matches!(result, Err(NewtonError::JacobianError(_))));
}

#[test]
fn newton_rejects_non_finite_residual() {
    let function = ScalarFunction {
        g: |_: f64| f64::NAN,
        derivative: |_: f64| -> Result<f64, JacobianSolveError> { Ok(1.0) },
    };
    let settings = NewtonSettings {
        max_iterations: Some(10),
        tolerance: 1e-12,
    };
    let mut x = DVector::zeros(1);
    let mut f = DVector::zeros(1);
    let mut dx = DVector::zeros(1);
    let result = newton(function, &mut x, &mut f, &mut dx, settings);
    assert!(matches!(result, Err(NewtonError::NonFiniteResidual(0))));
}
