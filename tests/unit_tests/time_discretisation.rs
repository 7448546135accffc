use crate::{laplacian_1d, scalar_linear_equation};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use tempus::config::SolverParameters;
use tempus::equation::{LabelledEquation, LinearTerm, TermLabel, Treatment};
use tempus::time_discretisation::{
    BackwardEuler, ForwardEuler, Heun, ImexEuler, ImplicitMidpoint, Rk4, Ssprk3, ThetaMethod, TimeDiscretisation,
};
use tempus::SdcError;

/// Applies `scheme` once to `dy/dt = lambda_i y + lambda_e y` with `y(0) = 1`.
fn amplification(scheme: &mut dyn TimeDiscretisation<f64>, lambda_i: f64, lambda_e: f64, dt: f64) -> f64 {
    let equation = scalar_linear_equation(lambda_i, lambda_e);
    let y0 = DVector::from_element(1, 1.0);
    let mut y1 = DVector::<f64>::zeros(1);
    scheme
        .apply(&equation, dt, (&y0).into(), (&mut y1).into())
        .unwrap();
    y1[0]
}

#[test]
fn explicit_schemes_reproduce_truncated_exponential() {
    let (lambda, dt) = (-1.3, 0.2);
    let z: f64 = lambda * dt;

    let fe = amplification(&mut ForwardEuler::<f64>::new(), lambda, 0.0, dt);
    assert_scalar_eq!(fe, 1.0 + z, comp = abs, tol = 1e-15);

    let heun = amplification(&mut Heun::<f64>::new(), lambda, 0.0, dt);
    assert_scalar_eq!(heun, 1.0 + z + z * z / 2.0, comp = abs, tol = 1e-15);

    let ssprk3 = amplification(&mut Ssprk3::<f64>::new(), lambda, 0.0, dt);
    assert_scalar_eq!(ssprk3, 1.0 + z + z.powi(2) / 2.0 + z.powi(3) / 6.0, comp = abs, tol = 1e-15);

    let rk4 = amplification(&mut Rk4::<f64>::new(), lambda, 0.0, dt);
    let expected = 1.0 + z + z.powi(2) / 2.0 + z.powi(3) / 6.0 + z.powi(4) / 24.0;
    assert_scalar_eq!(rk4, expected, comp = abs, tol = 1e-15);
}

#[test]
fn implicit_schemes_match_their_stability_functions() {
    let (lambda, dt) = (-3.0, 0.1);
    let z: f64 = lambda * dt;

    let be = amplification(&mut BackwardEuler::<f64>::default(), lambda, 0.0, dt);
    assert_scalar_eq!(be, 1.0 / (1.0 - z), comp = abs, tol = 1e-14);

    let mut theta = ThetaMethod::<f64>::new(0.7, SolverParameters::nonlinear_default()).unwrap();
    let expected = (1.0 + 0.3 * z) / (1.0 - 0.7 * z);
    assert_scalar_eq!(amplification(&mut theta, lambda, 0.0, dt), expected, comp = abs, tol = 1e-14);

    let midpoint = amplification(&mut ImplicitMidpoint::<f64>::default(), lambda, 0.0, dt);
    assert_scalar_eq!(midpoint, (1.0 + z / 2.0) / (1.0 - z / 2.0), comp = abs, tol = 1e-14);
}

#[test]
fn imex_euler_splits_by_treatment() {
    let (lambda_i, lambda_e, dt) = (-4.0, 0.5, 0.1);
    let imex = amplification(&mut ImexEuler::<f64>::default(), lambda_i, lambda_e, dt);
    assert_scalar_eq!(imex, (1.0 + lambda_e * dt) / (1.0 - lambda_i * dt), comp = abs, tol = 1e-14);
}

#[test]
fn subcycling_splits_the_step() {
    let (lambda, dt) = (-2.0, 0.3);
    let mut scheme = ForwardEuler::<f64>::with_subcycles(3).unwrap();
    assert_eq!(scheme.subcycles(), 3);
    let y = amplification(&mut scheme, lambda, 0.0, dt);
    assert_scalar_eq!(y, (1.0 + lambda * dt / 3.0).powi(3), comp = abs, tol = 1e-15);

    let mut scheme = Rk4::<f64>::with_subcycles(2).unwrap();
    let y = amplification(&mut scheme, lambda, 0.0, dt);
    let mut single = Rk4::<f64>::new();
    let half = amplification(&mut single, lambda, 0.0, dt / 2.0);
    assert_scalar_eq!(y, half * half, comp = abs, tol = 1e-15);
}

#[test]
fn invalid_parameters_are_rejected() {
    assert!(matches!(
        ForwardEuler::<f64>::with_subcycles(0),
        Err(SdcError::InvalidConfiguration(_))
    ));
    assert!(matches!(Ssprk3::<f64>::with_subcycles(0), Err(SdcError::InvalidConfiguration(_))));
    for theta in [-0.1, 1.5, f64::NAN] {
        assert!(matches!(
            ThetaMethod::new(theta, SolverParameters::default()),
            Err(SdcError::InvalidConfiguration(_))
        ));
    }
}

#[test]
fn schemes_report_whether_they_are_explicit() {
    assert!(TimeDiscretisation::<f64>::is_explicit(&ForwardEuler::<f64>::new()));
    assert!(TimeDiscretisation::<f64>::is_explicit(&Rk4::<f64>::new()));
    assert!(!TimeDiscretisation::<f64>::is_explicit(&BackwardEuler::<f64>::default()));
    assert!(!TimeDiscretisation::<f64>::is_explicit(&ImexEuler::<f64>::default()));

    let explicit_theta = ThetaMethod::<f64>::new(0.0, SolverParameters::default()).unwrap();
    assert!(explicit_theta.is_explicit());
    let implicit_theta = ThetaMethod::<f64>::new(0.5, SolverParameters::default()).unwrap();
    assert!(!implicit_theta.is_explicit());

    let boxed: Box<dyn TimeDiscretisation<f64>> = Box::new(Heun::<f64>::new());
    assert!(boxed.is_explicit());
    assert_eq!(boxed.name(), "Heun");
}

#[test]
fn implicit_solve_failure_is_attributed_to_the_scheme() {
    let parameters = SolverParameters {
        tolerance: 1e-10,
        max_iterations: Some(0),
    };
    let equation = scalar_linear_equation(-1.0, 0.0);
    let y0 = DVector::from_element(1, 1.0);
    let mut y1 = DVector::<f64>::zeros(1);
    let err = BackwardEuler::<f64>::new(parameters)
        .apply(&equation, 0.1, (&y0).into(), (&mut y1).into())
        .unwrap_err();
    assert!(err.to_string().contains("backward Euler"), "{}", err);
}

#[test]
fn backward_euler_on_the_heat_equation() {
    let n = 8;
    let h = 1.0 / (n as f64 + 1.0);
    let laplacian = laplacian_1d(n, h);
    let equation =
        LabelledEquation::new(n).with_term(TermLabel::Diffusion, Treatment::Implicit, LinearTerm::new(laplacian.clone()));
    let y0 = DVector::from_fn(n, |i, _| ((i + 1) as f64 * h * std::f64::consts::PI).sin());
    let mut y1 = DVector::<f64>::zeros(n);
    let dt = 0.01;
    BackwardEuler::<f64>::default()
        .apply(&equation, dt, (&y0).into(), (&mut y1).into())
        .unwrap();

    let system = DMatrix::identity(n, n) - DMatrix::from(&laplacian) * dt;
    let expected = system.lu().solve(&y0).unwrap();
    assert_matrix_eq!(y1, expected, comp = abs, tol = 1e-12);
}
