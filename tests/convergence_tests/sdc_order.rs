//! Local error orders of SDC steps for `dy/dt = -y`, split into an implicit and an explicit part.
//!
//! Each correction sweep raises the order of the method by one until the order of the
//! underlying collocation method is reached, so the local error of a step should behave like
//! `dt^(min(K + 1, M) + 1)` for `K` sweeps with `M` nodes.
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::path::PathBuf;
use tempus::config::{SdcConfig, SdcVariant, SolverParameters};
use tempus::equation::{LabelledEquation, LinearTerm, TermLabel, Treatment};
use tempus::quadrature::QuadratureKind;
use tempus::sdc::Sdc;
use tempus::time_discretisation::{BackwardEuler, ForwardEuler, ImexEuler, TimeDiscretisation};

const LAMBDA_IMPLICIT: f64 = -0.6;
const LAMBDA_EXPLICIT: f64 = -0.4;
const TIME_STEPS: [f64; 3] = [0.4, 0.2, 0.1];

fn tight_solver() -> SolverParameters {
    SolverParameters {
        tolerance: 1e-13,
        max_iterations: Some(50),
    }
}

fn scalar_matrix(value: f64) -> CsrMatrix<f64> {
    CsrMatrix::try_from_csr_data(1, 1, vec![0, 1], vec![0], vec![value]).unwrap()
}

fn equation() -> LabelledEquation<f64> {
    LabelledEquation::new(1)
        .with_term(
            TermLabel::Forcing,
            Treatment::Implicit,
            LinearTerm::new(scalar_matrix(LAMBDA_IMPLICIT)),
        )
        .with_term(
            TermLabel::Transport,
            Treatment::Explicit,
            LinearTerm::new(scalar_matrix(LAMBDA_EXPLICIT)),
        )
}

fn base_scheme(variant: SdcVariant) -> Box<dyn TimeDiscretisation<f64>> {
    match variant {
        SdcVariant::ForwardEuler => Box::new(ForwardEuler::<f64>::new()),
        SdcVariant::BackwardEuler => Box::new(BackwardEuler::<f64>::new(tight_solver())),
        SdcVariant::Imex => Box::new(ImexEuler::<f64>::new(tight_solver())),
    }
}

fn rules() -> Vec<(QuadratureKind, usize)> {
    vec![
        (QuadratureKind::GaussRadau, 3),
        (QuadratureKind::GaussRadauRight, 3),
        (QuadratureKind::GaussLobatto, 4),
        (QuadratureKind::GaussLegendre, 3),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSample {
    pub dt: f64,
    pub error: f64,
}

/// For serializing to JSON for subsequent analysis/plots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub name: String,
    pub quadrature: QuadratureKind,
    pub num_nodes: usize,
    pub max_sweeps: usize,
    pub variant: SdcVariant,
    pub samples: Vec<ErrorSample>,
    /// Local orders estimated from consecutive samples.
    pub orders: Vec<f64>,
}

fn export_summary(summary: &OrderSummary) {
    let base_path = PathBuf::from("data/convergence_tests/sdc_order/");
    let path = base_path.join(format!("{}_summary.json", summary.name));
    create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = File::create(path).unwrap();
    serde_json::to_writer_pretty(&mut file, summary).unwrap();
}

fn local_error(config: &SdcConfig, dt: f64) -> f64 {
    let equation = equation();
    let mut sdc = Sdc::new(base_scheme(config.variant), config.clone(), dt).unwrap();
    let y0 = DVector::from_element(1, 1.0);
    let mut y1 = DVector::zeros(1);
    sdc.apply(&equation, dt, (&y0).into(), (&mut y1).into())
        .unwrap();
    let exact = (-dt).exp();
    (y1[0] - exact).abs()
}

fn measure_order(quadrature: QuadratureKind, num_nodes: usize, max_sweeps: usize, variant: SdcVariant) -> OrderSummary {
    let config = SdcConfig {
        quadrature,
        num_nodes,
        max_sweeps,
        variant,
        nonlinear_solver: tight_solver(),
        linear_solver: tight_solver(),
        parallel_rhs: false,
        ..SdcConfig::default()
    };
    let samples: Vec<ErrorSample> = TIME_STEPS
        .iter()
        .map(|&dt| ErrorSample {
            dt,
            error: local_error(&config, dt),
        })
        .collect();
    let orders = samples
        .windows(2)
        .map(|pair| (pair[0].error / pair[1].error).ln() / (pair[0].dt / pair[1].dt).ln())
        .collect();

    let name = format!("{:?}_m{}_k{}_{:?}", quadrature, num_nodes, max_sweeps, variant).to_ascii_lowercase();
    OrderSummary {
        name,
        quadrature,
        num_nodes,
        max_sweeps,
        variant,
        samples,
        orders,
    }
}

fn assert_sweeps_raise_order(variant: SdcVariant) {
    for (quadrature, num_nodes) in rules() {
        for max_sweeps in 1..=3 {
            let summary = measure_order(quadrature, num_nodes, max_sweeps, variant);
            export_summary(&summary);

            let expected = (max_sweeps + 1).min(num_nodes) + 1;
            let observed = *summary.orders.last().unwrap();
            assert!(
                observed >= expected as f64 - 0.5,
                "{}: expected local order {}, observed {} (errors {:?})",
                summary.name,
                expected,
                observed,
                summary.samples
            );
        }
    }
}

#[test]
fn forward_euler_sweeps_raise_order() {
    assert_sweeps_raise_order(SdcVariant::ForwardEuler);
}

#[test]
fn backward_euler_sweeps_raise_order() {
    assert_sweeps_raise_order(SdcVariant::BackwardEuler);
}

#[test]
fn imex_sweeps_raise_order() {
    assert_sweeps_raise_order(SdcVariant::Imex);
}
