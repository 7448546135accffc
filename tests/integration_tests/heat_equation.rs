//! SDC time loops for the semi-discrete heat equation on the unit interval.
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::Deserialize;
use std::f64::consts::PI;
use tempus::config::SdcConfig;
use tempus::equation::{LabelledEquation, LinearTerm, TermLabel, Treatment};
use tempus::fields::FieldStore;
use tempus::io::{FieldExtremum, FieldNorm, Io, MemorySink, OutputConfig};
use tempus::sdc::Sdc;
use tempus::time_discretisation::{BackwardEuler, ForwardEuler, ImexEuler};
use tempus::timeloop::{FieldScheme, SchemeSequence, Timeloop};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RunConfig {
    dt: f64,
    tmax: f64,
    sdc: SdcConfig,
    output: OutputConfig,
}

const CONFIG: &str = r#"{
    "dt": 0.01,
    "tmax": 0.1,
    "sdc": {
        "quadrature": "gauss-radau",
        "M": 3,
        "maxk": 3,
        "variant": "backward-euler",
        "nonlinear-solver": { "tolerance": 1e-12, "max-iterations": 20 }
    },
    "output": {
        "dump-frequency": 5,
        "checkpoint-frequency": 10,
        "point-data": [ { "field": "u", "indices": [0, 18] } ]
    }
}"#;

fn laplacian_1d(n: usize, h: f64) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(n, n);
    let scale = 1.0 / (h * h);
    for i in 0..n {
        coo.push(i, i, -2.0 * scale);
        if i > 0 {
            coo.push(i, i - 1, scale);
        }
        if i + 1 < n {
            coo.push(i, i + 1, scale);
        }
    }
    CsrMatrix::from(&coo)
}

/// The slowest mode of the discrete Laplacian and its eigenvalue.
fn fundamental_mode(n: usize) -> (DVector<f64>, f64) {
    let h = 1.0 / (n as f64 + 1.0);
    let mode = DVector::from_fn(n, |i, _| ((i + 1) as f64 * PI * h).sin());
    let eigenvalue = -4.0 / (h * h) * (PI * h / 2.0).sin().powi(2);
    (mode, eigenvalue)
}

#[test]
fn implicit_sdc_decays_the_fundamental_mode() {
    let config: RunConfig = serde_json::from_str(CONFIG).unwrap();
    let n = 19;
    let h = 1.0 / (n as f64 + 1.0);
    let equation = LabelledEquation::new(n).with_term(
        TermLabel::Diffusion,
        Treatment::Implicit,
        LinearTerm::new(laplacian_1d(n, h)),
    );
    let (mode, eigenvalue) = fundamental_mode(n);

    let sdc = Sdc::new(BackwardEuler::<f64>::default(), config.sdc, config.dt).unwrap();
    let stepper = SchemeSequence::new(vec![FieldScheme::new("u", equation, sdc)]);
    let fields = FieldStore::new().with_field("u", mode.clone());
    let io = Io::new(config.output, MemorySink::default())
        .with_diagnostic(FieldNorm::new("u"))
        .with_diagnostic(FieldExtremum::max("u"));
    let mut timeloop = Timeloop::new(stepper, fields, io, config.dt).unwrap();
    let t = timeloop.run(0.0, config.tmax).unwrap();

    let exact = &mode * (eigenvalue * t).exp();
    let u = timeloop.fields().get("u").unwrap();
    let relative_error = (u - &exact).norm() / exact.norm();
    assert!(relative_error < 1e-5, "relative error {}", relative_error);

    let sink = timeloop.into_io().into_sink();
    // 10 steps plus the initial state
    assert_eq!(sink.diagnostics.len(), 11);
    assert_eq!(sink.dumps.len(), 3);
    assert_eq!(sink.checkpoints.len(), 2);
    assert_eq!(sink.point_data.len(), 3);

    let norms: Vec<f64> = sink
        .diagnostics
        .iter()
        .map(|(_, values)| values[0].1)
        .collect();
    assert!(norms.windows(2).all(|pair| pair[1] < pair[0]));
    // The mode is symmetric about the midpoint
    for record in &sink.point_data {
        assert!((record.values[0] - record.values[1]).abs() < 1e-10);
    }
}

#[test]
fn explicit_and_imex_sweeps_track_the_fundamental_mode() {
    let n = 9;
    let h = 1.0 / (n as f64 + 1.0);
    let dt = 0.001;
    let tmax = 0.02;
    let (mode, eigenvalue) = fundamental_mode(n);

    // Half of the diffusion is treated explicitly by the IMEX sweeps
    let half = laplacian_1d(n, h) * 0.5;
    let equation = LabelledEquation::new(n)
        .with_term(TermLabel::Diffusion, Treatment::Implicit, LinearTerm::new(half.clone()))
        .with_term(TermLabel::Forcing, Treatment::Explicit, LinearTerm::new(half));

    let run = |sdc: Box<dyn tempus::time_discretisation::TimeDiscretisation<f64>>| {
        let stepper = SchemeSequence::new(vec![FieldScheme::new("u", equation.clone(), sdc)]);
        let fields = FieldStore::new().with_field("u", mode.clone());
        let io = Io::new(OutputConfig::default(), MemorySink::default());
        let mut timeloop = Timeloop::new(stepper, fields, io, dt).unwrap();
        let t = timeloop.run(0.0, tmax).unwrap();
        let exact = &mode * (eigenvalue * t).exp();
        let u = timeloop.fields().get("u").unwrap();
        (u - &exact).norm() / exact.norm()
    };

    let config: SdcConfig = serde_json::from_str(r#"{ "variant": "forward-euler", "maxk": 3 }"#).unwrap();
    let explicit = run(Box::new(Sdc::new(ForwardEuler::<f64>::new(), config, dt).unwrap()));
    assert!(explicit < 1e-7, "explicit sweeps: relative error {}", explicit);

    let config: SdcConfig = serde_json::from_str(r#"{ "variant": "imex", "maxk": 3 }"#).unwrap();
    let imex = run(Box::new(Sdc::new(ImexEuler::<f64>::default(), config, dt).unwrap()));
    assert!(imex < 1e-7, "IMEX sweeps: relative error {}", imex);
}
