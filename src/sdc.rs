//! Spectral deferred correction.
//!
//! A step of size `dt` is divided by `M` quadrature nodes. A base time discretisation marches a
//! low-order prediction across the nodes, after which each sweep solves a correction equation at
//! every node that raises the formal order by one, up to the order of the node quadrature.
//! Finally, the node values may be integrated over the whole step with the quadrature weights.
//!
//! ```
//! # use tempus::config::SdcConfig;
//! # use tempus::equation::{FunctionTerm, LabelledEquation, TermLabel, Treatment};
//! # use tempus::sdc::Sdc;
//! # use tempus::time_discretisation::{BackwardEuler, TimeDiscretisation};
//! # use nalgebra::{DVector, DVectorView, DVectorViewMut};
//! // dy/dt = -y
//! let equation = LabelledEquation::new(1).with_term(TermLabel::Forcing, Treatment::Implicit,
//!     FunctionTerm::new(|mut f: DVectorViewMut<f64>, y: DVectorView<f64>| f[0] -= y[0]));
//! let mut sdc = Sdc::new(BackwardEuler::default(), SdcConfig::default(), 0.1).unwrap();
//!
//! let y0 = DVector::from_element(1, 1.0);
//! let mut y1 = DVector::zeros(1);
//! sdc.apply(&equation, 0.1, (&y0).into(), (&mut y1).into()).unwrap();
//! assert!((y1[0] - f64::exp(-0.1)).abs() < 1e-6);
//! ```
use crate::config::{SdcConfig, SdcVariant};
use crate::equation::Equation;
use crate::error::{SdcError, SolveStage};
use crate::integration::IntegrationMatrices;
use crate::quadrature::QuadratureRule;
use crate::residual::{CorrectionInputs, ResidualAdapter, SolverHandles};
use crate::time_discretisation::TimeDiscretisation;
use crate::Real;
use log::{debug, trace, Level};
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};

/// Progress of the current (or last) step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SdcPhase {
    /// No step has been taken yet.
    Uninitialized,
    /// The base scheme has filled in all node values.
    Predicted,
    /// Correction sweep `k` (counted from 1) is in progress.
    Sweeping(usize),
    SweepsComplete,
    FinalUpdatePending,
    Done,
}

/// Node values of the last and the current sweep, with scratch space for the right-hand side.
#[derive(Debug, Clone)]
struct SweepState<T: Real> {
    /// `M + 1` values; index 0 is the start of the step.
    current: Vec<DVector<T>>,
    next: Vec<DVector<T>>,
    /// `F(current[m + 1])` for every node.
    f: Vec<DVector<T>>,
    /// Node-to-node quadrature increments.
    quad: Vec<DVector<T>>,
    quad_final: DVector<T>,
}

impl<T: Real> SweepState<T> {
    fn new(num_nodes: usize, dimension: usize) -> Self {
        let vectors = |count| vec![DVector::zeros(dimension); count];
        Self {
            current: vectors(num_nodes + 1),
            next: vectors(num_nodes + 1),
            f: vectors(num_nodes),
            quad: vectors(num_nodes),
            quad_final: DVector::zeros(dimension),
        }
    }

    fn dimension(&self) -> usize {
        self.quad_final.len()
    }
}

/// `out = sum_k weights[k] f[k]`.
fn weighted_sum<'a, T: Real>(out: &mut DVector<T>, weights: impl IntoIterator<Item = &'a T>, f: &[DVector<T>]) {
    out.fill(T::zero());
    for (&w, f_k) in weights.into_iter().zip(f) {
        out.axpy(w, f_k, T::one());
    }
}

/// Attributes a failure of the base scheme to the predictor.
fn in_predictor(err: SdcError, node: usize) -> SdcError {
    match err {
        SdcError::SolverFailure { source, .. } => SdcError::SolverFailure {
            stage: SolveStage::Predictor { node },
            source,
        },
        other => other,
    }
}

/// A spectral deferred correction scheme built on top of a base discretisation.
///
/// The quadrature rule, the integration matrices and the solvers are set up once for a fixed
/// time step. Node values are allocated on the first step and reused afterwards.
pub struct Sdc<T: Real, B> {
    base: B,
    config: SdcConfig,
    rule: QuadratureRule<T>,
    matrices: IntegrationMatrices<T>,
    dtau: Vec<T>,
    handles: SolverHandles<T>,
    state: Option<SweepState<T>>,
    phase: SdcPhase,
    sweep_corrections: Vec<T>,
}

impl<T, B> Sdc<T, B>
where
    T: Real,
    B: TimeDiscretisation<T>,
{
    pub fn new(base: B, config: SdcConfig, dt: T) -> Result<Self, SdcError> {
        config.validate()?;
        let rule = QuadratureRule::new(config.quadrature, config.num_nodes, dt)?;
        let matrices = IntegrationMatrices::new(&rule)?;
        let dtau = rule.subinterval_widths();
        let handles = SolverHandles::new(&config);
        Ok(Self {
            base,
            config,
            rule,
            matrices,
            dtau,
            handles,
            state: None,
            phase: SdcPhase::Uninitialized,
            sweep_corrections: Vec::new(),
        })
    }

    pub fn phase(&self) -> SdcPhase {
        self.phase
    }

    pub fn rule(&self) -> &QuadratureRule<T> {
        &self.rule
    }

    pub fn matrices(&self) -> &IntegrationMatrices<T> {
        &self.matrices
    }

    pub fn config(&self) -> &SdcConfig {
        &self.config
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    /// The correction norm `max_m ||next[m] - current[m]||` of every sweep of the last step.
    pub fn sweep_corrections(&self) -> &[T] {
        &self.sweep_corrections
    }

    /// Values at the start of the step and at each node, from the most recent sweep.
    ///
    /// Empty before the first step.
    pub fn node_values(&self) -> &[DVector<T>] {
        self.state
            .as_ref()
            .map(|state| state.current.as_slice())
            .unwrap_or(&[])
    }

    fn check_time_step(&self, dt: T) -> Result<(), SdcError> {
        // NaN compares false against the tolerance below
        if !(dt.is_finite() && dt > T::zero()) {
            return Err(SdcError::invalid_configuration(format!(
                "Time step must be positive and finite, got dt = {}",
                dt
            )));
        }
        let expected = self.rule.dt();
        let tol = nalgebra::convert::<f64, T>(1e-12) * expected;
        if (dt - expected).abs() > tol {
            return Err(SdcError::invalid_configuration(format!(
                "SDC was set up for dt = {}, but asked to step with dt = {}",
                expected, dt
            )));
        }
        Ok(())
    }
}

impl<T, B> TimeDiscretisation<T> for Sdc<T, B>
where
    T: Real,
    B: TimeDiscretisation<T>,
{
    fn name(&self) -> &'static str {
        "SDC"
    }

    fn is_explicit(&self) -> bool {
        self.config.variant == SdcVariant::ForwardEuler && self.base.is_explicit()
    }

    fn apply(
        &mut self,
        equation: &dyn Equation<T>,
        dt: T,
        x_in: DVectorView<T>,
        mut x_out: DVectorViewMut<T>,
    ) -> Result<(), SdcError> {
        self.check_time_step(dt)?;
        let n = equation.dimension();
        let num_nodes = self.rule.num_nodes();
        let max_sweeps = self.config.max_sweeps;
        let verbosity = self.config.verbosity;

        if self.state.as_ref().map_or(true, |state| state.dimension() != n) {
            self.state = None;
        }
        let state = self
            .state
            .get_or_insert_with(|| SweepState::new(num_nodes, n));

        state.current[0].copy_from(&x_in);
        for m in 0..num_nodes {
            let (before, after) = state.current.split_at_mut(m + 1);
            self.base
                .apply(equation, self.dtau[m], (&before[m]).into(), (&mut after[0]).into())
                .map_err(|err| in_predictor(err, m + 1))?;
        }
        self.phase = SdcPhase::Predicted;
        self.sweep_corrections.clear();

        let s: &DMatrix<T> = self.matrices.s();
        let mut adapter = ResidualAdapter::new(equation, &mut self.handles);
        for k in 1..=max_sweeps {
            self.phase = SdcPhase::Sweeping(k);

            adapter.evaluate_rhs_at_nodes(&state.current[1..], &mut state.f, self.config.parallel_rhs);
            for (j, quad_j) in state.quad.iter_mut().enumerate() {
                weighted_sum(quad_j, s.row(j).iter(), &state.f);
            }

            let (next_start, _) = state.next.split_at_mut(1);
            next_start[0].copy_from(&state.current[0]);
            for m in 1..=num_nodes {
                let (done, remaining) = state.next.split_at_mut(m);
                let inputs = CorrectionInputs {
                    previous_new: (&done[m - 1]).into(),
                    previous_old: (&state.current[m - 1]).into(),
                    current_old: (&state.current[m]).into(),
                    quad: (&state.quad[m - 1]).into(),
                    dtau: self.dtau[m - 1],
                };
                let stage = SolveStage::Correction { sweep: k, node: m };
                let iterations =
                    adapter.solve_correction_step(self.config.variant, stage, inputs, (&mut remaining[0]).into())?;
                if Level::Trace <= verbosity {
                    trace!("SDC sweep {}, node {}: {} solver iterations", k, m, iterations);
                }
            }

            let correction = state
                .next
                .iter()
                .zip(&state.current)
                .skip(1)
                .map(|(new, old)| new.metric_distance(old))
                .fold(T::zero(), |max, d| max.max(d));
            self.sweep_corrections.push(correction);
            if Level::Debug <= verbosity {
                debug!("SDC sweep {}/{}: correction norm {}", k, max_sweeps, correction);
            }

            std::mem::swap(&mut state.current, &mut state.next);
        }
        self.phase = SdcPhase::SweepsComplete;

        if max_sweeps > 0 && self.config.final_update {
            self.phase = SdcPhase::FinalUpdatePending;
            adapter.evaluate_rhs_at_nodes(&state.current[1..], &mut state.f, self.config.parallel_rhs);
            weighted_sum(&mut state.quad_final, self.matrices.q_fin().iter(), &state.f);
            adapter.solve_final_update(x_in, (&state.quad_final).into(), x_out)?;
        } else {
            x_out.copy_from(&state.current[num_nodes]);
        }

        self.phase = SdcPhase::Done;
        Ok(())
    }
}
