//! Time loops that advance a set of named fields.
//!
//! A [`Timeloop`] owns the model fields, a [`Timestep`] implementation that advances the time
//! levels by one step, optional physics and diffusion schemes applied after every step, and the
//! output control. The available steppers are
//!
//! - [`SchemeSequence`]: one scheme per field, applied in order,
//! - [`SplitTimestep`]: the terms of one equation are split by label and advanced one after
//!   another with separate schemes,
//! - [`SemiImplicit`]: an iterated Crank-Nicolson scheme with a linear implicit solve and
//!   separate transport,
//! - [`PrescribedTransport`]: wraps another stepper and sets a transporting velocity from a
//!   function of time before every step.
use crate::config::SolverParameters;
use crate::equation::{Equation, LabelledEquation, TermLabel, TermSelection};
use crate::error::SdcError;
use crate::fields::{FieldStore, SharedField, TimeLevelFields};
use crate::io::{Io, OutputSink};
use crate::linear_solvers::{LinearSolverKind, LinearTimesteppingSolver};
use crate::time_discretisation::TimeDiscretisation;
use crate::Real;
use eyre::WrapErr;
use log::{debug, info};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

fn missing_field(name: &str) -> SdcError {
    SdcError::invalid_configuration(format!("no field named {}", name))
}

fn field<'a, T: Real>(store: &'a FieldStore<T>, name: &str) -> Result<&'a DVector<T>, SdcError> {
    store.get(name).ok_or_else(|| missing_field(name))
}

fn field_mut<'a, T: Real>(store: &'a mut FieldStore<T>, name: &str) -> Result<&'a mut DVector<T>, SdcError> {
    store.get_mut(name).ok_or_else(|| missing_field(name))
}

/// Advances `x` by `dt`, overwriting it with the result.
fn apply_in_place<T: Real>(
    scheme: &mut dyn TimeDiscretisation<T>,
    equation: &dyn Equation<T>,
    dt: T,
    x: &mut DVector<T>,
) -> Result<(), SdcError> {
    let x_in = x.clone();
    scheme.apply(equation, dt, (&x_in).into(), x.into())
}

/// A scheme advancing a single field under its own equation.
pub struct FieldScheme<T: Real> {
    field: String,
    equation: Box<dyn Equation<T>>,
    scheme: Box<dyn TimeDiscretisation<T>>,
}

impl<T: Real> FieldScheme<T> {
    pub fn new(
        field: impl Into<String>,
        equation: impl Equation<T> + 'static,
        scheme: impl TimeDiscretisation<T> + 'static,
    ) -> Self {
        Self {
            field: field.into(),
            equation: Box::new(equation),
            scheme: Box::new(scheme),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Advances the field from `from` and stores the result in `to`.
    pub fn apply(&mut self, dt: T, from: &FieldStore<T>, to: &mut FieldStore<T>) -> Result<(), SdcError> {
        let x_in = field(from, &self.field)?;
        let x_out = field_mut(to, &self.field)?;
        self.scheme
            .apply(self.equation.as_ref(), dt, x_in.into(), x_out.into())
    }

    pub fn apply_in_place(&mut self, dt: T, fields: &mut FieldStore<T>) -> Result<(), SdcError> {
        let x = field_mut(fields, &self.field)?;
        apply_in_place(self.scheme.as_mut(), self.equation.as_ref(), dt, x)
    }
}

/// A physics parametrisation paired with the scheme that advances it.
///
/// Physics schemes are always applied in place on the newest time level.
pub struct PhysicsScheme<T: Real> {
    name: String,
    explicit_only: bool,
    inner: FieldScheme<T>,
}

impl<T: Real> PhysicsScheme<T> {
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        equation: impl Equation<T> + 'static,
        scheme: impl TimeDiscretisation<T> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            explicit_only: false,
            inner: FieldScheme::new(field, equation, scheme),
        }
    }

    /// A parametrisation that may only be advanced with an explicit scheme.
    ///
    /// Fails if `scheme` is not explicit.
    pub fn explicit_only(
        name: impl Into<String>,
        field: impl Into<String>,
        equation: impl Equation<T> + 'static,
        scheme: impl TimeDiscretisation<T> + 'static,
    ) -> Result<Self, SdcError> {
        let name = name.into();
        if !scheme.is_explicit() {
            return Err(SdcError::invalid_configuration(format!(
                "only explicit time discretisations can be used with physics scheme {}, got {}",
                name,
                scheme.name()
            )));
        }
        Ok(Self {
            name,
            explicit_only: true,
            inner: FieldScheme::new(field, equation, scheme),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_explicit_only(&self) -> bool {
        self.explicit_only
    }

    pub fn field(&self) -> &str {
        self.inner.field()
    }

    pub fn apply(&mut self, dt: T, fields: &mut FieldStore<T>) -> Result<(), SdcError> {
        debug!("Applying physics {}", self.name);
        self.inner.apply_in_place(dt, fields)
    }
}

/// One physical time step acting on the time levels of the model fields.
pub trait Timestep<T: Real> {
    /// Time levels needed in addition to `nm1`, `n` and `np1`.
    fn extra_time_levels(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Advances level `n` to level `np1`, where `t` is the time of level `np1`.
    ///
    /// On entry, `np1` holds the same values as `n`.
    fn timestep(&mut self, fields: &mut TimeLevelFields<T>, t: T, dt: T) -> Result<(), SdcError>;
}

/// Applies one scheme per field in order. After each scheme, level `n` of its field is
/// overwritten by the new value, so later schemes see the updated field.
pub struct SchemeSequence<T: Real> {
    schemes: Vec<FieldScheme<T>>,
}

impl<T: Real> SchemeSequence<T> {
    pub fn new(schemes: Vec<FieldScheme<T>>) -> Self {
        Self { schemes }
    }

    pub fn with_scheme(mut self, scheme: FieldScheme<T>) -> Self {
        self.schemes.push(scheme);
        self
    }
}

impl<T: Real> Timestep<T> for SchemeSequence<T> {
    fn timestep(&mut self, fields: &mut TimeLevelFields<T>, _t: T, dt: T) -> Result<(), SdcError> {
        for scheme in &mut self.schemes {
            scheme.apply(dt, &fields.n, &mut fields.np1)?;
            let name = scheme.field();
            let new_value = field(&fields.np1, name)?;
            field_mut(&mut fields.n, name)?.copy_from(new_value);
        }
        Ok(())
    }
}

/// Advances one field by applying separate schemes to the terms of its equation, in the order
/// given by the term splitting.
///
/// Each scheme acts in place on level `np1`. Non-physics labels are advanced with the
/// equation restricted to the terms of that label. The [`TermLabel::Physics`] entry applies
/// all physics schemes in turn.
pub struct SplitTimestep<T: Real> {
    field: String,
    term_splitting: Vec<TermLabel>,
    dynamics: Vec<(TermLabel, LabelledEquation<T>, Box<dyn TimeDiscretisation<T>>)>,
    physics: Vec<PhysicsScheme<T>>,
}

impl<T: Real> SplitTimestep<T> {
    pub fn new(
        field: impl Into<String>,
        equation: &LabelledEquation<T>,
        term_splitting: Vec<TermLabel>,
        dynamics_schemes: Vec<(TermLabel, Box<dyn TimeDiscretisation<T>>)>,
        physics_schemes: Vec<PhysicsScheme<T>>,
    ) -> Result<Self, SdcError> {
        let splits_physics = term_splitting.contains(&TermLabel::Physics);
        if splits_physics && physics_schemes.is_empty() {
            return Err(SdcError::invalid_configuration(
                "physics schemes need to be given when the term splitting contains physics",
            ));
        }
        if !splits_physics && !physics_schemes.is_empty() {
            return Err(SdcError::invalid_configuration(
                "physics schemes were given, but the term splitting does not contain physics",
            ));
        }

        for (i, label) in term_splitting.iter().enumerate() {
            if term_splitting[..i].contains(label) {
                return Err(SdcError::invalid_configuration(format!(
                    "{} appears more than once in the term splitting",
                    label
                )));
            }
        }

        for (label, _) in &dynamics_schemes {
            if *label == TermLabel::Physics {
                return Err(SdcError::invalid_configuration(
                    "physics terms are advanced by physics schemes, not dynamics schemes",
                ));
            }
            if !term_splitting.contains(label) {
                return Err(SdcError::invalid_configuration(format!(
                    "a scheme was given for {} terms, which are not in the term splitting",
                    label
                )));
            }
        }

        let uncovered: Vec<TermLabel> = equation
            .labels()
            .into_iter()
            .filter(|label| !term_splitting.contains(label))
            .collect();
        if !uncovered.is_empty() {
            return Err(SdcError::UncoveredTerms(uncovered));
        }

        let mut dynamics: Vec<(TermLabel, LabelledEquation<T>, Box<dyn TimeDiscretisation<T>>)> = Vec::new();
        for (label, scheme) in dynamics_schemes {
            if dynamics.iter().any(|(existing, _, _)| *existing == label) {
                return Err(SdcError::invalid_configuration(format!(
                    "more than one scheme was given for {} terms",
                    label
                )));
            }
            dynamics.push((label, equation.restrict(&[label]), scheme));
        }

        for label in &term_splitting {
            let has_scheme = *label == TermLabel::Physics || dynamics.iter().any(|(l, _, _)| l == label);
            if !has_scheme {
                return Err(SdcError::invalid_configuration(format!("no scheme was given for {} terms", label)));
            }
        }

        Ok(Self {
            field: field.into(),
            term_splitting,
            dynamics,
            physics: physics_schemes,
        })
    }

    pub fn term_splitting(&self) -> &[TermLabel] {
        &self.term_splitting
    }
}

impl<T: Real> Timestep<T> for SplitTimestep<T> {
    fn timestep(&mut self, fields: &mut TimeLevelFields<T>, _t: T, dt: T) -> Result<(), SdcError> {
        for label in &self.term_splitting {
            if *label == TermLabel::Physics {
                for physics in &mut self.physics {
                    physics.apply(dt, &mut fields.np1)?;
                }
            } else if let Some((_, equation, scheme)) = self.dynamics.iter_mut().find(|(l, _, _)| l == label) {
                debug!("Split step: {} terms with {}", label, scheme.name());
                let x = field_mut(&mut fields.np1, &self.field)?;
                apply_in_place(scheme.as_mut(), &*equation, dt, x)?;
            }
        }
        Ok(())
    }
}

fn default_outer_iterations() -> usize {
    4
}

fn default_inner_iterations() -> usize {
    1
}

fn default_alpha() -> f64 {
    0.5
}

fn default_semi_implicit_linear_solver() -> SolverParameters {
    SolverParameters {
        tolerance: 1e-10,
        max_iterations: None,
    }
}

/// Parameters of the semi-implicit stepper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct SemiImplicitConfig {
    /// Number of outer iterations, each starting with transport.
    #[serde(default = "default_outer_iterations", alias = "maxk")]
    pub outer_iterations: usize,
    /// Number of linear solves per outer iteration.
    #[serde(default = "default_inner_iterations", alias = "maxi")]
    pub inner_iterations: usize,
    /// Off-centring of the implicit forcing, `0.5` for Crank-Nicolson.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub linear_solver_kind: LinearSolverKind,
    #[serde(default = "default_semi_implicit_linear_solver")]
    pub linear_solver: SolverParameters,
}

impl Default for SemiImplicitConfig {
    fn default() -> Self {
        Self {
            outer_iterations: default_outer_iterations(),
            inner_iterations: default_inner_iterations(),
            alpha: default_alpha(),
            linear_solver_kind: LinearSolverKind::default(),
            linear_solver: default_semi_implicit_linear_solver(),
        }
    }
}

/// Iterated semi-implicit Crank-Nicolson stepping with separate transport.
///
/// With `N` the forcing, consisting of all terms except transport, diffusion and physics, and
/// `L` its linearisation, a step computes
///
/// ```text
/// x* = x^n + (1 - alpha) dt N(x^n)
/// repeat outer_iterations times:
///     x^p = transport(x*)
///     repeat inner_iterations times:
///         r = x^p + alpha dt N(x^{n+1}) - x^{n+1}
///         solve (I - alpha dt L) dy = r
///         x^{n+1} += dy
/// ```
///
/// followed by the auxiliary schemes for other fields (from level `n` to `np1`) and the
/// diffusion scheme, applied in place on `np1`.
pub struct SemiImplicit<T: Real> {
    field: String,
    config: SemiImplicitConfig,
    alpha: T,
    dt: T,
    forcing: LabelledEquation<T>,
    transport_equation: LabelledEquation<T>,
    transport: Box<dyn TimeDiscretisation<T>>,
    diffusion: Option<(LabelledEquation<T>, Box<dyn TimeDiscretisation<T>>)>,
    auxiliary: Vec<FieldScheme<T>>,
    linear_solver: LinearTimesteppingSolver<T>,
    f: DVector<T>,
    rhs: DVector<T>,
    dy: DVector<T>,
}

impl<T: Real> SemiImplicit<T> {
    /// Sets up the stepper for a fixed time step, using the forcing terms' own linearisation.
    ///
    /// Fails if any forcing term is nonlinear. Use [`SemiImplicit::with_linearisation`] in
    /// that case.
    pub fn new(
        field: impl Into<String>,
        equation: &LabelledEquation<T>,
        transport: Box<dyn TimeDiscretisation<T>>,
        diffusion: Option<Box<dyn TimeDiscretisation<T>>>,
        config: SemiImplicitConfig,
        dt: T,
    ) -> Result<Self, SdcError> {
        let linearisation = forcing_terms(equation).linearisation().ok_or_else(|| {
            SdcError::invalid_configuration("the forcing terms are nonlinear, so a linearisation must be provided")
        })?;
        Self::with_linearisation(field, equation, transport, diffusion, config, dt, &linearisation)
    }

    /// Sets up the stepper with the given linearisation `L` of the forcing terms.
    pub fn with_linearisation(
        field: impl Into<String>,
        equation: &LabelledEquation<T>,
        transport: Box<dyn TimeDiscretisation<T>>,
        diffusion: Option<Box<dyn TimeDiscretisation<T>>>,
        config: SemiImplicitConfig,
        dt: T,
        linearisation: &CsrMatrix<T>,
    ) -> Result<Self, SdcError> {
        if !(0.0..=1.0).contains(&config.alpha) {
            return Err(SdcError::invalid_configuration(format!(
                "off-centring parameter must lie in [0, 1], got {}",
                config.alpha
            )));
        }
        if equation.has_label(TermLabel::Physics) {
            return Err(SdcError::UncoveredTerms(vec![TermLabel::Physics]));
        }
        let diffusion = match diffusion {
            Some(scheme) => Some((equation.restrict(&[TermLabel::Diffusion]), scheme)),
            None if equation.has_label(TermLabel::Diffusion) => {
                return Err(SdcError::UncoveredTerms(vec![TermLabel::Diffusion]));
            }
            None => None,
        };

        let alpha = nalgebra::convert::<f64, T>(config.alpha);
        let linear_solver =
            LinearTimesteppingSolver::new(config.linear_solver_kind, linearisation, dt, alpha, config.linear_solver)?;
        let n = equation.dimension();

        Ok(Self {
            field: field.into(),
            config,
            alpha,
            dt,
            forcing: forcing_terms(equation),
            transport_equation: equation.restrict(&[TermLabel::Transport]),
            transport,
            diffusion,
            auxiliary: Vec::new(),
            linear_solver,
            f: DVector::zeros(n),
            rhs: DVector::zeros(n),
            dy: DVector::zeros(n),
        })
    }

    /// Adds a scheme for another field, advanced from level `n` to `np1` after the main field.
    pub fn with_auxiliary_scheme(mut self, scheme: FieldScheme<T>) -> Self {
        self.auxiliary.push(scheme);
        self
    }

    pub fn config(&self) -> &SemiImplicitConfig {
        &self.config
    }

    fn eval_forcing(&mut self, x: &DVector<T>) {
        self.forcing
            .eval_rhs_into(TermSelection::All, (&mut self.f).into(), x.into());
    }
}

fn forcing_terms<T: Real>(equation: &LabelledEquation<T>) -> LabelledEquation<T> {
    equation.exclude(&[TermLabel::Transport, TermLabel::Diffusion, TermLabel::Physics])
}

impl<T: Real> Timestep<T> for SemiImplicit<T> {
    fn extra_time_levels(&self) -> Vec<&'static str> {
        vec!["star", "p"]
    }

    fn timestep(&mut self, fields: &mut TimeLevelFields<T>, _t: T, dt: T) -> Result<(), SdcError> {
        if dt != self.dt {
            return Err(SdcError::invalid_configuration(format!(
                "semi-implicit stepper was set up for dt = {}, but asked to step with dt = {}",
                self.dt, dt
            )));
        }
        let alpha = self.alpha;
        let xn = field(&fields.n, &self.field)?.clone();
        let mut xnp1 = field(&fields.np1, &self.field)?.clone();

        // x* = x^n + (1 - alpha) dt N(x^n)
        self.eval_forcing(&xn);
        let mut xstar = xn.clone();
        xstar.axpy((T::one() - alpha) * dt, &self.f, T::one());

        let mut xp = DVector::zeros(xn.len());
        for k in 0..self.config.outer_iterations {
            self.transport
                .apply(&self.transport_equation, dt, (&xstar).into(), (&mut xp).into())?;

            for i in 0..self.config.inner_iterations {
                // r = x^p + alpha dt N(x^{n+1}) - x^{n+1}
                self.eval_forcing(&xnp1);
                self.rhs.copy_from(&xp);
                self.rhs.axpy(alpha * dt, &self.f, T::one());
                self.rhs -= &xnp1;

                self.linear_solver
                    .solve((&self.rhs).into(), (&mut self.dy).into())?;
                xnp1 += &self.dy;
                debug!(
                    "Semi-implicit iteration ({}, {}): update norm {}",
                    k,
                    i,
                    self.dy.norm()
                );
            }
        }

        if let Some(star) = fields.level_mut("star") {
            field_mut(star, &self.field)?.copy_from(&xstar);
        }
        if let Some(p) = fields.level_mut("p") {
            field_mut(p, &self.field)?.copy_from(&xp);
        }
        field_mut(&mut fields.np1, &self.field)?.copy_from(&xnp1);

        for scheme in &mut self.auxiliary {
            scheme.apply(dt, &fields.n, &mut fields.np1)?;
        }

        if let Some((equation, scheme)) = &mut self.diffusion {
            let x = field_mut(&mut fields.np1, &self.field)?;
            apply_in_place(scheme.as_mut(), &*equation, dt, x)?;
        }
        Ok(())
    }
}

/// Sets a prescribed transporting velocity before each step of an inner stepper.
///
/// The velocity at the time of the new level is written to the named field on levels `n` and
/// `np1` and on any intermediate levels, and published to the attached [`SharedField`]s so that
/// transport terms reading them see the current value.
pub struct PrescribedTransport<T: Real, S, F> {
    field: String,
    velocity: F,
    shared: Vec<SharedField<T>>,
    inner: S,
}

impl<T, S, F> PrescribedTransport<T, S, F>
where
    T: Real,
    S: Timestep<T>,
    F: FnMut(T) -> DVector<T>,
{
    pub fn new(field: impl Into<String>, velocity: F, inner: S) -> Self {
        Self {
            field: field.into(),
            velocity,
            shared: Vec::new(),
            inner,
        }
    }

    pub fn with_shared_field(mut self, shared: SharedField<T>) -> Self {
        self.shared.push(shared);
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn prescribe(&self, fields: &mut TimeLevelFields<T>, levels: &[&str], velocity: &DVector<T>) -> Result<(), SdcError> {
        for &level in levels {
            let store = match fields.level_mut(level) {
                Some(store) => store,
                None => continue,
            };
            let target = field_mut(store, &self.field)?;
            if target.len() != velocity.len() {
                return Err(SdcError::invalid_configuration(format!(
                    "prescribed velocity has length {}, but field {} has length {}",
                    velocity.len(),
                    self.field,
                    target.len()
                )));
            }
            target.copy_from(velocity);
        }
        Ok(())
    }
}

impl<T, S, F> Timestep<T> for PrescribedTransport<T, S, F>
where
    T: Real,
    S: Timestep<T>,
    F: FnMut(T) -> DVector<T>,
{
    fn extra_time_levels(&self) -> Vec<&'static str> {
        self.inner.extra_time_levels()
    }

    fn timestep(&mut self, fields: &mut TimeLevelFields<T>, t: T, dt: T) -> Result<(), SdcError> {
        let velocity = (self.velocity)(t);
        let mut levels = vec!["n", "np1"];
        levels.extend(self.inner.extra_time_levels());
        self.prescribe(fields, &levels, &velocity)?;
        for shared in &self.shared {
            shared.set(&velocity);
        }
        debug!("Prescribed {} at t = {}", self.field, t);
        self.inner.timestep(fields, t, dt)
    }
}

/// Drives a [`Timestep`] from a start time to an end time, with physics, diffusion and output
/// after every step.
pub struct Timeloop<T: Real, S, O> {
    stepper: S,
    fields: FieldStore<T>,
    levels: TimeLevelFields<T>,
    io: Io<T, O>,
    dt: T,
    physics: Vec<PhysicsScheme<T>>,
    diffusion: Vec<FieldScheme<T>>,
}

impl<T, S, O> Timeloop<T, S, O>
where
    T: Real,
    S: Timestep<T>,
    O: OutputSink<T>,
{
    pub fn new(stepper: S, fields: FieldStore<T>, io: Io<T, O>, dt: T) -> Result<Self, SdcError> {
        if !(dt.is_finite() && dt > T::zero()) {
            return Err(SdcError::invalid_configuration(format!(
                "time step must be positive and finite, got {}",
                dt
            )));
        }
        let levels = TimeLevelFields::with_extra_levels(&fields, &stepper.extra_time_levels());
        Ok(Self {
            stepper,
            fields,
            levels,
            io,
            dt,
            physics: Vec::new(),
            diffusion: Vec::new(),
        })
    }

    pub fn with_physics(mut self, physics: PhysicsScheme<T>) -> Self {
        self.physics.push(physics);
        self
    }

    /// Adds a diffusion scheme, applied in place to the new time level after physics.
    pub fn with_diffusion_scheme(mut self, scheme: FieldScheme<T>) -> Self {
        self.diffusion.push(scheme);
        self
    }

    pub fn fields(&self) -> &FieldStore<T> {
        &self.fields
    }

    pub fn levels(&self) -> &TimeLevelFields<T> {
        &self.levels
    }

    pub fn stepper(&self) -> &S {
        &self.stepper
    }

    pub fn io(&self) -> &Io<T, O> {
        &self.io
    }

    pub fn into_io(self) -> Io<T, O> {
        self.io
    }

    /// Runs from `t0` until `tmax` and returns the final time.
    ///
    /// Steps are taken while `t < tmax - dt / 2`, so the final time is the multiple of `dt`
    /// closest to `tmax`.
    pub fn run(&mut self, t0: T, tmax: T) -> eyre::Result<T> {
        let dt = self.dt;
        let half_dt = dt * nalgebra::convert::<f64, T>(0.5);

        self.levels.initialise(&self.fields);
        self.io
            .dump(t0, &self.fields)
            .wrap_err("failed to write initial output")?;

        let mut t = t0;
        while t < tmax - half_dt {
            info!("At start of time step, t = {}, dt = {}", t, dt);
            t += dt;
            self.levels.update();

            self.stepper
                .timestep(&mut self.levels, t, dt)
                .wrap_err_with(|| format!("time step ending at t = {} failed", t))?;

            for physics in &mut self.physics {
                physics
                    .apply(dt, &mut self.levels.np1)
                    .wrap_err_with(|| format!("physics {} failed at t = {}", physics.name(), t))?;
            }
            for scheme in &mut self.diffusion {
                scheme
                    .apply_in_place(dt, &mut self.levels.np1)
                    .wrap_err_with(|| format!("diffusion of {} failed at t = {}", scheme.field(), t))?;
            }

            self.fields.assign_from(&self.levels.np1);
            self.io
                .dump(t, &self.fields)
                .wrap_err_with(|| format!("output failed at t = {}", t))?;
        }

        info!("Time loop complete, t = {}, tmax = {}", t, tmax);
        Ok(t)
    }
}
