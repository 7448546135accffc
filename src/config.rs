//! Setup parameters for the SDC engine and the solvers it owns.
//!
//! All configuration structs deserialize with `serde`, reject unknown fields, and fall back to
//! defaults for fields that are not given.
use crate::error::SdcError;
use crate::quadrature::QuadratureKind;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// The correction equation solved at each node during a sweep.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SdcVariant {
    /// Every term is treated explicitly.
    ForwardEuler,
    /// Every term is treated implicitly.
    #[default]
    BackwardEuler,
    /// Implicit terms are treated implicitly and explicit terms explicitly.
    Imex,
}

/// Stopping parameters handed to an iterative solver.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct SolverParameters {
    /// Relative tolerance, scaled by `max(1, ||rhs||)`.
    pub tolerance: f64,
    pub max_iterations: Option<usize>,
}

impl SolverParameters {
    pub fn nonlinear_default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: Some(50),
        }
    }

    pub fn linear_default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: Some(10),
        }
    }

    pub fn validate(&self) -> Result<(), SdcError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(SdcError::invalid_configuration(format!(
                "solver tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self::nonlinear_default()
    }
}

fn default_linear_solver() -> SolverParameters {
    SolverParameters::linear_default()
}

fn default_num_nodes() -> usize {
    3
}

fn default_max_sweeps() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_verbosity() -> LevelFilter {
    LevelFilter::Info
}

/// Parameters of a spectral deferred correction scheme.
///
/// ```
/// # use tempus::config::{SdcConfig, SdcVariant};
/// # use tempus::quadrature::QuadratureKind;
/// let config: SdcConfig = serde_json::from_str(r#"{
///     "quadrature": "gauss-lobatto",
///     "num-nodes": 4,
///     "variant": "imex"
/// }"#).unwrap();
/// assert_eq!(config.quadrature, QuadratureKind::GaussLobatto);
/// assert_eq!(config.variant, SdcVariant::Imex);
/// assert_eq!(config.max_sweeps, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct SdcConfig {
    #[serde(default)]
    pub quadrature: QuadratureKind,
    /// Number of quadrature nodes `M`.
    #[serde(default = "default_num_nodes", alias = "M")]
    pub num_nodes: usize,
    /// Number of correction sweeps `maxk`. Exactly this many sweeps are performed.
    #[serde(default = "default_max_sweeps", alias = "maxk")]
    pub max_sweeps: usize,
    /// Whether to finish the step with the full-interval quadrature update.
    #[serde(default = "default_true")]
    pub final_update: bool,
    #[serde(default)]
    pub variant: SdcVariant,
    /// Parameters for the per-node correction solves.
    #[serde(default)]
    pub nonlinear_solver: SolverParameters,
    /// Parameters for the final update solve.
    #[serde(default = "default_linear_solver")]
    pub linear_solver: SolverParameters,
    /// Evaluate the right-hand side at all nodes in parallel.
    #[serde(default = "default_true")]
    pub parallel_rhs: bool,
    /// Most verbose level of the messages emitted by the engine.
    #[serde(default = "default_verbosity")]
    pub verbosity: LevelFilter,
}

impl Default for SdcConfig {
    fn default() -> Self {
        Self {
            quadrature: QuadratureKind::default(),
            num_nodes: default_num_nodes(),
            max_sweeps: default_max_sweeps(),
            final_update: true,
            variant: SdcVariant::default(),
            nonlinear_solver: SolverParameters::nonlinear_default(),
            linear_solver: SolverParameters::linear_default(),
            parallel_rhs: true,
            verbosity: default_verbosity(),
        }
    }
}

impl SdcConfig {
    /// Checks the parameters that can be checked without constructing the quadrature rule.
    pub fn validate(&self) -> Result<(), SdcError> {
        if self.num_nodes < self.quadrature.min_nodes() {
            return Err(SdcError::invalid_configuration(format!(
                "{:?} quadrature requires at least {} nodes, got {}",
                self.quadrature,
                self.quadrature.min_nodes(),
                self.num_nodes
            )));
        }
        self.nonlinear_solver.validate()?;
        self.linear_solver.validate()?;
        Ok(())
    }
}
