//! Error types shared by the time integration schemes and time loops.
use crate::equation::TermLabel;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Where in a time step a solve took place.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SolveStage {
    /// The low-order predictor marching across the quadrature nodes.
    Predictor { node: usize },
    /// The correction equation for a node in the given sweep (both counted from 1).
    Correction { sweep: usize, node: usize },
    /// The final quadrature update of an SDC step.
    FinalUpdate,
    /// An implicit solve inside a base time discretisation.
    Scheme(&'static str),
    /// A linear solve in the semi-implicit time stepper.
    LinearSolve,
}

impl Display for SolveStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predictor { node } => write!(f, "predictor at node {}", node),
            Self::Correction { sweep, node } => write!(f, "correction sweep {} at node {}", sweep, node),
            Self::FinalUpdate => write!(f, "final update"),
            Self::Scheme(name) => write!(f, "{} step", name),
            Self::LinearSolve => write!(f, "linear solve"),
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SdcError {
    /// The setup parameters are invalid or incompatible with each other.
    InvalidConfiguration(String),
    /// Two quadrature nodes coincide, so the interpolation problem is singular.
    DegenerateNodes { first: usize, second: usize },
    /// The listed terms of an equation are not handled by any configured scheme.
    UncoveredTerms(Vec<TermLabel>),
    /// A linear or nonlinear solve failed to converge.
    SolverFailure {
        stage: SolveStage,
        source: Box<dyn Error + Send + Sync>,
    },
}

impl SdcError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn solver_failure(stage: SolveStage, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::SolverFailure {
            stage,
            source: source.into(),
        }
    }
}

impl Display for SdcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfiguration(message) => write!(f, "Invalid configuration: {}", message),
            Self::DegenerateNodes { first, second } => {
                write!(f, "Quadrature nodes {} and {} coincide", first, second)
            }
            Self::UncoveredTerms(labels) => {
                write!(f, "No scheme handles the terms labelled ")?;
                for (i, label) in labels.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", label)?;
                }
                Ok(())
            }
            Self::SolverFailure { stage, source } => {
                write!(f, "Solver failed in {}. Error: {}", stage, source)
            }
        }
    }
}

impl Error for SdcError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SolverFailure { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
