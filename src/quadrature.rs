//! Quadrature nodes within a single time step.
//!
//! Rules from [`tempus_quadrature`] live on the reference interval `[-1, 1]`. A [`QuadratureRule`]
//! maps them affinely onto `[0, dt]`, so that node values can be read as times relative to the
//! start of the step.
use crate::error::SdcError;
use crate::Real;
use serde::{Deserialize, Serialize};
use tempus_quadrature::univariate::{gauss, try_gauss_lobatto, try_gauss_radau};

/// The family of quadrature nodes used inside a time step.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuadratureKind {
    /// Roots of the Legendre polynomial. Neither endpoint is a node.
    GaussLegendre,
    /// Radau nodes including the start of the step, `node[0] = 0`.
    #[default]
    GaussRadau,
    /// Radau nodes including the end of the step, `node[M-1] = dt` (Radau IIA).
    GaussRadauRight,
    /// Lobatto nodes including both endpoints.
    GaussLobatto,
}

impl QuadratureKind {
    pub fn all() -> [Self; 4] {
        [Self::GaussLegendre, Self::GaussRadau, Self::GaussRadauRight, Self::GaussLobatto]
    }

    /// The smallest number of nodes for which the rule exists.
    pub fn min_nodes(&self) -> usize {
        match self {
            Self::GaussLobatto => 2,
            _ => 1,
        }
    }

    /// Highest polynomial degree integrated exactly over the whole step with `num_nodes` nodes.
    pub fn degree_of_exactness(&self, num_nodes: usize) -> usize {
        let m = num_nodes;
        match self {
            Self::GaussLegendre => 2 * m - 1,
            Self::GaussRadau | Self::GaussRadauRight => 2 * m - 2,
            Self::GaussLobatto => 2 * m - 3,
        }
    }
}

/// Quadrature nodes and weights on the interval `[0, dt]`.
///
/// Nodes are strictly increasing. Depending on the kind, one or both endpoints are nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule<T> {
    kind: QuadratureKind,
    nodes: Vec<T>,
    weights: Vec<T>,
    dt: T,
}

impl<T: Real> QuadratureRule<T> {
    /// Constructs the rule with `num_nodes` nodes of the given kind on `[0, dt]`.
    ///
    /// Fails if the rule does not exist for the requested number of nodes, if `dt` is not
    /// positive and finite, or if `dt` is so small that mapped nodes coincide.
    pub fn new(kind: QuadratureKind, num_nodes: usize, dt: T) -> Result<Self, SdcError> {
        if num_nodes < kind.min_nodes() {
            return Err(SdcError::invalid_configuration(format!(
                "{:?} quadrature requires at least {} nodes, got {}",
                kind,
                kind.min_nodes(),
                num_nodes
            )));
        }
        if !(dt.is_finite() && dt > T::zero()) {
            return Err(SdcError::invalid_configuration(format!(
                "time step must be positive and finite, got {}",
                dt
            )));
        }

        let no_rule = |_| SdcError::invalid_configuration(format!("no {:?} rule with {} nodes", kind, num_nodes));
        let (reference_weights, reference_points) = match kind {
            QuadratureKind::GaussLegendre => gauss(num_nodes),
            QuadratureKind::GaussRadau | QuadratureKind::GaussRadauRight => {
                try_gauss_radau(num_nodes).map_err(no_rule)?
            }
            QuadratureKind::GaussLobatto => try_gauss_lobatto(num_nodes).map_err(no_rule)?,
        };

        // x in [-1, 1] maps to t = dt (x + 1) / 2, which keeps endpoint nodes exact
        let half_dt = dt * nalgebra::convert::<f64, T>(0.5);
        let mut nodes: Vec<T> = reference_points
            .iter()
            .map(|&x| half_dt * nalgebra::convert::<f64, T>(x + 1.0))
            .collect();
        let mut weights: Vec<T> = reference_weights
            .iter()
            .map(|&w| half_dt * nalgebra::convert::<f64, T>(w))
            .collect();

        if kind == QuadratureKind::GaussRadauRight {
            // Reflect t -> dt - t and reverse, so that the fixed node lands on the end of the step
            nodes = nodes.iter().rev().map(|&t| dt - t).collect();
            weights.reverse();
        }

        if let Some(i) = (1..nodes.len()).find(|&i| nodes[i] <= nodes[i - 1]) {
            return Err(SdcError::DegenerateNodes { first: i - 1, second: i });
        }

        Ok(Self {
            kind,
            nodes,
            weights,
            dt,
        })
    }

    /// Times within the step, relative to its start.
    pub fn nodes(&self) -> &[T] {
        &self.nodes
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn dt(&self) -> T {
        self.dt
    }

    pub fn kind(&self) -> QuadratureKind {
        self.kind
    }

    /// Widths `dtau[m] = node[m] - node[m - 1]` of the sub-intervals, with `node[-1] = 0`.
    ///
    /// The widths sum to the last node, not to `dt`, unless the end of the step is a node.
    pub fn subinterval_widths(&self) -> Vec<T> {
        let mut previous = T::zero();
        self.nodes
            .iter()
            .map(|&t| {
                let width = t - previous;
                previous = t;
                width
            })
            .collect()
    }

    /// Approximates the integral of `f` over `[0, dt]`.
    pub fn integrate(&self, f: impl Fn(T) -> T) -> T {
        self.weights
            .iter()
            .zip(&self.nodes)
            .fold(T::zero(), |acc, (&w, &t)| acc + w * f(t))
    }
}
