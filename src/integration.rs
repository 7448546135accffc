//! Spectral integration matrices for the correction sweeps.
//!
//! Given `M` distinct nodes `t_0 < ... < t_{M-1}` in `[0, dt]` and the Lagrange basis
//! polynomials `l_j` through them, the matrices are defined by
//!
//! ```text
//! Q[m, j] = int_0^{t_m} l_j(t) dt
//! S[m, j] = int_{t_{m-1}}^{t_m} l_j(t) dt     (t_{-1} = 0)
//! Qfin[j] = int_0^{dt} l_j(t) dt
//! ```
//!
//! The basis polynomials are represented in Newton form. The Newton-Vandermonde matrix is lower
//! triangular, which avoids the ill-conditioned inversion of a monomial Vandermonde matrix.
use crate::error::SdcError;
use crate::quadrature::QuadratureRule;
use crate::Real;
use itertools::izip;
use nalgebra::{DMatrix, DVector};
use tempus_quadrature::univariate::gauss;

/// Builds the Newton-Vandermonde matrix `V[i, k] = prod_{l < k} (t_i - t_l)`.
///
/// The matrix is lower triangular, and its diagonal is non-zero exactly when the nodes are
/// distinct.
pub fn newton_vandermonde<T: Real>(nodes: &[T]) -> DMatrix<T> {
    let m = nodes.len();
    let mut v = DMatrix::zeros(m, m);
    v.column_mut(0).fill(T::one());
    for k in 1..m {
        for i in 0..m {
            v[(i, k)] = (nodes[i] - nodes[k - 1]) * v[(i, k - 1)];
        }
    }
    v
}

/// Evaluates the Newton-form polynomial `sum_k c_k prod_{l < k} (x - t_l)` at `x`.
pub fn horner_newton<T: Real>(coefficients: &[T], nodes: &[T], x: T) -> T {
    assert_eq!(coefficients.len(), nodes.len());
    coefficients
        .iter()
        .zip(nodes)
        .rev()
        .fold(T::zero(), |y, (&c, &t)| y * (x - t) + c)
}

fn check_distinct<T: Real>(nodes: &[T]) -> Result<(), SdcError> {
    for (i, a) in nodes.iter().enumerate() {
        if let Some(j) = nodes[i + 1..].iter().position(|b| b == a) {
            return Err(SdcError::DegenerateNodes {
                first: i,
                second: i + 1 + j,
            });
        }
    }
    Ok(())
}

/// Newton coefficients of all Lagrange basis polynomials, one polynomial per column.
fn lagrange_newton_coefficients<T: Real>(nodes: &[T]) -> Result<DMatrix<T>, SdcError> {
    check_distinct(nodes)?;
    let m = nodes.len();
    newton_vandermonde(nodes)
        .solve_lower_triangular(&DMatrix::identity(m, m))
        // Only reachable if the nodes are so close that their differences underflow
        .ok_or(SdcError::DegenerateNodes { first: 0, second: m - 1 })
}

/// Integrals over `[0, b]` of the Lagrange basis polynomials in Newton form.
///
/// Uses Gauss-Legendre quadrature with `ceil(M / 2)` points, which is exact for the degree `M - 1`
/// basis polynomials.
fn integrate_basis<T: Real>(nodes: &[T], coefficients: &DMatrix<T>, b: T) -> DVector<T> {
    let m = nodes.len();
    let (weights, points) = gauss((m + 1) / 2);
    let half_b = b * nalgebra::convert::<f64, T>(0.5);

    let basis: Vec<Vec<T>> = coefficients
        .column_iter()
        .map(|c| c.iter().copied().collect())
        .collect();

    let mut integrals = DVector::zeros(m);
    for (w, xi) in izip!(weights, points) {
        let t = half_b * nalgebra::convert::<f64, T>(xi + 1.0);
        let w = half_b * nalgebra::convert::<f64, T>(w);
        for (integral, c_j) in izip!(integrals.iter_mut(), &basis) {
            *integral += w * horner_newton(c_j, nodes, t);
        }
    }
    integrals
}

/// Integrals over `[0, b]` of each Lagrange basis polynomial through `nodes`.
///
/// Returns an error if the nodes are not distinct.
pub fn lagrange_integration_weights<T: Real>(nodes: &[T], b: T) -> Result<DVector<T>, SdcError> {
    let coefficients = lagrange_newton_coefficients(nodes)?;
    Ok(integrate_basis(nodes, &coefficients, b))
}

/// The matrices `Q`, `S` and the vector `Qfin` for a quadrature rule.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationMatrices<T: Real> {
    q: DMatrix<T>,
    s: DMatrix<T>,
    q_fin: DVector<T>,
}

impl<T: Real> IntegrationMatrices<T> {
    pub fn new(rule: &QuadratureRule<T>) -> Result<Self, SdcError> {
        Self::from_nodes(rule.nodes(), rule.dt())
    }

    /// Builds the matrices for arbitrary distinct nodes in `[0, dt]`.
    pub fn from_nodes(nodes: &[T], dt: T) -> Result<Self, SdcError> {
        let m = nodes.len();
        if m == 0 {
            return Err(SdcError::invalid_configuration("at least one quadrature node is required"));
        }
        let coefficients = lagrange_newton_coefficients(nodes)?;

        let mut q = DMatrix::zeros(m, m);
        for (i, &t) in nodes.iter().enumerate() {
            q.row_mut(i)
                .tr_copy_from(&integrate_basis(nodes, &coefficients, t));
        }

        let mut s = q.clone();
        for i in 1..m {
            let mut row = s.row_mut(i);
            row -= q.row(i - 1);
        }

        let q_fin = integrate_basis(nodes, &coefficients, dt);

        Ok(Self { q, s, q_fin })
    }

    pub fn num_nodes(&self) -> usize {
        self.q_fin.len()
    }

    /// Integration from the start of the step to each node.
    pub fn q(&self) -> &DMatrix<T> {
        &self.q
    }

    /// Node-to-node integration.
    pub fn s(&self) -> &DMatrix<T> {
        &self.s
    }

    /// Integration over the whole step.
    pub fn q_fin(&self) -> &DVector<T> {
        &self.q_fin
    }
}
