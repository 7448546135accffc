//! Quadrature rules for the one-dimensional domain `[-1, 1]`.

use crate::legendre::LegendreRecurrence;
use crate::{Error, Rule};
use std::f64::consts::PI;

const ROOT_TOLERANCE: f64 = 1e-15;
const MAX_ROOT_ITERATIONS: usize = 100;

/// Finds one root of `f` close to each initial guess by Newton's method.
///
/// The function must return its value and derivative. Roots that have already been found are
/// deflated out of the iteration, so two nearby guesses never converge to the same root.
/// The returned roots are sorted in ascending order.
fn find_roots_deflated(guesses: impl IntoIterator<Item = f64>, f: impl Fn(f64) -> (f64, f64)) -> Vec<f64> {
    let mut roots: Vec<f64> = Vec::new();
    for guess in guesses {
        let mut x = guess;
        for _ in 0..MAX_ROOT_ITERATIONS {
            let (p, dp) = f(x);
            let deflation: f64 = roots.iter().map(|root| 1.0 / (x - root)).sum();
            let dx = -p / (dp - p * deflation);
            x += dx;
            if !(dx.abs() > ROOT_TOLERANCE) {
                break;
            }
        }
        roots.push(x);
    }
    roots.sort_by(|a, b| a.total_cmp(b));
    roots
}

/// Gauss quadrature for the reference interval [-1, 1].
///
/// Returns the [Gauss quadrature rule] with the given number of points. Given `n` points,
/// the rule integrates polynomials of order up to `2 n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
///
/// [Gauss quadrature rule]: https://en.wikipedia.org/wiki/Gaussian_quadrature
pub fn gauss(num_points: usize) -> Rule {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    // Only find the non-negative roots, the rest follow by symmetry
    let m = (n + 1) / 2;
    let guesses = (0..m).map(|i| (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos());
    let upper = find_roots_deflated(guesses, |x| LegendreRecurrence::evaluate(n, x).value_and_derivative());

    let positive = &upper[n % 2..];
    let mut points: Vec<f64> = positive.iter().rev().map(|x| -x).collect();
    if n % 2 == 1 {
        // The middle root of an odd-degree Legendre polynomial is exactly zero
        points.push(0.0);
    }
    points.extend_from_slice(positive);
    assert_eq!(points.len(), n, "Internal error: incorrect number of points produced");

    let weights = points
        .iter()
        .map(|&x| {
            let dp = LegendreRecurrence::evaluate(n, x).derivative();
            2.0 / ((1.0 - x * x) * dp * dp)
        })
        .collect();

    (weights, points)
}

/// Gauss-Radau quadrature with the left endpoint `-1` as a fixed node.
///
/// The remaining `n - 1` points are the roots of `(P_n + P_{n-1}) / (x + 1)`. The rule integrates
/// polynomials of order up to `2 n - 2` exactly.
///
/// Returns an error if zero points are requested.
pub fn try_gauss_radau(num_points: usize) -> Result<Rule, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }

    // Chebyshev-Gauss-Radau points are close to the Legendre ones
    let guesses = (1..n).map(|j| -(2.0 * PI * j as f64 / (2.0 * n as f64 - 1.0)).cos());
    let interior = find_roots_deflated(guesses, |x| {
        let p_n = LegendreRecurrence::evaluate(n, x);
        let p_nm1 = LegendreRecurrence::evaluate(n - 1, x);
        let q = p_n.value() + p_nm1.value();
        let dq = p_n.derivative() + p_nm1.derivative();
        // r(x) = q(x) / (1 + x), r'(x) = (q'(x) - r(x)) / (1 + x)
        let r = q / (1.0 + x);
        (r, (dq - r) / (1.0 + x))
    });

    let nf = n as f64;
    let mut points = vec![-1.0];
    let mut weights = vec![2.0 / (nf * nf)];
    for x in interior {
        let p_nm1 = LegendreRecurrence::evaluate(n - 1, x).value();
        points.push(x);
        weights.push((1.0 - x) / (nf * nf * p_nm1 * p_nm1));
    }

    Ok((weights, points))
}

/// Gauss-Lobatto quadrature, with both endpoints as fixed nodes.
///
/// The interior points are the roots of `P'_{n-1}`. The rule integrates polynomials of
/// order up to `2 n - 3` exactly.
///
/// Returns an error if fewer than two points are requested.
pub fn try_gauss_lobatto(num_points: usize) -> Result<Rule, Error> {
    let n = num_points;
    if n < 2 {
        return Err(Error::NoRuleAvailable);
    }

    let guesses = (1..n - 1).map(|j| -(PI * j as f64 / (n as f64 - 1.0)).cos());
    let interior = find_roots_deflated(guesses, |x| {
        let p = LegendreRecurrence::evaluate(n - 1, x);
        (p.derivative(), p.second_derivative())
    });

    let mut points = Vec::with_capacity(n);
    points.push(-1.0);
    points.extend(interior);
    points.push(1.0);

    let nf = n as f64;
    let weights = points
        .iter()
        .map(|&x| {
            let p = LegendreRecurrence::evaluate(n - 1, x).value();
            2.0 / (nf * (nf - 1.0) * p * p)
        })
        .collect();

    Ok((weights, points))
}
