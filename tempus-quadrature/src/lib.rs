//! Quadrature rules for the one-dimensional reference interval `[-1, 1]`.
//!
//! The main purpose of this crate is to supply the temporal quadrature nodes used by `tempus`.
//! The rules are plain `f64` and may be used completely independently of `tempus`.
//!
//! All rules are returned as a pair `(weights, points)` with the points sorted in ascending order.

use std::fmt;
use std::fmt::{Display, Formatter};

mod legendre;
pub mod univariate;

pub use legendre::LegendreRecurrence;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(
                    f,
                    "There is no quadrature rule satisfying the requirements available"
                )
            }
        }
    }
}

impl std::error::Error for Error {}

/// A quadrature rule on `[-1, 1]`, stored as `(weights, points)`.
pub type Rule = (Vec<f64>, Vec<f64>);

/// Approximates the integral of `f` over `[-1, 1]` with the given rule.
pub fn integrate(rule: &Rule, f: impl Fn(f64) -> f64) -> f64 {
    let (weights, points) = rule;
    weights.iter().zip(points).map(|(w, x)| w * f(*x)).sum()
}
