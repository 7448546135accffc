//! Semi-discrete equations `dy/dt = F(y)` assembled from labelled terms.
//!
//! An [`Equation`] only needs to evaluate (parts of) its right-hand side and solve linear systems
//! with the shifted Jacobian `I - a J`. [`LabelledEquation`] is the standard implementation: a
//! sum of terms, each carrying a [`TermLabel`] describing the physical process it models and a
//! [`Treatment`] used by implicit-explicit schemes.
use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use tempus_optimize::calculus::{CentralDifference, JacobianSolveError};

/// Which terms of the right-hand side to include.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TermSelection {
    All,
    Implicit,
    Explicit,
}

impl TermSelection {
    pub fn includes(&self, treatment: Treatment) -> bool {
        match self {
            Self::All => true,
            Self::Implicit => treatment == Treatment::Implicit,
            Self::Explicit => treatment == Treatment::Explicit,
        }
    }
}

/// The physical process a term models.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermLabel {
    Transport,
    Diffusion,
    Forcing,
    Physics,
}

impl Display for TermLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transport => "transport",
            Self::Diffusion => "diffusion",
            Self::Forcing => "forcing",
            Self::Physics => "physics",
        };
        write!(f, "{}", name)
    }
}

/// How implicit-explicit schemes treat a term.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Treatment {
    Implicit,
    Explicit,
}

/// The right-hand side `F(y)` of a semi-discrete system `dy/dt = F(y)`.
pub trait Equation<T: Real>: Send + Sync {
    fn dimension(&self) -> usize;

    /// The distinct labels of the terms in the equation.
    fn labels(&self) -> Vec<TermLabel>;

    /// Evaluates `f = F_sel(y)`, the sum of the selected terms.
    fn eval_rhs_into(&self, selection: TermSelection, f: DVectorViewMut<T>, y: DVectorView<T>);

    /// Solves `(I - a J_sel(y)) sol = rhs`, where `J_sel` is the Jacobian of `F_sel` at `y`.
    ///
    /// The default implementation approximates the Jacobian with central finite differences and
    /// solves the dense system with an LU decomposition.
    fn solve_shifted_jacobian(
        &self,
        selection: TermSelection,
        a: T,
        y: DVectorView<T>,
        rhs: DVectorView<T>,
        mut sol: DVectorViewMut<T>,
    ) -> Result<(), JacobianSolveError> {
        let n = self.dimension();
        let mut system = DMatrix::identity(n, n);
        CentralDifference::default().accumulate_jacobian(
            (&mut system).into(),
            -a,
            |x, f| self.eval_rhs_into(selection, f, x),
            y,
        );
        let solution = system
            .lu()
            .solve(&rhs)
            .ok_or("shifted Jacobian is singular")?;
        sol.copy_from(&solution);
        Ok(())
    }
}

/// A single additive contribution to a right-hand side.
pub trait TermOperator<T: Real>: Send + Sync + Debug {
    /// Adds `F_term(y)` to `f`.
    fn accumulate(&self, f: DVectorViewMut<T>, y: DVectorView<T>);

    /// Adds the Jacobian of `F_term` at `y` to `jacobian`.
    ///
    /// The default implementation uses central finite differences.
    fn accumulate_jacobian(&self, jacobian: DMatrixViewMut<T>, y: DVectorView<T>) {
        CentralDifference::default().accumulate_jacobian(
            jacobian,
            T::one(),
            |x, mut f| {
                f.fill(T::zero());
                self.accumulate(f, x);
            },
            y,
        );
    }

    /// The constant matrix `A` if the term is linear, `F_term(y) = A y`.
    fn linear_operator(&self) -> Option<&CsrMatrix<T>> {
        None
    }
}

/// A linear term `F(y) = A y` with a sparse matrix `A`.
#[derive(Debug, Clone)]
pub struct LinearTerm<T: Real> {
    matrix: CsrMatrix<T>,
}

impl<T: Real> LinearTerm<T> {
    pub fn new(matrix: CsrMatrix<T>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &CsrMatrix<T> {
        &self.matrix
    }
}

impl<T: Real> TermOperator<T> for LinearTerm<T> {
    fn accumulate(&self, mut f: DVectorViewMut<T>, y: DVectorView<T>) {
        spmm_csr_dense(T::one(), &mut f, T::one(), Op::NoOp(&self.matrix), Op::NoOp(&y));
    }

    fn accumulate_jacobian(&self, mut jacobian: DMatrixViewMut<T>, _y: DVectorView<T>) {
        for (i, j, &v) in self.matrix.triplet_iter() {
            jacobian[(i, j)] += v;
        }
    }

    fn linear_operator(&self) -> Option<&CsrMatrix<T>> {
        Some(&self.matrix)
    }
}

/// A term defined by a closure that adds its contribution to `f`.
pub struct FunctionTerm<F> {
    function: F,
}

impl<F> FunctionTerm<F> {
    pub fn new<T>(function: F) -> Self
    where
        T: Real,
        F: Fn(DVectorViewMut<T>, DVectorView<T>) + Send + Sync,
    {
        Self { function }
    }
}

impl<F> Debug for FunctionTerm<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTerm").finish_non_exhaustive()
    }
}

impl<T, F> TermOperator<T> for FunctionTerm<F>
where
    T: Real,
    F: Fn(DVectorViewMut<T>, DVectorView<T>) + Send + Sync,
{
    fn accumulate(&self, f: DVectorViewMut<T>, y: DVectorView<T>) {
        (self.function)(f, y)
    }
}

#[derive(Debug, Clone)]
pub struct Term<T: Real> {
    pub label: TermLabel,
    pub treatment: Treatment,
    pub operator: Arc<dyn TermOperator<T>>,
}

/// An equation given as an ordered sum of labelled terms.
///
/// ```
/// # use tempus::equation::{Equation, FunctionTerm, LabelledEquation, TermLabel, TermSelection, Treatment};
/// # use nalgebra::{DVector, DVectorView, DVectorViewMut};
/// // dy/dt = -y + 1
/// let equation = LabelledEquation::new(1)
///     .with_term(TermLabel::Diffusion, Treatment::Implicit, FunctionTerm::new(
///         |mut f: DVectorViewMut<f64>, y: DVectorView<f64>| f[0] -= y[0]))
///     .with_term(TermLabel::Forcing, Treatment::Explicit, FunctionTerm::new(
///         |mut f: DVectorViewMut<f64>, _: DVectorView<f64>| f[0] += 1.0));
///
/// let y = DVector::from_element(1, 3.0);
/// let mut f = DVector::zeros(1);
/// equation.eval_rhs_into(TermSelection::All, (&mut f).into(), (&y).into());
/// assert_eq!(f[0], -2.0);
/// equation.eval_rhs_into(TermSelection::Explicit, (&mut f).into(), (&y).into());
/// assert_eq!(f[0], 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct LabelledEquation<T: Real> {
    dimension: usize,
    terms: Vec<Term<T>>,
}

impl<T: Real> LabelledEquation<T> {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            terms: Vec::new(),
        }
    }

    pub fn with_term(mut self, label: TermLabel, treatment: Treatment, operator: impl TermOperator<T> + 'static) -> Self {
        self.add_term(label, treatment, Arc::new(operator));
        self
    }

    pub fn add_term(&mut self, label: TermLabel, treatment: Treatment, operator: Arc<dyn TermOperator<T>>) {
        self.terms.push(Term {
            label,
            treatment,
            operator,
        });
    }

    pub fn terms(&self) -> &[Term<T>] {
        &self.terms
    }

    pub fn has_label(&self, label: TermLabel) -> bool {
        self.terms.iter().any(|term| term.label == label)
    }

    /// The equation consisting only of the terms with one of the given labels.
    pub fn restrict(&self, labels: &[TermLabel]) -> Self {
        self.filter(|term| labels.contains(&term.label))
    }

    /// The equation consisting of all terms except those with one of the given labels.
    pub fn exclude(&self, labels: &[TermLabel]) -> Self {
        self.filter(|term| !labels.contains(&term.label))
    }

    fn filter(&self, keep: impl Fn(&Term<T>) -> bool) -> Self {
        Self {
            dimension: self.dimension,
            terms: self.terms.iter().filter(|term| keep(term)).cloned().collect(),
        }
    }

    /// Sum of the matrices of all linear terms.
    ///
    /// Returns `None` if any term is nonlinear.
    pub fn linearisation(&self) -> Option<CsrMatrix<T>> {
        let n = self.dimension;
        self.terms
            .iter()
            .try_fold(CsrMatrix::zeros(n, n), |sum, term| {
                term.operator.linear_operator().map(|a| &sum + a)
            })
    }

    fn assemble_jacobian(&self, selection: TermSelection, y: DVectorView<T>) -> DMatrix<T> {
        let n = self.dimension;
        let mut jacobian = DMatrix::zeros(n, n);
        for term in self.selected(selection) {
            term.operator
                .accumulate_jacobian(DMatrixViewMut::from(&mut jacobian), y);
        }
        jacobian
    }

    fn selected(&self, selection: TermSelection) -> impl Iterator<Item = &Term<T>> {
        self.terms
            .iter()
            .filter(move |term| selection.includes(term.treatment))
    }
}

impl<T: Real> Equation<T> for LabelledEquation<T> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn labels(&self) -> Vec<TermLabel> {
        let mut labels: Vec<TermLabel> = self.terms.iter().map(|term| term.label).collect();
        labels.sort();
        labels.dedup();
        labels
    }

    fn eval_rhs_into(&self, selection: TermSelection, mut f: DVectorViewMut<T>, y: DVectorView<T>) {
        assert_eq!(f.len(), self.dimension);
        assert_eq!(y.len(), self.dimension);
        f.fill(T::zero());
        for term in self.selected(selection) {
            term.operator.accumulate(DVectorViewMut::from(&mut f), y);
        }
    }

    fn solve_shifted_jacobian(
        &self,
        selection: TermSelection,
        a: T,
        y: DVectorView<T>,
        rhs: DVectorView<T>,
        mut sol: DVectorViewMut<T>,
    ) -> Result<(), JacobianSolveError> {
        let n = self.dimension;
        let jacobian = self.assemble_jacobian(selection, y);
        let system = DMatrix::identity(n, n) - jacobian * a;
        let solution: DVector<T> = system
            .lu()
            .solve(&rhs)
            .ok_or("shifted Jacobian is singular")?;
        sol.copy_from(&solution);
        Ok(())
    }
}
