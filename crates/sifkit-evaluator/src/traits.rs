//! Evaluator bridge and toolchain abstractions.
//!
//! The native evaluator exposes dozens of individually named entry points.
//! [`Evaluator`] narrows them to the semantic operations the model layer
//! needs; implementations pick the dense, sparse, constrained or
//! unconstrained entry point from the buffers they are handed.

use std::path::Path;

use crate::{Artifacts, EvaluatorError, Ordering};

/// Whether a problem has general constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    /// No general constraints (bounds only).
    Unconstrained,
    /// At least one general constraint.
    Constrained,
}

impl ProblemKind {
    /// Classify a problem by its constraint count.
    pub fn from_constraints(ncon: usize) -> Self {
        if ncon == 0 {
            ProblemKind::Unconstrained
        } else {
            ProblemKind::Constrained
        }
    }

    pub fn is_constrained(self) -> bool {
        matches!(self, ProblemKind::Constrained)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProblemKind::Unconstrained => "unconstrained",
            ProblemKind::Constrained => "constrained",
        }
    }
}

/// Variable and constraint counts read from the data unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub nvar: usize,
    pub ncon: usize,
}

impl Dimensions {
    pub fn kind(self) -> ProblemKind {
        ProblemKind::from_constraints(self.ncon)
    }
}

/// Variable-sized buffers filled by setup.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBuffers {
    /// Initial point.
    pub x: Vec<f64>,
    /// Variable lower bounds.
    pub lower: Vec<f64>,
    /// Variable upper bounds.
    pub upper: Vec<f64>,
}

impl VariableBuffers {
    pub fn new(nvar: usize) -> Self {
        Self {
            x: vec![0.0; nvar],
            lower: vec![0.0; nvar],
            upper: vec![0.0; nvar],
        }
    }
}

/// Constraint-sized buffers filled by constrained setup.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintBuffers {
    /// Initial Lagrange multipliers.
    pub multipliers: Vec<f64>,
    /// Constraint lower bounds.
    pub lower: Vec<f64>,
    /// Constraint upper bounds.
    pub upper: Vec<f64>,
    /// `true` for equality constraints.
    pub equality: Vec<bool>,
    /// `true` for linear constraints.
    pub linear: Vec<bool>,
}

impl ConstraintBuffers {
    pub fn new(ncon: usize) -> Self {
        Self {
            multipliers: vec![0.0; ncon],
            lower: vec![0.0; ncon],
            upper: vec![0.0; ncon],
            equality: vec![false; ncon],
            linear: vec![false; ncon],
        }
    }
}

/// Problem, variable and constraint names in setup order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProblemNames {
    pub problem: String,
    pub variables: Vec<String>,
    pub constraints: Vec<String>,
}

/// Call counts and timings kept by the native evaluator itself.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NativeReport {
    pub objective_calls: f64,
    pub gradient_calls: f64,
    pub hessian_calls: f64,
    pub hessian_product_calls: f64,
    /// Only reported for constrained problems.
    pub constraint_calls: Option<f64>,
    /// Only reported for constrained problems.
    pub constraint_gradient_calls: Option<f64>,
    /// Only reported for constrained problems.
    pub constraint_hessian_calls: Option<f64>,
    /// Seconds spent in setup.
    pub setup_time: f64,
    /// Seconds spent evaluating since setup.
    pub run_time: f64,
}

/// Semantic operations offered by a loaded evaluator module.
///
/// All indices are zero-based. Every method translates the native status
/// through [`crate::NativeStatus::check`]; buffers are sized by the caller
/// from previously queried dimensions and are never reallocated here.
pub trait Evaluator {
    /// Open the binary data unit that setup reads from.
    fn open_data_unit(&mut self, path: &Path) -> Result<(), EvaluatorError>;

    /// Close the data unit opened by [`Evaluator::open_data_unit`].
    fn close_data_unit(&mut self) -> Result<(), EvaluatorError>;

    /// Query variable and constraint counts from the open data unit.
    fn dimensions(&mut self) -> Result<Dimensions, EvaluatorError>;

    /// Run unconstrained setup.
    fn setup_unconstrained(&mut self, variables: &mut VariableBuffers)
    -> Result<(), EvaluatorError>;

    /// Run constrained setup with the given permutations.
    fn setup_constrained(
        &mut self,
        variables: &mut VariableBuffers,
        constraints: &mut ConstraintBuffers,
        ordering: Ordering,
    ) -> Result<(), EvaluatorError>;

    /// Number of nonzeros in the (Lagrangian) Hessian.
    fn hessian_nnz(&mut self, kind: ProblemKind) -> Result<usize, EvaluatorError>;

    /// Number of nonzeros in the Jacobian as reported natively, which
    /// includes the dense objective gradient row.
    fn jacobian_nnz(&mut self) -> Result<usize, EvaluatorError>;

    /// Fill the Hessian sparsity pattern; returns the number of entries.
    fn hessian_structure(
        &mut self,
        kind: ProblemKind,
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError>;

    /// Fill the constraint Jacobian sparsity pattern; returns the number of
    /// entries.
    fn jacobian_structure(
        &mut self,
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError>;

    /// Objective value at `x`.
    fn objective(&mut self, kind: ProblemKind, x: &[f64]) -> Result<f64, EvaluatorError>;

    /// Objective gradient at `x`.
    fn gradient(
        &mut self,
        kind: ProblemKind,
        x: &[f64],
        g: &mut [f64],
    ) -> Result<(), EvaluatorError>;

    /// Objective value and gradient at `x` in one call.
    fn objective_gradient(
        &mut self,
        kind: ProblemKind,
        x: &[f64],
        g: &mut [f64],
    ) -> Result<f64, EvaluatorError>;

    /// Constraint values at `x`; returns the objective value computed
    /// alongside.
    fn constraints(&mut self, x: &[f64], c: &mut [f64]) -> Result<f64, EvaluatorError>;

    /// Constraint values and sparse constraint Jacobian at `x`; returns the
    /// number of Jacobian entries written.
    fn sparse_jacobian(
        &mut self,
        x: &[f64],
        c: &mut [f64],
        vals: &mut [f64],
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError>;

    /// Value and dense gradient of constraint `index` at `x`.
    fn constraint_gradient(
        &mut self,
        index: usize,
        x: &[f64],
        grad: &mut [f64],
    ) -> Result<f64, EvaluatorError>;

    /// Sparse Hessian of the objective (`y = None`) or of the Lagrangian.
    fn hessian_values(
        &mut self,
        kind: ProblemKind,
        x: &[f64],
        y: Option<&[f64]>,
        vals: &mut [f64],
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError>;

    /// Hessian-vector product of the objective or Lagrangian.
    fn hessian_product(
        &mut self,
        kind: ProblemKind,
        x: &[f64],
        y: Option<&[f64]>,
        v: &[f64],
        out: &mut [f64],
    ) -> Result<(), EvaluatorError>;

    /// Jacobian-vector product, or transposed product when `transpose`.
    fn jacobian_product(
        &mut self,
        x: &[f64],
        v: &[f64],
        out: &mut [f64],
        transpose: bool,
    ) -> Result<(), EvaluatorError>;

    /// Problem, variable and constraint names.
    fn names(
        &mut self,
        kind: ProblemKind,
        dims: Dimensions,
    ) -> Result<ProblemNames, EvaluatorError>;

    /// Native call counts and timings.
    fn report(&mut self, kind: ProblemKind) -> Result<NativeReport, EvaluatorError>;

    /// Run the native termination routine.
    fn terminate(&mut self, kind: ProblemKind) -> Result<(), EvaluatorError>;

    /// Release the loaded module. Further calls must fail.
    fn unload(&mut self);
}

/// A decode/build request for one problem.
#[derive(Debug, Clone, Copy)]
pub struct DecodeRequest<'a> {
    /// Resolved problem specification file.
    pub source: &'a Path,
    /// Problem base name.
    pub problem: &'a str,
    /// Arguments forwarded verbatim to the decoder.
    pub args: &'a [String],
    /// Forward decoder diagnostics.
    pub verbose: bool,
}

/// External toolchain that turns a problem file into a loaded evaluator.
pub trait Toolchain {
    /// Evaluator produced by [`Toolchain::load`].
    type Evaluator: Evaluator;

    /// Decode and build `request`, returning the produced artifacts.
    fn decode(&self, request: &DecodeRequest<'_>) -> Result<Artifacts, EvaluatorError>;

    /// Where previously built artifacts for `problem` live.
    fn artifacts(&self, problem: &str) -> Artifacts;

    /// Load the evaluator module named by `artifacts`.
    fn load(&self, artifacts: &Artifacts) -> Result<Self::Evaluator, EvaluatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_kind() {
        assert_eq!(ProblemKind::from_constraints(0), ProblemKind::Unconstrained);
        assert_eq!(ProblemKind::from_constraints(3), ProblemKind::Constrained);
        assert!(ProblemKind::Constrained.is_constrained());
        assert!(!ProblemKind::Unconstrained.is_constrained());
        assert_eq!(ProblemKind::Unconstrained.as_str(), "unconstrained");
        assert_eq!(
            Dimensions { nvar: 2, ncon: 0 }.kind(),
            ProblemKind::Unconstrained
        );
    }

    #[test]
    fn test_buffers_are_sized() {
        let vars = VariableBuffers::new(3);
        assert_eq!(vars.x.len(), 3);
        assert_eq!(vars.lower.len(), 3);
        assert_eq!(vars.upper.len(), 3);

        let cons = ConstraintBuffers::new(2);
        assert_eq!(cons.multipliers.len(), 2);
        assert_eq!(cons.equality, vec![false, false]);
        assert_eq!(cons.linear, vec![false, false]);
    }
}
