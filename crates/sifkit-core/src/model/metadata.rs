//! Sizing and ordering metadata of a set-up model.

use serde::Serialize;
use sifkit_evaluator::{ConstraintBuffers, ProblemKind, VariableBuffers};

/// Snapshot of problem sizes, bounds, starting values and constraint layout.
///
/// Constraint arrays are in the order chosen at setup time (for example
/// equalities first); `lin`, `nln` and `eq` index into that order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMeta {
    pub name: String,
    pub nvar: usize,
    pub ncon: usize,
    pub x0: Vec<f64>,
    pub lvar: Vec<f64>,
    pub uvar: Vec<f64>,
    pub y0: Vec<f64>,
    pub lcon: Vec<f64>,
    pub ucon: Vec<f64>,
    pub equality: Vec<bool>,
    pub linear: Vec<bool>,
    /// Nonzeros of the constraint Jacobian (objective gradient excluded).
    pub nnzj: usize,
    /// Nonzeros of the Lagrangian Hessian (one triangle).
    pub nnzh: usize,
    /// Dense-block upper bound on Jacobian nonzeros in linear rows.
    pub lin_nnzj: usize,
    /// Dense-block upper bound on Jacobian nonzeros in nonlinear rows.
    pub nln_nnzj: usize,
    pub lin: Vec<usize>,
    pub nlin: usize,
    pub nln: Vec<usize>,
    pub nnln: usize,
    pub eq: Vec<usize>,
}

impl ModelMeta {
    pub fn kind(&self) -> ProblemKind {
        ProblemKind::from_constraints(self.ncon)
    }

    /// Check if any variable has a finite bound.
    pub fn has_bounds(&self) -> bool {
        self.lvar.iter().any(|v| v.is_finite()) || self.uvar.iter().any(|v| v.is_finite())
    }
}

/// Raw results of the setup sequence, before indexing.
#[derive(Debug, Clone)]
pub(crate) struct SetupOutput {
    pub name: String,
    pub variables: VariableBuffers,
    pub constraints: ConstraintBuffers,
    pub nnzh: usize,
    pub nnzj: usize,
    pub lin_nnzj: usize,
    pub nln_nnzj: usize,
}

/// Assemble the metadata snapshot. No native calls.
pub(crate) fn build_metadata(output: SetupOutput) -> ModelMeta {
    let SetupOutput {
        name,
        variables,
        constraints,
        nnzh,
        nnzj,
        lin_nnzj,
        nln_nnzj,
    } = output;

    let lin = flagged(&constraints.linear, true);
    let nln = flagged(&constraints.linear, false);
    let eq = flagged(&constraints.equality, true);

    ModelMeta {
        name,
        nvar: variables.x.len(),
        ncon: constraints.lower.len(),
        x0: variables.x,
        lvar: variables.lower,
        uvar: variables.upper,
        y0: constraints.multipliers,
        lcon: constraints.lower,
        ucon: constraints.upper,
        equality: constraints.equality,
        linear: constraints.linear,
        nnzj,
        nnzh,
        lin_nnzj,
        nln_nnzj,
        nlin: lin.len(),
        lin,
        nnln: nln.len(),
        nln,
        eq,
    }
}

fn flagged(flags: &[bool], wanted: bool) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(index, flag)| (*flag == wanted).then_some(index))
        .collect()
}
