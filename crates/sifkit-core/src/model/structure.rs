//! Lazily filled sparsity patterns.
//!
//! Structures depend only on the problem, not on the evaluation point, so
//! each one is queried from the evaluator at most once and then served from
//! its buffer until [`CutestModel::invalidate_structures`] is called.

use serde::Serialize;
use sifkit_evaluator::Evaluator;

use crate::model::error::ModelError;
use crate::model::metadata::ModelMeta;
use crate::model::{CutestModel, evaluation_error};

/// Coordinate list of a sparse matrix pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Coordinates {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

impl Coordinates {
    fn with_len(len: usize) -> Self {
        Self {
            rows: vec![0; len],
            cols: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Constant Jacobian block of the linear constraints.
///
/// Row `k` refers to constraint `meta.lin[k]`. For every linear
/// constraint `A x - rhs` equals its value at `x`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LinearConstraints {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub vals: Vec<f64>,
    pub rhs: Vec<f64>,
}

impl LinearConstraints {
    pub fn nnz(&self) -> usize {
        self.vals.len()
    }

    /// Accumulate `A x` into `out` (length `nlin`).
    pub fn product(&self, x: &[f64], out: &mut [f64]) {
        out.iter_mut().for_each(|value| *value = 0.0);
        for ((&row, &col), &val) in self.rows.iter().zip(&self.cols).zip(&self.vals) {
            if let (Some(slot), Some(xj)) = (out.get_mut(row), x.get(col)) {
                *slot += val * xj;
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Slot<T> {
    buffer: T,
    reliable: bool,
}

impl<T> Slot<T> {
    fn get_or_fill<F>(&mut self, fill: F) -> Result<&T, ModelError>
    where
        F: FnOnce(&mut T) -> Result<(), ModelError>,
    {
        if !self.reliable {
            fill(&mut self.buffer)?;
            self.reliable = true;
        }
        Ok(&self.buffer)
    }
}

/// The three structure buffers of a model with their reliable flags.
#[derive(Debug, Clone, Default)]
pub(crate) struct StructureCache {
    hessian: Slot<Coordinates>,
    jacobian: Slot<Coordinates>,
    linear: Slot<LinearConstraints>,
}

impl StructureCache {
    pub(crate) fn new(meta: &ModelMeta) -> Self {
        Self {
            hessian: Slot {
                buffer: Coordinates::with_len(meta.nnzh),
                reliable: false,
            },
            jacobian: Slot {
                buffer: Coordinates::with_len(meta.nnzj),
                reliable: false,
            },
            linear: Slot::default(),
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.hessian.reliable = false;
        self.jacobian.reliable = false;
        self.linear.reliable = false;
    }
}

impl<E: Evaluator> CutestModel<E> {
    /// Hessian sparsity pattern (one triangle), `nnzh` entries.
    pub fn hess_structure(&mut self) -> Result<&Coordinates, ModelError> {
        self.ensure_active()?;
        let kind = self.meta.kind();
        let nnzh = self.meta.nnzh;
        let problem = self.meta.name.as_str();
        let evaluator = &mut self.evaluator;
        self.structures.hessian.get_or_fill(|coords| {
            coords.rows.resize(nnzh, 0);
            coords.cols.resize(nnzh, 0);
            let written = evaluator
                .hessian_structure(kind, &mut coords.rows, &mut coords.cols)
                .map_err(|err| evaluation_error(problem, "hess_structure", err))?;
            coords.rows.truncate(written);
            coords.cols.truncate(written);
            tracing::debug!(
                component = "structure",
                operation = "hess_structure",
                status = "success",
                problem,
                nnz = written,
                "Filled Hessian structure"
            );
            Ok(())
        })
    }

    /// Constraint Jacobian sparsity pattern, `nnzj` entries.
    ///
    /// Empty for unconstrained problems, without a native query.
    pub fn jac_structure(&mut self) -> Result<&Coordinates, ModelError> {
        self.ensure_active()?;
        let constrained = self.meta.kind().is_constrained();
        let nnzj = self.meta.nnzj;
        let problem = self.meta.name.as_str();
        let evaluator = &mut self.evaluator;
        self.structures.jacobian.get_or_fill(|coords| {
            coords.rows.resize(nnzj, 0);
            coords.cols.resize(nnzj, 0);
            let written = if constrained {
                evaluator
                    .jacobian_structure(&mut coords.rows, &mut coords.cols)
                    .map_err(|err| evaluation_error(problem, "jac_structure", err))?
            } else {
                0
            };
            coords.rows.truncate(written);
            coords.cols.truncate(written);
            tracing::debug!(
                component = "structure",
                operation = "jac_structure",
                status = "success",
                problem,
                nnz = written,
                "Filled Jacobian structure"
            );
            Ok(())
        })
    }

    /// Coordinate triple and right-hand side of the linear constraints.
    ///
    /// Filled by one constraint and Jacobian evaluation at the origin.
    pub fn linear_structure(&mut self) -> Result<&LinearConstraints, ModelError> {
        self.ensure_active()?;
        let meta = &self.meta;
        let evaluator = &mut self.evaluator;
        self.structures.linear.get_or_fill(|linear| {
            *linear = LinearConstraints {
                rows: Vec::with_capacity(meta.lin_nnzj),
                cols: Vec::with_capacity(meta.lin_nnzj),
                vals: Vec::with_capacity(meta.lin_nnzj),
                rhs: vec![0.0; meta.nlin],
            };
            if meta.nlin == 0 {
                return Ok(());
            }

            let x = vec![0.0; meta.nvar];
            let mut c = vec![0.0; meta.ncon];
            let mut vals = vec![0.0; meta.nnzj];
            let mut rows = vec![0; meta.nnzj];
            let mut cols = vec![0; meta.nnzj];
            let written = evaluator
                .sparse_jacobian(&x, &mut c, &mut vals, &mut rows, &mut cols)
                .map_err(|err| evaluation_error(&meta.name, "linear_structure", err))?;

            let mut position = vec![None; meta.ncon];
            for (k, &index) in meta.lin.iter().enumerate() {
                position[index] = Some(k);
                linear.rhs[k] = -c[index];
            }
            for entry in 0..written.min(vals.len()) {
                if let Some(&Some(k)) = position.get(rows[entry]) {
                    linear.rows.push(k);
                    linear.cols.push(cols[entry]);
                    linear.vals.push(vals[entry]);
                }
            }
            tracing::debug!(
                component = "structure",
                operation = "linear_structure",
                status = "success",
                problem = meta.name.as_str(),
                nlin = meta.nlin,
                nnz = linear.vals.len(),
                capacity = meta.lin_nnzj,
                "Filled linear constraint structure"
            );
            Ok(())
        })
    }

    pub fn is_hess_structure_reliable(&self) -> bool {
        self.structures.hessian.reliable
    }

    pub fn is_jac_structure_reliable(&self) -> bool {
        self.structures.jacobian.reliable
    }

    pub fn is_linear_structure_reliable(&self) -> bool {
        self.structures.linear.reliable
    }

    /// Mark every structure stale so the next request queries again.
    pub fn invalidate_structures(&mut self) {
        self.structures.invalidate();
    }
}
