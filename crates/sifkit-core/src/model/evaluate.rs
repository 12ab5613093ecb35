//! Evaluation entry points of a live model.
//!
//! Every call checks buffer lengths, forwards to the evaluator and bumps its
//! counter only when the evaluator reports success. A failed evaluation
//! leaves the model usable.

use sifkit_evaluator::{Dimensions, Evaluator, NativeReport, ProblemNames};

use crate::model::error::ModelError;
use crate::model::{CutestModel, evaluation_error};

fn check_len(operation: &'static str, expected: usize, got: usize) -> Result<(), ModelError> {
    if expected == got {
        Ok(())
    } else {
        Err(ModelError::DimensionMismatch {
            operation,
            expected,
            got,
        })
    }
}

impl<E: Evaluator> CutestModel<E> {
    /// Objective value at `x`.
    pub fn obj(&mut self, x: &[f64]) -> Result<f64, ModelError> {
        self.ensure_active()?;
        check_len("obj", self.meta.nvar, x.len())?;
        let f = self
            .evaluator
            .objective(self.meta.kind(), x)
            .map_err(|err| evaluation_error(&self.meta.name, "obj", err))?;
        self.counters.neval_obj += 1;
        tracing::trace!(
            component = "model",
            operation = "obj",
            status = "success",
            f,
            "Evaluated objective"
        );
        Ok(f)
    }

    /// Objective gradient at `x` into `g`.
    pub fn grad(&mut self, x: &[f64], g: &mut [f64]) -> Result<(), ModelError> {
        self.ensure_active()?;
        check_len("grad", self.meta.nvar, x.len())?;
        check_len("grad", self.meta.nvar, g.len())?;
        self.evaluator
            .gradient(self.meta.kind(), x, g)
            .map_err(|err| evaluation_error(&self.meta.name, "grad", err))?;
        self.counters.neval_grad += 1;
        tracing::trace!(
            component = "model",
            operation = "grad",
            status = "success",
            "Evaluated gradient"
        );
        Ok(())
    }

    /// Objective value and gradient at `x` in one evaluator call.
    pub fn objgrad(&mut self, x: &[f64], g: &mut [f64]) -> Result<f64, ModelError> {
        self.ensure_active()?;
        check_len("objgrad", self.meta.nvar, x.len())?;
        check_len("objgrad", self.meta.nvar, g.len())?;
        let f = self
            .evaluator
            .objective_gradient(self.meta.kind(), x, g)
            .map_err(|err| evaluation_error(&self.meta.name, "objgrad", err))?;
        self.counters.neval_obj += 1;
        self.counters.neval_grad += 1;
        tracing::trace!(
            component = "model",
            operation = "objgrad",
            status = "success",
            f,
            "Evaluated objective and gradient"
        );
        Ok(f)
    }

    /// Constraint values at `x` into `c`.
    pub fn cons(&mut self, x: &[f64], c: &mut [f64]) -> Result<(), ModelError> {
        self.ensure_active()?;
        check_len("cons", self.meta.nvar, x.len())?;
        check_len("cons", self.meta.ncon, c.len())?;
        if self.meta.ncon == 0 {
            return Ok(());
        }
        self.evaluator
            .constraints(x, c)
            .map_err(|err| evaluation_error(&self.meta.name, "cons", err))?;
        self.counters.neval_cons += 1;
        tracing::trace!(
            component = "model",
            operation = "cons",
            status = "success",
            "Evaluated constraints"
        );
        Ok(())
    }

    /// Constraint Jacobian values at `x`, in the order of
    /// [`CutestModel::jac_structure`].
    pub fn jac_coord(&mut self, x: &[f64], vals: &mut [f64]) -> Result<(), ModelError> {
        self.ensure_active()?;
        check_len("jac_coord", self.meta.nvar, x.len())?;
        check_len("jac_coord", self.meta.nnzj, vals.len())?;
        if self.meta.ncon == 0 {
            return Ok(());
        }
        let scratch = &mut self.scratch;
        self.evaluator
            .sparse_jacobian(
                x,
                &mut scratch.constraints,
                vals,
                &mut scratch.jac_rows,
                &mut scratch.jac_cols,
            )
            .map_err(|err| evaluation_error(&self.meta.name, "jac_coord", err))?;
        self.counters.neval_jac += 1;
        tracing::trace!(
            component = "model",
            operation = "jac_coord",
            status = "success",
            nnz = vals.len(),
            "Evaluated Jacobian"
        );
        Ok(())
    }

    /// Value and dense gradient of constraint `index` at `x`.
    ///
    /// The gradient lives in a scratch buffer overwritten by the next call.
    pub fn jth_con_grad(&mut self, index: usize, x: &[f64]) -> Result<(f64, &[f64]), ModelError> {
        self.ensure_active()?;
        check_len("jth_con_grad", self.meta.nvar, x.len())?;
        if index >= self.meta.ncon {
            return Err(ModelError::IndexOutOfRange {
                index,
                len: self.meta.ncon,
            });
        }
        let value = self
            .evaluator
            .constraint_gradient(index, x, &mut self.scratch.gradient)
            .map_err(|err| evaluation_error(&self.meta.name, "jth_con_grad", err))?;
        self.counters.neval_jcon += 1;
        self.counters.neval_jgrad += 1;
        tracing::trace!(
            component = "model",
            operation = "jth_con_grad",
            status = "success",
            index,
            value,
            "Evaluated constraint gradient"
        );
        Ok((value, self.scratch.gradient.as_slice()))
    }

    /// Hessian values at `x` in the order of [`CutestModel::hess_structure`].
    ///
    /// With `y` the Lagrangian Hessian `∇²f + Σ yᵢ ∇²cᵢ` is returned,
    /// otherwise the objective Hessian.
    pub fn hess_coord(
        &mut self,
        x: &[f64],
        y: Option<&[f64]>,
        vals: &mut [f64],
    ) -> Result<(), ModelError> {
        self.ensure_active()?;
        check_len("hess_coord", self.meta.nvar, x.len())?;
        check_len("hess_coord", self.meta.nnzh, vals.len())?;
        if let Some(y) = y {
            check_len("hess_coord", self.meta.ncon, y.len())?;
        }
        let scratch = &mut self.scratch;
        self.evaluator
            .hessian_values(
                self.meta.kind(),
                x,
                y,
                vals,
                &mut scratch.hess_rows,
                &mut scratch.hess_cols,
            )
            .map_err(|err| evaluation_error(&self.meta.name, "hess_coord", err))?;
        self.counters.neval_hess += 1;
        tracing::trace!(
            component = "model",
            operation = "hess_coord",
            status = "success",
            lagrangian = y.is_some(),
            "Evaluated Hessian"
        );
        Ok(())
    }

    /// Hessian-vector product `H v` into `hv`.
    pub fn hprod(
        &mut self,
        x: &[f64],
        y: Option<&[f64]>,
        v: &[f64],
        hv: &mut [f64],
    ) -> Result<(), ModelError> {
        self.ensure_active()?;
        check_len("hprod", self.meta.nvar, x.len())?;
        check_len("hprod", self.meta.nvar, v.len())?;
        check_len("hprod", self.meta.nvar, hv.len())?;
        if let Some(y) = y {
            check_len("hprod", self.meta.ncon, y.len())?;
        }
        self.evaluator
            .hessian_product(self.meta.kind(), x, y, v, hv)
            .map_err(|err| evaluation_error(&self.meta.name, "hprod", err))?;
        self.counters.neval_hprod += 1;
        tracing::trace!(
            component = "model",
            operation = "hprod",
            status = "success",
            lagrangian = y.is_some(),
            "Evaluated Hessian product"
        );
        Ok(())
    }

    /// Jacobian-vector product `J v` into `jv`.
    pub fn jprod(&mut self, x: &[f64], v: &[f64], jv: &mut [f64]) -> Result<(), ModelError> {
        self.ensure_active()?;
        check_len("jprod", self.meta.nvar, x.len())?;
        check_len("jprod", self.meta.nvar, v.len())?;
        check_len("jprod", self.meta.ncon, jv.len())?;
        if self.meta.ncon == 0 {
            return Ok(());
        }
        self.evaluator
            .jacobian_product(x, v, jv, false)
            .map_err(|err| evaluation_error(&self.meta.name, "jprod", err))?;
        self.counters.neval_jprod += 1;
        tracing::trace!(
            component = "model",
            operation = "jprod",
            status = "success",
            "Evaluated Jacobian product"
        );
        Ok(())
    }

    /// Transposed Jacobian-vector product `Jᵀ v` into `jtv`.
    pub fn jtprod(&mut self, x: &[f64], v: &[f64], jtv: &mut [f64]) -> Result<(), ModelError> {
        self.ensure_active()?;
        check_len("jtprod", self.meta.nvar, x.len())?;
        check_len("jtprod", self.meta.ncon, v.len())?;
        check_len("jtprod", self.meta.nvar, jtv.len())?;
        if self.meta.ncon == 0 {
            jtv.iter_mut().for_each(|value| *value = 0.0);
            return Ok(());
        }
        self.evaluator
            .jacobian_product(x, v, jtv, true)
            .map_err(|err| evaluation_error(&self.meta.name, "jtprod", err))?;
        self.counters.neval_jtprod += 1;
        tracing::trace!(
            component = "model",
            operation = "jtprod",
            status = "success",
            "Evaluated transposed Jacobian product"
        );
        Ok(())
    }

    /// Problem, variable and constraint names in setup order.
    pub fn names(&mut self) -> Result<ProblemNames, ModelError> {
        self.ensure_active()?;
        let dims = Dimensions {
            nvar: self.meta.nvar,
            ncon: self.meta.ncon,
        };
        self.evaluator
            .names(self.meta.kind(), dims)
            .map_err(|err| evaluation_error(&self.meta.name, "names", err))
    }

    /// Call counts and timings kept by the evaluator. Counters are not reset.
    pub fn report(&mut self) -> Result<NativeReport, ModelError> {
        self.ensure_active()?;
        self.evaluator
            .report(self.meta.kind())
            .map_err(|err| evaluation_error(&self.meta.name, "report", err))
    }
}
