//! Model module: lifecycle of one decoded test problem.
//!
//! # Module Organization
//!
//! - [`error`]: Model error types
//! - [`resolve`]: Locating problem specification files
//! - [`setup`]: Creation sequence, bound sanitizing, Jacobian partition
//! - [`metadata`]: Sizing and ordering snapshot
//! - [`structure`]: Lazily cached sparsity patterns
//! - [`evaluate`]: Objective, constraint and derivative evaluation
//! - [`counters`]: Per-routine evaluation counters

mod counters;
mod error;
mod evaluate;
mod metadata;
mod resolve;
mod setup;
mod structure;

use std::sync::Arc;

use sifkit_evaluator::{Evaluator, EvaluatorError, ModelConfig, ProblemKind, Toolchain};

use crate::registry::{Lease, Registry};

pub use counters::Counters;
pub use error::ModelError;
pub use metadata::ModelMeta;
pub use resolve::{ResolvedProblem, SIF_EXTENSION, resolve_problem};
pub use setup::{INFINITE_BOUND, jacobian_partition, sanitize_bounds};
pub use structure::{Coordinates, LinearConstraints};

/// Reusable work buffers sized at creation.
#[derive(Debug, Clone)]
struct Scratch {
    gradient: Vec<f64>,
    constraints: Vec<f64>,
    jac_rows: Vec<usize>,
    jac_cols: Vec<usize>,
    hess_rows: Vec<usize>,
    hess_cols: Vec<usize>,
}

impl Scratch {
    fn new(meta: &ModelMeta) -> Self {
        Self {
            gradient: vec![0.0; meta.nvar],
            constraints: vec![0.0; meta.ncon],
            jac_rows: vec![0; meta.nnzj],
            jac_cols: vec![0; meta.nnzj],
            hess_rows: vec![0; meta.nnzh],
            hess_cols: vec![0; meta.nnzh],
        }
    }
}

/// A decoded, loaded and set-up test problem.
///
/// Holds the process-wide registry slot until [`CutestModel::finalize`] is
/// called or the model is dropped.
#[derive(Debug)]
pub struct CutestModel<E: Evaluator> {
    meta: ModelMeta,
    evaluator: E,
    structures: structure::StructureCache,
    counters: Counters,
    scratch: Scratch,
    lease: Option<Lease>,
}

impl<E: Evaluator> CutestModel<E> {
    /// Create a model for `name` in the process-wide registry.
    ///
    /// # Errors
    ///
    /// Fails with [`ModelError::AlreadyActive`] while another model is live,
    /// and with the matching error variant when any creation step fails.
    pub fn open<T>(name: &str, config: &ModelConfig, toolchain: &T) -> Result<Self, ModelError>
    where
        T: Toolchain<Evaluator = E>,
    {
        Self::open_in(name, config, toolchain, &Registry::global())
    }

    /// Create a model for `name` in an explicit registry.
    pub fn open_in<T>(
        name: &str,
        config: &ModelConfig,
        toolchain: &T,
        registry: &Arc<Registry>,
    ) -> Result<Self, ModelError>
    where
        T: Toolchain<Evaluator = E>,
    {
        let setup::Prepared {
            evaluator,
            meta,
            lease,
        } = setup::prepare(name, config, toolchain, registry)?;
        Ok(Self {
            structures: structure::StructureCache::new(&meta),
            scratch: Scratch::new(&meta),
            counters: Counters::default(),
            lease: Some(lease),
            evaluator,
            meta,
        })
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn kind(&self) -> ProblemKind {
        self.meta.kind()
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Counts of successful evaluations since creation or the last reset.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters.reset();
    }

    /// Whether the model still holds its registry slot.
    pub fn is_active(&self) -> bool {
        self.lease.is_some()
    }

    /// Terminate the evaluator, unload it and release the registry slot.
    ///
    /// Calling this again is a no-op. The slot is released even when the
    /// native termination fails; that failure is returned afterwards.
    pub fn finalize(&mut self) -> Result<(), ModelError> {
        let Some(mut lease) = self.lease.take() else {
            return Ok(());
        };
        let terminated = self.evaluator.terminate(self.meta.kind());
        self.evaluator.unload();
        self.structures.invalidate();
        lease.release();

        match terminated {
            Ok(()) => {
                tracing::debug!(
                    component = "model",
                    operation = "finalize",
                    status = "success",
                    problem = self.meta.name.as_str(),
                    evaluations = self.counters.sum(),
                    "Model finalized"
                );
                Ok(())
            }
            Err(err) => Err(evaluation_error(&self.meta.name, "finalize", err)),
        }
    }

    pub(crate) fn ensure_active(&self) -> Result<(), ModelError> {
        if self.lease.is_some() {
            Ok(())
        } else {
            Err(ModelError::Finalized)
        }
    }
}

impl<E: Evaluator> Drop for CutestModel<E> {
    fn drop(&mut self) {
        if let Err(err) = self.finalize() {
            tracing::warn!(
                component = "model",
                operation = "drop",
                status = "error",
                problem = self.meta.name.as_str(),
                error = %err,
                "Finalize failed while dropping model"
            );
        }
    }
}

/// Wrap a failed evaluator call on a live model.
pub(crate) fn evaluation_error(
    problem: &str,
    operation: &'static str,
    err: EvaluatorError,
) -> ModelError {
    tracing::debug!(
        component = "model",
        operation,
        status = "error",
        problem,
        error_code = err.code(),
        error = %err,
        "Evaluation failed"
    );
    ModelError::Evaluation(err)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    mod evaluation;
    mod lifecycle;
    mod structure_cache;
    mod support;
}
