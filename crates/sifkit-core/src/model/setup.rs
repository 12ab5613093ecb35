//! Model creation: resolve, decode, load, set up.

use std::path::Path;
use std::sync::Arc;

use sifkit_evaluator::{
    ConstraintBuffers, DecodeRequest, Evaluator, ModelConfig, ProblemKind, Toolchain,
    VariableBuffers,
};
use sifkit_tools::MeasurementRecorder;

use crate::model::error::ModelError;
use crate::model::metadata::{ModelMeta, SetupOutput, build_metadata};
use crate::model::resolve::resolve_problem;
use crate::registry::{Lease, Registry};

/// Bounds at or beyond this magnitude mean "unbounded".
pub const INFINITE_BOUND: f64 = 1e20;

/// Replace every bound with magnitude at least [`INFINITE_BOUND`] by signed
/// infinity. Smaller values are left untouched.
pub fn sanitize_bounds(values: &mut [f64]) {
    for value in values.iter_mut() {
        if value.abs() >= INFINITE_BOUND {
            *value = f64::INFINITY.copysign(*value);
        }
    }
}

/// Dense-block upper bounds on the Jacobian nonzeros of linear and
/// nonlinear rows.
///
/// Each estimate is capped by `nnzj`; their sum may exceed it.
pub fn jacobian_partition(nvar: usize, ncon: usize, nlin: usize, nnzj: usize) -> (usize, usize) {
    let nnln = ncon.saturating_sub(nlin);
    (
        nvar.saturating_mul(nlin).min(nnzj),
        nvar.saturating_mul(nnln).min(nnzj),
    )
}

/// Everything a new model owns once setup has succeeded.
pub(crate) struct Prepared<E> {
    pub evaluator: E,
    pub meta: ModelMeta,
    pub lease: Lease,
}

/// Run the full creation sequence for `name`.
///
/// The registry slot is claimed before any other work and released again
/// when any later step fails; no partial model is ever returned.
pub(crate) fn prepare<T: Toolchain>(
    name: &str,
    config: &ModelConfig,
    toolchain: &T,
    registry: &Arc<Registry>,
) -> Result<Prepared<T::Evaluator>, ModelError> {
    let label = Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name);
    let lease = registry.try_acquire(label)?;
    let mut recorder = MeasurementRecorder::new();

    let stage = recorder.begin_stage("resolve");
    let resolved = resolve_problem(name, &config.search_dir, config.repository.as_deref())?;
    recorder.end_stage(stage);

    let stage = recorder.begin_stage("decode");
    let artifacts = if config.decode {
        toolchain
            .decode(&DecodeRequest {
                source: &resolved.source,
                problem: &resolved.name,
                args: &config.decoder_args,
                verbose: config.verbose,
            })
            .map_err(ModelError::Build)?
    } else {
        let artifacts = toolchain.artifacts(&resolved.name);
        if let Some(missing) = artifacts.first_missing() {
            return Err(ModelError::ArtifactsMissing {
                path: missing.display().to_string(),
            });
        }
        artifacts
    };
    recorder.end_stage(stage);

    let stage = recorder.begin_stage("load");
    let mut evaluator = toolchain.load(&artifacts).map_err(ModelError::Setup)?;
    recorder.end_stage(stage);

    let stage = recorder.begin_stage("setup");
    evaluator
        .open_data_unit(&artifacts.data_unit)
        .map_err(ModelError::Setup)?;
    let result = run_setup(&mut evaluator, &resolved.name, config);
    let closed = evaluator.close_data_unit();
    let output = result?;
    closed.map_err(ModelError::Setup)?;
    recorder.end_stage(stage);

    let meta = build_metadata(output);

    for measurement in recorder.stages() {
        tracing::trace!(
            component = "model",
            operation = "create",
            status = "success",
            problem = meta.name.as_str(),
            stage = measurement.stage.as_str(),
            duration_ms = measurement.duration_ms,
            rss_delta_bytes = ?measurement.rss_delta_bytes(),
            "Creation stage finished"
        );
    }
    tracing::debug!(
        component = "model",
        operation = "create",
        status = "success",
        problem = meta.name.as_str(),
        nvar = meta.nvar,
        ncon = meta.ncon,
        nnzh = meta.nnzh,
        nnzj = meta.nnzj,
        nlin = meta.nlin,
        decoded = config.decode,
        duration_ms = recorder.total_duration_ms(),
        "Model created"
    );

    Ok(Prepared {
        evaluator,
        meta,
        lease,
    })
}

/// Dimension query, setup call, bound sanitizing and nonzero counts.
///
/// Runs while the data unit is open.
fn run_setup<E: Evaluator>(
    evaluator: &mut E,
    name: &str,
    config: &ModelConfig,
) -> Result<SetupOutput, ModelError> {
    let dims = evaluator.dimensions().map_err(ModelError::Setup)?;
    let kind = dims.kind();

    let mut variables = VariableBuffers::new(dims.nvar);
    let mut constraints = ConstraintBuffers::new(dims.ncon);
    match kind {
        ProblemKind::Unconstrained => evaluator.setup_unconstrained(&mut variables),
        ProblemKind::Constrained => {
            evaluator.setup_constrained(&mut variables, &mut constraints, config.ordering())
        }
    }
    .map_err(ModelError::Setup)?;

    sanitize_bounds(&mut variables.lower);
    sanitize_bounds(&mut variables.upper);
    sanitize_bounds(&mut constraints.lower);
    sanitize_bounds(&mut constraints.upper);

    let nnzh = evaluator.hessian_nnz(kind).map_err(ModelError::Setup)?;
    let nnzj = if kind.is_constrained() {
        // The native count includes the dense objective gradient row.
        evaluator
            .jacobian_nnz()
            .map_err(ModelError::Setup)?
            .saturating_sub(dims.nvar)
    } else {
        0
    };

    let nlin = constraints.linear.iter().filter(|linear| **linear).count();
    let (lin_nnzj, nln_nnzj) = jacobian_partition(dims.nvar, dims.ncon, nlin, nnzj);

    tracing::trace!(
        component = "model",
        operation = "setup",
        status = "success",
        problem = name,
        kind = kind.as_str(),
        nvar = dims.nvar,
        ncon = dims.ncon,
        nnzh,
        nnzj,
        lin_nnzj,
        nln_nnzj,
        "Native setup finished"
    );

    Ok(SetupOutput {
        name: name.to_string(),
        variables,
        constraints,
        nnzh,
        nnzj,
        lin_nnzj,
        nln_nnzj,
    })
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_bounds() {
        let mut values = [1e20, -1e20, 2e25, -3e30, 9.99e19, -5.0, 0.0, 1e19];
        sanitize_bounds(&mut values);
        assert_eq!(values[0], f64::INFINITY);
        assert_eq!(values[1], f64::NEG_INFINITY);
        assert_eq!(values[2], f64::INFINITY);
        assert_eq!(values[3], f64::NEG_INFINITY);
        assert_eq!(values[4], 9.99e19);
        assert_eq!(values[5], -5.0);
        assert_eq!(values[6], 0.0);
        assert_eq!(values[7], 1e19);
    }

    #[test]
    fn test_sanitize_keeps_infinities() {
        let mut values = [f64::INFINITY, f64::NEG_INFINITY];
        sanitize_bounds(&mut values);
        assert_eq!(values, [f64::INFINITY, f64::NEG_INFINITY]);
    }

    #[test]
    fn test_jacobian_partition_bounds() {
        // Dense rows: each block fits.
        assert_eq!(jacobian_partition(4, 3, 1, 12), (4, 8));
        // Sparse rows: both estimates capped by nnzj.
        assert_eq!(jacobian_partition(10, 5, 2, 7), (7, 7));
        // No linear constraints.
        assert_eq!(jacobian_partition(3, 2, 0, 6), (0, 6));
        // Unconstrained.
        assert_eq!(jacobian_partition(3, 0, 0, 0), (0, 0));

        for (nvar, ncon, nlin, nnzj) in [(5, 4, 2, 9), (1, 3, 3, 3), (8, 2, 1, 11)] {
            let (lin, nln) = jacobian_partition(nvar, ncon, nlin, nnzj);
            assert!(lin <= nnzj && lin <= nvar * nlin);
            assert!(nln <= nnzj && nln <= nvar * (ncon - nlin));
        }
    }
}
