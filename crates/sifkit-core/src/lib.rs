//! sifkit core: lifecycle of decoded optimization test problems.
//!
//! A [`CutestModel`] owns one loaded evaluator module, the sizing metadata
//! read at setup, lazily cached sparsity patterns and evaluation counters.
//! The [`Registry`] keeps at most one model alive per process.

pub mod classify;
pub mod model;
pub mod registry;

pub use classify::{Classification, ProblemFilter, select_problems};
pub use model::{
    Coordinates, Counters, CutestModel, LinearConstraints, ModelError, ModelMeta,
    ResolvedProblem, jacobian_partition, resolve_problem, sanitize_bounds,
};
pub use registry::{Lease, Registry};
