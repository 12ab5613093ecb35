//! Evaluator bridge abstractions for sifkit.
//!
//! This crate defines the contract between the model lifecycle layer
//! (`sifkit-core`) and a native evaluator implementation (`sifkit-native`).
//!
//! # Overview
//!
//! - [`ModelConfig`]: Options for decoding and setting up a problem
//! - [`NativeStatus`]: Translation of native integer status codes
//! - [`EvaluatorError`]: Error types for bridge and toolchain operations
//! - [`Evaluator`]: Semantic operations of a loaded evaluator module
//! - [`Toolchain`]: Decode, build and load a problem
//! - [`Artifacts`]: Deterministic names of built artifacts

mod artifacts;
mod config;
mod error;
mod status;
mod traits;

pub use artifacts::{
    Artifacts, DATA_UNIT_PREFIX, DATA_UNIT_SUFFIX, data_unit_file_name, library_file_name,
};
pub use config::{ModelConfig, Ordering, REPOSITORY_ENV};
pub use error::EvaluatorError;
pub use status::NativeStatus;
pub use traits::{
    ConstraintBuffers, DecodeRequest, Dimensions, Evaluator, NativeReport, ProblemKind,
    ProblemNames, Toolchain, VariableBuffers,
};
