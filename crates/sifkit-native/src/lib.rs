//! Native bridge to CUTEst evaluator modules.
//!
//! [`SifToolchain`] decodes a SIF file with `sifdecoder`, links the decoded
//! sources against the CUTEst archive into a shared library and loads it as
//! a [`NativeEvaluator`].

pub mod bridge;
pub mod decoder;
pub mod env;
pub mod ffi;

pub use bridge::NativeEvaluator;
pub use decoder::{DECODED_DATA_UNIT, DECODED_SOURCES, SifToolchain, link_args};
pub use env::ToolchainEnv;
pub use ffi::CutestLibrary;

use sifkit_core::{CutestModel, ModelError};
use sifkit_evaluator::ModelConfig;

/// A model backed by the native evaluator.
pub type NativeModel = CutestModel<NativeEvaluator>;

/// Open `name` with a toolchain configured from the environment.
pub fn open_model(name: &str, config: &ModelConfig) -> Result<NativeModel, ModelError> {
    CutestModel::open(name, config, &SifToolchain::from_env())
}
