//! Decode a problem file and build its evaluator module.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use sifkit_evaluator::{Artifacts, DecodeRequest, EvaluatorError, Toolchain};

use crate::bridge::NativeEvaluator;
use crate::env::{MYARCH_ENV, SIFDECODE_ENV, ToolchainEnv};

/// Fortran sources written by the decoder; only those present are compiled.
pub const DECODED_SOURCES: [&str; 4] = ["ELFUN.f", "EXTER.f", "GROUP.f", "RANGE.f"];
/// Data unit name written by the decoder before renaming.
pub const DECODED_DATA_UNIT: &str = "OUTSDIF.d";

/// Toolchain that shells out to `sifdecoder` and a Fortran compiler.
#[derive(Debug, Clone, Default)]
pub struct SifToolchain {
    env: ToolchainEnv,
}

impl SifToolchain {
    pub fn new(env: ToolchainEnv) -> Self {
        Self { env }
    }

    pub fn from_env() -> Self {
        Self::new(ToolchainEnv::from_env())
    }

    pub fn env(&self) -> &ToolchainEnv {
        &self.env
    }

    fn run(
        &self,
        stage: &'static str,
        command: &mut Command,
        verbose: bool,
    ) -> Result<(), EvaluatorError> {
        tracing::debug!(
            component = "decoder",
            operation = stage,
            command = ?command,
            "Running external command"
        );
        if verbose {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        let output: Output = command.output().map_err(|err| EvaluatorError::Build {
            stage,
            detail: format!("cannot run {:?}: {}", command.get_program(), err),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = match stderr.trim() {
                "" => format!("{} ({})", stdout.trim(), output.status),
                stderr => format!("{} ({})", stderr, output.status),
            };
            return Err(EvaluatorError::Build { stage, detail });
        }
        Ok(())
    }
}

/// Arguments that link the decoded sources against the CUTEst archive.
pub fn link_args(archive: &Path, library: &Path, sources: &[PathBuf]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-shared".into(),
        "-fPIC".into(),
        "-o".into(),
        library.as_os_str().to_owned(),
    ];
    args.extend(sources.iter().map(|source| source.as_os_str().to_owned()));
    if cfg!(target_os = "macos") {
        let mut load = OsString::from("-Wl,-force_load,");
        load.push(archive.as_os_str());
        args.push(load);
    } else {
        args.push("-Wl,--whole-archive".into());
        args.push(archive.as_os_str().to_owned());
        args.push("-Wl,--no-whole-archive".into());
    }
    args
}

fn io_error(path: &Path, err: std::io::Error) -> EvaluatorError {
    EvaluatorError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

impl Toolchain for SifToolchain {
    type Evaluator = NativeEvaluator;

    fn decode(&self, request: &DecodeRequest<'_>) -> Result<Artifacts, EvaluatorError> {
        let archive = self
            .env
            .cutest_archive()
            .ok_or_else(|| EvaluatorError::Build {
                stage: "configure",
                detail: "CUTEST and MYARCH must be set".to_string(),
            })?;
        if !archive.is_file() {
            return Err(EvaluatorError::Build {
                stage: "configure",
                detail: format!("{} not found", archive.display()),
            });
        }

        let dir = &self.env.artifact_dir;
        fs::create_dir_all(dir).map_err(|err| io_error(dir, err))?;
        let artifacts = Artifacts::in_dir(dir, request.problem);

        let mut decoder = Command::new(self.env.decoder());
        decoder
            .args(request.args)
            .arg(request.source)
            .current_dir(dir);
        if let Some(root) = &self.env.sifdecode {
            decoder.env(SIFDECODE_ENV, root);
        }
        if let Some(arch) = &self.env.myarch {
            decoder.env(MYARCH_ENV, arch);
        }
        self.run("sifdecoder", &mut decoder, request.verbose)?;

        let sources: Vec<PathBuf> = DECODED_SOURCES
            .iter()
            .map(|name| dir.join(name))
            .filter(|path| path.is_file())
            .collect();
        if sources.is_empty() {
            return Err(EvaluatorError::Build {
                stage: "sifdecoder",
                detail: format!("no decoded sources in {}", dir.display()),
            });
        }

        let mut compiler = Command::new(&self.env.compiler);
        compiler
            .args(link_args(&archive, &artifacts.library, &sources))
            .current_dir(dir);
        self.run("compile", &mut compiler, request.verbose)?;

        let decoded = dir.join(DECODED_DATA_UNIT);
        fs::rename(&decoded, &artifacts.data_unit).map_err(|err| io_error(&decoded, err))?;

        tracing::debug!(
            component = "decoder",
            operation = "decode",
            status = "success",
            problem = request.problem,
            library = %artifacts.library.display(),
            "Built evaluator module"
        );
        Ok(artifacts)
    }

    fn artifacts(&self, problem: &str) -> Artifacts {
        Artifacts::in_dir(&self.env.artifact_dir, problem)
    }

    fn load(&self, artifacts: &Artifacts) -> Result<NativeEvaluator, EvaluatorError> {
        NativeEvaluator::load(&artifacts.library)
    }
}
