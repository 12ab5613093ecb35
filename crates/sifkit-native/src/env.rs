//! Toolchain locations read from the environment.

use std::path::{Path, PathBuf};

/// Root of the SIF decoder installation.
pub const SIFDECODE_ENV: &str = "SIFDECODE";
/// Root of the CUTEst installation.
pub const CUTEST_ENV: &str = "CUTEST";
/// Architecture directory name under `objects/`.
pub const MYARCH_ENV: &str = "MYARCH";
/// Fortran compiler override.
pub const COMPILER_ENV: &str = "SIFKIT_FC";
/// Directory receiving decoded artifacts.
pub const ARTIFACT_DIR_ENV: &str = "SIFKIT_ARTIFACT_DIR";

/// Compiler used when [`COMPILER_ENV`] is unset.
pub const DEFAULT_COMPILER: &str = "gfortran";

/// Where the decoder, the CUTEst objects and the compiler live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainEnv {
    pub sifdecode: Option<PathBuf>,
    pub cutest: Option<PathBuf>,
    pub myarch: Option<String>,
    pub compiler: String,
    pub artifact_dir: PathBuf,
}

impl Default for ToolchainEnv {
    fn default() -> Self {
        Self {
            sifdecode: None,
            cutest: None,
            myarch: None,
            compiler: DEFAULT_COMPILER.to_string(),
            artifact_dir: PathBuf::from("."),
        }
    }
}

impl ToolchainEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every location from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();
        Self {
            sifdecode: read(SIFDECODE_ENV).map(PathBuf::from),
            cutest: read(CUTEST_ENV).map(PathBuf::from),
            myarch: read(MYARCH_ENV),
            compiler: read(COMPILER_ENV).unwrap_or(defaults.compiler),
            artifact_dir: read(ARTIFACT_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
        }
    }

    pub fn with_sifdecode(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sifdecode = Some(dir.into());
        self
    }

    pub fn with_cutest(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cutest = Some(dir.into());
        self
    }

    pub fn with_myarch(mut self, arch: impl Into<String>) -> Self {
        self.myarch = Some(arch.into());
        self
    }

    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = compiler.into();
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// The decoder executable; falls back to `sifdecoder` on `PATH`.
    pub fn decoder(&self) -> PathBuf {
        match &self.sifdecode {
            Some(root) => root.join("bin").join("sifdecoder"),
            None => PathBuf::from("sifdecoder"),
        }
    }

    /// The double precision CUTEst archive, when both roots are known.
    pub fn cutest_archive(&self) -> Option<PathBuf> {
        let root = self.cutest.as_deref()?;
        let arch = self.myarch.as_deref()?;
        Some(archive_path(root, arch))
    }

    /// Whether enough is configured to decode and build problems.
    pub fn is_configured(&self) -> bool {
        self.cutest_archive().is_some()
    }
}

fn archive_path(root: &Path, arch: &str) -> PathBuf {
    root.join("objects")
        .join(arch)
        .join("double")
        .join("libcutest.a")
}
