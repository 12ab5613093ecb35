//! Model creation configuration.

use std::path::PathBuf;

/// Environment variable naming the SIF problem repository.
pub const REPOSITORY_ENV: &str = "MASTSIF";

/// Options controlling how a problem is decoded and set up.
///
/// Defaults match the usual solver-facing layout: decode on every creation,
/// equality constraints first, linear constraints first and nonlinear
/// variables first.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Run the external decoder/builder instead of reusing existing artifacts.
    pub decode: bool,
    /// Forward decoder diagnostics to the console.
    pub verbose: bool,
    /// Permute equality constraints before inequality constraints.
    pub equalities_first: bool,
    /// Permute linear constraints before nonlinear constraints.
    pub linear_first: bool,
    /// Permute variables that appear only linearly after nonlinear variables.
    pub nonlinear_variables_first: bool,
    /// Extra arguments forwarded verbatim to the decoder (e.g. `-param N=10`).
    pub decoder_args: Vec<String>,
    /// Directory searched first for the problem file.
    pub search_dir: PathBuf,
    /// Problem repository root searched when the file is not found locally.
    pub repository: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            decode: true,
            verbose: false,
            equalities_first: true,
            linear_first: true,
            nonlinear_variables_first: true,
            decoder_args: Vec::new(),
            search_dir: PathBuf::from("."),
            repository: None,
        }
    }
}

impl ModelConfig {
    /// Create a new configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration whose repository is read from `MASTSIF`.
    pub fn from_env() -> Self {
        let repository = std::env::var_os(REPOSITORY_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self {
            repository,
            ..Self::default()
        }
    }

    /// Run or skip the decode/build step.
    pub fn with_decode(mut self, decode: bool) -> Self {
        self.decode = decode;
        self
    }

    /// Enable or disable decoder diagnostics.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Order equality constraints first.
    pub fn with_equalities_first(mut self, enabled: bool) -> Self {
        self.equalities_first = enabled;
        self
    }

    /// Order linear constraints first.
    pub fn with_linear_first(mut self, enabled: bool) -> Self {
        self.linear_first = enabled;
        self
    }

    /// Order nonlinear variables first.
    pub fn with_nonlinear_variables_first(mut self, enabled: bool) -> Self {
        self.nonlinear_variables_first = enabled;
        self
    }

    /// Set the arguments forwarded to the decoder.
    pub fn with_decoder_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.decoder_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the directory searched first for problem files.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = dir.into();
        self
    }

    /// Set the problem repository root.
    pub fn with_repository(mut self, dir: impl Into<PathBuf>) -> Self {
        self.repository = Some(dir.into());
        self
    }

    /// The ordering toggles passed to constrained setup.
    pub fn ordering(&self) -> Ordering {
        Ordering {
            equalities_first: self.equalities_first,
            linear_first: self.linear_first,
            nonlinear_variables_first: self.nonlinear_variables_first,
        }
    }
}

/// Permutations applied by the evaluator during constrained setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ordering {
    pub equalities_first: bool,
    pub linear_first: bool,
    pub nonlinear_variables_first: bool,
}

impl Ordering {
    /// The toggles as the integer flags expected by native setup.
    pub fn as_flags(self) -> [i32; 3] {
        [
            i32::from(self.equalities_first),
            i32::from(self.linear_first),
            i32::from(self.nonlinear_variables_first),
        ]
    }
}
