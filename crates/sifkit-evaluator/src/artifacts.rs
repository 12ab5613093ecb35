//! Deterministic names of decoded problem artifacts.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::path::{Path, PathBuf};

/// Prefix of the binary dimension/setup data unit.
pub const DATA_UNIT_PREFIX: &str = "OUTSDIF_";
/// Suffix of the binary dimension/setup data unit.
pub const DATA_UNIT_SUFFIX: &str = ".d";

/// Files produced by decoding and building one problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Problem base name (e.g. `ROSENBR`).
    pub problem: String,
    /// Dynamically loadable evaluator module.
    pub library: PathBuf,
    /// Binary dimension/setup data unit.
    pub data_unit: PathBuf,
}

impl Artifacts {
    /// Artifact paths for `problem` inside `dir`.
    pub fn in_dir(dir: &Path, problem: &str) -> Self {
        Self {
            problem: problem.to_string(),
            library: dir.join(library_file_name(problem)),
            data_unit: dir.join(data_unit_file_name(problem)),
        }
    }

    /// Check that both files are present.
    pub fn exists(&self) -> bool {
        self.library.is_file() && self.data_unit.is_file()
    }

    /// The first artifact that is not present, if any.
    pub fn first_missing(&self) -> Option<&Path> {
        [self.library.as_path(), self.data_unit.as_path()]
            .into_iter()
            .find(|path| !path.is_file())
    }
}

/// File name of the evaluator module for `problem`.
pub fn library_file_name(problem: &str) -> String {
    format!("{DLL_PREFIX}{problem}.{DLL_EXTENSION}")
}

/// File name of the data unit for `problem`.
pub fn data_unit_file_name(problem: &str) -> String {
    format!("{DATA_UNIT_PREFIX}{problem}{DATA_UNIT_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names_are_deterministic() {
        let artifacts = Artifacts::in_dir(Path::new("/work"), "HS21");
        assert_eq!(artifacts.problem, "HS21");
        assert_eq!(
            artifacts.data_unit,
            PathBuf::from("/work").join("OUTSDIF_HS21.d")
        );
        let library = artifacts
            .library
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        assert!(library.contains("HS21"));
        assert!(library.ends_with(DLL_EXTENSION));
        assert_eq!(artifacts, Artifacts::in_dir(Path::new("/work"), "HS21"));
    }

    #[test]
    fn test_missing_artifacts() {
        let artifacts = Artifacts::in_dir(Path::new("/nonexistent/sifkit"), "HS21");
        assert!(!artifacts.exists());
        assert_eq!(artifacts.first_missing(), Some(artifacts.library.as_path()));
    }
}
