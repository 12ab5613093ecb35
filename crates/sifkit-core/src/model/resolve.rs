//! Problem specification file resolution.

use std::path::{Path, PathBuf};

use crate::model::error::ModelError;

/// Extension of problem specification files.
pub const SIF_EXTENSION: &str = "SIF";

/// A problem file located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProblem {
    /// Path of the specification file.
    pub source: PathBuf,
    /// Base name used to name artifacts.
    pub name: String,
}

/// Locate `name` in `search_dir`, falling back to `repository`.
///
/// A name without extension gets `.SIF` appended. Only the base name is
/// looked up in the repository.
pub fn resolve_problem(
    name: &str,
    search_dir: &Path,
    repository: Option<&Path>,
) -> Result<ResolvedProblem, ModelError> {
    let requested = Path::new(name);
    let file = if requested.extension().is_some() {
        requested.to_path_buf()
    } else {
        requested.with_extension(SIF_EXTENSION)
    };
    let not_found = || ModelError::ProblemNotFound {
        name: name.to_string(),
    };
    let stem = file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(not_found)?
        .to_string();

    let local = search_dir.join(&file);
    if local.is_file() {
        return Ok(ResolvedProblem {
            source: local,
            name: stem,
        });
    }

    if let Some(root) = repository {
        let candidate = root.join(format!("{stem}.{SIF_EXTENSION}"));
        if candidate.is_file() {
            return Ok(ResolvedProblem {
                source: candidate,
                name: stem,
            });
        }
    }

    tracing::debug!(
        component = "model",
        operation = "resolve",
        status = "error",
        problem = name,
        search_dir = %search_dir.display(),
        repository = ?repository,
        "Problem file not found"
    );
    Err(not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sifkit-resolve-{}-{}",
            label,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap_or_else(|err| panic!("{}", err));
        dir
    }

    #[test]
    fn test_local_file_wins() {
        let local = scratch_dir("local");
        let repo = scratch_dir("local-repo");
        fs::write(local.join("HS21.SIF"), "NAME HS21").unwrap();
        fs::write(repo.join("HS21.SIF"), "NAME HS21").unwrap();

        let resolved = resolve_problem("HS21", &local, Some(&repo)).unwrap();
        assert_eq!(resolved.source, local.join("HS21.SIF"));
        assert_eq!(resolved.name, "HS21");
    }

    #[test]
    fn test_falls_back_to_repository() {
        let local = scratch_dir("fallback");
        let repo = scratch_dir("fallback-repo");
        fs::write(repo.join("ROSENBR.SIF"), "NAME ROSENBR").unwrap();

        let resolved = resolve_problem("ROSENBR.SIF", &local, Some(&repo)).unwrap();
        assert_eq!(resolved.source, repo.join("ROSENBR.SIF"));
        assert_eq!(resolved.name, "ROSENBR");
    }

    #[test]
    fn test_missing_problem() {
        let local = scratch_dir("missing");
        let err = resolve_problem("NOPE", &local, None).unwrap_err();
        assert_eq!(
            err,
            ModelError::ProblemNotFound {
                name: "NOPE".to_string()
            }
        );
    }
}
