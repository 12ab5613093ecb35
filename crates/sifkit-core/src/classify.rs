//! Problem classification strings and repository selection.
//!
//! Every SIF file carries a classification such as `SUR2-AN-2-0`:
//! objective type, constraint type, regularity and derivative degree, then
//! origin and internal-variable flag, then the variable and constraint
//! counts (`V` when chosen by decoder parameters).

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::model::{ModelError, SIF_EXTENSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectiveType {
    None,
    Constant,
    Linear,
    Quadratic,
    SumOfSquares,
    Other,
}

impl ObjectiveType {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'N' => Some(ObjectiveType::None),
            'C' => Some(ObjectiveType::Constant),
            'L' => Some(ObjectiveType::Linear),
            'Q' => Some(ObjectiveType::Quadratic),
            'S' => Some(ObjectiveType::SumOfSquares),
            'O' => Some(ObjectiveType::Other),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            ObjectiveType::None => 'N',
            ObjectiveType::Constant => 'C',
            ObjectiveType::Linear => 'L',
            ObjectiveType::Quadratic => 'Q',
            ObjectiveType::SumOfSquares => 'S',
            ObjectiveType::Other => 'O',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConstraintType {
    Unconstrained,
    FixedVariables,
    Bounds,
    Network,
    Linear,
    Quadratic,
    Other,
}

impl ConstraintType {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'U' => Some(ConstraintType::Unconstrained),
            'X' => Some(ConstraintType::FixedVariables),
            'B' => Some(ConstraintType::Bounds),
            'N' => Some(ConstraintType::Network),
            'L' => Some(ConstraintType::Linear),
            'Q' => Some(ConstraintType::Quadratic),
            'O' => Some(ConstraintType::Other),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            ConstraintType::Unconstrained => 'U',
            ConstraintType::FixedVariables => 'X',
            ConstraintType::Bounds => 'B',
            ConstraintType::Network => 'N',
            ConstraintType::Linear => 'L',
            ConstraintType::Quadratic => 'Q',
            ConstraintType::Other => 'O',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Origin {
    Academic,
    Modelling,
    Real,
}

/// A problem dimension: fixed in the file or chosen at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Size {
    Fixed(usize),
    Variable,
}

impl Size {
    /// Variable sizes match every range.
    fn within(self, min: Option<usize>, max: Option<usize>) -> bool {
        match self {
            Size::Variable => true,
            Size::Fixed(n) => min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi),
        }
    }
}

/// Parsed classification string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub objective: ObjectiveType,
    pub constraints: ConstraintType,
    pub regular: bool,
    pub derivative_degree: u8,
    pub origin: Origin,
    pub internal_variables: bool,
    pub nvar: Size,
    pub ncon: Size,
}

impl Classification {
    /// Parse a string such as `SUR2-AN-2-0`. A leading `C-` marker is
    /// accepted.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let invalid = |reason: &str| ModelError::InvalidClassification {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = value.trim();
        let body = trimmed.strip_prefix("C-").unwrap_or(trimmed);
        let parts: Vec<&str> = body.split('-').collect();
        let [kind, source, nvar, ncon] = parts.as_slice() else {
            return Err(invalid("expected four '-' separated fields"));
        };

        let kind: Vec<char> = kind.chars().collect();
        let [objective, constraints, regularity, degree] = kind.as_slice() else {
            return Err(invalid("problem type must have four characters"));
        };
        let objective =
            ObjectiveType::from_code(*objective).ok_or_else(|| invalid("unknown objective type"))?;
        let constraints = ConstraintType::from_code(*constraints)
            .ok_or_else(|| invalid("unknown constraint type"))?;
        let regular = match regularity {
            'R' => true,
            'I' => false,
            _ => return Err(invalid("regularity must be R or I")),
        };
        let derivative_degree = match degree.to_digit(10) {
            Some(d @ 0..=2) => d as u8,
            _ => return Err(invalid("derivative degree must be 0, 1 or 2")),
        };

        let source: Vec<char> = source.chars().collect();
        let [origin, internal] = source.as_slice() else {
            return Err(invalid("origin must have two characters"));
        };
        let origin = match origin {
            'A' => Origin::Academic,
            'M' => Origin::Modelling,
            'R' => Origin::Real,
            _ => return Err(invalid("origin must be A, M or R")),
        };
        let internal_variables = match internal {
            'Y' => true,
            'N' => false,
            _ => return Err(invalid("internal variable flag must be Y or N")),
        };

        Ok(Self {
            objective,
            constraints,
            regular,
            derivative_degree,
            origin,
            internal_variables,
            nvar: parse_size(nvar).ok_or_else(|| invalid("bad variable count"))?,
            ncon: parse_size(ncon).ok_or_else(|| invalid("bad constraint count"))?,
        })
    }

    /// Find the classification line in the text of a SIF file.
    pub fn from_sif(text: &str) -> Option<Result<Self, ModelError>> {
        text.lines().find_map(|line| {
            let lower = line.to_ascii_lowercase();
            let at = lower.find("classification")?;
            let value = line[at + "classification".len()..].split_whitespace().next()?;
            Some(Self::parse(value))
        })
    }
}

impl FromStr for Classification {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

fn parse_size(field: &str) -> Option<Size> {
    if field.eq_ignore_ascii_case("V") {
        Some(Size::Variable)
    } else {
        field.parse().ok().map(Size::Fixed)
    }
}

/// Selection criteria over classifications. Empty criteria match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemFilter {
    pub objective: Vec<ObjectiveType>,
    pub constraints: Vec<ConstraintType>,
    pub min_var: Option<usize>,
    pub max_var: Option<usize>,
    pub min_con: Option<usize>,
    pub max_con: Option<usize>,
    pub regular: Option<bool>,
    /// Minimum analytic derivative degree.
    pub derivative_degree: Option<u8>,
    /// Skip problems whose sizes are chosen at decode time.
    pub fixed_size_only: bool,
}

impl ProblemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objective(mut self, objective: impl IntoIterator<Item = ObjectiveType>) -> Self {
        self.objective = objective.into_iter().collect();
        self
    }

    pub fn with_constraints(
        mut self,
        constraints: impl IntoIterator<Item = ConstraintType>,
    ) -> Self {
        self.constraints = constraints.into_iter().collect();
        self
    }

    pub fn with_var_range(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_var = min;
        self.max_var = max;
        self
    }

    pub fn with_con_range(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_con = min;
        self.max_con = max;
        self
    }

    pub fn with_regular(mut self, regular: bool) -> Self {
        self.regular = Some(regular);
        self
    }

    pub fn with_derivative_degree(mut self, degree: u8) -> Self {
        self.derivative_degree = Some(degree);
        self
    }

    pub fn with_fixed_size_only(mut self, enabled: bool) -> Self {
        self.fixed_size_only = enabled;
        self
    }

    pub fn matches(&self, class: &Classification) -> bool {
        if !self.objective.is_empty() && !self.objective.contains(&class.objective) {
            return false;
        }
        if !self.constraints.is_empty() && !self.constraints.contains(&class.constraints) {
            return false;
        }
        if self.regular.is_some_and(|regular| regular != class.regular) {
            return false;
        }
        if self
            .derivative_degree
            .is_some_and(|degree| class.derivative_degree < degree)
        {
            return false;
        }
        if self.fixed_size_only && (class.nvar == Size::Variable || class.ncon == Size::Variable) {
            return false;
        }
        class.nvar.within(self.min_var, self.max_var) && class.ncon.within(self.min_con, self.max_con)
    }
}

/// Names of the problems in `repository` whose classification matches
/// `filter`, sorted.
///
/// Files without a readable classification are skipped.
pub fn select_problems(repository: &Path, filter: &ProblemFilter) -> Result<Vec<String>, ModelError> {
    let unreadable = |err: std::io::Error| ModelError::Repository {
        path: repository.display().to_string(),
        reason: err.to_string(),
    };

    let mut selected = Vec::new();
    let mut scanned = 0usize;
    for entry in fs::read_dir(repository).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        let is_sif = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SIF_EXTENSION));
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if !is_sif {
            continue;
        }
        scanned += 1;

        let text = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                tracing::debug!(
                    component = "classify",
                    operation = "select",
                    status = "error",
                    path = %path.display(),
                    error = %err,
                    "Skipping unreadable problem file"
                );
                continue;
            }
        };
        match Classification::from_sif(&text) {
            Some(Ok(class)) if filter.matches(&class) => selected.push(name.to_string()),
            Some(Ok(_)) => {}
            Some(Err(err)) => tracing::debug!(
                component = "classify",
                operation = "select",
                status = "error",
                problem = name,
                error = %err,
                "Skipping problem with invalid classification"
            ),
            None => tracing::trace!(
                component = "classify",
                operation = "select",
                status = "skipped",
                problem = name,
                "No classification line"
            ),
        }
    }
    selected.sort();

    tracing::debug!(
        component = "classify",
        operation = "select",
        status = "success",
        repository = %repository.display(),
        scanned,
        selected = selected.len(),
        "Selected problems"
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sifkit-classify-{}-{}",
            label,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_unconstrained() {
        let class = Classification::parse("SUR2-AN-2-0").unwrap();
        assert_eq!(class.objective, ObjectiveType::SumOfSquares);
        assert_eq!(class.constraints, ConstraintType::Unconstrained);
        assert!(class.regular);
        assert_eq!(class.derivative_degree, 2);
        assert_eq!(class.origin, Origin::Academic);
        assert!(!class.internal_variables);
        assert_eq!(class.nvar, Size::Fixed(2));
        assert_eq!(class.ncon, Size::Fixed(0));
    }

    #[test]
    fn test_parse_variable_size_and_prefix() {
        let class: Classification = "C-OQR2-MY-V-V".parse().unwrap();
        assert_eq!(class.objective, ObjectiveType::Other);
        assert_eq!(class.constraints, ConstraintType::Quadratic);
        assert_eq!(class.origin, Origin::Modelling);
        assert!(class.internal_variables);
        assert_eq!(class.nvar, Size::Variable);
        assert_eq!(class.ncon, Size::Variable);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for value in ["SUR2-AN-2", "SZR2-AN-2-0", "SUR9-AN-2-0", "SUR2-AX-2-0", "SUR2-AN-x-0"] {
            let err = Classification::parse(value).unwrap_err();
            assert_eq!(err.code(), "CLASSIFICATION_INVALID", "{value}");
        }
    }

    #[test]
    fn test_from_sif_finds_comment_line() {
        let text = "***************\n* SIF input: Ph. Toint\n*\n*   classification QLR2-AN-3-2\n*\nNAME          HS21\n";
        let class = Classification::from_sif(text).unwrap().unwrap();
        assert_eq!(class.objective, ObjectiveType::Quadratic);
        assert_eq!(class.ncon, Size::Fixed(2));
        assert!(Classification::from_sif("NAME X\n").is_none());
    }

    #[test]
    fn test_filter_matches() {
        let class = Classification::parse("QLR2-AN-3-2").unwrap();
        assert!(ProblemFilter::new().matches(&class));
        assert!(
            ProblemFilter::new()
                .with_objective([ObjectiveType::Quadratic, ObjectiveType::Linear])
                .with_constraints([ConstraintType::Linear])
                .with_var_range(Some(2), Some(3))
                .with_derivative_degree(2)
                .matches(&class)
        );
        assert!(
            !ProblemFilter::new()
                .with_objective([ObjectiveType::SumOfSquares])
                .matches(&class)
        );
        assert!(!ProblemFilter::new().with_con_range(None, Some(1)).matches(&class));
        assert!(!ProblemFilter::new().with_regular(false).matches(&class));

        let variable = Classification::parse("OUR2-AN-V-0").unwrap();
        assert!(ProblemFilter::new().with_var_range(Some(10_000), None).matches(&variable));
        assert!(!ProblemFilter::new().with_fixed_size_only(true).matches(&variable));
    }

    #[test]
    fn test_select_problems_sorted_and_filtered() {
        let repo = scratch_dir("select");
        fs::write(repo.join("ROSENBR.SIF"), "*   classification SUR2-AN-2-0\n").unwrap();
        fs::write(repo.join("HS21.SIF"), "*   classification QLR2-AN-2-1\n").unwrap();
        fs::write(repo.join("BROYDN.SIF"), "*   classification NQR2-AN-V-V\n").unwrap();
        fs::write(repo.join("BROKEN.SIF"), "*   classification ???\n").unwrap();
        fs::write(repo.join("NOTES.txt"), "*   classification SUR2-AN-2-0\n").unwrap();

        let all = select_problems(&repo, &ProblemFilter::new()).unwrap();
        assert_eq!(all, vec!["BROYDN", "HS21", "ROSENBR"]);

        let unconstrained = select_problems(
            &repo,
            &ProblemFilter::new().with_con_range(Some(0), Some(0)).with_fixed_size_only(true),
        )
        .unwrap();
        assert_eq!(unconstrained, vec!["ROSENBR"]);
    }

    #[test]
    fn test_select_missing_repository() {
        let missing = std::env::temp_dir().join("sifkit-classify-does-not-exist");
        let err = select_problems(&missing, &ProblemFilter::new()).unwrap_err();
        assert_eq!(err.code(), "REPOSITORY_UNREADABLE");
    }
}
