//! In-memory evaluator and toolchain used by the model tests.
//!
//! The fake problem is
//! `f(x) = Σ (xᵢ - 1)²` and `cⱼ(x) = aⱼ·x + bⱼ + qⱼ x₀²`,
//! with a dense Jacobian and a diagonal Hessian pattern.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sifkit_evaluator::{
    Artifacts, ConstraintBuffers, DecodeRequest, Dimensions, Evaluator, EvaluatorError,
    NativeReport, NativeStatus, Ordering, ProblemKind, ProblemNames, Toolchain, VariableBuffers,
};

#[derive(Debug, Clone)]
pub(super) struct FakeConstraint {
    pub name: String,
    pub equality: bool,
    pub a: Vec<f64>,
    pub b: f64,
    pub q: f64,
    pub lower: f64,
    pub upper: f64,
}

impl FakeConstraint {
    pub fn linear(name: &str, equality: bool, a: Vec<f64>, b: f64) -> Self {
        Self::new(name, equality, a, b, 0.0)
    }

    pub fn nonlinear(name: &str, equality: bool, a: Vec<f64>, b: f64, q: f64) -> Self {
        Self::new(name, equality, a, b, q)
    }

    fn new(name: &str, equality: bool, a: Vec<f64>, b: f64, q: f64) -> Self {
        let (lower, upper) = if equality { (0.0, 0.0) } else { (-1e20, 0.0) };
        Self {
            name: name.to_string(),
            equality,
            a,
            b,
            q,
            lower,
            upper,
        }
    }

    fn is_linear(&self) -> bool {
        self.q == 0.0
    }

    fn value(&self, x: &[f64]) -> f64 {
        let ax: f64 = self.a.iter().zip(x).map(|(a, x)| a * x).sum();
        ax + self.b + self.q * x[0] * x[0]
    }

    fn gradient(&self, x: &[f64], out: &mut [f64]) {
        out.copy_from_slice(&self.a);
        out[0] += 2.0 * self.q * x[0];
    }
}

#[derive(Debug, Clone)]
pub(super) struct FakeProblem {
    pub name: String,
    pub x0: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub constraints: Vec<FakeConstraint>,
}

impl FakeProblem {
    /// Two bounded variables, no constraints.
    pub fn bounded_pair() -> Self {
        Self {
            name: "PAIR".to_string(),
            x0: vec![-1.2, 1.0],
            lower: vec![-5.0, -1e20],
            upper: vec![3e21, 10.0],
            constraints: Vec::new(),
        }
    }

    /// Three variables, constraints declared as
    /// `[ineq1, eq1, ineq2, eq2, eq3]`; `eq1`, `ineq2` and `eq3` are linear.
    pub fn mixed() -> Self {
        Self {
            name: "MIXED".to_string(),
            x0: vec![0.5, 0.5, 0.5],
            lower: vec![0.0, -1e20, -1e25],
            upper: vec![1e20, 4.0, 1e20],
            constraints: vec![
                FakeConstraint::nonlinear("INEQ1", false, vec![1.0, 0.0, 1.0], -2.0, 1.0),
                FakeConstraint::linear("EQ1", true, vec![1.0, 1.0, 1.0], -1.0),
                FakeConstraint::linear("INEQ2", false, vec![0.0, 2.0, -1.0], 3.0),
                FakeConstraint::nonlinear("EQ2", true, vec![0.0, 1.0, 0.0], 0.5, -2.0),
                FakeConstraint::linear("EQ3", true, vec![4.0, 0.0, -3.0], 0.25),
            ],
        }
    }

    fn nvar(&self) -> usize {
        self.x0.len()
    }
}

/// Calls observed across the evaluators of one toolchain.
#[derive(Debug, Default)]
pub(super) struct Journal {
    pub decodes: usize,
    pub loads: usize,
    pub opens: usize,
    pub closes: usize,
    pub setups: usize,
    pub hessian_structure: usize,
    pub jacobian_structure: usize,
    pub sparse_jacobian: usize,
    pub terminates: usize,
    pub unloads: usize,
    pub last_ordering: Option<Ordering>,
}

/// Which step of the fake should fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct Faults {
    pub decode: bool,
    pub setup: bool,
    pub terminate: bool,
}

pub(super) struct FakeToolchain {
    pub problem: FakeProblem,
    pub artifact_dir: PathBuf,
    pub journal: Rc<RefCell<Journal>>,
    pub faults: Faults,
}

impl FakeToolchain {
    pub fn new(problem: FakeProblem, artifact_dir: &Path) -> Self {
        Self {
            problem,
            artifact_dir: artifact_dir.to_path_buf(),
            journal: Rc::new(RefCell::new(Journal::default())),
            faults: Faults::default(),
        }
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }
}

impl Toolchain for FakeToolchain {
    type Evaluator = FakeEvaluator;

    fn decode(&self, request: &DecodeRequest<'_>) -> Result<Artifacts, EvaluatorError> {
        self.journal.borrow_mut().decodes += 1;
        if self.faults.decode {
            return Err(EvaluatorError::Build {
                stage: "sifdecoder",
                detail: format!("cannot decode {}", request.problem),
            });
        }
        Ok(self.artifacts(request.problem))
    }

    fn artifacts(&self, problem: &str) -> Artifacts {
        Artifacts::in_dir(&self.artifact_dir, problem)
    }

    fn load(&self, _artifacts: &Artifacts) -> Result<FakeEvaluator, EvaluatorError> {
        self.journal.borrow_mut().loads += 1;
        Ok(FakeEvaluator {
            problem: self.problem.clone(),
            journal: Rc::clone(&self.journal),
            faults: self.faults,
            unit_open: false,
            loaded: true,
            objective_calls: 0,
        })
    }
}

#[derive(Debug)]
pub(super) struct FakeEvaluator {
    problem: FakeProblem,
    journal: Rc<RefCell<Journal>>,
    faults: Faults,
    unit_open: bool,
    loaded: bool,
    objective_calls: usize,
}

fn status(operation: &'static str, status: NativeStatus) -> EvaluatorError {
    EvaluatorError::Status { operation, status }
}

impl FakeEvaluator {
    fn live(&self, operation: &'static str) -> Result<(), EvaluatorError> {
        if self.loaded {
            Ok(())
        } else {
            Err(EvaluatorError::SymbolMissing {
                symbol: operation.to_string(),
                reason: "library unloaded".to_string(),
            })
        }
    }

    /// Non-finite points trigger an evaluation error.
    fn point(&self, operation: &'static str, x: &[f64]) -> Result<(), EvaluatorError> {
        self.live(operation)?;
        if x.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(status(operation, NativeStatus::Evaluation))
        }
    }

    fn objective_value(x: &[f64]) -> f64 {
        x.iter().map(|v| (v - 1.0) * (v - 1.0)).sum()
    }

    fn fill_gradient(x: &[f64], g: &mut [f64]) {
        for (gi, xi) in g.iter_mut().zip(x) {
            *gi = 2.0 * (xi - 1.0);
        }
    }

    /// `Σ yⱼ 2 qⱼ`, the Lagrangian curvature added at `(0, 0)`.
    fn constraint_curvature(&self, y: Option<&[f64]>) -> f64 {
        y.map_or(0.0, |y| {
            self.problem
                .constraints
                .iter()
                .zip(y)
                .map(|(c, yj)| 2.0 * c.q * yj)
                .sum()
        })
    }
}

impl Evaluator for FakeEvaluator {
    fn open_data_unit(&mut self, _path: &Path) -> Result<(), EvaluatorError> {
        self.live("fortran_open")?;
        self.journal.borrow_mut().opens += 1;
        self.unit_open = true;
        Ok(())
    }

    fn close_data_unit(&mut self) -> Result<(), EvaluatorError> {
        self.journal.borrow_mut().closes += 1;
        self.unit_open = false;
        Ok(())
    }

    fn dimensions(&mut self) -> Result<Dimensions, EvaluatorError> {
        if !self.unit_open {
            return Err(status("cdimen", NativeStatus::Unknown(31)));
        }
        Ok(Dimensions {
            nvar: self.problem.nvar(),
            ncon: self.problem.constraints.len(),
        })
    }

    fn setup_unconstrained(
        &mut self,
        variables: &mut VariableBuffers,
    ) -> Result<(), EvaluatorError> {
        self.journal.borrow_mut().setups += 1;
        if self.faults.setup {
            return Err(status("usetup", NativeStatus::MemoryAllocation));
        }
        variables.x.copy_from_slice(&self.problem.x0);
        variables.lower.copy_from_slice(&self.problem.lower);
        variables.upper.copy_from_slice(&self.problem.upper);
        Ok(())
    }

    fn setup_constrained(
        &mut self,
        variables: &mut VariableBuffers,
        constraints: &mut ConstraintBuffers,
        ordering: Ordering,
    ) -> Result<(), EvaluatorError> {
        {
            let mut journal = self.journal.borrow_mut();
            journal.setups += 1;
            journal.last_ordering = Some(ordering);
        }
        if self.faults.setup {
            return Err(status("csetup", NativeStatus::ArrayBound));
        }
        variables.x.copy_from_slice(&self.problem.x0);
        variables.lower.copy_from_slice(&self.problem.lower);
        variables.upper.copy_from_slice(&self.problem.upper);

        // Stable reorder: equalities first, then linear first.
        self.problem.constraints.sort_by_key(|c| {
            (
                ordering.equalities_first && !c.equality,
                ordering.linear_first && !c.is_linear(),
            )
        });
        for (j, c) in self.problem.constraints.iter().enumerate() {
            constraints.multipliers[j] = 0.0;
            constraints.lower[j] = c.lower;
            constraints.upper[j] = c.upper;
            constraints.equality[j] = c.equality;
            constraints.linear[j] = c.is_linear();
        }
        Ok(())
    }

    fn hessian_nnz(&mut self, _kind: ProblemKind) -> Result<usize, EvaluatorError> {
        Ok(self.problem.nvar())
    }

    fn jacobian_nnz(&mut self) -> Result<usize, EvaluatorError> {
        let nvar = self.problem.nvar();
        Ok(nvar * self.problem.constraints.len() + nvar)
    }

    fn hessian_structure(
        &mut self,
        _kind: ProblemKind,
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError> {
        self.live("shp")?;
        self.journal.borrow_mut().hessian_structure += 1;
        for i in 0..self.problem.nvar() {
            rows[i] = i;
            cols[i] = i;
        }
        Ok(self.problem.nvar())
    }

    fn jacobian_structure(
        &mut self,
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError> {
        self.live("csjp")?;
        self.journal.borrow_mut().jacobian_structure += 1;
        let nvar = self.problem.nvar();
        for j in 0..self.problem.constraints.len() {
            for i in 0..nvar {
                rows[j * nvar + i] = j;
                cols[j * nvar + i] = i;
            }
        }
        Ok(nvar * self.problem.constraints.len())
    }

    fn objective(&mut self, _kind: ProblemKind, x: &[f64]) -> Result<f64, EvaluatorError> {
        self.point("ufn", x)?;
        self.objective_calls += 1;
        Ok(Self::objective_value(x))
    }

    fn gradient(
        &mut self,
        _kind: ProblemKind,
        x: &[f64],
        g: &mut [f64],
    ) -> Result<(), EvaluatorError> {
        self.point("ugr", x)?;
        Self::fill_gradient(x, g);
        Ok(())
    }

    fn objective_gradient(
        &mut self,
        _kind: ProblemKind,
        x: &[f64],
        g: &mut [f64],
    ) -> Result<f64, EvaluatorError> {
        self.point("uofg", x)?;
        self.objective_calls += 1;
        Self::fill_gradient(x, g);
        Ok(Self::objective_value(x))
    }

    fn constraints(&mut self, x: &[f64], c: &mut [f64]) -> Result<f64, EvaluatorError> {
        self.point("cfn", x)?;
        for (cj, con) in c.iter_mut().zip(&self.problem.constraints) {
            *cj = con.value(x);
        }
        Ok(Self::objective_value(x))
    }

    fn sparse_jacobian(
        &mut self,
        x: &[f64],
        c: &mut [f64],
        vals: &mut [f64],
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError> {
        self.point("ccfsg", x)?;
        self.journal.borrow_mut().sparse_jacobian += 1;
        let nvar = self.problem.nvar();
        let mut grad = vec![0.0; nvar];
        for (j, con) in self.problem.constraints.iter().enumerate() {
            c[j] = con.value(x);
            con.gradient(x, &mut grad);
            for i in 0..nvar {
                vals[j * nvar + i] = grad[i];
                rows[j * nvar + i] = j;
                cols[j * nvar + i] = i;
            }
        }
        Ok(nvar * self.problem.constraints.len())
    }

    fn constraint_gradient(
        &mut self,
        index: usize,
        x: &[f64],
        grad: &mut [f64],
    ) -> Result<f64, EvaluatorError> {
        self.point("ccifg", x)?;
        let con = self
            .problem
            .constraints
            .get(index)
            .ok_or_else(|| status("ccifg", NativeStatus::ArrayBound))?;
        con.gradient(x, grad);
        Ok(con.value(x))
    }

    fn hessian_values(
        &mut self,
        _kind: ProblemKind,
        x: &[f64],
        y: Option<&[f64]>,
        vals: &mut [f64],
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError> {
        self.point("sh", x)?;
        for i in 0..self.problem.nvar() {
            vals[i] = 2.0;
            rows[i] = i;
            cols[i] = i;
        }
        vals[0] += self.constraint_curvature(y);
        Ok(self.problem.nvar())
    }

    fn hessian_product(
        &mut self,
        _kind: ProblemKind,
        x: &[f64],
        y: Option<&[f64]>,
        v: &[f64],
        out: &mut [f64],
    ) -> Result<(), EvaluatorError> {
        self.point("hprod", x)?;
        for (o, vi) in out.iter_mut().zip(v) {
            *o = 2.0 * vi;
        }
        out[0] += self.constraint_curvature(y) * v[0];
        Ok(())
    }

    fn jacobian_product(
        &mut self,
        x: &[f64],
        v: &[f64],
        out: &mut [f64],
        transpose: bool,
    ) -> Result<(), EvaluatorError> {
        self.point("cjprod", x)?;
        let nvar = self.problem.nvar();
        let mut grad = vec![0.0; nvar];
        out.iter_mut().for_each(|o| *o = 0.0);
        for (j, con) in self.problem.constraints.iter().enumerate() {
            con.gradient(x, &mut grad);
            for i in 0..nvar {
                if transpose {
                    out[i] += grad[i] * v[j];
                } else {
                    out[j] += grad[i] * v[i];
                }
            }
        }
        Ok(())
    }

    fn names(
        &mut self,
        _kind: ProblemKind,
        dims: Dimensions,
    ) -> Result<ProblemNames, EvaluatorError> {
        self.live("names")?;
        Ok(ProblemNames {
            problem: self.problem.name.clone(),
            variables: (1..=dims.nvar).map(|i| format!("X{i}")).collect(),
            constraints: self
                .problem
                .constraints
                .iter()
                .map(|c| c.name.clone())
                .collect(),
        })
    }

    fn report(&mut self, kind: ProblemKind) -> Result<NativeReport, EvaluatorError> {
        self.live("report")?;
        let constrained = kind.is_constrained().then_some(0.0);
        Ok(NativeReport {
            objective_calls: self.objective_calls as f64,
            constraint_calls: constrained,
            constraint_gradient_calls: constrained,
            constraint_hessian_calls: constrained,
            ..NativeReport::default()
        })
    }

    fn terminate(&mut self, _kind: ProblemKind) -> Result<(), EvaluatorError> {
        self.live("terminate")?;
        self.journal.borrow_mut().terminates += 1;
        if self.faults.terminate {
            return Err(status("terminate", NativeStatus::Unknown(-1)));
        }
        Ok(())
    }

    fn unload(&mut self) {
        if self.loaded {
            self.loaded = false;
            self.journal.borrow_mut().unloads += 1;
        }
    }
}

/// A fresh directory holding `NAME.SIF` for each problem.
pub(super) fn problem_dir(label: &str, problems: &[&str]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "sifkit-model-{}-{}",
        label,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    for problem in problems {
        fs::write(
            dir.join(format!("{problem}.SIF")),
            format!("NAME          {problem}\n"),
        )
        .unwrap();
    }
    dir
}
