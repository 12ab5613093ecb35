//! [`Evaluator`] implementation over a loaded evaluator module.
#![allow(unsafe_code)]

use std::ffi::CString;
use std::path::{Path, PathBuf};

use sifkit_evaluator::{
    ConstraintBuffers, Dimensions, Evaluator, EvaluatorError, NativeReport, NativeStatus,
    Ordering, ProblemKind, ProblemNames, VariableBuffers,
};

use crate::ffi::{
    BUFFER_UNIT, CutestLibrary, DATA_UNIT, Integer, NAME_WIDTH, OUTPUT_UNIT, Real, split_names,
    to_count, to_integer, to_zero_based,
};

/// Evaluator backed by a dynamically loaded evaluator module.
///
/// Index buffers are converted between the one-based native convention
/// and zero-based Rust indices on every call.
#[derive(Debug)]
pub struct NativeEvaluator {
    library: Option<CutestLibrary>,
    path: PathBuf,
    dims: Dimensions,
    index_rows: Vec<Integer>,
    index_cols: Vec<Integer>,
    zeros: Vec<Real>,
    gradient: Vec<Real>,
}

fn loaded<'a>(
    library: &'a Option<CutestLibrary>,
    path: &Path,
) -> Result<&'a CutestLibrary, EvaluatorError> {
    library.as_ref().ok_or_else(|| EvaluatorError::LibraryLoad {
        path: path.display().to_string(),
        reason: "evaluator module has been unloaded".to_string(),
    })
}

fn check_len(operation: &'static str, expected: usize, got: usize) -> Result<(), EvaluatorError> {
    if expected == got {
        Ok(())
    } else {
        Err(EvaluatorError::DimensionMismatch {
            operation,
            expected,
            got,
        })
    }
}

fn prepare_indices(buffer: &mut Vec<Integer>, len: usize) -> &mut [Integer] {
    buffer.clear();
    buffer.resize(len, 0);
    buffer.as_mut_slice()
}

impl NativeEvaluator {
    /// Load the evaluator module at `path`.
    pub fn load(path: &Path) -> Result<Self, EvaluatorError> {
        let library = CutestLibrary::load(path)?;
        tracing::debug!(
            component = "native",
            operation = "load",
            status = "success",
            path = %path.display(),
            "Loaded evaluator module"
        );
        Ok(Self {
            library: Some(library),
            path: path.to_path_buf(),
            dims: Dimensions { nvar: 0, ncon: 0 },
            index_rows: Vec::new(),
            index_cols: Vec::new(),
            zeros: Vec::new(),
            gradient: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.library.is_some()
    }

    /// Multipliers passed when the Hessian of the objective alone is wanted.
    fn zero_multipliers(&mut self) {
        self.zeros.clear();
        self.zeros.resize(self.dims.ncon, 0.0);
    }
}

impl Evaluator for NativeEvaluator {
    fn open_data_unit(&mut self, path: &Path) -> Result<(), EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let unit_error = |code| EvaluatorError::DataUnit {
            path: path.display().to_string(),
            code,
        };
        let name = path
            .to_str()
            .and_then(|name| CString::new(name).ok())
            .ok_or_else(|| unit_error(-1))?;
        let mut ierr: Integer = 0;
        // SAFETY: `name` is NUL-terminated and outlives the call.
        unsafe { (lib.fortran_open)(&DATA_UNIT, name.as_ptr(), &mut ierr) };
        if ierr != 0 {
            return Err(unit_error(ierr));
        }
        tracing::trace!(
            component = "native",
            operation = "open_data_unit",
            status = "success",
            path = %path.display(),
            "Opened data unit"
        );
        Ok(())
    }

    fn close_data_unit(&mut self) -> Result<(), EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let mut ierr: Integer = 0;
        // SAFETY: scalar arguments only.
        unsafe { (lib.fortran_close)(&DATA_UNIT, &mut ierr) };
        if ierr != 0 {
            return Err(EvaluatorError::DataUnit {
                path: format!("unit {DATA_UNIT}"),
                code: ierr,
            });
        }
        Ok(())
    }

    fn dimensions(&mut self) -> Result<Dimensions, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let (mut status, mut n, mut m): (Integer, Integer, Integer) = (0, 0, 0);
        // SAFETY: scalar arguments only.
        unsafe { (lib.cdimen)(&mut status, &DATA_UNIT, &mut n, &mut m) };
        NativeStatus::check(status, "cutest_cdimen")?;
        self.dims = Dimensions {
            nvar: to_count(n),
            ncon: to_count(m),
        };
        Ok(self.dims)
    }

    fn setup_unconstrained(
        &mut self,
        variables: &mut VariableBuffers,
    ) -> Result<(), EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let nvar = variables.x.len();
        check_len("usetup", nvar, variables.lower.len())?;
        check_len("usetup", nvar, variables.upper.len())?;
        let mut n = to_integer("usetup", nvar)?;
        let mut status: Integer = 0;
        // SAFETY: every array holds `n` elements.
        unsafe {
            (lib.usetup)(
                &mut status,
                &DATA_UNIT,
                &OUTPUT_UNIT,
                &BUFFER_UNIT,
                &mut n,
                variables.x.as_mut_ptr(),
                variables.lower.as_mut_ptr(),
                variables.upper.as_mut_ptr(),
            )
        };
        NativeStatus::check(status, "cutest_usetup")
    }

    fn setup_constrained(
        &mut self,
        variables: &mut VariableBuffers,
        constraints: &mut ConstraintBuffers,
        ordering: Ordering,
    ) -> Result<(), EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let nvar = variables.x.len();
        let ncon = constraints.lower.len();
        check_len("csetup", nvar, variables.lower.len())?;
        check_len("csetup", nvar, variables.upper.len())?;
        for len in [
            constraints.multipliers.len(),
            constraints.upper.len(),
            constraints.equality.len(),
            constraints.linear.len(),
        ] {
            check_len("csetup", ncon, len)?;
        }
        let mut n = to_integer("csetup", nvar)?;
        let mut m = to_integer("csetup", ncon)?;
        let [e_order, l_order, v_order] = ordering.as_flags();
        let mut status: Integer = 0;
        // SAFETY: variable arrays hold `n` and constraint arrays `m` elements.
        unsafe {
            (lib.csetup)(
                &mut status,
                &DATA_UNIT,
                &OUTPUT_UNIT,
                &BUFFER_UNIT,
                &mut n,
                &mut m,
                variables.x.as_mut_ptr(),
                variables.lower.as_mut_ptr(),
                variables.upper.as_mut_ptr(),
                constraints.multipliers.as_mut_ptr(),
                constraints.lower.as_mut_ptr(),
                constraints.upper.as_mut_ptr(),
                constraints.equality.as_mut_ptr(),
                constraints.linear.as_mut_ptr(),
                &e_order,
                &l_order,
                &v_order,
            )
        };
        NativeStatus::check(status, "cutest_csetup")
    }

    fn hessian_nnz(&mut self, kind: ProblemKind) -> Result<usize, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let (mut status, mut nnzh): (Integer, Integer) = (0, 0);
        let (call, operation) = match kind {
            ProblemKind::Unconstrained => (lib.udimsh, "cutest_udimsh"),
            ProblemKind::Constrained => (lib.cdimsh, "cutest_cdimsh"),
        };
        // SAFETY: scalar arguments only.
        unsafe { call(&mut status, &mut nnzh) };
        NativeStatus::check(status, operation)?;
        Ok(to_count(nnzh))
    }

    fn jacobian_nnz(&mut self) -> Result<usize, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let (mut status, mut nnzj): (Integer, Integer) = (0, 0);
        // SAFETY: scalar arguments only.
        unsafe { (lib.cdimsj)(&mut status, &mut nnzj) };
        NativeStatus::check(status, "cutest_cdimsj")?;
        Ok(to_count(nnzj))
    }

    fn hessian_structure(
        &mut self,
        kind: ProblemKind,
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        check_len("hessian_structure", rows.len(), cols.len())?;
        let (call, operation) = match kind {
            ProblemKind::Unconstrained => (lib.ushp, "cutest_ushp"),
            ProblemKind::Constrained => (lib.cshp, "cutest_cshp"),
        };
        let n = to_integer(operation, self.dims.nvar)?;
        let lh = to_integer(operation, rows.len())?;
        let irnh = prepare_indices(&mut self.index_rows, rows.len());
        let icnh = prepare_indices(&mut self.index_cols, cols.len());
        let (mut status, mut nnzh): (Integer, Integer) = (0, 0);
        // SAFETY: both index arrays hold `lh` elements.
        unsafe {
            call(
                &mut status,
                &n,
                &mut nnzh,
                &lh,
                irnh.as_mut_ptr(),
                icnh.as_mut_ptr(),
            )
        };
        NativeStatus::check(status, operation)?;
        let written = to_count(nnzh).min(rows.len());
        to_zero_based(&self.index_rows[..written], rows);
        to_zero_based(&self.index_cols[..written], cols);
        Ok(written)
    }

    fn jacobian_structure(
        &mut self,
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        check_len("jacobian_structure", rows.len(), cols.len())?;
        let lj = to_integer("cutest_csjp", rows.len())?;
        let jcon = prepare_indices(&mut self.index_rows, rows.len());
        let jvar = prepare_indices(&mut self.index_cols, cols.len());
        let (mut status, mut nnzj): (Integer, Integer) = (0, 0);
        // SAFETY: both index arrays hold `lj` elements.
        unsafe {
            (lib.csjp)(
                &mut status,
                &mut nnzj,
                &lj,
                jvar.as_mut_ptr(),
                jcon.as_mut_ptr(),
            )
        };
        NativeStatus::check(status, "cutest_csjp")?;
        let written = to_count(nnzj).min(rows.len());
        to_zero_based(&self.index_rows[..written], rows);
        to_zero_based(&self.index_cols[..written], cols);
        Ok(written)
    }

    fn objective(&mut self, kind: ProblemKind, x: &[f64]) -> Result<f64, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let n = to_integer("objective", x.len())?;
        let mut status: Integer = 0;
        let mut f: Real = 0.0;
        match kind {
            ProblemKind::Unconstrained => {
                // SAFETY: `x` holds `n` elements.
                unsafe { (lib.ufn)(&mut status, &n, x.as_ptr(), &mut f) };
                NativeStatus::check(status, "cutest_ufn")?;
            }
            ProblemKind::Constrained => {
                self.gradient.clear();
                self.gradient.resize(x.len(), 0.0);
                // SAFETY: `x` and the unused gradient hold `n` elements.
                unsafe {
                    (lib.cofg)(
                        &mut status,
                        &n,
                        x.as_ptr(),
                        &mut f,
                        self.gradient.as_mut_ptr(),
                        &false,
                    )
                };
                NativeStatus::check(status, "cutest_cofg")?;
            }
        }
        Ok(f)
    }

    fn gradient(
        &mut self,
        kind: ProblemKind,
        x: &[f64],
        g: &mut [f64],
    ) -> Result<(), EvaluatorError> {
        check_len("gradient", x.len(), g.len())?;
        match kind {
            ProblemKind::Unconstrained => {
                let lib = loaded(&self.library, &self.path)?;
                let n = to_integer("gradient", x.len())?;
                let mut status: Integer = 0;
                // SAFETY: `x` and `g` hold `n` elements.
                unsafe { (lib.ugr)(&mut status, &n, x.as_ptr(), g.as_mut_ptr()) };
                NativeStatus::check(status, "cutest_ugr")
            }
            ProblemKind::Constrained => self.objective_gradient(kind, x, g).map(|_| ()),
        }
    }

    fn objective_gradient(
        &mut self,
        kind: ProblemKind,
        x: &[f64],
        g: &mut [f64],
    ) -> Result<f64, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        check_len("objective_gradient", x.len(), g.len())?;
        let n = to_integer("objective_gradient", x.len())?;
        let (call, operation) = match kind {
            ProblemKind::Unconstrained => (lib.uofg, "cutest_uofg"),
            ProblemKind::Constrained => (lib.cofg, "cutest_cofg"),
        };
        let mut status: Integer = 0;
        let mut f: Real = 0.0;
        // SAFETY: `x` and `g` hold `n` elements.
        unsafe { call(&mut status, &n, x.as_ptr(), &mut f, g.as_mut_ptr(), &true) };
        NativeStatus::check(status, operation)?;
        Ok(f)
    }

    fn constraints(&mut self, x: &[f64], c: &mut [f64]) -> Result<f64, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let n = to_integer("cutest_cfn", x.len())?;
        let m = to_integer("cutest_cfn", c.len())?;
        let mut status: Integer = 0;
        let mut f: Real = 0.0;
        // SAFETY: `x` holds `n` and `c` holds `m` elements.
        unsafe { (lib.cfn)(&mut status, &n, &m, x.as_ptr(), &mut f, c.as_mut_ptr()) };
        NativeStatus::check(status, "cutest_cfn")?;
        Ok(f)
    }

    fn sparse_jacobian(
        &mut self,
        x: &[f64],
        c: &mut [f64],
        vals: &mut [f64],
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        check_len("sparse_jacobian", vals.len(), rows.len())?;
        check_len("sparse_jacobian", vals.len(), cols.len())?;
        let n = to_integer("cutest_ccfsg", x.len())?;
        let m = to_integer("cutest_ccfsg", c.len())?;
        let lj = to_integer("cutest_ccfsg", vals.len())?;
        let j_fun = prepare_indices(&mut self.index_rows, rows.len());
        let j_var = prepare_indices(&mut self.index_cols, cols.len());
        let (mut status, mut nnzj): (Integer, Integer) = (0, 0);
        // SAFETY: `x` holds `n`, `c` holds `m`, value and index arrays `lj`.
        unsafe {
            (lib.ccfsg)(
                &mut status,
                &n,
                &m,
                x.as_ptr(),
                c.as_mut_ptr(),
                &mut nnzj,
                &lj,
                vals.as_mut_ptr(),
                j_var.as_mut_ptr(),
                j_fun.as_mut_ptr(),
                &true,
            )
        };
        NativeStatus::check(status, "cutest_ccfsg")?;
        let written = to_count(nnzj).min(vals.len());
        to_zero_based(&self.index_rows[..written], rows);
        to_zero_based(&self.index_cols[..written], cols);
        Ok(written)
    }

    fn constraint_gradient(
        &mut self,
        index: usize,
        x: &[f64],
        grad: &mut [f64],
    ) -> Result<f64, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        check_len("constraint_gradient", x.len(), grad.len())?;
        let n = to_integer("cutest_ccifg", x.len())?;
        let icon = to_integer("cutest_ccifg", index + 1)?;
        let mut status: Integer = 0;
        let mut ci: Real = 0.0;
        // SAFETY: `x` and `grad` hold `n` elements.
        unsafe {
            (lib.ccifg)(
                &mut status,
                &n,
                &icon,
                x.as_ptr(),
                &mut ci,
                grad.as_mut_ptr(),
                &true,
            )
        };
        NativeStatus::check(status, "cutest_ccifg")?;
        Ok(ci)
    }

    fn hessian_values(
        &mut self,
        kind: ProblemKind,
        x: &[f64],
        y: Option<&[f64]>,
        vals: &mut [f64],
        rows: &mut [usize],
        cols: &mut [usize],
    ) -> Result<usize, EvaluatorError> {
        check_len("hessian_values", vals.len(), rows.len())?;
        check_len("hessian_values", vals.len(), cols.len())?;
        let n = to_integer("hessian_values", x.len())?;
        let lh = to_integer("hessian_values", vals.len())?;
        let (mut status, mut nnzh): (Integer, Integer) = (0, 0);

        let operation = match kind {
            ProblemKind::Unconstrained => {
                let lib = loaded(&self.library, &self.path)?;
                let irnh = prepare_indices(&mut self.index_rows, rows.len());
                let icnh = prepare_indices(&mut self.index_cols, cols.len());
                // SAFETY: `x` holds `n`, value and index arrays `lh` elements.
                unsafe {
                    (lib.ush)(
                        &mut status,
                        &n,
                        x.as_ptr(),
                        &mut nnzh,
                        &lh,
                        vals.as_mut_ptr(),
                        irnh.as_mut_ptr(),
                        icnh.as_mut_ptr(),
                    )
                };
                "cutest_ush"
            }
            ProblemKind::Constrained => {
                if y.is_none() {
                    self.zero_multipliers();
                }
                let multipliers = y.unwrap_or(self.zeros.as_slice());
                let m = to_integer("cutest_csh", multipliers.len())?;
                let lib = loaded(&self.library, &self.path)?;
                let irnh = prepare_indices(&mut self.index_rows, rows.len());
                let icnh = prepare_indices(&mut self.index_cols, cols.len());
                // SAFETY: `x` holds `n`, `multipliers` `m`, value and index
                // arrays `lh` elements.
                unsafe {
                    (lib.csh)(
                        &mut status,
                        &n,
                        &m,
                        x.as_ptr(),
                        multipliers.as_ptr(),
                        &mut nnzh,
                        &lh,
                        vals.as_mut_ptr(),
                        irnh.as_mut_ptr(),
                        icnh.as_mut_ptr(),
                    )
                };
                "cutest_csh"
            }
        };
        NativeStatus::check(status, operation)?;
        let written = to_count(nnzh).min(vals.len());
        to_zero_based(&self.index_rows[..written], rows);
        to_zero_based(&self.index_cols[..written], cols);
        Ok(written)
    }

    fn hessian_product(
        &mut self,
        kind: ProblemKind,
        x: &[f64],
        y: Option<&[f64]>,
        v: &[f64],
        out: &mut [f64],
    ) -> Result<(), EvaluatorError> {
        check_len("hessian_product", x.len(), v.len())?;
        check_len("hessian_product", x.len(), out.len())?;
        let n = to_integer("hessian_product", x.len())?;
        let mut status: Integer = 0;
        match kind {
            ProblemKind::Unconstrained => {
                let lib = loaded(&self.library, &self.path)?;
                // SAFETY: `x`, `v` and `out` hold `n` elements.
                unsafe {
                    (lib.uhprod)(
                        &mut status,
                        &n,
                        &false,
                        x.as_ptr(),
                        v.as_ptr(),
                        out.as_mut_ptr(),
                    )
                };
                NativeStatus::check(status, "cutest_uhprod")
            }
            ProblemKind::Constrained => {
                if y.is_none() {
                    self.zero_multipliers();
                }
                let multipliers = y.unwrap_or(self.zeros.as_slice());
                let m = to_integer("cutest_chprod", multipliers.len())?;
                let lib = loaded(&self.library, &self.path)?;
                // SAFETY: `x`, `v` and `out` hold `n`, `multipliers` `m` elements.
                unsafe {
                    (lib.chprod)(
                        &mut status,
                        &n,
                        &m,
                        &false,
                        x.as_ptr(),
                        multipliers.as_ptr(),
                        v.as_ptr(),
                        out.as_mut_ptr(),
                    )
                };
                NativeStatus::check(status, "cutest_chprod")
            }
        }
    }

    fn jacobian_product(
        &mut self,
        x: &[f64],
        v: &[f64],
        out: &mut [f64],
        transpose: bool,
    ) -> Result<(), EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let (nvar, ncon) = if transpose {
            (out.len(), v.len())
        } else {
            (v.len(), out.len())
        };
        check_len("jacobian_product", nvar, x.len())?;
        let n = to_integer("cutest_cjprod", nvar)?;
        let m = to_integer("cutest_cjprod", ncon)?;
        let lp = to_integer("cutest_cjprod", v.len())?;
        let lr = to_integer("cutest_cjprod", out.len())?;
        let mut status: Integer = 0;
        // SAFETY: `x` holds `n`, `v` holds `lp` and `out` holds `lr` elements.
        unsafe {
            (lib.cjprod)(
                &mut status,
                &n,
                &m,
                &false,
                &transpose,
                x.as_ptr(),
                v.as_ptr(),
                &lp,
                out.as_mut_ptr(),
                &lr,
            )
        };
        NativeStatus::check(status, "cutest_cjprod")
    }

    fn names(
        &mut self,
        kind: ProblemKind,
        dims: Dimensions,
    ) -> Result<ProblemNames, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let n = to_integer("names", dims.nvar)?;
        let m = to_integer("names", dims.ncon)?;
        let mut pname = [b' '; NAME_WIDTH];
        let mut vnames = vec![b' '; dims.nvar * NAME_WIDTH];
        let mut cnames = vec![b' '; dims.ncon * NAME_WIDTH];
        let mut status: Integer = 0;
        let operation = match kind {
            ProblemKind::Unconstrained => {
                // SAFETY: name blocks hold `NAME_WIDTH` bytes per entry.
                unsafe {
                    (lib.unames)(
                        &mut status,
                        &n,
                        pname.as_mut_ptr().cast(),
                        vnames.as_mut_ptr().cast(),
                    )
                };
                "cutest_unames"
            }
            ProblemKind::Constrained => {
                // SAFETY: name blocks hold `NAME_WIDTH` bytes per entry.
                unsafe {
                    (lib.cnames)(
                        &mut status,
                        &n,
                        &m,
                        pname.as_mut_ptr().cast(),
                        vnames.as_mut_ptr().cast(),
                        cnames.as_mut_ptr().cast(),
                    )
                };
                "cutest_cnames"
            }
        };
        NativeStatus::check(status, operation)?;
        Ok(ProblemNames {
            problem: split_names(&pname, 1).pop().unwrap_or_default(),
            variables: split_names(&vnames, dims.nvar),
            constraints: split_names(&cnames, dims.ncon),
        })
    }

    fn report(&mut self, kind: ProblemKind) -> Result<NativeReport, EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let mut calls: [Real; 7] = [0.0; 7];
        let mut time: [Real; 2] = [0.0; 2];
        let mut status: Integer = 0;
        let (call, operation) = match kind {
            ProblemKind::Unconstrained => (lib.ureport, "cutest_ureport"),
            ProblemKind::Constrained => (lib.creport, "cutest_creport"),
        };
        // SAFETY: `calls` has room for the seven constrained counters.
        unsafe { call(&mut status, calls.as_mut_ptr(), time.as_mut_ptr()) };
        NativeStatus::check(status, operation)?;
        let constrained = kind.is_constrained();
        Ok(NativeReport {
            objective_calls: calls[0],
            gradient_calls: calls[1],
            hessian_calls: calls[2],
            hessian_product_calls: calls[3],
            constraint_calls: constrained.then_some(calls[4]),
            constraint_gradient_calls: constrained.then_some(calls[5]),
            constraint_hessian_calls: constrained.then_some(calls[6]),
            setup_time: time[0],
            run_time: time[1],
        })
    }

    fn terminate(&mut self, kind: ProblemKind) -> Result<(), EvaluatorError> {
        let lib = loaded(&self.library, &self.path)?;
        let mut status: Integer = 0;
        let (call, operation) = match kind {
            ProblemKind::Unconstrained => (lib.uterminate, "cutest_uterminate"),
            ProblemKind::Constrained => (lib.cterminate, "cutest_cterminate"),
        };
        // SAFETY: scalar argument only.
        unsafe { call(&mut status) };
        NativeStatus::check(status, operation)
    }

    fn unload(&mut self) {
        if self.library.take().is_some() {
            tracing::debug!(
                component = "native",
                operation = "unload",
                status = "success",
                path = %self.path.display(),
                "Unloaded evaluator module"
            );
        }
    }
}
