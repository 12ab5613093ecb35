//! Dynamic bindings to the entry points of a compiled evaluator module.
//!
//! Every problem is built into its own shared library that exports the
//! CUTEst C-interoperable interface. Symbols are resolved once at load time
//! and the [`Library`] is kept alive next to the function pointers.
#![allow(unsafe_code)]

use std::ffi::c_char;
use std::path::Path;

use libloading::Library;
use sifkit_evaluator::EvaluatorError;

/// Fortran `integer`.
pub type Integer = i32;
/// Fortran `double precision`.
pub type Real = f64;
/// Fortran `logical(c_bool)`.
pub type Logical = bool;

/// Logical unit the data file is opened on.
pub const DATA_UNIT: Integer = 42;
/// Unit receiving evaluator diagnostics (standard output).
pub const OUTPUT_UNIT: Integer = 6;
/// Scratch unit used by the evaluator for internal buffering.
pub const BUFFER_UNIT: Integer = 11;
/// Width of a Fortran name field.
pub const NAME_WIDTH: usize = 10;

// Data unit
type FortranOpenFn =
    unsafe extern "C" fn(funit: *const Integer, fname: *const c_char, ierr: *mut Integer);
type FortranCloseFn = unsafe extern "C" fn(funit: *const Integer, ierr: *mut Integer);

// Setup
type CdimenFn = unsafe extern "C" fn(
    status: *mut Integer,
    funit: *const Integer,
    n: *mut Integer,
    m: *mut Integer,
);
type UsetupFn = unsafe extern "C" fn(
    status: *mut Integer,
    funit: *const Integer,
    iout: *const Integer,
    io_buffer: *const Integer,
    n: *mut Integer,
    x: *mut Real,
    bl: *mut Real,
    bu: *mut Real,
);
type CsetupFn = unsafe extern "C" fn(
    status: *mut Integer,
    funit: *const Integer,
    iout: *const Integer,
    io_buffer: *const Integer,
    n: *mut Integer,
    m: *mut Integer,
    x: *mut Real,
    bl: *mut Real,
    bu: *mut Real,
    v: *mut Real,
    cl: *mut Real,
    cu: *mut Real,
    equatn: *mut Logical,
    linear: *mut Logical,
    e_order: *const Integer,
    l_order: *const Integer,
    v_order: *const Integer,
);

// Sizes and patterns
type DimFn = unsafe extern "C" fn(status: *mut Integer, nnz: *mut Integer);
type HessPatternFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    nnzh: *mut Integer,
    lh: *const Integer,
    irnh: *mut Integer,
    icnh: *mut Integer,
);
type CsjpFn = unsafe extern "C" fn(
    status: *mut Integer,
    nnzj: *mut Integer,
    lj: *const Integer,
    jvar: *mut Integer,
    jcon: *mut Integer,
);

// Values and derivatives
type UfnFn =
    unsafe extern "C" fn(status: *mut Integer, n: *const Integer, x: *const Real, f: *mut Real);
type UgrFn =
    unsafe extern "C" fn(status: *mut Integer, n: *const Integer, x: *const Real, g: *mut Real);
type OfgFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    x: *const Real,
    f: *mut Real,
    g: *mut Real,
    grad: *const Logical,
);
type CfnFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    m: *const Integer,
    x: *const Real,
    f: *mut Real,
    c: *mut Real,
);
type CcfsgFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    m: *const Integer,
    x: *const Real,
    c: *mut Real,
    nnzj: *mut Integer,
    lj: *const Integer,
    j_val: *mut Real,
    j_var: *mut Integer,
    j_fun: *mut Integer,
    grad: *const Logical,
);
type CcifgFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    icon: *const Integer,
    x: *const Real,
    ci: *mut Real,
    gci: *mut Real,
    grad: *const Logical,
);
type UshFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    x: *const Real,
    nnzh: *mut Integer,
    lh: *const Integer,
    h: *mut Real,
    irnh: *mut Integer,
    icnh: *mut Integer,
);
type CshFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    m: *const Integer,
    x: *const Real,
    y: *const Real,
    nnzh: *mut Integer,
    lh: *const Integer,
    h: *mut Real,
    irnh: *mut Integer,
    icnh: *mut Integer,
);
type UhprodFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    goth: *const Logical,
    x: *const Real,
    p: *const Real,
    r: *mut Real,
);
type ChprodFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    m: *const Integer,
    goth: *const Logical,
    x: *const Real,
    y: *const Real,
    p: *const Real,
    q: *mut Real,
);
type CjprodFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    m: *const Integer,
    gotj: *const Logical,
    jtrans: *const Logical,
    x: *const Real,
    p: *const Real,
    lp: *const Integer,
    r: *mut Real,
    lr: *const Integer,
);

// Names, reports, termination
type UnamesFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    pname: *mut c_char,
    vnames: *mut c_char,
);
type CnamesFn = unsafe extern "C" fn(
    status: *mut Integer,
    n: *const Integer,
    m: *const Integer,
    pname: *mut c_char,
    vnames: *mut c_char,
    cnames: *mut c_char,
);
type ReportFn = unsafe extern "C" fn(status: *mut Integer, calls: *mut Real, time: *mut Real);
type TerminateFn = unsafe extern "C" fn(status: *mut Integer);

/// A loaded evaluator module and its resolved entry points.
pub struct CutestLibrary {
    _library: Library,

    pub fortran_open: FortranOpenFn,
    pub fortran_close: FortranCloseFn,

    pub cdimen: CdimenFn,
    pub usetup: UsetupFn,
    pub csetup: CsetupFn,

    pub udimsh: DimFn,
    pub cdimsh: DimFn,
    pub cdimsj: DimFn,
    pub ushp: HessPatternFn,
    pub cshp: HessPatternFn,
    pub csjp: CsjpFn,

    pub ufn: UfnFn,
    pub ugr: UgrFn,
    pub uofg: OfgFn,
    pub cofg: OfgFn,
    pub cfn: CfnFn,
    pub ccfsg: CcfsgFn,
    pub ccifg: CcifgFn,
    pub ush: UshFn,
    pub csh: CshFn,
    pub uhprod: UhprodFn,
    pub chprod: ChprodFn,
    pub cjprod: CjprodFn,

    pub unames: UnamesFn,
    pub cnames: CnamesFn,
    pub ureport: ReportFn,
    pub creport: ReportFn,
    pub uterminate: TerminateFn,
    pub cterminate: TerminateFn,
}

impl std::fmt::Debug for CutestLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CutestLibrary").finish_non_exhaustive()
    }
}

/// Copy a function pointer out of `library`.
///
/// # Safety
///
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T, EvaluatorError> {
    // SAFETY: upheld by the caller.
    let found = unsafe { library.get::<T>(name.as_bytes()) };
    found
        .map(|sym| *sym)
        .map_err(|err| EvaluatorError::SymbolMissing {
            symbol: name.to_string(),
            reason: err.to_string(),
        })
}

impl CutestLibrary {
    /// Load the module at `path` and resolve every entry point.
    pub fn load(path: &Path) -> Result<Self, EvaluatorError> {
        // SAFETY: evaluator modules run no initialisation code beyond the
        // Fortran runtime's.
        let library = unsafe { Library::new(path) }.map_err(|err| EvaluatorError::LibraryLoad {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;

        // SAFETY: each type alias mirrors the C prototype of the symbol.
        unsafe {
            Ok(Self {
                fortran_open: symbol(&library, "fortran_open_")?,
                fortran_close: symbol(&library, "fortran_close_")?,
                cdimen: symbol(&library, "cutest_cdimen_")?,
                usetup: symbol(&library, "cutest_usetup_")?,
                csetup: symbol(&library, "cutest_cint_csetup_")?,
                udimsh: symbol(&library, "cutest_udimsh_")?,
                cdimsh: symbol(&library, "cutest_cdimsh_")?,
                cdimsj: symbol(&library, "cutest_cdimsj_")?,
                ushp: symbol(&library, "cutest_ushp_")?,
                cshp: symbol(&library, "cutest_cshp_")?,
                csjp: symbol(&library, "cutest_csjp_")?,
                ufn: symbol(&library, "cutest_ufn_")?,
                ugr: symbol(&library, "cutest_ugr_")?,
                uofg: symbol(&library, "cutest_cint_uofg_")?,
                cofg: symbol(&library, "cutest_cint_cofg_")?,
                cfn: symbol(&library, "cutest_cfn_")?,
                ccfsg: symbol(&library, "cutest_cint_ccfsg_")?,
                ccifg: symbol(&library, "cutest_cint_ccifg_")?,
                ush: symbol(&library, "cutest_ush_")?,
                csh: symbol(&library, "cutest_csh_")?,
                uhprod: symbol(&library, "cutest_cint_uhprod_")?,
                chprod: symbol(&library, "cutest_cint_chprod_")?,
                cjprod: symbol(&library, "cutest_cint_cjprod_")?,
                unames: symbol(&library, "cutest_unames_")?,
                cnames: symbol(&library, "cutest_cnames_")?,
                ureport: symbol(&library, "cutest_ureport_")?,
                creport: symbol(&library, "cutest_creport_")?,
                uterminate: symbol(&library, "cutest_uterminate_")?,
                cterminate: symbol(&library, "cutest_cterminate_")?,
                _library: library,
            })
        }
    }
}

/// Convert a Rust length to a Fortran integer.
pub fn to_integer(operation: &'static str, value: usize) -> Result<Integer, EvaluatorError> {
    Integer::try_from(value).map_err(|_| EvaluatorError::DimensionMismatch {
        operation,
        expected: Integer::MAX as usize,
        got: value,
    })
}

/// Convert a non-negative Fortran count to a Rust length.
pub fn to_count(value: Integer) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Copy one-based Fortran indices into zero-based Rust indices.
pub fn to_zero_based(from: &[Integer], to: &mut [usize]) {
    for (dst, src) in to.iter_mut().zip(from) {
        *dst = to_count(src.saturating_sub(1));
    }
}

/// Split a blank-padded block of fixed-width Fortran names.
pub fn split_names(block: &[u8], count: usize) -> Vec<String> {
    block
        .chunks(NAME_WIDTH)
        .take(count)
        .map(|name| String::from_utf8_lossy(name).trim_end().to_string())
        .collect()
}
