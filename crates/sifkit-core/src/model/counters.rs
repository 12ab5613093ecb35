//! Per-routine evaluation counters.

use serde::Serialize;

/// Successful evaluation calls since creation or the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counters {
    pub neval_obj: u64,
    pub neval_grad: u64,
    pub neval_cons: u64,
    /// Single-constraint evaluations.
    pub neval_jcon: u64,
    /// Single-constraint gradient evaluations.
    pub neval_jgrad: u64,
    pub neval_jac: u64,
    pub neval_jprod: u64,
    pub neval_jtprod: u64,
    pub neval_hess: u64,
    pub neval_hprod: u64,
}

impl Counters {
    /// Total number of counted evaluations.
    pub fn sum(&self) -> u64 {
        self.neval_obj
            + self.neval_grad
            + self.neval_cons
            + self.neval_jcon
            + self.neval_jgrad
            + self.neval_jac
            + self.neval_jprod
            + self.neval_jtprod
            + self.neval_hess
            + self.neval_hprod
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
