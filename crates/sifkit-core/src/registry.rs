//! Process-wide registry of the active model.
//!
//! Evaluator modules are dynamically loaded code with global state, so two
//! problems resident at the same time would collide on symbol names. The
//! registry admits at most one active model; a [`Lease`] holds the slot for
//! the lifetime of that model.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::model::ModelError;

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

/// Single-slot registry of the resident problem.
#[derive(Debug, Default)]
pub struct Registry {
    active: Mutex<Option<String>>,
}

impl Registry {
    /// Create a private registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> Arc<Registry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Registry::new())))
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Claim the slot for `problem`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::AlreadyActive`] if another model holds the slot.
    pub fn try_acquire(self: &Arc<Self>, problem: &str) -> Result<Lease, ModelError> {
        let mut slot = self.slot();
        if let Some(active) = slot.as_ref() {
            tracing::warn!(
                component = "registry",
                operation = "acquire",
                status = "error",
                requested = problem,
                active = active.as_str(),
                "Model already active"
            );
            return Err(ModelError::AlreadyActive {
                active: active.clone(),
            });
        }
        *slot = Some(problem.to_string());
        tracing::debug!(
            component = "registry",
            operation = "acquire",
            status = "success",
            problem,
            "Acquired model slot"
        );
        Ok(Lease {
            registry: Arc::clone(self),
            problem: problem.to_string(),
            held: true,
        })
    }

    /// Number of active models (0 or 1).
    pub fn active_count(&self) -> usize {
        usize::from(self.slot().is_some())
    }

    /// Name of the resident problem, if any.
    pub fn active_problem(&self) -> Option<String> {
        self.slot().clone()
    }

    /// Free the slot; returns false when it was already free.
    fn release(&self) -> bool {
        let released = self.slot().take();
        if let Some(problem) = released.as_deref() {
            tracing::debug!(
                component = "registry",
                operation = "release",
                status = "success",
                problem,
                "Released model slot"
            );
        }
        released.is_some()
    }
}

/// The registry slot held by a live model.
#[derive(Debug)]
pub struct Lease {
    registry: Arc<Registry>,
    problem: String,
    held: bool,
}

impl Lease {
    pub fn problem(&self) -> &str {
        &self.problem
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Free the slot. Releasing twice is a no-op.
    pub fn release(&mut self) {
        if self.held {
            self.held = false;
            self.registry.release();
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let registry = Arc::new(Registry::new());
        assert_eq!(registry.active_count(), 0);

        let mut lease = registry
            .try_acquire("ROSENBR")
            .unwrap_or_else(|err| panic!("{}", err));
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.active_problem().as_deref(), Some("ROSENBR"));
        assert_eq!(lease.problem(), "ROSENBR");

        lease.release();
        assert!(!lease.is_held());
        assert_eq!(registry.active_count(), 0);
        assert!(registry.active_problem().is_none());
    }

    #[test]
    fn test_second_acquire_fails_without_touching_first() {
        let registry = Arc::new(Registry::new());
        let _lease = registry
            .try_acquire("HS21")
            .unwrap_or_else(|err| panic!("{}", err));

        let err = registry.try_acquire("HS35").unwrap_err();
        assert_eq!(
            err,
            ModelError::AlreadyActive {
                active: "HS21".to_string()
            }
        );
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.active_problem().as_deref(), Some("HS21"));
    }

    #[test]
    fn test_double_release_does_not_underflow() {
        let registry = Arc::new(Registry::new());
        let mut lease = registry
            .try_acquire("HS21")
            .unwrap_or_else(|err| panic!("{}", err));
        lease.release();
        lease.release();
        drop(lease);
        assert_eq!(registry.active_count(), 0);
        assert!(!registry.release());
    }

    #[test]
    fn test_drop_releases_slot() {
        let registry = Arc::new(Registry::new());
        {
            let _lease = registry
                .try_acquire("HS21")
                .unwrap_or_else(|err| panic!("{}", err));
            assert_eq!(registry.active_count(), 1);
        }
        assert_eq!(registry.active_count(), 0);
        assert!(registry.try_acquire("HS35").is_ok());
    }

    #[test]
    fn test_global_registry_is_shared() {
        assert!(Arc::ptr_eq(&Registry::global(), &Registry::global()));
    }
}
