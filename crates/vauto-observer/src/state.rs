//! Shared application state for the operator API.
//!
//! [`AppState`] holds the assembled [`Runtime`] and the optional plan
//! store. Handlers receive it through Axum's `State` extractor wrapped in
//! an [`Arc`].

use std::sync::Arc;

use tracing::warn;
use vauto_core::{PlanStore, Runtime};

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// The engine, scheduler, conveyor and loop controls.
    pub runtime: Runtime,
    /// Where accepted plans are persisted, if anywhere.
    pub store: Option<Arc<dyn PlanStore>>,
}

impl AppState {
    /// Create state without persistence.
    pub const fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            store: None,
        }
    }

    /// Create state that persists plan changes to `store`.
    pub fn with_store(runtime: Runtime, store: Arc<dyn PlanStore>) -> Self {
        Self {
            runtime,
            store: Some(store),
        }
    }

    /// Write the current definition of a loaded plan to the store.
    ///
    /// A store failure is logged and does not undo the in-memory change.
    pub fn persist(&self, plan_id: &str) {
        let Some(store) = &self.store else {
            return;
        };
        let Some(plan) = self.runtime.engine.get_plan(plan_id) else {
            return;
        };
        if let Err(e) = store.save(&plan) {
            warn!(plan_id, error = %e, "Failed to persist plan");
        }
    }

    /// Drop a plan from the store.
    pub fn forget(&self, plan_id: &str) {
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(plan_id) {
                warn!(plan_id, error = %e, "Failed to remove stored plan");
            }
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("runtime", &self.runtime)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}
