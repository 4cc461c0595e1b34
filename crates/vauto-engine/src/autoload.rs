//! Startup loading of stored plans.

use tracing::{info, warn};
use vauto_core::{ExecutionEngine, PlanStore};

/// Counts from one autoload pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoloadReport {
    /// Plans validated and registered.
    pub loaded: usize,
    /// Plans that failed to read or validate.
    pub failed: usize,
}

/// Load every stored plan into the engine.
///
/// A plan that cannot be read or fails validation is logged and skipped;
/// it never stops startup.
pub fn load_stored_plans(store: &dyn PlanStore, engine: &ExecutionEngine) -> AutoloadReport {
    let mut report = AutoloadReport::default();
    let ids = match store.list() {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "Could not list stored plans");
            return report;
        }
    };

    for id in ids {
        match store.load(id.as_str()) {
            Ok(Some(plan)) => {
                let result = engine.load(plan);
                if result.success {
                    report.loaded = report.loaded.saturating_add(1);
                    info!(plan_id = %id, "Stored plan loaded");
                } else {
                    report.failed = report.failed.saturating_add(1);
                    warn!(plan_id = %id, error = ?result.error, "Stored plan rejected");
                }
            }
            Ok(None) => {}
            Err(e) => {
                report.failed = report.failed.saturating_add(1);
                warn!(plan_id = %id, error = %e, "Stored plan unreadable");
            }
        }
    }
    report
}
