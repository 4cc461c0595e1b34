//! Plan document storage.
//!
//! [`PlanStore`] persists plan definitions between restarts. The
//! [`JsonPlanStore`] keeps one pretty-printed JSON document per plan in a
//! directory, named `<plan id>.json`. Live state is never written.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use vauto_types::{LiveState, Plan, PlanId};

/// Errors returned by plan storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage directory or a document could not be read or written.
    #[error("plan store I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A document is not a valid plan.
    #[error("plan document is not valid JSON: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The plan id cannot be used as a file name.
    #[error("plan id '{0}' cannot be stored: only letters, digits, '-', '_' and '.' are allowed")]
    InvalidId(String),
}

/// Persistence of plan definitions by id.
pub trait PlanStore: Send + Sync {
    /// Write a plan, replacing any stored copy.
    fn save(&self, plan: &Plan) -> Result<(), StoreError>;

    /// Read one plan. `Ok(None)` when nothing is stored under the id.
    fn load(&self, plan_id: &str) -> Result<Option<Plan>, StoreError>;

    /// Ids of every stored plan, sorted.
    fn list(&self) -> Result<Vec<PlanId>, StoreError>;

    /// Delete a stored plan. Returns whether anything was removed.
    fn remove(&self, plan_id: &str) -> Result<bool, StoreError>;
}

/// One JSON document per plan in a directory.
#[derive(Debug, Clone)]
pub struct JsonPlanStore {
    directory: PathBuf,
}

impl JsonPlanStore {
    /// Open a store, creating the directory if needed.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        info!(directory = %directory.display(), "Plan store opened");
        Ok(Self { directory })
    }

    /// The directory documents live in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, plan_id: &str) -> Result<PathBuf, StoreError> {
        let usable = !plan_id.is_empty()
            && !plan_id.starts_with('.')
            && plan_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !usable {
            return Err(StoreError::InvalidId(plan_id.to_owned()));
        }
        Ok(self.directory.join(format!("{plan_id}.json")))
    }
}

impl PlanStore for JsonPlanStore {
    fn save(&self, plan: &Plan) -> Result<(), StoreError> {
        let path = self.path_for(plan.plan_id.as_str())?;
        let mut document = plan.clone();
        document.live = LiveState::default();
        let json = serde_json::to_string_pretty(&document)?;

        // Write then rename so a crash never leaves a truncated document.
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, &path)?;
        debug!(plan_id = %plan.plan_id, path = %path.display(), "Plan saved");
        Ok(())
    }

    fn load(&self, plan_id: &str) -> Result<Option<Plan>, StoreError> {
        let path = self.path_for(plan_id)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let plan: Plan = serde_json::from_str(&contents)?;
        if plan.plan_id.as_str() != plan_id {
            warn!(
                plan_id,
                stored_id = %plan.plan_id,
                "Stored plan id differs from its file name"
            );
        }
        Ok(Some(plan))
    }

    fn list(&self) -> Result<Vec<PlanId>, StoreError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(PlanId::new(stem));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn remove(&self, plan_id: &str) -> Result<bool, StoreError> {
        let path = self.path_for(plan_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(plan_id, "Stored plan removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
