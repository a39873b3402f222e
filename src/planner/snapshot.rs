use super::types::Plan;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SNAPSHOT_VERSION: u32 = 1;

/// A plan frozen with every step's state, including a pending confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub version: u32,
    pub plan_id: String,
    pub saved_at: DateTime<Utc>,
    pub plan: Plan,
}

impl PlanSnapshot {
    pub fn capture(plan: &Plan) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            plan_id: plan.id.clone(),
            saved_at: Utc::now(),
            plan: plan.clone(),
        }
    }

    pub fn restore(self) -> Result<Plan, StoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion(self.version));
        }
        Ok(self.plan)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let snapshot: Self = serde_json::from_str(raw)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }
}

/// Keyed storage for plan snapshots.
pub trait PlanStore: Send + Sync {
    fn save(&self, snapshot: &PlanSnapshot) -> Result<(), StoreError>;

    fn load(&self, plan_id: &str) -> Result<PlanSnapshot, StoreError>;

    /// Returns whether a snapshot existed.
    fn delete(&self, plan_id: &str) -> Result<bool, StoreError>;

    /// Stored plan ids, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    fn save_plan(&self, plan: &Plan) -> Result<(), StoreError> {
        self.save(&PlanSnapshot::capture(plan))
    }

    fn load_plan(&self, plan_id: &str) -> Result<Plan, StoreError> {
        self.load(plan_id)?.restore()
    }
}

#[derive(Default)]
pub struct InMemoryPlanStore {
    snapshots: Mutex<HashMap<String, PlanSnapshot>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PlanSnapshot>> {
        self.snapshots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PlanStore for InMemoryPlanStore {
    fn save(&self, snapshot: &PlanSnapshot) -> Result<(), StoreError> {
        self.lock()
            .insert(snapshot.plan_id.clone(), snapshot.clone());
        Ok(())
    }

    fn load(&self, plan_id: &str) -> Result<PlanSnapshot, StoreError> {
        self.lock()
            .get(plan_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(plan_id.to_string()))
    }

    fn delete(&self, plan_id: &str) -> Result<bool, StoreError> {
        Ok(self.lock().remove(plan_id).is_some())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// One pretty-printed JSON file per plan, written atomically.
pub struct JsonFilePlanStore {
    dir: PathBuf,
}

impl JsonFilePlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, plan_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(plan_id)))
    }
}

/// Plan ids become file names; anything outside `[A-Za-z0-9_-]` is replaced.
fn file_stem(plan_id: &str) -> String {
    plan_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content)?;
    if let Err(rename_error) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(rename_error.into());
    }
    Ok(())
}

impl PlanStore for JsonFilePlanStore {
    fn save(&self, snapshot: &PlanSnapshot) -> Result<(), StoreError> {
        write_atomic(&self.path_for(&snapshot.plan_id), &snapshot.to_json()?)?;
        tracing::debug!(plan_id = %snapshot.plan_id, dir = %self.dir.display(), "snapshot saved");
        Ok(())
    }

    fn load(&self, plan_id: &str) -> Result<PlanSnapshot, StoreError> {
        let path = self.path_for(plan_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(plan_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        PlanSnapshot::from_json(&raw)
    }

    fn delete(&self, plan_id: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(plan_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Ok(raw) = fs::read_to_string(&path)
                && let Ok(snapshot) = PlanSnapshot::from_json(&raw)
            {
                ids.push(snapshot.plan_id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
