// Loading and saving the task list through a key-value store

use crate::error::TaskError;
use crate::storage::KeyValueStore;
use crate::task::Task;
use eyre::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Default storage key for the task list
pub const DEFAULT_KEY: &str = "tasks";

/// Serialize the full list under `key`
pub fn save_tasks<S: KeyValueStore + ?Sized>(storage: &mut S, key: &str, tasks: &[Task]) -> Result<()> {
    let payload = serde_json::to_string(tasks).context("Failed to serialize task list")?;
    storage.set(key, &payload)?;
    debug!(key, count = tasks.len(), "Persisted task list");
    Ok(())
}

/// Read the list stored under `key`
///
/// A missing key and a payload that fails to parse both yield an empty list.
/// Only storage failures are returned as errors.
pub fn load_tasks<S: KeyValueStore + ?Sized>(storage: &S, key: &str) -> Result<Vec<Task>> {
    let Some(payload) = storage.get(key)? else {
        debug!(key, "No persisted task list, starting empty");
        return Ok(Vec::new());
    };

    match parse_payload(&payload) {
        Ok(tasks) => {
            info!(key, count = tasks.len(), "Loaded persisted task list");
            Ok(tasks)
        }
        Err(e) => {
            warn!(key, error = %e, "Discarding persisted task list");
            Ok(Vec::new())
        }
    }
}

/// Parse a stored payload, dropping entries that break list invariants
pub fn parse_payload(payload: &str) -> std::result::Result<Vec<Task>, TaskError> {
    let tasks: Vec<Task> =
        serde_json::from_str(payload).map_err(|e| TaskError::MalformedPersistedState(e.to_string()))?;
    Ok(sanitize(tasks))
}

/// Trim task text, then drop blank tasks and repeated ids (first one wins)
pub fn sanitize(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(tasks.len());

    for mut task in tasks {
        let trimmed = task.text.trim();
        if trimmed.is_empty() {
            warn!(id = %task.id, "Skipping task with empty text");
            continue;
        }
        if !seen.insert(task.id) {
            warn!(id = %task.id, "Skipping task with duplicate id");
            continue;
        }
        if trimmed.len() != task.text.len() {
            task.text = trimmed.to_string();
        }
        kept.push(task);
    }

    kept
}
