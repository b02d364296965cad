use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Durable record of what has already been synchronized.
///
/// Call ids only move `unseen -> synced`, and only after the writer
/// acknowledges persistence. The set is ordered so snapshots serialize
/// deterministically.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncState {
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    pub synced_call_ids: BTreeSet<String>,
}

impl SyncState {
    pub fn is_synced(&self, call_id: &str) -> bool {
        self.synced_call_ids.contains(call_id)
    }

    pub fn mark_synced(&mut self, call_id: &str) {
        self.synced_call_ids.insert(call_id.to_string());
    }

    pub fn synced_count(&self) -> usize {
        self.synced_call_ids.len()
    }
}

/// Load/save collaborator for the persisted state.
pub trait StateStore {
    /// Tolerant load: absent or malformed state yields an empty state, not
    /// an error.
    fn load(&self) -> SyncState;

    /// Snapshot save; must not leave the old state partially overwritten.
    fn save(&self, state: &SyncState) -> Result<()>;
}

/// File-backed store with a tmp-file + rename save.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> SyncState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return SyncState::default(),
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    "State file {:?} is unreadable ({}); starting from empty state",
                    self.path, err
                );
                SyncState::default()
            }
        }
    }

    fn save(&self, state: &SyncState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create state directory {parent:?}"))?;
            }
        }

        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

        // Write the new snapshot beside the target and rename over it, so a
        // crash mid-save cannot corrupt the previous state.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write state to {tmp:?}"))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move state into place at {:?}", self.path))?;
        Ok(())
    }
}
