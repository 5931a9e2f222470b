//! Versioned JSON snapshots of a `MemoryStore`.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use glimpse_types::models::Story;

use crate::memory::MemoryStore;

/// Errors from snapshot persistence.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorySnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub stories: Vec<Story>,
}

impl StorySnapshot {
    pub fn capture(store: &MemoryStore, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            stories: store.all_stories(),
        }
    }

    /// Writes to a sibling temp file first, then renames over `path`.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        info!("Saved {} stories to {}", self.stories.len(), path.display());
        Ok(())
    }

    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path).await?;
        let snapshot: Self = serde_json::from_str(&content)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }

        Ok(snapshot)
    }

    pub fn into_store(self) -> MemoryStore {
        MemoryStore::from_stories(self.stories)
    }
}
