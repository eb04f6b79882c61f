use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::common::error::{Result, ScraperError};
use crate::common::types::CanonicalEvent;

/// Persistence for the previous run's output
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The last saved snapshot; empty when there is none
    async fn load(&self) -> Result<Vec<CanonicalEvent>>;
    async fn save(&self, events: &[CanonicalEvent]) -> Result<()>;
}

/// Snapshot kept as a pretty-printed JSON array on disk
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<CanonicalEvent>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Vec<CanonicalEvent>>(&content) {
            Ok(events) => {
                debug!(path = %self.path.display(), events = events.len(), "Loaded snapshot");
                Ok(events)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Snapshot unreadable, starting empty");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, events: &[CanonicalEvent]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(events)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), events = events.len(), "Saved snapshot");
        Ok(())
    }
}

/// In-memory store for development/testing
#[derive(Default)]
pub struct InMemoryStore {
    events: Mutex<Vec<CanonicalEvent>>,
}

impl InMemoryStore {
    pub fn new(events: Vec<CanonicalEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn load(&self) -> Result<Vec<CanonicalEvent>> {
        self.events
            .lock()
            .map(|events| events.clone())
            .map_err(|_| ScraperError::Api { message: "snapshot lock poisoned".into() })
    }

    async fn save(&self, events: &[CanonicalEvent]) -> Result<()> {
        let mut stored = self
            .events
            .lock()
            .map_err(|_| ScraperError::Api { message: "snapshot lock poisoned".into() })?;
        *stored = events.to_vec();
        Ok(())
    }
}
