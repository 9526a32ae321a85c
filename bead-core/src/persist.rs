//! Session persistence.
//!
//! A session lives in a single named slot holding a JSON document with the
//! message history and the current trajectory state. Slots are abstracted
//! behind [`SlotStore`] so play can persist to disk, to memory in tests, or
//! anywhere else that can hold a string under a key.

use crate::trajectory::{Message, TrajectoryState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("slot store unavailable: {0}")]
    Unavailable(String),
}

/// Current save document version.
pub const SAVE_VERSION: u32 = 1;

fn current_version() -> u32 {
    SAVE_VERSION
}

/// The persisted form of a session.
///
/// Keys are camelCase (`messages`, `trajectoryState`) and every field has a
/// default, so documents written before a field existed still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    #[serde(default = "current_version")]
    pub version: u32,

    #[serde(default)]
    pub saved_at: Option<String>,

    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default)]
    pub trajectory_state: TrajectoryState,
}

impl SavedSession {
    pub fn new(messages: Vec<Message>, trajectory_state: TrajectoryState) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
            messages,
            trajectory_state,
        }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored document, rejecting other versions.
    pub fn from_json(content: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }
}

/// Named string slots.
///
/// `read` of an absent slot is `Ok(None)`; `remove` of an absent slot is a
/// no-op.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError>;
    async fn write(&self, key: &str, value: &str) -> Result<(), PersistError>;
    async fn remove(&self, key: &str) -> Result<(), PersistError>;
}

#[async_trait]
impl<T: SlotStore + ?Sized> SlotStore for Arc<T> {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistError> {
        (**self).write(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        (**self).remove(key).await
    }
}

/// One JSON file per slot in a directory.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`. Anything outside `[A-Za-z0-9_]` becomes `_`.
    pub fn slot_path(&self, key: &str) -> PathBuf {
        let sanitized = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>();
        self.dir.join(format!("{sanitized}.json"))
    }
}

#[async_trait]
impl SlotStore for FileSlotStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.slot_path(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.slot_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        match fs::remove_file(self.slot_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local slots.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, PersistError> {
        self.slots
            .lock()
            .map_err(|_| PersistError::Unavailable("slot map poisoned".to_string()))
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::TrajectoryLine;

    fn sample() -> SavedSession {
        let mut state = TrajectoryState::default();
        state.trajectory.push(TrajectoryLine::new("[Time]1 ~~~ [Memory]2"));
        state.commentary.insert(1, "Time");
        SavedSession::new(
            vec![Message::user("Let's explore time and memory"), Message::assistant("Yes.")],
            state,
        )
    }

    #[test]
    fn test_document_uses_camel_case_keys() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"trajectoryState\""));
        assert!(json.contains("\"messages\""));
        assert!(!json.contains("trajectory_state"));
    }

    #[test]
    fn test_missing_fields_default() {
        let saved = SavedSession::from_json("{}").unwrap();
        assert_eq!(saved.version, SAVE_VERSION);
        assert!(saved.messages.is_empty());
        assert!(saved.trajectory_state.is_empty());

        let saved = SavedSession::from_json(r#"{"messages": [{"role": "user", "content": "hi"}]}"#)
            .unwrap();
        assert_eq!(saved.messages, vec![Message::user("hi")]);
        assert!(saved.trajectory_state.is_empty());
    }

    #[test]
    fn test_version_mismatch() {
        let err = SavedSession::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: 99
            }
        ));
    }

    #[test]
    fn test_corrupt_document() {
        assert!(matches!(
            SavedSession::from_json("not json"),
            Err(PersistError::Json(_))
        ));
    }

    #[test]
    fn test_slot_path_is_sanitized() {
        let store = FileSlotStore::new("/tmp/slots");
        assert_eq!(
            store.slot_path("gbg_game_state"),
            PathBuf::from("/tmp/slots/gbg_game_state.json")
        );
        assert_eq!(
            store.slot_path("../etc/passwd"),
            PathBuf::from("/tmp/slots/___etc_passwd.json")
        );
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSlotStore::new(dir.path().join("nested"));

        assert_eq!(store.read("slot").await.unwrap(), None);

        let doc = sample().to_json().unwrap();
        store.write("slot", &doc).await.unwrap();
        let loaded = SavedSession::from_json(&store.read("slot").await.unwrap().unwrap()).unwrap();
        assert_eq!(loaded, sample_without_time(loaded.saved_at.clone()));

        store.remove("slot").await.unwrap();
        assert_eq!(store.read("slot").await.unwrap(), None);
        store.remove("slot").await.unwrap();
    }

    fn sample_without_time(saved_at: Option<String>) -> SavedSession {
        SavedSession {
            saved_at,
            ..sample()
        }
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySlotStore::new();
        store.write("a", "1").await.unwrap();
        assert_eq!(store.read("a").await.unwrap().as_deref(), Some("1"));
        store.remove("a").await.unwrap();
        assert_eq!(store.read("a").await.unwrap(), None);
    }
}
