//! Durable copy of the session.
//!
//! The credential and the identity are persisted as one document
//! (`{"token": ..., "user": {...}}`) so they are written and removed together.
//! A reader never sees a token without a user or the reverse: a document
//! missing either half loads as "no session".

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::principal::{BearerToken, Identity};
use crate::error::ClientResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: BearerToken,
    pub user: Identity,
}

pub trait SessionStorage: Send + Sync {
    fn load(&self) -> ClientResult<Option<StoredSession>>;
    fn save(&self, session: &StoredSession) -> ClientResult<()>;
    /// Remove both keys. Clearing an empty storage succeeds.
    fn clear(&self) -> ClientResult<()>;
}

/// Single JSON file, replaced atomically via rename.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> ClientResult<Option<StoredSession>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Parse loosely first so a half-written document is detected and dropped.
        let doc: Option<Value> = serde_json::from_str(&text).ok();
        let parsed = doc
            .filter(|v| v.get("token").is_some() && v.get("user").is_some())
            .and_then(|v| serde_json::from_value::<StoredSession>(v).ok());
        match parsed {
            Some(s) => Ok(Some(s)),
            None => {
                warn!(target: "session", path = %self.path.display(), "discarding incomplete session document");
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn save(&self, session: &StoredSession) -> ClientResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<StoredSession>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    pub fn with_session(session: StoredSession) -> Self { Self { slot: Mutex::new(Some(session)) } }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> ClientResult<Option<StoredSession>> { Ok(self.slot.lock().clone()) }

    fn save(&self, session: &StoredSession) -> ClientResult<()> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}
