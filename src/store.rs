//! Durable storage for the session-id counter.
//!
//! Exactly one integer survives restarts: the last allocated session id.
//! It is injected as a small get/set dependency so trackers are testable
//! without touching the filesystem.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Durable get/set of the last allocated session id.
pub trait SessionStore {
    fn last_id(&mut self) -> Result<Option<u16>>;
    fn set_last_id(&mut self, id: u16) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    last_session_id: u16,
}

/// JSON file store.
///
/// A missing file means no id was ever allocated. An unparseable file is
/// treated the same with a warning rather than an error: losing the counter
/// only risks a duplicated session id, which the consumer survives.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn last_id(&mut self) -> Result<Option<u16>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading session store {}", self.path.display()))?;

        match serde_json::from_str::<StoredSession>(&contents) {
            Ok(stored) => Ok(Some(stored.last_session_id)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable session store, starting fresh");
                Ok(None)
            }
        }
    }

    fn set_last_id(&mut self, id: u16) -> Result<()> {
        let contents = serde_json::to_string_pretty(&StoredSession {
            last_session_id: id,
        })?;
        fs::write(&self.path, contents)
            .with_context(|| format!("writing session store {}", self.path.display()))
    }
}

/// In-memory store for tests and headless replay.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    last: Option<u16>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last_id(id: u16) -> Self {
        Self { last: Some(id) }
    }
}

impl SessionStore for MemorySessionStore {
    fn last_id(&mut self) -> Result<Option<u16>> {
        Ok(self.last)
    }

    fn set_last_id(&mut self, id: u16) -> Result<()> {
        self.last = Some(id);
        Ok(())
    }
}
