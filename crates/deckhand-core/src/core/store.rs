//! Session persistence.
//!
//! Each session is stored as one pretty-printed JSON file inside the sessions
//! directory. Writes go through a temp file in the same directory and are
//! renamed into place, so a reader never sees a half-written session.
//!
//! Session ids are opaque. Ids made only of `[A-Za-z0-9_-]` name their file
//! directly (`<id>.json`); any other id is hex-encoded behind a `~` prefix
//! (`~<hex>.json`). Plain ids never contain `~`, so the two forms cannot
//! collide. The record itself always keeps the id exactly as given.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;

use super::session::Session;

const ENCODED_STEM_PREFIX: char = '~';

/// Longest file stem we will produce; keeps names under common 255-byte limits.
const MAX_FILE_STEM_BYTES: usize = 200;

/// Listing row for a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: Option<String>,
    pub slide_count: usize,
    pub pending_count: usize,
    pub updated_at: String,
}

impl SessionSummary {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            title: session.document.as_ref().map(|d| d.title.clone()),
            slide_count: session.slide_count(),
            pending_count: session.pending_edits.len(),
            updated_at: session.updated_at.clone(),
        }
    }
}

/// Opaque get/save backend for sessions.
pub trait SessionStore: Send + Sync {
    /// Loads a session, or `None` if it was never saved.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the record is corrupt.
    fn load(&self, session_id: &str) -> Result<Option<Session>>;

    /// Persists a full snapshot of the session.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn save(&self, session: &Session) -> Result<()>;

    /// Lists stored sessions, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn list(&self) -> Result<Vec<SessionSummary>>;
}

fn is_plain_id(id: &str) -> bool {
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Maps an opaque id to a file stem that is safe in any directory.
///
/// # Errors
/// Returns an error for an empty id or one too long to fit a file name.
pub(crate) fn file_stem(id: &str) -> Result<String> {
    if id.is_empty() {
        bail!("Empty id");
    }
    let stem = if is_plain_id(id) {
        id.to_string()
    } else {
        format!("{ENCODED_STEM_PREFIX}{}", hex::encode(id))
    };
    if stem.len() > MAX_FILE_STEM_BYTES {
        bail!("Id too long to store: '{id}'");
    }
    Ok(stem)
}

/// Writes `contents` to `path` via a synced temp file in `dir`.
///
/// # Errors
/// Returns an error if the directory cannot be created or the write fails.
pub(crate) fn write_atomic(dir: &Path, path: &Path, contents: &str) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| anyhow!("Failed to persist {}: {}", path.display(), e.error))?;
    Ok(())
}

/// JSON-file-per-session store.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        let stem = file_stem(session_id)
            .with_context(|| format!("Invalid session id '{session_id}'"))?;
        Ok(self.dir.join(format!("{stem}.json")))
    }

    fn read_session(path: &Path) -> Result<Session> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {}", path.display()))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, session_id: &str) -> Result<Option<Session>> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Ok(None);
        }
        Self::read_session(&path).map(Some)
    }

    fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.session_id)?;
        let json = serde_json::to_string_pretty(session).context("serialize session")?;
        write_atomic(&self.dir, &path, &json)
    }

    fn list(&self) -> Result<Vec<SessionSummary>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;

        let mut summaries = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_session(&path) {
                Ok(session) => summaries.push(SessionSummary::from_session(&session)),
                Err(err) => tracing::warn!("Skipping unreadable session file: {err:#}"),
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

/// In-process store, for tests and runs that should leave no trace.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .lock()
            .map_err(|e| anyhow!("session store lock poisoned: {e}"))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.lock()?.get(session_id).cloned())
    }

    fn save(&self, session: &Session) -> Result<()> {
        self.lock()?.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries: Vec<_> = self
            .lock()?
            .values()
            .map(SessionSummary::from_session)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
