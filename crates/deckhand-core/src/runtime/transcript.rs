//! Conversation transcripts, keyed by continuation token.
//!
//! A transcript is the message list a runtime replays when a later turn
//! resumes with the same token. The file store keeps one JSON array per token
//! under `<sessions_dir>/transcripts/`, named and written the same way as
//! session records, so resuming works across processes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::store::{file_stem, write_atomic};

/// One message of a conversation, in Messages API shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: String,
    pub content: Vec<Value>,
}

impl TranscriptMessage {
    pub fn new(role: &str, content: Vec<Value>) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }

    pub fn user_text(text: &str) -> Self {
        Self::new("user", vec![json!({"type": "text", "text": text})])
    }
}

/// Storage for transcripts.
pub trait TranscriptStore: Send + Sync {
    /// Returns the transcript saved under `token`, if any.
    ///
    /// # Errors
    /// Returns an error if the backend fails or the record is corrupt.
    fn load(&self, token: &str) -> Result<Option<Vec<TranscriptMessage>>>;

    /// Replaces the transcript saved under `token`.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn save(&self, token: &str, transcript: &[TranscriptMessage]) -> Result<()>;
}

/// One JSON file per token.
#[derive(Debug, Clone)]
pub struct FileTranscriptStore {
    dir: PathBuf,
}

impl FileTranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn transcript_path(&self, token: &str) -> Result<PathBuf> {
        let stem = file_stem(token).context("Invalid continuation token")?;
        Ok(self.dir.join(format!("{stem}.json")))
    }

    fn read(path: &Path) -> Result<Vec<TranscriptMessage>> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse transcript from {}", path.display()))
    }
}

impl TranscriptStore for FileTranscriptStore {
    fn load(&self, token: &str) -> Result<Option<Vec<TranscriptMessage>>> {
        let path = self.transcript_path(token)?;
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    fn save(&self, token: &str, transcript: &[TranscriptMessage]) -> Result<()> {
        let path = self.transcript_path(token)?;
        let json = serde_json::to_string(transcript).context("serialize transcript")?;
        write_atomic(&self.dir, &path, &json)
    }
}

/// Transcripts that live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTranscriptStore {
    transcripts: Mutex<HashMap<String, Vec<TranscriptMessage>>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranscriptStore for MemoryTranscriptStore {
    fn load(&self, token: &str) -> Result<Option<Vec<TranscriptMessage>>> {
        let transcripts = self
            .transcripts
            .lock()
            .map_err(|e| anyhow!("transcript lock poisoned: {e}"))?;
        Ok(transcripts.get(token).cloned())
    }

    fn save(&self, token: &str, transcript: &[TranscriptMessage]) -> Result<()> {
        self.transcripts
            .lock()
            .map_err(|e| anyhow!("transcript lock poisoned: {e}"))?
            .insert(token.to_string(), transcript.to_vec());
        Ok(())
    }
}
