//! Proposed document mutations and the per-session edit queue.
//!
//! A `PendingEdit` is immutable once created. Its `preview` is rendered at
//! proposal time and never re-derived, even if the document shape changes
//! before the edit is committed.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::SlideLayout;

/// Operation payload, one shape per operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "operation",
    content = "params",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum EditOp {
    /// Insert a new slide at the target index (clamped at commit time).
    Add {
        content: String,
        #[serde(default)]
        layout: SlideLayout,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    /// Replace the content of the slide at the target index.
    Update {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    /// Remove the slide at the target index.
    Delete,
    /// Move the slide at the target index to `to_index`.
    Reorder { to_index: usize },
}

/// Operation kind without payload, for listings and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Add,
    Update,
    Delete,
    Reorder,
}

impl EditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EditKind::Add => "ADD",
            EditKind::Update => "UPDATE",
            EditKind::Delete => "DELETE",
            EditKind::Reorder => "REORDER",
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EditOp {
    pub fn kind(&self) -> EditKind {
        match self {
            EditOp::Add { .. } => EditKind::Add,
            EditOp::Update { .. } => EditKind::Update,
            EditOp::Delete => EditKind::Delete,
            EditOp::Reorder { .. } => EditKind::Reorder,
        }
    }

    /// One-line, 1-based description of the edit against `target_index`.
    fn preview(&self, target_index: usize) -> String {
        let position = target_index + 1;
        match self {
            EditOp::Add { .. } => format!("Add slide at position {position}"),
            EditOp::Update { .. } => format!("Update slide {position}"),
            EditOp::Delete => format!("Delete slide {position}"),
            EditOp::Reorder { to_index } => {
                format!("Move slide {position} to position {}", to_index + 1)
            }
        }
    }
}

/// A proposed, not-yet-applied mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    pub edit_id: String,
    pub target_index: usize,
    #[serde(flatten)]
    pub op: EditOp,
    pub preview: String,
}

impl PendingEdit {
    /// Creates an edit with a fresh id and a preview rendered now.
    pub fn new(target_index: usize, op: EditOp) -> Self {
        let preview = op.preview(target_index);
        Self {
            edit_id: uuid::Uuid::new_v4().to_string(),
            target_index,
            op,
            preview,
        }
    }

    pub fn kind(&self) -> EditKind {
        self.op.kind()
    }
}

/// Audit record for an edit that was successfully committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEdit {
    #[serde(flatten)]
    pub edit: PendingEdit,
    /// RFC 3339 commit timestamp.
    pub applied_at: String,
}

impl AppliedEdit {
    pub fn now(edit: PendingEdit) -> Self {
        Self {
            edit,
            applied_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Ordered, append-only list of edits awaiting commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditQueue {
    edits: Vec<PendingEdit>,
}

impl EditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an edit and returns its id.
    pub fn propose(&mut self, edit: PendingEdit) -> String {
        let edit_id = edit.edit_id.clone();
        self.edits.push(edit);
        edit_id
    }

    /// Edits in proposal order.
    pub fn list(&self) -> &[PendingEdit] {
        &self.edits
    }

    pub fn clear(&mut self) {
        self.edits.clear();
    }

    /// Takes every queued edit, leaving the queue empty.
    pub fn take(&mut self) -> Vec<PendingEdit> {
        std::mem::take(&mut self.edits)
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Validation failure when proposing an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// The session has no document yet.
    NoDocument,
    /// An index argument is outside the current document.
    InvalidIndex { field: &'static str, index: i64 },
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::NoDocument => {
                write!(f, "No presentation created. Use create_document first.")
            }
            EditError::InvalidIndex { field, index } => write!(f, "Invalid {field}: {index}"),
        }
    }
}

impl std::error::Error for EditError {}
