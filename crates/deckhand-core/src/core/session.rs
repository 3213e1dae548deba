//! Session state: one document, its edit queue and history, and the
//! conversation continuation token.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::document::commit::{self, CommitSummary};
use crate::document::edit::{AppliedEdit, EditError, EditOp, EditQueue, PendingEdit};
use crate::document::{Document, SlideLayout};

/// Shared handle to a live session.
///
/// Two lookups of the same id within a turn yield clones of the same handle.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Read-only reference material supplied with a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAttachment {
    pub filename: String,
    pub text: String,
}

/// The unit of isolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    /// Token from the reasoning runtime used to resume the conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub is_continuation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(default)]
    pub pending_edits: EditQueue,
    #[serde(default)]
    pub applied_edits: Vec<AppliedEdit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_attachments: Vec<ContextAttachment>,
    pub created_at: String,
    pub updated_at: String,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            session_id: session_id.into(),
            continuation_token: None,
            is_continuation: false,
            document: None,
            pending_edits: EditQueue::new(),
            applied_edits: Vec::new(),
            context_attachments: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Wraps the session in a shareable handle.
    pub fn into_handle(self) -> SessionHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn slide_count(&self) -> usize {
        self.document.as_ref().map_or(0, Document::slide_count)
    }

    /// Replaces the document with an empty one and resets edit state.
    pub fn create_document(&mut self, title: impl Into<String>) -> &Document {
        self.pending_edits.clear();
        self.applied_edits.clear();
        self.document.insert(Document::new(title))
    }

    fn require_document(&self) -> Result<&Document, EditError> {
        self.document.as_ref().ok_or(EditError::NoDocument)
    }

    /// Queues an ADD. A missing or past-the-end position appends; a negative
    /// position inserts at the front.
    pub fn propose_add(
        &mut self,
        content: String,
        position: Option<i64>,
        layout: SlideLayout,
        notes: Option<String>,
    ) -> Result<&PendingEdit, EditError> {
        let slide_count = self.require_document()?.slide_count();
        let index = match position {
            None => slide_count,
            Some(p) if p < 0 => 0,
            Some(p) => usize::try_from(p).map_or(slide_count, |p| p.min(slide_count)),
        };
        Ok(self.push_edit(PendingEdit::new(
            index,
            EditOp::Add {
                content,
                layout,
                notes,
            },
        )))
    }

    pub fn propose_update(
        &mut self,
        slide_index: i64,
        content: String,
        notes: Option<String>,
    ) -> Result<&PendingEdit, EditError> {
        let index = self.existing_index("slide index", slide_index)?;
        Ok(self.push_edit(PendingEdit::new(index, EditOp::Update { content, notes })))
    }

    pub fn propose_delete(&mut self, slide_index: i64) -> Result<&PendingEdit, EditError> {
        let index = self.existing_index("slide index", slide_index)?;
        Ok(self.push_edit(PendingEdit::new(index, EditOp::Delete)))
    }

    pub fn propose_reorder(
        &mut self,
        from_index: i64,
        to_index: i64,
    ) -> Result<&PendingEdit, EditError> {
        let from = self.existing_index("from_index", from_index)?;
        let to = self.existing_index("to_index", to_index)?;
        Ok(self.push_edit(PendingEdit::new(from, EditOp::Reorder { to_index: to })))
    }

    /// Applies and drains the pending queue.
    ///
    /// Without a document the queue is left untouched.
    pub fn commit(&mut self) -> Result<CommitSummary, EditError> {
        let document = self.document.as_mut().ok_or(EditError::NoDocument)?;
        let summary = commit::commit(document, &mut self.pending_edits, &mut self.applied_edits);
        self.touch();
        Ok(summary)
    }

    fn existing_index(&self, field: &'static str, index: i64) -> Result<usize, EditError> {
        let slide_count = self.require_document()?.slide_count();
        usize::try_from(index)
            .ok()
            .filter(|i| *i < slide_count)
            .ok_or(EditError::InvalidIndex { field, index })
    }

    fn push_edit(&mut self, edit: PendingEdit) -> &PendingEdit {
        self.pending_edits.propose(edit);
        self.touch();
        // `propose` just pushed, so the queue is non-empty.
        &self.pending_edits.list()[self.pending_edits.len() - 1]
    }
}
