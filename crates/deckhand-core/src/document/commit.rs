//! Commit engine: drains an edit queue into a document.
//!
//! Edits are applied strictly in queue order. Bounds are re-checked against
//! the *current* document before each edit, and indices are renumbered after
//! every structural edit so the next bounds check sees the post-mutation
//! shape. Failed edits are skipped and logged; they never roll back earlier
//! edits in the same batch. The queue is always left empty.
//!
//! This code is synchronous on purpose: callers hold the session lock for the
//! whole commit, so no reader can observe a half-applied batch.

use tracing::{debug, warn};

use super::edit::{AppliedEdit, EditOp, EditQueue, PendingEdit};
use super::{Document, Slide};

/// Outcome of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    /// Edits applied and appended to the audit log.
    pub applied_count: usize,
    /// Edits dropped because their precondition failed at commit time.
    pub skipped_count: usize,
    /// Slide count after the commit.
    pub slide_count: usize,
}

/// Why an edit was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    IndexOutOfRange { index: usize, slide_count: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::IndexOutOfRange { index, slide_count } => write!(
                f,
                "index {index} out of range for {slide_count} slide(s)"
            ),
        }
    }
}

/// Applies every queued edit to `document` and clears `queue`.
///
/// Each applied edit is appended to `applied`; skipped edits leave no audit
/// entry.
pub fn commit(
    document: &mut Document,
    queue: &mut EditQueue,
    applied: &mut Vec<AppliedEdit>,
) -> CommitSummary {
    let edits = queue.take();
    let mut summary = CommitSummary::default();

    for edit in edits {
        match apply_edit(document, &edit) {
            Ok(()) => {
                debug!(edit_id = %edit.edit_id, operation = %edit.kind(), "applied edit");
                applied.push(AppliedEdit::now(edit));
                summary.applied_count += 1;
            }
            Err(reason) => {
                warn!(
                    edit_id = %edit.edit_id,
                    operation = %edit.kind(),
                    %reason,
                    "skipping edit"
                );
                summary.skipped_count += 1;
            }
        }
    }

    summary.slide_count = document.slide_count();
    summary
}

fn apply_edit(document: &mut Document, edit: &PendingEdit) -> Result<(), SkipReason> {
    let index = edit.target_index;
    let slide_count = document.slide_count();
    let out_of_range = SkipReason::IndexOutOfRange { index, slide_count };

    match &edit.op {
        EditOp::Add {
            content,
            layout,
            notes,
        } => {
            let slide = Slide::new(index, content.clone(), *layout).with_notes(notes.clone());
            document.insert_at(index.min(slide_count), slide);
            reindex(document);
        }
        EditOp::Update { content, notes } => {
            let slide = document.slide_mut(index).ok_or(out_of_range)?;
            slide.content.clone_from(content);
            if let Some(notes) = notes {
                slide.notes = Some(notes.clone());
            }
        }
        EditOp::Delete => {
            document.remove_at(index).ok_or(out_of_range)?;
            reindex(document);
        }
        EditOp::Reorder { to_index } => {
            // Destination is clamped by `insert_at` to the post-removal end.
            document.move_slide(index, *to_index).ok_or(out_of_range)?;
            reindex(document);
        }
    }

    Ok(())
}

/// Renumbers every slide to match its position.
fn reindex(document: &mut Document) {
    for (position, slide) in document.slides.iter_mut().enumerate() {
        slide.index = position;
    }
}
