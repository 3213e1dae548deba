//! Edit queue tools: `list_pending_edits` and `commit_edits`.

use serde_json::{Value, json};

use super::{ToolContext, ToolDefinition};
use crate::core::events::ToolOutput;
use crate::core::registry::save_snapshot;

pub fn list_pending_edits_definition() -> ToolDefinition {
    ToolDefinition {
        name: "list_pending_edits".to_string(),
        description: "List edits that have been queued but not yet committed.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

pub async fn list_pending_edits(_input: &Value, ctx: &ToolContext) -> ToolOutput {
    let session = ctx.session.lock().await;
    let edits: Vec<Value> = session
        .pending_edits
        .list()
        .iter()
        .map(|edit| {
            json!({
                "edit_id": edit.edit_id,
                "slide_index": edit.target_index,
                "operation": edit.kind().as_str(),
                "preview": edit.preview,
            })
        })
        .collect();

    ToolOutput::success(json!({
        "count": edits.len(),
        "edits": edits,
    }))
}

pub fn commit_edits_definition() -> ToolDefinition {
    ToolDefinition {
        name: "commit_edits".to_string(),
        description: "Apply all pending edits to the presentation, in the order they were queued, and save the session.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

pub async fn commit_edits(_input: &Value, ctx: &ToolContext) -> ToolOutput {
    let (summary, snapshot) = {
        let mut session = ctx.session.lock().await;
        match session.commit() {
            Ok(summary) => (summary, session.clone()),
            Err(err) => return ToolOutput::failure(err.to_string()),
        }
    };

    tracing::info!(
        session_id = %snapshot.session_id,
        applied = summary.applied_count,
        skipped = summary.skipped_count,
        slides = summary.slide_count,
        "committed edits"
    );

    let saved = match save_snapshot(ctx.store.as_ref(), &snapshot) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("Failed to save session after commit: {err:#}");
            false
        }
    };

    ToolOutput::success(json!({
        "applied_count": summary.applied_count,
        "skipped_count": summary.skipped_count,
        "total_slides": summary.slide_count,
        "saved": saved,
    }))
}
