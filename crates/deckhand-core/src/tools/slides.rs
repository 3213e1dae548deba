//! Slide tools.
//!
//! `add_slide`, `update_slide`, `delete_slide` and `reorder_slides` only
//! queue edits; nothing touches the document until `commit_edits`.
//! `list_slides` and `get_slide` read the committed document.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolContext, ToolDefinition, int_or_string, parse_input};
use crate::core::events::ToolOutput;
use crate::document::edit::{EditError, PendingEdit};
use crate::document::{Slide, SlideLayout};

/// Characters of raw content considered when building a preview.
const PREVIEW_SOURCE_CHARS: usize = 200;

/// Maximum preview length in characters.
const PREVIEW_CHARS: usize = 100;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is a valid regex"));

fn edit_output(edit: &PendingEdit) -> ToolOutput {
    ToolOutput::success(json!({
        "slide_index": edit.target_index,
        "edit_id": edit.edit_id,
        "operation": edit.kind().as_str(),
        "preview": edit.preview,
    }))
}

fn edit_result(result: Result<&PendingEdit, EditError>) -> ToolOutput {
    match result {
        Ok(edit) => edit_output(edit),
        Err(err) => ToolOutput::failure(err.to_string()),
    }
}

// ----------------------------------------------------------------------------
// add_slide
// ----------------------------------------------------------------------------

pub fn add_slide_definition() -> ToolDefinition {
    let layouts: Vec<&str> = SlideLayout::all().iter().map(|l| l.as_str()).collect();
    ToolDefinition {
        name: "add_slide".to_string(),
        description: "Queue a new slide. The slide is inserted when commit_edits runs.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "Slide markup (HTML)"
                },
                "position": {
                    "type": "integer",
                    "description": "0-based insert position (default: end of deck)"
                },
                "layout": {
                    "type": "string",
                    "enum": layouts,
                    "description": "Slide layout (default: blank)"
                },
                "notes": {
                    "type": "string",
                    "description": "Speaker notes"
                }
            },
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct AddSlideInput {
    #[serde(default)]
    content: String,
    #[serde(default, with = "int_or_string::option")]
    position: Option<i64>,
    #[serde(default)]
    layout: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

pub async fn add_slide(input: &Value, ctx: &ToolContext) -> ToolOutput {
    let input: AddSlideInput = match parse_input("add_slide", input) {
        Ok(input) => input,
        Err(output) => return output,
    };
    let layout = SlideLayout::parse_or_blank(input.layout.as_deref());

    let mut session = ctx.session.lock().await;
    edit_result(session.propose_add(input.content, input.position, layout, input.notes))
}

// ----------------------------------------------------------------------------
// update_slide
// ----------------------------------------------------------------------------

pub fn update_slide_definition() -> ToolDefinition {
    ToolDefinition {
        name: "update_slide".to_string(),
        description: "Queue a replacement of a slide's content (and optionally its notes).".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "slide_index": {
                    "type": "integer",
                    "description": "0-based index of the slide to update"
                },
                "content": {
                    "type": "string",
                    "description": "New slide markup (HTML)"
                },
                "notes": {
                    "type": "string",
                    "description": "New speaker notes (omit to keep existing notes)"
                }
            },
            "required": ["slide_index", "content"],
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct UpdateSlideInput {
    #[serde(with = "int_or_string")]
    slide_index: i64,
    #[serde(default)]
    content: String,
    #[serde(default)]
    notes: Option<String>,
}

pub async fn update_slide(input: &Value, ctx: &ToolContext) -> ToolOutput {
    let input: UpdateSlideInput = match parse_input("update_slide", input) {
        Ok(input) => input,
        Err(output) => return output,
    };

    let mut session = ctx.session.lock().await;
    edit_result(session.propose_update(input.slide_index, input.content, input.notes))
}

// ----------------------------------------------------------------------------
// delete_slide
// ----------------------------------------------------------------------------

pub fn delete_slide_definition() -> ToolDefinition {
    ToolDefinition {
        name: "delete_slide".to_string(),
        description: "Queue removal of a slide.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "slide_index": {
                    "type": "integer",
                    "description": "0-based index of the slide to delete"
                }
            },
            "required": ["slide_index"],
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct SlideIndexInput {
    #[serde(with = "int_or_string")]
    slide_index: i64,
}

pub async fn delete_slide(input: &Value, ctx: &ToolContext) -> ToolOutput {
    let input: SlideIndexInput = match parse_input("delete_slide", input) {
        Ok(input) => input,
        Err(output) => return output,
    };

    let mut session = ctx.session.lock().await;
    edit_result(session.propose_delete(input.slide_index))
}

// ----------------------------------------------------------------------------
// reorder_slides
// ----------------------------------------------------------------------------

pub fn reorder_slides_definition() -> ToolDefinition {
    ToolDefinition {
        name: "reorder_slides".to_string(),
        description: "Queue moving a slide to a new position.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "from_index": {
                    "type": "integer",
                    "description": "0-based index of the slide to move"
                },
                "to_index": {
                    "type": "integer",
                    "description": "0-based destination index"
                }
            },
            "required": ["from_index", "to_index"],
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct ReorderSlidesInput {
    #[serde(with = "int_or_string")]
    from_index: i64,
    #[serde(with = "int_or_string")]
    to_index: i64,
}

pub async fn reorder_slides(input: &Value, ctx: &ToolContext) -> ToolOutput {
    let input: ReorderSlidesInput = match parse_input("reorder_slides", input) {
        Ok(input) => input,
        Err(output) => return output,
    };

    let mut session = ctx.session.lock().await;
    match session.propose_reorder(input.from_index, input.to_index) {
        Ok(edit) => ToolOutput::success(json!({
            "from_index": input.from_index,
            "to_index": input.to_index,
            "edit_id": edit.edit_id,
            "preview": edit.preview,
        })),
        Err(err) => ToolOutput::failure(err.to_string()),
    }
}

// ----------------------------------------------------------------------------
// list_slides / get_slide
// ----------------------------------------------------------------------------

pub fn list_slides_definition() -> ToolDefinition {
    ToolDefinition {
        name: "list_slides".to_string(),
        description: "List all committed slides with their index, layout and a short text preview.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

/// Plain-text preview of slide markup.
///
/// Tags are removed, whitespace collapsed, and the result capped at
/// `PREVIEW_CHARS` characters.
pub fn content_preview(content: &str) -> String {
    let head: String = content.chars().take(PREVIEW_SOURCE_CHARS).collect();
    let spaced = head.replace('<', " <").replace('>', "> ");
    let stripped = TAG_RE.replace_all(&spaced, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(PREVIEW_CHARS).collect()
}

fn slide_row(slide: &Slide) -> Value {
    json!({
        "index": slide.index,
        "layout": slide.layout.as_str(),
        "preview": content_preview(&slide.content),
        "has_notes": slide.notes.as_deref().is_some_and(|n| !n.is_empty()),
    })
}

pub async fn list_slides(_input: &Value, ctx: &ToolContext) -> ToolOutput {
    let session = ctx.session.lock().await;
    let slides: Vec<Value> = session
        .document
        .as_ref()
        .map(|doc| doc.slides.iter().map(slide_row).collect())
        .unwrap_or_default();

    ToolOutput::success(json!({
        "count": slides.len(),
        "slides": slides,
    }))
}

pub fn get_slide_definition() -> ToolDefinition {
    ToolDefinition {
        name: "get_slide".to_string(),
        description: "Get the full content, layout and notes of a committed slide.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "slide_index": {
                    "type": "integer",
                    "description": "0-based index of the slide"
                }
            },
            "required": ["slide_index"],
            "additionalProperties": false
        }),
    }
}

pub async fn get_slide(input: &Value, ctx: &ToolContext) -> ToolOutput {
    let input: SlideIndexInput = match parse_input("get_slide", input) {
        Ok(input) => input,
        Err(output) => return output,
    };

    let session = ctx.session.lock().await;
    let Some(document) = session.document.as_ref() else {
        return ToolOutput::failure(EditError::NoDocument.to_string());
    };
    let slide = usize::try_from(input.slide_index)
        .ok()
        .and_then(|i| document.slide(i));
    let Some(slide) = slide else {
        return ToolOutput::failure(
            EditError::InvalidIndex {
                field: "slide index",
                index: input.slide_index,
            }
            .to_string(),
        );
    };

    ToolOutput::success(json!({
        "index": slide.index,
        "content": slide.content,
        "layout": slide.layout.as_str(),
        "notes": slide.notes,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::session::Session;
    use crate::core::store::MemorySessionStore;

    async fn ctx_with_slides(contents: &[&str]) -> ToolContext {
        let mut session = Session::new("slide-tools");
        session.create_document("Deck");
        for content in contents {
            session
                .propose_add((*content).to_string(), None, SlideLayout::Blank, None)
                .unwrap();
            session.commit().unwrap();
        }
        ToolContext::new(session.into_handle(), Arc::new(MemorySessionStore::new()))
    }

    #[tokio::test]
    async fn test_add_slide_queues_without_touching_document() {
        let ctx = ctx_with_slides(&["A"]).await;
        let output = add_slide(
            &json!({"content": "<h1>B</h1>", "layout": "title", "notes": "say hi"}),
            &ctx,
        )
        .await;

        assert_eq!(output.get("slide_index"), Some(&json!(1)));
        assert_eq!(output.get("operation"), Some(&json!("ADD")));
        assert_eq!(output.get("preview"), Some(&json!("Add slide at position 2")));
        assert!(output.get("edit_id").and_then(Value::as_str).is_some());

        let session = ctx.session.lock().await;
        assert_eq!(session.slide_count(), 1);
        assert_eq!(session.pending_edits.len(), 1);
    }

    #[tokio::test]
    async fn test_add_slide_unknown_layout_falls_back_to_blank() {
        let ctx = ctx_with_slides(&[]).await;
        add_slide(&json!({"content": "x", "layout": "hexagon", "position": "0"}), &ctx).await;

        let mut session = ctx.session.lock().await;
        session.commit().unwrap();
        let slide = &session.document.as_ref().unwrap().slides[0];
        assert_eq!(slide.layout, SlideLayout::Blank);
    }

    #[tokio::test]
    async fn test_add_slide_without_document() {
        let ctx = ToolContext::new(
            Session::new("empty").into_handle(),
            Arc::new(MemorySessionStore::new()),
        );
        let output = add_slide(&json!({"content": "x"}), &ctx).await;
        assert!(output.error_message().unwrap().starts_with("No presentation"));
    }

    #[tokio::test]
    async fn test_update_and_delete_validate_index() {
        let ctx = ctx_with_slides(&["A", "B"]).await;

        let output = update_slide(&json!({"slide_index": 2, "content": "C"}), &ctx).await;
        assert_eq!(output.error_message(), Some("Invalid slide index: 2"));

        let output = delete_slide(&json!({"slide_index": -1}), &ctx).await;
        assert_eq!(output.error_message(), Some("Invalid slide index: -1"));

        let output = update_slide(&json!({"slide_index": 1, "content": "B2"}), &ctx).await;
        assert_eq!(output.get("preview"), Some(&json!("Update slide 2")));

        let output = delete_slide(&json!({"slide_index": 0}), &ctx).await;
        assert_eq!(output.get("operation"), Some(&json!("DELETE")));

        assert_eq!(ctx.session.lock().await.pending_edits.len(), 2);
    }

    #[tokio::test]
    async fn test_update_requires_slide_index() {
        let ctx = ctx_with_slides(&["A"]).await;
        let output = update_slide(&json!({"content": "B"}), &ctx).await;
        assert!(
            output
                .error_message()
                .unwrap()
                .contains("missing field `slide_index`")
        );
    }

    #[tokio::test]
    async fn test_reorder_validates_destination() {
        let ctx = ctx_with_slides(&["A", "B", "C"]).await;

        let output = reorder_slides(&json!({"from_index": 0, "to_index": 3}), &ctx).await;
        assert_eq!(output.error_message(), Some("Invalid to_index: 3"));

        let output = reorder_slides(&json!({"from_index": 0, "to_index": 2}), &ctx).await;
        assert_eq!(output.get("from_index"), Some(&json!(0)));
        assert_eq!(output.get("to_index"), Some(&json!(2)));
        assert_eq!(
            output.get("preview"),
            Some(&json!("Move slide 1 to position 3"))
        );
    }

    #[test]
    fn test_content_preview_strips_markup() {
        assert_eq!(
            content_preview("<h1>Hello</h1><p>big\n\n   world</p>"),
            "Hello big world"
        );
        assert_eq!(content_preview(""), "");
        assert_eq!(
            content_preview(r#"<div class="col" data-x="1">Left</div><img src="a.png"/>Right"#),
            "Left Right"
        );

        let long = format!("<p>{}</p>", "x".repeat(300));
        assert_eq!(content_preview(&long).chars().count(), PREVIEW_CHARS);
    }

    #[tokio::test]
    async fn test_list_slides() {
        let ctx = ctx_with_slides(&["<h1>One</h1>", "<p>Two</p>"]).await;
        let output = list_slides(&json!({}), &ctx).await;

        assert_eq!(output.get("count"), Some(&json!(2)));
        assert_eq!(
            output.get("slides"),
            Some(&json!([
                {"index": 0, "layout": "blank", "preview": "One", "has_notes": false},
                {"index": 1, "layout": "blank", "preview": "Two", "has_notes": false},
            ]))
        );
    }

    #[tokio::test]
    async fn test_list_slides_without_document_is_empty() {
        let ctx = ToolContext::new(
            Session::new("empty").into_handle(),
            Arc::new(MemorySessionStore::new()),
        );
        let output = list_slides(&json!({}), &ctx).await;
        assert!(output.is_ok());
        assert_eq!(output.get("count"), Some(&json!(0)));
        assert_eq!(output.get("slides"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_get_slide() {
        let ctx = ctx_with_slides(&["<h1>One</h1>"]).await;

        let output = get_slide(&json!({"slide_index": 0}), &ctx).await;
        assert_eq!(output.get("content"), Some(&json!("<h1>One</h1>")));
        assert_eq!(output.get("notes"), Some(&Value::Null));

        let output = get_slide(&json!({"slide_index": 4}), &ctx).await;
        assert_eq!(output.error_message(), Some("Invalid slide index: 4"));
    }
}
