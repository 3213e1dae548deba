//! Document-level tools: `create_document` and `set_theme`.

use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolContext, ToolDefinition, parse_input};
use crate::core::events::ToolOutput;
use crate::document::Theme;
use crate::document::edit::EditError;

const DEFAULT_TITLE: &str = "Untitled Presentation";

pub fn create_document_definition() -> ToolDefinition {
    ToolDefinition {
        name: "create_document".to_string(),
        description: "Create a new, empty presentation. Replaces any existing presentation in this session and discards its pending edits.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Presentation title (default: \"Untitled Presentation\")"
                }
            },
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct CreateDocumentInput {
    #[serde(default)]
    title: Option<String>,
}

pub async fn create_document(input: &Value, ctx: &ToolContext) -> ToolOutput {
    let input: CreateDocumentInput = match parse_input("create_document", input) {
        Ok(input) => input,
        Err(output) => return output,
    };
    let title = input
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let mut session = ctx.session.lock().await;
    let document = session.create_document(title);
    let output = json!({
        "title": document.title,
        "slide_count": document.slide_count(),
    });
    session.touch();
    ToolOutput::success(output)
}

pub fn set_theme_definition() -> ToolDefinition {
    ToolDefinition {
        name: "set_theme".to_string(),
        description: "Set the presentation theme (colors, fonts). Applied immediately; replaces the previous theme.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "theme": {
                    "type": "object",
                    "description": "Theme key/value pairs, e.g. {\"primary_color\": \"#1a73e8\", \"font\": \"Inter\"}"
                }
            },
            "required": ["theme"],
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct SetThemeInput {
    #[serde(default)]
    theme: Theme,
}

pub async fn set_theme(input: &Value, ctx: &ToolContext) -> ToolOutput {
    let input: SetThemeInput = match parse_input("set_theme", input) {
        Ok(input) => input,
        Err(output) => return output,
    };

    let mut session = ctx.session.lock().await;
    let Some(document) = session.document.as_mut() else {
        return ToolOutput::failure(EditError::NoDocument.to_string());
    };
    document.theme = input.theme;
    let theme = Value::Object(document.theme.clone());
    session.touch();
    ToolOutput::success(json!({ "theme": theme }))
}
