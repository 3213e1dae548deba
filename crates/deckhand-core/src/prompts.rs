//! System prompt assembly.

use crate::core::session::ContextAttachment;

/// Prompt for a turn that starts a new deck.
pub const NEW_DECK_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/new_deck.md"
));

/// Prompt for a turn that revises an existing deck.
pub const CONTINUATION_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/continuation.md"
));

/// Builds the system prompt for a turn.
///
/// Attachments with empty text are left out. The `CONTEXT FILES` section is
/// omitted entirely when nothing remains.
pub fn build_system_prompt(is_continuation: bool, attachments: &[ContextAttachment]) -> String {
    let base = if is_continuation {
        CONTINUATION_PROMPT
    } else {
        NEW_DECK_PROMPT
    };
    let mut prompt = base.trim_end().to_string();

    let context = attachments
        .iter()
        .filter(|a| !a.text.trim().is_empty())
        .map(|a| format!("=== {} ===\n{}", a.filename, a.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    if !context.is_empty() {
        prompt.push_str("\n\nCONTEXT FILES:\n");
        prompt.push_str(&context);
    }
    prompt
}
