//! Tool system for deck editing.
//!
//! This module provides the registry of tools handed to the reasoning
//! runtime, along with their JSON schemas. Tools never return errors past
//! this boundary: every outcome is a `ToolOutput`.
//!
//! Tools act on the session bound by `core::binding`. The registry resolves
//! that binding once per call and passes it to the handler explicitly inside
//! a `ToolContext`.

pub mod document;
pub mod edits;
pub mod slides;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::binding;
use crate::core::events::ToolOutput;
use crate::core::session::SessionHandle;
use crate::core::store::SessionStore;

// ============================================================================
// Serde helpers for LLM-resilient deserialization
// ============================================================================

/// Serde helper that accepts either a JSON integer or an integer-like string.
///
/// Models sometimes send `"slide_index": "2"` instead of `"slide_index": 2`.
pub(crate) mod int_or_string {
    use serde::{Deserialize, Deserializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Float(f64),
        String(String),
    }

    fn coerce<E: de::Error>(raw: IntOrString) -> Result<i64, E> {
        match raw {
            IntOrString::Int(v) => Ok(v),
            IntOrString::Float(v) if v.fract() == 0.0 => Ok(v as i64),
            IntOrString::Float(v) => Err(E::custom(format!("expected integer, got {v}"))),
            IntOrString::String(s) => s
                .trim()
                .parse()
                .map_err(|e| E::custom(format!("expected integer, got '{s}': {e}"))),
        }
    }

    /// Deserializes a required `i64`.
    ///
    /// # Errors
    /// Returns an error if the value is not integer-like.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        coerce(IntOrString::deserialize(deserializer)?)
    }

    /// Deserializes an optional `i64`; `null` maps to `None`.
    pub mod option {
        use super::{Deserialize, Deserializer, IntOrString, coerce};

        /// # Errors
        /// Returns an error if the value is present but not integer-like.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<IntOrString>::deserialize(deserializer)?
                .map(coerce)
                .transpose()
        }
    }
}

/// Parses tool input into `T`, mapping failures to a tool error.
pub(crate) fn parse_input<T: DeserializeOwned>(tool: &str, input: &Value) -> Result<T, ToolOutput> {
    let input = if input.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        input.clone()
    };
    serde_json::from_value(input)
        .map_err(|e| ToolOutput::failure(format!("Invalid input for {tool}: {e}")))
}

/// Tool definition handed to the reasoning runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Result of executing a tool, in the shape the runtime sends back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn from_output(tool_use_id: String, output: &ToolOutput) -> Self {
        Self {
            tool_use_id,
            content: output.to_json_string(),
            is_error: !output.is_ok(),
        }
    }
}

/// Context for tool execution.
#[derive(Clone)]
pub struct ToolContext {
    /// Session the call acts on.
    pub session: SessionHandle,
    /// Where `commit_edits` persists the session.
    pub store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext").finish_non_exhaustive()
    }
}

impl ToolContext {
    pub fn new(session: SessionHandle, store: Arc<dyn SessionStore>) -> Self {
        Self { session, store }
    }
}

/// Async tool handler function.
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolOutput> + Send>>;
pub type ToolHandler = Arc<dyn Fn(&Value, &ToolContext) -> ToolFuture + Send + Sync>;

/// Tool registry (definitions + executors).
#[derive(Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    handlers: HashMap<String, ToolHandler>,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("definitions", &self.definitions)
            .field("handlers_len", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

/// Wraps an async tool function as a `ToolHandler`.
macro_rules! handler {
    ($exec:path) => {
        Arc::new(|input: &Value, ctx: &ToolContext| -> ToolFuture {
            let input = input.clone();
            let ctx = ctx.clone();
            Box::pin(async move { $exec(&input, &ctx).await })
        })
    };
}

impl ToolRegistry {
    fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            definitions: Vec::new(),
            handlers: HashMap::new(),
            store,
        }
    }

    /// Registry with every deck tool registered.
    pub fn builtins(store: Arc<dyn SessionStore>) -> Self {
        let mut registry = Self::new(store);
        registry.register_builtin_tools();
        registry
    }

    fn register(&mut self, definition: ToolDefinition, handler: ToolHandler) {
        let name_lower = definition.name.to_ascii_lowercase();
        if let Some(pos) = self
            .definitions
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(&definition.name))
        {
            self.definitions.remove(pos);
        }
        self.definitions.push(definition);
        self.handlers.insert(name_lower, handler);
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.definitions
            .iter()
            .map(|t| t.name.to_ascii_lowercase())
            .collect()
    }

    /// Executes a tool against the currently bound session.
    ///
    /// Tool names are matched case-insensitively. Without a bound session
    /// every tool reports `No active session`.
    pub async fn execute_tool(
        &self,
        name: &str,
        tool_use_id: &str,
        input: &Value,
    ) -> (ToolOutput, ToolResult) {
        let output = match binding::current_session() {
            Some(session) => {
                let ctx = ToolContext::new(session, Arc::clone(&self.store));
                self.execute_with(name, input, &ctx).await
            }
            None => ToolOutput::failure("No active session"),
        };

        if let Some(message) = output.error_message() {
            tracing::debug!(tool = name, %message, "tool returned error");
        }

        let result = ToolResult::from_output(tool_use_id.to_string(), &output);
        (output, result)
    }

    /// Executes a tool with an explicit context, bypassing the binding.
    pub async fn execute_with(&self, name: &str, input: &Value, ctx: &ToolContext) -> ToolOutput {
        match self.handlers.get(&name.to_ascii_lowercase()) {
            Some(handler) => handler(input, ctx).await,
            None => self.unknown_tool_output(name),
        }
    }

    fn unknown_tool_output(&self, name: &str) -> ToolOutput {
        let mut available = self.tool_names();
        available.sort();
        ToolOutput::failure(format!(
            "Unknown tool: {name}. Available tools: {}",
            available.join(", ")
        ))
    }

    fn register_builtin_tools(&mut self) {
        self.register(
            document::create_document_definition(),
            handler!(document::create_document),
        );
        self.register(slides::add_slide_definition(), handler!(slides::add_slide));
        self.register(
            slides::update_slide_definition(),
            handler!(slides::update_slide),
        );
        self.register(
            slides::delete_slide_definition(),
            handler!(slides::delete_slide),
        );
        self.register(
            slides::reorder_slides_definition(),
            handler!(slides::reorder_slides),
        );
        self.register(
            slides::list_slides_definition(),
            handler!(slides::list_slides),
        );
        self.register(slides::get_slide_definition(), handler!(slides::get_slide));
        self.register(
            document::set_theme_definition(),
            handler!(document::set_theme),
        );
        self.register(
            edits::list_pending_edits_definition(),
            handler!(edits::list_pending_edits),
        );
        self.register(
            edits::commit_edits_definition(),
            handler!(edits::commit_edits),
        );
    }
}

/// Human-friendly one-liner for a tool call, shown while the turn streams.
pub fn describe_call(name: &str, input: &Value) -> Option<String> {
    let index = |field: &str| {
        input
            .get(field)
            .and_then(|v| v.as_i64().or_else(|| v.as_str()?.trim().parse().ok()))
            .unwrap_or(0)
            + 1
    };

    let description = match name.to_ascii_lowercase().as_str() {
        "create_document" => {
            let title = input
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Untitled");
            format!("Creating presentation: {title}")
        }
        "add_slide" => "Adding a new slide...".to_string(),
        "update_slide" => format!("Updating slide {}...", index("slide_index")),
        "delete_slide" => format!("Deleting slide {}...", index("slide_index")),
        "reorder_slides" => format!(
            "Moving slide {} to position {}...",
            index("from_index"),
            index("to_index")
        ),
        "list_slides" => "Listing all slides...".to_string(),
        "get_slide" => format!("Getting slide {} details...", index("slide_index")),
        "set_theme" => "Setting presentation theme...".to_string(),
        "list_pending_edits" => "Reviewing pending edits...".to_string(),
        "commit_edits" => "Saving changes...".to_string(),
        _ => return None,
    };
    Some(description)
}
