//! Reasoning runtime abstraction.
//!
//! A runtime turns instructions into a sequence of assistant messages,
//! dispatching the tool calls the model asks for through a `ToolRegistry`.
//! Tool calls are executed one at a time, in the order the model issued
//! them. Messages are pushed into a channel as they happen; the final
//! `RuntimeMessage::Result` carries the token that resumes the conversation.

pub mod anthropic;
pub mod transcript;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::tools::ToolRegistry;

pub use anthropic::{AnthropicRuntime, AnthropicSettings};
pub use transcript::{FileTranscriptStore, TranscriptStore};

/// One instruction handed to a runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRequest {
    pub instructions: String,
    pub system_prompt: String,
    /// Token from a previous turn's `Result` message.
    pub resume_token: Option<String>,
}

/// Content block of an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
}

/// Message emitted by a runtime while it works.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeMessage {
    Assistant { blocks: Vec<ContentBlock> },
    Result { continuation_token: String },
}

impl RuntimeMessage {
    /// Concatenated text blocks, if any.
    pub fn text(&self) -> Option<String> {
        let RuntimeMessage::Assistant { blocks } = self else {
            return None;
        };
        let text = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        (!text.is_empty()).then_some(text)
    }
}

pub type MessageSender = mpsc::Sender<RuntimeMessage>;
pub type RuntimeFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Capability that drives the model for one turn.
pub trait ReasoningRuntime: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fails fast when the runtime cannot possibly run.
    ///
    /// # Errors
    /// Returns the reason the runtime is unusable.
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Runs one turn, pushing messages into `sink`.
    ///
    /// Tool calls go through `tools`, which acts on the session bound to the
    /// calling flow.
    fn run<'a>(
        &'a self,
        request: RuntimeRequest,
        tools: &'a ToolRegistry,
        sink: MessageSender,
    ) -> RuntimeFuture<'a>;
}

/// Categories of runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Runtime is not configured (e.g. missing credential).
    Unavailable,
    /// HTTP status error (4xx, 5xx).
    HttpStatus,
    Timeout,
    /// Response could not be parsed.
    Parse,
    /// The model kept calling tools past the round limit.
    ToolRoundLimit,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeErrorKind::Unavailable => write!(f, "unavailable"),
            RuntimeErrorKind::HttpStatus => write!(f, "http_status"),
            RuntimeErrorKind::Timeout => write!(f, "timeout"),
            RuntimeErrorKind::Parse => write!(f, "parse"),
            RuntimeErrorKind::ToolRoundLimit => write!(f, "tool_round_limit"),
        }
    }
}

/// Structured runtime error with kind and details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    /// One-line summary suitable for display.
    pub message: String,
    /// Raw error body, when there is one.
    pub details: Option<String>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting `error.message` out of a JSON
    /// body when present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        let api_message = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            json.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        });
        let message = match api_message {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: RuntimeErrorKind::HttpStatus,
            message,
            details,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Runtime used when no real runtime can be built.
#[derive(Debug, Clone)]
pub struct UnavailableRuntime {
    reason: String,
}

impl UnavailableRuntime {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> RuntimeError {
        RuntimeError::new(RuntimeErrorKind::Unavailable, self.reason.clone())
    }
}

impl ReasoningRuntime for UnavailableRuntime {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn ensure_ready(&self) -> Result<()> {
        Err(self.error().into())
    }

    fn run<'a>(
        &'a self,
        _request: RuntimeRequest,
        _tools: &'a ToolRegistry,
        _sink: MessageSender,
    ) -> RuntimeFuture<'a> {
        let err = self.error();
        Box::pin(async move { Err(err.into()) })
    }
}

/// Picks the runtime for this process.
pub fn select_runtime(config: &Config) -> Arc<dyn ReasoningRuntime> {
    let Some(settings) = AnthropicSettings::from_config(config) else {
        tracing::debug!("no Anthropic API key configured");
        return Arc::new(UnavailableRuntime::new(format!(
            "Reasoning runtime not available: set {} or [anthropic].api_key in config.toml",
            crate::config::ANTHROPIC_API_KEY_ENV
        )));
    };

    match AnthropicRuntime::new(settings) {
        Ok(runtime) => Arc::new(runtime.with_transcript_store(Arc::new(
            FileTranscriptStore::new(config.transcripts_dir()),
        ))),
        Err(err) => {
            tracing::warn!("Failed to build Anthropic runtime: {err:#}");
            Arc::new(UnavailableRuntime::new(format!(
                "Reasoning runtime not available: {err:#}"
            )))
        }
    }
}
