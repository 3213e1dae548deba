//! Anthropic Messages API runtime.
//!
//! Non-streaming tool loop: send the transcript, emit the assistant message,
//! run any requested tools in order, append their results, repeat until the
//! model stops asking for tools. Transcripts are kept in a `TranscriptStore`
//! keyed by continuation token, so a later turn can resume the conversation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::transcript::{MemoryTranscriptStore, TranscriptMessage, TranscriptStore};
use super::{
    ContentBlock, MessageSender, ReasoningRuntime, RuntimeError, RuntimeErrorKind, RuntimeFuture,
    RuntimeMessage, RuntimeRequest,
};
use crate::config::Config;
use crate::tools::{ToolDefinition, ToolRegistry};

const API_VERSION: &str = "2023-06-01";
const USER_AGENT: &str = concat!("deckhand/", env!("CARGO_PKG_VERSION"));

/// Resolved settings for the Anthropic runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnthropicSettings {
    pub api_key: String,
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_tool_rounds: usize,
    pub timeout: Duration,
}

impl AnthropicSettings {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_key = config.anthropic.effective_api_key()?;
        Some(Self {
            api_key,
            base_url: config.anthropic.effective_base_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_tool_rounds: config.max_tool_rounds.max(1),
            timeout: config.request_timeout(),
        })
    }
}

// === API types ===

#[derive(Debug, Serialize)]
struct ApiToolDef<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

impl<'a> From<&'a ToolDefinition> for ApiToolDef<'a> {
    fn from(def: &'a ToolDefinition) -> Self {
        Self {
            name: &def.name,
            description: &def.description,
            input_schema: &def.input_schema,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [TranscriptMessage],
    tools: Vec<ApiToolDef<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Keeps text and tool-use blocks; anything else the API returns is left in
/// the transcript but not surfaced.
fn surface_blocks(content: &[Value]) -> Vec<ContentBlock> {
    content
        .iter()
        .filter_map(|block| serde_json::from_value(block.clone()).ok())
        .collect()
}

fn classify_reqwest_error(err: &reqwest::Error) -> RuntimeError {
    if err.is_timeout() {
        RuntimeError::new(RuntimeErrorKind::Timeout, format!("Request timed out: {err}"))
    } else if err.is_decode() {
        RuntimeError::new(RuntimeErrorKind::Parse, format!("Invalid response: {err}"))
    } else {
        RuntimeError::new(RuntimeErrorKind::HttpStatus, format!("Request failed: {err}"))
    }
}

/// Anthropic-backed reasoning runtime.
pub struct AnthropicRuntime {
    settings: AnthropicSettings,
    http: reqwest::Client,
    transcripts: Arc<dyn TranscriptStore>,
}

impl std::fmt::Debug for AnthropicRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicRuntime")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .finish_non_exhaustive()
    }
}

impl AnthropicRuntime {
    /// Builds a runtime whose transcripts live only in this process.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: AnthropicSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            settings,
            http,
            transcripts: Arc::new(MemoryTranscriptStore::new()),
        })
    }

    #[must_use]
    pub fn with_transcript_store(mut self, transcripts: Arc<dyn TranscriptStore>) -> Self {
        self.transcripts = transcripts;
        self
    }

    async fn send(
        &self,
        system: &str,
        messages: &[TranscriptMessage],
        tools: &[ToolDefinition],
    ) -> Result<MessagesResponse> {
        let request = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            system: (!system.is_empty()).then_some(system),
            messages,
            tools: tools.iter().map(ApiToolDef::from).collect(),
        };
        let url = format!("{}/v1/messages", self.settings.base_url);

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("anthropic-version", API_VERSION)
            .header("x-api-key", &self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::http_status(status.as_u16(), &body).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        serde_json::from_str(&body).map_err(|e| {
            RuntimeError {
                kind: RuntimeErrorKind::Parse,
                message: format!("Invalid response body: {e}"),
                details: Some(body.clone()),
            }
            .into()
        })
    }

    async fn run_loop(
        &self,
        request: RuntimeRequest,
        tools: &ToolRegistry,
        sink: MessageSender,
    ) -> Result<()> {
        let (token, minted, mut transcript) = match request.resume_token {
            Some(token) => {
                let stored = self
                    .transcripts
                    .load(&token)
                    .with_context(|| format!("load transcript for {token}"))?;
                match stored {
                    Some(transcript) => (token, false, transcript),
                    None => {
                        warn!(%token, "no transcript for resume token; starting fresh");
                        (token, false, Vec::new())
                    }
                }
            }
            None => (uuid::Uuid::new_v4().to_string(), true, Vec::new()),
        };
        transcript.push(TranscriptMessage::user_text(&request.instructions));

        let outcome = self
            .tool_rounds(&request.system_prompt, &mut transcript, tools, &sink)
            .await;

        if let Err(err) = outcome {
            // A token minted by a failed turn never reaches the caller.
            if !minted && let Err(save_err) = self.transcripts.save(&token, &transcript) {
                warn!(%token, "failed to save transcript: {save_err:#}");
            }
            return Err(err);
        }
        self.transcripts
            .save(&token, &transcript)
            .with_context(|| format!("save transcript for {token}"))?;

        // A closed sink means nobody is listening; the turn still succeeded.
        let _ = sink
            .send(RuntimeMessage::Result {
                continuation_token: token,
            })
            .await;
        Ok(())
    }

    async fn tool_rounds(
        &self,
        system: &str,
        transcript: &mut Vec<TranscriptMessage>,
        tools: &ToolRegistry,
        sink: &MessageSender,
    ) -> Result<()> {
        for round in 0..self.settings.max_tool_rounds {
            let response = self.send(system, transcript, tools.definitions()).await?;
            let blocks = surface_blocks(&response.content);
            debug!(
                round,
                blocks = blocks.len(),
                stop_reason = ?response.stop_reason,
                "model response"
            );

            transcript.push(TranscriptMessage::new("assistant", response.content));
            let _ = sink
                .send(RuntimeMessage::Assistant {
                    blocks: blocks.clone(),
                })
                .await;

            let calls: Vec<_> = blocks
                .into_iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
                    ContentBlock::Text { .. } => None,
                })
                .collect();
            if response.stop_reason.as_deref() != Some("tool_use") || calls.is_empty() {
                return Ok(());
            }

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                let (_, result) = tools.execute_tool(&name, &id, &input).await;
                results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": result.tool_use_id,
                    "content": result.content,
                    "is_error": result.is_error,
                }));
            }
            transcript.push(TranscriptMessage::new("user", results));
        }

        Err(RuntimeError::new(
            RuntimeErrorKind::ToolRoundLimit,
            format!(
                "Model still requesting tools after {} rounds",
                self.settings.max_tool_rounds
            ),
        )
        .into())
    }
}

impl ReasoningRuntime for AnthropicRuntime {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn run<'a>(
        &'a self,
        request: RuntimeRequest,
        tools: &'a ToolRegistry,
        sink: MessageSender,
    ) -> RuntimeFuture<'a> {
        Box::pin(self.run_loop(request, tools, sink))
    }
}
