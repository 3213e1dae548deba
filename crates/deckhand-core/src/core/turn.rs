//! Turn driver: runs one instruction against one session.
//!
//! Event order for every turn: `init`, one or more `status`, any number of
//! `assistant` / `tool_use`, then exactly one terminal `complete` or `error`.
//! The session is bound for the duration of the runtime future only.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::binding;
use super::events::{StreamEvent, ToolCallSummary};
use super::registry::{SessionRegistry, save_snapshot};
use super::session::ContextAttachment;
use crate::prompts::build_system_prompt;
use crate::runtime::{ContentBlock, ReasoningRuntime, RuntimeMessage, RuntimeRequest};
use crate::tools::{ToolRegistry, describe_call};

/// Default capacity for turn event channels.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

const RUNTIME_CHANNEL_CAPACITY: usize = 64;

pub type StreamEventTx = mpsc::Sender<StreamEvent>;
pub type StreamEventRx = mpsc::Receiver<StreamEvent>;

pub fn create_event_channel() -> (StreamEventTx, StreamEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

/// Sender for turn events. Delivery is awaited; a dropped receiver is not an
/// error for the turn.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: StreamEventTx,
}

impl EventSender {
    pub fn new(tx: StreamEventTx) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: StreamEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("event receiver dropped");
        }
    }
}

/// One request from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnRequest {
    pub instructions: String,
    /// Backend session id; generated when absent.
    pub session_id: Option<String>,
    /// Continuation token from a previous `complete` event.
    pub resume_token: Option<String>,
    pub is_continuation: bool,
    /// Replaces the session's attachments when non-empty.
    pub context_files: Vec<ContextAttachment>,
}

/// Long-lived collaborators shared by every turn.
#[derive(Clone)]
pub struct TurnContext {
    pub registry: Arc<SessionRegistry>,
    pub tools: ToolRegistry,
    pub runtime: Arc<dyn ReasoningRuntime>,
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("runtime", &self.runtime.name())
            .finish_non_exhaustive()
    }
}

impl TurnContext {
    /// Builds a context whose tools persist through the registry's store.
    pub fn new(registry: Arc<SessionRegistry>, runtime: Arc<dyn ReasoningRuntime>) -> Self {
        let tools = ToolRegistry::builtins(Arc::clone(registry.store()));
        Self {
            registry,
            tools,
            runtime,
        }
    }
}

#[derive(Debug, Default)]
struct Forwarded {
    message_count: usize,
    last_text: String,
    continuation_token: Option<String>,
}

fn tool_use_event(blocks: &[ContentBlock], text: Option<String>) -> Option<StreamEvent> {
    let tool_calls: Vec<ToolCallSummary> = blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } => Some(ToolCallSummary {
                name: name.clone(),
                input: input.clone(),
                friendly: describe_call(name, input),
            }),
            ContentBlock::Text { .. } => None,
        })
        .collect();
    if tool_calls.is_empty() {
        return None;
    }
    let friendly = tool_calls
        .iter()
        .filter_map(|c| c.friendly.clone())
        .collect();
    Some(StreamEvent::ToolUse {
        text,
        tool_calls,
        friendly,
    })
}

async fn forward_messages(
    mut rx: mpsc::Receiver<RuntimeMessage>,
    events: &EventSender,
) -> Forwarded {
    let mut forwarded = Forwarded::default();
    while let Some(message) = rx.recv().await {
        forwarded.message_count += 1;
        let text = message.text();
        match message {
            RuntimeMessage::Assistant { blocks } => {
                if let Some(text) = &text {
                    forwarded.last_text.clone_from(text);
                }
                if let Some(event) = tool_use_event(&blocks, text.clone()) {
                    events.send(event).await;
                } else if let Some(text) = text {
                    events.send(StreamEvent::Assistant { text }).await;
                }
            }
            RuntimeMessage::Result { continuation_token } => {
                forwarded.continuation_token = Some(continuation_token);
            }
        }
    }
    forwarded
}

/// Runs one turn and returns the terminal event it emitted.
pub async fn run_turn(request: TurnRequest, ctx: &TurnContext, events: EventSender) -> StreamEvent {
    let handle = match ctx
        .registry
        .get_or_create(request.session_id.as_deref())
        .await
    {
        Ok(handle) => handle,
        Err(err) => {
            events
                .send(StreamEvent::Init {
                    message: "Starting agent...".to_string(),
                    session_id: request.session_id.clone().unwrap_or_default(),
                })
                .await;
            return finish(&events, StreamEvent::error(format!("Session error: {err:#}"))).await;
        }
    };

    let (session_id, system_prompt) = {
        let mut session = handle.lock().await;
        if !request.context_files.is_empty() {
            session.context_attachments = request.context_files;
        }
        session.is_continuation = request.is_continuation;
        let prompt = build_system_prompt(session.is_continuation, &session.context_attachments);
        (session.session_id.clone(), prompt)
    };

    info!(
        %session_id,
        runtime = ctx.runtime.name(),
        continuation = request.is_continuation,
        "starting turn"
    );
    events
        .send(StreamEvent::Init {
            message: "Starting agent...".to_string(),
            session_id: session_id.clone(),
        })
        .await;
    events
        .send(StreamEvent::status("Connecting to reasoning runtime..."))
        .await;

    if let Err(err) = ctx.runtime.ensure_ready() {
        return finish(&events, StreamEvent::error(format!("Agent error: {err:#}"))).await;
    }
    events
        .send(StreamEvent::status("Agent connected, processing..."))
        .await;

    let runtime_request = RuntimeRequest {
        instructions: request.instructions,
        system_prompt,
        resume_token: request.resume_token,
    };
    let (tx, rx) = mpsc::channel(RUNTIME_CHANNEL_CAPACITY);
    let run = binding::scope(
        Arc::clone(&handle),
        ctx.runtime.run(runtime_request, &ctx.tools, tx),
    );
    let (outcome, forwarded) = tokio::join!(run, forward_messages(rx, &events));

    if let Err(err) = outcome {
        warn!(%session_id, "turn failed: {err:#}");
        return finish(&events, StreamEvent::error(format!("Agent error: {err:#}"))).await;
    }

    let snapshot = {
        let mut session = handle.lock().await;
        if forwarded.continuation_token.is_some() {
            session
                .continuation_token
                .clone_from(&forwarded.continuation_token);
        }
        session.touch();
        session.clone()
    };
    if let Err(err) = save_snapshot(ctx.registry.store().as_ref(), &snapshot) {
        return finish(&events, StreamEvent::error(format!("Agent error: {err:#}"))).await;
    }

    info!(
        %session_id,
        messages = forwarded.message_count,
        slides = snapshot.slide_count(),
        "turn complete"
    );
    finish(
        &events,
        StreamEvent::Complete {
            success: true,
            result: forwarded.last_text,
            message_count: forwarded.message_count,
            session_id: forwarded.continuation_token,
            user_session_id: session_id,
            slide_count: snapshot.slide_count(),
            applied_edit_count: snapshot.applied_edits.len(),
        },
    )
    .await
}

async fn finish(events: &EventSender, terminal: StreamEvent) -> StreamEvent {
    events.send(terminal.clone()).await;
    terminal
}
