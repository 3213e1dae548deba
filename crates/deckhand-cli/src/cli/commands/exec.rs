//! Exec command: one instruction, one turn, events on stdout.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use deckhand_core::config::Config;
use deckhand_core::core::events::StreamEvent;
use deckhand_core::core::registry::SessionRegistry;
use deckhand_core::core::session::ContextAttachment;
use deckhand_core::core::store::{FileSessionStore, SessionStore};
use deckhand_core::core::turn::{
    EventSender, StreamEventRx, TurnContext, TurnRequest, create_event_channel, run_turn,
};
use deckhand_core::runtime::select_runtime;

pub struct ExecRunOptions<'a> {
    pub config: &'a Config,
    pub prompt: &'a str,
    pub session_id: Option<&'a str>,
    pub resume_token: Option<&'a str>,
    pub continuation: bool,
    pub context_files: &'a [PathBuf],
}

fn read_context_file(path: &Path) -> Result<ContextAttachment> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read context file {}", path.display()))?;
    let filename = path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );
    Ok(ContextAttachment { filename, text })
}

async fn print_events(mut rx: StreamEventRx) -> Result<()> {
    let stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        let line = serde_json::to_string(&event).context("serialize event")?;
        let mut out = stdout.lock();
        writeln!(out, "{line}").context("write event")?;
        out.flush().context("flush stdout")?;
    }
    Ok(())
}

pub async fn run(options: ExecRunOptions<'_>) -> Result<()> {
    let context_files = options
        .context_files
        .iter()
        .map(|path| read_context_file(path))
        .collect::<Result<Vec<_>>>()?;

    let store: Arc<dyn SessionStore> =
        Arc::new(FileSessionStore::new(options.config.sessions_dir()));
    let registry = Arc::new(SessionRegistry::new(store));

    // `--continue` without `--resume` picks up the session's stored token.
    let mut resume_token = options.resume_token.map(str::to_string);
    if options.continuation
        && resume_token.is_none()
        && let Some(id) = options.session_id
        && let Some(handle) = registry.get(id).await?
    {
        resume_token.clone_from(&handle.lock().await.continuation_token);
    }

    let request = TurnRequest {
        instructions: options.prompt.to_string(),
        session_id: options.session_id.map(str::to_string),
        resume_token,
        is_continuation: options.continuation,
        context_files,
    };
    let ctx = TurnContext::new(registry, select_runtime(options.config));

    let (tx, rx) = create_event_channel();
    let (terminal, printed) = tokio::join!(
        run_turn(request, &ctx, EventSender::new(tx)),
        print_events(rx)
    );
    printed?;

    match terminal {
        StreamEvent::Error { error } => bail!(error),
        _ => Ok(()),
    }
}
