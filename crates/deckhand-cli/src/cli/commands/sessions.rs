//! Session command handlers.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use deckhand_core::config::Config;
use deckhand_core::core::registry::SessionRegistry;
use deckhand_core::core::store::FileSessionStore;

fn registry(config: &Config) -> SessionRegistry {
    SessionRegistry::new(Arc::new(FileSessionStore::new(config.sessions_dir())))
}

pub async fn list(config: &Config) -> Result<()> {
    let sessions = registry(config).list().await?;
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    for summary in sessions {
        let title = summary.title.as_deref().unwrap_or("(no deck)");
        println!(
            "{}  {}  {} slide(s)  {} pending  {}",
            summary.session_id,
            title,
            summary.slide_count,
            summary.pending_count,
            summary.updated_at
        );
    }
    Ok(())
}

pub async fn show(config: &Config, id: &str) -> Result<()> {
    let Some(handle) = registry(config).get(id).await? else {
        bail!("Session '{id}' not found");
    };
    let session = handle.lock().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&*session).context("serialize session")?
    );
    Ok(())
}
