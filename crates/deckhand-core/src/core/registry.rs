//! Session registry: maps session ids to live session handles.
//!
//! The registry is the only structure touched by several turns at once. The
//! map lock is never held across store I/O: a miss loads from the store on
//! the blocking pool, then re-checks the map before inserting, so two turns
//! racing on the same new id still end up sharing one session.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::session::{Session, SessionHandle};
use super::store::{SessionStore, SessionSummary};

pub struct SessionRegistry {
    live: Mutex<HashMap<String, SessionHandle>>,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").finish_non_exhaustive()
    }
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    async fn live_handle(&self, session_id: &str) -> Option<SessionHandle> {
        self.live.lock().await.get(session_id).map(Arc::clone)
    }

    async fn load_stored(&self, session_id: &str) -> Result<Option<Session>> {
        let store = Arc::clone(&self.store);
        let id = session_id.to_string();
        tokio::task::spawn_blocking(move || store.load(&id))
            .await
            .context("session load task failed")?
            .with_context(|| format!("load session {session_id}"))
    }

    /// Registers `session` unless another turn got there first; either way
    /// returns the handle everyone shares.
    async fn register(&self, session: Session) -> SessionHandle {
        let mut live = self.live.lock().await;
        match live.entry(session.session_id.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => Arc::clone(entry.insert(session.into_handle())),
        }
    }

    /// Returns the session for `session_id`, creating it if unknown.
    ///
    /// Resolution order: live sessions, then the store, then a fresh session.
    /// A fresh session adopts the supplied id, or a generated UUID if none.
    ///
    /// # Errors
    /// Returns an error if the store fails to load an existing record.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> Result<SessionHandle> {
        let id = match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        if let Some(handle) = self.live_handle(&id).await {
            return Ok(handle);
        }

        let session = match self.load_stored(&id).await? {
            Some(session) => {
                debug!(session_id = %id, "restored session from store");
                session
            }
            None => {
                info!(session_id = %id, "created session");
                Session::new(id)
            }
        };
        Ok(self.register(session).await)
    }

    /// Returns an existing session without creating one.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn get(&self, session_id: &str) -> Result<Option<SessionHandle>> {
        if let Some(handle) = self.live_handle(session_id).await {
            return Ok(Some(handle));
        }

        let Some(session) = self.load_stored(session_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.register(session).await))
    }

    /// Lists stored sessions.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.list())
            .await
            .context("session list task failed")?
            .context("list sessions")
    }

    /// Persists a snapshot of the session.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn save(&self, handle: &SessionHandle) -> Result<()> {
        let snapshot = handle.lock().await.clone();
        save_snapshot(self.store.as_ref(), &snapshot)
    }
}

/// Saves a snapshot taken while the session lock was held.
///
/// # Errors
/// Returns an error if the store fails.
pub fn save_snapshot(store: &dyn SessionStore, snapshot: &Session) -> Result<()> {
    store
        .save(snapshot)
        .with_context(|| format!("save session {}", snapshot.session_id))
}
