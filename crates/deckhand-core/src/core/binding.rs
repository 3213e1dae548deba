//! Execution context binding: "the current session" for tool calls.
//!
//! The tool-dispatch boundary hands tools only their JSON input, so the
//! session they act on is bound per execution flow with a tokio task-local.
//! The binding lives exactly as long as the future passed to [`scope`]; it
//! is released when that future completes, errors, or is dropped, and it is
//! never visible to other tasks. Work spawned with `tokio::spawn` from inside
//! a scope does not inherit the binding.

use std::future::Future;
use std::sync::Arc;

use super::session::SessionHandle;

tokio::task_local! {
    static CURRENT_SESSION: SessionHandle;
}

/// Runs `fut` with `session` bound as the current session.
pub async fn scope<F>(session: SessionHandle, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_SESSION.scope(session, fut).await
}

/// Returns the session bound to the running flow, if any.
pub fn current_session() -> Option<SessionHandle> {
    CURRENT_SESSION.try_with(Arc::clone).ok()
}
