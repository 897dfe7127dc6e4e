//! Task-scoped sessions for async servers.
//!
//! A server serializes inside the tasks serving one client. Scoping the
//! client's [`SessionHandle`] to those tasks keeps its reference caches
//! separate from every other client's, even when the runtime moves the task
//! between worker threads.
//!
//! ```ignore
//! let session = SessionHandle::new();
//! tokio::spawn(scope_task(session.clone(), async move {
//!     let json = encode_json_current(Some(&*root))?;
//!     // ...
//! }));
//! ```

use std::future::Future;

use crate::session::SessionHandle;

tokio::task_local! {
    static TASK_SESSION: SessionHandle;
}

/// Runs `future` with `handle` as the current session of the task.
pub async fn scope_task<F: Future>(handle: SessionHandle, future: F) -> F::Output {
    TASK_SESSION.scope(handle, future).await
}

/// Returns the session scoped to the running task, if any.
pub(crate) fn task_session() -> Option<SessionHandle> {
    TASK_SESSION.try_with(SessionHandle::clone).ok()
}
