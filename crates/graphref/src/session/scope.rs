//! Session handles and the scoped lookup of the current session.
//!
//! Code that cannot thread a `&mut SessionContext` through its call chain
//! obtains the active session with [`current_session`]. The lookup checks, in
//! order:
//!
//! 1. the tokio task's session, established by [`scope_task`](super::scope_task);
//! 2. the thread's session, established by [`scope_thread`];
//! 3. the process-wide single session, installed by [`install_single_session`].
//!
//! A server keeps one [`SessionHandle`] per client connection and scopes it to
//! the tasks serving that client. A process talking to a single peer may
//! install one permanent session instead.

use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use tracing::trace;

use crate::error::SessionUnavailableError;
use crate::session::SessionContext;

/// A shareable handle to one session's context.
///
/// Clones refer to the same context. [`with`](Self::with) holds the lock for
/// the whole closure, so one encode or decode pass sees a consistent context
/// and two passes on the same session never interleave.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionContext>>,
}

impl SessionHandle {
    /// Creates a handle to a fresh, empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with exclusive access to the context.
    ///
    /// A context whose previous user panicked is still handed out: its caches
    /// only ever hold fully registered entries.
    pub fn with<R>(&self, f: impl FnOnce(&mut SessionContext) -> R) -> R {
        f(&mut self.lock())
    }

    /// Clears the context (see [`SessionContext::reset`]).
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Returns true if both handles refer to the same context.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, SessionContext> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

thread_local! {
    static THREAD_SESSION: RefCell<Option<SessionHandle>> = const { RefCell::new(None) };
}

lazy_static! {
    static ref SINGLE_SESSION: Mutex<Option<SessionHandle>> = Mutex::new(None);
}

/// Restores the thread's previous session when dropped.
struct ThreadScopeGuard {
    previous: Option<SessionHandle>,
}

impl Drop for ThreadScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        THREAD_SESSION.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Runs `f` with `handle` as the current thread's session.
///
/// Scopes nest; the enclosing session is restored when `f` returns or unwinds.
pub fn scope_thread<R>(handle: &SessionHandle, f: impl FnOnce() -> R) -> R {
    let previous = THREAD_SESSION.with(|slot| slot.borrow_mut().replace(handle.clone()));
    let _guard = ThreadScopeGuard { previous };
    trace!("entered thread-scoped serialization session");
    f()
}

/// Installs a fresh process-wide session and returns its handle.
///
/// Meant for processes serving a single peer. Replaces any previously
/// installed single session.
pub fn install_single_session() -> SessionHandle {
    let handle = SessionHandle::new();
    *single_slot() = Some(handle.clone());
    trace!("installed single serialization session");
    handle
}

/// Removes the process-wide session, returning it if one was installed.
pub fn clear_single_session() -> Option<SessionHandle> {
    single_slot().take()
}

fn single_slot() -> MutexGuard<'static, Option<SessionHandle>> {
    SINGLE_SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns the session visible to the caller.
///
/// Fails with [`SessionUnavailableError`] if no task, thread or single session
/// has been established.
pub fn current_session() -> Result<SessionHandle, SessionUnavailableError> {
    if let Some(handle) = super::task::task_session() {
        return Ok(handle);
    }
    if let Some(handle) = THREAD_SESSION.with(|slot| slot.borrow().clone()) {
        return Ok(handle);
    }
    single_slot().clone().ok_or(SessionUnavailableError)
}

/// Runs `f` with exclusive access to the current session's context.
pub fn with_current_session<R>(
    f: impl FnOnce(&mut SessionContext) -> R,
) -> Result<R, SessionUnavailableError> {
    Ok(current_session()?.with(f))
}
