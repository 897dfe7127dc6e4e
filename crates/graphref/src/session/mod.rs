//! Serialization sessions.
//!
//! A [`SessionContext`] holds one session's reference caches. It is either
//! passed explicitly to the codec, or shared through a [`SessionHandle`] and
//! looked up with [`current_session`] from a task scope, a thread scope or the
//! process-wide single session.

pub mod context;
pub mod scope;
pub mod task;

pub use context::SessionContext;
pub use scope::{
    clear_single_session, current_session, install_single_session, scope_thread,
    with_current_session, SessionHandle,
};
pub use task::scope_task;
