//! Per-session reference caches.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::model::ObjectId;

/// A materialized object with its type erased, as held by the decode cache.
pub(crate) type DecodedObject = Arc<dyn Any + Send + Sync>;

/// The state governing the life-cycle of a serializable graph.
///
/// A server sharing portions of a larger object graph with several clients
/// keeps one context per client, so each client receives every object in full
/// exactly once. A client talking to a single server keeps one context.
///
/// Encode and decode state are independent: `encoded` tracks identities whose
/// full structure has been written, `decoded` retains objects materialized
/// from the wire for later identity-only references.
#[derive(Default)]
pub struct SessionContext {
    encoded: FxHashSet<ObjectId>,
    decoded: FxHashMap<ObjectId, DecodedObject>,
}

impl SessionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `id` has been written in full.
    ///
    /// Returns true if the identity was newly added.
    pub fn register_encoded(&mut self, id: ObjectId) -> bool {
        self.encoded.insert(id)
    }

    /// Returns true if `id` has been written in full during this session.
    pub fn is_encoded(&self, id: &ObjectId) -> bool {
        self.encoded.contains(id)
    }

    /// Retains a materialized object for later identity-only references.
    ///
    /// Never overwrites: returns false and leaves the cache untouched if `id`
    /// is already registered.
    pub fn register_decoded<T: Send + Sync + 'static>(&mut self, id: ObjectId, object: Arc<T>) -> bool {
        if self.decoded.contains_key(&id) {
            return false;
        }
        self.decoded.insert(id, object);
        true
    }

    /// Returns the object materialized under `id`, if any and if it is a `T`.
    pub fn resolve_decoded<T: Send + Sync + 'static>(&self, id: &ObjectId) -> Option<Arc<T>> {
        self.resolve_any(id)?.downcast::<T>().ok()
    }

    /// Returns true if an object has been materialized under `id`.
    pub fn is_decoded(&self, id: &ObjectId) -> bool {
        self.decoded.contains_key(id)
    }

    pub(crate) fn resolve_any(&self, id: &ObjectId) -> Option<DecodedObject> {
        self.decoded.get(id).cloned()
    }

    /// Number of identities written in full.
    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }

    /// Number of objects materialized.
    pub fn decoded_len(&self) -> usize {
        self.decoded.len()
    }

    /// Clears both caches, ending the session's reference history.
    pub fn reset(&mut self) {
        trace!(
            encoded = self.encoded.len(),
            decoded = self.decoded.len(),
            "resetting session context"
        );
        self.encoded.clear();
        self.decoded.clear();
    }

    /// Forgets which identities were written, keeping the decode cache.
    pub fn reset_encoded(&mut self) {
        self.encoded.clear();
    }

    /// Drops all materialized objects, keeping the encode history.
    pub fn reset_decoded(&mut self) {
        self.decoded.clear();
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("encoded", &self.encoded.len())
            .field("decoded", &self.decoded.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_encoded_once() {
        let mut ctx = SessionContext::new();
        let id = ObjectId::new("#s1");

        assert!(!ctx.is_encoded(&id));
        assert!(ctx.register_encoded(id.clone()));
        assert!(ctx.is_encoded(&id));
        assert!(!ctx.register_encoded(id));
        assert_eq!(ctx.encoded_len(), 1);
    }

    #[test]
    fn test_register_decoded_never_overwrites() {
        let mut ctx = SessionContext::new();
        let id = ObjectId::new("#s1");
        let first = Arc::new(String::from("first"));

        assert!(ctx.register_decoded(id.clone(), first.clone()));
        assert!(!ctx.register_decoded(id.clone(), Arc::new(String::from("second"))));

        let resolved = ctx.resolve_decoded::<String>(&id).unwrap();
        assert!(Arc::ptr_eq(&resolved, &first));
    }

    #[test]
    fn test_resolve_absent_and_wrong_type() {
        let mut ctx = SessionContext::new();
        let id = ObjectId::new("#n");
        assert!(ctx.resolve_decoded::<u32>(&id).is_none());

        ctx.register_decoded(id.clone(), Arc::new(7u32));
        assert!(ctx.is_decoded(&id));
        assert_eq!(ctx.resolve_decoded::<u32>(&id).as_deref(), Some(&7));
        assert!(ctx.resolve_decoded::<String>(&id).is_none());
    }

    #[test]
    fn test_reset() {
        let mut ctx = SessionContext::new();
        ctx.register_encoded(ObjectId::new("a"));
        ctx.register_decoded(ObjectId::new("b"), Arc::new(1u8));

        ctx.reset_encoded();
        assert_eq!(ctx.encoded_len(), 0);
        assert_eq!(ctx.decoded_len(), 1);

        ctx.register_encoded(ObjectId::new("a"));
        ctx.reset_decoded();
        assert_eq!(ctx.encoded_len(), 1);
        assert_eq!(ctx.decoded_len(), 0);

        ctx.register_decoded(ObjectId::new("b"), Arc::new(1u8));
        ctx.reset();
        assert_eq!(ctx.encoded_len(), 0);
        assert_eq!(ctx.decoded_len(), 0);
    }

    #[test]
    fn test_debug_shows_counts() {
        let mut ctx = SessionContext::new();
        ctx.register_encoded(ObjectId::new("a"));
        assert_eq!(
            format!("{:?}", ctx),
            "SessionContext { encoded: 1, decoded: 0 }"
        );
    }
}
