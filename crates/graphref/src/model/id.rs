//! Object identities.
//!
//! An [`ObjectId`] names a referenceable object uniquely within a session. It
//! wraps an opaque token; equality, hashing and ordering are by token value.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Identity of a referenceable object.
///
/// Cloning is cheap (the token is shared), so identities are passed around by
/// value the way the objects owning them are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Arc<str>);

impl ObjectId {
    /// Creates an identity from an opaque token.
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }

    /// Creates a fresh, time-ordered identity (UUIDv7, non-hyphenated hex).
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7().simple().to_string())
    }

    /// Derives a deterministic identity from a namespace and a name.
    ///
    /// ```text
    /// token = hex(SHA-256(namespace || 0x00 || name)[0:16])
    /// ```
    ///
    /// Peers deriving identities for the same domain object independently
    /// arrive at the same token.
    pub fn derived(namespace: &str, name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
        let hash = hasher.finalize();

        let mut token = String::with_capacity(32);
        for byte in &hash[..16] {
            token.push_str(&format!("{:02x}", byte));
        }
        Self::new(token)
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for ObjectId {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
