//! Registries of concrete object variants, keyed by wire type tag.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::codec::WireReader;
use crate::error::DecodeError;
use crate::model::ObjectId;
use crate::session::SessionContext;

/// Decodes the fields of one variant of `T`.
///
/// Called after the reference header has been read: the identity is already
/// known and passed in, the reader is positioned at the object's first field.
pub type DecodeFn<T> =
    fn(ObjectId, &mut dyn WireReader, &mut SessionContext) -> Result<T, DecodeError>;

/// Maps wire type tags to the decoders of a referenceable family.
///
/// Applications build one registry per family, typically in a `lazy_static!`
/// returned from [`Referenceable::registry`](crate::Referenceable::registry).
pub struct VariantRegistry<T> {
    family: &'static str,
    variants: FxHashMap<&'static str, DecodeFn<T>>,
}

impl<T> VariantRegistry<T> {
    /// Creates an empty registry for the named family.
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            variants: FxHashMap::default(),
        }
    }

    /// Registers a variant decoder under `tag`.
    ///
    /// Returns false (and keeps the existing decoder) if the tag is taken.
    pub fn register(&mut self, tag: &'static str, decode: DecodeFn<T>) -> bool {
        if self.variants.contains_key(tag) {
            return false;
        }
        self.variants.insert(tag, decode);
        true
    }

    /// Name of the family, used in diagnostics.
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Returns the decoder registered under `tag`.
    pub fn get(&self, tag: &str) -> Option<DecodeFn<T>> {
        self.variants.get(tag).copied()
    }

    /// Returns true if `tag` is registered.
    pub fn contains(&self, tag: &str) -> bool {
        self.variants.contains_key(tag)
    }

    /// Returns the registered tags (in no particular order).
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.variants.keys().copied()
    }

    /// Returns the number of registered variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Returns true if no variant is registered.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub(crate) fn decoder(&self, tag: &str) -> Result<DecodeFn<T>, DecodeError> {
        self.get(tag).ok_or_else(|| DecodeError::UnknownType {
            tag: tag.to_string(),
            family: self.family,
        })
    }
}

impl<T> fmt::Debug for VariantRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.tags().collect();
        tags.sort_unstable();
        f.debug_struct("VariantRegistry")
            .field("family", &self.family)
            .field("tags", &tags)
            .finish()
    }
}
