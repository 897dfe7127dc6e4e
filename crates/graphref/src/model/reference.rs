//! The referenceable capability.

use crate::codec::WireWriter;
use crate::error::EncodeError;
use crate::model::{ObjectId, VariantRegistry};
use crate::session::SessionContext;

/// A value that owns an identity and may be pointed to from many places.
///
/// A type implementing this trait is the *family* of a reference field:
/// usually an enum whose variants are the concrete object kinds, each one
/// registered under its wire type tag in [`Referenceable::registry`].
///
/// Shared instances are held as `Arc<Self>`; decoding two references to the
/// same identity yields the same `Arc`.
pub trait Referenceable: Send + Sync + Sized + 'static {
    /// Identity of this object. Must not change for the object's lifetime.
    fn object_id(&self) -> &ObjectId;

    /// Wire type tag of this object's variant.
    fn type_tag(&self) -> &'static str;

    /// Writes this object's fields (excluding identity and type tag).
    ///
    /// Nested reference fields go through
    /// [`encode_field`](crate::codec::encode_field) with the same `session`.
    fn encode_fields(
        &self,
        writer: &mut dyn WireWriter,
        session: &mut SessionContext,
    ) -> Result<(), EncodeError>;

    /// Registry of this family's variants, used to decode full objects.
    fn registry() -> &'static VariantRegistry<Self>;
}
