//! The reference codec.
//!
//! Every reference-typed field of a [`Referenceable`] object goes through
//! [`encode_reference`] and [`decode_reference`]. On encode, an object's full
//! structure is written the first time its identity is seen in the session and
//! a bare identity every time after. On decode, a full object is materialized
//! and registered once; later bare identities resolve to that same `Arc`.
//!
//! Encoding registers an object *before* visiting its children, so a cyclic
//! graph terminates: the back edge is written as a bare identity. Decoding can
//! only register an object *after* its children are complete, so such a back
//! edge cannot be resolved and fails with
//! [`DecodeError::DeserializationCycle`].

use std::sync::Arc;

use tracing::debug;

use crate::codec::wire::{WireReader, WireReference, WireWriter};
use crate::error::{DecodeError, EncodeError};
use crate::model::Referenceable;
use crate::session::SessionContext;

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes a nullable reference to a `T`.
pub fn encode_reference<T: Referenceable>(
    writer: &mut dyn WireWriter,
    session: &mut SessionContext,
    value: Option<&T>,
) -> Result<(), EncodeError> {
    let Some(object) = value else {
        return writer.write_absent();
    };

    let id = object.object_id();
    if session.is_encoded(id) {
        debug!(%id, "repeated reference, encoding identity only");
        return writer.write_identity(id);
    }

    let registry = T::registry();
    let type_tag = object.type_tag();
    if !registry.contains(type_tag) {
        return Err(EncodeError::UnregisteredType {
            tag: type_tag,
            family: registry.family(),
        });
    }

    debug!(%id, type_tag, "initial reference, encoding object and adding to encode cache");
    // Registered once the header is accepted and before any child is visited.
    writer.begin_object(type_tag, id)?;
    session.register_encoded(id.clone());
    object.encode_fields(writer, session)?;
    writer.end_object()
}

/// Names a field, then encodes the reference stored in it.
pub fn encode_field<T: Referenceable>(
    writer: &mut dyn WireWriter,
    session: &mut SessionContext,
    name: &'static str,
    value: Option<&T>,
) -> Result<(), EncodeError> {
    writer.field(name)?;
    encode_reference(writer, session, value)
}

/// Names a field, then encodes a sequence of references stored in it.
pub fn encode_reference_seq<T: Referenceable>(
    writer: &mut dyn WireWriter,
    session: &mut SessionContext,
    name: &'static str,
    items: &[Option<Arc<T>>],
) -> Result<(), EncodeError> {
    writer.field(name)?;
    writer.begin_seq(items.len())?;
    for item in items {
        encode_reference(writer, session, item.as_deref())?;
    }
    writer.end_seq()
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes a nullable reference to a `T`.
///
/// Two references to the same identity within one session decode to the same
/// `Arc`.
pub fn decode_reference<T: Referenceable>(
    reader: &mut dyn WireReader,
    session: &mut SessionContext,
) -> Result<Option<Arc<T>>, DecodeError> {
    match reader.read_reference()? {
        WireReference::Absent => Ok(None),

        WireReference::Identity(id) => {
            debug!(%id, "repeated reference, obtaining from decode cache");
            let Some(object) = session.resolve_any(&id) else {
                return Err(DecodeError::DeserializationCycle { id });
            };
            object
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DecodeError::TypeMismatch {
                    id,
                    expected: std::any::type_name::<T>(),
                })
        }

        WireReference::Object { type_tag, id } => {
            debug!(%id, type_tag = type_tag.as_str(), "initial reference, decoding object");
            let decode = T::registry().decoder(&type_tag)?;
            let object = decode(id.clone(), reader, session)?;
            reader.end_object()?;

            if object.object_id() != &id {
                return Err(DecodeError::IdentityMismatch {
                    expected: id,
                    found: object.object_id().clone(),
                });
            }

            let object = Arc::new(object);
            if !session.register_decoded(id.clone(), Arc::clone(&object)) {
                return Err(DecodeError::DuplicateObject { id });
            }
            debug!(%id, "added to decode cache");
            Ok(Some(object))
        }
    }
}

/// Selects a field, then decodes the reference stored in it.
pub fn decode_field<T: Referenceable>(
    reader: &mut dyn WireReader,
    session: &mut SessionContext,
    name: &'static str,
) -> Result<Option<Arc<T>>, DecodeError> {
    reader.field(name)?;
    decode_reference(reader, session)
}

/// Selects a field, then decodes the sequence of references stored in it.
pub fn decode_reference_seq<T: Referenceable>(
    reader: &mut dyn WireReader,
    session: &mut SessionContext,
    name: &'static str,
) -> Result<Vec<Option<Arc<T>>>, DecodeError> {
    reader.field(name)?;
    let len = reader.begin_seq()?;
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(decode_reference(reader, session)?);
    }
    reader.end_seq()?;
    Ok(items)
}
