//! The tagged-union wire contract between the reference codec and a tree
//! encoding.
//!
//! A backend implements [`WireWriter`] and [`WireReader`] over its format.
//! The reference codec only ever asks a backend to write or read one of three
//! shapes, plus the plain fields of full objects:
//!
//! ```text
//! reference := absent
//!            | identity(id)
//!            | object(type_tag, id) field* end
//! field     := name (str | i64 | f64 | bool | reference | seq(len) item* end)
//! ```

use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_DEPTH, MAX_SEQUENCE_LEN, MAX_STRING_LEN};
use crate::model::ObjectId;

/// The header of a reference as read from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireReference {
    /// No object.
    Absent,
    /// A bare identity standing in for an object transmitted earlier.
    Identity(ObjectId),
    /// A full object; its fields follow, terminated by
    /// [`WireReader::end_object`].
    Object { type_tag: String, id: ObjectId },
}

impl WireReference {
    /// Returns the referenced identity, if any.
    pub fn object_id(&self) -> Option<&ObjectId> {
        match self {
            WireReference::Absent => None,
            WireReference::Identity(id) | WireReference::Object { id, .. } => Some(id),
        }
    }
}

/// Writes references and object fields in a tree-shaped format.
///
/// Every field value is preceded by [`field`](Self::field) naming it; items of
/// a sequence are written without names.
pub trait WireWriter {
    /// Writes the absence marker.
    fn write_absent(&mut self) -> Result<(), EncodeError>;

    /// Writes an identity-only reference.
    fn write_identity(&mut self, id: &ObjectId) -> Result<(), EncodeError>;

    /// Starts a full object.
    fn begin_object(&mut self, type_tag: &str, id: &ObjectId) -> Result<(), EncodeError>;

    /// Ends the innermost full object.
    fn end_object(&mut self) -> Result<(), EncodeError>;

    /// Names the next value written inside the current object.
    fn field(&mut self, name: &'static str) -> Result<(), EncodeError>;

    /// Writes a string value.
    fn write_str(&mut self, value: &str) -> Result<(), EncodeError>;

    /// Writes a signed integer value.
    fn write_i64(&mut self, value: i64) -> Result<(), EncodeError>;

    /// Writes a finite float value.
    fn write_f64(&mut self, value: f64) -> Result<(), EncodeError>;

    /// Writes a boolean value.
    fn write_bool(&mut self, value: bool) -> Result<(), EncodeError>;

    /// Starts a sequence of `len` items.
    fn begin_seq(&mut self, len: usize) -> Result<(), EncodeError>;

    /// Ends the innermost sequence.
    fn end_seq(&mut self) -> Result<(), EncodeError>;
}

/// Reads references and object fields written by the matching [`WireWriter`].
///
/// Fields must be read in the order they were written.
pub trait WireReader {
    /// Reads a reference header. For [`WireReference::Object`] the reader
    /// enters the object; the caller reads its fields and then calls
    /// [`end_object`](Self::end_object).
    fn read_reference(&mut self) -> Result<WireReference, DecodeError>;

    /// Leaves the innermost full object.
    fn end_object(&mut self) -> Result<(), DecodeError>;

    /// Selects the named field of the current object for the next read.
    fn field(&mut self, name: &'static str) -> Result<(), DecodeError>;

    /// Reads a string value.
    fn read_str(&mut self) -> Result<String, DecodeError>;

    /// Reads a signed integer value.
    fn read_i64(&mut self) -> Result<i64, DecodeError>;

    /// Reads a float value.
    fn read_f64(&mut self) -> Result<f64, DecodeError>;

    /// Reads a boolean value.
    fn read_bool(&mut self) -> Result<bool, DecodeError>;

    /// Enters a sequence, returning its item count.
    fn begin_seq(&mut self) -> Result<usize, DecodeError>;

    /// Leaves the innermost sequence.
    fn end_seq(&mut self) -> Result<(), DecodeError>;
}

/// Bounds applied by readers and writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Maximum nesting of full objects and sequences.
    pub max_depth: usize,
    /// Maximum length in bytes of a string field.
    pub max_string_len: usize,
    /// Maximum number of items in a sequence.
    pub max_sequence_len: usize,
}

impl CodecOptions {
    /// Creates options with the crate's default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns these options with another nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub(crate) fn check_encode_depth(&self, depth: usize) -> Result<(), EncodeError> {
        if depth > self.max_depth {
            return Err(EncodeError::DepthLimitExceeded {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    pub(crate) fn check_decode_depth(&self, depth: usize) -> Result<(), DecodeError> {
        if depth > self.max_depth {
            return Err(DecodeError::DepthLimitExceeded {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    pub(crate) fn check_sequence_len(&self, len: usize) -> Result<(), DecodeError> {
        if len > self.max_sequence_len {
            return Err(DecodeError::LengthExceedsLimit {
                field: "sequence",
                len,
                max: self.max_sequence_len,
            });
        }
        Ok(())
    }

    pub(crate) fn check_string_len(&self, len: usize, field: &'static str) -> Result<(), DecodeError> {
        if len > self.max_string_len {
            return Err(DecodeError::LengthExceedsLimit {
                field,
                len,
                max: self.max_string_len,
            });
        }
        Ok(())
    }
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_string_len: MAX_STRING_LEN,
            max_sequence_len: MAX_SEQUENCE_LEN,
        }
    }
}

pub(crate) fn check_finite(value: f64) -> Result<(), EncodeError> {
    if !value.is_finite() {
        return Err(EncodeError::NonFiniteFloat { value });
    }
    Ok(())
}
