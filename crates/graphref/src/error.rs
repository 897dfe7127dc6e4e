//! Error types for reference-aware encoding/decoding and wire validation.

use thiserror::Error;

use crate::model::ObjectId;

/// Error codes shared by encode, decode and validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Descendant refers to an ancestor still being decoded
    DeserializationCycle,
    /// E002: No serialization session is active
    SessionUnavailable,
    /// E003: Type tag missing from the variant registry
    UnknownType,
    /// E004: Resolved object has another type than the field expects
    TypeMismatch,
    /// E005: Malformed wire data
    MalformedEncoding,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::DeserializationCycle => "E001",
            ErrorCode::SessionUnavailable => "E002",
            ErrorCode::UnknownType => "E003",
            ErrorCode::TypeMismatch => "E004",
            ErrorCode::MalformedEncoding => "E005",
        }
    }
}

/// Raised when encoding or decoding is attempted with no active session.
///
/// This is a setup defect of the caller: see [`crate::session`] for the ways
/// to establish a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "[E002] the serialization session's context has not been initialized; \
     scope a SessionHandle to the task or thread, or install a single session"
)]
pub struct SessionUnavailableError;

/// Error during decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === E001: Cycle ===
    #[error(
        "[E001] object {id} is unavailable in the session cache due to a descendant referring to an ancestor"
    )]
    DeserializationCycle { id: ObjectId },

    // === E002: Session ===
    #[error(transparent)]
    SessionUnavailable(#[from] SessionUnavailableError),

    // === E003: Registry ===
    #[error("[E003] unknown type tag {tag:?} for {family}")]
    UnknownType { tag: String, family: &'static str },

    // === E004: Type mismatch ===
    #[error("[E004] object {id} was materialized with a type other than {expected}")]
    TypeMismatch { id: ObjectId, expected: &'static str },

    // === E005: Malformed encoding ===
    #[error("[E005] object {id} transmitted in full more than once")]
    DuplicateObject { id: ObjectId },

    #[error("[E005] object decoded as {found} but wire declared {expected}")]
    IdentityMismatch { expected: ObjectId, found: ObjectId },

    #[error("[E005] unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("[E005] varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("[E005] varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("[E005] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[E005] invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("[E005] invalid reference tag: {tag}")]
    InvalidTag { tag: u8 },

    #[error("[E005] invalid bool value: {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("[E005] missing field {field:?}")]
    MissingField { field: &'static str },

    #[error("[E005] unexpected value for {context}: expected {expected}")]
    UnexpectedValue {
        context: &'static str,
        expected: &'static str,
    },

    #[error("[E005] malformed encoding: {context}")]
    MalformedEncoding { context: &'static str },

    #[error("[E005] invalid magic bytes: expected GREF or GREFZ, found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("[E005] unsupported version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("[E005] zstd decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("[E005] decompressed size {actual} doesn't match declared {declared}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },

    #[error("[E005] {remaining} trailing bytes after the root reference")]
    TrailingData { remaining: usize },

    #[error("[E005] nesting depth exceeds maximum {max}")]
    DepthLimitExceeded { max: usize },

    #[error("[E005] float value is NaN")]
    FloatIsNan,

    #[error("[E005] invalid JSON: {0}")]
    Json(String),
}

impl DecodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::DeserializationCycle { .. } => ErrorCode::DeserializationCycle,
            DecodeError::SessionUnavailable(_) => ErrorCode::SessionUnavailable,
            DecodeError::UnknownType { .. } => ErrorCode::UnknownType,
            DecodeError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            _ => ErrorCode::MalformedEncoding,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}

/// Error during encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error(transparent)]
    SessionUnavailable(#[from] SessionUnavailableError),

    #[error("type tag {tag:?} is not registered for {family}")]
    UnregisteredType { tag: &'static str, family: &'static str },

    #[error("field name {name:?} is reserved for the reference header")]
    ReservedFieldName { name: &'static str },

    #[error("writer misuse: {context}")]
    InvalidWriterState { context: &'static str },

    #[error("nesting depth exceeds maximum {max}")]
    DepthLimitExceeded { max: usize },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("float value {value} is not finite")]
    NonFiniteFloat { value: f64 },

    #[error("zstd compression failed: {0}")]
    CompressionFailed(String),

    #[error("JSON output failed: {0}")]
    Json(String),
}

impl EncodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EncodeError::SessionUnavailable(_) => ErrorCode::SessionUnavailable,
            EncodeError::UnregisteredType { .. } => ErrorCode::UnknownType,
            _ => ErrorCode::MalformedEncoding,
        }
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        EncodeError::Json(err.to_string())
    }
}

/// Error found while auditing a JSON wire document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("object {id} appears in full more than once (at {path})")]
    DuplicateFullObject { id: ObjectId, path: String },

    #[error("identity reference {id} at {path} points to an ancestor that is still open")]
    BackReference { id: ObjectId, path: String },

    #[error("identity reference {id} at {path} precedes any full transmission")]
    UnresolvedReference { id: ObjectId, path: String },

    #[error("malformed reference at {path}: {reason}")]
    MalformedReference { path: String, reason: &'static str },
}
