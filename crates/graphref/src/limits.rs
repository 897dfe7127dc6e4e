//! Wire constants and security limits for decoding.
//!
//! Readers reject input exceeding these bounds before allocating, so hostile
//! or corrupted messages fail with a [`DecodeError`](crate::DecodeError)
//! instead of exhausting memory or the stack. [`CodecOptions`] starts from
//! these values and lets callers tighten or relax them per session.
//!
//! [`CodecOptions`]: crate::codec::CodecOptions

/// Magic bytes of an uncompressed binary message.
pub const MAGIC_UNCOMPRESSED: &[u8; 4] = b"GREF";

/// Magic bytes of a zstd-compressed binary message.
pub const MAGIC_COMPRESSED: &[u8; 5] = b"GREFZ";

/// Binary format version written by this crate.
pub const FORMAT_VERSION: u8 = 1;

/// Oldest binary format version this crate still reads.
pub const MIN_FORMAT_VERSION: u8 = 1;

/// Maximum bytes in a LEB128 varint encoding a u64.
pub const MAX_VARINT_BYTES: usize = 10;

/// Maximum length in bytes of an identity token or type tag.
pub const MAX_ID_LEN: usize = 256;

/// Maximum length in bytes of a string field.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum number of items in one sequence field.
pub const MAX_SEQUENCE_LEN: usize = 1_000_000;

/// Maximum nesting of full objects and sequences.
///
/// Decoding recurses once per nested full object, so this also bounds the
/// stack used by a single message.
pub const MAX_DEPTH: usize = 256;

/// Maximum size in bytes of one (decompressed) binary message.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;
