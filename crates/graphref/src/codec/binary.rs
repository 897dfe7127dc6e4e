//! Compact binary backend and message envelope.
//!
//! References are written as a tag byte followed by their payload:
//!
//! ```text
//! 0x00                          absent
//! 0x01 id:string                identity only
//! 0x02 tag:string id:string     full object, fields follow in write order
//! ```
//!
//! Field names are not written; the reader uses them only to label errors.
//! A message is `GREF` + version + one root reference. Compressed messages
//! are `GREFZ` + uncompressed size + zstd(message).

use std::io::Read;
use std::sync::Arc;

use crate::codec::primitives::{Reader, Writer};
use crate::codec::reference::{decode_reference, encode_reference};
use crate::codec::wire::{check_finite, CodecOptions, WireReader, WireReference, WireWriter};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{
    FORMAT_VERSION, MAGIC_COMPRESSED, MAGIC_UNCOMPRESSED, MAX_ID_LEN, MAX_MESSAGE_SIZE,
    MIN_FORMAT_VERSION,
};
use crate::model::{ObjectId, Referenceable};
use crate::session::SessionContext;

const TAG_ABSENT: u8 = 0;
const TAG_IDENTITY: u8 = 1;
const TAG_OBJECT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object,
    Seq,
}

// =============================================================================
// WRITER
// =============================================================================

/// [`WireWriter`] producing the binary encoding.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    out: Writer,
    frames: Vec<Frame>,
    options: CodecOptions,
}

impl BinaryWriter {
    /// Creates a writer with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer with the given limits.
    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Returns the encoded bytes, failing if an object or sequence is open.
    pub fn into_bytes(self) -> Result<Vec<u8>, EncodeError> {
        if !self.frames.is_empty() {
            return Err(EncodeError::InvalidWriterState {
                context: "unterminated object or sequence",
            });
        }
        Ok(self.out.into_bytes())
    }

    fn write_token(&mut self, token: &str, field: &'static str) -> Result<(), EncodeError> {
        if token.len() > MAX_ID_LEN {
            return Err(EncodeError::LengthExceedsLimit {
                field,
                len: token.len(),
                max: MAX_ID_LEN,
            });
        }
        self.out.write_string(token);
        Ok(())
    }

    fn push(&mut self, frame: Frame) -> Result<(), EncodeError> {
        self.frames.push(frame);
        self.options.check_encode_depth(self.frames.len())
    }

    fn pop(&mut self, expected: Frame, context: &'static str) -> Result<(), EncodeError> {
        match self.frames.pop() {
            Some(frame) if frame == expected => Ok(()),
            _ => Err(EncodeError::InvalidWriterState { context }),
        }
    }
}

impl WireWriter for BinaryWriter {
    fn write_absent(&mut self) -> Result<(), EncodeError> {
        self.out.write_byte(TAG_ABSENT);
        Ok(())
    }

    fn write_identity(&mut self, id: &ObjectId) -> Result<(), EncodeError> {
        self.out.write_byte(TAG_IDENTITY);
        self.write_token(id.as_str(), "id")
    }

    fn begin_object(&mut self, type_tag: &str, id: &ObjectId) -> Result<(), EncodeError> {
        self.push(Frame::Object)?;
        self.out.write_byte(TAG_OBJECT);
        self.write_token(type_tag, "type_tag")?;
        self.write_token(id.as_str(), "id")
    }

    fn end_object(&mut self) -> Result<(), EncodeError> {
        self.pop(Frame::Object, "end_object without matching begin_object")
    }

    fn field(&mut self, _name: &'static str) -> Result<(), EncodeError> {
        Ok(())
    }

    fn write_str(&mut self, value: &str) -> Result<(), EncodeError> {
        if value.len() > self.options.max_string_len {
            return Err(EncodeError::LengthExceedsLimit {
                field: "string",
                len: value.len(),
                max: self.options.max_string_len,
            });
        }
        self.out.write_string(value);
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<(), EncodeError> {
        self.out.write_signed_varint(value);
        Ok(())
    }

    fn write_f64(&mut self, value: f64) -> Result<(), EncodeError> {
        check_finite(value)?;
        self.out.write_f64(value);
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<(), EncodeError> {
        self.out.write_bool(value);
        Ok(())
    }

    fn begin_seq(&mut self, len: usize) -> Result<(), EncodeError> {
        if len > self.options.max_sequence_len {
            return Err(EncodeError::LengthExceedsLimit {
                field: "sequence",
                len,
                max: self.options.max_sequence_len,
            });
        }
        self.push(Frame::Seq)?;
        self.out.write_varint(len as u64);
        Ok(())
    }

    fn end_seq(&mut self) -> Result<(), EncodeError> {
        self.pop(Frame::Seq, "end_seq without matching begin_seq")
    }
}

// =============================================================================
// READER
// =============================================================================

/// [`WireReader`] over the binary encoding.
#[derive(Debug)]
pub struct BinaryReader<'a> {
    input: Reader<'a>,
    frames: Vec<Frame>,
    field: &'static str,
    options: CodecOptions,
}

impl<'a> BinaryReader<'a> {
    /// Creates a reader over `data` with default limits.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, CodecOptions::default())
    }

    /// Creates a reader over `data` with the given limits.
    pub fn with_options(data: &'a [u8], options: CodecOptions) -> Self {
        Self {
            input: Reader::new(data),
            frames: Vec::new(),
            field: "reference",
            options,
        }
    }

    /// Checks that the whole input has been consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        if !self.frames.is_empty() {
            return Err(DecodeError::MalformedEncoding {
                context: "unterminated object or sequence",
            });
        }
        if !self.input.is_empty() {
            return Err(DecodeError::TrailingData {
                remaining: self.input.remaining_len(),
            });
        }
        Ok(())
    }

    fn read_id(&mut self) -> Result<ObjectId, DecodeError> {
        self.input.read_string(MAX_ID_LEN, "id").map(ObjectId::from)
    }

    fn push(&mut self, frame: Frame) -> Result<(), DecodeError> {
        self.frames.push(frame);
        self.options.check_decode_depth(self.frames.len())
    }

    fn pop(&mut self, expected: Frame, context: &'static str) -> Result<(), DecodeError> {
        match self.frames.pop() {
            Some(frame) if frame == expected => Ok(()),
            _ => Err(DecodeError::MalformedEncoding { context }),
        }
    }
}

impl WireReader for BinaryReader<'_> {
    fn read_reference(&mut self) -> Result<WireReference, DecodeError> {
        match self.input.read_byte(self.field)? {
            TAG_ABSENT => Ok(WireReference::Absent),
            TAG_IDENTITY => Ok(WireReference::Identity(self.read_id()?)),
            TAG_OBJECT => {
                self.push(Frame::Object)?;
                let type_tag = self.input.read_string(MAX_ID_LEN, "type_tag")?;
                let id = self.read_id()?;
                Ok(WireReference::Object { type_tag, id })
            }
            tag => Err(DecodeError::InvalidTag { tag }),
        }
    }

    fn end_object(&mut self) -> Result<(), DecodeError> {
        self.pop(Frame::Object, "end_object outside an object")
    }

    fn field(&mut self, name: &'static str) -> Result<(), DecodeError> {
        self.field = name;
        Ok(())
    }

    fn read_str(&mut self) -> Result<String, DecodeError> {
        self.input.read_string(self.options.max_string_len, self.field)
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.input.read_signed_varint(self.field)
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.input.read_f64(self.field)
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.input.read_bool(self.field)
    }

    fn begin_seq(&mut self) -> Result<usize, DecodeError> {
        let len = self.input.read_len(self.options.max_sequence_len, self.field)?;
        self.push(Frame::Seq)?;
        Ok(len)
    }

    fn end_seq(&mut self) -> Result<(), DecodeError> {
        self.pop(Frame::Seq, "end_seq outside a sequence")
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Encodes a root reference as an uncompressed binary message.
pub fn encode_binary<T: Referenceable>(
    value: Option<&T>,
    session: &mut SessionContext,
) -> Result<Vec<u8>, EncodeError> {
    encode_binary_with_options(value, session, CodecOptions::default())
}

/// Encodes a root reference as an uncompressed binary message with the given
/// limits.
pub fn encode_binary_with_options<T: Referenceable>(
    value: Option<&T>,
    session: &mut SessionContext,
    options: CodecOptions,
) -> Result<Vec<u8>, EncodeError> {
    let mut writer = BinaryWriter::with_options(options);
    writer.out.write_bytes(MAGIC_UNCOMPRESSED);
    writer.out.write_byte(FORMAT_VERSION);
    encode_reference(&mut writer, session, value)?;

    let bytes = writer.into_bytes()?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(EncodeError::LengthExceedsLimit {
            field: "message",
            len: bytes.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(bytes)
}

/// Encodes a root reference as a zstd-compressed binary message.
pub fn encode_binary_compressed<T: Referenceable>(
    value: Option<&T>,
    session: &mut SessionContext,
    level: i32,
) -> Result<Vec<u8>, EncodeError> {
    let uncompressed = encode_binary(value, session)?;

    let compressed = zstd::encode_all(uncompressed.as_slice(), level)
        .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;

    let mut writer = Writer::with_capacity(MAGIC_COMPRESSED.len() + 10 + compressed.len());
    writer.write_bytes(MAGIC_COMPRESSED);
    writer.write_varint(uncompressed.len() as u64);
    writer.write_bytes(&compressed);
    Ok(writer.into_bytes())
}

/// Decompresses a `GREFZ` message, returning the uncompressed `GREF` message.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if input.len() < MAGIC_COMPRESSED.len() {
        return Err(DecodeError::UnexpectedEof { context: "magic" });
    }
    if &input[..MAGIC_COMPRESSED.len()] != MAGIC_COMPRESSED {
        return Err(invalid_magic(input));
    }
    decompress_zstd(&input[MAGIC_COMPRESSED.len()..])
}

/// Decodes a binary message, compressed or not, into its root reference.
pub fn decode_binary<T: Referenceable>(
    input: &[u8],
    session: &mut SessionContext,
) -> Result<Option<Arc<T>>, DecodeError> {
    decode_binary_with_options(input, session, CodecOptions::default())
}

/// Decodes a binary message with the given limits.
pub fn decode_binary_with_options<T: Referenceable>(
    input: &[u8],
    session: &mut SessionContext,
    options: CodecOptions,
) -> Result<Option<Arc<T>>, DecodeError> {
    if input.len() < MAGIC_UNCOMPRESSED.len() {
        return Err(DecodeError::UnexpectedEof { context: "magic" });
    }

    if input.starts_with(MAGIC_COMPRESSED) {
        let decompressed = decompress(input)?;
        decode_uncompressed(&decompressed, session, options)
    } else if input.starts_with(MAGIC_UNCOMPRESSED) {
        decode_uncompressed(input, session, options)
    } else {
        Err(invalid_magic(input))
    }
}

fn decode_uncompressed<T: Referenceable>(
    input: &[u8],
    session: &mut SessionContext,
    options: CodecOptions,
) -> Result<Option<Arc<T>>, DecodeError> {
    if input.len() > MAX_MESSAGE_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "message",
            len: input.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    if !input.starts_with(MAGIC_UNCOMPRESSED) {
        return Err(invalid_magic(input));
    }

    let body = &input[MAGIC_UNCOMPRESSED.len()..];
    let (&version, body) = body
        .split_first()
        .ok_or(DecodeError::UnexpectedEof { context: "version" })?;
    if !(MIN_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(DecodeError::UnsupportedVersion { version });
    }

    let mut reader = BinaryReader::with_options(body, options);
    let root = decode_reference(&mut reader, session)?;
    reader.finish()?;
    Ok(root)
}

fn decompress_zstd(compressed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut reader = Reader::new(compressed);
    let declared_size = reader.read_len(MAX_MESSAGE_SIZE, "uncompressed_size")?;

    let mut decoder = zstd::Decoder::new(reader.remaining())
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    // Read one byte past the declared size to detect oversized payloads
    // without inflating them entirely.
    let mut decompressed = Vec::with_capacity(declared_size);
    (&mut decoder)
        .take(declared_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;

    if decompressed.len() != declared_size {
        return Err(DecodeError::UncompressedSizeMismatch {
            declared: declared_size,
            actual: decompressed.len(),
        });
    }

    Ok(decompressed)
}

fn invalid_magic(input: &[u8]) -> DecodeError {
    let mut found = [0u8; 4];
    let n = input.len().min(4);
    found[..n].copy_from_slice(&input[..n]);
    DecodeError::InvalidMagic { found }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::fixtures::{
        arb_dag, assert_same_graph, build_dag, init_tracing, scenario, Catalog, ProductComponent,
    };

    #[test]
    fn test_scenario_preserves_sharing() {
        init_tracing();
        let graph = scenario();
        let bytes = encode_binary(Some(&*graph.top), &mut SessionContext::new()).unwrap();
        assert_eq!(&bytes[..4], MAGIC_UNCOMPRESSED);
        assert_eq!(bytes[4], FORMAT_VERSION);

        let top = decode_binary::<ProductComponent>(&bytes, &mut SessionContext::new())
            .unwrap()
            .unwrap();
        assert_same_graph(&graph.top, &top);

        let a2 = top.element1().unwrap();
        let a3 = top.element2().unwrap();
        assert!(Arc::ptr_eq(&a2.element2().unwrap(), &a3.element1().unwrap()));
    }

    #[test]
    fn test_cycle_rejected() {
        let graph = scenario();
        graph.a1.set_element2(Some(Arc::clone(&graph.a2)));
        let bytes = encode_binary(Some(&*graph.top), &mut SessionContext::new()).unwrap();

        let err = decode_binary::<ProductComponent>(&bytes, &mut SessionContext::new()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::DeserializationCycle {
                id: ObjectId::new("#a2")
            }
        );
    }

    #[test]
    fn test_absent_root() {
        let mut session = SessionContext::new();
        let bytes = encode_binary::<ProductComponent>(None, &mut session).unwrap();
        assert_eq!(bytes, [b'G', b'R', b'E', b'F', FORMAT_VERSION, TAG_ABSENT]);

        let decoded = decode_binary::<ProductComponent>(&bytes, &mut session).unwrap();
        assert!(decoded.is_none());
        assert_eq!(session.encoded_len(), 0);
        assert_eq!(session.decoded_len(), 0);
    }

    #[test]
    fn test_compressed_round_trip() {
        let graph = scenario();
        let catalog = Catalog::new("#cat", "Spring", -0.25, i64::MIN, false).with_components(vec![
            Some(Arc::clone(&graph.top)),
            Some(Arc::clone(&graph.s1)),
        ]);

        let mut sender = SessionContext::new();
        let compressed = encode_binary_compressed(Some(&catalog), &mut sender, 3).unwrap();
        assert_eq!(&compressed[..5], MAGIC_COMPRESSED);

        let mut receiver = SessionContext::new();
        let decoded = decode_binary::<Catalog>(&compressed, &mut receiver)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.rating, -0.25);
        assert_eq!(decoded.count, i64::MIN);
        assert!(!decoded.featured);

        let top = decoded.components[0].as_ref().unwrap();
        let s1 = decoded.components[1].as_ref().unwrap();
        assert_same_graph(&graph.top, top);
        let a1 = top.element1().unwrap().element1().unwrap();
        assert!(Arc::ptr_eq(&a1.element1().unwrap(), s1));
    }

    #[test]
    fn test_repeated_transmission_is_identity_only() {
        let s1 = ProductComponent::simple("#s1", "A");
        let mut sender = SessionContext::new();
        let mut receiver = SessionContext::new();

        let first = encode_binary(Some(&*s1), &mut sender).unwrap();
        let second = encode_binary(Some(&*s1), &mut sender).unwrap();
        assert_eq!(second[5], TAG_IDENTITY);
        assert!(second.len() < first.len());

        let a = decode_binary::<ProductComponent>(&first, &mut receiver).unwrap().unwrap();
        let b = decode_binary::<ProductComponent>(&second, &mut receiver).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_envelope_errors() {
        let s1 = ProductComponent::simple("#s1", "A");
        let bytes = encode_binary(Some(&*s1), &mut SessionContext::new()).unwrap();
        let mut session = SessionContext::new();

        assert!(matches!(
            decode_binary::<ProductComponent>(b"NOPE\x01\x00", &mut session),
            Err(DecodeError::InvalidMagic { found }) if &found == b"NOPE"
        ));
        assert!(matches!(
            decode_binary::<ProductComponent>(b"GR", &mut session),
            Err(DecodeError::UnexpectedEof { .. })
        ));

        let mut future = bytes.clone();
        future[4] = FORMAT_VERSION + 1;
        assert_eq!(
            decode_binary::<ProductComponent>(&future, &mut session).unwrap_err(),
            DecodeError::UnsupportedVersion {
                version: FORMAT_VERSION + 1
            }
        );

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(
            decode_binary::<ProductComponent>(&trailing, &mut SessionContext::new()).unwrap_err(),
            DecodeError::TrailingData { remaining: 1 }
        );

        let truncated = &bytes[..bytes.len() - 1];
        assert!(matches!(
            decode_binary::<ProductComponent>(truncated, &mut SessionContext::new()),
            Err(DecodeError::UnexpectedEof { .. })
        ));

        let mut bad_tag = bytes;
        bad_tag[5] = 9;
        assert_eq!(
            decode_binary::<ProductComponent>(&bad_tag, &mut SessionContext::new()).unwrap_err(),
            DecodeError::InvalidTag { tag: 9 }
        );
    }

    #[test]
    fn test_declared_size_mismatch() {
        let s1 = ProductComponent::simple("#s1", "A");
        let message = encode_binary(Some(&*s1), &mut SessionContext::new()).unwrap();
        let compressed = zstd::encode_all(message.as_slice(), 3).unwrap();

        let mut writer = Writer::new();
        writer.write_bytes(MAGIC_COMPRESSED);
        writer.write_varint(message.len() as u64 + 10);
        writer.write_bytes(&compressed);

        assert_eq!(
            decompress(writer.as_bytes()).unwrap_err(),
            DecodeError::UncompressedSizeMismatch {
                declared: message.len() + 10,
                actual: message.len(),
            }
        );
    }

    #[test]
    fn test_writer_frame_misuse() {
        let mut writer = BinaryWriter::new();
        assert!(writer.end_seq().is_err());

        let mut writer = BinaryWriter::new();
        writer.begin_object("simple", &ObjectId::new("#s")).unwrap();
        assert!(matches!(
            writer.into_bytes(),
            Err(EncodeError::InvalidWriterState { .. })
        ));

        let mut writer = BinaryWriter::new();
        let long = "x".repeat(MAX_ID_LEN + 1);
        assert!(matches!(
            writer.write_identity(&ObjectId::new(long)),
            Err(EncodeError::LengthExceedsLimit { field: "id", .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let graph = scenario();
        let options = CodecOptions::new().with_max_depth(2);
        let bytes = encode_binary(Some(&*graph.top), &mut SessionContext::new()).unwrap();

        let err = decode_binary_with_options::<ProductComponent>(
            &bytes,
            &mut SessionContext::new(),
            options,
        )
        .unwrap_err();
        assert_eq!(err, DecodeError::DepthLimitExceeded { max: 2 });
    }

    proptest! {
        #[test]
        fn prop_dag_sharing_survives_binary(shape in arb_dag(), compress in any::<bool>()) {
            let nodes = build_dag(&shape);
            let root = nodes.last().unwrap();

            let mut sender = SessionContext::new();
            let bytes = if compress {
                encode_binary_compressed(Some(&**root), &mut sender, 1).unwrap()
            } else {
                encode_binary(Some(&**root), &mut sender).unwrap()
            };

            let mut receiver = SessionContext::new();
            let decoded = decode_binary::<ProductComponent>(&bytes, &mut receiver)
                .unwrap()
                .unwrap();
            assert_same_graph(root, &decoded);
            prop_assert_eq!(receiver.decoded_len(), sender.encoded_len());
        }
    }
}
