//! JSON backend.
//!
//! References map onto JSON values as follows:
//!
//! ```text
//! null                                  absent
//! {"id": "<token>"}                     identity only
//! {"type": "<tag>", "id": "<token>",    full object, followed by its fields
//!  "<field>": ..., ...}                 in write order
//! ```
//!
//! `type` and `id` are therefore reserved and cannot be used as field names.
//! A reference field missing from an object decodes as absent.

use std::sync::Arc;

use serde_json::{Map, Number, Value};

use crate::codec::reference::{decode_reference, encode_reference};
use crate::codec::wire::{check_finite, CodecOptions, WireReader, WireReference, WireWriter};
use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_ID_LEN;
use crate::model::{ObjectId, Referenceable};
use crate::session::{current_session, SessionContext};

const TYPE_KEY: &str = "type";
const ID_KEY: &str = "id";

// =============================================================================
// WRITER
// =============================================================================

#[derive(Debug)]
enum WriteFrame {
    Object {
        map: Map<String, Value>,
        key: Option<&'static str>,
    },
    Seq {
        items: Vec<Value>,
        declared: usize,
    },
}

/// [`WireWriter`] building a [`serde_json::Value`].
#[derive(Debug, Default)]
pub struct JsonWriter {
    frames: Vec<WriteFrame>,
    root: Option<Value>,
    options: CodecOptions,
}

impl JsonWriter {
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

    /// Returns the written root value.
    pub fn finish(self) -> Result<Value, EncodeError> {
        if !self.frames.is_empty() {
            return Err(EncodeError::InvalidWriterState {
                context: "unterminated object or sequence",
            });
        }
        self.root.ok_or(EncodeError::InvalidWriterState {
            context: "no value written",
        })
    }

    fn emit(&mut self, value: Value) -> Result<(), EncodeError> {
        match self.frames.last_mut() {
            None => {
                if self.root.is_some() {
                    return Err(EncodeError::InvalidWriterState {
                        context: "more than one root value",
                    });
                }
                self.root = Some(value);
            }
            Some(WriteFrame::Object { map, key }) => {
                let name = key.take().ok_or(EncodeError::InvalidWriterState {
                    context: "value written without a field name",
                })?;
                map.insert(name.to_string(), value);
            }
            Some(WriteFrame::Seq { items, .. }) => items.push(value),
        }
        Ok(())
    }

    fn push(&mut self, frame: WriteFrame) -> Result<(), EncodeError> {
        self.frames.push(frame);
        self.options.check_encode_depth(self.frames.len())
    }
}

/// Ids and type tags share the reader's bound.
fn check_token(token: &str, field: &'static str) -> Result<(), EncodeError> {
    if token.len() > MAX_ID_LEN {
        return Err(EncodeError::LengthExceedsLimit {
            field,
            len: token.len(),
            max: MAX_ID_LEN,
        });
    }
    Ok(())
}

impl WireWriter for JsonWriter {
    fn write_absent(&mut self) -> Result<(), EncodeError> {
        self.emit(Value::Null)
    }

    fn write_identity(&mut self, id: &ObjectId) -> Result<(), EncodeError> {
        check_token(id.as_str(), "id")?;
        let mut map = Map::with_capacity(1);
        map.insert(ID_KEY.to_string(), Value::String(id.as_str().to_string()));
        self.emit(Value::Object(map))
    }

    fn begin_object(&mut self, type_tag: &str, id: &ObjectId) -> Result<(), EncodeError> {
        check_token(type_tag, "type_tag")?;
        check_token(id.as_str(), "id")?;
        let mut map = Map::new();
        map.insert(TYPE_KEY.to_string(), Value::String(type_tag.to_string()));
        map.insert(ID_KEY.to_string(), Value::String(id.as_str().to_string()));
        self.push(WriteFrame::Object { map, key: None })
    }

    fn end_object(&mut self) -> Result<(), EncodeError> {
        match self.frames.pop() {
            Some(WriteFrame::Object { map, key: None }) => self.emit(Value::Object(map)),
            Some(WriteFrame::Object { key: Some(_), .. }) => Err(EncodeError::InvalidWriterState {
                context: "field name without a value",
            }),
            _ => Err(EncodeError::InvalidWriterState {
                context: "end_object without matching begin_object",
            }),
        }
    }

    fn field(&mut self, name: &'static str) -> Result<(), EncodeError> {
        if name == TYPE_KEY || name == ID_KEY {
            return Err(EncodeError::ReservedFieldName { name });
        }
        match self.frames.last_mut() {
            Some(WriteFrame::Object { key: slot @ None, .. }) => {
                *slot = Some(name);
                Ok(())
            }
            _ => Err(EncodeError::InvalidWriterState {
                context: "field name outside an object or without a value",
            }),
        }
    }

    fn write_str(&mut self, value: &str) -> Result<(), EncodeError> {
        if value.len() > self.options.max_string_len {
            return Err(EncodeError::LengthExceedsLimit {
                field: "string",
                len: value.len(),
                max: self.options.max_string_len,
            });
        }
        self.emit(Value::String(value.to_string()))
    }

    fn write_i64(&mut self, value: i64) -> Result<(), EncodeError> {
        self.emit(Value::from(value))
    }

    fn write_f64(&mut self, value: f64) -> Result<(), EncodeError> {
        check_finite(value)?;
        let number = Number::from_f64(value).ok_or(EncodeError::NonFiniteFloat { value })?;
        self.emit(Value::Number(number))
    }

    fn write_bool(&mut self, value: bool) -> Result<(), EncodeError> {
        self.emit(Value::Bool(value))
    }

    fn begin_seq(&mut self, len: usize) -> Result<(), EncodeError> {
        if len > self.options.max_sequence_len {
            return Err(EncodeError::LengthExceedsLimit {
                field: "sequence",
                len,
                max: self.options.max_sequence_len,
            });
        }
        self.push(WriteFrame::Seq {
            items: Vec::with_capacity(len),
            declared: len,
        })
    }

    fn end_seq(&mut self) -> Result<(), EncodeError> {
        match self.frames.pop() {
            Some(WriteFrame::Seq { items, declared }) if items.len() == declared => {
                self.emit(Value::Array(items))
            }
            Some(WriteFrame::Seq { .. }) => Err(EncodeError::InvalidWriterState {
                context: "sequence length differs from declared length",
            }),
            _ => Err(EncodeError::InvalidWriterState {
                context: "end_seq without matching begin_seq",
            }),
        }
    }
}

// =============================================================================
// READER
// =============================================================================

#[derive(Debug)]
enum ReadFrame {
    Object {
        map: Map<String, Value>,
        key: Option<&'static str>,
    },
    Seq(std::vec::IntoIter<Value>),
}

/// [`WireReader`] over a [`serde_json::Value`].
///
/// Object members are consumed as they are read; members no field asked for
/// are ignored.
#[derive(Debug)]
pub struct JsonReader {
    frames: Vec<ReadFrame>,
    root: Option<Value>,
    field: &'static str,
    options: CodecOptions,
}

impl JsonReader {
    /// Creates a reader over `value` with default limits.
    pub fn new(value: Value) -> Self {
        Self::with_options(value, CodecOptions::default())
    }

    /// Creates a reader over `value` with the given limits.
    pub fn with_options(value: Value, options: CodecOptions) -> Self {
        Self {
            frames: Vec::new(),
            root: Some(value),
            field: "reference",
            options,
        }
    }

    /// Checks that the root value has been read completely.
    pub fn finish(self) -> Result<(), DecodeError> {
        if !self.frames.is_empty() {
            return Err(DecodeError::MalformedEncoding {
                context: "unterminated object or sequence",
            });
        }
        if self.root.is_some() {
            return Err(DecodeError::MalformedEncoding {
                context: "root value not read",
            });
        }
        Ok(())
    }

    /// Takes the next value; `None` means the selected field is missing.
    fn next_value(&mut self) -> Result<Option<Value>, DecodeError> {
        match self.frames.last_mut() {
            None => self
                .root
                .take()
                .map(Some)
                .ok_or(DecodeError::UnexpectedEof { context: "root" }),
            Some(ReadFrame::Object { map, key }) => {
                let name = key.take().ok_or(DecodeError::MalformedEncoding {
                    context: "value read without a field name",
                })?;
                Ok(map.remove(name))
            }
            Some(ReadFrame::Seq(items)) => items
                .next()
                .map(Some)
                .ok_or(DecodeError::UnexpectedEof {
                    context: "sequence item",
                }),
        }
    }

    fn require(&mut self) -> Result<Value, DecodeError> {
        let field = self.field;
        self.next_value()?.ok_or(DecodeError::MissingField { field })
    }

    fn unexpected(&self, expected: &'static str) -> DecodeError {
        DecodeError::UnexpectedValue {
            context: self.field,
            expected,
        }
    }

    fn push(&mut self, frame: ReadFrame) -> Result<(), DecodeError> {
        self.frames.push(frame);
        self.options.check_decode_depth(self.frames.len())
    }
}

fn take_id(map: &mut Map<String, Value>) -> Result<ObjectId, DecodeError> {
    match map.remove(ID_KEY) {
        Some(Value::String(token)) => {
            if token.len() > MAX_ID_LEN {
                return Err(DecodeError::LengthExceedsLimit {
                    field: "id",
                    len: token.len(),
                    max: MAX_ID_LEN,
                });
            }
            Ok(ObjectId::from(token))
        }
        Some(_) => Err(DecodeError::UnexpectedValue {
            context: "id",
            expected: "string",
        }),
        None => Err(DecodeError::MissingField { field: "id" }),
    }
}

impl WireReader for JsonReader {
    fn read_reference(&mut self) -> Result<WireReference, DecodeError> {
        match self.next_value()? {
            None | Some(Value::Null) => Ok(WireReference::Absent),
            Some(Value::Object(mut map)) => match map.remove(TYPE_KEY) {
                Some(Value::String(type_tag)) => {
                    if type_tag.len() > MAX_ID_LEN {
                        return Err(DecodeError::LengthExceedsLimit {
                            field: "type_tag",
                            len: type_tag.len(),
                            max: MAX_ID_LEN,
                        });
                    }
                    let id = take_id(&mut map)?;
                    self.push(ReadFrame::Object { map, key: None })?;
                    Ok(WireReference::Object { type_tag, id })
                }
                Some(_) => Err(DecodeError::UnexpectedValue {
                    context: "type",
                    expected: "string",
                }),
                None => {
                    let id = take_id(&mut map)?;
                    if !map.is_empty() {
                        return Err(DecodeError::MalformedEncoding {
                            context: "identity reference with members other than id",
                        });
                    }
                    Ok(WireReference::Identity(id))
                }
            },
            Some(_) => Err(self.unexpected("null or object")),
        }
    }

    fn end_object(&mut self) -> Result<(), DecodeError> {
        match self.frames.pop() {
            Some(ReadFrame::Object { .. }) => Ok(()),
            _ => Err(DecodeError::MalformedEncoding {
                context: "end_object outside an object",
            }),
        }
    }

    fn field(&mut self, name: &'static str) -> Result<(), DecodeError> {
        match self.frames.last_mut() {
            Some(ReadFrame::Object { key, .. }) => {
                *key = Some(name);
                self.field = name;
                Ok(())
            }
            _ => Err(DecodeError::MalformedEncoding {
                context: "field selected outside an object",
            }),
        }
    }

    fn read_str(&mut self) -> Result<String, DecodeError> {
        match self.require()? {
            Value::String(s) => {
                self.options.check_string_len(s.len(), self.field)?;
                Ok(s)
            }
            _ => Err(self.unexpected("string")),
        }
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.require()?
            .as_i64()
            .ok_or_else(|| self.unexpected("integer"))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.require()?
            .as_f64()
            .ok_or_else(|| self.unexpected("number"))
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.require()?
            .as_bool()
            .ok_or_else(|| self.unexpected("boolean"))
    }

    fn begin_seq(&mut self) -> Result<usize, DecodeError> {
        match self.require()? {
            Value::Array(items) => {
                let len = items.len();
                self.options.check_sequence_len(len)?;
                self.push(ReadFrame::Seq(items.into_iter()))?;
                Ok(len)
            }
            _ => Err(self.unexpected("array")),
        }
    }

    fn end_seq(&mut self) -> Result<(), DecodeError> {
        match self.frames.pop() {
            Some(ReadFrame::Seq(rest)) if rest.as_slice().is_empty() => Ok(()),
            Some(ReadFrame::Seq(_)) => Err(DecodeError::MalformedEncoding {
                context: "sequence has unread items",
            }),
            _ => Err(DecodeError::MalformedEncoding {
                context: "end_seq outside a sequence",
            }),
        }
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Encodes a root reference as a JSON value.
pub fn encode_json<T: Referenceable>(
    value: Option<&T>,
    session: &mut SessionContext,
) -> Result<Value, EncodeError> {
    encode_json_with_options(value, session, CodecOptions::default())
}

/// Encodes a root reference as a JSON value with the given limits.
pub fn encode_json_with_options<T: Referenceable>(
    value: Option<&T>,
    session: &mut SessionContext,
    options: CodecOptions,
) -> Result<Value, EncodeError> {
    let mut writer = JsonWriter::with_options(options);
    encode_reference(&mut writer, session, value)?;
    writer.finish()
}

/// Encodes a root reference as a JSON string.
pub fn encode_json_string<T: Referenceable>(
    value: Option<&T>,
    session: &mut SessionContext,
) -> Result<String, EncodeError> {
    let json = encode_json(value, session)?;
    Ok(serde_json::to_string(&json)?)
}

/// Decodes a root reference from a JSON value.
pub fn decode_json<T: Referenceable>(
    value: Value,
    session: &mut SessionContext,
) -> Result<Option<Arc<T>>, DecodeError> {
    decode_json_with_options(value, session, CodecOptions::default())
}

/// Decodes a root reference from a JSON value with the given limits.
pub fn decode_json_with_options<T: Referenceable>(
    value: Value,
    session: &mut SessionContext,
    options: CodecOptions,
) -> Result<Option<Arc<T>>, DecodeError> {
    let mut reader = JsonReader::with_options(value, options);
    let root = decode_reference(&mut reader, session)?;
    reader.finish()?;
    Ok(root)
}

/// Decodes a root reference from a JSON string.
pub fn decode_json_str<T: Referenceable>(
    input: &str,
    session: &mut SessionContext,
) -> Result<Option<Arc<T>>, DecodeError> {
    let value: Value = serde_json::from_str(input)?;
    decode_json(value, session)
}

/// Encodes a root reference as a JSON string using the current session.
pub fn encode_json_current<T: Referenceable>(value: Option<&T>) -> Result<String, EncodeError> {
    current_session()?.with(|session| encode_json_string(value, session))
}

/// Decodes a root reference from a JSON string using the current session.
pub fn decode_json_current<T: Referenceable>(input: &str) -> Result<Option<Arc<T>>, DecodeError> {
    let value: Value = serde_json::from_str(input)?;
    current_session()?.with(|session| decode_json(value, session))
}
