//! Primitive encoding/decoding for the binary wire format.
//!
//! Implements varint, signed varint (zigzag), length-prefixed strings,
//! booleans and little-endian floats.

use crate::error::DecodeError;
use crate::limits::MAX_VARINT_BYTES;

// =============================================================================
// DECODING
// =============================================================================

/// Cursor over a binary message.
///
/// Every read is bounds-checked; `context` names what was being read in the
/// resulting error.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the unread bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of unread bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEof { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly `n` bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads an unsigned varint (LEB128).
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        let mut result: u64 = 0;

        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_byte(context)?;
            let value = (byte & 0x7F) as u64;
            let shift = 7 * i as u32;

            // The tenth byte may only carry the top bit of a u64
            if shift == 63 && value > 1 {
                return Err(DecodeError::VarintOverflow);
            }
            result |= value << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }

        Err(DecodeError::VarintTooLong)
    }

    /// Reads a signed varint (zigzag encoded).
    pub fn read_signed_varint(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        self.read_varint(context).map(zigzag_decode)
    }

    /// Reads a varint length and checks it against `max`.
    pub fn read_len(&mut self, max: usize, field: &'static str) -> Result<usize, DecodeError> {
        let len = self.read_varint(field)?;
        let len = usize::try_from(len).map_err(|_| DecodeError::VarintOverflow)?;
        if len > max {
            return Err(DecodeError::LengthExceedsLimit { field, len, max });
        }
        Ok(len)
    }

    /// Reads a length-prefixed UTF-8 string of at most `max_len` bytes.
    pub fn read_string(&mut self, max_len: usize, field: &'static str) -> Result<String, DecodeError> {
        let len = self.read_len(max_len, field)?;
        let bytes = self.read_bytes(len, field)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Reads a boolean byte (0x00 or 0x01).
    pub fn read_bool(&mut self, context: &'static str) -> Result<bool, DecodeError> {
        match self.read_byte(context)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidBool { value }),
        }
    }

    /// Reads a little-endian f64, rejecting NaN.
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.read_bytes(8, context)?);
        let value = f64::from_le_bytes(raw);
        if value.is_nan() {
            return Err(DecodeError::FloatIsNan);
        }
        Ok(value)
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Growable output buffer for a binary message.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates an empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes an unsigned varint (LEB128).
    pub fn write_varint(&mut self, mut value: u64) {
        let mut scratch = [0u8; MAX_VARINT_BYTES];
        let mut len = 0;
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                scratch[len] = byte;
                len += 1;
                break;
            }
            scratch[len] = byte | 0x80;
            len += 1;
        }
        self.buf.extend_from_slice(&scratch[..len]);
    }

    /// Writes a signed varint (zigzag encoded).
    pub fn write_signed_varint(&mut self, value: i64) {
        self.write_varint(zigzag_encode(value));
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_varint(s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Writes a boolean byte.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Writes a little-endian f64.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }
}

// =============================================================================
// ZIGZAG ENCODING
// =============================================================================

/// Maps signed integers to unsigned ones so small magnitudes stay short:
/// 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...
#[inline]
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}
