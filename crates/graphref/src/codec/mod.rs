//! Reference-aware encoding and decoding.
//!
//! [`reference`] holds the codec proper; it talks to a wire format only
//! through the [`WireWriter`]/[`WireReader`] contract in [`wire`]. Two
//! backends are provided: JSON ([`json`]) and a compact binary format with
//! optional zstd compression ([`binary`]).

pub mod binary;
pub mod json;
pub mod primitives;
pub mod reference;
pub mod wire;

pub use binary::{
    decode_binary, decode_binary_with_options, decompress, encode_binary,
    encode_binary_compressed, encode_binary_with_options, BinaryReader, BinaryWriter,
};
pub use json::{
    decode_json, decode_json_current, decode_json_str, decode_json_with_options, encode_json,
    encode_json_current, encode_json_string, encode_json_with_options, JsonReader, JsonWriter,
};
pub use primitives::{zigzag_decode, zigzag_encode, Reader, Writer};
pub use reference::{
    decode_field, decode_reference, decode_reference_seq, encode_field, encode_reference,
    encode_reference_seq,
};
pub use wire::{CodecOptions, WireReader, WireReference, WireWriter};
