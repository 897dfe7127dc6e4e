//! graphref: reference-aware encoding of shared and cyclic object graphs.
//!
//! This crate serializes graphs of identifiable objects over tree-shaped wire
//! formats. Within one session an object's full structure crosses the wire
//! exactly once; every further occurrence is sent as its bare identity, and
//! the receiver resolves it back to the instance it already materialized.
//!
//! # Overview
//!
//! - **Identities**: every referenceable object owns an [`ObjectId`]
//! - **Sessions**: a [`SessionContext`] remembers what was sent and received,
//!   one per peer
//! - **Backends**: JSON and a compact binary format implement one small
//!   tagged-union contract ([`codec::WireWriter`], [`codec::WireReader`])
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use lazy_static::lazy_static;
//! use graphref::codec::{decode_json, encode_json, WireReader, WireWriter};
//! use graphref::{DecodeError, EncodeError, ObjectId, Referenceable, SessionContext, VariantRegistry};
//!
//! struct Part {
//!     id: ObjectId,
//!     name: String,
//! }
//!
//! impl Referenceable for Part {
//!     fn object_id(&self) -> &ObjectId {
//!         &self.id
//!     }
//!
//!     fn type_tag(&self) -> &'static str {
//!         "part"
//!     }
//!
//!     fn encode_fields(
//!         &self,
//!         writer: &mut dyn WireWriter,
//!         _session: &mut SessionContext,
//!     ) -> Result<(), EncodeError> {
//!         writer.field("name")?;
//!         writer.write_str(&self.name)
//!     }
//!
//!     fn registry() -> &'static VariantRegistry<Self> {
//!         &PARTS
//!     }
//! }
//!
//! fn decode_part(
//!     id: ObjectId,
//!     reader: &mut dyn WireReader,
//!     _session: &mut SessionContext,
//! ) -> Result<Part, DecodeError> {
//!     reader.field("name")?;
//!     Ok(Part { id, name: reader.read_str()? })
//! }
//!
//! lazy_static! {
//!     static ref PARTS: VariantRegistry<Part> = {
//!         let mut registry = VariantRegistry::new("Part");
//!         registry.register("part", decode_part);
//!         registry
//!     };
//! }
//!
//! let bolt = Part { id: ObjectId::new("bolt-m4"), name: "M4 bolt".to_string() };
//! let (mut sender, mut receiver) = (SessionContext::new(), SessionContext::new());
//!
//! // The first transmission carries the object, the second only its identity
//! let first = encode_json(Some(&bolt), &mut sender).unwrap();
//! let second = encode_json(Some(&bolt), &mut sender).unwrap();
//! assert_eq!(second, serde_json::json!({"id": "bolt-m4"}));
//!
//! let a = decode_json::<Part>(first, &mut receiver).unwrap().unwrap();
//! let b = decode_json::<Part>(second, &mut receiver).unwrap().unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```
//!
//! # Modules
//!
//! - [`model`]: identities, the [`Referenceable`] capability, variant registries
//! - [`session`]: session contexts and how code finds the current one
//! - [`codec`]: the reference codec and its JSON and binary backends
//! - [`validate`]: protocol audit of JSON wire documents
//! - [`error`]: error types
//! - [`limits`]: decoding limits
//!
//! # Cycles
//!
//! Encoding registers an object before its children, so cyclic graphs encode
//! fine. Decoding registers an object only once its fields are complete, so a
//! descendant referring back to an ancestor still being decoded fails with
//! [`DecodeError::DeserializationCycle`] naming that ancestor.
//!
//! # Wire Format
//!
//! Binary messages use the `GREF` magic + version + root reference, or
//! `GREFZ` + uncompressed size + zstd data. The decoder detects both.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod session;
pub mod validate;

#[cfg(test)]
mod fixtures;

// Re-export commonly used types at crate root
pub use codec::{
    decode_binary, decode_json, decode_json_str, decode_reference, encode_binary,
    encode_binary_compressed, encode_json, encode_json_string, encode_reference, CodecOptions,
};
pub use error::{DecodeError, EncodeError, ErrorCode, SessionUnavailableError, ValidationError};
pub use model::{DecodeFn, ObjectId, Referenceable, VariantRegistry};
pub use session::{
    current_session, install_single_session, scope_task, scope_thread, SessionContext,
    SessionHandle,
};
pub use validate::{validate_json_stream, validate_json_wire, WireReport};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version byte written in binary messages.
pub const FORMAT_VERSION: u8 = limits::FORMAT_VERSION;
