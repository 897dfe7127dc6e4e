//! Data model for reference-aware serialization.
//!
//! This module contains the types an application implements or supplies:
//! - Identities ([`ObjectId`])
//! - The referenceable capability ([`Referenceable`])
//! - Variant registries mapping wire type tags to decoders ([`VariantRegistry`])

pub mod id;
pub mod reference;
pub mod registry;

pub use id::ObjectId;
pub use reference::Referenceable;
pub use registry::{DecodeFn, VariantRegistry};
