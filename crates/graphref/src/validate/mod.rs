//! Structural audit of JSON wire documents.
//!
//! Decoding needs the application's types; this module checks the reference
//! protocol of a document without them, so a captured message can be
//! inspected on its own. The walk follows wire order, which is the order the
//! encoder wrote and the decoder reads.
//!
//! Checked per identity:
//! - at most one full object (`DuplicateFullObject`);
//! - an identity-only reference must follow the *completed* full object.
//!   Pointing at a full object still open above it is the decode cycle
//!   (`BackReference`); pointing at nothing seen yet is `UnresolvedReference`.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::model::ObjectId;

/// Occurrences of one identity in the audited documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceCounts {
    pub full: usize,
    pub identity_only: usize,
}

/// Result of a successful audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireReport {
    counts: BTreeMap<ObjectId, ReferenceCounts>,
}

impl WireReport {
    /// Returns the occurrences of `id`, if it appears at all.
    pub fn counts(&self, id: &ObjectId) -> Option<ReferenceCounts> {
        self.counts.get(id).copied()
    }

    /// Returns every identity seen, in order.
    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.counts.keys()
    }

    /// Number of full objects.
    pub fn full_objects(&self) -> usize {
        self.counts.values().map(|c| c.full).sum()
    }

    /// Number of identity-only references.
    pub fn identity_references(&self) -> usize {
        self.counts.values().map(|c| c.identity_only).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Complete,
}

#[derive(Debug, Default)]
struct Walker {
    states: FxHashMap<ObjectId, State>,
    report: WireReport,
}

/// Audits one JSON wire document, as sent on a fresh session.
pub fn validate_json_wire(document: &Value) -> Result<WireReport, ValidationError> {
    validate_json_stream([document])
}

/// Audits the documents one session sent, in order.
///
/// An identity-only reference may point at a full object of an earlier
/// document.
pub fn validate_json_stream<'a>(
    documents: impl IntoIterator<Item = &'a Value>,
) -> Result<WireReport, ValidationError> {
    let mut walker = Walker::default();
    for (i, document) in documents.into_iter().enumerate() {
        walker.reference(document, &format!("${i}"))?;
    }
    Ok(walker.report)
}

impl Walker {
    fn reference(&mut self, value: &Value, path: &str) -> Result<(), ValidationError> {
        let map = match value {
            Value::Null => return Ok(()),
            Value::Object(map) => map,
            _ => return Err(malformed(path, "reference must be null or an object")),
        };

        match map.get("type") {
            Some(Value::String(_)) => self.full_object(map, path),
            Some(_) => Err(malformed(path, "type must be a string")),
            None => self.identity(map, path),
        }
    }

    fn full_object(&mut self, map: &Map<String, Value>, path: &str) -> Result<(), ValidationError> {
        let id = id_of(map, path)?;
        if self.states.contains_key(&id) {
            return Err(ValidationError::DuplicateFullObject {
                id,
                path: path.to_string(),
            });
        }
        self.states.insert(id.clone(), State::Open);
        self.report.counts.entry(id.clone()).or_default().full += 1;

        for (name, value) in map {
            if name != "type" && name != "id" {
                self.field(value, &format!("{path}.{name}"))?;
            }
        }

        self.states.insert(id, State::Complete);
        Ok(())
    }

    fn identity(&mut self, map: &Map<String, Value>, path: &str) -> Result<(), ValidationError> {
        let id = id_of(map, path)?;
        if map.len() != 1 {
            return Err(malformed(path, "identity reference with members other than id"));
        }
        match self.states.get(&id) {
            Some(State::Complete) => {
                self.report.counts.entry(id).or_default().identity_only += 1;
                Ok(())
            }
            Some(State::Open) => Err(ValidationError::BackReference {
                id,
                path: path.to_string(),
            }),
            None => Err(ValidationError::UnresolvedReference {
                id,
                path: path.to_string(),
            }),
        }
    }

    /// Fields hold primitives, references or arrays of either.
    fn field(&mut self, value: &Value, path: &str) -> Result<(), ValidationError> {
        match value {
            Value::Object(_) | Value::Null => self.reference(value, path),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.field(item, &format!("{path}[{i}]"))?;
                }
                Ok(())
            }
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        }
    }
}

fn id_of(map: &Map<String, Value>, path: &str) -> Result<ObjectId, ValidationError> {
    match map.get("id") {
        Some(Value::String(token)) => Ok(ObjectId::new(token.as_str())),
        Some(_) => Err(malformed(path, "id must be a string")),
        None => Err(malformed(path, "missing id")),
    }
}

fn malformed(path: &str, reason: &'static str) -> ValidationError {
    ValidationError::MalformedReference {
        path: path.to_string(),
        reason,
    }
}
