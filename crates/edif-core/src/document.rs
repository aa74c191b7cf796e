//! # Documents
//!
//! A document is an id, a schema-less JSON object of fields, and typed audit
//! metadata. The JSON view is flat: `{ id, ...fields, createdAt, updatedAt,
//! createdBy, updatedBy }` with RFC 3339 timestamps, which is what typed
//! records and API clients consume.

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EdifError, Result};
use crate::timestamp::Timestamp;

/// Schema-less document body.
pub type Fields = serde_json::Map<String, Value>;

/// Keys owned by the store. Never taken from user input.
pub const RESERVED_KEYS: [&str; 5] = ["id", "createdAt", "updatedAt", "createdBy", "updatedBy"];

/// Who touched a document and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub created_by: String,
    pub updated_by: String,
}

impl Audit {
    pub fn new(actor: &str, now: Timestamp) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            created_by: actor.to_string(),
            updated_by: actor.to_string(),
        }
    }

    pub fn touch(&mut self, actor: &str, now: Timestamp) {
        self.updated_at = now;
        self.updated_by = actor.to_string();
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
    pub audit: Audit,
}

impl Document {
    /// Build a fresh document; reserved keys in `fields` are dropped.
    pub fn new(id: impl Into<String>, fields: Fields, actor: &str, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            fields: strip_reserved(fields),
            audit: Audit::new(actor, now),
        }
    }

    /// Resolve a field path.
    ///
    /// `id` and the audit keys are addressable like ordinary fields (audit
    /// timestamps resolve to epoch milliseconds so they sort numerically).
    /// Dotted paths walk nested objects.
    pub fn field(&self, path: &str) -> Option<Cow<'_, Value>> {
        match path {
            "id" => return Some(Cow::Owned(Value::String(self.id.clone()))),
            "createdAt" => return Some(Cow::Owned(Value::from(self.audit.created_at.to_millis()))),
            "updatedAt" => return Some(Cow::Owned(Value::from(self.audit.updated_at.to_millis()))),
            "createdBy" => return Some(Cow::Owned(Value::String(self.audit.created_by.clone()))),
            "updatedBy" => return Some(Cow::Owned(Value::String(self.audit.updated_by.clone()))),
            _ => {}
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(Cow::Borrowed(current))
    }

    /// Field-level overwrite of top-level keys.
    pub fn merge(&mut self, patch: Fields, actor: &str, now: Timestamp) {
        for (key, value) in strip_reserved(patch) {
            self.fields.insert(key, value);
        }
        self.audit.touch(actor, now);
    }

    /// Flat JSON view with normalised timestamps.
    pub fn to_json(&self) -> Value {
        let mut out = Fields::new();
        out.insert("id".to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        out.insert(
            "createdAt".to_string(),
            Value::String(self.audit.created_at.to_rfc3339()),
        );
        out.insert(
            "updatedAt".to_string(),
            Value::String(self.audit.updated_at.to_rfc3339()),
        );
        out.insert(
            "createdBy".to_string(),
            Value::String(self.audit.created_by.clone()),
        );
        out.insert(
            "updatedBy".to_string(),
            Value::String(self.audit.updated_by.clone()),
        );
        Value::Object(out)
    }

    /// Decode into a typed record through the flat JSON view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json()).map_err(|e| {
            EdifError::Serialization(format!("document {} cannot be decoded: {}", self.id, e))
        })
    }

    /// Boolean field, `None` when missing or not a bool.
    pub fn bool_field(&self, path: &str) -> Option<bool> {
        self.field(path).and_then(|v| v.as_bool())
    }

    /// Integer field, `None` when missing or not an integer.
    pub fn i64_field(&self, path: &str) -> Option<i64> {
        self.field(path).and_then(|v| v.as_i64())
    }

    /// String field, `None` when missing or not a string.
    pub fn str_field(&self, path: &str) -> Option<&str> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        current.as_str()
    }
}

/// Remove store-owned keys from user-supplied fields.
pub fn strip_reserved(mut fields: Fields) -> Fields {
    for key in RESERVED_KEYS {
        fields.remove(key);
    }
    fields
}

/// Serialise a typed value into document fields.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(strip_reserved(map)),
        other => Err(EdifError::Serialization(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// TESTS
// =============================================================================
