//! # Error Types
//!
//! A single error enum for the core. The app layer wraps it and maps
//! variants to HTTP status codes.

use std::fmt;

use thiserror::Error;

/// Errors produced by the content engine.
#[derive(Debug, Error)]
pub enum EdifError {
    /// Document does not exist.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Document id already taken.
    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    /// Collection name outside the catalogue.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// Malformed query (bad operator, empty field path).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Role name outside admin/editor/viewer.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// Form-boundary validation failed.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// JSON or postcard encoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EdifError>;

impl EdifError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// True for the "missing document" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for EdifError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<postcard::Error> for EdifError {
    fn from(e: postcard::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for EdifError {
                fn from(e: $ty) -> Self {
                    Self::Storage(e.to_string())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// =============================================================================
// VALIDATION ERRORS
// =============================================================================

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All failing fields of one submission, in the order they were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Message for a given field, if it failed.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// `Ok(())` when nothing failed, otherwise `EdifError::Validation`.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(EdifError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_display_lists_every_field() {
        let mut errors = ValidationErrors::new();
        errors.push("name", "Name is required");
        errors.push("images", "At least one image is required");

        let msg = EdifError::Validation(errors).to_string();
        assert!(msg.contains("name: Name is required"));
        assert!(msg.contains("images: At least one image is required"));
    }

    #[test]
    fn empty_validation_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn not_found_helper() {
        let err = EdifError::not_found("products", "abc");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "document not found: products/abc");
    }
}
