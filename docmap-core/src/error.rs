//! Error types and result types for filter compilation, record conversion and store operations.
//!
//! Compilation and conversion failures are fatal to the call that produced them and are never
//! retried here. [`StoreError`] is the umbrella type returned by store clients and the CRUD
//! handler; it converts from the narrower error types with `?`.

use std::fmt;

use bson::error::Error as BsonError;
use thiserror::Error;

/// Errors raised while turning a condition tree into a native query document.
///
/// All variants point at a defect in the caller or in the filter grammar, not at the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The condition kind is not one of operand, logic, not or grouping.
    #[error("Unsupported condition: {0}")]
    UnsupportedCondition(String),
    /// The comparison operator token is not part of the operator set.
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// The logical operator token is neither `and` nor `or`.
    #[error("Unsupported logical operator: {0}")]
    UnsupportedLogical(String),
}

/// Errors raised while converting between records and documents.
///
/// These indicate a gap between the record schema and the registered type rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// No rule matches the type and it has no structural representation.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// A timestamp could not be represented in the target resolution or range.
    #[error("Bad timestamp: {0}")]
    BadTimestamp(String),
    /// A document value does not fit the declared field type.
    /// The first argument is the field name, the second describes the mismatch.
    #[error("Field mismatch for {0}: {1}")]
    FieldMismatch(String, String),
}

impl ConversionError {
    /// Builds a [`ConversionError::FieldMismatch`] not yet attributed to a field.
    pub fn mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        ConversionError::FieldMismatch(String::new(), format!("expected {expected}, found {found}"))
    }

    /// Attributes a mismatch to `field`, prefixing any nested field path.
    pub fn in_field(self, field: &str) -> Self {
        match self {
            ConversionError::FieldMismatch(inner, detail) if inner.is_empty() => {
                ConversionError::FieldMismatch(field.to_string(), detail)
            }
            ConversionError::FieldMismatch(inner, detail) => {
                ConversionError::FieldMismatch(format!("{field}.{inner}"), detail)
            }
            other => other,
        }
    }
}

/// Syntax error in a filter string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Filter parse error: {0}")]
pub struct FilterParseError(pub String);

/// Represents all errors that can surface from a store client or the CRUD handler.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The filter string could not be parsed.
    #[error(transparent)]
    Parse(#[from] FilterParseError),
    /// The condition tree could not be compiled.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// A record or document could not be converted.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// Serialization error raised by the BSON layer.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during client construction or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given identity already exists.
    /// The first argument is the identity, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    AlreadyExists(String, String),
    /// No document matched the given identity.
    /// The first argument is the identity, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    NotFound(String, String),
    /// The document has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying store.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result of compiling a condition.
pub type CompileResult<T> = Result<T, CompileError>;

/// Result of a record/document conversion.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Result of a store or handler operation.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
