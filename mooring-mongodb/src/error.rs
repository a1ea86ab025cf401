//! Error types for persistence operations.

use mooring_schema::SchemaError;
use thiserror::Error;

/// Result type for persistence operations.
pub type OdmResult<T> = Result<T, OdmError>;

/// Errors that can occur while mapping models to the document store.
#[derive(Error, Debug)]
pub enum OdmError {
    /// MongoDB driver error.
    #[error("mongodb error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// BSON serialization error.
    #[error("bson error: {0}")]
    Bson(#[from] bson::ser::Error),

    /// BSON deserialization error; surfaces schema-framework validation
    /// failures unchanged.
    #[error("bson deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),

    /// Schema declaration or registration error.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A supplied id string is not a valid store identifier.
    #[error("invalid document id: {0}")]
    InvalidId(String),

    /// A reference points at a model that was never saved.
    #[error("unsaved reference: {0}")]
    UnsavedReference(String),

    /// A structural walk was handed a non-traversable root.
    #[error("walk error: {0}")]
    Walk(String),

    /// Document serialization error outside BSON's own taxonomy.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl OdmError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid-id error.
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId(message.into())
    }

    /// Create an unsaved-reference error.
    pub fn unsaved_reference(message: impl Into<String>) -> Self {
        Self::UnsavedReference(message.into())
    }

    /// Create a walk error.
    pub fn walk(message: impl Into<String>) -> Self {
        Self::Walk(message.into())
    }

    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is an invalid-id error.
    pub fn is_invalid_id(&self) -> bool {
        matches!(self, Self::InvalidId(_))
    }

    /// Check if this is an unsaved-reference error.
    pub fn is_unsaved_reference(&self) -> bool {
        matches!(self, Self::UnsavedReference(_))
    }
}

impl From<bson::oid::Error> for OdmError {
    fn from(err: bson::oid::Error) -> Self {
        OdmError::InvalidId(err.to_string())
    }
}
