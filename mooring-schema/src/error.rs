//! Error types for schema validation and registration.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// The set of supported field-type leaves, for error messages.
pub const SUPPORTED_TYPES: &str = "bool, int, float, string, date, null, \
    list/map/tuple compositions, optional and union compositions, \
    literals of primitive values, and references to declared models";

/// Errors that can occur during schema validation and registration.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// A declared field uses a type outside the supported set.
    #[error(
        "type `{ty}` of field `{field}` on model `{model}` is not supported; supported types: {SUPPORTED_TYPES}"
    )]
    #[diagnostic(code(mooring::schema::unsupported_field_type))]
    UnsupportedFieldType {
        /// Model that declared the field.
        model: String,
        /// Offending field name.
        field: String,
        /// Human-readable name of the offending type.
        ty: String,
    },

    /// A declared field name collides with the reserved internal prefix.
    #[error("field `{field}` on model `{model}` uses the reserved `__` prefix")]
    #[diagnostic(code(mooring::schema::reserved_field_name))]
    ReservedFieldName {
        /// Model that declared the field.
        model: String,
        /// Offending field name.
        field: String,
    },

    /// Two different models derive the same collection name.
    #[error("collection `{collection}` is already mapped to model `{existing}` (while registering `{model}`)")]
    #[diagnostic(code(mooring::schema::duplicate_model))]
    DuplicateModel {
        /// Model being registered.
        model: String,
        /// Model already holding the collection.
        existing: String,
        /// Contested collection name.
        collection: String,
    },

    /// A declared index specification carries no name.
    #[error("model `{model}` declares an index without a name; every declared index must be named")]
    #[diagnostic(code(mooring::schema::unnamed_index))]
    UnnamedIndex {
        /// Model that declared the index.
        model: String,
    },

    /// A name the registry knows nothing about.
    #[error("no registered model for `{name}`")]
    #[diagnostic(code(mooring::schema::unknown_collection))]
    UnknownCollection {
        /// The collection or model name that was looked up.
        name: String,
    },
}

impl SchemaError {
    /// Create an unsupported-field-type error.
    pub fn unsupported(
        model: impl Into<String>,
        field: impl Into<String>,
        ty: impl Into<String>,
    ) -> Self {
        Self::UnsupportedFieldType {
            model: model.into(),
            field: field.into(),
            ty: ty.into(),
        }
    }

    /// Create an unknown-collection error.
    pub fn unknown_collection(name: impl Into<String>) -> Self {
        Self::UnknownCollection { name: name.into() }
    }

    /// Check if this is an unsupported-field-type error.
    pub fn is_unsupported_type(&self) -> bool {
        matches!(self, Self::UnsupportedFieldType { .. })
    }
}
