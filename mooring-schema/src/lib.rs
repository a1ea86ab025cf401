//! # mooring-schema
//!
//! Schema model for the Mooring ODM: the field-type AST with its
//! introspection operations, declaration-time validation, the
//! collection-type registry, and shadow-schema derivation.
//!
//! This crate is pure: it knows nothing about the document store. The
//! driver crate consumes it to validate declared models, derive their
//! storage shape, and dereference generic reference records by collection
//! name.
//!
//! ## Example
//!
//! ```rust
//! use mooring_schema::{FieldType, ModelRegistry, ModelSchema};
//!
//! let mut registry = ModelRegistry::new();
//! registry
//!     .register(
//!         ModelSchema::new("User")
//!             .field("id", FieldType::optional(FieldType::String))
//!             .field("name", FieldType::String),
//!     )
//!     .unwrap();
//!
//! let entry = registry.by_collection("users").unwrap();
//! assert_eq!(entry.schema.name, "User");
//! ```

pub mod error;
pub mod json_schema;
pub mod registry;
pub mod schema;
pub mod shadow;
pub mod types;
pub mod validator;

pub use error::{SchemaError, SchemaResult, SUPPORTED_TYPES};
pub use registry::{ModelRegistry, RegisteredModel};
pub use schema::{FieldDef, ModelSchema, derive_collection_name};
pub use shadow::{ConverterShape, ID_FIELD, ID_NAME, RefConverter, ShadowSchema, derive_shadow};
pub use types::{FieldType, LiteralValue};
pub use validator::{RESERVED_PREFIX, resolve_forward_refs, validate};
