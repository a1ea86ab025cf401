//! Declared-model schemas and collection-name derivation.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::types::FieldType;

/// A single named, typed field of a declared model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: SmolStr,
    /// Declared field type.
    pub ty: FieldType,
}

impl FieldDef {
    /// Create a new field definition.
    pub fn new(name: impl Into<SmolStr>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The schema of a declared model: a named, ordered set of typed fields.
///
/// One field, conventionally named `id`, is the nullable string identifier
/// aliased to the storage primary key `_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    /// Model name (the declared type name).
    pub name: SmolStr,
    /// Explicit collection-name override, if any.
    pub collection: Option<SmolStr>,
    /// Declared fields, in declaration order.
    pub fields: Vec<FieldDef>,
}

impl ModelSchema {
    /// Create an empty schema for the named model.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            collection: None,
            fields: Vec::new(),
        }
    }

    /// Set an explicit collection name, used verbatim.
    pub fn with_collection(mut self, collection: impl Into<SmolStr>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Append a field.
    pub fn field(mut self, name: impl Into<SmolStr>, ty: FieldType) -> Self {
        self.fields.push(FieldDef::new(name, ty));
        self
    }

    /// Get a declared field's type by name.
    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|f| f.name.as_str() == name)
            .map(|f| &f.ty)
    }

    /// The collection this model maps to: the explicit override if declared,
    /// else derived from the model name (see [`derive_collection_name`]).
    pub fn collection_name(&self) -> SmolStr {
        match &self.collection {
            Some(name) => name.clone(),
            None => derive_collection_name(&self.name).into(),
        }
    }
}

/// Derive a collection name from a model name.
///
/// An underscore is inserted between a lowercase letter or digit and a
/// following uppercase letter, the result is lowercased, and a trailing `s`
/// is appended unless already present: `TestModel` becomes `test_models`.
pub fn derive_collection_name(model: &str) -> String {
    let mut out = String::with_capacity(model.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in model.chars() {
        if ch.is_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_lower_or_digit = false;
        } else {
            prev_lower_or_digit = ch.is_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }
    if !out.ends_with('s') {
        out.push('s');
    }
    out
}
