//! Shadow-schema derivation.
//!
//! Every declared model has a storage-shape twin: structurally identical,
//! except each model leaf becomes a [`FieldType::Reference`] record and the
//! identifier field is renamed to the storage alias `_id`. Fields that
//! carry a model anywhere in their type additionally get a write-time
//! converter shape describing how embedded instances collapse into
//! reference records at serialization time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::schema::{FieldDef, ModelSchema};
use crate::types::FieldType;

/// The storage primary-key alias.
pub const ID_FIELD: &str = "_id";

/// The user-facing identifier field name.
pub const ID_NAME: &str = "id";

/// How a write-time converter applies to a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConverterShape {
    /// The value itself is (or may be) an embedded model.
    Scalar,
    /// A list whose items are embedded models.
    List,
    /// A string-keyed map whose values are embedded models.
    Map,
}

/// A write-time converter for one field: where embedded instances sit and
/// which declared model they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefConverter {
    /// Application shape.
    pub shape: ConverterShape,
    /// Name of the referenced declared model.
    pub target: SmolStr,
}

/// The storage-shape twin of a [`ModelSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowSchema {
    /// Name of the model this shadow belongs to.
    pub model: SmolStr,
    /// Fields with model leaves replaced by reference records and the
    /// identifier renamed to `_id`.
    pub fields: Vec<FieldDef>,
    /// Per-field write-time converters, keyed by field name. Fields with no
    /// model leaf have no entry.
    pub converters: BTreeMap<SmolStr, RefConverter>,
}

impl ShadowSchema {
    /// Get the shadow type of a field by its declared name.
    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        let name = if name == ID_NAME { ID_FIELD } else { name };
        self.fields
            .iter()
            .find(|f| f.name.as_str() == name)
            .map(|f| &f.ty)
    }

    /// Get the write-time converter for a field, if any.
    pub fn converter(&self, name: &str) -> Option<&RefConverter> {
        self.converters.get(name)
    }
}

/// Derive the shadow schema of a declared model. Idempotent: deriving from
/// a schema twice yields the same shadow.
pub fn derive_shadow(schema: &ModelSchema) -> ShadowSchema {
    let mut fields = Vec::with_capacity(schema.fields.len());
    let mut converters = BTreeMap::new();

    for field in &schema.fields {
        let name: SmolStr = if field.name.as_str() == ID_NAME {
            ID_FIELD.into()
        } else {
            field.name.clone()
        };
        let ty = field.ty.rebuild(&|leaf| match leaf {
            FieldType::Model(_) | FieldType::Unresolved(_) => FieldType::Reference,
            other => other.clone(),
        });
        fields.push(FieldDef::new(name, ty));

        if let Some(converter) = converter_for(&field.ty) {
            converters.insert(field.name.clone(), converter);
        }
    }

    ShadowSchema {
        model: schema.name.clone(),
        fields,
        converters,
    }
}

/// Derive the converter for one declared field type, if it carries a model.
///
/// Optional and union wrapping is looked through; the outermost container
/// that holds the model leaf decides the shape. The target is the first
/// model leaf in declaration order (a single field type can only embed one
/// declared model in practice, since a field has one declared type).
fn converter_for(ty: &FieldType) -> Option<RefConverter> {
    if !ty.contains(&FieldType::is_model) {
        return None;
    }
    let target = ty
        .leaves()
        .into_iter()
        .find_map(|leaf| match leaf {
            FieldType::Model(name) | FieldType::Unresolved(name) => Some(name.clone()),
            _ => None,
        })?;
    Some(RefConverter {
        shape: shape_of(ty),
        target,
    })
}

fn shape_of(ty: &FieldType) -> ConverterShape {
    match ty {
        FieldType::Optional(inner) => shape_of(inner),
        FieldType::Union(items) => items
            .iter()
            .find(|t| t.contains(&FieldType::is_model))
            .map(shape_of)
            .unwrap_or(ConverterShape::Scalar),
        FieldType::List(inner) if inner.contains(&FieldType::is_model) => ConverterShape::List,
        FieldType::Map(inner) if inner.contains(&FieldType::is_model) => ConverterShape::Map,
        _ => ConverterShape::Scalar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user_ref() -> FieldType {
        FieldType::model("User")
    }

    #[test]
    fn test_shadow_replaces_model_leaves() {
        let schema = ModelSchema::new("Doc")
            .field("id", FieldType::optional(FieldType::String))
            .field("name", FieldType::String)
            .field("user", user_ref());
        let shadow = derive_shadow(&schema);

        assert_eq!(shadow.field_type("name"), Some(&FieldType::String));
        assert_eq!(shadow.field_type("user"), Some(&FieldType::Reference));
    }

    #[test]
    fn test_shadow_id_field_uses_storage_alias() {
        let schema = ModelSchema::new("Doc").field("id", FieldType::optional(FieldType::String));
        let shadow = derive_shadow(&schema);
        assert_eq!(shadow.fields[0].name, "_id");
        // Lookup by the user-facing name still works.
        assert!(shadow.field_type("id").is_some());
    }

    #[test]
    fn test_shadow_preserves_container_structure() {
        let schema = ModelSchema::new("Doc")
            .field("users", FieldType::list(user_ref()))
            .field("by_role", FieldType::map(user_ref()))
            .field("maybe", FieldType::optional(user_ref()));
        let shadow = derive_shadow(&schema);

        assert_eq!(
            shadow.field_type("users"),
            Some(&FieldType::list(FieldType::Reference))
        );
        assert_eq!(
            shadow.field_type("by_role"),
            Some(&FieldType::map(FieldType::Reference))
        );
        assert_eq!(
            shadow.field_type("maybe"),
            Some(&FieldType::optional(FieldType::Reference))
        );
    }

    #[test]
    fn test_converter_shapes() {
        let schema = ModelSchema::new("Doc")
            .field("plain", FieldType::String)
            .field("user", user_ref())
            .field("maybe_user", FieldType::optional(user_ref()))
            .field("users", FieldType::list(user_ref()))
            .field("by_role", FieldType::map(user_ref()));
        let shadow = derive_shadow(&schema);

        assert!(shadow.converter("plain").is_none());
        assert_eq!(shadow.converter("user").unwrap().shape, ConverterShape::Scalar);
        assert_eq!(
            shadow.converter("maybe_user").unwrap().shape,
            ConverterShape::Scalar
        );
        assert_eq!(shadow.converter("users").unwrap().shape, ConverterShape::List);
        assert_eq!(shadow.converter("by_role").unwrap().shape, ConverterShape::Map);
        assert_eq!(shadow.converter("user").unwrap().target, "User");
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let schema = ModelSchema::new("Doc").field("user", user_ref());
        assert_eq!(derive_shadow(&schema), derive_shadow(&schema));
    }
}
