//! Schema validation.
//!
//! Runs once per model registration, before the model becomes usable:
//! - rejects field names using the reserved `__` prefix,
//! - resolves forward references against the registry's symbol table,
//! - validates every leaf of every declared field type against the
//!   supported set, failing the whole registration on the first
//!   unsupported leaf.

use smol_str::SmolStr;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::ModelSchema;
use crate::types::FieldType;

/// Prefix reserved for internal state; never valid in a declared field name.
pub const RESERVED_PREFIX: &str = "__";

/// Resolve forward references in `schema` against the known model names.
///
/// An [`FieldType::Unresolved`] leaf naming the model itself or any name in
/// `known` is upgraded to [`FieldType::Model`]. Resolution is a whole-word
/// symbol-table lookup, so partial-identifier collisions cannot occur.
/// Unknown names are left pending rather than failing: they are assumed to
/// resolve when the named model registers later.
pub fn resolve_forward_refs(schema: &mut ModelSchema, known: &[SmolStr]) {
    let self_name = schema.name.clone();
    for field in &mut schema.fields {
        field.ty = field.ty.rebuild(&|leaf| match leaf {
            FieldType::Unresolved(name)
                if *name == self_name || known.iter().any(|k| k == name) =>
            {
                FieldType::Model(name.clone())
            }
            other => other.clone(),
        });
    }
}

/// Validate every declared field of `schema`.
///
/// The first unsupported leaf anywhere in a field's type fails the whole
/// declaration with an error naming the offending field and type.
pub fn validate(schema: &ModelSchema) -> SchemaResult<()> {
    for field in &schema.fields {
        if field.name.starts_with(RESERVED_PREFIX) {
            return Err(SchemaError::ReservedFieldName {
                model: schema.name.to_string(),
                field: field.name.to_string(),
            });
        }
        for leaf in field.ty.leaves() {
            if !leaf_supported(leaf) {
                return Err(SchemaError::unsupported(
                    schema.name.as_str(),
                    field.name.as_str(),
                    leaf.type_name(),
                ));
            }
        }
    }
    Ok(())
}

/// Check a single leaf against the supported set.
///
/// Model leaves are accepted via their registration marker, unresolved
/// leaves are accepted as pending forward references, and literal sets are
/// supported by construction (only primitive literal values are
/// representable).
fn leaf_supported(leaf: &FieldType) -> bool {
    match leaf {
        FieldType::Bool
        | FieldType::Int
        | FieldType::Float
        | FieldType::String
        | FieldType::Date
        | FieldType::Null
        | FieldType::Literal(_)
        | FieldType::Model(_)
        | FieldType::Unresolved(_)
        | FieldType::Reference => true,
        FieldType::Unsupported(_) => false,
        // Containers never reach here; `leaves` decomposes them.
        FieldType::List(_)
        | FieldType::Map(_)
        | FieldType::Tuple(_)
        | FieldType::Optional(_)
        | FieldType::Union(_) => true,
    }
}
