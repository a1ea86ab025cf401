//! JSON Schema generation for declared and shadow schemas.

use serde_json::{Map, Value, json};

use crate::schema::ModelSchema;
use crate::shadow::ShadowSchema;
use crate::types::{FieldType, LiteralValue};

impl ModelSchema {
    /// Get a JSON Schema description of the declared model shape.
    pub fn json_schema(&self) -> Value {
        object_schema(self.name.as_str(), self.fields.iter().map(|f| (f.name.as_str(), &f.ty)))
    }
}

impl ShadowSchema {
    /// Get a JSON Schema description of the storage shape, with embedded
    /// models replaced by reference records.
    pub fn json_schema(&self) -> Value {
        object_schema(self.model.as_str(), self.fields.iter().map(|f| (f.name.as_str(), &f.ty)))
    }
}

fn object_schema<'a>(
    title: &str,
    fields: impl Iterator<Item = (&'a str, &'a FieldType)>,
) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for (name, ty) in fields {
        properties.insert(name.to_string(), type_schema(ty));
        if !matches!(ty, FieldType::Optional(_)) {
            required.push(Value::String(name.to_string()));
        }
    }

    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": title,
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    })
}

/// Translate a single field type to a JSON Schema fragment.
pub fn type_schema(ty: &FieldType) -> Value {
    match ty {
        FieldType::Bool => json!({ "type": "boolean" }),
        FieldType::Int => json!({ "type": "integer" }),
        FieldType::Float => json!({ "type": "number" }),
        FieldType::String => json!({ "type": "string" }),
        FieldType::Date => json!({ "type": "string", "format": "date-time" }),
        FieldType::Null => json!({ "type": "null" }),
        FieldType::List(inner) => json!({ "type": "array", "items": type_schema(inner) }),
        FieldType::Map(inner) => {
            json!({ "type": "object", "additionalProperties": type_schema(inner) })
        }
        FieldType::Tuple(items) => json!({
            "type": "array",
            "prefixItems": items.iter().map(type_schema).collect::<Vec<_>>(),
            "minItems": items.len(),
            "maxItems": items.len(),
        }),
        FieldType::Optional(inner) => {
            json!({ "anyOf": [type_schema(inner), { "type": "null" }] })
        }
        FieldType::Union(items) => {
            json!({ "anyOf": items.iter().map(type_schema).collect::<Vec<_>>() })
        }
        FieldType::Literal(values) => json!({
            "enum": values
                .iter()
                .map(|v| match v {
                    LiteralValue::Bool(b) => json!(b),
                    LiteralValue::Int(i) => json!(i),
                    LiteralValue::Str(s) => json!(s.as_str()),
                })
                .collect::<Vec<_>>(),
        }),
        FieldType::Model(name) | FieldType::Unresolved(name) => {
            json!({ "$ref": format!("#/$defs/{}", name) })
        }
        FieldType::Reference => json!({
            "type": "object",
            "properties": {
                "collection": { "type": "string" },
                "id": {},
                "database": { "type": "string", "default": "" },
            },
            "required": ["collection", "id", "database"],
        }),
        FieldType::Unsupported(name) => json!({ "description": format!("unsupported: {}", name) }),
    }
}
