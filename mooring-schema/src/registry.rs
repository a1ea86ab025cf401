//! The collection-type registry.
//!
//! A process typically owns one [`ModelRegistry`] (the runtime context in
//! the driver crate wraps it in a process-wide lock). Registration is the
//! declaration-time hook: it appends the model name to the grow-only name
//! list, resolves forward references, validates the schema, derives the
//! shadow schema, and maps the derived collection name to the model so
//! generic reference records can be dereferenced by collection name alone.

use std::collections::BTreeMap;

use smol_str::SmolStr;
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::ModelSchema;
use crate::shadow::{ShadowSchema, derive_shadow};
use crate::types::FieldType;
use crate::validator::{resolve_forward_refs, validate};

/// A registered model: its declared schema and derived shadow schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredModel {
    /// The declared schema, with forward references resolved where possible.
    pub schema: ModelSchema,
    /// The derived storage-shape twin.
    pub shadow: ShadowSchema,
}

/// Registry mapping collection names to declared model types.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    /// Every model name ever registered, in registration order. Grows for
    /// the registry's lifetime; appended even when validation fails, so
    /// later declarations can resolve forward references to the name.
    names: Vec<SmolStr>,
    /// Registered models keyed by collection name.
    models: BTreeMap<SmolStr, RegisteredModel>,
    /// Model name to collection name.
    collections: BTreeMap<SmolStr, SmolStr>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model schema.
    ///
    /// Validates the schema, derives its shadow, and maps its collection
    /// name. Re-registering the same model name replaces the prior entry;
    /// a different model claiming an existing collection is an error.
    pub fn register(&mut self, mut schema: ModelSchema) -> SchemaResult<()> {
        let name = schema.name.clone();
        if !self.names.contains(&name) {
            self.names.push(name.clone());
        }

        resolve_forward_refs(&mut schema, &self.names);
        validate(&schema)?;

        let collection = schema.collection_name();
        if let Some(existing) = self.models.get(&collection) {
            if existing.schema.name != name {
                return Err(SchemaError::DuplicateModel {
                    model: name.to_string(),
                    existing: existing.schema.name.to_string(),
                    collection: collection.to_string(),
                });
            }
        }

        let shadow = derive_shadow(&schema);
        debug!(model = %name, collection = %collection, "Registered model");
        self.collections.insert(name.clone(), collection.clone());
        self.models
            .insert(collection, RegisteredModel { schema, shadow });

        self.upgrade_pending(&name);
        Ok(())
    }

    /// Upgrade pending forward references to `name` in every stored model.
    fn upgrade_pending(&mut self, name: &SmolStr) {
        for entry in self.models.values_mut() {
            let mut changed = false;
            for field in &mut entry.schema.fields {
                let rebuilt = field.ty.rebuild(&|leaf| match leaf {
                    FieldType::Unresolved(n) if n == name => FieldType::Model(n.clone()),
                    other => other.clone(),
                });
                if rebuilt != field.ty {
                    field.ty = rebuilt;
                    changed = true;
                }
            }
            if changed {
                entry.shadow = derive_shadow(&entry.schema);
            }
        }
    }

    /// Every model name ever registered, in registration order.
    pub fn names(&self) -> &[SmolStr] {
        &self.names
    }

    /// Look up a registered model by collection name.
    pub fn by_collection(&self, collection: &str) -> Option<&RegisteredModel> {
        self.models.get(collection)
    }

    /// Look up a registered model by model name.
    pub fn by_name(&self, name: &str) -> Option<&RegisteredModel> {
        self.collections
            .get(name)
            .and_then(|collection| self.models.get(collection))
    }

    /// The collection a model name maps to, if registered.
    pub fn collection_of(&self, name: &str) -> Option<&SmolStr> {
        self.collections.get(name)
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if no model has been registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Clear all registrations, including the grow-only name list.
    ///
    /// Intended for test teardown; production code never shrinks the
    /// registry.
    pub fn clear(&mut self) {
        self.names.clear();
        self.models.clear();
        self.collections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;
    use pretty_assertions::assert_eq;

    fn user_schema() -> ModelSchema {
        ModelSchema::new("User")
            .field("id", FieldType::optional(FieldType::String))
            .field("name", FieldType::String)
    }

    #[test]
    fn test_register_and_lookup_by_collection() {
        let mut registry = ModelRegistry::new();
        registry.register(user_schema()).unwrap();

        let entry = registry.by_collection("users").unwrap();
        assert_eq!(entry.schema.name, "User");
        assert_eq!(registry.collection_of("User").unwrap(), "users");
        assert!(registry.by_collection("missing").is_none());
    }

    #[test]
    fn test_name_list_grows_even_on_failure() {
        let mut registry = ModelRegistry::new();
        let bad = ModelSchema::new("Broken").field("blob", FieldType::unsupported("bytes"));
        assert!(registry.register(bad).is_err());
        assert_eq!(registry.names(), ["Broken"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_forward_reference_upgrades_on_later_registration() {
        let mut registry = ModelRegistry::new();
        let doc = ModelSchema::new("Doc")
            .field("id", FieldType::optional(FieldType::String))
            .field("owner", FieldType::unresolved("User"));
        registry.register(doc).unwrap();

        // Pending until `User` arrives.
        let entry = registry.by_name("Doc").unwrap();
        assert_eq!(
            entry.schema.field_type("owner"),
            Some(&FieldType::unresolved("User"))
        );

        registry.register(user_schema()).unwrap();
        let entry = registry.by_name("Doc").unwrap();
        assert_eq!(entry.schema.field_type("owner"), Some(&FieldType::model("User")));
        // The shadow caught up too.
        assert_eq!(entry.shadow.field_type("owner"), Some(&FieldType::Reference));
    }

    #[test]
    fn test_duplicate_collection_is_rejected() {
        let mut registry = ModelRegistry::new();
        registry.register(user_schema()).unwrap();
        let imposter = ModelSchema::new("Imposter").with_collection("users");
        let err = registry.register(imposter).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateModel { .. }));
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = ModelRegistry::new();
        registry.register(user_schema()).unwrap();
        registry
            .register(user_schema().field("age", FieldType::Int))
            .unwrap();
        assert_eq!(registry.len(), 1);
        let entry = registry.by_name("User").unwrap();
        assert_eq!(entry.schema.field_type("age"), Some(&FieldType::Int));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut registry = ModelRegistry::new();
        registry.register(user_schema()).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
    }
}
