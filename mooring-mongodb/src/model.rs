//! The declared-model trait and collection plumbing.

use bson::Document;
use mongodb::{Collection, IndexModel};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use mooring_schema::{ModelSchema, SchemaError};

use crate::error::{OdmError, OdmResult};
use crate::refs::RefRecord;
use crate::runtime;

/// A declared model mapped to a store collection.
///
/// Implementations are normally generated by `#[derive(Model)]`; the trait
/// can also be implemented by hand. The identifier is a nullable string
/// aliased to the storage primary key `_id`: `None` until the first
/// successful save.
pub trait Model: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// The declared model name.
    const NAME: &'static str;

    /// The declared schema, consumed at registration time for validation
    /// and shadow derivation.
    fn schema() -> ModelSchema;

    /// The current identifier, if saved.
    fn id(&self) -> Option<&str>;

    /// Set the identifier. Called by `save` after an insert.
    fn set_id(&mut self, id: Option<String>);

    /// The collection this model maps to: the explicit schema override
    /// verbatim, else derived from the model name.
    fn collection_name() -> String {
        Self::schema().collection_name().to_string()
    }

    /// Declared index specifications, ensured idempotently on first use of
    /// the collection.
    fn indexes() -> Vec<IndexModel> {
        Vec::new()
    }

    /// The reference record pointing at this instance.
    ///
    /// Errors when the instance was never saved.
    fn ref_record(&self) -> OdmResult<RefRecord> {
        match self.id() {
            Some(id) => RefRecord::from_str_id(Self::collection_name(), id),
            None => Err(OdmError::unsaved_reference(format!(
                "can't build a reference for `{}` without an id; save it first",
                Self::NAME
            ))),
        }
    }
}

/// Get the model's collection handle, ensuring declared indexes once per
/// process.
pub(crate) async fn collection_for<M: Model>() -> OdmResult<Collection<Document>> {
    let client = runtime::client()?;
    let name = M::collection_name();
    let collection = client.collection_doc(&name);
    // Marked only after the indexes exist, so a failed attempt retries on
    // the next use instead of skipping the collection forever.
    if !runtime::is_indexed(&name) {
        ensure_indexes::<M>(&collection).await?;
        runtime::mark_indexed(&name);
    }
    Ok(collection)
}

/// Diff declared indexes against the collection's existing index names and
/// create only the missing ones. Safe to call repeatedly.
pub(crate) async fn ensure_indexes<M: Model>(
    collection: &Collection<Document>,
) -> OdmResult<()> {
    let declared = M::indexes();
    if declared.is_empty() {
        return Ok(());
    }

    let existing = match collection.list_index_names().await {
        Ok(names) => names,
        // A collection that does not exist yet has no indexes.
        Err(e) if is_namespace_not_found(&e) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let mut missing = Vec::new();
    for index in declared {
        let name = index
            .options
            .as_ref()
            .and_then(|o| o.name.clone())
            .ok_or_else(|| {
                OdmError::Schema(SchemaError::UnnamedIndex {
                    model: M::NAME.to_string(),
                })
            })?;
        if !existing.contains(&name) {
            missing.push(index);
        }
    }

    if !missing.is_empty() {
        let count = missing.len();
        collection.create_indexes(missing, None).await?;
        info!(
            collection = %collection.name(),
            count,
            "Created missing indexes"
        );
    }
    Ok(())
}

fn is_namespace_not_found(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        mongodb::error::ErrorKind::Command(command) if command.code == 26
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use mooring_schema::FieldType;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct TestModel {
        id: Option<String>,
        name: String,
    }

    impl Model for TestModel {
        const NAME: &'static str = "TestModel";

        fn schema() -> ModelSchema {
            ModelSchema::new("TestModel")
                .field("id", FieldType::optional(FieldType::String))
                .field("name", FieldType::String)
        }

        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn set_id(&mut self, id: Option<String>) {
            self.id = id;
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Renamed {
        id: Option<String>,
    }

    impl Model for Renamed {
        const NAME: &'static str = "Renamed";

        fn schema() -> ModelSchema {
            ModelSchema::new("Renamed")
                .with_collection("legacy_table")
                .field("id", FieldType::optional(FieldType::String))
        }

        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn set_id(&mut self, id: Option<String>) {
            self.id = id;
        }
    }

    #[test]
    fn test_collection_name_derivation() {
        assert_eq!(TestModel::collection_name(), "test_models");
    }

    #[test]
    fn test_collection_name_override_is_verbatim() {
        assert_eq!(Renamed::collection_name(), "legacy_table");
    }

    #[test]
    fn test_ref_record_requires_id() {
        let unsaved = TestModel::default();
        assert!(unsaved.ref_record().unwrap_err().is_unsaved_reference());

        let oid = ObjectId::new();
        let saved = TestModel {
            id: Some(oid.to_hex()),
            name: "a".into(),
        };
        let record = saved.ref_record().unwrap();
        assert_eq!(record.collection, "test_models");
        assert_eq!(record.object_id().unwrap(), oid);
    }
}
