//! Persistence operations over declared models.
//!
//! [`Persist`] carries the full CRUD surface with provided bodies; every
//! [`Model`] gets it through the blanket impl. Writes serialize through
//! the model's shadow schema so embedded model values become reference
//! records on the wire; reads normalize the storage primary key back into
//! the user-facing `id` field.

use bson::{doc, oid::ObjectId, Bson, Document};
use futures::TryStreamExt;
use mongodb::Cursor;
use mooring_schema::{derive_shadow, ConverterShape, RefConverter, SchemaError};
use tracing::debug;

use crate::error::{OdmError, OdmResult};
use crate::lazy::{DynRef, LazyRef};
use crate::model::{collection_for, Model};
use crate::refs::RefRecord;
use crate::resolve;
use crate::runtime;
use crate::walker;

/// CRUD operations for a declared model.
///
/// All methods have provided bodies; implement [`Model`] and the blanket
/// impl supplies the rest.
#[allow(async_fn_in_trait)]
pub trait Persist: Model {
    /// Insert or update this instance.
    ///
    /// An instance without an id is inserted and receives its assigned id;
    /// an instance with an id is updated in place.
    async fn save(&mut self) -> OdmResult<()> {
        let collection = collection_for::<Self>().await?;
        let mut document = dump_document::<Self>(self, true)?;
        document.remove(mooring_schema::ID_FIELD);

        match self.id() {
            Some(id) => {
                let oid = ObjectId::parse_str(id)?;
                collection
                    .update_one(doc! { "_id": oid }, doc! { "$set": document }, None)
                    .await?;
                debug!(model = Self::NAME, id, "Updated document");
            }
            None => {
                let result = collection.insert_one(document, None).await?;
                if let Bson::ObjectId(oid) = result.inserted_id {
                    self.set_id(Some(oid.to_hex()));
                }
                debug!(model = Self::NAME, id = ?self.id(), "Inserted document");
            }
        }
        Ok(())
    }

    /// Delete this instance's document and clear its id.
    ///
    /// Deleting an unsaved instance is a no-op.
    async fn remove(&mut self) -> OdmResult<()> {
        let Some(id) = self.id() else {
            return Ok(());
        };
        let oid = ObjectId::parse_str(id)?;
        let collection = collection_for::<Self>().await?;
        collection.delete_one(doc! { "_id": oid }, None).await?;
        self.set_id(None);
        Ok(())
    }

    /// Fetch one instance by its string id.
    async fn get_by_id(id: &str) -> OdmResult<Option<Self>> {
        let oid = ObjectId::parse_str(id)?;
        Self::get_by_filter(doc! { "_id": oid }).await
    }

    /// Fetch the first instance matching a filter.
    ///
    /// String values under `_id` (or the `id` alias) are converted to
    /// native identifiers before querying.
    async fn get_by_filter(filter: Document) -> OdmResult<Option<Self>> {
        let collection = collection_for::<Self>().await?;
        let filter = prepare_filter(filter)?;
        match collection.find_one(filter, None).await? {
            Some(document) => Ok(Some(resolve::from_document_strict(document)?)),
            None => Ok(None),
        }
    }

    /// Stream all instances matching a filter.
    async fn find(filter: Document) -> OdmResult<ModelCursor<Self>> {
        let collection = collection_for::<Self>().await?;
        let filter = prepare_filter(filter)?;
        let cursor = collection.find(filter, None).await?;
        Ok(ModelCursor {
            inner: cursor,
            _marker: std::marker::PhantomData,
        })
    }

    /// Count instances matching a filter.
    async fn count(filter: Document) -> OdmResult<u64> {
        let collection = collection_for::<Self>().await?;
        let filter = prepare_filter(filter)?;
        Ok(collection.count_documents(filter, None).await?)
    }

    /// Enumerate the reference records stored inside this instance's
    /// document, as untyped lazy proxies.
    ///
    /// Returns `Ok(None)` when the instance was never saved or its
    /// document is gone.
    async fn ref_objects(&self) -> OdmResult<Option<Vec<DynRef>>> {
        let Some(id) = self.id() else {
            return Ok(None);
        };
        let oid = ObjectId::parse_str(id)?;
        let collection = collection_for::<Self>().await?;
        let Some(document) = collection.find_one(doc! { "_id": oid }, None).await? else {
            return Ok(None);
        };
        let records = walker::collect_refs(&Bson::Document(document));
        Ok(Some(records.into_iter().map(DynRef::new).collect()))
    }

    /// Serialize to the storage form: identifier under `_id`, embedded
    /// model values replaced by reference records.
    ///
    /// Errors when an embedded model was never saved, since its record
    /// would not be dereferenceable.
    fn dump(&self) -> OdmResult<Document> {
        dump_document::<Self>(self, true)
    }

    /// Serialize to the storage shape without the unsaved-target check;
    /// unsaved embedded models yield records with a null id.
    fn dump_raw(&self) -> OdmResult<Document> {
        dump_document::<Self>(self, false)
    }

    /// Serialize to the live form: every reference expanded into the
    /// referenced document, recursively. Missing targets become null.
    async fn dump_live(&self) -> OdmResult<Document> {
        let mut root = Bson::Document(bson::to_document(self)?);
        resolve::resolve_refs_eager(&mut root).await?;
        walker::stringify_object_ids(&mut root);
        match root {
            Bson::Document(document) => Ok(document),
            _ => Err(OdmError::Serialization(
                "live dump did not produce a document".into(),
            )),
        }
    }

    /// Fetch the instance a reference record points at.
    async fn fetch_ref(record: &RefRecord) -> OdmResult<Option<Self>> {
        let client = runtime::client()?;
        let database = if record.database.is_empty() {
            client.database().clone()
        } else {
            client.get_database(&record.database)
        };
        let collection = database.collection::<Document>(&record.collection);
        match collection
            .find_one(doc! { "_id": record.object_id()? }, None)
            .await?
        {
            Some(document) => Ok(Some(resolve::from_document_lenient(document))),
            None => Ok(None),
        }
    }

    /// Wrap a reference record into an unloaded lazy proxy.
    fn from_ref(record: RefRecord) -> LazyRef<Self> {
        LazyRef::from_record(record)
    }
}

impl<M: Model> Persist for M {}

/// A typed cursor over a model's collection.
pub struct ModelCursor<M> {
    inner: Cursor<Document>,
    _marker: std::marker::PhantomData<M>,
}

impl<M: Model> ModelCursor<M> {
    /// Advance to the next instance.
    pub async fn next(&mut self) -> OdmResult<Option<M>> {
        match self.inner.try_next().await? {
            Some(document) => Ok(Some(resolve::from_document_strict(document)?)),
            None => Ok(None),
        }
    }

    /// Drain the cursor into a vector.
    pub async fn all(mut self) -> OdmResult<Vec<M>> {
        let mut out = Vec::new();
        while let Some(model) = self.next().await? {
            out.push(model);
        }
        Ok(out)
    }
}

/// Convert user-facing identifier filters to the storage form: the `id`
/// alias becomes `_id`, and string identifier values become native ids.
fn prepare_filter(mut filter: Document) -> OdmResult<Document> {
    if let Some(value) = filter.remove(mooring_schema::ID_NAME) {
        filter.insert(mooring_schema::ID_FIELD, value);
    }
    if let Some(Bson::String(id)) = filter.get(mooring_schema::ID_FIELD).cloned() {
        let oid = ObjectId::parse_str(&id)?;
        filter.insert(mooring_schema::ID_FIELD, oid);
    }
    Ok(filter)
}

/// Serialize a model into its storage document.
///
/// The shadow schema's converters decide which fields hold embedded models;
/// those values are rewritten into reference records. With `strict` set, an
/// embedded model without an id is an error.
fn dump_document<M: Model>(model: &M, strict: bool) -> OdmResult<Document> {
    let mut document = bson::to_document(model)?;

    if let Some(id) = document.remove(mooring_schema::ID_NAME) {
        match id {
            Bson::Null => {}
            Bson::String(id) => {
                let oid = ObjectId::parse_str(&id)?;
                document.insert(mooring_schema::ID_FIELD, oid);
            }
            other => {
                document.insert(mooring_schema::ID_FIELD, other);
            }
        }
    }

    let shadow = derive_shadow(&M::schema());
    for (field, converter) in &shadow.converters {
        let Some(value) = document.get_mut(field.as_str()) else {
            continue;
        };
        apply_converter(value, converter, strict)?;
    }
    Ok(document)
}

fn apply_converter(value: &mut Bson, converter: &RefConverter, strict: bool) -> OdmResult<()> {
    match converter.shape {
        ConverterShape::Scalar => convert_value(value, converter, strict),
        ConverterShape::List => {
            if let Bson::Array(items) = value {
                for item in items {
                    convert_value(item, converter, strict)?;
                }
            }
            Ok(())
        }
        ConverterShape::Map => {
            if let Bson::Document(entries) = value {
                for (_, item) in entries.iter_mut() {
                    convert_value(item, converter, strict)?;
                }
            }
            Ok(())
        }
    }
}

/// Rewrite one embedded model value into its reference record. Values that
/// already carry the reference field set pass through unchanged.
fn convert_value(value: &mut Bson, converter: &RefConverter, strict: bool) -> OdmResult<()> {
    let Bson::Document(embedded) = value else {
        return Ok(());
    };
    if RefRecord::matches(embedded) {
        return Ok(());
    }

    let id = embedded.get(mooring_schema::ID_NAME).cloned().unwrap_or(Bson::Null);
    if strict && matches!(id, Bson::Null) {
        return Err(OdmError::unsaved_reference(format!(
            "embedded `{}` has no id; save it before saving its parent",
            converter.target
        )));
    }
    let id = match id {
        Bson::String(s) => match ObjectId::parse_str(&s) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(_) => Bson::String(s),
        },
        other => other,
    };

    // The registry is the only authority on the target's collection;
    // the target may override its derived name.
    let collection = runtime::collection_of(&converter.target)
        .ok_or_else(|| SchemaError::unknown_collection(&*converter.target))?;
    *value = RefRecord::new(collection, id).to_bson();
    Ok(())
}
