//! Lazy-loading reference proxies.
//!
//! A [`LazyRef`] stands in for a referenced document in a model field.
//! Deserialized from a stored reference record it starts unloaded and
//! fetches the target document on first access; constructed in code it
//! holds the value directly. [`DynRef`] is the untyped counterpart used
//! when enumerating a document's references without knowing their model
//! types at compile time.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use bson::{Bson, Document};
use once_cell::sync::OnceCell;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use tracing::warn;

use crate::error::{OdmError, OdmResult};
use crate::model::Model;
use crate::refs::RefRecord;
use crate::resolve;
use crate::runtime;

/// State of a lazy reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum LazyState {
    /// Holding only a reference record.
    Unloaded = 0,
    /// Currently fetching the target document.
    Loading = 1,
    /// Target materialized in the cell.
    Loaded = 2,
}

impl From<u8> for LazyState {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Unloaded,
            1 => Self::Loading,
            _ => Self::Loaded,
        }
    }
}

/// A lazily-loaded reference to another model's document.
///
/// The target is not fetched until [`LazyRef::load`] is called. A deleted
/// or missing target collapses to the model's defaults rather than
/// failing, so stale references degrade gracefully.
pub struct LazyRef<M> {
    state: AtomicU8,
    record: Option<RefRecord>,
    value: UnsafeCell<Option<M>>,
}

// SAFETY: state transitions are atomic and the cell is only written by
// the task that won the Unloaded -> Loading exchange.
unsafe impl<M: Send> Send for LazyRef<M> {}
unsafe impl<M: Sync> Sync for LazyRef<M> {}

impl<M: Model> LazyRef<M> {
    /// Create an unloaded proxy from a stored reference record.
    pub fn from_record(record: RefRecord) -> Self {
        Self {
            state: AtomicU8::new(LazyState::Unloaded as u8),
            record: Some(record),
            value: UnsafeCell::new(None),
        }
    }

    /// Create a proxy that already holds its value.
    pub fn loaded(value: M) -> Self {
        Self {
            state: AtomicU8::new(LazyState::Loaded as u8),
            record: None,
            value: UnsafeCell::new(Some(value)),
        }
    }

    /// Whether the target has been materialized.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        LazyState::from(self.state.load(Ordering::Acquire)) == LazyState::Loaded
    }

    /// The stored reference record, if this proxy came from one.
    pub fn reference(&self) -> Option<&RefRecord> {
        self.record.as_ref()
    }

    /// The value, if materialized.
    pub fn get(&self) -> Option<&M> {
        if self.is_loaded() {
            // SAFETY: Loaded means the value was written and is immutable
            // until a &mut method runs.
            unsafe { (*self.value.get()).as_ref() }
        } else {
            None
        }
    }

    /// Mutable access to the value, if materialized.
    pub fn get_mut(&mut self) -> Option<&mut M> {
        if self.is_loaded() {
            self.value.get_mut().as_mut()
        } else {
            None
        }
    }

    /// Replace the value, marking the proxy loaded.
    pub fn set(&mut self, value: M) {
        *self.value.get_mut() = Some(value);
        self.state.store(LazyState::Loaded as u8, Ordering::Release);
    }

    /// Materialize the target, fetching it on first call.
    ///
    /// A reference whose target no longer exists resolves to the model's
    /// defaults with a warning; a malformed identifier and driver failures
    /// leave the proxy unloaded and propagate.
    pub async fn load(&self) -> OdmResult<&M> {
        if self.is_loaded() {
            // SAFETY: Loaded, value present.
            return Ok(unsafe { (*self.value.get()).as_ref().unwrap() });
        }

        let prev = self.state.compare_exchange(
            LazyState::Unloaded as u8,
            LazyState::Loading as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        match prev {
            Ok(_) => match self.fetch().await {
                Ok(value) => {
                    // SAFETY: we hold the Loading transition, no other writer.
                    unsafe {
                        *self.value.get() = Some(value);
                    }
                    self.state.store(LazyState::Loaded as u8, Ordering::Release);
                    Ok(unsafe { (*self.value.get()).as_ref().unwrap() })
                }
                Err(e) => {
                    self.state
                        .store(LazyState::Unloaded as u8, Ordering::Release);
                    Err(e)
                }
            },
            Err(current) => match LazyState::from(current) {
                LazyState::Loaded => Ok(unsafe { (*self.value.get()).as_ref().unwrap() }),
                LazyState::Loading => loop {
                    tokio::task::yield_now().await;
                    match LazyState::from(self.state.load(Ordering::Acquire)) {
                        LazyState::Loaded => {
                            return Ok(unsafe { (*self.value.get()).as_ref().unwrap() });
                        }
                        LazyState::Unloaded => {
                            return Box::pin(self.load()).await;
                        }
                        LazyState::Loading => continue,
                    }
                },
                LazyState::Unloaded => Box::pin(self.load()).await,
            },
        }
    }

    /// Materialize the target and hand out mutable access.
    pub async fn load_mut(&mut self) -> OdmResult<&mut M> {
        self.load().await?;
        // Loaded after the await above.
        Ok(self.value.get_mut().as_mut().unwrap())
    }

    async fn fetch(&self) -> OdmResult<M> {
        let Some(record) = &self.record else {
            warn!(
                model = M::NAME,
                "Lazy reference has no record; materializing defaults"
            );
            return Ok(M::default());
        };
        let oid = match record.object_id() {
            Ok(oid) => oid,
            // Only a missing id collapses to defaults; a malformed one
            // propagates.
            Err(err) if err.is_invalid_id() => return Err(err),
            Err(_) => {
                warn!(
                    model = M::NAME,
                    reference = %record,
                    "Lazy reference has no id; materializing defaults"
                );
                return Ok(M::default());
            }
        };

        let client = runtime::client()?;
        let database = if record.database.is_empty() {
            client.database().clone()
        } else {
            client.get_database(&record.database)
        };
        let collection = database.collection::<Document>(&record.collection);
        match collection.find_one(bson::doc! { "_id": oid }, None).await? {
            Some(doc) => Ok(resolve::from_document_lenient(doc)),
            None => {
                warn!(
                    model = M::NAME,
                    reference = %record,
                    "Referenced document not found; materializing defaults"
                );
                Ok(M::default())
            }
        }
    }
}

impl<M: Model> Default for LazyRef<M> {
    fn default() -> Self {
        Self::loaded(M::default())
    }
}

impl<M: Model + Clone> Clone for LazyRef<M> {
    fn clone(&self) -> Self {
        match self.get() {
            Some(value) => Self::loaded(value.clone()),
            None => Self {
                state: AtomicU8::new(LazyState::Unloaded as u8),
                record: self.record.clone(),
                value: UnsafeCell::new(None),
            },
        }
    }
}

impl<M: Model + PartialEq> PartialEq for LazyRef<M> {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get() && self.record == other.record
    }
}

impl<M: Model + fmt::Debug> fmt::Debug for LazyRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f
                .debug_struct("LazyRef")
                .field("state", &"Loaded")
                .field("value", value)
                .finish(),
            None => f
                .debug_struct("LazyRef")
                .field("state", &"Unloaded")
                .field("record", &self.record)
                .finish(),
        }
    }
}

/// Loaded proxies serialize as the full target model; unloaded proxies
/// serialize as their reference record.
impl<M: Model> Serialize for LazyRef<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(value) = self.get() {
            return value.serialize(serializer);
        }
        match &self.record {
            Some(record) => record.serialize(serializer),
            None => Err(serde::ser::Error::custom(
                "lazy reference holds neither a value nor a record",
            )),
        }
    }
}

/// A reference-shaped mapping deserializes to an unloaded proxy; anything
/// else is parsed as the target model itself.
impl<'de, M: Model> Deserialize<'de> for LazyRef<M> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Bson::deserialize(deserializer)?;
        if let Bson::Document(doc) = &value {
            if RefRecord::matches(doc) {
                let record = RefRecord::from_document(doc).map_err(de::Error::custom)?;
                return Ok(Self::from_record(record));
            }
        }
        let model: M = bson::from_bson(value).map_err(de::Error::custom)?;
        Ok(Self::loaded(model))
    }
}

/// An untyped lazy reference over a raw document.
///
/// Used when walking a stored document's references without static type
/// information; the referenced model is looked up through the registry.
pub struct DynRef {
    record: RefRecord,
    cached: OnceCell<Document>,
}

impl DynRef {
    pub fn new(record: RefRecord) -> Self {
        Self {
            record,
            cached: OnceCell::new(),
        }
    }

    /// The underlying reference record.
    pub fn record(&self) -> &RefRecord {
        &self.record
    }

    /// The registered model name behind this reference's collection, if
    /// the model was registered.
    pub fn model_name(&self) -> Option<String> {
        runtime::registered_by_collection(&self.record.collection)
            .map(|registered| registered.schema.name.to_string())
    }

    /// Whether the target document has been fetched.
    pub fn is_loaded(&self) -> bool {
        self.cached.get().is_some()
    }

    /// Fetch the target document, caching it on first call.
    ///
    /// A missing target yields an empty document with a warning.
    pub async fn fetch(&self) -> OdmResult<&Document> {
        if let Some(doc) = self.cached.get() {
            return Ok(doc);
        }

        let client = runtime::client()?;
        let database = if self.record.database.is_empty() {
            client.database().clone()
        } else {
            client.get_database(&self.record.database)
        };
        let collection = database.collection::<Document>(&self.record.collection);
        let doc = match collection
            .find_one(bson::doc! { "_id": self.record.object_id()? }, None)
            .await?
        {
            Some(doc) => resolve::normalize_document(doc),
            None => {
                warn!(reference = %self.record, "Referenced document not found; yielding empty document");
                Document::new()
            }
        };
        Ok(self.cached.get_or_init(|| doc))
    }
}

impl fmt::Debug for DynRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynRef")
            .field("record", &self.record)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl From<RefRecord> for DynRef {
    fn from(record: RefRecord) -> Self {
        Self::new(record)
    }
}

impl TryFrom<&Document> for DynRef {
    type Error = OdmError;

    fn try_from(doc: &Document) -> OdmResult<Self> {
        Ok(Self::new(RefRecord::from_document(doc)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use mooring_schema::{FieldType, ModelSchema};
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        id: Option<String>,
        label: String,
    }

    impl Model for Tag {
        const NAME: &'static str = "Tag";

        fn schema() -> ModelSchema {
            ModelSchema::new("Tag")
                .field("id", FieldType::optional(FieldType::String))
                .field("label", FieldType::String)
        }

        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn set_id(&mut self, id: Option<String>) {
            self.id = id;
        }
    }

    #[test]
    fn test_loaded_proxy_exposes_value() {
        let lazy = LazyRef::loaded(Tag {
            id: None,
            label: "a".into(),
        });
        assert!(lazy.is_loaded());
        assert_eq!(lazy.get().unwrap().label, "a");
        assert!(lazy.reference().is_none());
    }

    #[test]
    fn test_unloaded_proxy_exposes_record() {
        let record = RefRecord::new("tags", "abc");
        let lazy: LazyRef<Tag> = LazyRef::from_record(record.clone());
        assert!(!lazy.is_loaded());
        assert!(lazy.get().is_none());
        assert_eq!(lazy.reference(), Some(&record));
    }

    #[test]
    fn test_default_is_loaded_defaults() {
        let lazy: LazyRef<Tag> = LazyRef::default();
        assert!(lazy.is_loaded());
        assert_eq!(lazy.get().unwrap(), &Tag::default());
    }

    #[test]
    fn test_set_marks_loaded() {
        let mut lazy: LazyRef<Tag> = LazyRef::from_record(RefRecord::new("tags", "x"));
        lazy.set(Tag {
            id: None,
            label: "b".into(),
        });
        assert!(lazy.is_loaded());
        assert_eq!(lazy.get_mut().unwrap().label, "b");
    }

    #[test]
    fn test_serialize_loaded_as_model() {
        let lazy = LazyRef::loaded(Tag {
            id: Some("1".into()),
            label: "a".into(),
        });
        let bson = bson::to_bson(&lazy).unwrap();
        assert_eq!(
            bson,
            Bson::Document(doc! { "id": "1", "label": "a" })
        );
    }

    #[test]
    fn test_serialize_unloaded_as_record() {
        let oid = ObjectId::new();
        let lazy: LazyRef<Tag> = LazyRef::from_record(RefRecord::new("tags", oid));
        let bson = bson::to_bson(&lazy).unwrap();
        assert_eq!(
            bson,
            Bson::Document(doc! { "collection": "tags", "id": oid, "database": "" })
        );
    }

    #[test]
    fn test_deserialize_record_shape_to_unloaded() {
        let oid = ObjectId::new();
        let input = doc! { "collection": "tags", "id": oid, "database": "" };
        let lazy: LazyRef<Tag> = bson::from_bson(Bson::Document(input)).unwrap();
        assert!(!lazy.is_loaded());
        assert_eq!(lazy.reference().unwrap().collection, "tags");
    }

    #[test]
    fn test_deserialize_model_shape_to_loaded() {
        let input = doc! { "id": Bson::Null, "label": "inline" };
        let lazy: LazyRef<Tag> = bson::from_bson(Bson::Document(input)).unwrap();
        assert!(lazy.is_loaded());
        assert_eq!(lazy.get().unwrap().label, "inline");
    }

    #[test]
    fn test_clone_preserves_state() {
        let loaded = LazyRef::loaded(Tag::default());
        assert!(loaded.clone().is_loaded());

        let unloaded: LazyRef<Tag> = LazyRef::from_record(RefRecord::new("tags", "x"));
        let cloned = unloaded.clone();
        assert!(!cloned.is_loaded());
        assert_eq!(cloned.reference(), unloaded.reference());
    }

    #[tokio::test]
    async fn test_load_propagates_malformed_id() {
        let lazy: LazyRef<Tag> = LazyRef::from_record(RefRecord::new("tags", "not-a-hex-id"));
        let err = lazy.load().await.unwrap_err();
        assert!(err.is_invalid_id());
        // The proxy stays unloaded so a corrected record could still load.
        assert!(!lazy.is_loaded());
    }

    #[tokio::test]
    async fn test_load_collapses_missing_id_to_defaults() {
        let lazy: LazyRef<Tag> = LazyRef::from_record(RefRecord::new("tags", Bson::Null));
        assert_eq!(lazy.load().await.unwrap(), &Tag::default());
        assert!(lazy.is_loaded());
    }

    #[test]
    fn test_dyn_ref_starts_unloaded() {
        let dyn_ref = DynRef::new(RefRecord::new("tags", "abc"));
        assert!(!dyn_ref.is_loaded());
        assert_eq!(dyn_ref.record().collection, "tags");
    }
}
