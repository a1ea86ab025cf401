//! Reference records: the `{collection, id, database}` pointer.
//!
//! A fully populated record is interchangeable with a native foreign
//! reference during storage round-trips; the 3-key field set (all present)
//! is the signal that a sub-document is a reference rather than embedded
//! data, both when reading from storage and when parsing constructor
//! input.

use bson::{Bson, Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::{OdmError, OdmResult};

/// The field set identifying a reference record on the wire.
pub const REF_FIELDS: [&str; 3] = ["collection", "id", "database"];

/// A cross-document reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefRecord {
    /// Target collection name.
    pub collection: String,
    /// Target identifier; [`Bson::Null`] for a not-yet-saved target.
    pub id: Bson,
    /// Target database name; empty means the default database.
    #[serde(default)]
    pub database: String,
}

impl RefRecord {
    /// Create a record pointing into the default database.
    pub fn new(collection: impl Into<String>, id: impl Into<Bson>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            database: String::new(),
        }
    }

    /// Create a record from a stringified object id.
    ///
    /// Errors when the string is not a valid identifier.
    pub fn from_str_id(collection: impl Into<String>, id: &str) -> OdmResult<Self> {
        let oid = ObjectId::parse_str(id)?;
        Ok(Self::new(collection, Bson::ObjectId(oid)))
    }

    /// Check whether a document carries the reference field set.
    pub fn matches(doc: &Document) -> bool {
        REF_FIELDS.iter().all(|key| doc.contains_key(key))
    }

    /// Parse a record out of a wire document.
    pub fn from_document(doc: &Document) -> OdmResult<Self> {
        let collection = doc
            .get_str("collection")
            .map_err(|_| OdmError::Serialization("reference `collection` must be a string".into()))?
            .to_string();
        let id = doc.get("id").cloned().unwrap_or(Bson::Null);
        let database = doc.get_str("database").unwrap_or_default().to_string();
        Ok(Self {
            collection,
            id,
            database,
        })
    }

    /// The 3-key wire document.
    pub fn to_document(&self) -> Document {
        doc! {
            "collection": &self.collection,
            "id": self.id.clone(),
            "database": &self.database,
        }
    }

    /// The wire document as a `Bson` value.
    pub fn to_bson(&self) -> Bson {
        Bson::Document(self.to_document())
    }

    /// Check whether the target was ever saved.
    pub fn has_id(&self) -> bool {
        !matches!(self.id, Bson::Null)
    }

    /// The id as the store's native identifier type.
    ///
    /// String ids are converted at this boundary; a malformed string is an
    /// invalid-id error, a null id an unsaved-reference error.
    pub fn object_id(&self) -> OdmResult<ObjectId> {
        match &self.id {
            Bson::ObjectId(oid) => Ok(*oid),
            Bson::String(s) => Ok(ObjectId::parse_str(s)?),
            Bson::Null => Err(OdmError::unsaved_reference(format!(
                "reference into `{}` has no id",
                self.collection
            ))),
            other => Err(OdmError::invalid_id(format!(
                "reference id has unsupported type {:?}",
                other.element_type()
            ))),
        }
    }
}

impl std::fmt::Display for RefRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.collection, self.id)
    }
}
