//! Read-path document resolution.
//!
//! Raw store documents are normalized before typed construction: the
//! storage primary key `_id` is stringified into the user-facing `id`
//! field, and reference-shaped sub-documents are left in place for the
//! lazy-proxy deserializer (or expanded eagerly for live dumps).

use bson::{Bson, Document};
use futures::future::BoxFuture;
use tracing::warn;

use crate::error::OdmResult;
use crate::model::Model;
use crate::refs::RefRecord;
use crate::runtime;

/// Move `_id` into the user-facing `id` field, stringifying object ids.
pub fn normalize_document(mut doc: Document) -> Document {
    if let Some(id) = doc.remove("_id") {
        let id = match id {
            Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
            other => other,
        };
        doc.insert("id", id);
    }
    doc
}

/// Construct a typed model from a raw store document.
///
/// Validation failures propagate unchanged.
pub fn from_document_strict<M: Model>(doc: Document) -> OdmResult<M> {
    Ok(bson::from_document(normalize_document(doc))?)
}

/// Construct a typed model from constructor input in which references are
/// expressed as plain `{collection, id, database}` mappings.
///
/// The lazy-proxy deserializer recognizes the reference field set, so the
/// input parses directly; this entry point exists for callers holding raw
/// mappings rather than store documents (no `_id` aliasing is applied).
pub fn from_document_with_refs<M: Model>(doc: Document) -> OdmResult<M> {
    Ok(bson::from_document(doc)?)
}

/// Best-effort construction that tolerates missing or malformed fields.
///
/// Fetched fields are overlaid onto the model's defaults so absent fields
/// default instead of failing; if the overlay still does not validate the
/// result degrades to a fully defaulted instance carrying the document's
/// id.
pub fn from_document_lenient<M: Model>(doc: Document) -> M {
    let doc = normalize_document(doc);
    match bson::from_document::<M>(doc.clone()) {
        Ok(model) => model,
        Err(err) => {
            warn!(
                model = M::NAME,
                error = %err,
                "Failed to load model strictly; falling back to defaults overlay"
            );
            overlay_onto_defaults(doc)
        }
    }
}

fn overlay_onto_defaults<M: Model>(doc: Document) -> M {
    let mut base = match bson::to_document(&M::default()) {
        Ok(base) => base,
        Err(_) => Document::new(),
    };
    let id = doc.get("id").cloned();
    for (key, value) in doc {
        base.insert(key, value);
    }
    match bson::from_document::<M>(base) {
        Ok(model) => model,
        Err(err) => {
            warn!(
                model = M::NAME,
                error = %err,
                "Defaults overlay did not validate; returning a defaulted instance"
            );
            let mut model = M::default();
            if let Some(Bson::String(id)) = id {
                model.set_id(Some(id));
            }
            model
        }
    }
}

/// Expansion stops here even if fetched documents still contain
/// references, which bounds reference cycles.
const MAX_RESOLVE_DEPTH: usize = 16;

/// Eagerly expand every reference-shaped sub-document into the referenced
/// document, recursively. Missing targets become `null` with a warning.
pub fn resolve_refs_eager(root: &mut Bson) -> BoxFuture<'_, OdmResult<()>> {
    resolve_at_depth(root, MAX_RESOLVE_DEPTH)
}

fn resolve_at_depth(root: &mut Bson, depth: usize) -> BoxFuture<'_, OdmResult<()>> {
    Box::pin(async move {
        if depth == 0 {
            return Ok(());
        }
        // Collect replacement sites first; the fetches happen between
        // walks because the walker itself is synchronous.
        let records = crate::walker::collect_refs(root);
        if records.is_empty() {
            return Ok(());
        }

        let mut resolved: Vec<(RefRecord, Bson)> = Vec::with_capacity(records.len());
        for record in records {
            resolved.push((record.clone(), fetch_ref_document(&record).await?));
        }

        crate::walker::replace_documents_with_fields(
            root,
            &crate::refs::REF_FIELDS,
            |doc| {
                match RefRecord::from_document(&doc) {
                    Ok(record) => resolved
                        .iter()
                        .find(|(r, _)| *r == record)
                        .map(|(_, value)| value.clone())
                        .unwrap_or(Bson::Null),
                    Err(_) => Bson::Document(doc),
                }
            },
        )?;

        // Referenced documents may themselves embed references.
        if !crate::walker::collect_refs(root).is_empty() {
            resolve_at_depth(root, depth - 1).await?;
        }
        Ok(())
    })
}

async fn fetch_ref_document(record: &RefRecord) -> OdmResult<Bson> {
    let client = runtime::client()?;
    let database = if record.database.is_empty() {
        client.database().clone()
    } else {
        client.get_database(&record.database)
    };
    let collection = database.collection::<Document>(&record.collection);
    let found = collection
        .find_one(bson::doc! { "_id": record.object_id()? }, None)
        .await?;
    match found {
        Some(doc) => Ok(Bson::Document(normalize_document(doc))),
        None => {
            warn!(reference = %record, "Referenced document not found; resolving to null");
            Ok(Bson::Null)
        }
    }
}
