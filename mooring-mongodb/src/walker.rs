//! Structural walking over BSON trees.
//!
//! Documents and arrays are traversed recursively; every other `Bson`
//! variant is an opaque leaf. Walks replace values only, never keys, and
//! never recurse into a value they just replaced.

use bson::{Bson, Document};

use crate::error::{OdmError, OdmResult};
use crate::refs::RefRecord;

/// Replace, in place, every value for which `predicate` holds with
/// `replace(value)`.
///
/// Errors if the root is neither a document nor an array.
pub fn replace_matching<P, F>(root: &mut Bson, predicate: P, mut replace: F) -> OdmResult<()>
where
    P: Fn(&Bson) -> bool,
    F: FnMut(Bson) -> Bson,
{
    ensure_traversable(root)?;
    visit(root, &predicate, &mut replace);
    Ok(())
}

fn visit<P, F>(value: &mut Bson, predicate: &P, replace: &mut F)
where
    P: Fn(&Bson) -> bool,
    F: FnMut(Bson) -> Bson,
{
    match value {
        Bson::Document(doc) => {
            for (_, item) in doc.iter_mut() {
                step(item, predicate, replace);
            }
        }
        Bson::Array(items) => {
            for item in items.iter_mut() {
                step(item, predicate, replace);
            }
        }
        _ => {}
    }
}

fn step<P, F>(item: &mut Bson, predicate: &P, replace: &mut F)
where
    P: Fn(&Bson) -> bool,
    F: FnMut(Bson) -> Bson,
{
    if predicate(item) {
        let taken = std::mem::replace(item, Bson::Null);
        *item = replace(taken);
    } else {
        visit(item, predicate, replace);
    }
}

/// Replace, in place, every sub-document containing **all** of `fields` as
/// keys with `replace(document)`; recursion stops at a matched node.
///
/// The all-present test is deliberate: a matched document may carry extra
/// keys. Only values are ever touched.
pub fn replace_documents_with_fields<F>(
    root: &mut Bson,
    fields: &[&str],
    mut replace: F,
) -> OdmResult<()>
where
    F: FnMut(Document) -> Bson,
{
    ensure_traversable(root)?;
    let predicate = |value: &Bson| match value {
        Bson::Document(doc) => fields.iter().all(|key| doc.contains_key(key)),
        _ => false,
    };
    let mut wrap = |value: Bson| match value {
        Bson::Document(doc) => replace(doc),
        other => other,
    };
    visit(root, &predicate, &mut wrap);
    Ok(())
}

/// Collect every reference-shaped sub-document, in document traversal
/// order. Traversal does not descend into a collected reference.
pub fn collect_refs(root: &Bson) -> Vec<RefRecord> {
    let mut out = Vec::new();
    collect(root, &mut out);
    out
}

fn collect(value: &Bson, out: &mut Vec<RefRecord>) {
    match value {
        Bson::Document(doc) => {
            if RefRecord::matches(doc) {
                if let Ok(record) = RefRecord::from_document(doc) {
                    out.push(record);
                }
                return;
            }
            for (_, item) in doc.iter() {
                collect(item, out);
            }
        }
        Bson::Array(items) => {
            for item in items {
                collect(item, out);
            }
        }
        _ => {}
    }
}

/// Replace every `ObjectId` value in the tree with its hex-string form.
pub fn stringify_object_ids(root: &mut Bson) {
    let predicate = |value: &Bson| matches!(value, Bson::ObjectId(_));
    let mut replace = |value: Bson| match value {
        Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
        other => other,
    };
    // The root here is always a document or array by construction.
    visit(root, &predicate, &mut replace);
}

fn ensure_traversable(root: &Bson) -> OdmResult<()> {
    match root {
        Bson::Document(_) | Bson::Array(_) => Ok(()),
        other => Err(OdmError::walk(format!(
            "cannot walk a non-container root: {:?}",
            other.element_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replace_matching_nested() {
        let mut root = Bson::Document(doc! {
            "a": 1,
            "b": { "c": 1, "d": [1, "x", { "e": 1 }] },
        });
        replace_matching(
            &mut root,
            |v| matches!(v, Bson::Int32(1)),
            |_| Bson::Int32(2),
        )
        .unwrap();
        assert_eq!(
            root,
            Bson::Document(doc! {
                "a": 2,
                "b": { "c": 2, "d": [2, "x", { "e": 2 }] },
            })
        );
    }

    #[test]
    fn test_replace_does_not_recurse_into_replacement() {
        let mut root = Bson::Document(doc! { "a": "hit" });
        replace_matching(
            &mut root,
            |v| matches!(v, Bson::String(_)),
            |_| Bson::Document(doc! { "inner": "hit" }),
        )
        .unwrap();
        // The replacement document's own string was left alone.
        assert_eq!(root, Bson::Document(doc! { "a": { "inner": "hit" } }));
    }

    #[test]
    fn test_non_traversable_root_errors() {
        let mut root = Bson::Int32(7);
        let err = replace_matching(&mut root, |_| false, |v| v).unwrap_err();
        assert!(matches!(err, OdmError::Walk(_)));
    }

    #[test]
    fn test_fieldset_match_is_all_present() {
        let mut root = Bson::Document(doc! {
            "exact": { "collection": "users", "id": "x", "database": "" },
            "superset": { "collection": "users", "id": "x", "database": "", "extra": 1 },
            "partial": { "collection": "users", "id": "x" },
        });
        replace_documents_with_fields(&mut root, &["collection", "id", "database"], |_| {
            Bson::String("ref".into())
        })
        .unwrap();
        let doc = root.as_document().unwrap();
        assert_eq!(doc.get("exact"), Some(&Bson::String("ref".into())));
        // Extra keys do not defeat the match.
        assert_eq!(doc.get("superset"), Some(&Bson::String("ref".into())));
        // Missing keys do.
        assert!(doc.get_document("partial").is_ok());
    }

    #[test]
    fn test_fieldset_match_stops_recursion() {
        let mut hits = 0;
        let mut root = Bson::Document(doc! {
            "outer": {
                "collection": "a",
                "id": { "collection": "b", "id": "y", "database": "" },
                "database": "",
            },
        });
        replace_documents_with_fields(&mut root, &["collection", "id", "database"], |d| {
            hits += 1;
            Bson::Document(d)
        })
        .unwrap();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_collect_refs_in_traversal_order() {
        let oid = ObjectId::new();
        let root = Bson::Document(doc! {
            "first": { "collection": "users", "id": oid, "database": "" },
            "nested": {
                "list": [
                    { "collection": "posts", "id": oid, "database": "" },
                    { "not": "a ref" },
                ],
            },
            "map": { "k": { "collection": "tags", "id": oid, "database": "other" } },
        });
        let refs = collect_refs(&root);
        let collections: Vec<_> = refs.iter().map(|r| r.collection.as_str()).collect();
        assert_eq!(collections, ["users", "posts", "tags"]);
        assert_eq!(refs[2].database, "other");
    }

    #[test]
    fn test_stringify_object_ids() {
        let oid = ObjectId::new();
        let mut root = Bson::Document(doc! {
            "_id": oid,
            "nested": { "ref_id": oid },
            "list": [oid, 3],
        });
        stringify_object_ids(&mut root);
        let doc = root.as_document().unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), oid.to_hex());
        assert_eq!(
            doc.get_document("nested").unwrap().get_str("ref_id").unwrap(),
            oid.to_hex()
        );
        assert_eq!(doc.get_array("list").unwrap()[0], Bson::String(oid.to_hex()));
    }
}
