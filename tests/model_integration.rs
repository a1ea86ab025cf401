//! Integration tests for model declaration and schema derivation.
//!
//! These tests exercise the `#[derive(Model)]` macro end to end: derived
//! schemas, collection naming, shadow schemas, registration, and the
//! serde behavior of reference proxies. No database is required.

use std::collections::HashMap;
use std::sync::Mutex;

use bson::oid::ObjectId;
use mooring::prelude::*;
use mooring::{derive_shadow, schema};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

// The registry is process-wide; tests that touch it serialize on this.
static REGISTRY_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Model)]
struct User {
    id: Option<String>,
    name: String,
    age: i32,
    active: bool,
    score: f64,
    nicknames: Vec<String>,
    settings: HashMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Model)]
#[model(collection = "articles")]
struct Post {
    id: Option<String>,
    title: String,
    author: LazyRef<User>,
    reviewers: Vec<User>,
}

/// Test that the derive maps every common field type
#[test]
fn test_derived_schema_field_types() {
    let s = User::schema();
    assert_eq!(s.name, "User");
    assert_eq!(s.field_type("name"), Some(&FieldType::String));
    assert_eq!(s.field_type("age"), Some(&FieldType::Int));
    assert_eq!(s.field_type("active"), Some(&FieldType::Bool));
    assert_eq!(s.field_type("score"), Some(&FieldType::Float));
    assert_eq!(
        s.field_type("id"),
        Some(&FieldType::optional(FieldType::String))
    );
    assert_eq!(
        s.field_type("nicknames"),
        Some(&FieldType::list(FieldType::String))
    );
    assert_eq!(
        s.field_type("settings"),
        Some(&FieldType::map(FieldType::String))
    );
}

/// Test that `LazyRef<T>` and embedded model fields declare references
#[test]
fn test_derived_schema_reference_fields() {
    let s = Post::schema();
    assert_eq!(s.field_type("author"), Some(&FieldType::model("User")));
    // A bare embedded model is a forward reference until registration.
    assert_eq!(
        s.field_type("reviewers"),
        Some(&FieldType::list(FieldType::unresolved("User")))
    );
}

/// Test that registration resolves embedded model fields by name
#[test]
fn test_embedded_model_resolves_on_registration() {
    let _guard = REGISTRY_LOCK.lock().unwrap();
    mooring::reset();

    mooring::register::<User>().expect("register User");
    mooring::register::<Post>().expect("register Post");

    let registered = mooring::mongodb::runtime::registered_by_name("Post").expect("Post");
    assert_eq!(
        registered.schema.field_type("reviewers"),
        Some(&FieldType::list(FieldType::model("User")))
    );
    mooring::reset();
}

/// Test collection naming: derived pluralized snake case and overrides
#[test]
fn test_collection_naming() {
    assert_eq!(User::collection_name(), "users");
    // Explicit override wins verbatim.
    assert_eq!(Post::collection_name(), "articles");
}

/// Test that the shadow schema renames the id and records converters
#[test]
fn test_shadow_schema_derivation() {
    let shadow = derive_shadow(&Post::schema());
    assert_eq!(shadow.model, "Post");
    assert!(shadow.field_type("id").is_some());
    assert_eq!(shadow.field_type("author"), Some(&FieldType::Reference));

    let author = shadow.converter("author").expect("author converter");
    assert_eq!(author.shape, schema::ConverterShape::Scalar);
    assert_eq!(author.target, "User");

    let reviewers = shadow.converter("reviewers").expect("reviewers converter");
    assert_eq!(reviewers.shape, schema::ConverterShape::List);

    // Plain fields get no converter.
    assert!(shadow.converter("title").is_none());
}

/// Test registering models and looking them up by collection
#[test]
fn test_registration_round_trip() {
    let _guard = REGISTRY_LOCK.lock().unwrap();
    mooring::reset();

    mooring::register::<User>().expect("register User");
    mooring::register::<Post>().expect("register Post");

    let registered = mooring::mongodb::runtime::registered_by_collection("articles")
        .expect("Post registered under its collection");
    assert_eq!(registered.schema.name, "Post");
    assert_eq!(
        mooring::mongodb::runtime::collection_of("User").as_deref(),
        Some("users")
    );
    mooring::reset();
}

/// Test forward references resolving when the referenced model registers
#[test]
fn test_forward_reference_resolution() {
    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    struct Team {
        id: Option<String>,
        lead: LazyRef<Contractor>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    struct Contractor {
        id: Option<String>,
        name: String,
    }

    let _guard = REGISTRY_LOCK.lock().unwrap();
    mooring::reset();

    // Team registers first, referencing a model the registry has not seen.
    mooring::register::<Team>().expect("register Team");
    mooring::register::<Contractor>().expect("register Contractor");

    let registered = mooring::mongodb::runtime::registered_by_name("Team").expect("Team");
    assert_eq!(
        registered.schema.field_type("lead"),
        Some(&FieldType::model("Contractor"))
    );
    mooring::reset();
}

/// Test a loaded proxy serializing as the full target
#[test]
fn test_lazy_ref_serializes_loaded_value() {
    let post = Post {
        id: None,
        title: "t".into(),
        author: LazyRef::loaded(User {
            name: "Alice".into(),
            ..Default::default()
        }),
        reviewers: Vec::new(),
    };
    let value = bson::to_document(&post).expect("serialize");
    assert_eq!(value.get_document("author").unwrap().get_str("name"), Ok("Alice"));
}

/// Test a stored reference record deserializing into an unloaded proxy
#[test]
fn test_lazy_ref_deserializes_record_shape() {
    let oid = ObjectId::new();
    let input = doc! {
        "title": "t",
        "author": { "collection": "users", "id": oid, "database": "" },
        "reviewers": [],
    };
    let post: Post = bson::from_document(input).expect("deserialize");
    assert!(!post.author.is_loaded());
    assert_eq!(post.author.reference().unwrap().collection, "users");
}

/// Test the storage dump converting embedded models into records
#[test]
fn test_dump_produces_reference_records() {
    let _guard = REGISTRY_LOCK.lock().unwrap();
    mooring::reset();
    mooring::register::<User>().expect("register User");

    let author_id = ObjectId::new();
    let post = Post {
        id: None,
        title: "t".into(),
        author: LazyRef::loaded(User {
            id: Some(author_id.to_hex()),
            name: "Alice".into(),
            ..Default::default()
        }),
        reviewers: Vec::new(),
    };

    let dumped = post.dump().expect("dump");
    assert_eq!(
        dumped.get_document("author").unwrap(),
        &doc! { "collection": "users", "id": author_id, "database": "" }
    );
    mooring::reset();
}

/// Test that dumping a reference to an unregistered model is rejected
#[test]
fn test_dump_requires_registered_reference_target() {
    let _guard = REGISTRY_LOCK.lock().unwrap();
    mooring::reset();

    let post = Post {
        id: None,
        title: "t".into(),
        author: LazyRef::loaded(User {
            id: Some(ObjectId::new().to_hex()),
            name: "Alice".into(),
            ..Default::default()
        }),
        reviewers: Vec::new(),
    };
    let err = post.dump().expect_err("unregistered target must fail");
    assert!(matches!(
        err,
        OdmError::Schema(SchemaError::UnknownCollection { .. })
    ));
    mooring::reset();
}

/// Test that dumping with an unsaved embedded model is rejected
#[test]
fn test_dump_rejects_unsaved_reference() {
    let post = Post {
        id: None,
        title: "t".into(),
        author: LazyRef::loaded(User::default()),
        reviewers: Vec::new(),
    };
    let err = post.dump().expect_err("unsaved author must fail");
    assert!(err.is_unsaved_reference());
}

/// Test JSON schema generation for a declared model
#[test]
fn test_json_schema_generation() {
    let json = User::schema().json_schema();
    assert_eq!(json["title"], "User");
    assert_eq!(json["properties"]["name"]["type"], "string");
    assert_eq!(json["properties"]["age"]["type"], "integer");

    let shadow = derive_shadow(&Post::schema()).json_schema();
    let author = &shadow["properties"]["author"];
    assert_eq!(author["type"], "object");
    assert!(
        author["required"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("collection"))
    );
}

/// Test duplicate collection claims being rejected
#[test]
fn test_duplicate_collection_is_rejected() {
    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    #[model(collection = "conflict_crabs")]
    struct Crab {
        id: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize, Model)]
    #[model(collection = "conflict_crabs")]
    struct Lobster {
        id: Option<String>,
    }

    let _guard = REGISTRY_LOCK.lock().unwrap();
    mooring::reset();

    mooring::register::<Crab>().expect("register Crab");
    let err = mooring::register::<Lobster>().expect_err("collection already claimed");
    assert!(matches!(
        err,
        OdmError::Schema(SchemaError::DuplicateModel { .. })
    ));
    mooring::reset();
}
