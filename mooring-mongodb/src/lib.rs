//! # mooring-mongodb
//!
//! MongoDB persistence for mooring's declared models.
//!
//! This crate provides:
//! - Connection management with the official MongoDB driver
//! - A process-wide runtime holding the client and the model registry
//! - The [`Model`] trait binding a declared schema to a collection
//! - CRUD operations through the [`Persist`] blanket impl
//! - Lazy-loading reference proxies and reference record plumbing
//! - Structural document walks for reference collection and rewriting
//!
//! ## Example
//!
//! ```rust,ignore
//! use mooring_mongodb::{runtime, MongoConfig, Persist};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     runtime::init(MongoConfig::from_uri(
//!         "mongodb://localhost:27017",
//!         "mydb",
//!     ))
//!     .await?;
//!     runtime::register::<User>()?;
//!
//!     let mut user = User { id: None, name: "Alice".into() };
//!     user.save().await?;
//!
//!     let found = User::get_by_id(user.id.as_deref().unwrap()).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod lazy;
pub mod model;
pub mod ops;
pub mod refs;
pub mod resolve;
pub mod runtime;
pub mod walker;

pub use bson::oid::ObjectId;
pub use bson::{Bson, Document, doc};
pub use client::MongoClient;
pub use mongodb::IndexModel;
pub use config::{MongoConfig, MongoConfigBuilder};
pub use error::{OdmError, OdmResult};
pub use lazy::{DynRef, LazyRef};
pub use model::Model;
pub use ops::{ModelCursor, Persist};
pub use refs::{RefRecord, REF_FIELDS};
pub use resolve::{
    from_document_lenient, from_document_strict, from_document_with_refs, normalize_document,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::MongoClient;
    pub use crate::config::{MongoConfig, MongoConfigBuilder};
    pub use crate::error::{OdmError, OdmResult};
    pub use crate::lazy::{DynRef, LazyRef};
    pub use crate::model::Model;
    pub use crate::ops::{ModelCursor, Persist};
    pub use crate::refs::RefRecord;
    pub use crate::runtime;
    pub use bson::oid::ObjectId;
    pub use bson::{Bson, Document, doc};
}
