//! # Mooring
//!
//! An object-document mapper for MongoDB with transparent, lazily
//! resolved references.
//!
//! Mooring provides:
//! - `#[derive(Model)]` binding plain structs to collections
//! - Schema validation and reference-aware shadow schemas
//! - Lazy-loading reference proxies that fetch on first access
//! - Async CRUD operations built on the official MongoDB driver
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mooring::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Model)]
//! pub struct User {
//!     pub id: Option<String>,
//!     pub name: String,
//!     pub manager: LazyRef<User>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mooring::OdmError> {
//!     mooring::init(MongoConfig::from_uri("mongodb://localhost:27017", "mydb")).await?;
//!     mooring::register::<User>()?;
//!
//!     let mut user = User { name: "Alice".into(), ..Default::default() };
//!     user.save().await?;
//!
//!     let manager = user.manager.load().await?;
//!     println!("{}", manager.name);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Schema declaration, validation, and shadow derivation.
pub mod schema {
    pub use mooring_schema::*;
}

/// MongoDB persistence: client, runtime, models, and operations.
pub mod mongodb {
    pub use mooring_mongodb::*;
}

// Re-export proc macros
pub use mooring_derive::Model;

// Re-export key types at the crate root
pub use mooring_mongodb::runtime::{init, is_connected, register, reset, set_client};
pub use mooring_mongodb::{
    Bson, Document, DynRef, LazyRef, Model as ModelTrait, ModelCursor, MongoClient, MongoConfig,
    ObjectId, OdmError, OdmResult, Persist, RefRecord, doc,
};
pub use mooring_schema::{
    FieldType, ModelRegistry, ModelSchema, SchemaError, ShadowSchema, derive_shadow,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Model;
    pub use crate::mongodb::{
        Bson, Document, DynRef, LazyRef, Model as ModelTrait, ModelCursor, MongoClient,
        MongoConfig, ObjectId, OdmError, OdmResult, Persist, RefRecord, doc, runtime,
    };
    pub use crate::schema::{FieldType, ModelSchema, SchemaError};
}

// Support types referenced by the generated derive output. Not public API.
#[doc(hidden)]
pub mod __private {
    pub use mooring_mongodb::{IndexModel, Model};
    pub use mooring_schema::{FieldType, ModelSchema};
}
