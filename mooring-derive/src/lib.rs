//! # mooring-derive
//!
//! Derive macros for mooring declared models.
//!
//! `#[derive(Model)]` turns a plain struct into a declared model: it
//! derives the schema from the struct's fields, wires the identifier
//! accessors, and maps the struct to a collection.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mooring::prelude::*;
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Model)]
//! #[model(collection = "accounts")]
//! struct User {
//!     id: Option<String>,
//!     name: String,
//!     signed_up: chrono::DateTime<chrono::Utc>,
//!     manager: LazyRef<User>,
//! }
//! ```
//!
//! Attributes:
//! - `#[model(collection = "...")]` overrides the derived collection name
//! - `#[model(indexes = "path::to::fn")]` names a function returning the
//!   collection's index specifications
//! - `#[model(id)]` marks the identifier field when it is not named `id`

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod model;

/// Derive the `Model` trait for a struct with named fields.
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match model::derive_model_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
