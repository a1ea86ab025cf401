//! Field-type model for declared schemas.
//!
//! A [`FieldType`] describes the declared shape of a single model field:
//! scalars, optionals, unions, parametrized containers, literal sets, and
//! references to other declared models. The three introspection operations
//! ([`FieldType::leaves`], [`FieldType::rebuild`], [`FieldType::contains`])
//! compose losslessly: rebuilding with the identity transform reproduces the
//! original type for every supported shape.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A literal value usable inside [`FieldType::Literal`].
///
/// Only primitive literal values are representable; a literal set of any
/// other kind is not a declarable type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// A boolean literal.
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A string literal.
    Str(SmolStr),
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "{:?}", v.as_str()),
        }
    }
}

/// The declared type of a model field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// Boolean scalar.
    Bool,
    /// Integer scalar.
    Int,
    /// Floating-point scalar.
    Float,
    /// String scalar.
    String,
    /// Calendar date or datetime scalar.
    Date,
    /// The null type (unit).
    Null,
    /// A homogeneous sequence.
    List(Box<FieldType>),
    /// A string-keyed mapping with homogeneous values.
    Map(Box<FieldType>),
    /// A fixed-arity heterogeneous sequence.
    Tuple(Vec<FieldType>),
    /// An optional value (shorthand for a union with [`FieldType::Null`]).
    Optional(Box<FieldType>),
    /// A union of alternatives.
    Union(Vec<FieldType>),
    /// A closed set of primitive literal values.
    Literal(Vec<LiteralValue>),
    /// A reference to another declared model, by model name.
    Model(SmolStr),
    /// A forward reference that has not been resolved yet.
    ///
    /// Produced when a declaration names a model that is not known at the
    /// time the schema is built; upgraded to [`FieldType::Model`] by the
    /// registry once the named model registers.
    Unresolved(SmolStr),
    /// A reference-record leaf. Appears only in shadow schemas.
    Reference,
    /// A type outside the supported set (rejected at registration).
    Unsupported(SmolStr),
}

impl FieldType {
    /// Shorthand for a list of `inner`.
    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    /// Shorthand for a string-keyed map of `inner`.
    pub fn map(inner: FieldType) -> Self {
        Self::Map(Box::new(inner))
    }

    /// Shorthand for an optional `inner`.
    pub fn optional(inner: FieldType) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Shorthand for a model reference.
    pub fn model(name: impl Into<SmolStr>) -> Self {
        Self::Model(name.into())
    }

    /// Shorthand for an unresolved forward reference.
    pub fn unresolved(name: impl Into<SmolStr>) -> Self {
        Self::Unresolved(name.into())
    }

    /// Shorthand for an unsupported type with its source-level name.
    pub fn unsupported(name: impl Into<SmolStr>) -> Self {
        Self::Unsupported(name.into())
    }

    /// Check if this is a model-reference leaf (resolved or not).
    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_) | Self::Unresolved(_))
    }

    /// Check if this is an unsupported leaf.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Decompose into leaf types.
    ///
    /// Containers yield the leaves of their arguments, optionals and unions
    /// the leaves of each alternative, and plain types themselves as the
    /// single leaf.
    pub fn leaves(&self) -> Vec<&FieldType> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a FieldType>) {
        match self {
            Self::List(inner) | Self::Map(inner) | Self::Optional(inner) => {
                inner.collect_leaves(out);
            }
            Self::Tuple(items) | Self::Union(items) => {
                for item in items {
                    item.collect_leaves(out);
                }
            }
            leaf => out.push(leaf),
        }
    }

    /// Rebuild the same container/optional/union shape, substituting each
    /// leaf via `transform`.
    ///
    /// `rebuild` with a transform that clones its input is the identity.
    pub fn rebuild<F>(&self, transform: &F) -> FieldType
    where
        F: Fn(&FieldType) -> FieldType,
    {
        match self {
            Self::List(inner) => Self::List(Box::new(inner.rebuild(transform))),
            Self::Map(inner) => Self::Map(Box::new(inner.rebuild(transform))),
            Self::Optional(inner) => Self::Optional(Box::new(inner.rebuild(transform))),
            Self::Tuple(items) => Self::Tuple(items.iter().map(|t| t.rebuild(transform)).collect()),
            Self::Union(items) => Self::Union(items.iter().map(|t| t.rebuild(transform)).collect()),
            leaf => transform(leaf),
        }
    }

    /// Check whether any leaf satisfies `predicate`.
    pub fn contains<F>(&self, predicate: &F) -> bool
    where
        F: Fn(&FieldType) -> bool,
    {
        self.leaves().into_iter().any(predicate)
    }

    /// Get a human-readable name for the type.
    pub fn type_name(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Date => write!(f, "date"),
            Self::Null => write!(f, "null"),
            Self::List(inner) => write!(f, "list<{}>", inner),
            Self::Map(inner) => write!(f, "map<string, {}>", inner),
            Self::Tuple(items) => {
                write!(f, "tuple<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ">")
            }
            Self::Optional(inner) => write!(f, "optional<{}>", inner),
            Self::Union(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Self::Literal(values) => {
                write!(f, "literal[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Self::Model(name) => write!(f, "model {}", name),
            Self::Unresolved(name) => write!(f, "unresolved {}", name),
            Self::Reference => write!(f, "reference"),
            Self::Unsupported(name) => write!(f, "unsupported {}", name),
        }
    }
}
