#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-schema
//!
//! Schema model, value validation and loader for EDI.
//!
//! A [`Schema`] holds the *standard* structure of a transaction (complex
//! types referencing other types with version-aware cardinalities, plus
//! simple element types) and optionally an *implementation* overlay which
//! narrows the standard and may split one standard position into several
//! discriminated variants.

pub mod implementation;
pub mod loader;
pub mod model;
pub mod registry;
pub mod simple;

pub use implementation::{Discriminator, TypeImplementation};
pub use loader::SchemaLoader;
pub use model::{
    ComplexType, EdiType, Reference, Schema, SyntaxRule, SyntaxRuleKind, VersionRange,
    VersionedOccurs,
};
pub use registry::SchemaRegistry;
pub use simple::{Base, ElementVersion, SimpleType, ValueError};

use thiserror::Error;

/// Errors that can occur when working with schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Type '{type_id}' referenced by '{referenced_by}' is not defined")]
    UnknownType {
        type_id: String,
        referenced_by: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
