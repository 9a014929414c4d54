#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-validation
//!
//! Streaming validation of tokenized EDI segments.
//!
//! A [`Validator`] is built once from a [`Schema`](edi_schema::Schema) and then
//! fed one call per structural event of a document, in document order:
//!
//! - [`Validator::validate_segment`] for every segment tag,
//! - [`Validator::valid_composite_occurrences`] at every composite start,
//! - [`Validator::validate_element`] for every element or component value,
//! - [`Validator::validate_syntax`] at every segment and composite end.
//!
//! Problems found in the document are never returned as errors. They are
//! reported through a [`ValidationEventHandler`], such as the collecting
//! [`ValidationReporter`].
//!
//! ## Example Usage
//!
//! ```rust
//! use edi_ir::Location;
//! use edi_schema::{Base, ComplexType, Reference, Schema, SimpleType};
//! use edi_ir::NodeType;
//! use edi_validation::{TransactionDialect, ValidationConfig, ValidationReporter, Validator};
//! use std::sync::Arc;
//!
//! let schema = Schema::new("TEST", "1", "TX")
//!     .with_type(
//!         ComplexType::new("TX", "TX", NodeType::Transaction)
//!             .with_reference(Reference::new("BEG", 1, 1)),
//!     )
//!     .with_type(ComplexType::segment("BEG").with_reference(Reference::new("E353", 1, 1)))
//!     .with_type(SimpleType::new("E353", "353", Base::Identifier).with_values(["00"]));
//!
//! let mut validator = Validator::new(Arc::new(schema), None, ValidationConfig::default()).unwrap();
//! let mut reporter = ValidationReporter::new();
//! let dialect = TransactionDialect::new("1");
//!
//! validator.validate_segment(&mut reporter, "BEG");
//! assert!(validator.validate_element(&dialect, &Location::new(1, 1), Some("00")));
//! validator.validate_syntax(&dialect, &mut reporter, &Location::new(1, 1), false);
//! assert!(!reporter.report().has_errors());
//! ```

pub mod config;
mod cursor;
pub mod dialect;
pub mod error;
pub mod handler;
pub mod reporter;
mod revalidation;
mod selection;
pub mod syntax;
pub mod usage;
pub mod validator;

pub use config::ValidationConfig;
pub use dialect::{Dialect, TransactionDialect};
pub use error::{ErrorCategory, UsageError, ValidationErrorKind};
pub use handler::{ElementErrorReport, ValidationEventHandler};
pub use reporter::{LoopMarker, ValidationIssue, ValidationReport, ValidationReporter};
pub use usage::{NodeId, UsageNode, UsageTree};
pub use validator::Validator;

use thiserror::Error;

/// Errors that prevent validation from running at all
#[derive(Error, Debug)]
pub enum Error {
    /// The schema graph cannot be turned into usage trees
    #[error("Malformed schema: {0}")]
    MalformedSchema(String),

    /// The caller passed a position that makes no sense at this point
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Schema error: {0}")]
    Schema(#[from] edi_schema::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
