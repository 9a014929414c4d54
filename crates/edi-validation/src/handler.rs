//! Sink for validation events

use crate::error::{ErrorCategory, ValidationErrorKind};
use edi_ir::TypeReference;

/// An element-level error together with the position it was found at
#[derive(Debug, Clone, Copy)]
pub struct ElementErrorReport<'a> {
    pub kind: ValidationErrorKind,
    pub reference: Option<&'a TypeReference>,
    /// Raw value, when one was received
    pub data: Option<&'a str>,
    /// 1-based element position within the segment
    pub element_position: u32,
    pub component_position: Option<u32>,
    pub element_occurrence: Option<u32>,
}

impl ElementErrorReport<'_> {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

/// Receives everything the validator finds while walking a document.
///
/// Loop boundaries are reported so that a driver can emit its own loop
/// events; errors carry the schema reference they relate to whenever one is
/// known.
pub trait ValidationEventHandler {
    fn loop_begin(&mut self, reference: &TypeReference);

    fn loop_end(&mut self, reference: &TypeReference);

    fn segment_error(
        &mut self,
        tag: &str,
        reference: Option<&TypeReference>,
        kind: ValidationErrorKind,
    );

    fn element_error(&mut self, error: &ElementErrorReport<'_>);
}
