//! Validation reporter
//!
//! [`ValidationReporter`] is a ready-made [`ValidationEventHandler`] that
//! collects every error and loop boundary into a [`ValidationReport`].

use crate::error::{ErrorCategory, ValidationErrorKind};
use crate::handler::{ElementErrorReport, ValidationEventHandler};
use edi_ir::TypeReference;
use serde::Serialize;

/// One reported violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Error kind
    pub kind: ValidationErrorKind,
    /// Category of the kind
    pub category: ErrorCategory,
    /// Segment tag for segment errors, element code otherwise
    pub code: Option<String>,
    /// Id of the schema definition the error relates to
    pub reference_id: Option<String>,
    /// Element position (element errors only)
    pub element_position: Option<u32>,
    /// Component position (element errors only)
    pub component_position: Option<u32>,
    /// Element repetition (element errors only)
    pub element_occurrence: Option<u32>,
    /// Offending value, when one was received
    pub data: Option<String>,
}

impl ValidationIssue {
    /// Whether this is a segment-level issue
    #[must_use]
    pub fn is_segment_error(&self) -> bool {
        self.category == ErrorCategory::SegmentError
    }
}

/// Loop boundary reported by the validator, with the loop reference id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoopMarker {
    Begin(String),
    End(String),
}

/// Everything collected for one document
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Issues in the order they were reported
    pub issues: Vec<ValidationIssue>,
    /// Loop boundaries in the order they were reported
    pub loops: Vec<LoopMarker>,
}

impl ValidationReport {
    /// Check if there are any errors
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Number of issues of the given kind
    #[must_use]
    pub fn count(&self, kind: ValidationErrorKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    /// Kinds of all issues, in order
    #[must_use]
    pub fn kinds(&self) -> Vec<ValidationErrorKind> {
        self.issues.iter().map(|i| i.kind).collect()
    }

    pub fn segment_errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_segment_error())
    }

    pub fn element_errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_segment_error())
    }

    #[must_use]
    pub fn loop_begins(&self) -> usize {
        self.loops
            .iter()
            .filter(|m| matches!(m, LoopMarker::Begin(_)))
            .count()
    }

    #[must_use]
    pub fn loop_ends(&self) -> usize {
        self.loops
            .iter()
            .filter(|m| matches!(m, LoopMarker::End(_)))
            .count()
    }

    /// Render the report as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Collects validation events into a [`ValidationReport`]
#[derive(Debug, Default)]
pub struct ValidationReporter {
    report: ValidationReport,
}

impl ValidationReporter {
    /// Create a new validation reporter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    #[must_use]
    pub fn into_report(self) -> ValidationReport {
        self.report
    }

    /// Forget everything collected so far, for the next document
    pub fn clear(&mut self) {
        self.report.issues.clear();
        self.report.loops.clear();
    }
}

impl ValidationEventHandler for ValidationReporter {
    fn loop_begin(&mut self, reference: &TypeReference) {
        self.report.loops.push(LoopMarker::Begin(reference.id.clone()));
    }

    fn loop_end(&mut self, reference: &TypeReference) {
        self.report.loops.push(LoopMarker::End(reference.id.clone()));
    }

    fn segment_error(
        &mut self,
        tag: &str,
        reference: Option<&TypeReference>,
        kind: ValidationErrorKind,
    ) {
        self.report.issues.push(ValidationIssue {
            kind,
            category: kind.category(),
            code: Some(tag.to_string()),
            reference_id: reference.map(|r| r.id.clone()),
            element_position: None,
            component_position: None,
            element_occurrence: None,
            data: None,
        });
    }

    fn element_error(&mut self, error: &ElementErrorReport<'_>) {
        self.report.issues.push(ValidationIssue {
            kind: error.kind,
            category: error.category(),
            code: error.reference.map(|r| r.code.clone()),
            reference_id: error.reference.map(|r| r.id.clone()),
            element_position: Some(error.element_position),
            component_position: error.component_position,
            element_occurrence: error.element_occurrence,
            data: error.data.map(str::to_string),
        });
    }
}
