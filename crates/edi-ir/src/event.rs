//! Structural stream events produced by a tokenizer
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent setters are designed for chaining.

use crate::location::Location;
use crate::reference::TypeReference;
use serde::{Deserialize, Serialize};

/// Kinds of structural events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A loop (segment group) begins
    StartLoop,

    /// A loop ends
    EndLoop,

    /// A segment begins
    StartSegment,

    /// A segment ends
    EndSegment,

    /// A composite element begins
    StartComposite,

    /// A composite element ends
    EndComposite,

    /// Simple element or component data
    ElementData,

    /// Binary element data
    ElementDataBinary,

    /// An implementation variant was selected for the current position
    ImplementationSelected,
}

/// One event of the tokenized stream.
///
/// The `reference` slot holds the schema definition the event was matched
/// against. Consumers may overwrite it after the fact, e.g. once an
/// implementation variant has been discriminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event kind
    pub kind: EventKind,

    /// Raw token (tag for segments, value for element data)
    pub data: Option<String>,

    /// Position of the event
    pub location: Location,

    /// Resolved type reference
    pub reference: Option<TypeReference>,
}

impl StreamEvent {
    /// Create an event without data or reference
    pub fn new(kind: EventKind, location: Location) -> Self {
        Self {
            kind,
            data: None,
            location,
            reference: None,
        }
    }

    /// Create an element data event
    pub fn element(value: impl Into<String>, location: Location) -> Self {
        Self::new(EventKind::ElementData, location).with_data(value)
    }

    /// Attach raw data
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Attach a type reference
    pub fn with_reference(mut self, reference: TypeReference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Raw data as a string slice, empty when absent
    pub fn data_str(&self) -> &str {
        self.data.as_deref().unwrap_or_default()
    }

    /// Code of the currently resolved reference
    pub fn reference_code(&self) -> Option<&str> {
        self.reference.as_ref().map(|r| r.code.as_str())
    }

    /// Replace the resolved reference
    pub fn set_type_reference(&mut self, reference: TypeReference) {
        self.reference = Some(reference);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;

    #[test]
    fn test_element_event() {
        let event = StreamEvent::element("ST", Location::new(3, 1));
        assert_eq!(event.kind, EventKind::ElementData);
        assert_eq!(event.data_str(), "ST");
        assert!(event.reference.is_none());
        assert_eq!(event.reference_code(), None);
    }

    #[test]
    fn test_reference_overwrite() {
        let standard = TypeReference::standard("N1", "N1", NodeType::Segment, 0, 1);
        let overlay =
            TypeReference::implementation("N1_ST", "N1", "N1", NodeType::Segment, 1, 1);

        let mut event = StreamEvent::new(EventKind::StartSegment, Location::new(3, 0))
            .with_data("N1")
            .with_reference(standard);
        assert_eq!(event.reference_code(), Some("N1"));

        event.set_type_reference(overlay.clone());
        assert_eq!(event.reference, Some(overlay));
    }

    #[test]
    fn test_missing_data_is_empty() {
        let event = StreamEvent::new(EventKind::EndSegment, Location::default());
        assert_eq!(event.data_str(), "");
    }
}
