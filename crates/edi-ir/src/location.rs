//! Positions of stream events within a document
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent setters are designed for chaining.

use serde::{Deserialize, Serialize};

/// Location of an event within the document being validated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Segment number within the document (1-indexed)
    pub segment_position: u32,

    /// Tag of the current segment
    pub segment_tag: Option<String>,

    /// Element position within the segment (1-indexed, 0 before the first element)
    pub element_position: u32,

    /// Repetition of the element (1-indexed)
    pub element_occurrence: Option<u32>,

    /// Component position within a composite (1-indexed)
    pub component_position: Option<u32>,
}

impl Location {
    /// Location of a segment's first element
    pub fn new(segment_position: u32, element_position: u32) -> Self {
        Self {
            segment_position,
            segment_tag: None,
            element_position,
            element_occurrence: Some(1),
            component_position: None,
        }
    }

    /// Set the segment tag
    pub fn with_segment_tag(mut self, tag: impl Into<String>) -> Self {
        self.segment_tag = Some(tag.into());
        self
    }

    /// Set the component position
    pub fn with_component(mut self, component_position: u32) -> Self {
        self.component_position = Some(component_position);
        self
    }

    /// Set the repetition of the element
    pub fn with_occurrence(mut self, occurrence: u32) -> Self {
        self.element_occurrence = Some(occurrence);
        self
    }

    /// Advance to the next element, leaving any composite
    pub fn increment_element_position(&mut self) {
        self.element_position += 1;
        self.element_occurrence = Some(1);
        self.component_position = None;
    }

    /// Advance to the next component of the current composite
    pub fn increment_component_position(&mut self) {
        self.component_position = Some(self.component_position.map_or(1, |c| c + 1));
    }

    /// Zero-based element index, `None` before the first element
    pub fn element_index(&self) -> Option<usize> {
        (self.element_position as usize).checked_sub(1)
    }

    /// Zero-based component index, `None` outside a composite
    pub fn component_index(&self) -> Option<usize> {
        self.component_position
            .and_then(|c| (c as usize).checked_sub(1))
    }
}
