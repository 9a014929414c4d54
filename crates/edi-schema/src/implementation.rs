//! Implementation overlay definitions
//!
//! An implementation narrows the standard structure of a transaction. Its
//! sequences mirror the standard references position by position; `None`
//! marks a standard position the implementation does not use. Several
//! consecutive implementation nodes may narrow the same standard reference, in
//! which case each carries a [`Discriminator`] used to tell them apart.
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent builders return Self for chaining.

use edi_ir::NodeType;
use std::collections::BTreeSet;

/// Selects one implementation variant from the value found at a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    /// 1-based element position within the segment
    pub element_position: u32,
    /// 1-based component position, 0 when the element is not a composite
    pub component_position: u32,
    pub values: BTreeSet<String>,
}

/// One node of an implementation overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeImplementation {
    pub id: String,
    /// Identifier of the standard type being narrowed
    pub type_id: String,
    pub node_type: NodeType,
    pub min_occurs: u32,
    pub max_occurs: u32,
    pub discriminator: Option<Discriminator>,
    pub sequence: Vec<Option<TypeImplementation>>,
    /// Narrowed code list (elements only, empty = unrestricted)
    pub values: BTreeSet<String>,
    pub title: Option<String>,
}

impl Discriminator {
    pub fn new<I, S>(element_position: u32, component_position: u32, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            element_position,
            component_position,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Component position, `None` when discriminating on a simple element
    pub fn component(&self) -> Option<u32> {
        (self.component_position > 0).then_some(self.component_position)
    }

    /// Whether `value` received at the given position selects this variant
    pub fn matches(&self, value: &str, element_position: u32, component_position: Option<u32>) -> bool {
        self.values.contains(value)
            && self.element_position == element_position
            && self.component() == component_position
    }
}

impl TypeImplementation {
    pub fn new(
        node_type: NodeType,
        id: impl Into<String>,
        type_id: impl Into<String>,
        min_occurs: u32,
        max_occurs: u32,
    ) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            node_type,
            min_occurs,
            max_occurs,
            discriminator: None,
            sequence: Vec::new(),
            values: BTreeSet::new(),
            title: None,
        }
    }

    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    /// Append a child implementation
    pub fn with_child(mut self, child: TypeImplementation) -> Self {
        self.sequence.push(Some(child));
        self
    }

    /// Append a placeholder for an unused standard position
    pub fn with_unused(mut self) -> Self {
        self.sequence.push(None);
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator_on_simple_element() {
        let discr = Discriminator::new(1, 0, ["ST", "BT"]);
        assert_eq!(discr.component(), None);
        assert!(discr.matches("ST", 1, None));
        assert!(!discr.matches("ST", 2, None));
        assert!(!discr.matches("ST", 1, Some(1)));
        assert!(!discr.matches("SF", 1, None));
    }

    #[test]
    fn test_discriminator_on_component() {
        let discr = Discriminator::new(3, 2, ["ZZ"]);
        assert_eq!(discr.component(), Some(2));
        assert!(discr.matches("ZZ", 3, Some(2)));
        assert!(!discr.matches("ZZ", 3, None));
    }

    #[test]
    fn test_sequence_placeholders() {
        let segment = TypeImplementation::new(NodeType::Segment, "N1_ST", "N1", 1, 1)
            .with_child(
                TypeImplementation::new(NodeType::Element, "N101_ST", "E98", 1, 1)
                    .with_values(["ST"]),
            )
            .with_unused()
            .with_discriminator(Discriminator::new(1, 0, ["ST"]))
            .with_title("Ship To");

        assert_eq!(segment.sequence.len(), 2);
        assert!(segment.sequence[1].is_none());
        assert_eq!(segment.title.as_deref(), Some("Ship To"));
        let element = segment.sequence[0].as_ref().unwrap();
        assert!(element.values.contains("ST"));
    }
}
