//! Choosing between implementation variants of one standard position

use crate::usage::{NodeId, UsageTree};
use edi_ir::{EventKind, Location, StreamEvent, TypeReference};
use edi_schema::Discriminator;

/// Whether a candidate with `discriminator` is selected by `value` received
/// at `location`. A candidate without a discriminator always matches.
pub(crate) fn is_match(discriminator: Option<&Discriminator>, value: &str, location: &Location) -> bool {
    discriminator.is_none_or(|d| {
        d.matches(value, location.element_position, location.component_position)
    })
}

/// Point already emitted events at the selected implementation.
///
/// Loop and segment starts are only rewritten when they currently reference
/// the standard type the implementation narrows. Composite and element events
/// are resolved by position within the implementation segment; positions the
/// implementation leaves empty keep their standard reference.
pub(crate) fn update_event_references(
    events: &mut [StreamEvent],
    loop_reference: Option<&TypeReference>,
    tree: &UsageTree,
    segment: NodeId,
) {
    let segment_reference = tree.node(segment).reference();

    for event in events {
        match event.kind {
            EventKind::StartLoop => {
                if let Some(loop_reference) = loop_reference {
                    update_reference_when_matched(event, loop_reference);
                }
            }
            EventKind::StartSegment => update_reference_when_matched(event, segment_reference),
            EventKind::StartComposite | EventKind::EndComposite | EventKind::ElementData => {
                if let Some(reference) = element_reference(tree, segment, &event.location) {
                    event.set_type_reference(reference.clone());
                }
            }
            _ => {}
        }
    }
}

fn update_reference_when_matched(event: &mut StreamEvent, replacement: &TypeReference) {
    let matched = event
        .reference
        .as_ref()
        .is_some_and(|current| current.same_standard_type(replacement));

    if matched {
        event.set_type_reference(replacement.clone());
    }
}

fn element_reference<'a>(tree: &'a UsageTree, segment: NodeId, location: &Location) -> Option<&'a TypeReference> {
    let slot = |parent: NodeId, index: usize| tree.node(parent).children().get(index).copied().flatten();

    let element = slot(segment, location.element_index()?)?;
    let target = match location.component_index() {
        Some(component) => slot(element, component)?,
        None => element,
    };

    Some(tree.node(target).reference())
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::NodeType;
    use edi_schema::{Base, ComplexType, Reference, Schema, SimpleType, TypeImplementation};

    fn overlay() -> (UsageTree, NodeId, NodeId) {
        let schema = Schema::new("t", "1", "TX")
            .with_type(
                ComplexType::new("TX", "TX", NodeType::Transaction)
                    .with_reference(Reference::new("L_N1", 0, 10)),
            )
            .with_type(
                ComplexType::new("L_N1", "N1", NodeType::Loop)
                    .with_reference(Reference::new("N1", 1, 1)),
            )
            .with_type(
                ComplexType::segment("N1")
                    .with_reference(Reference::new("E98", 1, 1))
                    .with_reference(Reference::new("C001", 0, 1))
                    .with_reference(Reference::new("E93", 0, 1)),
            )
            .with_type(
                ComplexType::new("C001", "C001", NodeType::Composite)
                    .with_reference(Reference::new("E93", 1, 1))
                    .with_reference(Reference::new("E93", 0, 1)),
            )
            .with_type(SimpleType::new("E98", "98", Base::Identifier))
            .with_type(SimpleType::new("E93", "93", Base::String))
            .with_implementation(
                TypeImplementation::new(NodeType::Transaction, "TX_I", "TX", 1, 1).with_child(
                    TypeImplementation::new(NodeType::Loop, "N1_ST", "L_N1", 0, 1)
                        .with_discriminator(Discriminator::new(1, 0, ["ST"]))
                        .with_child(
                            TypeImplementation::new(NodeType::Segment, "N1_ST_SEG", "N1", 1, 1)
                                .with_child(TypeImplementation::new(NodeType::Element, "N101_ST", "E98", 1, 1))
                                .with_child(
                                    TypeImplementation::new(NodeType::Composite, "N102_ST", "C001", 0, 1)
                                        .with_unused()
                                        .with_child(TypeImplementation::new(NodeType::Element, "N102_2_ST", "E93", 0, 1)),
                                )
                                .with_unused(),
                        ),
                ),
            );

        let tree = UsageTree::implementation(&schema).unwrap();
        let loop_node = tree.first_child(tree.root().unwrap()).unwrap();
        let segment = tree.first_child(loop_node).unwrap();
        (tree, loop_node, segment)
    }

    fn standard(id: &str, code: &str, node_type: NodeType) -> TypeReference {
        TypeReference::standard(id, code, node_type, 0, 1)
    }

    #[test]
    fn test_is_match() {
        let location = Location::new(1, 1);
        let discriminator = Discriminator::new(1, 0, ["A"]);

        assert!(is_match(Some(&discriminator), "A", &location));
        assert!(!is_match(Some(&discriminator), "B", &location));
        assert!(!is_match(Some(&discriminator), "A", &Location::new(1, 2)));
        assert!(!is_match(Some(&discriminator), "A", &Location::new(1, 1).with_component(1)));
        assert!(is_match(None, "anything", &location));
    }

    #[test]
    fn test_update_event_references() {
        let (tree, loop_node, segment) = overlay();
        let loop_reference = tree.node(loop_node).reference().clone();

        let mut events = vec![
            StreamEvent::new(EventKind::StartLoop, Location::new(1, 0))
                .with_reference(standard("L_N1", "N1", NodeType::Loop)),
            StreamEvent::new(EventKind::StartLoop, Location::new(1, 0))
                .with_reference(standard("L_OTHER", "N9", NodeType::Loop)),
            StreamEvent::new(EventKind::StartSegment, Location::new(1, 0))
                .with_reference(standard("N1", "N1", NodeType::Segment)),
            StreamEvent::element("ST", Location::new(1, 1))
                .with_reference(standard("E98", "98", NodeType::Element)),
            StreamEvent::new(EventKind::StartComposite, Location::new(1, 2))
                .with_reference(standard("C001", "C001", NodeType::Composite)),
            StreamEvent::element("X", Location::new(1, 2).with_component(1))
                .with_reference(standard("E93", "93", NodeType::Element)),
            StreamEvent::element("Y", Location::new(1, 2).with_component(2))
                .with_reference(standard("E93", "93", NodeType::Element)),
            StreamEvent::element("Z", Location::new(1, 3))
                .with_reference(standard("E93", "93", NodeType::Element)),
        ];

        update_event_references(&mut events, Some(&loop_reference), &tree, segment);

        let ids: Vec<&str> = events
            .iter()
            .map(|e| e.reference.as_ref().unwrap().id.as_str())
            .collect();

        assert_eq!(
            ids,
            vec!["N1_ST", "L_OTHER", "N1_ST_SEG", "N101_ST", "N102_ST", "E93", "N102_2_ST", "E93"]
        );
    }

    #[test]
    fn test_segment_only_update_leaves_loops() {
        let (tree, _, segment) = overlay();
        let mut events = vec![
            StreamEvent::new(EventKind::StartLoop, Location::new(1, 0))
                .with_reference(standard("L_N1", "N1", NodeType::Loop)),
        ];

        update_event_references(&mut events, None, &tree, segment);
        assert_eq!(events[0].reference.as_ref().unwrap().id, "L_N1");
    }
}
