//! Streaming segment, element and syntax validation
//!
//! The [`Validator`] walks the standard usage tree and the optional
//! implementation tree in lockstep with the segments of a document. Segment
//! level errors are buffered while the matcher searches for the position of a
//! segment and are only reported once the search commits, so that positions
//! a misplaced segment never occupied do not produce spurious errors.

use crate::config::ValidationConfig;
use crate::cursor::Cursor;
use crate::dialect::Dialect;
use crate::error::{UsageError, ValidationErrorKind};
use crate::handler::{ElementErrorReport, ValidationEventHandler};
use crate::revalidation::{RevalidationEntry, RevalidationQueue};
use crate::selection;
use crate::syntax::{self, SyntaxScope};
use crate::usage::{NodeId, SEGMENT_VERSION, UsageTree};
use crate::{Error, Result};
use edi_ir::{EventKind, Location, NodeType, StreamEvent, TypeReference};
use edi_schema::{Base, Schema, SchemaLoader};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, trace};

/// An open loop, with the implementation loop when one was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoopEntry {
    standard: NodeId,
    implementation: Option<NodeId>,
}

/// Validates one document at a time against a schema.
///
/// Build one validator per schema and thread; use [`Validator::reset`] to
/// reuse it for the next document.
#[derive(Debug)]
pub struct Validator {
    schema: Arc<Schema>,
    container: Option<Arc<Schema>>,
    config: ValidationConfig,
    initial: bool,

    standard: UsageTree,
    implementation: UsageTree,

    segment_expected: bool,
    segment: NodeId,
    correct_segment: NodeId,
    composite: Option<NodeId>,
    element: Option<NodeId>,
    revalidation: RevalidationQueue,

    impl_segment_selected: bool,
    impl_node: Option<NodeId>,
    impl_composite: Option<NodeId>,
    impl_element: Option<NodeId>,
    impl_candidates: Vec<NodeId>,

    loop_stack: Vec<LoopEntry>,
    use_errors: Vec<UsageError>,
    element_errors: Vec<UsageError>,

    depth: u32,
    cursor: Cursor,
}

impl Validator {
    /// Build the usage trees for `schema`.
    ///
    /// `container` is the schema of the envelope around the transaction; a
    /// segment it defines ends the transaction instead of being reported as
    /// unexpected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSchema`] when the schema graph cannot be
    /// turned into usage trees.
    pub fn new(
        schema: Arc<Schema>,
        container: Option<Arc<Schema>>,
        config: ValidationConfig,
    ) -> Result<Self> {
        trace!("Creating usage trees for {}", schema.qualified_name());
        let standard = UsageTree::standard(&schema)?;
        let implementation = UsageTree::implementation(&schema)?;

        let first_segment = standard
            .root()
            .and_then(|root| standard.first_child(root))
            .ok_or_else(|| {
                Error::MalformedSchema(format!(
                    "standard type '{}' has no children",
                    schema.standard_id()
                ))
            })?;
        let first_impl = implementation
            .root()
            .and_then(|root| implementation.first_child(root));

        Ok(Self {
            schema,
            container,
            config,
            initial: true,
            standard,
            implementation,
            segment_expected: false,
            segment: first_segment,
            correct_segment: first_segment,
            composite: None,
            element: None,
            revalidation: RevalidationQueue::default(),
            impl_segment_selected: false,
            impl_node: first_impl,
            impl_composite: None,
            impl_element: None,
            impl_candidates: Vec::new(),
            loop_stack: Vec::new(),
            use_errors: Vec::new(),
            element_errors: Vec::with_capacity(5),
            depth: 1,
            cursor: Cursor::new(first_segment, first_impl),
        })
    }

    /// Load `name`/`version` through `loader` and build a validator for it
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] when the schema cannot be loaded, or any
    /// error of [`Validator::new`].
    pub fn from_loader(
        loader: &SchemaLoader,
        name: &str,
        version: &str,
        config: ValidationConfig,
    ) -> Result<Self> {
        let schema = loader.load(name, version)?;
        Self::new(schema, None, config)
    }

    /// Set the schema of the envelope around the transaction
    #[must_use]
    pub fn with_container(mut self, container: Arc<Schema>) -> Self {
        self.container = Some(container);
        self
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Return to the state of a freshly built validator, keeping the trees
    pub fn reset(&mut self) {
        if self.initial {
            return;
        }

        self.standard.reset();
        self.implementation.reset();

        if let Some(first) = self.standard.root().and_then(|r| self.standard.first_child(r)) {
            self.segment = first;
            self.correct_segment = first;
        }
        self.impl_node = self
            .implementation
            .root()
            .and_then(|r| self.implementation.first_child(r));

        self.cursor = Cursor::new(self.segment, self.impl_node);
        self.depth = 1;

        self.segment_expected = false;
        self.composite = None;
        self.element = None;

        self.impl_segment_selected = false;
        self.impl_composite = None;
        self.impl_element = None;

        self.impl_candidates.clear();
        self.loop_stack.clear();
        self.use_errors.clear();
        self.element_errors.clear();
        self.revalidation.clear();
        self.initial = true;
    }

    /// Whether several implementation variants still compete for the current
    /// segment
    #[must_use]
    pub fn is_pending_discrimination(&self) -> bool {
        !self.impl_candidates.is_empty()
    }

    /// Current loop depth, 1 at transaction level
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of loops currently open
    #[must_use]
    pub fn open_loops(&self) -> usize {
        self.loop_stack.len()
    }

    /// Usage counts of the standard tree followed by the implementation tree
    #[must_use]
    pub fn usage_counts(&self) -> Vec<u32> {
        let mut counts = self.standard.usage_counts();
        counts.extend(self.implementation.usage_counts());
        counts
    }

    /// Number of values waiting for the transaction version
    #[must_use]
    pub fn pending_revalidations(&self) -> usize {
        self.revalidation.len()
    }

    /// Reference of the current segment, the implementation segment once one
    /// is selected
    #[must_use]
    pub fn segment_reference(&self) -> &TypeReference {
        match self.impl_node {
            Some(node) if self.impl_segment_selected => self.implementation.node(node).reference(),
            _ => self.standard.node(self.segment).reference(),
        }
    }

    #[must_use]
    pub fn composite_reference(&self) -> Option<&TypeReference> {
        match (self.impl_composite, self.composite) {
            (Some(node), _) if self.impl_segment_selected => {
                Some(self.implementation.node(node).reference())
            }
            (_, Some(node)) => Some(self.standard.node(node).reference()),
            _ => None,
        }
    }

    #[must_use]
    pub fn element_reference(&self) -> Option<&TypeReference> {
        match (self.impl_element, self.element) {
            (Some(node), _) if self.impl_segment_selected => {
                Some(self.implementation.node(node).reference())
            }
            (_, Some(node)) => Some(self.standard.node(node).reference()),
            _ => None,
        }
    }

    /// Whether the last element validated is a composite
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.composite.is_some()
    }

    /// Whether the current element gives the length of a following binary
    /// element
    #[must_use]
    pub fn is_binary_element_length(&self) -> bool {
        let Some(next) = self.element.and_then(|e| self.standard.next_sibling(e)) else {
            return false;
        };
        let next = self.standard.node(next);

        next.node_type() == NodeType::Element
            && self
                .schema
                .simple_type(&next.reference().type_id)
                .is_some_and(|simple| simple.base == Base::Binary)
    }

    /// Errors found by the last element or composite validation
    #[must_use]
    pub fn element_errors(&self) -> &[UsageError] {
        &self.element_errors
    }

    /// Report the errors of the last element or composite validation
    pub fn report_element_errors(
        &self,
        handler: &mut dyn ValidationEventHandler,
        location: &Location,
        data: Option<&str>,
    ) {
        for error in &self.element_errors {
            handler.element_error(&ElementErrorReport {
                kind: error.kind,
                reference: error.reference.as_ref(),
                data,
                element_position: location.element_position,
                component_position: location.component_position,
                element_occurrence: location.element_occurrence,
            });
        }
    }

    /// Match the next segment of the document.
    ///
    /// On return the validator is positioned at the accepted segment (or left
    /// where it was for a segment that fits nowhere) and every error owed to
    /// positions passed over has been reported.
    pub fn validate_segment(&mut self, handler: &mut dyn ValidationEventHandler, tag: &str) {
        self.initial = false;
        self.segment_expected = true;
        self.impl_segment_selected = false;
        self.impl_candidates.clear();

        let start_depth = self.depth;
        self.cursor = Cursor::new(self.correct_segment, self.impl_node);

        // Version specific validation must be complete by the end of a segment
        self.revalidation.clear();
        self.use_errors.clear();

        let mut handled = false;
        let mut first_attempt = true;

        while !handled {
            handled = self.handle_node(handler, tag, start_depth, first_attempt);
            first_attempt = false;

            if !handled {
                let current = self.cursor.standard;
                self.check_minimum_usage(current, false);
                let next_impl = self.check_minimum_impl_usage(self.cursor.implementation, current);

                if self.cursor.has_next_sibling(&self.standard) {
                    self.cursor.next(&self.standard, next_impl);
                } else {
                    handled = self.check_peer_segments(handler, tag, current, start_depth)
                        || self.check_parents(handler, tag, start_depth);
                }
            }
        }

        self.flush_usage_errors(handler);
    }

    fn handle_node(
        &mut self,
        handler: &mut dyn ValidationEventHandler,
        tag: &str,
        start_depth: u32,
        first_attempt: bool,
    ) -> bool {
        let current = self.cursor.standard;
        let current_impl = self.cursor.implementation;

        match self.standard.node(current).node_type() {
            NodeType::Segment => {
                self.handle_segment(handler, tag, current, current_impl, start_depth, first_attempt)
            }
            NodeType::Group | NodeType::Transaction | NodeType::Loop => {
                self.handle_loop(handler, tag, current, current_impl, start_depth)
            }
            NodeType::Composite | NodeType::Element => false,
        }
    }

    fn handle_segment(
        &mut self,
        handler: &mut dyn ValidationEventHandler,
        tag: &str,
        current: NodeId,
        current_impl: Option<NodeId>,
        start_depth: u32,
        first_attempt: bool,
    ) -> bool {
        let node = self.standard.node(current);
        if node.code() != tag {
            return false;
        }

        if node.is_used() && node.is_first_child() && self.is_nested_loop(node.parent()) {
            // Only the anchor of the previous loop occurrence was present.
            // Complete the loop instead of starting another occurrence here;
            // the parent loop node will start it.
            debug_assert!(
                first_attempt,
                "loop anchor '{tag}' repeated away from the last accepted segment"
            );
            return false;
        }

        self.complete_loops(handler, start_depth);
        self.standard.increment_usage(current);
        self.standard.reset_children(current);

        if self.standard.exceeds_maximum_usage(current, SEGMENT_VERSION) {
            self.flush_usage_errors(handler);
            handler.segment_error(
                tag,
                Some(self.standard.node(current).reference()),
                ValidationErrorKind::SegmentExceedsMaximumUse,
            );
        }

        self.correct_segment = current;
        self.segment = current;
        trace!(tag, depth = self.depth, "Accepted segment");

        if let Some(current_impl) = current_impl {
            self.collect_candidates(current_impl, current);

            match self.impl_candidates.len() {
                0 => {
                    self.flush_usage_errors(handler);
                    handler.segment_error(
                        tag,
                        Some(self.standard.node(current).reference()),
                        ValidationErrorKind::ImplementationUnusedSegmentPresent,
                    );
                    // Resume the implementation search from here
                    self.impl_node = Some(current_impl);
                }
                1 => {
                    self.implementation.increment_usage(current_impl);
                    self.implementation.reset_children(current_impl);

                    if self
                        .implementation
                        .exceeds_maximum_usage(current_impl, SEGMENT_VERSION)
                    {
                        handler.segment_error(
                            tag,
                            Some(self.standard.node(current).reference()),
                            ValidationErrorKind::SegmentExceedsMaximumUse,
                        );
                    }

                    self.impl_node = Some(current_impl);
                    self.impl_candidates.clear();
                    self.impl_segment_selected = true;
                }
                _ => {}
            }
        }

        true
    }

    fn handle_loop(
        &mut self,
        handler: &mut dyn ValidationEventHandler,
        tag: &str,
        current: NodeId,
        current_impl: Option<NodeId>,
        start_depth: u32,
    ) -> bool {
        let starts_loop = self
            .standard
            .first_child(current)
            .is_some_and(|first| self.standard.node(first).code() == tag);

        if !starts_loop {
            return false;
        }

        self.complete_loops(handler, start_depth);
        let mut impl_unused_segment = false;

        if let Some(current_impl) = current_impl {
            self.collect_candidates(current_impl, current);

            match self.impl_candidates.len() {
                0 => {
                    impl_unused_segment = true;
                    self.impl_node = Some(current_impl);
                }
                1 => {
                    if let Some(impl_segment) = self.implementation.first_child(current_impl) {
                        self.handle_implementation_selected(handler, current_impl, impl_segment);
                    }
                }
                _ => {}
            }
        }

        let entry = LoopEntry {
            standard: current,
            implementation: current_impl.filter(|_| self.impl_segment_selected),
        };
        self.loop_stack.push(entry);
        handler.loop_begin(self.loop_reference(entry));
        debug!(loop_code = self.standard.node(current).code(), "Loop started");

        let segment = self.start_loop(current);
        self.correct_segment = segment;
        self.segment = segment;

        if self.standard.exceeds_maximum_usage(current, SEGMENT_VERSION) {
            self.flush_usage_errors(handler);
            handler.segment_error(
                tag,
                Some(self.standard.node(current).reference()),
                ValidationErrorKind::LoopOccursOverMaximumTimes,
            );
        }

        if impl_unused_segment {
            self.flush_usage_errors(handler);
            handler.segment_error(
                tag,
                Some(self.standard.node(segment).reference()),
                ValidationErrorKind::ImplementationUnusedSegmentPresent,
            );
        }

        true
    }

    /// Start a new occurrence of `loop_node`, returning its anchor segment
    fn start_loop(&mut self, loop_node: NodeId) -> NodeId {
        self.standard.increment_usage(loop_node);
        self.standard.reset_children(loop_node);

        let anchor = self.standard.first_child(loop_node).unwrap_or(loop_node);
        self.standard.reset_node(anchor);
        self.standard.increment_usage(anchor);

        self.depth += 1;
        anchor
    }

    fn is_nested_loop(&self, node: Option<NodeId>) -> bool {
        node.is_some_and(|id| {
            self.standard.node(id).node_type() == NodeType::Loop
                && self.standard.root() != Some(id)
        })
    }

    /// Implementation nodes from `first` on that narrow the same standard type
    /// as `standard`
    fn collect_candidates(&mut self, first: NodeId, standard: NodeId) {
        let standard_reference = self.standard.node(standard).reference();
        let mut candidate = Some(first);

        while let Some(id) = candidate {
            if !self
                .implementation
                .node(id)
                .reference()
                .same_standard_type(standard_reference)
            {
                break;
            }
            self.impl_candidates.push(id);
            candidate = self.implementation.next_sibling(id);
        }
    }

    fn loop_reference(&self, entry: LoopEntry) -> &TypeReference {
        match entry.implementation {
            Some(node) => self.implementation.node(node).reference(),
            None => self.standard.node(entry.standard).reference(),
        }
    }

    /// Close loops until the depth is reached, reporting the errors buffered
    /// below each loop as it completes
    fn complete_loops(&mut self, handler: &mut dyn ValidationEventHandler, working_depth: u32) {
        let mut working_depth = working_depth;

        while self.depth < working_depth {
            self.flush_usage_errors_below(handler, working_depth);

            let Some(entry) = self.loop_stack.pop() else {
                break;
            };

            self.validate_structure_syntax(entry.standard, handler);
            handler.loop_end(self.loop_reference(entry));
            debug!(
                loop_code = self.standard.node(entry.standard).code(),
                "Loop completed"
            );
            working_depth -= 1;

            if let Some(implementation) = entry.implementation {
                self.impl_node = Some(implementation);
            }
        }
    }

    fn check_minimum_usage(&mut self, node: NodeId, implementation: bool) {
        let tree = if implementation {
            &self.implementation
        } else {
            &self.standard
        };

        if tree.has_minimum_usage(node, SEGMENT_VERSION) {
            return;
        }

        let usage = tree.node(node);
        let kind = if !implementation {
            ValidationErrorKind::MandatorySegmentMissing
        } else if usage.node_type() == NodeType::Segment {
            ValidationErrorKind::ImplementationSegmentBelowMinimumUse
        } else {
            ValidationErrorKind::ImplementationLoopOccursUnderMinimumTimes
        };

        let reference = tree
            .to_segment(node)
            .map(|segment| tree.node(segment).reference().clone());

        self.use_errors
            .push(UsageError::new(kind, reference, usage.depth()));
    }

    /// Check the implementation nodes that narrow `current` and return the
    /// first implementation node past them
    fn check_minimum_impl_usage(&mut self, next_impl: Option<NodeId>, current: NodeId) -> Option<NodeId> {
        let mut next = next_impl;

        while let Some(id) = next {
            let same_type = self
                .implementation
                .node(id)
                .reference()
                .same_standard_type(self.standard.node(current).reference());

            if !same_type {
                break;
            }

            self.check_minimum_usage(id, true);
            next = self.implementation.next_sibling(id);
        }

        next
    }

    /// Search the siblings of the last accepted segment for an earlier,
    /// non-anchor position
    fn check_peer_segments(
        &mut self,
        handler: &mut dyn ValidationEventHandler,
        tag: &str,
        current: NodeId,
        start_depth: u32,
    ) -> bool {
        if self.depth != start_depth || current == self.correct_segment {
            return false;
        }

        let Some(peer) = self.standard.sibling_segment(current, tag) else {
            return false;
        };

        if self.standard.node(peer).is_first_child() {
            return false;
        }

        self.use_errors.clear();
        handler.segment_error(
            tag,
            Some(self.standard.node(peer).reference()),
            ValidationErrorKind::SegmentNotInProperSequence,
        );

        self.standard.increment_usage(peer);
        self.standard.reset_children(peer);

        if self.standard.exceeds_maximum_usage(peer, SEGMENT_VERSION) {
            handler.segment_error(
                tag,
                Some(self.standard.node(peer).reference()),
                ValidationErrorKind::SegmentExceedsMaximumUse,
            );
        }

        self.segment = peer;
        true
    }

    fn check_parents(
        &mut self,
        handler: &mut dyn ValidationEventHandler,
        tag: &str,
        start_depth: u32,
    ) -> bool {
        if self.depth > 1 {
            self.cursor
                .navigate_up(&self.standard, &self.implementation, self.depth);
            self.depth -= 1;
            return false;
        }

        if let Some(first) = self.standard.root().and_then(|r| self.standard.first_child(r)) {
            let first_impl = self
                .implementation
                .root()
                .and_then(|r| self.implementation.first_child(r));
            self.cursor = Cursor::new(first, first_impl);
        }

        self.check_unexpected_segment(handler, tag, start_depth)
    }

    fn check_unexpected_segment(
        &mut self,
        handler: &mut dyn ValidationEventHandler,
        tag: &str,
        start_depth: u32,
    ) -> bool {
        if self.standard.node(self.cursor.standard).code() == tag {
            // Retry from the top of the transaction
            return false;
        }

        let in_container = self
            .container
            .as_ref()
            .is_some_and(|container| container.contains_segment(tag));

        if in_container {
            debug!(tag, "Segment belongs to the container, ending transaction");
            self.complete_loops(handler, start_depth);
            self.flush_usage_errors(handler);
            self.segment_expected = false;
        } else {
            // Unexpected segment, go back to where the search started
            self.segment_expected = false;
            self.depth = start_depth;
            self.use_errors.clear();

            let kind = if self.schema.contains_segment(tag) {
                ValidationErrorKind::UnexpectedSegment
            } else {
                ValidationErrorKind::SegmentNotInDefinedTransactionSet
            };
            debug!(tag, %kind, "Segment rejected");
            handler.segment_error(tag, None, kind);
        }

        true
    }

    fn flush_usage_errors(&mut self, handler: &mut dyn ValidationEventHandler) {
        for error in self.use_errors.drain(..) {
            error.report_segment_error(handler);
        }
    }

    fn flush_usage_errors_below(&mut self, handler: &mut dyn ValidationEventHandler, depth: u32) {
        let (flushed, kept): (Vec<UsageError>, Vec<UsageError>) = std::mem::take(&mut self.use_errors)
            .into_iter()
            .partition(|e| e.is_depth_greater_than(depth));

        self.use_errors = kept;

        for error in &flushed {
            error.report_segment_error(handler);
        }
    }

    /// Try to commit one of the pending implementation candidates using the
    /// newest event of `window`.
    ///
    /// `window` covers the events emitted since the current segment (or the
    /// loop it starts) began. When a candidate is selected those events are
    /// rewritten to reference the implementation and `true` is returned.
    pub fn select_implementation(
        &mut self,
        events: &mut [StreamEvent],
        window: Range<usize>,
        handler: &mut dyn ValidationEventHandler,
    ) -> bool {
        let end = window.end.min(events.len());
        let start = window.start.min(end);

        let Some(current) = end.checked_sub(1).and_then(|i| events.get(i)) else {
            return false;
        };

        if start == end || current.kind != EventKind::ElementData {
            return false;
        }

        let selected = self.impl_candidates.iter().copied().find(|&candidate| {
            selection::is_match(
                self.implementation.node(candidate).discriminator(),
                current.data_str(),
                &current.location,
            )
        });

        let Some(candidate) = selected else {
            return false;
        };
        let Some(impl_segment) = self.implementation.to_segment(candidate) else {
            return false;
        };

        debug!(
            implementation = %self.implementation.node(candidate).reference().id,
            "Implementation selected"
        );

        self.handle_implementation_selected(handler, candidate, impl_segment);

        if self.implementation.node(candidate).node_type() == NodeType::Segment {
            selection::update_event_references(
                &mut events[start..end],
                None,
                &self.implementation,
                impl_segment,
            );
        } else {
            selection::update_event_references(
                &mut events[start..end],
                Some(self.implementation.node(candidate).reference()),
                &self.implementation,
                impl_segment,
            );

            // Replace the standard loop with the implementation on the stack
            if let Some(top) = self.loop_stack.last_mut() {
                top.implementation = Some(candidate);
            }
        }

        true
    }

    fn handle_implementation_selected(
        &mut self,
        handler: &mut dyn ValidationEventHandler,
        candidate: NodeId,
        impl_segment: NodeId,
    ) {
        let preceding: Vec<NodeId> = self
            .impl_candidates
            .iter()
            .copied()
            .take_while(|&c| c != candidate)
            .collect();

        for sibling in preceding {
            self.check_minimum_usage(sibling, true);
        }
        self.flush_usage_errors(handler);

        self.impl_candidates.clear();
        self.impl_node = Some(impl_segment);
        self.impl_segment_selected = true;

        // Resolve the implementation of the element already validated
        let child = |tree: &UsageTree, parent: NodeId, of: NodeId, standard: &UsageTree| {
            tree.node(parent)
                .children()
                .get(standard.node(of).index())
                .copied()
                .flatten()
        };

        if let Some(composite) = self.composite {
            self.impl_composite = child(&self.implementation, impl_segment, composite, &self.standard);
            self.impl_element = match (self.impl_composite, self.element) {
                (Some(impl_composite), Some(element)) if element != composite => {
                    child(&self.implementation, impl_composite, element, &self.standard)
                }
                _ => None,
            };
        } else if let Some(element) = self.element {
            self.impl_composite = None;
            self.impl_element = child(&self.implementation, impl_segment, element, &self.standard);
        }

        let code = self.implementation.node(impl_segment).code().to_string();

        if self.implementation.node(candidate).node_type() == NodeType::Segment {
            self.implementation.increment_usage(candidate);

            if self
                .implementation
                .exceeds_maximum_usage(candidate, SEGMENT_VERSION)
            {
                handler.segment_error(
                    &code,
                    Some(self.implementation.node(impl_segment).reference()),
                    ValidationErrorKind::SegmentExceedsMaximumUse,
                );
            }
        } else {
            self.implementation.increment_usage(candidate);
            self.implementation.reset_children(candidate);
            self.implementation.increment_usage(impl_segment);

            if self
                .implementation
                .exceeds_maximum_usage(candidate, SEGMENT_VERSION)
            {
                handler.segment_error(
                    &code,
                    Some(self.implementation.node(impl_segment).reference()),
                    ValidationErrorKind::LoopOccursOverMaximumTimes,
                );
            }
        }
    }

    fn impl_element_at(&mut self, version: &str, index: usize) -> Option<NodeId> {
        if !self.impl_segment_selected {
            return None;
        }
        let segment = self.impl_node?;
        self.implementation.child(segment, version, index)
    }

    fn is_impl_element_selected(&self) -> bool {
        self.impl_segment_selected && self.impl_element.is_some()
    }

    /// Validate the occurrence of a composite (or a repeated element) at the
    /// start of its data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPosition`] when `location` points inside a
    /// composite.
    pub fn valid_composite_occurrences(
        &mut self,
        dialect: &dyn Dialect,
        location: &Location,
    ) -> Result<bool> {
        if !self.segment_expected {
            return Ok(true);
        }

        let Some(element_index) = location.element_index() else {
            return Err(Error::InvalidPosition(format!(
                "composite at element position {}",
                location.element_position
            )));
        };
        let version = dialect.transaction_version();

        self.element_errors.clear();
        self.composite = None;
        self.element = self.standard.child(self.segment, version, element_index);

        self.validate_impl_repetitions(version, element_index, None);

        self.impl_composite = None;
        self.impl_element = self.impl_element_at(version, element_index);

        let Some(element) = self.element else {
            self.element_errors.push(UsageError::element(
                ValidationErrorKind::TooManyDataElements,
                None,
            ));
            return Ok(false);
        };

        if self.standard.node(element).node_type() != NodeType::Composite {
            self.standard.increment_usage(element);

            if self.standard.exceeds_maximum_usage(element, version) {
                self.push_element_error(ValidationErrorKind::TooManyRepetitions, element);
                return Ok(false);
            }

            // Components of a simple element are reported during element validation
            return Ok(true);
        }

        if location.component_position.is_some() {
            return Err(Error::InvalidPosition(format!(
                "composite start inside composite at element {} component {:?}",
                location.element_position, location.component_position
            )));
        }

        self.composite = Some(element);
        self.element = None;
        self.standard.increment_usage(element);

        if self.standard.exceeds_maximum_usage(element, version) {
            self.push_element_error(ValidationErrorKind::TooManyRepetitions, element);
            return Ok(false);
        }

        if !self.validate_impl_unused_element_blank(element, true) {
            return Ok(false);
        }

        self.impl_composite = self.impl_element.take();

        if self.impl_segment_selected {
            if let Some(impl_composite) = self.impl_composite {
                self.implementation.increment_usage(impl_composite);
            }
        }

        Ok(self.element_errors.is_empty())
    }

    /// Validate one element or component value; `None` or an empty value
    /// means the position was left empty
    pub fn validate_element(
        &mut self,
        dialect: &dyn Dialect,
        location: &Location,
        value: Option<&str>,
    ) -> bool {
        if !self.segment_expected {
            return true;
        }

        let value = value.filter(|v| !v.is_empty());
        self.element_errors.clear();
        self.composite = None;
        self.element = None;
        self.impl_composite = None;
        self.impl_element = None;

        let Some(element_index) = location.element_index() else {
            return true;
        };
        let mut component_index = location.component_index();
        let version = dialect.transaction_version();

        self.validate_impl_repetitions(version, element_index, component_index);

        if element_index >= self.standard.child_count(self.segment, version) {
            if component_index.is_none() {
                // Composites were already reported by valid_composite_occurrences
                self.element_errors.push(UsageError::element(
                    ValidationErrorKind::TooManyDataElements,
                    None,
                ));
                return false;
            }

            // Undefined element, nothing to report against
            return true;
        }

        self.element = self.standard.child(self.segment, version, element_index);
        self.impl_element = self.impl_element_at(version, element_index);

        let Some(element) = self.element else {
            return true;
        };

        if self.standard.node(element).node_type() == NodeType::Composite {
            self.composite = Some(element);
            self.impl_composite = self.impl_element;
            component_index.get_or_insert(0);
        }

        match component_index {
            Some(component_index) => {
                self.validate_component_element(version, component_index, value.is_some());
            }
            None => {
                // Received composites were checked in valid_composite_occurrences
                self.validate_impl_unused_element_blank(element, value.is_some());
            }
        }

        if !self.element_errors.is_empty() {
            return false;
        }

        match value {
            Some(value) => self.validate_element_value(dialect, location, value),
            None => self.validate_data_element_requirement(version),
        }

        self.element_errors.is_empty()
    }

    fn validate_component_element(&mut self, version: &str, component_index: usize, value_received: bool) {
        let Some(element) = self.element else {
            return;
        };

        if self.standard.node(element).node_type() != NodeType::Composite {
            // Components received for a simple element
            self.push_element_error(ValidationErrorKind::TooManyComponents, element);
            return;
        }

        if component_index == 0 {
            self.standard.reset_children(element);
            if let Some(impl_element) = self.impl_element {
                self.implementation.reset_children(impl_element);
            }
        }

        if component_index >= self.standard.child_count(element, version) {
            self.push_element_error(ValidationErrorKind::TooManyComponents, element);
            return;
        }

        // An empty first component stands for the whole composite
        if value_received || component_index != 0 {
            self.element = self.standard.child(element, version, component_index);

            if self.is_impl_element_selected() {
                self.impl_element = self
                    .impl_element
                    .and_then(|composite| self.implementation.child(composite, version, component_index));

                if let Some(component) = self.element {
                    self.validate_impl_unused_element_blank(component, value_received);
                }
            }
        }
    }

    fn validate_element_value(&mut self, dialect: &dyn Dialect, location: &Location, value: &str) {
        let version = dialect.transaction_version();
        let Some(element) = self.element else {
            return;
        };

        if self.standard.node(element).node_type() != NodeType::Composite {
            self.standard.increment_usage(element);

            if let Some(impl_element) = self.impl_element {
                self.implementation.increment_usage(impl_element);
            }

            if self.standard.exceeds_maximum_usage(element, version) {
                self.push_element_error(ValidationErrorKind::TooManyRepetitions, element);
            }
        }

        if version.is_empty() && self.standard.node(element).has_versions() {
            trace!(
                element = self.standard.node(element).code(),
                "Value queued until the version is known"
            );
            self.revalidation.push(RevalidationEntry::new(
                element,
                self.impl_element,
                value,
                location,
            ));
            return;
        }

        let errors = self.value_errors(dialect, element, self.impl_element, value);
        self.element_errors.extend(errors);
    }

    /// Replay the values queued while the version was unknown
    pub fn validate_version_constraints(
        &mut self,
        dialect: &dyn Dialect,
        handler: &mut dyn ValidationEventHandler,
    ) {
        let entries = self.revalidation.take();

        if !entries.is_empty() {
            debug!(
                count = entries.len(),
                version = dialect.transaction_version(),
                "Revalidating version dependent values"
            );
        }

        for entry in entries {
            let errors = self.value_errors(dialect, entry.standard, entry.implementation, &entry.value);

            for error in &errors {
                handler.element_error(&ElementErrorReport {
                    kind: error.kind,
                    reference: error.reference.as_ref(),
                    data: Some(&entry.value),
                    element_position: entry.location.element_position,
                    component_position: entry.location.component_position,
                    element_occurrence: entry.location.element_occurrence,
                });
            }
        }
    }

    fn value_errors(
        &self,
        dialect: &dyn Dialect,
        element: NodeId,
        impl_element: Option<NodeId>,
        value: &str,
    ) -> Vec<UsageError> {
        let node = self.standard.node(element);
        let Some(simple) = self.schema.simple_type(&node.reference().type_id) else {
            return Vec::new();
        };

        let failures = simple.validate(dialect.transaction_version(), dialect.decimal_mark(), value);
        let mut errors: Vec<UsageError> = failures
            .iter()
            .map(|&failure| ValidationErrorKind::from(failure))
            .filter(|&kind| {
                self.config.validate_code_values || kind != ValidationErrorKind::InvalidCodeValue
            })
            .map(|kind| UsageError::element(kind, Some(node.reference().clone())))
            .collect();

        if failures.is_empty() && self.impl_segment_selected {
            if let Some(impl_element) = impl_element {
                let narrowed = self.implementation.node(impl_element);

                if !narrowed.values().is_empty() && !narrowed.values().contains(value) {
                    errors.push(UsageError::element(
                        ValidationErrorKind::ImplementationInvalidCodeValue,
                        Some(narrowed.reference().clone()),
                    ));
                }
            }
        }

        errors
    }

    fn validate_impl_repetitions(&mut self, version: &str, element_index: usize, component_index: Option<usize>) {
        if element_index == 0 || component_index.is_some() {
            return;
        }

        if let Some(previous) = self.impl_element_at(version, element_index - 1) {
            if self.too_few_repetitions(version, previous) {
                self.element_errors.push(UsageError::element(
                    ValidationErrorKind::ImplementationTooFewRepetitions,
                    Some(self.implementation.node(previous).reference().clone()),
                ));
            }
        }
    }

    fn validate_impl_unused_element_blank(&mut self, node: NodeId, value_received: bool) -> bool {
        if value_received && self.impl_segment_selected && self.impl_element.is_none() {
            self.push_element_error(ValidationErrorKind::ImplementationUnusedDataElementPresent, node);
            return false;
        }
        true
    }

    fn validate_data_element_requirement(&mut self, version: &str) {
        let Some(element) = self.element else {
            return;
        };

        let standard_met = self.standard.has_minimum_usage(element, version);
        let impl_met = self
            .impl_element
            .is_none_or(|impl_element| self.implementation.has_minimum_usage(impl_element, version));

        if !standard_met || !impl_met {
            self.push_element_error(ValidationErrorKind::RequiredDataElementMissing, element);
        }
    }

    fn too_few_repetitions(&self, version: &str, node: NodeId) -> bool {
        !self.implementation.has_minimum_usage(node, version)
            && self.implementation.node(node).min_occurs(version) > 1
    }

    fn push_element_error(&mut self, kind: ValidationErrorKind, node: NodeId) {
        let reference = self.standard.node(node).reference().clone();
        self.element_errors
            .push(UsageError::element(kind, Some(reference)));
    }

    /// Complete the current segment or composite.
    ///
    /// Positions after `location` that were never received are validated as
    /// empty, then the syntax rules of the structure are checked.
    pub fn validate_syntax(
        &mut self,
        dialect: &dyn Dialect,
        handler: &mut dyn ValidationEventHandler,
        location: &Location,
        is_composite: bool,
    ) {
        if !self.segment_expected {
            return;
        }

        let structure = if is_composite {
            match self.composite {
                Some(composite) => composite,
                // End of a composite the schema defines as a simple element
                None => return,
            }
        } else {
            self.segment
        };

        let version = dialect.transaction_version().to_string();
        let index = current_index(location, is_composite);
        let count = self.standard.child_count(structure, &version);

        let mut position = location.clone();
        for _ in index..count {
            if is_composite {
                position.increment_component_position();
            } else {
                position.increment_element_position();
            }

            if !self.validate_element(dialect, &position, None) {
                self.report_element_errors(handler, &position, None);
            }
        }

        if !is_composite && self.impl_segment_selected && index == count {
            let previous = match (self.impl_node, location.element_index()) {
                (Some(segment), Some(element_index)) => {
                    self.implementation.child(segment, &version, element_index)
                }
                _ => None,
            };

            if let Some(previous) = previous.filter(|&p| self.too_few_repetitions(&version, p)) {
                handler.element_error(&ElementErrorReport {
                    kind: ValidationErrorKind::ImplementationTooFewRepetitions,
                    reference: Some(self.implementation.node(previous).reference()),
                    data: None,
                    element_position: location.element_position,
                    component_position: location.component_position,
                    element_occurrence: None,
                });
            }
        }

        let composite_position = is_composite.then(|| {
            u32::try_from(self.standard.node(structure).index() + 1).unwrap_or(u32::MAX)
        });
        self.check_syntax_rules(structure, &version, composite_position, handler);
    }

    fn validate_structure_syntax(&mut self, structure: NodeId, handler: &mut dyn ValidationEventHandler) {
        self.check_syntax_rules(structure, SEGMENT_VERSION, None, handler);
    }

    fn check_syntax_rules(
        &mut self,
        structure: NodeId,
        version: &str,
        composite_position: Option<u32>,
        handler: &mut dyn ValidationEventHandler,
    ) {
        if self.standard.node(structure).syntax_rules().is_empty() {
            return;
        }

        let children = self.standard.versioned_children(structure, version).to_vec();
        let tree = &self.standard;

        let mut scope = SyntaxScope::new(composite_position);
        for child in children {
            match child {
                Some(child) => {
                    let node = tree.node(child);
                    scope.push(node.is_used(), Some(node.reference()));
                }
                None => scope.push(false, None),
            }
        }

        syntax::validate_rules(tree.node(structure).syntax_rules(), &scope, handler);
    }
}

/// Number of positions of the structure already received
fn current_index(location: &Location, is_composite: bool) -> usize {
    if is_composite {
        location.component_position.map_or(1, |c| c.max(1) as usize)
    } else {
        location.element_position as usize
    }
}
